//! Declarative record layouts
//!
//! Every on-disk structure of a BOM container (and of the CAR records stored in it) is described
//! as a [Schema]: an ordered list of named [Field] descriptors. A single generic routine,
//! [Schema::decode], interprets those descriptors against a seekable byte source and produces a
//! [Record], i.e. the list of decoded values in declaration order.
//!
//! Descriptors may refer to fields decoded earlier in the same record (a length, a count or a
//! byte budget), which is why decoding is strictly sequential: each descriptor leaves the byte
//! source positioned right after the bytes it consumed, and nothing ever backtracks.
//!
//! ## Example
//! ```
//! use bom_car::wire::schema::{Field, Kind, Schema, be, le};
//!
//! static BLOB: Schema = Schema {
//!     name: "Blob",
//!     fields: &[
//!         ("tag", le(Kind::Bytes(2))),
//!         ("length", be(Kind::U16)),
//!         ("data", Field::Dynamic("length")),
//!     ],
//! };
//!
//! let record = BLOB.decode_bytes(&[b'a', b'b', 0x00, 0x02, 0xCA, 0xFE]).unwrap();
//! // Little-endian byte strings are stored reversed
//! assert_eq!(record.bytes("tag").unwrap(), b"ba");
//! assert_eq!(record.u16("length").unwrap(), 2);
//! assert_eq!(record.bytes("data").unwrap(), &[0xCA, 0xFE]);
//! ```

use std::io::{self, Cursor, Read, Seek};

use crate::wire::fourcc::FourCc;

/// Byte order of a fixed-size field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// Statically-sized value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    U8,
    I8,
    U16,
    U32,
    F32,
    /// Fixed-length byte string
    Bytes(usize),
}

impl Kind {
    /// Size of the value on disk, in bytes
    pub const fn size(self) -> usize {
        match self {
            Kind::U8 | Kind::I8 => 1,
            Kind::U16 => 2,
            Kind::U32 | Kind::F32 => 4,
            Kind::Bytes(n) => n,
        }
    }
}

/// A fixed-size field layout: what is read and in which byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub kind: Kind,
    pub order: Endian,
}

/// Total byte budget of a [Field::Bounded] array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// Read from a previously decoded sibling field
    Field(&'static str),
    /// Constant budget
    Literal(usize),
}

/// Field descriptor
///
/// Each variant corresponds to one decoding rule of the format. All of them are interpreted by
/// [Schema::decode].
#[derive(Debug, Clone, Copy)]
pub enum Field {
    /// Statically-sized scalar or byte string.
    ///
    /// Byte strings declared little-endian are reversed after reading: several four-character
    /// codes of the CAR format are stored backwards on disk.
    Fixed(Layout),
    /// Opaque blob whose length is held by a previously decoded field.
    Dynamic(&'static str),
    /// Terminator-delimited text stored in a fixed-capacity slot.
    ///
    /// Bytes are read until `terminator` (consumed, not kept). If the text is shorter than
    /// `width - 1`, the remaining padding of the slot is consumed and discarded.
    Terminated { terminator: u8, width: usize },
    /// `count` sub-records, the count being held by a previously decoded field.
    Array {
        schema: &'static Schema,
        count: &'static str,
    },
    /// Sub-records read until exactly `extent` bytes have been consumed.
    Bounded {
        schema: &'static Schema,
        extent: Extent,
    },
    /// A little-endian `u32` count followed by that many sub-records.
    Counted(&'static Schema),
    /// A single sub-record, decoded in place.
    Nested(&'static Schema),
}

/// Big-endian fixed field
pub const fn be(kind: Kind) -> Field {
    Field::Fixed(Layout {
        kind,
        order: Endian::Big,
    })
}

/// Little-endian fixed field
pub const fn le(kind: Kind) -> Field {
    Field::Fixed(Layout {
        kind,
        order: Endian::Little,
    })
}

/// Terminated text field with a fixed capacity
pub const fn terminated(terminator: u8, width: usize) -> Field {
    Field::Terminated { terminator, width }
}

/// Ordered record layout
#[derive(Debug)]
pub struct Schema {
    /// Record name, used in error messages
    pub name: &'static str,
    /// Fields in on-disk order
    pub fields: &'static [(&'static str, Field)],
}

impl Schema {
    /// Decodes one record from the current position of `src`.
    ///
    /// On success, `src` is positioned right after the last byte of the record.
    pub fn decode<R: Read + Seek>(&self, src: &mut R) -> Result<Record, SchemaError> {
        let mut record = Record {
            name: self.name,
            fields: Vec::with_capacity(self.fields.len()),
        };
        for &(name, field) in self.fields {
            let value = field.decode(name, &record, src)?;
            record.fields.push((name, value));
        }
        Ok(record)
    }

    /// Decodes one record from the start of a byte buffer.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Record, SchemaError> {
        self.decode(&mut Cursor::new(bytes))
    }
}

impl Field {
    fn decode<R: Read + Seek>(
        self,
        name: &'static str,
        record: &Record,
        src: &mut R,
    ) -> Result<Value, SchemaError> {
        match self {
            Field::Fixed(layout) => Ok(layout.read(src)?),
            Field::Dynamic(length) => {
                let length = record.length(length)?;
                read_blob(name, length, src).map(Value::Bytes)
            }
            Field::Terminated { terminator, width } => {
                Ok(Value::Bytes(read_terminated(terminator, width, src)?))
            }
            Field::Array { schema, count } => {
                let count = record.length(count)?;
                read_records(schema, count, src)
            }
            Field::Bounded { schema, extent } => {
                let total = match extent {
                    Extent::Field(field) => record.length(field)?,
                    Extent::Literal(total) => total,
                };
                read_bounded(name, schema, total as u64, src)
            }
            Field::Counted(schema) => {
                let count = u32::from_le_bytes(read_array(src)?) as usize;
                read_records(schema, count, src)
            }
            Field::Nested(schema) => schema.decode(src).map(Value::Record),
        }
    }
}

impl Layout {
    fn read<R: Read>(self, src: &mut R) -> io::Result<Value> {
        let big = self.order == Endian::Big;
        let value = match self.kind {
            Kind::U8 => Value::Unsigned(u64::from(u8::from_be_bytes(read_array(src)?))),
            Kind::I8 => Value::Signed(i64::from(i8::from_be_bytes(read_array(src)?))),
            Kind::U16 => {
                let bytes = read_array(src)?;
                let value = if big {
                    u16::from_be_bytes(bytes)
                } else {
                    u16::from_le_bytes(bytes)
                };
                Value::Unsigned(u64::from(value))
            }
            Kind::U32 => {
                let bytes = read_array(src)?;
                let value = if big {
                    u32::from_be_bytes(bytes)
                } else {
                    u32::from_le_bytes(bytes)
                };
                Value::Unsigned(u64::from(value))
            }
            Kind::F32 => {
                let bytes = read_array(src)?;
                let value = if big {
                    f32::from_be_bytes(bytes)
                } else {
                    f32::from_le_bytes(bytes)
                };
                Value::Float(value)
            }
            Kind::Bytes(size) => {
                let mut bytes = vec![0u8; size];
                src.read_exact(&mut bytes)?;
                if !big {
                    bytes.reverse();
                }
                Value::Bytes(bytes)
            }
        };
        Ok(value)
    }
}

fn read_array<R: Read, const N: usize>(src: &mut R) -> io::Result<[u8; N]> {
    let mut bytes = [0u8; N];
    src.read_exact(&mut bytes)?;
    Ok(bytes)
}

fn read_blob<R: Read>(field: &'static str, length: usize, src: &mut R) -> Result<Vec<u8>, SchemaError> {
    let mut blob = Vec::new();
    src.by_ref().take(length as u64).read_to_end(&mut blob)?;
    if blob.len() != length {
        return Err(SchemaError::FieldLengthMismatch {
            field,
            expected: length,
            available: blob.len(),
        });
    }
    Ok(blob)
}

fn read_terminated<R: Read>(terminator: u8, width: usize, src: &mut R) -> io::Result<Vec<u8>> {
    let mut text = Vec::new();
    loop {
        let [byte] = read_array::<_, 1>(src)?;
        if byte == terminator {
            break;
        }
        text.push(byte);
    }
    if width > text.len() + 1 {
        let padding = (width - text.len() - 1) as u64;
        let skipped = io::copy(&mut src.by_ref().take(padding), &mut io::sink())?;
        if skipped != padding {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }
    Ok(text)
}

fn read_records<R: Read + Seek>(
    schema: &Schema,
    count: usize,
    src: &mut R,
) -> Result<Value, SchemaError> {
    (0..count)
        .map(|_| schema.decode(src))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::List)
}

fn read_bounded<R: Read + Seek>(
    field: &'static str,
    schema: &Schema,
    total: u64,
    src: &mut R,
) -> Result<Value, SchemaError> {
    let start = src.stream_position()?;
    let mut records = Vec::new();
    let mut consumed = 0;
    while consumed < total {
        records.push(schema.decode(src)?);
        consumed = src.stream_position()? - start;
    }
    if consumed != total {
        return Err(SchemaError::ArrayOverrun {
            field,
            expected: total,
            consumed,
        });
    }
    Ok(Value::List(records))
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Unsigned(u64),
    Signed(i64),
    Float(f32),
    Bytes(Vec<u8>),
    Record(Record),
    List(Vec<Record>),
}

/// A decoded record: field values in declaration order.
///
/// Lookups by name resolve to the most recently decoded field of that name, so layouts may
/// repeat placeholder names such as `reserved`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: &'static str,
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    /// Name of the schema this record was decoded with
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Looks a field up by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .rev()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
    }

    /// Iterates over the decoded fields, in on-disk order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(name, value)| (*name, value))
    }

    fn value(&self, field: &'static str) -> Result<&Value, SchemaError> {
        self.get(field).ok_or(SchemaError::MissingField {
            record: self.name,
            field,
        })
    }

    fn value_mut(&mut self, field: &'static str) -> Result<&mut Value, SchemaError> {
        let record = self.name;
        self.fields
            .iter_mut()
            .rev()
            .find(|(name, _)| *name == field)
            .map(|(_, value)| value)
            .ok_or(SchemaError::MissingField { record, field })
    }

    fn unexpected(&self, field: &'static str, expected: &'static str) -> SchemaError {
        SchemaError::UnexpectedType {
            record: self.name,
            field,
            expected,
        }
    }

    /// Unsigned integer field
    pub fn unsigned(&self, field: &'static str) -> Result<u64, SchemaError> {
        match self.value(field)? {
            Value::Unsigned(value) => Ok(*value),
            _ => Err(self.unexpected(field, "an unsigned integer")),
        }
    }

    fn narrow<T: TryFrom<u64>>(&self, field: &'static str) -> Result<T, SchemaError> {
        let value = self.unsigned(field)?;
        T::try_from(value).map_err(|_| SchemaError::OutOfRange {
            record: self.name,
            field,
            value,
        })
    }

    pub fn u8(&self, field: &'static str) -> Result<u8, SchemaError> {
        self.narrow(field)
    }

    pub fn u16(&self, field: &'static str) -> Result<u16, SchemaError> {
        self.narrow(field)
    }

    pub fn u32(&self, field: &'static str) -> Result<u32, SchemaError> {
        self.narrow(field)
    }

    /// Signed integer field
    pub fn signed(&self, field: &'static str) -> Result<i64, SchemaError> {
        match self.value(field)? {
            Value::Signed(value) => Ok(*value),
            _ => Err(self.unexpected(field, "a signed integer")),
        }
    }

    pub fn float(&self, field: &'static str) -> Result<f32, SchemaError> {
        match self.value(field)? {
            Value::Float(value) => Ok(*value),
            _ => Err(self.unexpected(field, "a float")),
        }
    }

    pub fn bytes(&self, field: &'static str) -> Result<&[u8], SchemaError> {
        match self.value(field)? {
            Value::Bytes(bytes) => Ok(bytes),
            _ => Err(self.unexpected(field, "a byte string")),
        }
    }

    /// Byte string field, decoded as (lossy) UTF-8
    pub fn text(&self, field: &'static str) -> Result<String, SchemaError> {
        Ok(String::from_utf8_lossy(self.bytes(field)?).into_owned())
    }

    /// Four-character code field
    pub fn four_cc(&self, field: &'static str) -> Result<FourCc, SchemaError> {
        FourCc::from_slice(self.bytes(field)?).ok_or_else(|| self.unexpected(field, "a four-character code"))
    }

    pub fn record(&self, field: &'static str) -> Result<&Record, SchemaError> {
        match self.value(field)? {
            Value::Record(record) => Ok(record),
            _ => Err(self.unexpected(field, "a record")),
        }
    }

    pub fn list(&self, field: &'static str) -> Result<&[Record], SchemaError> {
        match self.value(field)? {
            Value::List(records) => Ok(records),
            _ => Err(self.unexpected(field, "a list of records")),
        }
    }

    /// Moves a byte string out of the record, leaving an empty one behind
    pub fn take_bytes(&mut self, field: &'static str) -> Result<Vec<u8>, SchemaError> {
        match self.value_mut(field)? {
            Value::Bytes(bytes) => Ok(std::mem::take(bytes)),
            _ => Err(self.unexpected(field, "a byte string")),
        }
    }

    /// Moves a list of records out of the record, leaving an empty one behind
    pub fn take_list(&mut self, field: &'static str) -> Result<Vec<Record>, SchemaError> {
        match self.value_mut(field)? {
            Value::List(records) => Ok(std::mem::take(records)),
            _ => Err(self.unexpected(field, "a list of records")),
        }
    }

    /// Integer field used as a length, count or byte budget
    pub fn length(&self, field: &'static str) -> Result<usize, SchemaError> {
        match self.value(field)? {
            Value::Unsigned(value) => usize::try_from(*value).map_err(|_| SchemaError::OutOfRange {
                record: self.name,
                field,
                value: *value,
            }),
            Value::Signed(value) if *value < 0 => Err(SchemaError::NegativeLength {
                record: self.name,
                field,
                value: *value,
            }),
            Value::Signed(value) => Ok(*value as usize),
            _ => Err(self.unexpected(field, "an integer")),
        }
    }
}

/// Types decoded through a [Schema]
pub trait Decode: Sized {
    /// Layout of the record on disk
    fn schema() -> &'static Schema;

    /// Builds the typed value from a decoded record
    fn from_record(record: Record) -> Result<Self, SchemaError>;

    /// Decodes the value from the current position of `src`
    fn decode<R: Read + Seek>(src: &mut R) -> Result<Self, SchemaError> {
        Self::from_record(Self::schema().decode(src)?)
    }

    /// Decodes the value from the start of a byte buffer
    fn decode_bytes(bytes: &[u8]) -> Result<Self, SchemaError> {
        Self::decode(&mut Cursor::new(bytes))
    }
}

/// Errors raised while decoding a record
#[derive(thiserror::Error, Debug)]
pub enum SchemaError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("{record}: field `{field}` is not decoded yet")]
    MissingField {
        record: &'static str,
        field: &'static str,
    },
    #[error("{record}: field `{field}` is not {expected}")]
    UnexpectedType {
        record: &'static str,
        field: &'static str,
        expected: &'static str,
    },
    #[error("{record}: field `{field}` holds a negative length ({value})")]
    NegativeLength {
        record: &'static str,
        field: &'static str,
        value: i64,
    },
    #[error("{record}: field `{field}` value {value} is out of range")]
    OutOfRange {
        record: &'static str,
        field: &'static str,
        value: u64,
    },
    /// A length-referenced field points outside the available bytes
    #[error("Field `{field}` needs {expected} bytes, only {available} available")]
    FieldLengthMismatch {
        field: &'static str,
        expected: usize,
        available: usize,
    },
    /// The last element of a byte-bounded array ran past the budget
    #[error("Array `{field}` consumed {consumed} bytes, expected {expected}")]
    ArrayOverrun {
        field: &'static str,
        expected: u64,
        consumed: u64,
    },
}
