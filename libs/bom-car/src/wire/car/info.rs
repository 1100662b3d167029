//! Rendition info records
//!
//! A rendition carries a list of tagged records (`magic`, `length`, `content`). The content
//! layout depends on the magic; it is decoded on demand through [InfoRecord::parsed].

use std::cell::OnceCell;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::wire::fourcc::FourCc;
use crate::wire::schema::{Decode, Field, Kind, Record, Schema, SchemaError, le};

/// Tagged info record
#[derive(Debug, Clone)]
pub struct InfoRecord {
    pub magic: u32,
    pub length: u32,
    pub content: Vec<u8>,
    parsed: OnceCell<InfoVariant>,
}

pub(crate) static INFO_RECORD: Schema = Schema {
    name: "InfoRecord",
    fields: &[
        ("magic", le(Kind::U32)),
        ("length", le(Kind::U32)),
        ("content", Field::Dynamic("length")),
    ],
};

impl InfoRecord {
    /// Builds a record around `content`, which must fit a `u32` length
    pub fn new(magic: u32, content: Vec<u8>) -> Result<Self, SchemaError> {
        let length = u32::try_from(content.len()).map_err(|_| SchemaError::OutOfRange {
            record: INFO_RECORD.name,
            field: "length",
            value: content.len() as u64,
        })?;
        Ok(InfoRecord {
            magic,
            length,
            content,
            parsed: OnceCell::new(),
        })
    }

    /// Kind of the record, `None` if the magic is not recognized
    pub fn kind(&self) -> Option<InfoKind> {
        InfoKind::from_magic(self.magic)
    }

    /// Decoded content, computed on first access then cached
    ///
    /// Records with an unrecognized magic give [InfoVariant::Unrecognized].
    pub fn parsed(&self) -> Result<&InfoVariant, SchemaError> {
        if let Some(parsed) = self.parsed.get() {
            return Ok(parsed);
        }
        let variant = match self.kind() {
            Some(kind) => kind.decode(&self.content)?,
            None => InfoVariant::Unrecognized,
        };
        Ok(self.parsed.get_or_init(|| variant))
    }
}

impl Decode for InfoRecord {
    fn schema() -> &'static Schema {
        &INFO_RECORD
    }

    fn from_record(mut record: Record) -> Result<Self, SchemaError> {
        Ok(InfoRecord {
            magic: record.u32("magic")?,
            length: record.u32("length")?,
            content: record.take_bytes("content")?,
            parsed: OnceCell::new(),
        })
    }
}

impl Serialize for InfoRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("InfoRecord", 5)?;
        state.serialize_field("magic", &self.magic)?;
        state.serialize_field("length", &self.length)?;
        state.serialize_field("kind", &self.kind())?;
        match self.parsed() {
            Ok(value) => {
                state.serialize_field("value", value)?;
                state.skip_field("error")?;
            }
            Err(e) => {
                state.skip_field("value")?;
                state.serialize_field("error", &e.to_string())?;
            }
        }
        state.end()
    }
}

/// Recognized info record kinds, by magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoKind {
    Slices = 1001,
    Metrics = 1003,
    Composition = 1004,
    Uti = 1005,
    BitmapInfo = 1006,
    BytesPerRow = 1007,
    Reference = 1010,
}

impl InfoKind {
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            1001 => Some(InfoKind::Slices),
            1003 => Some(InfoKind::Metrics),
            1004 => Some(InfoKind::Composition),
            1005 => Some(InfoKind::Uti),
            1006 => Some(InfoKind::BitmapInfo),
            1007 => Some(InfoKind::BytesPerRow),
            1010 => Some(InfoKind::Reference),
            _ => None,
        }
    }

    pub fn magic(self) -> u32 {
        self as u32
    }

    fn decode(self, content: &[u8]) -> Result<InfoVariant, SchemaError> {
        Ok(match self {
            InfoKind::Slices => InfoVariant::Slices(decode_list(&SLICES, "slices", content)?),
            InfoKind::Metrics => InfoVariant::Metrics(decode_list(&METRICS, "metrics", content)?),
            InfoKind::Composition => InfoVariant::Composition(Composition::decode_bytes(content)?),
            InfoKind::Uti => InfoVariant::Uti(Uti::decode_bytes(content)?),
            InfoKind::BitmapInfo => InfoVariant::BitmapInfo(BitmapInfo::decode_bytes(content)?),
            InfoKind::BytesPerRow => InfoVariant::BytesPerRow(BytesPerRow::decode_bytes(content)?),
            InfoKind::Reference => InfoVariant::Reference(Reference::decode_bytes(content)?),
        })
    }
}

fn decode_list<T: Decode>(
    schema: &Schema,
    field: &'static str,
    content: &[u8],
) -> Result<Vec<T>, SchemaError> {
    schema
        .decode_bytes(content)?
        .take_list(field)?
        .into_iter()
        .map(T::from_record)
        .collect()
}

/// Decoded content of an info record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoVariant {
    Slices(Vec<Slice>),
    Metrics(Vec<Metric>),
    Composition(Composition),
    Uti(Uti),
    BitmapInfo(BitmapInfo),
    BytesPerRow(BytesPerRow),
    Reference(Reference),
    Unrecognized,
}

/// Region of the bitmap used when stretching a resizable rendition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slice {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

static SLICE: Schema = Schema {
    name: "Slice",
    fields: &[
        ("x", le(Kind::U32)),
        ("y", le(Kind::U32)),
        ("width", le(Kind::U32)),
        ("height", le(Kind::U32)),
    ],
};

static SLICES: Schema = Schema {
    name: "Slices",
    fields: &[("slices", Field::Counted(&SLICE))],
};

impl Decode for Slice {
    fn schema() -> &'static Schema {
        &SLICE
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(Slice {
            x: record.u32("x")?,
            y: record.u32("y")?,
            width: record.u32("width")?,
            height: record.u32("height")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metric {
    pub width: u32,
    pub height: u32,
}

static METRIC: Schema = Schema {
    name: "Metric",
    fields: &[("width", le(Kind::U32)), ("height", le(Kind::U32))],
};

static METRICS: Schema = Schema {
    name: "Metrics",
    fields: &[("metrics", Field::Counted(&METRIC))],
};

impl Decode for Metric {
    fn schema() -> &'static Schema {
        &METRIC
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(Metric {
            width: record.u32("width")?,
            height: record.u32("height")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Composition {
    pub blend_mode: u32,
    pub opacity: f32,
}

static COMPOSITION: Schema = Schema {
    name: "Composition",
    fields: &[("blend_mode", le(Kind::U32)), ("opacity", le(Kind::F32))],
};

impl Decode for Composition {
    fn schema() -> &'static Schema {
        &COMPOSITION
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(Composition {
            blend_mode: record.u32("blend_mode")?,
            opacity: record.float("opacity")?,
        })
    }
}

/// Uniform type identifier
///
/// Only the first byte of the identifier is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Uti {
    pub length: u32,
    pub uti: String,
}

static UTI: Schema = Schema {
    name: "Uti",
    fields: &[("length", le(Kind::U32)), ("uti", le(Kind::Bytes(1)))],
};

impl Decode for Uti {
    fn schema() -> &'static Schema {
        &UTI
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(Uti {
            length: record.u32("length")?,
            uti: record.text("uti")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitmapInfo {
    pub exif_orientation: u32,
}

static BITMAP_INFO: Schema = Schema {
    name: "BitmapInfo",
    fields: &[("exif_orientation", le(Kind::U32))],
};

impl Decode for BitmapInfo {
    fn schema() -> &'static Schema {
        &BITMAP_INFO
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(BitmapInfo {
            exif_orientation: record.u32("exif_orientation")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BytesPerRow {
    pub bytes_per_row: u32,
}

static BYTES_PER_ROW: Schema = Schema {
    name: "BytesPerRow",
    fields: &[("bytes_per_row", le(Kind::U32))],
};

impl Decode for BytesPerRow {
    fn schema() -> &'static Schema {
        &BYTES_PER_ROW
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(BytesPerRow {
            bytes_per_row: record.u32("bytes_per_row")?,
        })
    }
}

/// Reference to another rendition (internal link)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub magic: FourCc,
    pub padding: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub layout: u16,
    pub key_length: u16,
}

static REFERENCE: Schema = Schema {
    name: "Reference",
    fields: &[
        ("magic", le(Kind::Bytes(4))),
        ("padding", le(Kind::U32)),
        ("x", le(Kind::U32)),
        ("y", le(Kind::U32)),
        ("width", le(Kind::U32)),
        ("height", le(Kind::U32)),
        ("layout", le(Kind::U16)),
        ("key_length", le(Kind::U16)),
    ],
};

impl Decode for Reference {
    fn schema() -> &'static Schema {
        &REFERENCE
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(Reference {
            magic: record.four_cc("magic")?,
            padding: record.u32("padding")?,
            x: record.u32("x")?,
            y: record.u32("y")?,
            width: record.u32("width")?,
            height: record.u32("height")?,
            layout: record.u16("layout")?,
            key_length: record.u16("key_length")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::testing::{info_record, slices};

    #[test]
    fn test_info_record_deserialization() {
        let record = InfoRecord::decode_bytes(&info_record(1007, &64u32.to_le_bytes())).unwrap();
        assert_eq!(record.magic, 1007);
        assert_eq!(record.length, 4);
        assert_eq!(record.kind(), Some(InfoKind::BytesPerRow));
        assert_eq!(
            record.parsed().unwrap(),
            &InfoVariant::BytesPerRow(BytesPerRow { bytes_per_row: 64 })
        );
    }

    #[test]
    fn test_uti_record() {
        let record = InfoRecord::new(1005, vec![1, 0, 0, 0, b'p']).unwrap();
        assert_eq!(
            record.parsed().unwrap(),
            &InfoVariant::Uti(Uti {
                length: 1,
                uti: "p".to_owned()
            })
        );
    }

    #[test]
    fn test_unrecognized_record() {
        let record = InfoRecord::new(9999, vec![1, 2, 3]).unwrap();
        assert_eq!(record.kind(), None);
        assert_eq!(record.parsed().unwrap(), &InfoVariant::Unrecognized);
    }

    #[test]
    fn test_slices_record() {
        let record = InfoRecord::new(1001, slices(&[[0, 0, 10, 20], [10, 0, 5, 20]])).unwrap();
        let InfoVariant::Slices(parsed) = record.parsed().unwrap() else {
            panic!("expected slices");
        };
        assert_eq!(
            parsed,
            &vec![
                Slice {
                    x: 0,
                    y: 0,
                    width: 10,
                    height: 20
                },
                Slice {
                    x: 10,
                    y: 0,
                    width: 5,
                    height: 20
                }
            ]
        );
    }

    #[test]
    fn test_composition_record() {
        let mut content = 3u32.to_le_bytes().to_vec();
        content.extend_from_slice(&0.5f32.to_le_bytes());
        let record = InfoRecord::new(1004, content).unwrap();
        assert_eq!(
            record.parsed().unwrap(),
            &InfoVariant::Composition(Composition {
                blend_mode: 3,
                opacity: 0.5
            })
        );
    }

    #[test]
    fn test_reference_record() {
        let mut content = b"KLNI".to_vec();
        for field in [0u32, 1, 2, 30, 40] {
            content.extend_from_slice(&field.to_le_bytes());
        }
        content.extend_from_slice(&12u16.to_le_bytes());
        content.extend_from_slice(&36u16.to_le_bytes());
        let record = InfoRecord::new(1010, content).unwrap();
        let InfoVariant::Reference(reference) = record.parsed().unwrap() else {
            panic!("expected a reference");
        };
        assert!(reference.magic == "INLK");
        assert_eq!((reference.width, reference.height), (30, 40));
        assert_eq!(reference.layout, 12);
        assert_eq!(reference.key_length, 36);
    }

    #[test]
    fn test_truncated_content_is_reported_on_access() {
        let record = InfoRecord::new(1001, slices(&[[0, 0, 10, 20]])[..10].to_vec()).unwrap();
        assert!(record.parsed().is_err());
        assert_eq!(InfoKind::Slices.magic(), 1001);
    }

    #[test]
    fn test_metrics_record() {
        let mut content = 2u32.to_le_bytes().to_vec();
        for field in [16u32, 16, 32, 32] {
            content.extend_from_slice(&field.to_le_bytes());
        }
        let record = InfoRecord::new(1003, content).unwrap();
        assert_eq!(record.kind(), Some(InfoKind::Metrics));
        assert_eq!(
            record.parsed().unwrap(),
            &InfoVariant::Metrics(vec![
                Metric {
                    width: 16,
                    height: 16
                },
                Metric {
                    width: 32,
                    height: 32
                }
            ])
        );
    }

    #[test]
    fn test_truncated_metrics_record() {
        // Three metrics declared, one present
        let mut content = 3u32.to_le_bytes().to_vec();
        content.extend_from_slice(&16u32.to_le_bytes());
        content.extend_from_slice(&16u32.to_le_bytes());
        let record = InfoRecord::new(1003, content).unwrap();
        assert!(record.parsed().is_err());
    }

    #[test]
    fn test_bitmap_info_record() {
        let record = InfoRecord::new(1006, 6u32.to_le_bytes().to_vec()).unwrap();
        assert_eq!(record.kind(), Some(InfoKind::BitmapInfo));
        assert_eq!(
            record.parsed().unwrap(),
            &InfoVariant::BitmapInfo(BitmapInfo {
                exif_orientation: 6
            })
        );
    }

    #[test]
    fn test_new_record_length() {
        let record = InfoRecord::new(1007, vec![0; 4]).unwrap();
        assert_eq!(record.length, 4);
        assert_eq!(record.content.len(), 4);
    }

    #[test]
    fn test_content_shorter_than_declared() {
        let bytes = info_record(1007, &[1, 0, 0, 0]);
        assert!(InfoRecord::decode_bytes(&bytes[..10]).is_err());
    }
}
