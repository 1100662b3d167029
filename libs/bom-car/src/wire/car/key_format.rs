use serde::{Serialize, Serializer};

use crate::wire::fourcc::FourCc;
use crate::wire::schema::{Decode, Field, Kind, Record, Schema, SchemaError, be, le};

/// Rendition attribute, as listed by the key format and referenced by facets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Element,
    Part,
    Size,
    Direction,
    Value,
    Dimension1,
    Dimension2,
    State,
    Layer,
    Scale,
    PresentationState,
    Idiom,
    Subtype,
    Identifier,
    PreviousValue,
    PreviousState,
    SizeClassHorizontal,
    SizeClassVertical,
    MemoryClass,
    GraphicsClass,
    DisplayGamut,
    DeploymentTarget,
    /// Any code missing from the table
    Unknown(u32),
}

const ATTRIBUTES: [(u32, Attribute, &str); 22] = [
    (1, Attribute::Element, "element"),
    (2, Attribute::Part, "part"),
    (3, Attribute::Size, "size"),
    (4, Attribute::Direction, "direction"),
    (6, Attribute::Value, "value"),
    (8, Attribute::Dimension1, "dimension1"),
    (9, Attribute::Dimension2, "dimension2"),
    (10, Attribute::State, "state"),
    (11, Attribute::Layer, "layer"),
    (12, Attribute::Scale, "scale"),
    (14, Attribute::PresentationState, "presentation_state"),
    (15, Attribute::Idiom, "idiom"),
    (16, Attribute::Subtype, "subtype"),
    (17, Attribute::Identifier, "identifier"),
    (18, Attribute::PreviousValue, "previous_value"),
    (19, Attribute::PreviousState, "previous_state"),
    (20, Attribute::SizeClassHorizontal, "size_class_horizontal"),
    (21, Attribute::SizeClassVertical, "size_class_vertical"),
    (22, Attribute::MemoryClass, "memory_class"),
    (23, Attribute::GraphicsClass, "graphics_class"),
    (24, Attribute::DisplayGamut, "display_gamut"),
    (25, Attribute::DeploymentTarget, "deployment_target"),
];

impl Attribute {
    pub fn from_code(code: u32) -> Self {
        ATTRIBUTES
            .iter()
            .find(|(known, _, _)| *known == code)
            .map_or(Attribute::Unknown(code), |&(_, attribute, _)| attribute)
    }

    pub fn code(self) -> u32 {
        match self {
            Attribute::Unknown(code) => code,
            attribute => ATTRIBUTES
                .iter()
                .find(|(_, known, _)| *known == attribute)
                .map_or(0, |&(code, _, _)| code),
        }
    }

    /// Snake-case name, `unknown` for codes missing from the table
    pub fn name(self) -> &'static str {
        ATTRIBUTES
            .iter()
            .find(|(_, known, _)| *known == self)
            .map_or("unknown", |&(_, _, name)| name)
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Attribute::Unknown(code) => write!(f, "unknown({code})"),
            attribute => f.write_str(attribute.name()),
        }
    }
}

impl Serialize for Attribute {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Key format, stored in the `KEYFORMAT` block
///
/// Lists, in order, the attribute codes packed in every rendition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFormat {
    pub magic: FourCc,
    pub reserved: u32,
    pub identifiers: Vec<u32>,
}

static KEY_FORMAT_IDENTIFIER: Schema = Schema {
    name: "KeyFormatIdentifier",
    fields: &[("identifier", le(Kind::U32))],
};

static KEY_FORMAT: Schema = Schema {
    name: "KeyFormat",
    fields: &[
        ("magic", be(Kind::Bytes(4))),
        ("reserved", le(Kind::U32)),
        ("num_identifiers", le(Kind::U32)),
        (
            "identifiers",
            Field::Array {
                schema: &KEY_FORMAT_IDENTIFIER,
                count: "num_identifiers",
            },
        ),
    ],
};

impl KeyFormat {
    /// Attributes of the key format, in key order
    pub fn attributes(&self) -> impl Iterator<Item = Attribute> + '_ {
        self.identifiers.iter().map(|&code| Attribute::from_code(code))
    }

    /// Resolves an attribute identifier found in a facet against the key format
    pub fn resolve(&self, identifier: u16) -> Result<Attribute, KeyError> {
        let code = u32::from(identifier);
        if self.identifiers.contains(&code) {
            Ok(Attribute::from_code(code))
        } else {
            Err(KeyError::UnknownIdentifier(identifier))
        }
    }

    /// Unpacks a rendition key: one little-endian `u16` per identifier of the key format
    ///
    /// ## Errors
    /// [KeyError::FieldLengthMismatch] if the key is not exactly two bytes per identifier.
    pub fn decode_key(&self, key: &[u8]) -> Result<RenditionKey, KeyError> {
        let expected = self.identifiers.len() * 2;
        if key.len() != expected {
            return Err(KeyError::FieldLengthMismatch {
                expected,
                actual: key.len(),
            });
        }
        let values = key
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
        Ok(RenditionKey(self.attributes().zip(values).collect()))
    }
}

impl Decode for KeyFormat {
    fn schema() -> &'static Schema {
        &KEY_FORMAT
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        let identifiers = record
            .list("identifiers")?
            .iter()
            .map(|entry| entry.u32("identifier"))
            .collect::<Result<_, _>>()?;
        Ok(KeyFormat {
            magic: record.four_cc("magic")?,
            reserved: record.u32("reserved")?,
            identifiers,
        })
    }
}

/// Unpacked rendition key, in key format order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenditionKey(Vec<(Attribute, u16)>);

impl RenditionKey {
    /// Value of an attribute, if part of the key
    pub fn get(&self, attribute: Attribute) -> Option<u16> {
        self.0
            .iter()
            .find(|(known, _)| *known == attribute)
            .map(|&(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Attribute, u16)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for RenditionKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(self.0.iter().map(|(attribute, value)| (attribute, value)))
    }
}

/// Errors raised while matching keys and facets against the key format
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Rendition key is {actual} bytes long, expected {expected} for the key format")]
    FieldLengthMismatch { expected: usize, actual: usize },
    #[error("Attribute identifier {0} is not part of the key format")]
    UnknownIdentifier(u16),
}
