use std::collections::BTreeMap;

use serde::Serialize;

use crate::wire::car::key_format::{Attribute, KeyError, KeyFormat};
use crate::wire::schema::{Decode, Field, Kind, Record, Schema, SchemaError, le};

/// Value of a `FACETKEYS` tree entry, keyed by the facet name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetValue {
    pub x: u16,
    pub y: u16,
    /// `(identifier, value)` pairs
    pub attributes: Vec<(u16, u16)>,
}

static FACET_ATTRIBUTE: Schema = Schema {
    name: "FacetAttribute",
    fields: &[("identifier", le(Kind::U16)), ("value", le(Kind::U16))],
};

static FACET_VALUE: Schema = Schema {
    name: "FacetValue",
    fields: &[
        ("x", le(Kind::U16)),
        ("y", le(Kind::U16)),
        ("attributes_count", le(Kind::U16)),
        (
            "attributes",
            Field::Array {
                schema: &FACET_ATTRIBUTE,
                count: "attributes_count",
            },
        ),
    ],
};

impl Decode for FacetValue {
    fn schema() -> &'static Schema {
        &FACET_VALUE
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        let attributes = record
            .list("attributes")?
            .iter()
            .map(|attribute| Ok((attribute.u16("identifier")?, attribute.u16("value")?)))
            .collect::<Result<_, SchemaError>>()?;
        Ok(FacetValue {
            x: record.u16("x")?,
            y: record.u16("y")?,
            attributes,
        })
    }
}

/// Named facet, with its attributes resolved against the key format
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub name: String,
    pub x: u16,
    pub y: u16,
    pub attributes: BTreeMap<Attribute, u16>,
}

impl Facet {
    /// Builds a facet from a tree entry
    ///
    /// ## Errors
    /// [KeyError::UnknownIdentifier] if an attribute identifier is not part of the key format.
    pub fn new(name: &[u8], value: FacetValue, key_format: &KeyFormat) -> Result<Self, KeyError> {
        let attributes = value
            .attributes
            .iter()
            .map(|&(identifier, value)| Ok((key_format.resolve(identifier)?, value)))
            .collect::<Result<_, KeyError>>()?;
        Ok(Facet {
            name: String::from_utf8_lossy(name).into_owned(),
            x: value.x,
            y: value.y,
            attributes,
        })
    }

    /// Value of an attribute, if the facet sets it
    pub fn get(&self, attribute: Attribute) -> Option<u16> {
        self.attributes.get(&attribute).copied()
    }
}
