use serde::Serialize;

use crate::wire::fourcc::FourCc;
use crate::wire::schema::{Decode, Kind, Record, Schema, SchemaError, be, terminated};

/// Extended metadata, stored in the `EXTENDED_METADATA` block
///
/// - Bytes 0-3: Magic (stored as is)
/// - Bytes 4-771: Thinning arguments, NUL terminated
/// - Bytes 772-1027: Deployment platform and tool version, newline terminated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedMetadata {
    pub magic: FourCc,
    pub contents: String,
    pub creator: String,
}

static EXTENDED_METADATA: Schema = Schema {
    name: "ExtendedMetadata",
    fields: &[
        ("magic", be(Kind::Bytes(4))),
        ("contents", terminated(0, 768)),
        ("creator", terminated(b'\n', 256)),
    ],
};

impl Decode for ExtendedMetadata {
    fn schema() -> &'static Schema {
        &EXTENDED_METADATA
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(ExtendedMetadata {
            magic: record.four_cc("magic")?,
            contents: record.text("contents")?,
            creator: record.text("creator")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::testing::extended_metadata;

    #[test]
    fn test_extended_metadata_deserialization() {
        let bytes = extended_metadata("thinning", "macosx 14.0 actool");
        assert_eq!(bytes.len(), 1028);
        let metadata = ExtendedMetadata::decode_bytes(&bytes).unwrap();
        assert!(metadata.magic == "META");
        assert_eq!(metadata.contents, "thinning");
        assert_eq!(metadata.creator, "macosx 14.0 actool");
    }
}
