use serde::Serialize;

use crate::wire::fourcc::FourCc;
use crate::wire::schema::{Decode, Kind, Record, Schema, SchemaError, be, le, terminated};

/// Magic of the CAR header
pub const CAR_MAGIC: FourCc = FourCc::new(*b"RATC");
/// Oldest storage version this crate reads
pub const MIN_STORAGE_VERSION: u32 = 8;

/// CAR header, stored in the `CARHEADER` block
///
/// The record is 436 bytes long:
/// - Bytes 0-3: Magic `RATC` (stored as is)
/// - Bytes 4-19: UI version, storage version, storage timestamp, rendition count (u32, Little Endian)
/// - Bytes 20-147: File creator, newline terminated
/// - Bytes 148-403: Other creator, NUL terminated
/// - Bytes 404-419: UUID
/// - Bytes 420-435: Associated checksum, schema version, color space, key semantics (u32, Little Endian)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarHeader {
    pub magic: FourCc,
    pub ui_version: u32,
    pub storage_version: u32,
    pub storage_timestamp: u32,
    pub rendition_count: u32,
    pub file_creator: String,
    pub other_creator: String,
    /// Hex-encoded, in on-disk byte order
    pub uuid: String,
    pub associated_checksum: u32,
    pub schema_version: u32,
    pub color_space_id: u32,
    pub key_semantics: u32,
}

static CAR_HEADER: Schema = Schema {
    name: "CarHeader",
    fields: &[
        ("magic", be(Kind::Bytes(4))),
        ("ui_version", le(Kind::U32)),
        ("storage_version", le(Kind::U32)),
        ("storage_timestamp", le(Kind::U32)),
        ("rendition_count", le(Kind::U32)),
        ("file_creator", terminated(b'\n', 128)),
        ("other_creator", terminated(0, 256)),
        ("uuid", be(Kind::Bytes(16))),
        ("associated_checksum", le(Kind::U32)),
        ("schema_version", le(Kind::U32)),
        ("color_space_id", le(Kind::U32)),
        ("key_semantics", le(Kind::U32)),
    ],
};

impl CarHeader {
    /// Is this a CAR header this crate can read?
    pub fn is_supported(&self) -> bool {
        self.magic == CAR_MAGIC && self.storage_version >= MIN_STORAGE_VERSION
    }
}

impl Decode for CarHeader {
    fn schema() -> &'static Schema {
        &CAR_HEADER
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(CarHeader {
            magic: record.four_cc("magic")?,
            ui_version: record.u32("ui_version")?,
            storage_version: record.u32("storage_version")?,
            storage_timestamp: record.u32("storage_timestamp")?,
            rendition_count: record.u32("rendition_count")?,
            file_creator: record.text("file_creator")?,
            other_creator: record.text("other_creator")?,
            uuid: hex::encode(record.bytes("uuid")?),
            associated_checksum: record.u32("associated_checksum")?,
            schema_version: record.u32("schema_version")?,
            color_space_id: record.u32("color_space_id")?,
            key_semantics: record.u32("key_semantics")?,
        })
    }
}
