use std::collections::BTreeMap;
use std::io::{Read, Seek};

use serde::Serialize;

use crate::wire::schema::{Decode, Field, Kind, Record, Schema, SchemaError, be};

/// Magic literal opening every BOM container
pub const BOM_MAGIC: &[u8; 8] = b"BOMStore";

/// BOM container header
///
/// The header sits at offset 0 and is 32 bytes long, all fields big-endian:
/// - Bytes 0-7: Magic literal `BOMStore`
/// - Bytes 8-11: Version (u32)
/// - Bytes 12-15: Number of non-null blocks (u32)
/// - Bytes 16-23: Block index offset and size (u32, u32)
/// - Bytes 24-31: Table of contents offset and size (u32, u32)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BomHeader {
    pub magic: [u8; 8],
    pub version: u32,
    pub block_count: u32,
    pub index_offset: u32,
    pub index_size: u32,
    pub table_offset: u32,
    pub table_size: u32,
}

static BOM_HEADER: Schema = Schema {
    name: "BomHeader",
    fields: &[
        ("magic", be(Kind::Bytes(8))),
        ("version", be(Kind::U32)),
        ("block_count", be(Kind::U32)),
        ("index_offset", be(Kind::U32)),
        ("index_size", be(Kind::U32)),
        ("table_offset", be(Kind::U32)),
        ("table_size", be(Kind::U32)),
    ],
};

impl BomHeader {
    /// Does the header carry the `BOMStore` magic?
    pub fn has_valid_magic(&self) -> bool {
        &self.magic == BOM_MAGIC
    }

    /// End offset (exclusive) of the block index region
    pub fn index_end(&self) -> u64 {
        u64::from(self.index_offset) + u64::from(self.index_size)
    }

    /// End offset (exclusive) of the table of contents region
    pub fn table_end(&self) -> u64 {
        u64::from(self.table_offset) + u64::from(self.table_size)
    }
}

impl Decode for BomHeader {
    fn schema() -> &'static Schema {
        &BOM_HEADER
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(record.bytes("magic")?);
        Ok(BomHeader {
            magic,
            version: record.u32("version")?,
            block_count: record.u32("block_count")?,
            index_offset: record.u32("index_offset")?,
            index_size: record.u32("index_size")?,
            table_offset: record.u32("table_offset")?,
            table_size: record.u32("table_size")?,
        })
    }
}

/// Location of a block inside the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockPointer {
    /// Absolute offset of the block in the file
    pub offset: u32,
    /// Length of the block in bytes
    pub size: u32,
}

impl BlockPointer {
    /// End offset (exclusive) of the block
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

static BLOCK_POINTER: Schema = Schema {
    name: "BlockPointer",
    fields: &[("offset", be(Kind::U32)), ("size", be(Kind::U32))],
};

static BLOCK_INDEX: Schema = Schema {
    name: "BlockIndex",
    fields: &[
        ("count", be(Kind::U32)),
        (
            "blocks",
            Field::Array {
                schema: &BLOCK_POINTER,
                count: "count",
            },
        ),
    ],
};

static TOC_ENTRY: Schema = Schema {
    name: "TocEntry",
    fields: &[
        ("index", be(Kind::U32)),
        ("name_length", be(Kind::U8)),
        ("name", Field::Dynamic("name_length")),
    ],
};

static TABLE_OF_CONTENTS: Schema = Schema {
    name: "TableOfContents",
    fields: &[
        ("count", be(Kind::U32)),
        (
            "entries",
            Field::Array {
                schema: &TOC_ENTRY,
                count: "count",
            },
        ),
    ],
};

/// Reads the block index at the current position of `src`.
///
/// The position of a pointer in the returned list is its block index number.
pub fn read_block_index<R: Read + Seek>(src: &mut R) -> Result<Vec<BlockPointer>, SchemaError> {
    let record = BLOCK_INDEX.decode(src)?;
    record
        .list("blocks")?
        .iter()
        .map(|block| {
            Ok(BlockPointer {
                offset: block.u32("offset")?,
                size: block.u32("size")?,
            })
        })
        .collect()
}

/// Reads the table of contents (block name to block index number) at the current position of `src`.
pub fn read_table<R: Read + Seek>(src: &mut R) -> Result<BTreeMap<String, u32>, SchemaError> {
    let record = TABLE_OF_CONTENTS.decode(src)?;
    record
        .list("entries")?
        .iter()
        .map(|entry| Ok((entry.text("name")?, entry.u32("index")?)))
        .collect()
}
