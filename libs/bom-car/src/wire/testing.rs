//! In-memory fixtures: BOM containers and CAR records assembled byte by byte.

use std::io::Cursor;

use crate::wire::bom::{BlockPointer, BomStore};

enum Entry {
    Data(Vec<u8>),
    Pointer(BlockPointer),
}

/// Assembles a BOM container: header, blocks, block index, then table of contents.
///
/// Block 0 is the null block, as in files produced by the platform tools.
pub struct BomBuilder {
    magic: [u8; 8],
    blocks: Vec<Entry>,
    names: Vec<(String, u32)>,
}

impl BomBuilder {
    pub fn new() -> Self {
        BomBuilder {
            magic: *b"BOMStore",
            blocks: vec![Entry::Data(Vec::new())],
            names: Vec::new(),
        }
    }

    pub fn magic(&mut self, magic: &[u8; 8]) {
        self.magic = *magic;
    }

    /// Adds an anonymous block, returning its block index number
    pub fn block(&mut self, data: Vec<u8>) -> u32 {
        self.blocks.push(Entry::Data(data));
        (self.blocks.len() - 1) as u32
    }

    /// Reserves a block number, to be filled with [BomBuilder::set_block]
    pub fn reserve(&mut self) -> u32 {
        self.block(Vec::new())
    }

    pub fn set_block(&mut self, index: u32, data: Vec<u8>) {
        self.blocks[index as usize] = Entry::Data(data);
    }

    /// Adds a raw pointer to the block index, with no data behind it
    pub fn pointer(&mut self, pointer: BlockPointer) -> u32 {
        self.blocks.push(Entry::Pointer(pointer));
        (self.blocks.len() - 1) as u32
    }

    /// Adds a block and registers it in the table of contents
    pub fn named(&mut self, name: &str, data: Vec<u8>) -> u32 {
        let index = self.block(data);
        self.name(name, index);
        index
    }

    pub fn name(&mut self, name: &str, index: u32) {
        self.names.push((name.to_owned(), index));
    }

    /// Adds a tree holding `pairs`, at most `per_leaf` pairs per leaf, reached through a
    /// single-entry non-leaf node. Returns the block number of the tree root record.
    pub fn tree(&mut self, name: &str, pairs: &[(Vec<u8>, Vec<u8>)], per_leaf: usize) -> u32 {
        let entries: Vec<(u32, u32)> = pairs
            .iter()
            .map(|(key, value)| {
                let key = self.block(key.clone());
                let value = self.block(value.clone());
                (value, key)
            })
            .collect();
        let chunks: Vec<&[(u32, u32)]> = if entries.is_empty() {
            vec![&entries[..]]
        } else {
            entries.chunks(per_leaf).collect()
        };
        let leaves: Vec<u32> = chunks.iter().map(|_| self.reserve()).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let forward = leaves.get(i + 1).copied().unwrap_or(0);
            let backward = if i == 0 { 0 } else { leaves[i - 1] };
            self.set_block(leaves[i], tree_node(true, forward, backward, chunk));
        }
        let first = self.block(tree_node(false, 0, 0, &[(leaves[0], 0)]));
        self.named(name, tree_root(b"tree", 1, first))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; 32];
        let mut pointers = Vec::with_capacity(self.blocks.len());
        for entry in &self.blocks {
            match entry {
                Entry::Data(data) if data.is_empty() => {
                    pointers.push(BlockPointer { offset: 0, size: 0 })
                }
                Entry::Data(data) => {
                    pointers.push(BlockPointer {
                        offset: out.len() as u32,
                        size: data.len() as u32,
                    });
                    out.extend_from_slice(data);
                }
                Entry::Pointer(pointer) => pointers.push(*pointer),
            }
        }

        let index_offset = out.len();
        out.extend_from_slice(&(pointers.len() as u32).to_be_bytes());
        for pointer in &pointers {
            out.extend_from_slice(&pointer.offset.to_be_bytes());
            out.extend_from_slice(&pointer.size.to_be_bytes());
        }
        let index_size = out.len() - index_offset;

        let table_offset = out.len();
        out.extend_from_slice(&(self.names.len() as u32).to_be_bytes());
        for (name, index) in &self.names {
            out.extend_from_slice(&index.to_be_bytes());
            out.push(name.len() as u8);
            out.extend_from_slice(name.as_bytes());
        }
        let table_size = out.len() - table_offset;

        let block_count = pointers.iter().filter(|p| p.size > 0).count();
        let mut header = self.magic.to_vec();
        for field in [
            1,
            block_count,
            index_offset,
            index_size,
            table_offset,
            table_size,
        ] {
            header.extend_from_slice(&(field as u32).to_be_bytes());
        }
        out[..32].copy_from_slice(&header);
        out
    }

    pub fn open(&self) -> BomStore<Cursor<Vec<u8>>> {
        let bytes = self.build();
        let length = bytes.len() as u64;
        BomStore::open(Cursor::new(bytes), length).unwrap()
    }
}

pub fn tree_root(magic: &[u8; 4], version: u32, child: u32) -> Vec<u8> {
    let mut out = magic.to_vec();
    for field in [version, child, 4096, 1] {
        out.extend_from_slice(&field.to_be_bytes());
    }
    out.push(0);
    out
}

/// Tree node; entries are `(value_index, key_index)` pairs
pub fn tree_node(is_leaf: bool, forward: u32, backward: u32, entries: &[(u32, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&u16::from(is_leaf).to_be_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_be_bytes());
    out.extend_from_slice(&forward.to_be_bytes());
    out.extend_from_slice(&backward.to_be_bytes());
    for (value, key) in entries {
        out.extend_from_slice(&value.to_be_bytes());
        out.extend_from_slice(&key.to_be_bytes());
    }
    out
}

/// Text padded to `width` bytes, terminator included
pub fn padded(text: &str, terminator: u8, width: usize) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.push(terminator);
    out.resize(width.max(out.len()), 0);
    out
}

pub fn car_header(storage_version: u32) -> Vec<u8> {
    let mut out = b"RATC".to_vec();
    for field in [0x2D9u32, storage_version, 1_600_000_000, 2] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    out.extend(padded("@(#)PROGRAM:CoreThemeDefinition", b'\n', 128));
    out.extend(padded("actool-1234", 0, 256));
    out.extend(0u8..16);
    for field in [0xDEADBEEFu32, 2, 1, 2] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    out
}

pub fn extended_metadata(contents: &str, creator: &str) -> Vec<u8> {
    let mut out = b"META".to_vec();
    out.extend(padded(contents, 0, 768));
    out.extend(padded(creator, b'\n', 256));
    out
}

pub fn key_format(identifiers: &[u32]) -> Vec<u8> {
    let mut out = b"tmfk".to_vec();
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(identifiers.len() as u32).to_le_bytes());
    for identifier in identifiers {
        out.extend_from_slice(&identifier.to_le_bytes());
    }
    out
}

/// Packed rendition key: one little-endian `u16` per key format identifier
pub fn rendition_key(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

pub fn facet_value(x: u16, y: u16, attributes: &[(u16, u16)]) -> Vec<u8> {
    let mut out = Vec::new();
    for field in [x, y, attributes.len() as u16] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    for (identifier, value) in attributes {
        out.extend_from_slice(&identifier.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn info_record(magic: u32, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(content);
    out
}

/// Content of a slice list info record
pub fn slices(slices: &[[u32; 4]]) -> Vec<u8> {
    let mut out = (slices.len() as u32).to_le_bytes().to_vec();
    for slice in slices {
        for field in slice {
            out.extend_from_slice(&field.to_le_bytes());
        }
    }
    out
}

/// Rendition value, with the fields that matter for tests
pub struct RenditionFixture {
    pub name: &'static str,
    pub flags: u8,
    pub width: u32,
    pub height: u32,
    pub scale_factor: u32,
    pub layout: u16,
    pub info: Vec<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Default for RenditionFixture {
    fn default() -> Self {
        RenditionFixture {
            name: "icon.png",
            flags: 0,
            width: 16,
            height: 16,
            scale_factor: 200,
            layout: 10,
            info: Vec::new(),
            payload: Vec::new(),
        }
    }
}

impl RenditionFixture {
    pub fn bytes(&self) -> Vec<u8> {
        let info: Vec<u8> = self.info.concat();
        // Four-character codes are stored reversed
        let mut out = b"ISTC".to_vec();
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&[self.flags, 0, 0, 0]);
        for field in [self.width, self.height, self.scale_factor] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(b"BGRA");
        out.extend_from_slice(&[3, 0, 0, 0]);
        out.extend_from_slice(&1_600_000_000u32.to_le_bytes());
        out.extend_from_slice(&self.layout.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend(padded(self.name, 0, 128));
        for field in [info.len() as u32, 1, 0, self.payload.len() as u32] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend(info);
        out.extend_from_slice(&self.payload);
        out
    }
}
