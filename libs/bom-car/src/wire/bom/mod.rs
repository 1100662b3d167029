//! BOM container related types and utilities
//!
//! A BOM container is a self-indexing file made of:
//! - a fixed [BomHeader] at offset 0,
//! - a block index: the list of `(offset, size)` pointers of every block, a block being referenced
//!   elsewhere by its position in that list,
//! - a table of contents mapping human-readable names (`CARHEADER`, `RENDITIONS`, ...) to block
//!   index numbers,
//! - the blocks themselves, anywhere in the file.
//!
//! [BomStore] parses the header, the block index and the table of contents once at open time, then
//! gives random access to any block by name or by number. Ordered collections stored as trees are
//! walked with [TreeWalker].
//!
//! ## Concurrency
//!
//! A store owns a single cursor over its byte source, so every read takes `&mut self`. To read the
//! same container from several threads, either serialize the accesses (e.g. with a mutex around
//! the store) or open one store per thread on independent handles of the same bytes.

mod header;
mod tree;

use std::collections::BTreeMap;
use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, warn};

use crate::wire::fourcc::FourCc;
use crate::wire::schema::{Decode, SchemaError};

pub use header::{BOM_MAGIC, BlockPointer, BomHeader, read_block_index, read_table};
pub use tree::{IndexEntry, TREE_MAGIC, TREE_VERSION, TreeNode, TreeRoot, TreeWalker};

/// Random-access reader over a BOM container
#[derive(Debug)]
pub struct BomStore<R> {
    /// Underlying byte source
    source: R,
    /// Total length of the byte source
    length: u64,
    header: BomHeader,
    blocks: Vec<BlockPointer>,
    table: BTreeMap<String, u32>,
}

impl<R: Read + Seek> BomStore<R> {
    /// Opens a BOM container
    ///
    /// This validates the header, then parses the block index and the table of contents.
    ///
    /// ## Arguments
    /// * `source` - A seekable byte source holding the container.
    /// * `length` - Total length of the byte source, in bytes.
    ///
    /// ## Errors
    /// - [BomError::InvalidContainer] if the magic is not `BOMStore`.
    /// - [BomError::TruncatedContainer] if the block index or the table of contents ends past `length`.
    pub fn open(mut source: R, length: u64) -> Result<Self, BomError> {
        source.seek(SeekFrom::Start(0))?;
        let header = BomHeader::decode(&mut source)?;
        if !header.has_valid_magic() {
            return Err(BomError::InvalidContainer(
                String::from_utf8_lossy(&header.magic).into_owned(),
            ));
        }
        for (region, end) in [("index", header.index_end()), ("table", header.table_end())] {
            if end > length {
                return Err(BomError::TruncatedContainer {
                    region,
                    end,
                    length,
                });
            }
        }

        source.seek(SeekFrom::Start(u64::from(header.index_offset)))?;
        let blocks = read_block_index(&mut source)?;
        source.seek(SeekFrom::Start(u64::from(header.table_offset)))?;
        let table = read_table(&mut source)?;

        for (name, &index) in &table {
            if index as usize >= blocks.len() {
                warn!(block_name = %name, index, "Table of contents entry points past the block index");
            }
        }
        debug!(
            version = header.version,
            blocks = blocks.len(),
            names = table.len(),
            "Opened BOM container"
        );

        Ok(BomStore {
            source,
            length,
            header,
            blocks,
            table,
        })
    }

    /// Reads the whole content of a block
    ///
    /// ## Errors
    /// - [BomError::UnknownBlock] if `index` is out of the block index bounds.
    /// - [BomError::TruncatedContainer] if the block ends past the end of the container.
    pub fn read_block(&mut self, index: u32) -> Result<Vec<u8>, BomError> {
        let pointer = self.block(index)?;
        if pointer.end() > self.length {
            return Err(BomError::TruncatedContainer {
                region: "block",
                end: pointer.end(),
                length: self.length,
            });
        }
        self.source.seek(SeekFrom::Start(u64::from(pointer.offset)))?;
        let mut data = vec![0u8; pointer.size as usize];
        self.source.read_exact(&mut data)?;
        Ok(data)
    }

    /// Reads the whole content of a named block
    ///
    /// ## Errors
    /// - [BomError::UnknownBlockName] if the table of contents has no such name.
    /// - Any error of [BomStore::read_block].
    pub fn read_named(&mut self, name: &str) -> Result<Vec<u8>, BomError> {
        let index = self.lookup(name)?;
        self.read_block(index)
    }

    /// Starts walking the tree whose root record is stored in the named block
    ///
    /// The root record is validated before any node is read.
    pub fn tree(&mut self, name: &str) -> Result<TreeWalker<'_, R>, BomError> {
        let index = self.lookup(name)?;
        self.tree_at(index)
    }

    /// Starts walking the tree whose root record is stored in block `index`
    pub fn tree_at(&mut self, index: u32) -> Result<TreeWalker<'_, R>, BomError> {
        let root = TreeRoot::decode_bytes(&self.read_block(index)?)?;
        root.validate()?;
        debug!(
            root = index,
            child = root.child,
            paths = root.path_count,
            "Walking tree"
        );
        Ok(TreeWalker::new(self, root.child))
    }
}

impl<R> BomStore<R> {
    /// Container header
    pub fn header(&self) -> &BomHeader {
        &self.header
    }

    /// Table of contents: block name to block index number
    pub fn table(&self) -> &BTreeMap<String, u32> {
        &self.table
    }

    /// Block index: the position of each pointer is its block index number
    pub fn block_index(&self) -> &[BlockPointer] {
        &self.blocks
    }

    /// Total length of the container, in bytes
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Resolves a block name to its block index number
    pub fn lookup(&self, name: &str) -> Result<u32, BomError> {
        self.table
            .get(name)
            .copied()
            .ok_or_else(|| BomError::UnknownBlockName(name.to_owned()))
    }

    /// Location of a block
    pub fn block(&self, index: u32) -> Result<BlockPointer, BomError> {
        self.blocks
            .get(index as usize)
            .copied()
            .ok_or(BomError::UnknownBlock {
                index,
                count: self.blocks.len(),
            })
    }

    /// Gives the byte source back
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Errors related to BOM container operations
#[derive(thiserror::Error, Debug)]
pub enum BomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid record: {0}")]
    Record(#[from] SchemaError),
    /// The container does not start with the `BOMStore` magic
    #[error("Invalid container magic {0:?}, expected \"BOMStore\"")]
    InvalidContainer(String),
    /// A region declared by the container ends past its actual length
    #[error("The {region} region ends at {end}, past the end of the container ({length} bytes)")]
    TruncatedContainer {
        region: &'static str,
        end: u64,
        length: u64,
    },
    #[error("No block named {0:?} in the table of contents")]
    UnknownBlockName(String),
    #[error("Block {index} is out of range ({count} blocks)")]
    UnknownBlock { index: u32, count: usize },
    /// The tree root record has an unexpected magic or version
    #[error("Invalid tree type (magic {magic}, version {version})")]
    InvalidTreeType { magic: FourCc, version: u32 },
    /// A non-leaf node is found where only a single redirection is supported
    #[error("Unsupported tree shape: non-leaf node {block} has {entries} entries")]
    UnsupportedTreeShape { block: u32, entries: usize },
    /// A forward link leads back to a node already walked
    #[error("Tree node {0} is linked twice")]
    TreeCycle(u32),
}
