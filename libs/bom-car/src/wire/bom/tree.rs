//! # Ordered key/value trees
//!
//! BOM containers store ordered collections (facets, renditions, ...) as trees of blocks.
//! A named block holds the [TreeRoot] record, whose `child` designates the first node of the tree.
//! Nodes ([TreeNode]) hold a list of [IndexEntry]; each entry references two other blocks of the
//! container: the key bytes and the value bytes.
//!
//! Only shallow trees are supported: the first node is either a leaf, or a non-leaf node with a
//! single entry pointing to the first leaf. Leaves are then chained through their `forward` link
//! until a zero link ends the chain.
//!
//! All fields of those records are big-endian.

use std::collections::HashSet;
use std::io::{Read, Seek};

use serde::Serialize;
use tracing::trace;

use crate::wire::bom::{BomError, BomStore};
use crate::wire::fourcc::FourCc;
use crate::wire::schema::{Decode, Field, Kind, Record, Schema, SchemaError, be};

/// Magic of a tree root record
pub const TREE_MAGIC: FourCc = FourCc::new(*b"tree");
/// Only supported tree version
pub const TREE_VERSION: u32 = 1;

/// Tree root record, stored in a named block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeRoot {
    pub magic: FourCc,
    pub version: u32,
    /// Block index number of the first node
    pub child: u32,
    pub block_size: u32,
    pub path_count: u32,
    pub unknown: i8,
}

static TREE_ROOT: Schema = Schema {
    name: "TreeRoot",
    fields: &[
        ("magic", be(Kind::Bytes(4))),
        ("version", be(Kind::U32)),
        ("child", be(Kind::U32)),
        ("block_size", be(Kind::U32)),
        ("path_count", be(Kind::U32)),
        ("unknown", be(Kind::I8)),
    ],
};

impl TreeRoot {
    /// Checks the magic and version of the record
    pub fn validate(&self) -> Result<(), BomError> {
        if self.magic != TREE_MAGIC || self.version != TREE_VERSION {
            return Err(BomError::InvalidTreeType {
                magic: self.magic,
                version: self.version,
            });
        }
        Ok(())
    }
}

impl Decode for TreeRoot {
    fn schema() -> &'static Schema {
        &TREE_ROOT
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        Ok(TreeRoot {
            magic: record.four_cc("magic")?,
            version: record.u32("version")?,
            child: record.u32("child")?,
            block_size: record.u32("block_size")?,
            path_count: record.u32("path_count")?,
            unknown: record.signed("unknown")? as i8,
        })
    }
}

/// Tree node entry: two block index numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub value_index: u32,
    pub key_index: u32,
}

static INDEX_ENTRY: Schema = Schema {
    name: "IndexEntry",
    fields: &[("value_index", be(Kind::U32)), ("key_index", be(Kind::U32))],
};

/// Tree node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub is_leaf: bool,
    /// Next node in iteration order (0 = none)
    pub forward: u32,
    /// Previous node, unused by traversal
    pub backward: u32,
    pub entries: Vec<IndexEntry>,
}

static TREE_NODE: Schema = Schema {
    name: "TreeNode",
    fields: &[
        ("is_leaf", be(Kind::U16)),
        ("count", be(Kind::U16)),
        ("forward", be(Kind::U32)),
        ("backward", be(Kind::U32)),
        (
            "entries",
            Field::Array {
                schema: &INDEX_ENTRY,
                count: "count",
            },
        ),
    ],
};

impl Decode for TreeNode {
    fn schema() -> &'static Schema {
        &TREE_NODE
    }

    fn from_record(record: Record) -> Result<Self, SchemaError> {
        let entries = record
            .list("entries")?
            .iter()
            .map(|entry| {
                Ok(IndexEntry {
                    value_index: entry.u32("value_index")?,
                    key_index: entry.u32("key_index")?,
                })
            })
            .collect::<Result<_, SchemaError>>()?;
        Ok(TreeNode {
            is_leaf: record.u16("is_leaf")? != 0,
            forward: record.u32("forward")?,
            backward: record.u32("backward")?,
            entries,
        })
    }
}

/// Lazy walk over the key/value pairs of a tree, in on-disk order
///
/// The walker borrows the store for its whole lifetime, since every step seeks the underlying
/// byte source. It cannot be restarted; open a new one with [BomStore::tree].
///
/// A failure to read a key or a value is reported for that pair only, and the walk goes on
/// with the next entry. A failure to load a node ends the walk.
#[derive(Debug)]
pub struct TreeWalker<'a, R> {
    store: &'a mut BomStore<R>,
    /// First node, not loaded yet
    first: Option<u32>,
    /// Current leaf and position of the next entry to yield
    leaf: Option<TreeNode>,
    position: usize,
    visited: HashSet<u32>,
    done: bool,
}

impl<'a, R: Read + Seek> TreeWalker<'a, R> {
    /// Creates a walker starting at `child`, the first node designated by a tree root
    pub fn new(store: &'a mut BomStore<R>, child: u32) -> Self {
        TreeWalker {
            store,
            first: Some(child),
            leaf: None,
            position: 0,
            visited: HashSet::new(),
            done: false,
        }
    }

    fn load(&mut self, block: u32) -> Result<TreeNode, BomError> {
        if !self.visited.insert(block) {
            return Err(BomError::TreeCycle(block));
        }
        let node = TreeNode::decode_bytes(&self.store.read_block(block)?)?;
        trace!(
            block,
            is_leaf = node.is_leaf,
            entries = node.entries.len(),
            forward = node.forward,
            "Loaded tree node"
        );
        Ok(node)
    }

    fn load_leaf(&mut self, block: u32) -> Result<TreeNode, BomError> {
        let node = self.load(block)?;
        if !node.is_leaf {
            return Err(BomError::UnsupportedTreeShape {
                block,
                entries: node.entries.len(),
            });
        }
        Ok(node)
    }

    /// Loads the first leaf, following the single-entry redirection of a non-leaf first node
    fn load_first(&mut self, block: u32) -> Result<TreeNode, BomError> {
        let node = self.load(block)?;
        if node.is_leaf {
            return Ok(node);
        }
        match node.entries.as_slice() {
            [entry] => self.load_leaf(entry.value_index),
            entries => Err(BomError::UnsupportedTreeShape {
                block,
                entries: entries.len(),
            }),
        }
    }

    fn read_pair(&mut self, entry: IndexEntry) -> Result<(Vec<u8>, Vec<u8>), BomError> {
        let key = self.store.read_block(entry.key_index)?;
        let value = self.store.read_block(entry.value_index)?;
        Ok((key, value))
    }

    fn fail<T>(&mut self, error: BomError) -> Option<Result<T, BomError>> {
        self.done = true;
        self.leaf = None;
        Some(Err(error))
    }
}

impl<R: Read + Seek> Iterator for TreeWalker<'_, R> {
    type Item = Result<(Vec<u8>, Vec<u8>), BomError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(first) = self.first.take() {
            match self.load_first(first) {
                Ok(leaf) => self.leaf = Some(leaf),
                Err(e) => return self.fail(e),
            }
        }
        loop {
            let leaf = self.leaf.as_ref()?;
            if let Some(&entry) = leaf.entries.get(self.position) {
                self.position += 1;
                return Some(self.read_pair(entry));
            }

            let forward = leaf.forward;
            if forward == 0 {
                self.done = true;
                self.leaf = None;
                return None;
            }
            match self.load_leaf(forward) {
                Ok(leaf) => {
                    self.leaf = Some(leaf);
                    self.position = 0;
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}
