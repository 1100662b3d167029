//! Read(er) utilities for CAR files
//!
//! [CarFile] is the entry point: it opens a BOM container, checks that it holds a supported CAR
//! archive, then gives on-demand access to the header, the extended metadata, the key format, and
//! lazily decoded facets and renditions.
//!
//! Records are not cached: every accessor re-reads the underlying blocks, except for the key
//! format, which is decoded once on first use.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::wire::bom::{BomError, BomStore, TreeWalker};
use crate::wire::car::{
    CarHeader, ExtendedMetadata, Facet, FacetValue, KeyError, KeyFormat, MIN_STORAGE_VERSION,
    Rendition,
};
use crate::wire::schema::{Decode, SchemaError};

/// Well-known block names of a CAR file
pub mod block_names {
    pub const CAR_HEADER: &str = "CARHEADER";
    pub const RENDITIONS: &str = "RENDITIONS";
    pub const FACET_KEYS: &str = "FACETKEYS";
    pub const KEY_FORMAT: &str = "KEYFORMAT";
    pub const EXTENDED_METADATA: &str = "EXTENDED_METADATA";
    pub const BITMAP_KEYS: &str = "BITMAPKEYS";
    pub const CAR_GLOBALS: &str = "CARGLOBALS";
    pub const EXTERNAL_KEYS: &str = "EXTERNAL_KEYS";
    pub const PART_INFO: &str = "PART_INFO";
    pub const ELEMENT_INFO: &str = "ELEMENT_INFO";
    pub const COLORS: &str = "COLORS";
    pub const FONTS: &str = "FONTS";
    pub const FONT_SIZES: &str = "FONTSIZES";
    pub const GLYPHS: &str = "GLYPHS";
    pub const BEZELS: &str = "BEZELS";

    pub const ALL: [&str; 15] = [
        CAR_HEADER,
        RENDITIONS,
        FACET_KEYS,
        KEY_FORMAT,
        EXTENDED_METADATA,
        BITMAP_KEYS,
        CAR_GLOBALS,
        EXTERNAL_KEYS,
        PART_INFO,
        ELEMENT_INFO,
        COLORS,
        FONTS,
        FONT_SIZES,
        GLYPHS,
        BEZELS,
    ];

    /// Is `name` one of the well-known block names?
    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

/// Compiled asset catalog, opened for reading
#[derive(Debug)]
pub struct CarFile<R> {
    store: BomStore<R>,
    /// Decoded on first use
    key_format: Option<KeyFormat>,
}

impl CarFile<BufReader<File>> {
    /// Opens a CAR file from the filesystem
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self, CarError> {
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        CarFile::open(BufReader::new(file), length)
    }
}

impl<R: Read + Seek> CarFile<R> {
    /// Opens a CAR file
    ///
    /// ## Arguments
    /// * `source` - A seekable byte source holding the file.
    /// * `length` - Total length of the byte source, in bytes.
    ///
    /// ## Errors
    /// - [CarError::InvalidCarFile] if the container magic is wrong, or if the CAR header has a
    ///   wrong magic or a storage version older than [MIN_STORAGE_VERSION].
    /// - [CarError::Bom] if the container is malformed (truncated regions, missing `CARHEADER`).
    pub fn open(source: R, length: u64) -> Result<Self, CarError> {
        let store = BomStore::open(source, length).map_err(|e| match e {
            BomError::InvalidContainer(magic) => {
                CarError::InvalidCarFile(format!("not a BOM container (magic {magic:?})"))
            }
            e => CarError::Bom(e),
        })?;
        let mut car = CarFile {
            store,
            key_format: None,
        };

        let header = car.header()?;
        if !header.is_supported() {
            return Err(CarError::InvalidCarFile(format!(
                "magic {}, storage version {} (expected RATC, version {} or later)",
                header.magic, header.storage_version, MIN_STORAGE_VERSION
            )));
        }
        debug!(
            storage_version = header.storage_version,
            renditions = header.rendition_count,
            "Opened CAR file"
        );
        Ok(car)
    }

    /// Reads the CAR header
    pub fn header(&mut self) -> Result<CarHeader, CarError> {
        let bytes = self.store.read_named(block_names::CAR_HEADER)?;
        Ok(CarHeader::decode_bytes(&bytes)?)
    }

    /// Reads the extended metadata
    pub fn metadata(&mut self) -> Result<ExtendedMetadata, CarError> {
        let bytes = self.store.read_named(block_names::EXTENDED_METADATA)?;
        Ok(ExtendedMetadata::decode_bytes(&bytes)?)
    }

    /// Key format of the file, decoded on first call then cached
    pub fn key_format(&mut self) -> Result<&KeyFormat, CarError> {
        self.parts().map(|(_, key_format)| key_format)
    }

    /// Store and key format, borrowed together
    fn parts(&mut self) -> Result<(&mut BomStore<R>, &KeyFormat), CarError> {
        let key_format = match self.key_format.take() {
            Some(key_format) => key_format,
            None => {
                let bytes = self.store.read_named(block_names::KEY_FORMAT)?;
                KeyFormat::decode_bytes(&bytes)?
            }
        };
        Ok((&mut self.store, self.key_format.insert(key_format)))
    }

    /// Lazily walks the facets, in on-disk order
    ///
    /// A facet that fails to decode is reported in place, and the walk goes on.
    pub fn facets(&mut self) -> Result<Facets<'_, R>, CarError> {
        let (store, key_format) = self.parts()?;
        Ok(Facets {
            pairs: store.tree(block_names::FACET_KEYS)?,
            key_format,
        })
    }

    /// Lazily walks the renditions, in on-disk order
    ///
    /// A rendition that fails to decode is reported in place, and the walk goes on.
    pub fn renditions(&mut self) -> Result<Renditions<'_, R>, CarError> {
        let (store, key_format) = self.parts()?;
        Ok(Renditions {
            pairs: store.tree(block_names::RENDITIONS)?,
            key_format,
        })
    }

    /// Raw content of a named block
    pub fn read_named(&mut self, name: &str) -> Result<Vec<u8>, CarError> {
        Ok(self.store.read_named(name)?)
    }

    /// Raw content of a block, by block index number
    pub fn read_block(&mut self, index: u32) -> Result<Vec<u8>, CarError> {
        Ok(self.store.read_block(index)?)
    }
}

impl<R> CarFile<R> {
    /// Underlying BOM container
    pub fn store(&self) -> &BomStore<R> {
        &self.store
    }

    /// Gives the byte source back
    pub fn into_inner(self) -> R {
        self.store.into_inner()
    }
}

/// Iterator over the facets of a CAR file
#[derive(Debug)]
pub struct Facets<'a, R> {
    pairs: TreeWalker<'a, R>,
    key_format: &'a KeyFormat,
}

impl<R: Read + Seek> Iterator for Facets<'_, R> {
    type Item = Result<Facet, CarError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = match self.pairs.next()? {
            Ok(pair) => pair,
            Err(e) => return Some(Err(e.into())),
        };
        Some(
            FacetValue::decode_bytes(&value)
                .map_err(CarError::from)
                .and_then(|value| Ok(Facet::new(&key, value, self.key_format)?)),
        )
    }
}

/// Iterator over the renditions of a CAR file
#[derive(Debug)]
pub struct Renditions<'a, R> {
    pairs: TreeWalker<'a, R>,
    key_format: &'a KeyFormat,
}

impl<R: Read + Seek> Iterator for Renditions<'_, R> {
    type Item = Result<Rendition, CarError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = match self.pairs.next()? {
            Ok(pair) => pair,
            Err(e) => return Some(Err(e.into())),
        };
        let decode = || -> Result<Rendition, CarError> {
            let mut rendition = Rendition::decode_bytes(&value)?;
            rendition.key = self.key_format.decode_key(&key)?;
            Ok(rendition)
        };
        Some(decode())
    }
}

/// Errors that can occur while reading CAR files with [CarFile]
#[derive(thiserror::Error, Debug)]
pub enum CarError {
    #[error("Invalid CAR file: {0}")]
    InvalidCarFile(String),
    #[error("Container error: {0}")]
    Bom(#[from] BomError),
    #[error("Invalid record: {0}")]
    Schema(#[from] SchemaError),
    /// A packed rendition key does not match the key format
    #[error("Rendition key is {actual} bytes long, expected {expected} for the key format")]
    FieldLengthMismatch { expected: usize, actual: usize },
    /// A facet references an attribute missing from the key format
    #[error("Attribute identifier {0} is not part of the key format")]
    UnknownIdentifier(u16),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KeyError> for CarError {
    fn from(error: KeyError) -> Self {
        match error {
            KeyError::FieldLengthMismatch { expected, actual } => {
                CarError::FieldLengthMismatch { expected, actual }
            }
            KeyError::UnknownIdentifier(identifier) => CarError::UnknownIdentifier(identifier),
        }
    }
}
