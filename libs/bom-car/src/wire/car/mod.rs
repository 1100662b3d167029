//! CAR records
//!
//! A compiled asset catalog is a BOM container whose named blocks and trees hold the records
//! below. Unlike the container structures, CAR records are little-endian.
//!
//! | Block               | Content                                                  |
//! |---------------------|----------------------------------------------------------|
//! | `CARHEADER`         | [CarHeader]                                              |
//! | `EXTENDED_METADATA` | [ExtendedMetadata]                                       |
//! | `KEYFORMAT`         | [KeyFormat]                                              |
//! | `FACETKEYS`         | Tree: facet name to [FacetValue]                         |
//! | `RENDITIONS`        | Tree: packed rendition key to [Rendition]                |

mod facet;
mod header;
mod info;
mod key_format;
mod metadata;
mod rendition;

pub use facet::{Facet, FacetValue};
pub use header::{CAR_MAGIC, CarHeader, MIN_STORAGE_VERSION};
pub use info::{
    BitmapInfo, BytesPerRow, Composition, InfoKind, InfoRecord, InfoVariant, Metric, Reference,
    Slice, Uti,
};
pub use key_format::{Attribute, KeyError, KeyFormat, RenditionKey};
pub use metadata::ExtendedMetadata;
pub use rendition::{
    RENDITION_MAGIC, RawPayload, Rendition, RenditionFlags, RenditionLayout, ResizeMode,
};
