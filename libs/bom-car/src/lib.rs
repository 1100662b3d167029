//! bom-car is a Rust library for reading compiled asset catalogs (CAR files), the `Assets.car`
//! archives holding the images and resources of an application bundle.
//!
//! A CAR file is a BOM container: a self-indexing file whose named blocks hold fixed records (the
//! CAR header, the key format, ...) and ordered key/value trees (facets and renditions).
//!
//! The library is split in two layers:
//! - [wire] gives low-level access to the on-disk structures: a declarative record layout engine
//!   ([wire::schema]), the BOM container and its trees ([wire::bom]), and the CAR records
//!   ([wire::car]).
//! - [read] composes them into [CarFile], the main entry point.
//!
//! The library is read-only and does not interpret the image payloads.
//!
//! ## Usages
//!
//! ### List the renditions of a CAR file
//! ```rust,no_run
//! let mut car = bom_car::CarFile::open_path("Assets.car").unwrap();
//! println!("Storage version: {}", car.header().unwrap().storage_version);
//!
//! for rendition in car.renditions().unwrap() {
//!     let rendition = rendition.unwrap();
//!     println!(
//!         "{} ({}x{} @{}x, {})",
//!         rendition.name,
//!         rendition.width,
//!         rendition.height,
//!         rendition.scale(),
//!         rendition.layout
//!     );
//! }
//! ```
//!
//! ### Read any block of the container
//! ```rust,no_run
//! use bom_car::read::block_names;
//!
//! let mut car = bom_car::CarFile::open_path("Assets.car").unwrap();
//! let bitmap_keys = car.read_named(block_names::BITMAP_KEYS).unwrap();
//! println!("BITMAPKEYS: {} bytes", bitmap_keys.len());
//! ```

pub mod read;
pub mod wire;

pub use read::{CarError, CarFile};
