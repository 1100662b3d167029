//! Text and JSON lines renderings of CAR records

use std::io::Write;

use bom_car::CarError;
use bom_car::read::block_names;
use bom_car::wire::bom::BomStore;
use bom_car::wire::car::{CarHeader, ExtendedMetadata, Facet, KeyFormat, Rendition};
use serde_json::json;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    /// One JSON object per line, keyed by record type
    Json,
}

pub struct Dumper<W> {
    out: W,
    output: Output,
}

impl<W: Write> Dumper<W> {
    pub fn new(out: W, output: Output) -> Self {
        Dumper { out, output }
    }

    fn json_line(&mut self, value: serde_json::Value) -> Result<(), DumpError> {
        serde_json::to_writer(&mut self.out, &value)?;
        writeln!(self.out)?;
        Ok(())
    }

    /// Lists the table of contents
    pub fn blocks<R>(&mut self, store: &BomStore<R>) -> Result<(), DumpError> {
        for (name, &index) in store.table() {
            let pointer = store.block(index).ok();
            let known = block_names::is_known(name);
            match self.output {
                Output::Json => self.json_line(json!({ "block": {
                    "name": name,
                    "index": index,
                    "known": known,
                    "location": pointer,
                }}))?,
                Output::Text => {
                    match pointer {
                        Some(pointer) => write!(
                            self.out,
                            "Block {}: #{} at {:#x}, {} bytes",
                            name, index, pointer.offset, pointer.size
                        )?,
                        None => write!(self.out, "Block {}: #{} (missing)", name, index)?,
                    }
                    if known {
                        writeln!(self.out)?;
                    } else {
                        writeln!(self.out, " (unknown name)")?;
                    }
                }
            }
        }
        if self.output == Output::Text {
            writeln!(self.out)?;
        }
        Ok(())
    }

    pub fn header(&mut self, header: &CarHeader) -> Result<(), DumpError> {
        if self.output == Output::Json {
            return self.json_line(json!({ "header": header }));
        }
        let out = &mut self.out;
        writeln!(out, "Magic: {}", header.magic)?;
        writeln!(out, "UI version: {:x}", header.ui_version)?;
        writeln!(out, "Storage version: {:x}", header.storage_version)?;
        writeln!(out, "Storage Timestamp: {}", header.storage_timestamp)?;
        writeln!(out, "Rendition Count: {:x}", header.rendition_count)?;
        writeln!(out, "Creator: {}", header.file_creator)?;
        writeln!(out, "Other Creator: {}", header.other_creator)?;
        writeln!(out, "UUID: {}", header.uuid)?;
        writeln!(out, "Associated Checksum: {:x}", header.associated_checksum)?;
        writeln!(out, "Schema Version: {}", header.schema_version)?;
        writeln!(out, "Color space ID: {}", header.color_space_id)?;
        writeln!(out, "Key Semantics: {}", header.key_semantics)?;
        Ok(())
    }

    pub fn metadata(&mut self, metadata: &ExtendedMetadata) -> Result<(), DumpError> {
        match self.output {
            Output::Json => self.json_line(json!({ "metadata": metadata })),
            Output::Text => {
                writeln!(self.out, "\nExtended metadata: {}\n", metadata.contents)?;
                Ok(())
            }
        }
    }

    pub fn key_format(&mut self, key_format: &KeyFormat) -> Result<(), DumpError> {
        if self.output == Output::Json {
            let attributes: Vec<String> =
                key_format.attributes().map(|a| a.to_string()).collect();
            return self.json_line(json!({ "key_format": {
                "magic": key_format.magic,
                "identifiers": key_format.identifiers,
                "attributes": attributes,
            }}));
        }
        writeln!(self.out, "Key Format: {}", key_format.magic)?;
        writeln!(self.out, "Identifier Count: {}", key_format.identifiers.len())?;
        for attribute in key_format.attributes() {
            writeln!(
                self.out,
                "Identifier: {} ({})",
                attribute.name(),
                attribute.code()
            )?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    pub fn facet(&mut self, facet: &Facet) -> Result<(), DumpError> {
        if self.output == Output::Json {
            return self.json_line(json!({ "facet": facet }));
        }
        writeln!(self.out, "Facet: {}", facet.name)?;
        for (attribute, value) in &facet.attributes {
            writeln!(
                self.out,
                "[{:02}] {} = {}",
                attribute.code(),
                attribute.name(),
                value
            )?;
        }
        Ok(())
    }

    /// Dumps a rendition
    ///
    /// Undecodable slice lists are logged and left out; the rest of the rendition is still written.
    pub fn rendition(&mut self, rendition: &Rendition) -> Result<(), DumpError> {
        if self.output == Output::Json {
            return self.json_line(json!({ "rendition": rendition }));
        }
        let resizable = rendition.is_resizable();
        let out = &mut self.out;
        writeln!(out, "Rendition: {}", rendition.name)?;
        writeln!(out, "Width: {}", rendition.width)?;
        writeln!(out, "Height: {}", rendition.height)?;
        writeln!(out, "Scale: {:.6}", rendition.scale())?;
        writeln!(out, "Layout: {}", rendition.layout.code())?;
        writeln!(out, "Resizable: {}", u8::from(resizable))?;
        writeln!(out, "Payload size: {}", rendition.payload.len())?;
        if resizable {
            match rendition.slices() {
                Ok(slices) => {
                    for (i, slice) in slices.iter().enumerate() {
                        writeln!(
                            out,
                            "Slice {}: ({}, {}) {} x {}",
                            i, slice.x, slice.y, slice.width, slice.height
                        )?;
                    }
                }
                Err(e) => warn!("Skipping slices of rendition {}: {}", rendition.name, e),
            }
        }
        writeln!(out, "Resize mode: {}", rendition.resize_mode())?;
        writeln!(out, "Attributes:")?;
        for (attribute, value) in rendition.key.iter() {
            writeln!(
                out,
                "[{:02}] {} = {}",
                attribute.code(),
                attribute.name(),
                value
            )?;
        }
        writeln!(out)?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), DumpError> {
        self.out.flush()?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DumpError {
    #[error("{0}")]
    Car(#[from] CarError),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
