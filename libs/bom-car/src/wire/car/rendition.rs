use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::wire::car::info::{INFO_RECORD, InfoKind, InfoRecord, InfoVariant, Slice};
use crate::wire::car::key_format::RenditionKey;
use crate::wire::fourcc::FourCc;
use crate::wire::schema::{
    Decode, Extent, Field, Kind, Record, Schema, SchemaError, le, terminated,
};

/// Magic of a rendition, once read (stored reversed as `ISTC`)
pub const RENDITION_MAGIC: FourCc = FourCc::new(*b"CTSI");

/// Rendition, the value of a `RENDITIONS` tree entry
///
/// The fixed part is 184 bytes long, all fields little-endian:
/// - Bytes 0-7: Magic `CTSI` (stored reversed), version (u32)
/// - Bytes 8-11: Flags (u8) then 3 reserved bytes
/// - Bytes 12-23: Width, height and scale factor in hundredths (u32)
/// - Bytes 24-27: Pixel format (stored reversed)
/// - Bytes 28-35: Color space (u8), 3 reserved bytes, modification date (u32)
/// - Bytes 36-39: Layout (u16), reserved (u16)
/// - Bytes 40-167: Name, NUL terminated
/// - Bytes 168-183: Info length, bitmap count, reserved, payload size (u32)
///
/// It is followed by `info_len` bytes of [InfoRecord], then `payload_size` bytes of payload.
#[derive(Debug, Clone)]
pub struct Rendition {
    pub magic: FourCc,
    pub version: u32,
    pub flags: RenditionFlags,
    pub width: u32,
    pub height: u32,
    /// Scale factor, in hundredths
    pub scale_factor: u32,
    pub pixel_format: FourCc,
    pub color_space_id: u8,
    pub modification_date: u32,
    pub layout: RenditionLayout,
    pub name: String,
    pub bitmap_count: u32,
    pub info: Vec<InfoRecord>,
    pub payload: Vec<u8>,
    /// Unpacked key of the tree entry, empty until resolved against the key format
    pub key: RenditionKey,
}

static RENDITION_FLAGS: Schema = Schema {
    name: "RenditionFlags",
    fields: &[("flags", le(Kind::U8)), ("reserved", le(Kind::Bytes(3)))],
};

static RENDITION: Schema = Schema {
    name: "Rendition",
    fields: &[
        ("magic", le(Kind::Bytes(4))),
        ("version", le(Kind::U32)),
        ("flags", Field::Nested(&RENDITION_FLAGS)),
        ("width", le(Kind::U32)),
        ("height", le(Kind::U32)),
        ("scale_factor", le(Kind::U32)),
        ("pixel_format", le(Kind::Bytes(4))),
        ("color_space_id", le(Kind::U8)),
        ("reserved", le(Kind::Bytes(3))),
        ("modification_date", le(Kind::U32)),
        ("layout", le(Kind::U16)),
        ("reserved", le(Kind::U16)),
        ("name", terminated(0, 128)),
        ("info_len", le(Kind::U32)),
        ("bitmap_count", le(Kind::U32)),
        ("reserved", le(Kind::U32)),
        ("payload_size", le(Kind::U32)),
        (
            "info",
            Field::Bounded {
                schema: &INFO_RECORD,
                extent: Extent::Field("info_len"),
            },
        ),
        ("content", Field::Dynamic("payload_size")),
    ],
};

impl Rendition {
    /// Scale factor (e.g. `2.0` for @2x)
    pub fn scale(&self) -> f32 {
        self.scale_factor as f32 / 100.0
    }

    /// Is the rendition a three-part image carrying several slice lists?
    ///
    /// Slice lists are counted by magic, their content is not decoded.
    pub fn is_resizable(&self) -> bool {
        let slice_lists = self
            .info
            .iter()
            .filter(|record| record.kind() == Some(InfoKind::Slices))
            .count();
        (20..=25).contains(&self.layout.code()) && slice_lists > 1
    }

    /// All slices of the slice list records, in order
    pub fn slices(&self) -> Result<Vec<Slice>, SchemaError> {
        let mut slices = Vec::new();
        for record in &self.info {
            if let InfoVariant::Slices(list) = record.parsed()? {
                slices.extend_from_slice(list);
            }
        }
        Ok(slices)
    }

    pub fn resize_mode(&self) -> ResizeMode {
        self.layout.resize_mode()
    }

    /// Payload record, `None` when the rendition has no payload
    pub fn raw(&self) -> Result<Option<RawPayload>, SchemaError> {
        if self.payload.is_empty() {
            return Ok(None);
        }
        RawPayload::decode_bytes(&self.payload).map(Some)
    }
}

impl Decode for Rendition {
    fn schema() -> &'static Schema {
        &RENDITION
    }

    fn from_record(mut record: Record) -> Result<Self, SchemaError> {
        let info = record
            .take_list("info")?
            .into_iter()
            .map(InfoRecord::from_record)
            .collect::<Result<_, _>>()?;
        Ok(Rendition {
            magic: record.four_cc("magic")?,
            version: record.u32("version")?,
            flags: RenditionFlags(record.record("flags")?.u8("flags")?),
            width: record.u32("width")?,
            height: record.u32("height")?,
            scale_factor: record.u32("scale_factor")?,
            pixel_format: record.four_cc("pixel_format")?,
            color_space_id: record.u8("color_space_id")?,
            modification_date: record.u32("modification_date")?,
            layout: RenditionLayout::from_code(record.u16("layout")?),
            name: record.text("name")?,
            bitmap_count: record.u32("bitmap_count")?,
            info,
            payload: record.take_bytes("content")?,
            key: RenditionKey::default(),
        })
    }
}

impl Serialize for Rendition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Rendition", 16)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("magic", &self.magic)?;
        state.serialize_field("version", &self.version)?;
        state.serialize_field("flags", &self.flags)?;
        state.serialize_field("width", &self.width)?;
        state.serialize_field("height", &self.height)?;
        state.serialize_field("scale", &self.scale())?;
        state.serialize_field("pixel_format", &self.pixel_format)?;
        state.serialize_field("color_space_id", &self.color_space_id)?;
        state.serialize_field("modification_date", &self.modification_date)?;
        state.serialize_field("layout", &self.layout)?;
        state.serialize_field("resizable", &self.is_resizable())?;
        state.serialize_field("resize_mode", &self.resize_mode())?;
        state.serialize_field("payload_size", &self.payload.len())?;
        state.serialize_field("info", &self.info)?;
        state.serialize_field("attributes", &self.key)?;
        state.end()
    }
}

bitfield::bitfield! {
    /// Rendition flags
    pub struct RenditionFlags(u8);
    pub is_header_flagged_fpo, _: 0;
    pub is_excluded_from_contrast_filter, _: 1;
    pub is_vector_based, _: 2;
    pub is_opaque, _: 3;
    pub u8, bitmap_encoding, _: 7, 4;
}

impl RenditionFlags {
    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl core::fmt::Debug for RenditionFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "RenditionFlags({:#04x})", self.0)
    }
}

impl Clone for RenditionFlags {
    fn clone(&self) -> Self {
        *self
    }
}

impl Copy for RenditionFlags {}

impl PartialEq for RenditionFlags {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for RenditionFlags {}

impl Serialize for RenditionFlags {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("RenditionFlags", 5)?;
        state.serialize_field("is_header_flagged_fpo", &self.is_header_flagged_fpo())?;
        state.serialize_field(
            "is_excluded_from_contrast_filter",
            &self.is_excluded_from_contrast_filter(),
        )?;
        state.serialize_field("is_vector_based", &self.is_vector_based())?;
        state.serialize_field("is_opaque", &self.is_opaque())?;
        state.serialize_field("bitmap_encoding", &self.bitmap_encoding())?;
        state.end()
    }
}

/// How a rendition is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenditionLayout {
    Gradient,
    Effect,
    OnePartFixedSize,
    OnePartTile,
    OnePartScale,
    ThreePartHorizontalTile,
    ThreePartHorizontalScale,
    ThreePartHorizontalUniform,
    ThreePartVerticalTile,
    ThreePartVerticalScale,
    ThreePartVerticalUniform,
    NinePartTile,
    NinePartScale,
    NinePartHorizontalUniformVerticalScale,
    NinePartHorizontalScaleVerticalUniform,
    NinePartEdgesOnly,
    SixPart,
    AnimationFilmstrip,
    RawData,
    ExternalLink,
    LayerStack,
    InternalLink,
    AssetPack,
    Unknown(u16),
}

const LAYOUTS: [(u16, RenditionLayout, &str); 23] = [
    (6, RenditionLayout::Gradient, "gradient"),
    (7, RenditionLayout::Effect, "effect"),
    (10, RenditionLayout::OnePartFixedSize, "one_part_fixed_size"),
    (11, RenditionLayout::OnePartTile, "one_part_tile"),
    (12, RenditionLayout::OnePartScale, "one_part_scale"),
    (20, RenditionLayout::ThreePartHorizontalTile, "three_part_horizontal_tile"),
    (21, RenditionLayout::ThreePartHorizontalScale, "three_part_horizontal_scale"),
    (22, RenditionLayout::ThreePartHorizontalUniform, "three_part_horizontal_uniform"),
    (23, RenditionLayout::ThreePartVerticalTile, "three_part_vertical_tile"),
    (24, RenditionLayout::ThreePartVerticalScale, "three_part_vertical_scale"),
    (25, RenditionLayout::ThreePartVerticalUniform, "three_part_vertical_uniform"),
    (30, RenditionLayout::NinePartTile, "nine_part_tile"),
    (31, RenditionLayout::NinePartScale, "nine_part_scale"),
    (
        32,
        RenditionLayout::NinePartHorizontalUniformVerticalScale,
        "nine_part_horizontal_uniform_vertical_scale",
    ),
    (
        33,
        RenditionLayout::NinePartHorizontalScaleVerticalUniform,
        "nine_part_horizontal_scale_vertical_uniform",
    ),
    (34, RenditionLayout::NinePartEdgesOnly, "nine_part_edges_only"),
    (40, RenditionLayout::SixPart, "six_part"),
    (50, RenditionLayout::AnimationFilmstrip, "animation_filmstrip"),
    // Non-image renditions
    (1000, RenditionLayout::RawData, "raw_data"),
    (1001, RenditionLayout::ExternalLink, "external_link"),
    (1002, RenditionLayout::LayerStack, "layer_stack"),
    (1003, RenditionLayout::InternalLink, "internal_link"),
    (1004, RenditionLayout::AssetPack, "asset_pack"),
];

impl RenditionLayout {
    pub fn from_code(code: u16) -> Self {
        LAYOUTS
            .iter()
            .find(|(known, _, _)| *known == code)
            .map_or(RenditionLayout::Unknown(code), |&(_, layout, _)| layout)
    }

    pub fn code(self) -> u16 {
        match self {
            RenditionLayout::Unknown(code) => code,
            layout => LAYOUTS
                .iter()
                .find(|(_, known, _)| *known == layout)
                .map_or(0, |&(code, _, _)| code),
        }
    }

    /// Snake-case name, `unknown` for codes missing from the table
    pub fn name(self) -> &'static str {
        LAYOUTS
            .iter()
            .find(|(_, known, _)| *known == self)
            .map_or("unknown", |&(_, _, name)| name)
    }

    pub fn resize_mode(self) -> ResizeMode {
        use RenditionLayout::*;
        match self {
            OnePartTile | ThreePartHorizontalTile | ThreePartVerticalTile | NinePartTile => {
                ResizeMode::Tile
            }
            OnePartScale | ThreePartHorizontalScale | ThreePartVerticalScale | NinePartScale => {
                ResizeMode::Scale
            }
            NinePartHorizontalUniformVerticalScale => ResizeMode::HorizontalUniformVerticalScale,
            NinePartHorizontalScaleVerticalUniform => ResizeMode::HorizontalScaleVerticalUniform,
            _ => ResizeMode::FixedSize,
        }
    }
}

impl std::fmt::Display for RenditionLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for RenditionLayout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("RenditionLayout", 2)?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("name", self.name())?;
        state.end()
    }
}

/// How a rendition is stretched to fill a larger area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    FixedSize,
    Tile,
    Scale,
    HorizontalUniformVerticalScale,
    HorizontalScaleVerticalUniform,
}

impl std::fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ResizeMode::FixedSize => "Fixed Size",
            ResizeMode::Tile => "Tile",
            ResizeMode::Scale => "Scale",
            ResizeMode::HorizontalUniformVerticalScale => "Horizontal Uniform; Vertical Scale",
            ResizeMode::HorizontalScaleVerticalUniform => "Horizontal Scale; Vertical Uniform",
        })
    }
}

impl Serialize for ResizeMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Payload of a rendition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    pub magic: FourCc,
    pub reserved: u32,
    pub length: u32,
    pub data: Vec<u8>,
}

static RAW_PAYLOAD: Schema = Schema {
    name: "RawPayload",
    fields: &[
        ("magic", le(Kind::Bytes(4))),
        ("reserved", le(Kind::U32)),
        ("length", le(Kind::U32)),
        ("binary", Field::Dynamic("length")),
    ],
};

impl Decode for RawPayload {
    fn schema() -> &'static Schema {
        &RAW_PAYLOAD
    }

    fn from_record(mut record: Record) -> Result<Self, SchemaError> {
        Ok(RawPayload {
            magic: record.four_cc("magic")?,
            reserved: record.u32("reserved")?,
            length: record.u32("length")?,
            data: record.take_bytes("binary")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::testing::{RenditionFixture, info_record, slices};

    fn decode(fixture: RenditionFixture) -> Rendition {
        Rendition::decode_bytes(&fixture.bytes()).unwrap()
    }

    #[test]
    fn test_rendition_deserialization() {
        let rendition = decode(RenditionFixture {
            flags: 0b0010_1001,
            info: vec![info_record(1007, &64u32.to_le_bytes())],
            ..Default::default()
        });
        assert_eq!(rendition.magic, RENDITION_MAGIC);
        assert!(rendition.pixel_format == "ARGB");
        assert_eq!(rendition.name, "icon.png");
        assert_eq!((rendition.width, rendition.height), (16, 16));
        assert_eq!(rendition.scale(), 2.0);
        assert_eq!(rendition.color_space_id, 3);
        assert_eq!(rendition.layout, RenditionLayout::OnePartFixedSize);
        assert_eq!(rendition.bitmap_count, 1);
        assert_eq!(rendition.info.len(), 1);
        assert!(rendition.payload.is_empty());
        assert!(rendition.key.is_empty());

        assert!(rendition.flags.is_header_flagged_fpo());
        assert!(!rendition.flags.is_excluded_from_contrast_filter());
        assert!(!rendition.flags.is_vector_based());
        assert!(rendition.flags.is_opaque());
        assert_eq!(rendition.flags.bitmap_encoding(), 2);
        assert_eq!(rendition.flags.bits(), 0b0010_1001);
    }

    #[test]
    fn test_fixed_part_is_184_bytes() {
        let bytes = RenditionFixture::default().bytes();
        assert_eq!(bytes.len(), 184);
        let mut cursor = std::io::Cursor::new(bytes);
        Rendition::decode(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 184);
    }

    #[test]
    fn test_info_records_follow_byte_budget() {
        let rendition = decode(RenditionFixture {
            info: vec![
                info_record(1001, &slices(&[[0, 0, 4, 16]])),
                info_record(9999, &[0xAA; 5]),
                info_record(1006, &1u32.to_le_bytes()),
            ],
            payload: vec![0xCC; 3],
            ..Default::default()
        });
        let magics: Vec<u32> = rendition.info.iter().map(|record| record.magic).collect();
        assert_eq!(magics, vec![1001, 9999, 1006]);
        assert_eq!(rendition.info[1].parsed().unwrap(), &InfoVariant::Unrecognized);
        assert_eq!(rendition.payload, vec![0xCC; 3]);
    }

    #[test]
    fn test_info_overrunning_byte_budget() {
        let mut bytes = RenditionFixture {
            info: vec![info_record(1007, &64u32.to_le_bytes())],
            payload: vec![0; 8],
            ..Default::default()
        }
        .bytes();
        // Declare one byte less than the 12 bytes of the info record
        bytes[168..172].copy_from_slice(&11u32.to_le_bytes());
        assert!(matches!(
            Rendition::decode_bytes(&bytes),
            Err(SchemaError::ArrayOverrun {
                field: "info",
                expected: 11,
                consumed: 12
            })
        ));
    }

    #[test]
    fn test_resizable_three_part_rendition() {
        let slice = info_record(1001, &slices(&[[0, 0, 4, 16]]));
        let rendition = decode(RenditionFixture {
            layout: 22,
            info: vec![slice.clone(), slice.clone()],
            ..Default::default()
        });
        assert_eq!(rendition.layout, RenditionLayout::ThreePartHorizontalUniform);
        assert!(rendition.is_resizable());
        assert_eq!(rendition.slices().unwrap().len(), 2);

        let rendition = decode(RenditionFixture {
            layout: 22,
            info: vec![slice.clone()],
            ..Default::default()
        });
        assert!(!rendition.is_resizable());

        let rendition = decode(RenditionFixture {
            layout: 19,
            info: vec![slice.clone(), slice.clone(), slice],
            ..Default::default()
        });
        assert_eq!(rendition.layout, RenditionLayout::Unknown(19));
        assert!(!rendition.is_resizable());
    }

    #[test]
    fn test_layout_table() {
        assert_eq!(RenditionLayout::from_code(1004), RenditionLayout::AssetPack);
        assert_eq!(RenditionLayout::from_code(13).name(), "unknown");
        assert_eq!(RenditionLayout::Unknown(13).code(), 13);
        for (code, layout, name) in LAYOUTS {
            assert_eq!(RenditionLayout::from_code(code), layout);
            assert_eq!(layout.code(), code);
            assert_eq!(layout.to_string(), name);
        }
    }

    #[test]
    fn test_resize_modes() {
        let mode = |code| RenditionLayout::from_code(code).resize_mode().to_string();
        assert_eq!(mode(11), "Tile");
        assert_eq!(mode(23), "Tile");
        assert_eq!(mode(31), "Scale");
        assert_eq!(mode(32), "Horizontal Uniform; Vertical Scale");
        assert_eq!(mode(33), "Horizontal Scale; Vertical Uniform");
        assert_eq!(mode(10), "Fixed Size");
        assert_eq!(mode(22), "Fixed Size");
        assert_eq!(mode(999), "Fixed Size");
    }

    #[test]
    fn test_raw_payload() {
        let rendition = decode(RenditionFixture::default());
        assert_eq!(rendition.raw().unwrap(), None);

        let mut payload = b"MLEC".to_vec();
        payload.extend_from_slice(&0u32.to_le_bytes());
        payload.extend_from_slice(&3u32.to_le_bytes());
        payload.extend_from_slice(b"abc");
        let rendition = decode(RenditionFixture {
            payload,
            ..Default::default()
        });
        let raw = rendition.raw().unwrap().unwrap();
        assert!(raw.magic == "CELM");
        assert_eq!(raw.length, 3);
        assert_eq!(raw.data, b"abc");
    }

    #[test]
    fn test_truncated_payload() {
        let mut bytes = RenditionFixture {
            payload: vec![0; 16],
            ..Default::default()
        }
        .bytes();
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            Rendition::decode_bytes(&bytes),
            Err(SchemaError::FieldLengthMismatch {
                field: "content",
                expected: 16,
                available: 12
            })
        ));
    }
}
