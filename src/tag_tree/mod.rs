//! The recursively nested tag tree describing ribbon objects.
//!
//! The region starts with a short header (see [`TreeRegionHeader`]) followed by the root
//! `Node` tag. Collections stored elsewhere in the file are reached through `Pointer` tags and
//! decoded in a second pass (see [`TagDeserializer::resolve_all`]).

pub mod deserializer;
pub mod model;
mod resolver;

pub use self::deserializer::TagDeserializer;
pub use self::model::*;
pub use self::resolver::ResolutionStats;

use crate::bml_parser::ReadSeek;
use crate::err::{DeserializationError, DeserializationResult};
use crate::utils::ByteCursor;

use serde::Serialize;

/// Leading byte of every tag record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Prop,
    Node,
    Collection,
    Pointer,
    ThreeByte,
}

impl TagKind {
    pub const PROP: u8 = 0x01;
    pub const NODE: u8 = 0x16;
    pub const COLLECTION: u8 = 0x18;
    pub const POINTER: u8 = 0x3E;
    pub const THREE_BYTE: u8 = 0x3B;

    pub fn from_u8(byte: u8) -> Option<TagKind> {
        match byte {
            Self::PROP => Some(TagKind::Prop),
            Self::NODE => Some(TagKind::Node),
            Self::COLLECTION => Some(TagKind::Collection),
            Self::POINTER => Some(TagKind::Pointer),
            Self::THREE_BYTE => Some(TagKind::ThreeByte),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            TagKind::Prop => Self::PROP,
            TagKind::Node => Self::NODE,
            TagKind::Collection => Self::COLLECTION,
            TagKind::Pointer => Self::POINTER,
            TagKind::ThreeByte => Self::THREE_BYTE,
        }
    }
}

/// Fixed marker following a node's object type.
pub const NODE_MARKER: u16 = 0x1000;
/// Fixed marker following a collection discriminator.
pub const COLLECTION_MARKER: u8 = 0x01;

const REGION_TAG: u8 = 0x0D;
const REGION_VERSION: u16 = 0x0003;

/// `[0x0D][u16 0x0003][u32 supplementary_offset]`, immediately before the root node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TreeRegionHeader {
    /// Offset of the first tag of the root node.
    pub tree_start: u64,
    /// Absolute offset where the supplementary collections begin.
    pub supplementary_offset: u32,
}

impl TreeRegionHeader {
    pub fn from_cursor<R: ReadSeek>(cursor: &mut ByteCursor<R>) -> DeserializationResult<Self> {
        let offset = cursor.position();
        let tag = cursor.u8_named("tag tree region tag")?;
        if tag != REGION_TAG {
            return Err(DeserializationError::InvalidSectionHeader {
                section: "tag tree",
                offset,
                expected: REGION_TAG,
                found: tag,
            });
        }

        let version_offset = cursor.position();
        let version = cursor.u16_named("tag tree region version")?;
        if version != REGION_VERSION {
            return Err(DeserializationError::InvalidFormat {
                what: "tag tree region version",
                offset: version_offset,
                expected: "0x0003",
                found: u32::from(version),
            });
        }

        let supplementary_offset = cursor.u32_named("supplementary section offset")?;

        Ok(TreeRegionHeader {
            tree_start: cursor.position(),
            supplementary_offset,
        })
    }
}
