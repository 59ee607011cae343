use crate::bml_parser::{ParserSettings, ReadSeek};
use crate::err::{DeserializationError, DeserializationResult};
use crate::property_type::{PropertyTypeCode, PropertyTypeDescriptor, PropertyTypeLookup};
use crate::tag_tree::model::*;
use crate::tag_tree::{COLLECTION_MARKER, NODE_MARKER, TagKind};
use crate::utils::ByteCursor;

use log::{trace, warn};

/// A decode session over one byte source.
///
/// The deserializer owns the cursor for its whole lifetime, so the pointer registry it fills
/// while decoding always refers to offsets in the source it still holds. Resolution
/// ([`TagDeserializer::resolve_all`]) must run on the same session.
#[derive(Debug)]
pub struct TagDeserializer<R> {
    pub(super) cursor: ByteCursor<R>,
    pub(super) registry: PointerRegistry,
    pub(super) diagnostics: Vec<Diagnostic>,
    max_depth: usize,
    max_tags: Option<usize>,
    tags_read: usize,
}

impl<R: ReadSeek> TagDeserializer<R> {
    pub fn new(cursor: ByteCursor<R>) -> Self {
        Self::with_settings(cursor, &ParserSettings::default())
    }

    pub fn with_settings(cursor: ByteCursor<R>, settings: &ParserSettings) -> Self {
        TagDeserializer {
            cursor,
            registry: PointerRegistry::new(),
            diagnostics: Vec::new(),
            max_depth: settings.get_max_depth(),
            max_tags: settings.get_max_tags(),
            tags_read: 0,
        }
    }

    pub fn cursor(&self) -> &ByteCursor<R> {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut ByteCursor<R> {
        &mut self.cursor
    }

    pub fn registry(&self) -> &PointerRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Decodes the tag at the current cursor position, including all of its descendants.
    pub fn decode_tag(&mut self) -> DeserializationResult<TagNode> {
        self.read_tag(0)
    }

    /// Decodes the root tag, which must be a `Node`.
    pub fn decode_root(&mut self) -> DeserializationResult<Node> {
        let offset = self.cursor.position();
        let discriminator = self.cursor.u8_named("root tag discriminator")?;
        if discriminator != TagKind::NODE {
            return Err(DeserializationError::UnexpectedVariant {
                expected: "Node",
                found: discriminator,
                offset,
            });
        }

        self.count_tag(offset)?;
        self.read_node(0, offset)
    }

    /// Consumes the session, pairing the decoded root with everything collected while decoding.
    pub fn into_tree(self, root: Node) -> Tree {
        Tree {
            root,
            pointers: self.registry,
            diagnostics: self.diagnostics,
        }
    }

    pub(super) fn read_tag(&mut self, depth: usize) -> DeserializationResult<TagNode> {
        let offset = self.cursor.position();

        if depth > self.max_depth {
            return Err(DeserializationError::ResourceExhausted {
                what: "tag nesting depth",
                offset,
                limit: self.max_depth,
            });
        }

        let discriminator = self.cursor.u8_named("tag discriminator")?;
        let kind = TagKind::from_u8(discriminator).ok_or(
            DeserializationError::UnknownTagDiscriminator {
                value: discriminator,
                offset,
            },
        )?;

        self.count_tag(offset)?;
        trace!("Offset `0x{:08x}`: {:?} tag at depth {}", offset, kind, depth);

        let tag = match kind {
            TagKind::Prop => TagNode::Prop(self.read_prop(offset)?),
            TagKind::Node => TagNode::Node(self.read_node(depth, offset)?),
            TagKind::Collection => TagNode::Collection(self.read_collection(depth, offset)?),
            TagKind::Pointer => TagNode::Pointer(self.read_pointer(offset)?),
            TagKind::ThreeByte => TagNode::ThreeByte(self.read_three_byte()?),
        };

        Ok(tag)
    }

    fn count_tag(&mut self, offset: u64) -> DeserializationResult<()> {
        self.tags_read += 1;
        match self.max_tags {
            Some(limit) if self.tags_read > limit => Err(DeserializationError::ResourceExhausted {
                what: "total tag count",
                offset,
                limit,
            }),
            _ => Ok(()),
        }
    }

    fn read_prop(&mut self, offset: u64) -> DeserializationResult<Prop> {
        let type_code = PropertyTypeCode::from_bytes(self.cursor.array::<3>("property type")?);

        let lookup = PropertyTypeDescriptor::lookup(type_code);
        if let PropertyTypeLookup::Inferred(descriptor) = lookup {
            warn!(
                "Offset `0x{:08x}`: unknown property type `{}`, assuming a {} byte payload",
                offset, type_code, descriptor.payload_len
            );
            self.diagnostics.push(Diagnostic {
                offset,
                kind: DiagnosticKind::UnresolvedPropertyType {
                    type_code,
                    inferred_len: descriptor.payload_len,
                },
            });
        }

        let payload_len = lookup.descriptor().payload_len as usize;
        let payload = if payload_len <= 4 {
            PropPayload::Inline(self.cursor.uint_le_named(payload_len, "property payload")?)
        } else {
            PropPayload::OutOfLine(self.cursor.take_bytes(payload_len, "property payload")?)
        };

        Ok(Prop { type_code, payload })
    }

    pub(super) fn read_node(&mut self, depth: usize, offset: u64) -> DeserializationResult<Node> {
        let object_type = self.cursor.u16_named("node object type")?;

        let marker_offset = self.cursor.position();
        let marker = self.cursor.u16_named("node marker")?;
        if marker != NODE_MARKER {
            return Err(DeserializationError::InvalidFormat {
                what: "node marker",
                offset: marker_offset,
                expected: "0x1000",
                found: u32::from(marker),
            });
        }

        let byte_length = self.cursor.u16_named("node byte length")?;
        let child_count = self.cursor.u8_named("node child count")?;

        trace!(
            "Offset `0x{:08x}`: node 0x{:04X}, {} bytes, {} children",
            offset, object_type, byte_length, child_count
        );

        let mut children = Vec::with_capacity(usize::from(child_count));
        for _ in 0..child_count {
            children.push(self.read_tag(depth + 1)?);
        }

        Ok(Node {
            object_type,
            byte_length,
            children,
            source_offset: offset,
        })
    }

    pub(super) fn read_collection(
        &mut self,
        depth: usize,
        offset: u64,
    ) -> DeserializationResult<Collection> {
        let marker_offset = self.cursor.position();
        let marker = self.cursor.u8_named("collection marker")?;
        if marker != COLLECTION_MARKER {
            return Err(DeserializationError::InvalidFormat {
                what: "collection marker",
                offset: marker_offset,
                expected: "0x01",
                found: u32::from(marker),
            });
        }

        let item_type = self.cursor.u8_named("collection item type")?;
        let child_count = self.cursor.u16_named("collection child count")?;

        let mut children = Vec::with_capacity(usize::from(child_count).min(1024));
        for _ in 0..child_count {
            children.push(self.read_tag(depth + 1)?);
        }

        Ok(Collection {
            item_type,
            children,
            source_offset: offset,
        })
    }

    fn read_pointer(&mut self, offset: u64) -> DeserializationResult<Pointer> {
        let target_offset = self.cursor.u32_named("pointer target offset")?;
        let id = self.registry.register(target_offset, offset);

        trace!(
            "Offset `0x{:08x}`: pointer #{} to `0x{:08x}`",
            offset,
            id.index(),
            target_offset
        );

        Ok(Pointer { target_offset, id })
    }

    fn read_three_byte(&mut self) -> DeserializationResult<ThreeByte> {
        let kind_offset = self.cursor.position();
        let kind_byte = self.cursor.u8_named("three byte kind")?;
        let kind = ThreeByteKind::from_u8(kind_byte).ok_or(DeserializationError::InvalidFormat {
            what: "three byte kind",
            offset: kind_offset,
            expected: "one of 0x02, 0x03, 0x09",
            found: u32::from(kind_byte),
        })?;

        let value = self
            .cursor
            .uint_le_named(kind.payload_len(), "three byte value")?;

        Ok(ThreeByte { kind, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_env_logger_initialized;
    use crate::tests::fixtures::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn deserializer(bytes: &[u8]) -> TagDeserializer<Cursor<&[u8]>> {
        TagDeserializer::new(ByteCursor::new(Cursor::new(bytes)).unwrap())
    }

    #[test]
    fn test_decodes_button_node() {
        ensure_env_logger_initialized();
        let mut bytes = vec![0x16, 0x00, 0x0F, 0x00, 0x10, 0x10, 0x00, 0x02];
        bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x02, 0x2A, 0x00, 0x00, 0x00]);
        bytes.extend_from_slice(&[0x01, 0x01, 0x00, 0x03, 0x34, 0x12]);

        let mut de = deserializer(&bytes);
        let tag = de.decode_tag().unwrap();

        assert_eq!(
            tag,
            TagNode::Node(Node {
                object_type: 0x0F00,
                byte_length: 0x10,
                children: vec![
                    TagNode::Prop(Prop {
                        type_code: PropertyTypeCode(0x01, 0x00, 0x02),
                        payload: PropPayload::Inline(0x2A),
                    }),
                    TagNode::Prop(Prop {
                        type_code: PropertyTypeCode(0x01, 0x00, 0x03),
                        payload: PropPayload::Inline(0x1234),
                    }),
                ],
                source_offset: 0,
            })
        );
        assert!(de.diagnostics().is_empty());
        assert_eq!(de.cursor().position(), bytes.len() as u64);
    }

    #[test]
    fn test_decodes_three_byte_dword() {
        let bytes = [0x3B, 0x02, 0xAA, 0xBB, 0xCC, 0xDD];
        let tag = deserializer(&bytes).decode_tag().unwrap();

        assert_eq!(
            tag,
            TagNode::ThreeByte(ThreeByte {
                kind: ThreeByteKind::Dword,
                value: 0xDDCC_BBAA,
            })
        );
    }

    #[test]
    fn test_decodes_three_byte_short_kinds() {
        let tag = deserializer(&[0x3B, 0x09, 0x7F]).decode_tag().unwrap();
        assert_eq!(
            tag,
            TagNode::ThreeByte(ThreeByte {
                kind: ThreeByteKind::Byte,
                value: 0x7F,
            })
        );

        let tag = deserializer(&[0x3B, 0x03, 0x01, 0x02]).decode_tag().unwrap();
        assert_eq!(
            tag,
            TagNode::ThreeByte(ThreeByte {
                kind: ThreeByteKind::Word,
                value: 0x0201,
            })
        );
    }

    #[test]
    fn test_rejects_unknown_three_byte_kind() {
        let err = deserializer(&[0x3B, 0x05, 0x00]).decode_tag().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::InvalidFormat {
                what: "three byte kind",
                offset: 1,
                found: 0x05,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_bad_collection_marker_at_marker_offset() {
        let bytes = [0x18, 0x02, 0x00, 0x00, 0x00];
        let mut de = deserializer(&bytes);

        let err = de.decode_tag().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::InvalidFormat {
                what: "collection marker",
                offset: 1,
                found: 0x02,
                ..
            }
        ));
        assert_eq!(err.offset(), 1);
        assert_eq!(de.cursor().position(), 2);
    }

    #[test]
    fn test_rejects_bad_node_marker() {
        let bytes = [0x16, 0x00, 0x07, 0x00, 0x20, 0x08, 0x00, 0x00];
        let err = deserializer(&bytes).decode_tag().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::InvalidFormat {
                what: "node marker",
                offset: 3,
                found: 0x2000,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_discriminator() {
        let bytes = [0x16, 0x00, 0x07, 0x00, 0x10, 0x08, 0x00, 0x01, 0x55];
        let err = deserializer(&bytes).decode_tag().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::UnknownTagDiscriminator {
                value: 0x55,
                offset: 8
            }
        ));
    }

    #[test]
    fn test_truncated_child_is_fatal() {
        // Declares two children, only one is present.
        let bytes = [
            0x18, 0x01, 0x00, 0x02, 0x00, 0x3B, 0x09, 0x01, 0x3E, 0x10, 0x00,
        ];
        let err = deserializer(&bytes).decode_tag().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::Truncated {
                what: "pointer target offset",
                offset: 9,
                need: 4,
                have: 2,
            }
        ));
    }

    #[test]
    fn test_unknown_property_type_is_recoverable() {
        ensure_env_logger_initialized();
        let bytes = [
            0x18, 0x01, 0x00, 0x02, 0x00, // collection, 2 children
            0x01, 0x99, 0x00, 0x03, 0xEF, 0xBE, // unknown, width class 2
            0x3B, 0x09, 0x01,
        ];
        let mut de = deserializer(&bytes);
        let tag = de.decode_tag().unwrap();

        assert_eq!(tag.children().len(), 2);
        assert_eq!(
            tag.children()[0],
            TagNode::Prop(Prop {
                type_code: PropertyTypeCode(0x99, 0x00, 0x03),
                payload: PropPayload::Inline(0xBEEF),
            })
        );
        assert_eq!(
            de.diagnostics(),
            &[Diagnostic {
                offset: 5,
                kind: DiagnosticKind::UnresolvedPropertyType {
                    type_code: PropertyTypeCode(0x99, 0x00, 0x03),
                    inferred_len: 2,
                },
            }]
        );
    }

    #[test]
    fn test_out_of_line_payload() {
        let bytes = [0x01, 0x06, 0x00, 0x01, 1, 2, 3, 4, 5, 6];
        let mut de = deserializer(&bytes);
        let tag = de.decode_tag().unwrap();

        assert_eq!(
            tag,
            TagNode::Prop(Prop {
                type_code: PropertyTypeCode(0x06, 0x00, 0x01),
                payload: PropPayload::OutOfLine(vec![1, 2, 3, 4, 5, 6]),
            })
        );
        assert_eq!(de.diagnostics().len(), 1);
    }

    #[test]
    fn test_pointers_are_registered_in_discovery_order() {
        let bytes = [
            0x18, 0x01, 0x00, 0x02, 0x00, 0x3E, 0x20, 0x00, 0x00, 0x00, 0x3E, 0x10, 0x00, 0x00,
            0x00,
        ];
        let mut de = deserializer(&bytes);
        let tag = de.decode_tag().unwrap();

        let targets: Vec<u32> = de
            .registry()
            .entries()
            .iter()
            .map(|e| e.target_offset)
            .collect();
        assert_eq!(targets, vec![0x20, 0x10]);

        match &tag.children()[1] {
            TagNode::Pointer(p) => {
                assert_eq!(p.id.index(), 1);
                assert_eq!(de.registry().get(p.id).unwrap().source_offset, 10);
            }
            other => panic!("expected pointer, got {:?}", other),
        }
    }

    #[test]
    fn test_depth_ceiling() {
        let mut tag = TagNode::ThreeByte(ThreeByte {
            kind: ThreeByteKind::Byte,
            value: 0,
        });
        for _ in 0..10 {
            tag = TagNode::Collection(Collection {
                item_type: 0,
                children: vec![tag],
                source_offset: 0,
            });
        }
        let bytes = encode_tag(&tag);

        let settings = ParserSettings::new().max_depth(5);
        let mut de = TagDeserializer::with_settings(
            ByteCursor::new(Cursor::new(&bytes[..])).unwrap(),
            &settings,
        );
        let err = de.decode_tag().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::ResourceExhausted {
                what: "tag nesting depth",
                limit: 5,
                ..
            }
        ));

        let settings = ParserSettings::new().max_depth(10);
        let mut de = TagDeserializer::with_settings(
            ByteCursor::new(Cursor::new(&bytes[..])).unwrap(),
            &settings,
        );
        assert!(de.decode_tag().is_ok());
    }

    #[test]
    fn test_tag_budget() {
        let bytes = [
            0x18, 0x01, 0x00, 0x03, 0x00, 0x3B, 0x09, 0x01, 0x3B, 0x09, 0x02, 0x3B, 0x09, 0x03,
        ];
        let settings = ParserSettings::new().max_tags(Some(3));
        let mut de = TagDeserializer::with_settings(
            ByteCursor::new(Cursor::new(&bytes[..])).unwrap(),
            &settings,
        );

        let err = de.decode_tag().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::ResourceExhausted {
                what: "total tag count",
                offset: 11,
                limit: 3,
            }
        ));
    }

    #[test]
    fn test_decode_root_requires_node() {
        let bytes = [0x18, 0x01, 0x00, 0x00, 0x00];
        let err = deserializer(&bytes).decode_root().unwrap_err();
        assert!(matches!(
            err,
            DeserializationError::UnexpectedVariant {
                expected: "Node",
                found: 0x18,
                offset: 0,
            }
        ));
    }
}
