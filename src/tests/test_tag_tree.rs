use crate::tag_tree::*;
use crate::tests::fixtures::*;
use crate::utils::ByteCursor;
use crate::{BmlParser, PropertyTypeCode, ensure_env_logger_initialized};

use pretty_assertions::assert_eq;
use std::io::Cursor;

fn ribbon_like_tree() -> TagNode {
    node(
        0x1A00,
        vec![
            prop_u16(0x2713),
            node(
                0x0700,
                vec![
                    prop_u32(0xDEAD_BEEF),
                    TagNode::Prop(Prop {
                        type_code: PropertyTypeCode(0x01, 0x00, 0x04),
                        payload: PropPayload::Inline(0x7F),
                    }),
                    collection(
                        0x04,
                        vec![
                            node(0x0F00, vec![prop_u16(0x2712)]),
                            node(0x0600, vec![]),
                            TagNode::ThreeByte(ThreeByte {
                                kind: ThreeByteKind::Word,
                                value: 0x0102,
                            }),
                        ],
                    ),
                ],
            ),
            TagNode::Prop(Prop {
                type_code: PropertyTypeCode(0x05, 0x00, 0x00),
                payload: PropPayload::OutOfLine(vec![9, 8, 7, 6, 5]),
            }),
            TagNode::Pointer(Pointer {
                target_offset: 0x0400,
                id: PointerId(0),
            }),
        ],
    )
}

fn decode(bytes: &[u8]) -> (TagNode, TagDeserializer<Cursor<&[u8]>>) {
    let mut de = TagDeserializer::new(ByteCursor::new(Cursor::new(bytes)).unwrap());
    let tag = de.decode_tag().unwrap();
    (tag, de)
}

#[test]
fn test_decode_then_encode_reproduces_bytes() {
    ensure_env_logger_initialized();
    let bytes = encode_tag(&ribbon_like_tree());

    let (tag, de) = decode(&bytes);

    assert_eq!(encode_tag(&tag), bytes);
    assert_eq!(de.cursor().position(), bytes.len() as u64);
}

#[test]
fn test_children_match_declared_counts_and_consume_exact_bytes() {
    fn check(tag: &TagNode, bytes: &[u8]) {
        match tag {
            TagNode::Node(node) => {
                let at = node.source_offset as usize;
                assert_eq!(usize::from(bytes[at + 7]), node.children.len());
            }
            TagNode::Collection(collection) => {
                let at = collection.source_offset as usize;
                let count = u16::from_le_bytes([bytes[at + 3], bytes[at + 4]]);
                assert_eq!(usize::from(count), collection.children.len());
            }
            _ => {}
        }

        // Each child starts exactly where the previous sibling's encoding ends.
        let children = tag.children();
        for pair in children.windows(2) {
            if let (Some(first), Some(second)) = (start_of(&pair[0]), start_of(&pair[1])) {
                assert_eq!(first + encode_tag(&pair[0]).len() as u64, second);
            }
        }

        for child in children {
            check(child, bytes);
        }
    }

    fn start_of(tag: &TagNode) -> Option<u64> {
        match tag {
            TagNode::Node(node) => Some(node.source_offset),
            TagNode::Collection(collection) => Some(collection.source_offset),
            _ => None,
        }
    }

    let tree = collection(
        0x01,
        vec![
            node(0x0F00, vec![prop_u32(1)]),
            collection(0x02, vec![prop_u16(3), node(0x0600, vec![])]),
            node(0x0700, vec![prop_u16(2), prop_u16(3)]),
        ],
    );
    let bytes = encode_tag(&tree);
    let (tag, _) = decode(&bytes);

    check(&tag, &bytes);
}

#[test]
fn test_decodes_tab_with_two_props_without_diagnostics() {
    let mut bytes = vec![0x16, 0x00, 0x0F, 0x00, 0x10, 0x10, 0x00, 0x02];
    bytes.extend(encode_tag(&prop_u32(0x2712)));
    bytes.extend(encode_tag(&prop_u16(0x0001)));

    let (tag, de) = decode(&bytes);

    match tag {
        TagNode::Node(node) => {
            assert_eq!(node.object_type, 0x0F00);
            assert_eq!(node.byte_length, 0x10);
            assert_eq!(node.children.len(), 2);
        }
        other => panic!("expected node, got {:?}", other),
    }
    assert!(de.diagnostics().is_empty());
}

#[test]
fn test_every_reachable_pointer_is_resolved() {
    ensure_env_logger_initialized();
    let mut builder = sample_file();
    // A third level, and a second pointer to an already resolved target.
    builder.supplementary[1] = collection(0x04, vec![pointer_to(2), pointer_to(0)]);
    builder
        .supplementary
        .push(collection(0x04, vec![node(0x0F00, vec![prop_u16(1)])]));

    let file = BmlParser::from_buffer(builder.build()).parse().unwrap();
    let tree = &file.tree;

    let reachable = tree.reachable_pointers();
    assert_eq!(reachable.len(), 4);
    for pointer in &reachable {
        assert!(
            tree.resolved(pointer).is_some(),
            "pointer to `0x{:08x}` was not resolved",
            pointer.target_offset
        );
    }
    assert_eq!(tree.pointers.collections().len(), 3);
    assert_eq!(tree.pointers.len(), 4);
}
