use crate::object_type::ObjectType;
use crate::property_type::PropertyTypeCode;

use hashbrown::HashMap as FastMap;
use serde::Serialize;

/// A single decoded tag-tree record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag")]
pub enum TagNode {
    Prop(Prop),
    Node(Node),
    Collection(Collection),
    Pointer(Pointer),
    ThreeByte(ThreeByte),
}

impl TagNode {
    /// Child tags, for the variants that have any.
    pub fn children(&self) -> &[TagNode] {
        match self {
            TagNode::Node(node) => &node.children,
            TagNode::Collection(collection) => &collection.children,
            TagNode::Prop(_) | TagNode::Pointer(_) | TagNode::ThreeByte(_) => &[],
        }
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            TagNode::Prop(_) => "Prop",
            TagNode::Node(_) => "Node",
            TagNode::Collection(_) => "Collection",
            TagNode::Pointer(_) => "Pointer",
            TagNode::ThreeByte(_) => "ThreeByte",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PropPayload {
    /// Payloads of up to 4 bytes, zero-extended.
    Inline(u32),
    OutOfLine(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prop {
    pub type_code: PropertyTypeCode,
    pub payload: PropPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub object_type: u16,
    /// As declared in the stream. Not used to terminate decoding.
    pub byte_length: u16,
    pub children: Vec<TagNode>,
    pub source_offset: u64,
}

impl Node {
    pub fn object_type(&self) -> ObjectType {
        ObjectType::from_u16(self.object_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub item_type: u8,
    pub children: Vec<TagNode>,
    pub source_offset: u64,
}

/// Index of a pointer in its session's [`PointerRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PointerId(pub(crate) usize);

impl PointerId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A forward reference to a collection stored elsewhere in the file.
///
/// The resolved collection is held by the registry and looked up with [`Tree::resolved`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pointer {
    pub target_offset: u32,
    pub id: PointerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreeByteKind {
    /// `0x02`, 4 payload bytes.
    Dword,
    /// `0x03`, 2 payload bytes.
    Word,
    /// `0x09`, 1 payload byte.
    Byte,
}

impl ThreeByteKind {
    pub fn from_u8(byte: u8) -> Option<ThreeByteKind> {
        match byte {
            0x02 => Some(ThreeByteKind::Dword),
            0x03 => Some(ThreeByteKind::Word),
            0x09 => Some(ThreeByteKind::Byte),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            ThreeByteKind::Dword => 0x02,
            ThreeByteKind::Word => 0x03,
            ThreeByteKind::Byte => 0x09,
        }
    }

    pub fn payload_len(self) -> usize {
        match self {
            ThreeByteKind::Dword => 4,
            ThreeByteKind::Word => 2,
            ThreeByteKind::Byte => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreeByte {
    pub kind: ThreeByteKind,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointerEntry {
    pub target_offset: u32,
    /// Offset of the pointer's own discriminator byte.
    pub source_offset: u64,
    /// Index into [`PointerRegistry::collections`] once resolved.
    pub resolved: Option<usize>,
}

/// A collection decoded at a pointer target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCollection {
    pub target_offset: u32,
    /// The `u16` prefix stored before the collection. Informational only.
    pub length_prefix: u16,
    pub collection: Collection,
}

/// Every pointer discovered during one decode session, in discovery order.
///
/// Entries are only ever appended. Pointers sharing a target offset share one decoded
/// collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PointerRegistry {
    entries: Vec<PointerEntry>,
    collections: Vec<ResolvedCollection>,
    #[serde(skip)]
    by_target: FastMap<u32, usize, ahash::RandomState>,
}

impl PointerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, target_offset: u32, source_offset: u64) -> PointerId {
        let id = PointerId(self.entries.len());
        self.entries.push(PointerEntry {
            target_offset,
            source_offset,
            resolved: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: PointerId) -> Option<&PointerEntry> {
        self.entries.get(id.0)
    }

    pub fn entries(&self) -> &[PointerEntry] {
        &self.entries
    }

    pub fn collections(&self) -> &[ResolvedCollection] {
        &self.collections
    }

    pub fn unresolved_count(&self) -> usize {
        self.entries.iter().filter(|e| e.resolved.is_none()).count()
    }

    /// The collection a pointer resolved to, if resolution has reached it.
    pub fn resolved(&self, id: PointerId) -> Option<&ResolvedCollection> {
        let index = self.get(id)?.resolved?;
        self.collections.get(index)
    }

    pub(crate) fn collection_for_target(&self, target_offset: u32) -> Option<usize> {
        self.by_target.get(&target_offset).copied()
    }

    pub(crate) fn insert_collection(&mut self, resolved: ResolvedCollection) -> usize {
        let index = self.collections.len();
        self.by_target.insert(resolved.target_offset, index);
        self.collections.push(resolved);
        index
    }

    pub(crate) fn attach(&mut self, id: PointerId, collection_index: usize) {
        if let Some(entry) = self.entries.get_mut(id.0) {
            entry.resolved.get_or_insert(collection_index);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// A property type code missing from the catalog; decoding continued with a guessed length.
    UnresolvedPropertyType {
        type_code: PropertyTypeCode,
        inferred_len: u32,
    },
}

/// A recoverable condition observed while decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub offset: u64,
    pub kind: DiagnosticKind,
}

/// The decoded ribbon-object graph: the root node plus every pointer discovered while
/// decoding it and its supplementary collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tree {
    pub root: Node,
    pub pointers: PointerRegistry,
    pub diagnostics: Vec<Diagnostic>,
}

impl Tree {
    pub fn resolved(&self, pointer: &Pointer) -> Option<&Collection> {
        self.pointers
            .resolved(pointer.id)
            .map(|resolved| &resolved.collection)
    }

    /// All pointers reachable from the root, following resolved pointers into their
    /// collections. Each shared collection is walked once.
    pub fn reachable_pointers(&self) -> Vec<&Pointer> {
        let mut out = Vec::new();
        let mut visited = vec![false; self.pointers.collections().len()];
        let mut stack: Vec<&TagNode> = self.root.children.iter().rev().collect();

        while let Some(tag) = stack.pop() {
            if let TagNode::Pointer(pointer) = tag {
                out.push(pointer);

                let index = self.pointers.get(pointer.id).and_then(|e| e.resolved);
                if let Some(index) = index {
                    if !visited[index] {
                        visited[index] = true;
                        let collection = &self.pointers.collections()[index].collection;
                        stack.extend(collection.children.iter().rev());
                    }
                }
            }
            stack.extend(tag.children().iter().rev());
        }

        out
    }
}
