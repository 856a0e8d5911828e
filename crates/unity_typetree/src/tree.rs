//! Arena representation of type schemas.

use md5::{Digest, Md5};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Index of a node within its [`TypeTree`] arena.
pub type NodeId = usize;

/// One field-shape description inside a [`TypeTree`].
///
/// A node with `size >= 0` and no children is a primitive leaf. A node named `Array` or
/// `TypelessData` always has exactly two children, `size` and `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeNode {
    /// Type name, e.g. `int`, `string`, `GameObject`
    pub type_name: String,
    /// Field name, e.g. `m_Name`
    pub field_name: String,
    /// Byte size of the field, -1 for composites
    pub size: i32,
    /// Declaration index among siblings
    pub index: u32,
    /// Whether the node is a collection
    pub is_array: bool,
    /// Schema revision counter of the declaring class
    pub version: i32,
    /// Bit flags, see [`TypeNode::FORCE_ALIGN`]
    pub meta_flags: u32,
    /// Depth of the node, root is 0
    pub level: u8,
    /// Arena index of the parent node
    pub parent: Option<NodeId>,
    /// Arena indices of the children, in declaration order
    pub children: Vec<NodeId>,
}

impl TypeNode {
    /// Meta flag requiring 4-byte alignment padding after the field's value.
    pub const FORCE_ALIGN: u32 = 0x4000;

    /// New unattached node; `level` and `parent` are assigned by [`TypeTree::push_child`].
    pub fn new(type_name: impl Into<String>, field_name: impl Into<String>, size: i32) -> Self {
        TypeNode {
            type_name: type_name.into(),
            field_name: field_name.into(),
            size,
            index: 0,
            is_array: false,
            version: 1,
            meta_flags: 0,
            level: 0,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Whether 4-byte alignment padding must follow this field's value.
    pub fn force_align(&self) -> bool {
        self.meta_flags & Self::FORCE_ALIGN != 0
    }

    /// Whether the node is a primitive leaf.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty() && self.size >= 0
    }
}

/// A single class's field-shape tree, stored as an arena indexed by [`NodeId`].
///
/// Nodes are pushed in depth-first declaration order, so two trees describing the same shape
/// compare equal structurally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeTree {
    nodes: Vec<TypeNode>,
}

impl TypeTree {
    pub fn new() -> Self {
        TypeTree::default()
    }

    /// Arena index of the root node, if the tree is non-empty.
    pub fn root(&self) -> Option<NodeId> {
        (!self.nodes.is_empty()).then_some(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &TypeNode {
        &self.nodes[id]
    }

    pub fn get(&self, id: NodeId) -> Option<&TypeNode> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &[TypeNode] {
        &self.nodes
    }

    /// Append `node` under `parent` (or as the root when `parent` is `None`), fixing up its
    /// `level` and `parent` links.
    pub fn push_child(&mut self, parent: Option<NodeId>, mut node: TypeNode) -> NodeId {
        let id = self.nodes.len();
        match parent {
            Some(parent_id) => {
                node.level = self.nodes[parent_id].level + 1;
                node.parent = Some(parent_id);
                self.nodes[parent_id].children.push(id);
            }
            None => {
                node.level = 0;
                node.parent = None;
            }
        }
        self.nodes.push(node);
        id
    }

    /// Find a direct child of `id` by field name.
    pub fn find_child(&self, id: NodeId, field_name: &str) -> Option<NodeId> {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .find(|&child| self.nodes[child].field_name == field_name)
    }

    /// Arena indices of the node's children.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    /// Nodes in depth-first declaration order, paired with their levels.
    ///
    /// This is the flattening used by the V3 wire encoding and the type database.
    pub fn level_records(&self) -> Vec<(u8, &TypeNode)> {
        let mut records = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root() else {
            return records;
        };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            records.push((node.level, node));
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        records
    }

    /// Rebuild a tree from `(level, node)` records in depth-first order.
    ///
    /// A record whose level is `<=` the cursor's level climbs `(currentLevel - newLevel)`
    /// ancestors before attaching as a new child; a record one level deeper attaches directly
    /// under the cursor. Any other level transition is malformed.
    pub fn from_level_records<I>(records: I) -> Result<TypeTree>
    where
        I: IntoIterator<Item = (u8, TypeNode)>,
    {
        let mut tree = TypeTree::new();
        let mut cursor: Option<NodeId> = None;

        for (level, node) in records {
            let parent = match cursor {
                None => {
                    if level != 0 {
                        return Err(Error::Malformed(format!(
                            "first type record has level {level}, expected 0"
                        )));
                    }
                    None
                }
                Some(current) => {
                    let current_level = tree.node(current).level;
                    if level == current_level + 1 {
                        Some(current)
                    } else if level <= current_level {
                        let mut ancestor = current;
                        for _ in 0..(current_level - level) {
                            ancestor = tree.node(ancestor).parent.ok_or_else(|| {
                                Error::Malformed("type record climbs past the root".into())
                            })?;
                        }
                        let parent = tree.node(ancestor).parent;
                        if parent.is_none() {
                            return Err(Error::Malformed(
                                "type record declares a second root".into(),
                            ));
                        }
                        parent
                    } else {
                        return Err(Error::Malformed(format!(
                            "type record jumps from level {current_level} to {level}"
                        )));
                    }
                }
            };

            cursor = Some(tree.push_child(parent, node));
        }

        Ok(tree)
    }

    /// MD5 digest over the structural content of the tree, independent of arena layout.
    pub fn structural_hash(&self) -> [u8; 16] {
        let mut hasher = Md5::new();
        for (level, node) in self.level_records() {
            hasher.update([level]);
            hasher.update(node.type_name.as_bytes());
            hasher.update([0u8]);
            hasher.update(node.field_name.as_bytes());
            hasher.update([0u8]);
            hasher.update(node.size.to_le_bytes());
            hasher.update(node.index.to_le_bytes());
            hasher.update([node.is_array as u8]);
            hasher.update(node.version.to_le_bytes());
            hasher.update(node.meta_flags.to_le_bytes());
        }
        hasher.finalize().into()
    }
}

/// Schema data for one class inside a serialized file's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClassSchema {
    /// Numeric class identifier; negative for script-backed classes
    pub class_id: i32,
    /// Per-class script hash, present only when `class_id` is negative (V3)
    pub script_hash: Option<[u8; 16]>,
    /// Type hash (V3)
    pub type_hash: Option<[u8; 16]>,
    /// The field-shape tree, absent when the file does not embed schemas
    pub tree: Option<TypeTree>,
}

/// The full set of class schemas decoded from one serialized file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeForest {
    /// Engine revision string (V2/V3)
    pub engine_version: Option<String>,
    /// Platform attributes integer (V2/V3)
    pub attributes: Option<u32>,
    /// Whether trees are embedded (always true for V1/V2)
    pub embedded: bool,
    /// Per-class schemas in declaration order
    pub classes: Vec<ClassSchema>,
}

impl Default for TypeForest {
    fn default() -> Self {
        TypeForest {
            engine_version: None,
            attributes: None,
            embedded: true,
            classes: Vec::new(),
        }
    }
}

impl TypeForest {
    /// The embedded tree for `class_id`, if any.
    pub fn tree_for(&self, class_id: i32) -> Option<&TypeTree> {
        self.classes
            .iter()
            .find(|class| class.class_id == class_id)
            .and_then(|class| class.tree.as_ref())
    }
}
