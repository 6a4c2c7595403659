//! Arena-backed source tree that candidate nodes are drawn from.
//!
//! The matching core is deliberately decoupled from any particular parser:
//! it only needs node kinds, text images, parent/child links, and (for the
//! type predicate) a resolvable expression type. `SourceTree` provides the
//! smallest representation satisfying that contract, with dense `u32` ids
//! indexing contiguous storage.
//!
//! # Determinism
//! - `NodeId` ordering is by its inner `u32`, which is allocation order.
//! - Children are stored in insertion order and never reordered.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::result::SubRange;

/// Dense node identifier for arena-allocated source trees.
///
/// `NodeId(u32)` is `Copy`, `Eq`, `Ord`, `Hash`. The inner value is an index
/// into the tree's node array.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a new `NodeId` from a raw `u32`.
    ///
    /// Prefer the ids returned by [`SourceTree::add_node`]; a fabricated id
    /// is only valid for the tree whose allocation produced the raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Identifier for an entry in the [`TypeTable`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(u32);

impl TypeId {
    /// Creates a new `TypeId` from a raw `u32`.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Closed set of syntactic categories a node can belong to.
///
/// Classification over this enum replaces open-ended visitor dispatch: the
/// capability set of a kind is a pure function of the variant (see
/// `strategy::capabilities`), computed without touching the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Compilation unit root.
    File,
    /// Class-like declaration.
    Class,
    /// Method or function declaration.
    Method,
    /// Field or local variable declaration.
    Variable,
    /// Generic statement.
    Statement,
    /// Generic expression.
    Expression,
    /// Call expression.
    Call,
    /// Bare identifier token.
    Identifier,
    /// Literal token (numbers, strings, punctuation).
    Literal,
    /// Type reference element.
    TypeElement,
    /// Type parameter declaration.
    TypeParameter,
    /// Annotation or attribute.
    Annotation,
    /// Comment node.
    Comment,
}

/// One entry in the type table: a named type with an optional supertype link.
#[derive(Debug, Clone)]
struct TypeEntry {
    name: String,
    supertype: Option<TypeId>,
    /// Whether this is a user-defined class type (participates in the
    /// hierarchy walk) as opposed to a primitive or builtin.
    class_type: bool,
}

/// Interned type names with single-inheritance ancestor chains.
///
/// The hierarchy-aware predicate walks a type's ancestor sequence outward
/// one entry at a time; chains are expected to be acyclic (builder
/// precondition, not defensively checked).
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    entries: Vec<TypeEntry>,
}

impl TypeTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Adds a user-defined class type and returns its id.
    pub fn add_class(&mut self, name: impl Into<String>, supertype: Option<TypeId>) -> TypeId {
        self.push(name.into(), supertype, true)
    }

    /// Adds a primitive (non-class) type and returns its id.
    pub fn add_primitive(&mut self, name: impl Into<String>) -> TypeId {
        self.push(name.into(), None, false)
    }

    fn push(&mut self, name: String, supertype: Option<TypeId>, class_type: bool) -> TypeId {
        let id = TypeId(self.entries.len() as u32);
        self.entries.push(TypeEntry { name, supertype, class_type });
        id
    }

    /// Returns the presentable name of a type.
    pub fn name(&self, id: TypeId) -> &str {
        &self.entries[id.as_u32() as usize].name
    }

    /// Returns whether the type is a user-defined class type.
    pub fn is_class_type(&self, id: TypeId) -> bool {
        self.entries[id.as_u32() as usize].class_type
    }

    /// Iterates the ancestor chain starting at `id` itself, then walking
    /// outward one supertype at a time until the chain is exhausted.
    pub fn ancestors(&self, id: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        let mut next = Some(id);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.entries[current.as_u32() as usize].supertype;
            Some(current)
        })
    }
}

/// Node payload stored in the tree arena.
#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    expr_type: Option<TypeId>,
}

/// A source tree: contiguous node storage plus an interned type table.
///
/// Nodes are append-only; a tree is built once and then searched. The text
/// image of a node is stored directly, so slicing by a [`SubRange`] is a
/// plain substring operation.
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    nodes: Vec<NodeData>,
    types: TypeTable,
}

impl SourceTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            types: TypeTable::new(),
        }
    }

    /// Appends a node and returns its id. When `parent` is given, the node
    /// is linked as the parent's next child.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        text: impl Into<String>,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            text: text.into(),
            parent,
            children: Vec::new(),
            expr_type: None,
        });
        if let Some(p) = parent {
            self.nodes[p.as_u32() as usize].children.push(id);
        }
        id
    }

    /// Records the resolved type of an expression node.
    pub fn set_expr_type(&mut self, node: NodeId, ty: TypeId) {
        self.nodes[node.as_u32() as usize].expr_type = Some(ty);
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_u32() as usize]
    }

    /// Returns the kind of a node.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind
    }

    /// Returns the full text image of a node.
    pub fn text(&self, id: NodeId) -> &str {
        &self.node(id).text
    }

    /// Returns the text of a node restricted to `range`.
    ///
    /// A full range returns the whole image. Out-of-bounds sub-ranges are a
    /// caller error and panic, matching slice indexing.
    pub fn text_in_range(&self, id: NodeId, range: SubRange) -> &str {
        let text = self.text(id);
        match range.end {
            None => &text[range.start..],
            Some(end) => &text[range.start..end],
        }
    }

    /// Returns the parent of a node, if any.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the children of a node in insertion order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Returns the resolved expression type of a node, if one was recorded.
    pub fn expr_type(&self, id: NodeId) -> Option<TypeId> {
        self.node(id).expr_type
    }

    /// Returns the type table.
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Returns the type table for mutation during tree construction.
    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    /// Number of nodes in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order traversal of the subtree rooted at `root`.
    pub fn preorder(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Push children reversed so they pop in insertion order.
            for &child in self.children(id).iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_link_nodes() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let a = tree.add_node(NodeKind::Statement, "a;", Some(root));
        let b = tree.add_node(NodeKind::Statement, "b;", Some(root));

        assert_eq!(tree.children(root), &[a, b]);
        assert_eq!(tree.parent(a), Some(root));
        assert_eq!(tree.kind(b), NodeKind::Statement);
        assert_eq!(tree.text(a), "a;");
    }

    #[test]
    fn preorder_is_depth_first_in_insertion_order() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let a = tree.add_node(NodeKind::Class, "A", Some(root));
        let m = tree.add_node(NodeKind::Method, "m", Some(a));
        let b = tree.add_node(NodeKind::Class, "B", Some(root));

        assert_eq!(tree.preorder(root), vec![root, a, m, b]);
    }

    #[test]
    fn text_sub_ranges() {
        let mut tree = SourceTree::new();
        let n = tree.add_node(NodeKind::Identifier, "abcdef", None);
        assert_eq!(tree.text_in_range(n, SubRange::full()), "abcdef");
        assert_eq!(tree.text_in_range(n, SubRange::new(1, Some(4))), "bcd");
        assert_eq!(tree.text_in_range(n, SubRange::new(3, None)), "def");
    }

    #[test]
    fn ancestor_chain_starts_at_self() {
        let mut types = TypeTable::new();
        let object = types.add_class("Object", None);
        let base = types.add_class("Base", Some(object));
        let derived = types.add_class("Derived", Some(base));

        let chain: Vec<_> = types.ancestors(derived).collect();
        assert_eq!(chain, vec![derived, base, object]);
        assert_eq!(types.name(chain[1]), "Base");
    }
}
