//! Hierarchical store of named captures built during one matching attempt.
//!
//! Results live in an arena; parent/child relations are arena indices, never
//! owning references, so the tree is cycle-free by construction. Under a
//! given parent, at most one result exists per capture name; a repeating
//! capture is represented by one aggregate whose ordered children are the
//! individual occurrences.
//!
//! Detached results stay allocated until the arena is cleared: the arena is
//! scoped to a single attempt and discarded (or handed to the caller)
//! wholesale, so per-node reclamation would buy nothing.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::NodeId;

/// Sub-range into a node's text image.
///
/// `end: None` means "to the end of the image"; together with `start == 0`
/// that denotes a full-node capture. Partial ranges appear when a capture
/// binds a fragment of a single token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubRange {
    /// Byte offset of the first captured character.
    pub start: usize,
    /// Exclusive end offset, or `None` for the end of the image.
    pub end: Option<usize>,
}

impl SubRange {
    /// The full-node range.
    #[inline]
    pub const fn full() -> Self {
        Self { start: 0, end: None }
    }

    /// Creates a sub-range.
    #[inline]
    pub const fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }

    /// Whether this range spans the entire node image.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.start == 0 && self.end.is_none()
    }
}

impl Default for SubRange {
    fn default() -> Self {
        Self::full()
    }
}

/// Identifier of a result node within a [`ResultArena`].
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchResultId(u32);

impl MatchResultId {
    /// Returns the raw `u32` index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MatchResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MatchResultId({})", self.0)
    }
}

/// One named capture binding (or aggregate of repeated bindings).
#[derive(Debug, Clone)]
pub struct MatchResult {
    name: String,
    image: Option<String>,
    node: Option<NodeId>,
    range: SubRange,
    target: bool,
    parent: Option<MatchResultId>,
    sons: Vec<MatchResultId>,
}

impl MatchResult {
    /// Creates a leaf result with no sons.
    pub fn new(
        name: impl Into<String>,
        image: Option<String>,
        node: Option<NodeId>,
        range: SubRange,
        target: bool,
    ) -> Self {
        Self {
            name: name.into(),
            image,
            node,
            range,
            target,
            parent: None,
            sons: Vec::new(),
        }
    }

    /// Capture name this result is bound under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Literal text image of the binding, or `None` for an explicitly empty
    /// binding.
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// The bound tree node, or `None` for an explicitly empty binding.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    /// Captured sub-range of the node image.
    pub fn range(&self) -> SubRange {
        self.range
    }

    /// Whether this capture is externally reportable.
    pub fn is_target(&self) -> bool {
        self.target
    }

    /// Parent result, if attached.
    pub fn parent(&self) -> Option<MatchResultId> {
        self.parent
    }

    /// Ordered child results. Non-empty only for aggregates of a repeating
    /// capture.
    pub fn sons(&self) -> &[MatchResultId] {
        &self.sons
    }

    /// Whether this result is an aggregate (has children).
    pub fn has_sons(&self) -> bool {
        !self.sons.is_empty()
    }
}

/// Arena of match results for one attempt.
#[derive(Debug, Default)]
pub struct ResultArena {
    nodes: Vec<MatchResult>,
}

impl ResultArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Allocates a result and returns its id.
    pub fn alloc(&mut self, result: MatchResult) -> MatchResultId {
        let id = MatchResultId(self.nodes.len() as u32);
        self.nodes.push(result);
        id
    }

    /// Returns the result stored at `id`.
    pub fn get(&self, id: MatchResultId) -> &MatchResult {
        &self.nodes[id.as_u32() as usize]
    }

    fn get_mut(&mut self, id: MatchResultId) -> &mut MatchResult {
        &mut self.nodes[id.as_u32() as usize]
    }

    /// Attaches `son` as the last child of `parent`.
    pub fn add_son(&mut self, parent: MatchResultId, son: MatchResultId) {
        self.get_mut(son).parent = Some(parent);
        self.get_mut(parent).sons.push(son);
    }

    /// Looks up the direct child of `parent` bound under `name`.
    pub fn find_son(&self, parent: MatchResultId, name: &str) -> Option<MatchResultId> {
        self.get(parent)
            .sons
            .iter()
            .copied()
            .find(|&son| self.get(son).name == name)
    }

    /// Detaches and returns the direct child of `parent` bound under `name`.
    pub fn remove_son(&mut self, parent: MatchResultId, name: &str) -> Option<MatchResultId> {
        let idx = self
            .get(parent)
            .sons
            .iter()
            .position(|&son| self.get(son).name == name)?;
        let son = self.get_mut(parent).sons.remove(idx);
        self.get_mut(son).parent = None;
        Some(son)
    }

    /// Detaches and returns the last child of `aggregate`.
    pub fn pop_son(&mut self, aggregate: MatchResultId) -> Option<MatchResultId> {
        let son = self.get_mut(aggregate).sons.pop()?;
        self.get_mut(son).parent = None;
        Some(son)
    }

    /// Replaces the bound node reference of a result.
    pub fn set_node(&mut self, id: MatchResultId, node: Option<NodeId>) {
        self.get_mut(id).node = node;
    }

    /// Number of allocated results, including detached ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena holds no results.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops every result. Used when a context is reset between attempts.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(arena: &mut ResultArena, name: &str, image: &str) -> MatchResultId {
        arena.alloc(MatchResult::new(
            name,
            Some(image.to_string()),
            None,
            SubRange::full(),
            false,
        ))
    }

    #[test]
    fn one_son_per_name_lookup() {
        let mut arena = ResultArena::new();
        let root = arena.alloc(MatchResult::new("", None, None, SubRange::full(), false));
        let x = leaf(&mut arena, "x", "a");
        let y = leaf(&mut arena, "y", "b");
        arena.add_son(root, x);
        arena.add_son(root, y);

        assert_eq!(arena.find_son(root, "x"), Some(x));
        assert_eq!(arena.find_son(root, "y"), Some(y));
        assert_eq!(arena.find_son(root, "z"), None);
        assert_eq!(arena.get(x).parent(), Some(root));
    }

    #[test]
    fn remove_son_detaches() {
        let mut arena = ResultArena::new();
        let root = arena.alloc(MatchResult::new("", None, None, SubRange::full(), false));
        let x = leaf(&mut arena, "x", "a");
        arena.add_son(root, x);

        assert_eq!(arena.remove_son(root, "x"), Some(x));
        assert_eq!(arena.find_son(root, "x"), None);
        assert_eq!(arena.get(x).parent(), None);
        assert_eq!(arena.remove_son(root, "x"), None);
    }

    #[test]
    fn pop_son_preserves_order() {
        let mut arena = ResultArena::new();
        let agg = leaf(&mut arena, "x", "first");
        let s1 = leaf(&mut arena, "x", "first");
        let s2 = leaf(&mut arena, "x", "second");
        arena.add_son(agg, s1);
        arena.add_son(agg, s2);

        assert_eq!(arena.pop_son(agg), Some(s2));
        assert_eq!(arena.get(agg).sons(), &[s1]);
        assert_eq!(arena.pop_son(agg), Some(s1));
        assert!(!arena.get(agg).has_sons());
    }

    #[test]
    fn sub_range_full_detection() {
        assert!(SubRange::full().is_full());
        assert!(!SubRange::new(1, None).is_full());
        assert!(!SubRange::new(0, Some(3)).is_full());
    }
}
