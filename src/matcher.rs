//! Structural equality over candidate subtrees.
//!
//! Used by the substitution handler to validate a repeated full-node capture
//! against its first occurrence. The seam is a trait so tests (and callers
//! with a smarter comparator, e.g. one that ignores formatting tokens) can
//! substitute their own.

use crate::node::{NodeId, SourceTree};

/// Full recursive comparison of two candidate subtrees.
pub trait StructuralMatcher {
    /// Returns `true` iff the subtrees rooted at `a` and `b` are
    /// structurally equal.
    fn match_trees(&self, tree: &SourceTree, a: NodeId, b: NodeId) -> bool;
}

/// Kind + text + children comparison, depth-first.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStructuralMatcher;

impl StructuralMatcher for DefaultStructuralMatcher {
    fn match_trees(&self, tree: &SourceTree, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }
        if tree.kind(a) != tree.kind(b) || tree.text(a) != tree.text(b) {
            return false;
        }
        let ka = tree.children(a);
        let kb = tree.children(b);
        ka.len() == kb.len()
            && ka
                .iter()
                .zip(kb.iter())
                .all(|(&ca, &cb)| self.match_trees(tree, ca, cb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn equal_subtrees_match() {
        let mut tree = SourceTree::new();
        let a = tree.add_node(NodeKind::Call, "f(x)", None);
        tree.add_node(NodeKind::Identifier, "x", Some(a));
        let b = tree.add_node(NodeKind::Call, "f(x)", None);
        tree.add_node(NodeKind::Identifier, "x", Some(b));

        assert!(DefaultStructuralMatcher.match_trees(&tree, a, b));
        assert!(DefaultStructuralMatcher.match_trees(&tree, a, a));
    }

    #[test]
    fn differing_children_do_not_match() {
        let mut tree = SourceTree::new();
        let a = tree.add_node(NodeKind::Call, "f(x)", None);
        tree.add_node(NodeKind::Identifier, "x", Some(a));
        let b = tree.add_node(NodeKind::Call, "f(x)", None);
        tree.add_node(NodeKind::Identifier, "y", Some(b));

        assert!(!DefaultStructuralMatcher.match_trees(&tree, a, b));
    }

    #[test]
    fn kind_mismatch_fails_before_recursion() {
        let mut tree = SourceTree::new();
        let a = tree.add_node(NodeKind::Call, "f", None);
        let b = tree.add_node(NodeKind::Identifier, "f", None);
        assert!(!DefaultStructuralMatcher.match_trees(&tree, a, b));
    }
}
