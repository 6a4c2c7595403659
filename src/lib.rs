//! Treesift: structural search over syntax trees with named, quantified
//! wildcards.
//!
//! This crate implements a backtracking tree-matching engine:
//! - Authored patterns mix literal nodes with named captures; a capture
//!   binds a run of 1..N sibling nodes under regex-style occurrence bounds,
//!   greedy or reluctant.
//! - Repeated uses of one capture name must resolve consistently, both in
//!   content (structural or textual equality per occurrence) and in
//!   committed occurrence count.
//! - Predicates constrain what a capture may bind: text/name regular
//!   expressions and expression-type tests with an optional walk up the
//!   class hierarchy.
//! - A search driver anchors attempts at every node of a scope and reports
//!   deduplicated, serializable match snapshots.
//!
//! # Design Notes
//!
//! The engine is deliberately split from the tree representation: matching
//! consumes any tree through the narrow [`node::SourceTree`] surface plus
//! the sibling-cursor contract, and failure is a plain `bool` at every
//! level: each layer undoes its own speculative bindings before reporting
//! it upward. Compiled patterns are immutable; all per-attempt state lives
//! in a [`context::MatchContext`] that is reset between attempts.
//!
//! # References
//!
//! - Cox, R. "Regular Expression Matching Can Be Simple And Fast" (2007) – backtracking quantifiers
//! - Friedl, J. "Mastering Regular Expressions" (2006) – greedy/reluctant semantics
//! - Hoffmann, O'Donnell. "Pattern matching in trees" (1982) – tree pattern matching
//! - Baader, Nipkow. "Term Rewriting and All That" (1998) – matching with variables
//!
//! # Example
//!
//! ```
//! use treesift::prelude::*;
//!
//! // Candidate: println(message)
//! let mut tree = SourceTree::new();
//! let root = tree.add_node(NodeKind::File, "", None);
//! let call = tree.add_node(NodeKind::Call, "", Some(root));
//! tree.add_node(NodeKind::Identifier, "println", Some(call));
//! tree.add_node(NodeKind::Expression, "message", Some(call));
//!
//! // Pattern: println($arg$)
//! let mut builder = PatternBuilder::new();
//! let pat_call = builder.literal(NodeKind::Call, "");
//! builder.literal_in(pat_call, NodeKind::Identifier, "println");
//! builder.capture_in(pat_call, CaptureSpec::new("arg").target());
//! let pattern = builder.build()?;
//!
//! let matcher = DefaultStructuralMatcher;
//! let searcher = Searcher::new(&pattern, &matcher);
//! let matches = searcher.find_all(&tree, root);
//! assert_eq!(matches.len(), 1);
//! let target = matches[0].find_target().unwrap();
//! assert_eq!(target.occurrences[0].image.as_deref(), Some("message"));
//! # Ok::<(), treesift::pattern::PatternError>(())
//! ```

pub mod context;
pub mod handler;
pub mod index;
pub mod iterator;
pub mod matcher;
pub mod node;
pub mod pattern;
pub mod predicate;
pub mod result;
pub mod search;
pub mod strategy;

pub use context::{CaptureState, MatchContext};
pub use handler::{match_children, match_sequence, SubstitutionHandler, UNBOUNDED};
pub use matcher::{DefaultStructuralMatcher, StructuralMatcher};
pub use node::{NodeId, NodeKind, SourceTree, TypeId, TypeTable};
pub use pattern::{
    CaptureId, CaptureSpec, CompiledPattern, PatternBuilder, PatternError, PatternNodeId,
    PatternShape,
};
pub use result::{MatchResult, MatchResultId, ResultArena, SubRange};
pub use search::{CaptureBinding, MatchFingerprint, MatchSnapshot, Occurrence, Searcher};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::context::{CaptureState, MatchContext};
    pub use crate::handler::{match_children, match_sequence, SubstitutionHandler, UNBOUNDED};
    pub use crate::index::{Component, Equation, EquationRhs, IndexError, LatticeValue};
    pub use crate::iterator::SiblingCursor;
    pub use crate::matcher::{DefaultStructuralMatcher, StructuralMatcher};
    pub use crate::node::{NodeId, NodeKind, SourceTree, TypeId, TypeTable};
    pub use crate::pattern::{
        CaptureId, CaptureSpec, CompiledPattern, PatternBuilder, PatternError, PatternNodeId,
        PatternShape,
    };
    pub use crate::predicate::{AndPredicate, ExprTypePredicate, Predicate, RegexPredicate};
    pub use crate::result::{MatchResult, MatchResultId, ResultArena, SubRange};
    pub use crate::search::{
        CaptureBinding, MatchFingerprint, MatchSnapshot, Occurrence, Searcher,
    };
    pub use crate::strategy::{capabilities, Capabilities, MatchingStrategy};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    /// A quantified capture plus a trailing literal, end to end through the
    /// search driver.
    #[test]
    fn quantified_search_end_to_end() {
        let mut tree = SourceTree::new();
        let root = tree.add_node(NodeKind::File, "", None);
        let block = tree.add_node(NodeKind::Statement, "", Some(root));
        for text in ["setup()", "work()", "teardown()"] {
            tree.add_node(NodeKind::Expression, text, Some(block));
        }

        let mut builder = PatternBuilder::new();
        let pat_block = builder.literal(NodeKind::Statement, "");
        builder.capture_in(pat_block, CaptureSpec::new("body").at_least(1).target());
        let pattern = builder.build().unwrap();

        let matcher = DefaultStructuralMatcher;
        let searcher = Searcher::new(&pattern, &matcher);
        let matches = searcher.find_all(&tree, root);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].occurrence_count("body"), 3);
    }

    /// A type-constrained capture only binds expressions of the matching
    /// class hierarchy.
    #[test]
    fn type_constrained_search_end_to_end() {
        let mut tree = SourceTree::new();
        let collection = tree.types_mut().add_class("Collection", None);
        let list = tree.types_mut().add_class("ArrayList", Some(collection));
        let string_ty = tree.types_mut().add_class("String", None);

        let root = tree.add_node(NodeKind::File, "", None);
        let good = tree.add_node(NodeKind::Call, "makeList()", Some(root));
        tree.set_expr_type(good, list);
        let bad = tree.add_node(NodeKind::Call, "makeName()", Some(root));
        tree.set_expr_type(bad, string_ty);

        let mut builder = PatternBuilder::new();
        builder.capture(
            CaptureSpec::new("expr")
                .expr_type("Collection")
                .subtype()
                .target(),
        );
        let pattern = builder.build().unwrap();

        let matcher = DefaultStructuralMatcher;
        let searcher = Searcher::new(&pattern, &matcher);
        let matches = searcher.find_all(&tree, root);
        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].find_target().unwrap().occurrences[0].node,
            Some(good)
        );
    }
}
