//! Per-attempt matching state.
//!
//! A `MatchContext` is exclusively owned by one matching attempt against one
//! candidate root: it holds the result arena, the attempt's root result, and
//! the per-capture occurrence counters. Counters live here rather than on
//! the compiled handlers, so one compiled pattern can serve any number of
//! attempts (including concurrent ones, each with its own context) without
//! shared mutable state.

use crate::matcher::StructuralMatcher;
use crate::node::SourceTree;
use crate::pattern::CaptureId;
use crate::result::{MatchResult, MatchResultId, ResultArena, SubRange};

/// Occurrence counters for one capture within one attempt.
#[derive(Debug, Clone, Default)]
pub struct CaptureState {
    /// Occurrences bound in the current `match_sequentially` call.
    pub matched_occurs: usize,
    /// Committed occurrence count for the whole attempt; `None` until the
    /// first successful resolution of the capture. A capture with
    /// `max_occurs == 0` bumps this on every rejected offer
    /// (`None -> Some(0) -> Some(1) -> …`) so later repeats are judged
    /// against the recorded rejections.
    pub total_matched_occurs: Option<usize>,
}

/// State for one matching attempt: result tree plus capture counters.
pub struct MatchContext<'a> {
    tree: &'a SourceTree,
    matcher: &'a dyn StructuralMatcher,
    results: ResultArena,
    root: MatchResultId,
    current: MatchResultId,
    states: Vec<CaptureState>,
}

impl<'a> MatchContext<'a> {
    /// Creates a fresh context for a pattern with `capture_count` distinct
    /// capture names.
    pub fn new(
        tree: &'a SourceTree,
        matcher: &'a dyn StructuralMatcher,
        capture_count: usize,
    ) -> Self {
        let mut results = ResultArena::new();
        let root = results.alloc(MatchResult::new("", None, None, SubRange::full(), false));
        Self {
            tree,
            matcher,
            results,
            root,
            current: root,
            states: vec![CaptureState::default(); capture_count],
        }
    }

    /// The candidate tree being matched.
    #[inline]
    pub fn tree(&self) -> &'a SourceTree {
        self.tree
    }

    /// The structural equality matcher for repeated full-node captures.
    #[inline]
    pub fn matcher(&self) -> &'a dyn StructuralMatcher {
        self.matcher
    }

    /// Read access to the result arena.
    pub fn results(&self) -> &ResultArena {
        &self.results
    }

    /// Write access to the result arena.
    pub fn results_mut(&mut self) -> &mut ResultArena {
        &mut self.results
    }

    /// Root result of the attempt.
    pub fn root_result(&self) -> MatchResultId {
        self.root
    }

    /// Result that captures currently bind under.
    pub fn current_result(&self) -> MatchResultId {
        self.current
    }

    /// Counter state for a capture.
    #[inline]
    pub fn state(&self, capture: CaptureId) -> &CaptureState {
        &self.states[capture.as_u32() as usize]
    }

    /// Mutable counter state for a capture.
    #[inline]
    pub fn state_mut(&mut self, capture: CaptureId) -> &mut CaptureState {
        &mut self.states[capture.as_u32() as usize]
    }

    /// Restores the context for reuse by an independent attempt: the result
    /// tree is emptied and every committed occurrence count is forgotten.
    pub fn reset(&mut self) {
        self.results.clear();
        self.root = self
            .results
            .alloc(MatchResult::new("", None, None, SubRange::full(), false));
        self.current = self.root;
        for state in &mut self.states {
            *state = CaptureState::default();
        }
    }
}

impl std::fmt::Debug for MatchContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchContext")
            .field("results", &self.results.len())
            .field("captures", &self.states.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DefaultStructuralMatcher;
    use crate::node::NodeKind;

    #[test]
    fn reset_clears_results_and_counters() {
        let mut tree = SourceTree::new();
        tree.add_node(NodeKind::File, "", None);
        let matcher = DefaultStructuralMatcher;
        let mut ctx = MatchContext::new(&tree, &matcher, 2);

        let root = ctx.current_result();
        let son = ctx
            .results_mut()
            .alloc(MatchResult::new("x", None, None, SubRange::full(), false));
        ctx.results_mut().add_son(root, son);
        ctx.state_mut(CaptureId::new(0)).matched_occurs = 3;
        ctx.state_mut(CaptureId::new(1)).total_matched_occurs = Some(2);

        ctx.reset();

        let root = ctx.current_result();
        assert!(ctx.results().find_son(root, "x").is_none());
        assert_eq!(ctx.state(CaptureId::new(0)).matched_occurs, 0);
        assert_eq!(ctx.state(CaptureId::new(1)).total_matched_occurs, None);
    }
}
