//! Matching handlers, including the backtracking quantifier core.
//!
//! A pattern node is handled either by the plain structural handler (kind,
//! text, children; one candidate per pattern node) or by a
//! [`SubstitutionHandler`], which binds a run of 1..N sibling candidates to
//! a named capture and orchestrates backtracking with the remainder of the
//! pattern: greedy captures consume the longest run first and shrink by one
//! occurrence per failed remainder attempt; reluctant captures try the
//! remainder first and grow by one occurrence per failure. Failure is a
//! `bool` at every level, and every level undoes its own speculative
//! bindings before returning it.
//!
//! # Citations
//! - Backtracking quantifiers: Cox, "Regular Expression Matching Can Be Simple And Fast" (2007)
//! - Greedy/reluctant semantics: Friedl, "Mastering Regular Expressions", Chapter 4 (2006)
//! - Matching with variables: Baader & Nipkow, "Term Rewriting and All That", Chapter 4 (1998)

use crate::context::MatchContext;
use crate::iterator::SiblingCursor;
use crate::node::NodeId;
use crate::pattern::{CaptureId, CompiledPattern, PatternNodeId, PatternShape};
use crate::predicate::Predicate;
use crate::result::{MatchResult, MatchResultId, SubRange};

/// Sentinel for "no upper occurrence bound".
pub const UNBOUNDED: usize = usize::MAX;

/// The quantified capture handler.
///
/// Compiled once per pattern position and immutable afterwards; the
/// per-attempt counters live in the [`MatchContext`], indexed by
/// [`CaptureId`], so a compiled pattern can serve many attempts.
///
/// Bounds with `min_occurs > max_occurs` are a builder precondition and are
/// not re-checked here.
#[derive(Debug)]
pub struct SubstitutionHandler {
    name: String,
    capture: CaptureId,
    min_occurs: usize,
    max_occurs: usize,
    greedy: bool,
    target: bool,
    subtype: bool,
    strict_subtype: bool,
    predicate: Option<Box<dyn Predicate>>,
}

impl SubstitutionHandler {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        capture: CaptureId,
        min_occurs: usize,
        max_occurs: usize,
        greedy: bool,
        target: bool,
        subtype: bool,
        strict_subtype: bool,
        predicate: Option<Box<dyn Predicate>>,
    ) -> Self {
        Self {
            name,
            capture,
            min_occurs,
            max_occurs,
            greedy,
            target,
            subtype,
            strict_subtype,
            predicate,
        }
    }

    /// Capture name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capture id within the compiled pattern.
    pub fn capture(&self) -> CaptureId {
        self.capture
    }

    /// Minimum occurrence count.
    pub fn min_occurs(&self) -> usize {
        self.min_occurs
    }

    /// Maximum occurrence count (`UNBOUNDED` for no ceiling).
    pub fn max_occurs(&self) -> usize {
        self.max_occurs
    }

    /// Whether the capture consumes longest-first.
    pub fn is_greedy(&self) -> bool {
        self.greedy
    }

    /// Whether the capture is externally reportable.
    pub fn is_target(&self) -> bool {
        self.target
    }

    /// Whether subtypes are admitted.
    pub fn is_subtype(&self) -> bool {
        self.subtype
    }

    /// Whether only strict subtypes are admitted.
    pub fn is_strict_subtype(&self) -> bool {
        self.strict_subtype
    }

    /// Attached predicate, if any.
    pub fn predicate(&self) -> Option<&dyn Predicate> {
        self.predicate.as_deref()
    }

    /// Compares one offered binding against the prior occurrence stored
    /// under this name.
    ///
    /// Full-node against full-node goes through the structural equality
    /// matcher; anything involving a partial range compares literal text.
    /// An empty offer matches only an explicitly empty prior binding.
    fn validate_one(
        &self,
        candidate: Option<NodeId>,
        range: SubRange,
        prior: MatchResultId,
        ctx: &MatchContext<'_>,
    ) -> bool {
        let result = ctx.results().get(prior);
        match candidate {
            Some(node) => {
                if range.is_full() && result.range().is_full() {
                    match result.node() {
                        Some(prior_node) => {
                            ctx.matcher().match_trees(ctx.tree(), node, prior_node)
                        }
                        None => false,
                    }
                } else {
                    Some(ctx.tree().text_in_range(node, range)) == result.image()
                }
            }
            None => result.image().is_none(),
        }
    }

    /// Decides whether this capture may bind `candidate`.
    ///
    /// With `max_occurs == 0` every offer is rejected, but the rejection is
    /// recorded in the committed count so later repeats of the name are
    /// judged against it. A repeated binding must equal the occurrence at
    /// the corresponding position of the prior resolution.
    pub fn validate(
        &self,
        candidate: Option<NodeId>,
        range: SubRange,
        ctx: &mut MatchContext<'_>,
    ) -> bool {
        if let Some(predicate) = &self.predicate {
            match candidate {
                Some(node) => {
                    if !predicate.evaluate(node, ctx) {
                        return false;
                    }
                }
                None => return false,
            }
        }

        if self.max_occurs == 0 {
            let state = ctx.state_mut(self.capture);
            state.total_matched_occurs = Some(state.total_matched_occurs.map_or(0, |t| t + 1));
            return false;
        }

        let parent = ctx.current_result();
        let Some(existing) = ctx.results().find_son(parent, &self.name) else {
            return true;
        };

        if self.min_occurs == 1 && self.max_occurs == 1 {
            return self.validate_one(candidate, range, existing, ctx);
        }

        if self.max_occurs > 1 && ctx.state(self.capture).total_matched_occurs.is_some() {
            let occur = ctx.state(self.capture).matched_occurs;
            let result = ctx.results().get(existing);
            if result.has_sons() {
                let sons = result.sons();
                if occur >= sons.len() {
                    return false;
                }
                return self.validate_one(candidate, range, sons[occur], ctx);
            }
            // A committed single occurrence is stored directly, not as an
            // aggregate.
            if occur == 0 {
                return self.validate_one(candidate, range, existing, ctx);
            }
            return false;
        }

        true
    }

    fn create_match(
        &self,
        candidate: Option<NodeId>,
        range: SubRange,
        ctx: &mut MatchContext<'_>,
    ) -> MatchResultId {
        let image = candidate.map(|node| ctx.tree().text_in_range(node, range).to_string());
        ctx.results_mut().alloc(MatchResult::new(
            self.name.clone(),
            image,
            candidate,
            range,
            self.target,
        ))
    }

    /// Records a validated binding in the result tree.
    ///
    /// The first occurrence is stored directly under the name. A second
    /// occurrence (repeatable capture, count not yet committed) promotes
    /// the slot into an aggregate: the original binding is demoted to the
    /// first child, the aggregate keeps its image and range for
    /// empty-capture queries, and its node reference follows the latest
    /// binding.
    fn add_result(&self, candidate: Option<NodeId>, range: SubRange, ctx: &mut MatchContext<'_>) {
        let parent = ctx.current_result();
        let existing = ctx.results().find_son(parent, &self.name);
        match existing {
            None => {
                let id = self.create_match(candidate, range, ctx);
                ctx.results_mut().add_son(parent, id);
            }
            Some(aggregate)
                if self.max_occurs > 1
                    && ctx.state(self.capture).total_matched_occurs.is_none() =>
            {
                let new_son = self.create_match(candidate, range, ctx);
                let results = ctx.results_mut();
                if !results.get(aggregate).has_sons() {
                    let demoted = results.get(aggregate).clone();
                    let demoted = results.alloc(demoted);
                    results.add_son(aggregate, demoted);
                    results.set_node(aggregate, candidate);
                }
                results.add_son(aggregate, new_son);
            }
            // A repeat validated against a committed resolution adds no
            // new record.
            Some(_) => {}
        }
    }

    /// Validates and records one binding.
    ///
    /// On failure, an exactly-one capture purges any stale binding left
    /// under its name so a failed alternative never leaks into later
    /// attempts.
    pub fn handle(
        &self,
        candidate: Option<NodeId>,
        range: SubRange,
        ctx: &mut MatchContext<'_>,
    ) -> bool {
        if !self.validate(candidate, range, ctx) {
            if self.max_occurs == 1 && self.min_occurs == 1 {
                let parent = ctx.current_result();
                ctx.results_mut().remove_son(parent, &self.name);
            }
            return false;
        }
        self.add_result(candidate, range, ctx);
        true
    }

    /// Removes the last `count` bindings recorded under this name,
    /// collapsing the aggregate when its last child goes.
    fn remove_last_results(&self, count: usize, ctx: &mut MatchContext<'_>) {
        if count == 0 {
            return;
        }
        let parent = ctx.current_result();
        let results = ctx.results_mut();
        let Some(son) = results.find_son(parent, &self.name) else {
            return;
        };
        if results.get(son).has_sons() {
            let mut remaining = count;
            while remaining > 0 {
                remaining -= 1;
                results.pop_son(son);
            }
            if !results.get(son).has_sons() {
                results.remove_son(parent, &self.name);
            }
        } else {
            results.remove_son(parent, &self.name);
        }
    }

    /// Matches one candidate node against this capture position: the
    /// coarse strategy gate, then the nested sub-pattern (if the capture
    /// carries one), then binding.
    fn match_one(
        &self,
        pat_node: PatternNodeId,
        candidate: NodeId,
        pattern: &CompiledPattern,
        ctx: &mut MatchContext<'_>,
    ) -> bool {
        if !pattern.strategy().admits(ctx.tree().kind(candidate)) {
            return false;
        }
        let sub = pattern.children(pat_node);
        if !sub.is_empty() {
            let kids = ctx.tree().children(candidate);
            if !match_children(pattern, sub, kids, ctx) {
                return false;
            }
        }
        self.handle(Some(candidate), SubRange::full(), ctx)
    }

    /// Commits or checks the occurrence count for this capture name.
    ///
    /// The first successful resolution in an attempt fixes the count; every
    /// later resolution of the same name must report an equal count.
    fn check_occurrence_consistency(&self, ctx: &mut MatchContext<'_>) -> bool {
        let state = ctx.state_mut(self.capture);
        match state.total_matched_occurs {
            None => {
                state.total_matched_occurs = Some(state.matched_occurs);
                true
            }
            Some(total) => total == state.matched_occurs,
        }
    }

    /// The backtracking quantifier algorithm over a run of siblings.
    ///
    /// `pat` is positioned at this capture; `cand` at the first candidate
    /// it may consume. On success both cursors sit past the consumed
    /// region; on failure this handler's own bindings are undone and the
    /// cursors restored for the caller to backtrack further.
    pub fn match_sequentially(
        &self,
        pattern: &CompiledPattern,
        pat: &mut SiblingCursor<'_, PatternNodeId>,
        cand: &mut SiblingCursor<'_, NodeId>,
        ctx: &mut MatchContext<'_>,
    ) -> bool {
        ctx.state_mut(self.capture).matched_occurs = 0;
        let pat_node = pat.current();

        // Mandatory phase: meet the floor or give everything back.
        while cand.has_next() && ctx.state(self.capture).matched_occurs < self.min_occurs {
            if self.match_one(pat_node, cand.current(), pattern, ctx) {
                ctx.state_mut(self.capture).matched_occurs += 1;
            } else {
                break;
            }
            cand.advance();
        }

        let matched = ctx.state(self.capture).matched_occurs;
        if matched != self.min_occurs {
            self.remove_last_results(matched, ctx);
            cand.rewind_by(matched);
            return false;
        }

        if self.greedy {
            // Optional phase: take as much as the ceiling allows.
            while cand.has_next() && ctx.state(self.capture).matched_occurs < self.max_occurs {
                if self.match_one(pat_node, cand.current(), pattern, ctx) {
                    ctx.state_mut(self.capture).matched_occurs += 1;
                } else {
                    // No more candidates this capture can take.
                    break;
                }
                cand.advance();
            }

            pat.advance();

            if pat.has_next() {
                // Longest match first; release one occurrence per failed
                // remainder attempt.
                loop {
                    if ctx.state(self.capture).matched_occurs < self.min_occurs {
                        break;
                    }
                    if dispatch_sequential(pattern, pat, cand, ctx) {
                        let committed = ctx.state(self.capture).matched_occurs;
                        ctx.state_mut(self.capture).total_matched_occurs = Some(committed);
                        return true;
                    }
                    let matched = ctx.state(self.capture).matched_occurs;
                    if matched > 0 {
                        cand.rewind();
                        self.remove_last_results(1, ctx);
                    }
                    if matched == 0 {
                        break;
                    }
                    ctx.state_mut(self.capture).matched_occurs = matched - 1;
                }

                let matched = ctx.state(self.capture).matched_occurs;
                if matched > 0 {
                    self.remove_last_results(matched, ctx);
                }
                pat.rewind();
                false
            } else if !cand.has_next() {
                self.check_occurrence_consistency(ctx)
            } else {
                let matched = ctx.state(self.capture).matched_occurs;
                self.remove_last_results(matched, ctx);
                false
            }
        } else {
            pat.advance();

            if pat.has_next() {
                // Shortest match first; grow by one occurrence per failed
                // remainder attempt.
                while cand.has_next() && ctx.state(self.capture).matched_occurs <= self.max_occurs
                {
                    if dispatch_sequential(pattern, pat, cand, ctx) {
                        return self.check_occurrence_consistency(ctx);
                    }
                    if self.match_one(pat_node, cand.current(), pattern, ctx) {
                        ctx.state_mut(self.capture).matched_occurs += 1;
                    } else {
                        pat.rewind();
                        let matched = ctx.state(self.capture).matched_occurs;
                        self.remove_last_results(matched, ctx);
                        return false;
                    }
                    cand.advance();
                }

                pat.rewind();
                let matched = ctx.state(self.capture).matched_occurs;
                self.remove_last_results(matched, ctx);
                false
            } else {
                self.check_occurrence_consistency(ctx)
            }
        }
    }
}

/// Routes a sequential match to the handler of the pattern node under the
/// cursor.
pub(crate) fn dispatch_sequential(
    pattern: &CompiledPattern,
    pat: &mut SiblingCursor<'_, PatternNodeId>,
    cand: &mut SiblingCursor<'_, NodeId>,
    ctx: &mut MatchContext<'_>,
) -> bool {
    match pattern.shape(pat.current()) {
        PatternShape::Capture(handler) => handler.match_sequentially(pattern, pat, cand, ctx),
        PatternShape::Literal { .. } => plain_sequential(pattern, pat, cand, ctx),
    }
}

/// Plain structural handler: one candidate per pattern node, then delegate
/// the rest of the run to the next handler. Undoes its cursor movement on
/// failure.
fn plain_sequential(
    pattern: &CompiledPattern,
    pat: &mut SiblingCursor<'_, PatternNodeId>,
    cand: &mut SiblingCursor<'_, NodeId>,
    ctx: &mut MatchContext<'_>,
) -> bool {
    if !cand.has_next() {
        return false;
    }
    if !match_literal(pattern, pat.current(), cand.current(), ctx) {
        return false;
    }
    pat.advance();
    cand.advance();

    if !pat.has_next() {
        if !cand.has_next() {
            return true;
        }
        pat.rewind();
        cand.rewind();
        return false;
    }
    if dispatch_sequential(pattern, pat, cand, ctx) {
        return true;
    }
    pat.rewind();
    cand.rewind();
    false
}

/// Matches a literal pattern node against one candidate: kind, then either
/// text image (childless) or the child sequence (recursively, through the
/// handler chain, so nested captures participate).
fn match_literal(
    pattern: &CompiledPattern,
    pat_node: PatternNodeId,
    candidate: NodeId,
    ctx: &mut MatchContext<'_>,
) -> bool {
    let PatternShape::Literal { kind, text } = pattern.shape(pat_node) else {
        return false;
    };
    let tree = ctx.tree();
    if tree.kind(candidate) != *kind {
        return false;
    }
    let sub = pattern.children(pat_node);
    if sub.is_empty() {
        return tree.text(candidate) == text;
    }
    match_children(pattern, sub, tree.children(candidate), ctx)
}

/// Matches a pattern-node sequence against a candidate sibling run.
///
/// Both ends must exhaust: an empty pattern sequence matches only an empty
/// run, and trailing candidates fail the match (callers search other
/// starting offsets for "anywhere" semantics).
pub fn match_children(
    pattern: &CompiledPattern,
    pattern_nodes: &[PatternNodeId],
    candidates: &[NodeId],
    ctx: &mut MatchContext<'_>,
) -> bool {
    if pattern_nodes.is_empty() {
        return candidates.is_empty();
    }
    let mut pat = SiblingCursor::new(pattern_nodes);
    let mut cand = SiblingCursor::new(candidates);
    dispatch_sequential(pattern, &mut pat, &mut cand, ctx)
}

/// Matches a compiled pattern's top-level sequence against a sibling run.
pub fn match_sequence(
    pattern: &CompiledPattern,
    candidates: &[NodeId],
    ctx: &mut MatchContext<'_>,
) -> bool {
    match_children(pattern, pattern.roots(), candidates, ctx)
}
