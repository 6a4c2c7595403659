//! Authored patterns and their compiled form.
//!
//! A pattern is a small tree whose nodes are either literals (kind + text,
//! with optional children) or named, quantified captures. Compilation
//! assigns each distinct capture name a dense [`CaptureId`]; the per-attempt
//! counters in `MatchContext` are indexed by it, which is what keeps two
//! uses of one name mutually consistent.
//!
//! # Citations
//! - Quantified wildcards: Friedl, "Mastering Regular Expressions", Chapter 4 (2006)
//! - Patterns over trees: Hoffmann & O'Donnell, "Pattern matching in trees" (1982)

use std::collections::HashMap;
use std::fmt;

use crate::handler::{SubstitutionHandler, UNBOUNDED};
use crate::node::NodeKind;
use crate::predicate::{AndPredicate, ExprTypePredicate, Predicate};
use crate::strategy::MatchingStrategy;

/// Dense identifier of a capture name within one compiled pattern.
///
/// Two pattern positions using the same name share one `CaptureId` (and so
/// one committed occurrence count per attempt).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureId(u32);

impl CaptureId {
    /// Creates a `CaptureId` from a raw index.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Identifier of a node within one compiled pattern.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternNodeId(u32);

impl PatternNodeId {
    /// Returns the raw index.
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

/// What a pattern node demands of a candidate.
#[derive(Debug)]
pub enum PatternShape {
    /// A concrete node: kind must match; a childless literal compares text
    /// images, one with children matches its child sequence recursively.
    Literal {
        /// Required candidate kind.
        kind: NodeKind,
        /// Required text image (childless literals only).
        text: String,
    },
    /// A named, quantified capture.
    Capture(SubstitutionHandler),
}

#[derive(Debug)]
struct PatternNodeData {
    shape: PatternShape,
    children: Vec<PatternNodeId>,
}

/// Error raised while building a pattern.
#[derive(Debug)]
pub enum PatternError {
    /// `min_occurs` exceeds `max_occurs` for the named capture.
    InvalidBounds {
        /// Capture name.
        name: String,
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
    /// The pattern has no nodes.
    EmptyPattern,
    /// The type constraint of the named capture is not a valid regular
    /// expression.
    InvalidTypePattern {
        /// Capture name.
        name: String,
        /// The regex compilation failure.
        error: regex::Error,
    },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::InvalidBounds { name, min, max } => {
                write!(f, "capture '{name}': min_occurs {min} exceeds max_occurs {max}")
            }
            PatternError::EmptyPattern => write!(f, "pattern has no nodes"),
            PatternError::InvalidTypePattern { name, error } => {
                write!(f, "capture '{name}': invalid type pattern: {error}")
            }
        }
    }
}

impl std::error::Error for PatternError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PatternError::InvalidTypePattern { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Configuration of one capture position, consumed by the builder.
///
/// Defaults: exactly-one cardinality, greedy, not a target.
#[derive(Debug)]
pub struct CaptureSpec {
    name: String,
    min_occurs: usize,
    max_occurs: usize,
    greedy: bool,
    target: bool,
    subtype: bool,
    strict_subtype: bool,
    predicate: Option<Box<dyn Predicate>>,
    type_pattern: Option<String>,
}

impl CaptureSpec {
    /// Starts a spec for the named capture.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_occurs: 1,
            max_occurs: 1,
            greedy: true,
            target: false,
            subtype: false,
            strict_subtype: false,
            predicate: None,
            type_pattern: None,
        }
    }

    /// Sets the occurrence bounds.
    pub fn occurs(mut self, min: usize, max: usize) -> Self {
        self.min_occurs = min;
        self.max_occurs = max;
        self
    }

    /// Sets the bounds to `[min, +inf)`.
    pub fn at_least(mut self, min: usize) -> Self {
        self.min_occurs = min;
        self.max_occurs = UNBOUNDED;
        self
    }

    /// Switches to reluctant (shortest-match-first) quantification.
    pub fn reluctant(mut self) -> Self {
        self.greedy = false;
        self
    }

    /// Marks the capture as the externally reportable target.
    pub fn target(mut self) -> Self {
        self.target = true;
        self
    }

    /// Admits subtypes of the constrained type.
    pub fn subtype(mut self) -> Self {
        self.subtype = true;
        self
    }

    /// Admits strict subtypes only.
    pub fn strict_subtype(mut self) -> Self {
        self.strict_subtype = true;
        self
    }

    /// Attaches a predicate the bound candidates must satisfy.
    pub fn predicate(mut self, predicate: Box<dyn Predicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Constrains the resolved expression type of bound candidates to the
    /// given type-name pattern. The [`subtype`](Self::subtype) and
    /// [`strict_subtype`](Self::strict_subtype) flags widen the test to the
    /// type hierarchy.
    pub fn expr_type(mut self, type_pattern: impl Into<String>) -> Self {
        self.type_pattern = Some(type_pattern.into());
        self
    }
}

/// A compiled, immutable pattern: node arena, root sequence, assigned
/// capture ids, and the coarse strategy gate.
///
/// Compiled patterns carry no per-attempt state and may be shared across
/// attempts and threads.
#[derive(Debug)]
pub struct CompiledPattern {
    nodes: Vec<PatternNodeData>,
    roots: Vec<PatternNodeId>,
    capture_count: usize,
    strategy: MatchingStrategy,
}

impl CompiledPattern {
    /// Shape of a pattern node.
    #[inline]
    pub fn shape(&self, id: PatternNodeId) -> &PatternShape {
        &self.nodes[id.as_u32() as usize].shape
    }

    /// Children of a pattern node.
    #[inline]
    pub fn children(&self, id: PatternNodeId) -> &[PatternNodeId] {
        &self.nodes[id.as_u32() as usize].children
    }

    /// Top-level pattern node sequence.
    pub fn roots(&self) -> &[PatternNodeId] {
        &self.roots
    }

    /// Number of distinct capture names.
    pub fn capture_count(&self) -> usize {
        self.capture_count
    }

    /// Coarse admissibility strategy.
    pub fn strategy(&self) -> MatchingStrategy {
        self.strategy
    }

    /// The substitution handler of a pattern node, if it is a capture.
    pub fn handler(&self, id: PatternNodeId) -> Option<&SubstitutionHandler> {
        match self.shape(id) {
            PatternShape::Capture(h) => Some(h),
            PatternShape::Literal { .. } => None,
        }
    }
}

/// Incremental builder for patterns.
#[derive(Debug, Default)]
pub struct PatternBuilder {
    nodes: Vec<PatternNodeData>,
    roots: Vec<PatternNodeId>,
    capture_ids: HashMap<String, CaptureId>,
    strategy: MatchingStrategy,
    error: Option<PatternError>,
}

impl PatternBuilder {
    /// Starts an empty pattern with the `Any` strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the coarse strategy.
    pub fn with_strategy(mut self, strategy: MatchingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    fn push(&mut self, shape: PatternShape, parent: Option<PatternNodeId>) -> PatternNodeId {
        let id = PatternNodeId(self.nodes.len() as u32);
        self.nodes.push(PatternNodeData {
            shape,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p.as_u32() as usize].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Appends a top-level literal node.
    pub fn literal(&mut self, kind: NodeKind, text: impl Into<String>) -> PatternNodeId {
        self.push(
            PatternShape::Literal {
                kind,
                text: text.into(),
            },
            None,
        )
    }

    /// Appends a literal node under `parent`.
    pub fn literal_in(
        &mut self,
        parent: PatternNodeId,
        kind: NodeKind,
        text: impl Into<String>,
    ) -> PatternNodeId {
        self.push(
            PatternShape::Literal {
                kind,
                text: text.into(),
            },
            Some(parent),
        )
    }

    /// Appends a top-level capture.
    pub fn capture(&mut self, spec: CaptureSpec) -> PatternNodeId {
        self.capture_at(spec, None)
    }

    /// Appends a capture under `parent` (its own children, added later,
    /// form the nested sub-pattern matched against the bound subtree).
    pub fn capture_in(&mut self, parent: PatternNodeId, spec: CaptureSpec) -> PatternNodeId {
        self.capture_at(spec, Some(parent))
    }

    fn capture_at(&mut self, spec: CaptureSpec, parent: Option<PatternNodeId>) -> PatternNodeId {
        let CaptureSpec {
            name,
            min_occurs,
            max_occurs,
            greedy,
            target,
            subtype,
            strict_subtype,
            mut predicate,
            type_pattern,
        } = spec;
        if min_occurs > max_occurs && self.error.is_none() {
            self.error = Some(PatternError::InvalidBounds {
                name: name.clone(),
                min: min_occurs,
                max: max_occurs,
            });
        }
        // An expr_type constraint folds into the predicate chain; the
        // subtype flags translate to the hierarchy walk (strict excludes
        // the resolved type itself).
        if let Some(type_pattern) = type_pattern {
            let within = subtype || strict_subtype;
            match ExprTypePredicate::new(&type_pattern, within, true) {
                Ok(mut type_predicate) => {
                    if strict_subtype {
                        type_predicate = type_predicate.strict();
                    }
                    predicate = Some(match predicate {
                        None => Box::new(type_predicate),
                        Some(existing) => Box::new(
                            AndPredicate::new()
                                .add(existing)
                                .add(Box::new(type_predicate)),
                        ),
                    });
                }
                Err(error) => {
                    if self.error.is_none() {
                        self.error = Some(PatternError::InvalidTypePattern {
                            name: name.clone(),
                            error,
                        });
                    }
                }
            }
        }
        let next = CaptureId(self.capture_ids.len() as u32);
        let capture = *self.capture_ids.entry(name.clone()).or_insert(next);
        let handler = SubstitutionHandler::new(
            name,
            capture,
            min_occurs,
            max_occurs,
            greedy,
            target,
            subtype,
            strict_subtype,
            predicate,
        );
        self.push(PatternShape::Capture(handler), parent)
    }

    /// Finalizes the pattern.
    pub fn build(self) -> Result<CompiledPattern, PatternError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.roots.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        Ok(CompiledPattern {
            nodes: self.nodes,
            roots: self.roots,
            capture_count: self.capture_ids.len(),
            strategy: self.strategy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_shares_a_capture_id() {
        let mut b = PatternBuilder::new();
        b.capture(CaptureSpec::new("x").occurs(1, 3));
        b.literal(NodeKind::Literal, ";");
        b.capture(CaptureSpec::new("x").occurs(1, 3));
        b.capture(CaptureSpec::new("y"));
        let pattern = b.build().unwrap();

        assert_eq!(pattern.capture_count(), 2);
        let ids: Vec<_> = pattern
            .roots()
            .iter()
            .filter_map(|&id| pattern.handler(id))
            .map(|h| h.capture())
            .collect();
        assert_eq!(ids[0], ids[1]);
        assert_ne!(ids[0], ids[2]);
    }

    #[test]
    fn invalid_bounds_surface_at_build() {
        let mut b = PatternBuilder::new();
        b.capture(CaptureSpec::new("x").occurs(3, 1));
        match b.build() {
            Err(PatternError::InvalidBounds { name, min, max }) => {
                assert_eq!(name, "x");
                assert_eq!((min, max), (3, 1));
            }
            other => panic!("expected InvalidBounds, got {other:?}"),
        }
    }

    #[test]
    fn expr_type_constraint_becomes_a_predicate() {
        let mut b = PatternBuilder::new();
        let x = b.capture(CaptureSpec::new("x").expr_type("ArrayList").subtype());
        let pattern = b.build().unwrap();
        let handler = pattern.handler(x).unwrap();
        assert!(handler.predicate().is_some());
        assert!(handler.is_subtype());
    }

    #[test]
    fn invalid_type_pattern_surfaces_at_build() {
        let mut b = PatternBuilder::new();
        b.capture(CaptureSpec::new("x").expr_type("["));
        match b.build() {
            Err(PatternError::InvalidTypePattern { name, .. }) => assert_eq!(name, "x"),
            other => panic!("expected InvalidTypePattern, got {other:?}"),
        }
    }

    #[test]
    fn empty_pattern_is_rejected() {
        assert!(matches!(
            PatternBuilder::new().build(),
            Err(PatternError::EmptyPattern)
        ));
    }

    #[test]
    fn nested_children_attach_in_order() {
        let mut b = PatternBuilder::new();
        let call = b.literal(NodeKind::Call, "f");
        let a = b.capture_in(call, CaptureSpec::new("a"));
        let lit = b.literal_in(call, NodeKind::Literal, ",");
        let pattern = b.build().unwrap();

        assert_eq!(pattern.children(call), &[a, lit]);
        assert!(pattern.handler(a).is_some());
        assert!(pattern.handler(lit).is_none());
    }
}
