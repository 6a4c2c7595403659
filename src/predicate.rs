//! Boolean predicates evaluated against one candidate node.
//!
//! Predicates gate what a capture may bind: a text/name test against a
//! regular expression, and an expression-type test with an optional walk up
//! the type hierarchy. Evaluation is pure: a predicate never records
//! bindings and never mutates the candidate tree. Failure is always
//! `false`, never an error; a candidate whose type cannot be resolved simply
//! does not satisfy a type predicate.

use regex::{Regex, RegexBuilder};
use std::fmt;

use crate::context::MatchContext;
use crate::node::{NodeId, NodeKind, TypeId};
use crate::strategy::capabilities;

/// Boolean test over one candidate node.
pub trait Predicate: fmt::Debug {
    /// Returns whether `candidate` satisfies this predicate.
    fn evaluate(&self, candidate: NodeId, context: &MatchContext<'_>) -> bool;
}

/// Matches a candidate's textual representation against a regular
/// expression.
///
/// The expression is implicitly anchored: it must cover the whole text, the
/// way a name constraint is expected to behave.
#[derive(Debug, Clone)]
pub struct RegexPredicate {
    regex: Regex,
    case_sensitive: bool,
}

impl RegexPredicate {
    /// Compiles a predicate from a pattern.
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self, regex::Error> {
        let anchored = format!("^(?:{pattern})$");
        let regex = RegexBuilder::new(&anchored)
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self { regex, case_sensitive })
    }

    /// Whether matching distinguishes case.
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Applies the predicate to a bare string.
    pub fn match_text(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl Predicate for RegexPredicate {
    fn evaluate(&self, candidate: NodeId, context: &MatchContext<'_>) -> bool {
        self.match_text(context.tree().text(candidate))
    }
}

/// Tests the resolved type of a candidate expression.
///
/// A bare identifier is promoted to its parent expression before type
/// resolution, since identifier tokens carry no type of their own. For a
/// user-defined class type, the inner regex is applied either to the type
/// itself or, with `within_hierarchy`, to each ancestor walking outward
/// until one satisfies it. Non-class types are tested by name directly.
#[derive(Debug)]
pub struct ExprTypePredicate {
    delegate: RegexPredicate,
    within_hierarchy: bool,
    strict: bool,
}

impl ExprTypePredicate {
    /// Creates a type predicate from a type-name pattern.
    pub fn new(
        type_pattern: &str,
        within_hierarchy: bool,
        case_sensitive: bool,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            delegate: RegexPredicate::new(type_pattern, case_sensitive)?,
            within_hierarchy,
            strict: false,
        })
    }

    /// Restricts the hierarchy walk to strict ancestors: the resolved type
    /// itself never counts as a hit. Implies the hierarchy walk.
    pub fn strict(mut self) -> Self {
        self.within_hierarchy = true;
        self.strict = true;
        self
    }

    fn check_type(&self, ty: TypeId, context: &MatchContext<'_>) -> bool {
        let types = context.tree().types();
        if !types.is_class_type(ty) {
            return self.delegate.match_text(types.name(ty));
        }
        if self.within_hierarchy {
            // Walk outward; true iff the walk stops on a hit.
            let skip = usize::from(self.strict);
            types
                .ancestors(ty)
                .skip(skip)
                .any(|ancestor| self.delegate.match_text(types.name(ancestor)))
        } else {
            self.delegate.match_text(types.name(ty))
        }
    }
}

impl Predicate for ExprTypePredicate {
    fn evaluate(&self, candidate: NodeId, context: &MatchContext<'_>) -> bool {
        let tree = context.tree();
        let node = if tree.kind(candidate) == NodeKind::Identifier {
            // Identifier tokens are picked up directly; the type lives on
            // the enclosing expression.
            match tree.parent(candidate) {
                Some(parent) => parent,
                None => return false,
            }
        } else {
            candidate
        };

        if !capabilities(tree.kind(node)).expression {
            return false;
        }
        match tree.expr_type(node) {
            Some(ty) => self.check_type(ty, context),
            None => false,
        }
    }
}

/// Conjunction of predicates; satisfied when every link in the chain is.
#[derive(Debug, Default)]
pub struct AndPredicate {
    links: Vec<Box<dyn Predicate>>,
}

impl AndPredicate {
    /// Creates an empty chain (which accepts everything).
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Appends a predicate to the chain.
    pub fn add(mut self, predicate: Box<dyn Predicate>) -> Self {
        self.links.push(predicate);
        self
    }
}

impl Predicate for AndPredicate {
    fn evaluate(&self, candidate: NodeId, context: &MatchContext<'_>) -> bool {
        self.links.iter().all(|p| p.evaluate(candidate, context))
    }
}
