//! Coarse node classification consulted before fine-grained matching.
//!
//! A strategy is a cheap admissibility test over a node's kind, used to skip
//! candidate roots that cannot possibly begin a match. Capabilities are a
//! pure function of [`NodeKind`], so strategies are stateless `Copy` values
//! shared freely by reference; there is nothing to lazily initialize and
//! nothing to lock.

use crate::node::NodeKind;

/// Capability set of a node kind.
///
/// Each flag answers "can this kind participate in matching as …".
/// Computed once per kind by [`capabilities`]; never derived from node
/// contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Carries a value and a resolvable type.
    pub expression: bool,
    /// Usable as a bare symbol reference.
    pub symbol: bool,
    /// Class-like container.
    pub class_like: bool,
    /// Statement-position node.
    pub statement: bool,
    /// Introduces a declaration.
    pub declaration: bool,
    /// Type-position node.
    pub type_like: bool,
}

/// Returns the capability set for a node kind.
pub const fn capabilities(kind: NodeKind) -> Capabilities {
    match kind {
        NodeKind::File => Capabilities {
            class_like: true,
            ..EMPTY
        },
        NodeKind::Class => Capabilities {
            class_like: true,
            declaration: true,
            symbol: true,
            ..EMPTY
        },
        NodeKind::Method => Capabilities {
            declaration: true,
            symbol: true,
            ..EMPTY
        },
        NodeKind::Variable => Capabilities {
            declaration: true,
            symbol: true,
            statement: true,
            ..EMPTY
        },
        NodeKind::Statement => Capabilities {
            statement: true,
            ..EMPTY
        },
        NodeKind::Expression | NodeKind::Call => Capabilities {
            expression: true,
            statement: true,
            symbol: true,
            ..EMPTY
        },
        NodeKind::Identifier => Capabilities {
            expression: true,
            symbol: true,
            ..EMPTY
        },
        NodeKind::Literal => Capabilities {
            expression: true,
            statement: true,
            ..EMPTY
        },
        NodeKind::TypeElement | NodeKind::TypeParameter => Capabilities {
            type_like: true,
            symbol: true,
            ..EMPTY
        },
        NodeKind::Annotation => Capabilities {
            declaration: true,
            symbol: true,
            ..EMPTY
        },
        NodeKind::Comment => EMPTY,
    }
}

const EMPTY: Capabilities = Capabilities {
    expression: false,
    symbol: false,
    class_like: false,
    statement: false,
    declaration: false,
    type_like: false,
};

/// Coarse matching strategy chosen per compiled pattern.
///
/// `Any` admits every kind and is the default; the named strategies admit
/// the corresponding capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchingStrategy {
    /// Admit all node kinds.
    #[default]
    Any,
    /// Expression-position candidates only.
    Expressions,
    /// Symbol references (identifiers, named declarations, types).
    Symbols,
    /// Class-like candidates only.
    Classes,
    /// Statement-position candidates only.
    Statements,
    /// Declarations only.
    Declarations,
}

impl MatchingStrategy {
    /// Returns whether the strategy admits a node of the given kind.
    pub fn admits(&self, kind: NodeKind) -> bool {
        let caps = capabilities(kind);
        match self {
            MatchingStrategy::Any => true,
            MatchingStrategy::Expressions => caps.expression,
            MatchingStrategy::Symbols => caps.symbol,
            MatchingStrategy::Classes => caps.class_like,
            MatchingStrategy::Statements => caps.statement,
            MatchingStrategy::Declarations => caps.declaration,
        }
    }
}
