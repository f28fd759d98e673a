//! Grammar productions.
//!
//! A production describes one step of a unit's parse. Productions live in a
//! [`Grammar`](crate::spicy::grammar::Grammar) arena and reference each other
//! by [`ProductionId`]; AST links (field items, literal ctors, types) are
//! weak node ids.

use crate::ast::node::NodeId;

/// Identity of a production within its grammar
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionId(pub usize);

/// How a literal is matched at runtime
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LiteralMode {
    /// Match and consume; failure is a parse error
    #[default]
    Default,
    /// One attempt, no input advance on failure
    Try,
    /// Advance byte-wise until the literal matches or input ends
    Search,
    /// Like `Try`, but the token value is discarded
    Skip,
}

/// Kind-specific payload of a production
#[derive(Debug, Clone, PartialEq)]
pub enum ProductionKind {
    /// Matches the empty input
    Epsilon,
    /// A literal: constant bytes, a regular expression, or an integer
    Ctor {
        /// The literal ctor node
        literal: NodeId,
        /// Token id used by combined-regex lookahead matching
        token_id: u64,
    },
    /// A typed atomic parse (integers, bytes with `&size`, ...)
    Variable { ty: NodeId },
    /// Parse and discard without storing a value
    Skip { ty: Option<NodeId> },
    /// The concatenation of a fixed sequence
    Sequence { elements: Vec<ProductionId> },
    /// Parenthesized subordinate production
    Enclosure { inner: ProductionId },
    /// Repeat `body` a computed number of times (`x: T[n]`)
    Counter { expression: NodeId, body: ProductionId },
    /// Repeat `body` until the condition expression holds (`&until`)
    ForEach {
        body: ProductionId,
        condition: Option<NodeId>,
        /// Consume the final element too (`&until-including`)
        including: bool,
    },
    /// Lookahead-driven list: repeat while the lookahead matches
    While { body: ProductionId },
    /// Tagged or unconditional branch dispatch
    Switch {
        /// The dispatch expression; `None` selects by lookahead
        condition: Option<NodeId>,
        /// Case expressions (weak) with their productions
        cases: Vec<(Vec<NodeId>, ProductionId)>,
        default: Option<ProductionId>,
    },
    /// Binary branch decided by computed first/follow sets
    LookAhead {
        alternative0: ProductionId,
        alternative1: ProductionId,
    },
    /// A forward reference resolved to another symbol
    Resolved { target: ProductionId },
    /// Invoke another unit's parser
    Unit {
        /// The unit's type node (weak)
        unit: NodeId,
        /// Arguments passed to the unit's parameters
        arguments: Vec<NodeId>,
    },
}

/// One production of a grammar
#[derive(Debug, Clone, PartialEq)]
pub struct Production {
    /// Stable symbol, unique within the grammar
    pub symbol: String,
    pub kind: ProductionKind,
    /// The unit field item this production parses into, if any (weak)
    pub field: Option<NodeId>,
    /// Whether the field is marked `&synchronize`
    pub synchronize: bool,
    /// Whether running out of data here is acceptable (`&eod`)
    pub eod_ok: bool,
}

impl Production {
    pub fn new(symbol: impl Into<String>, kind: ProductionKind) -> Self {
        Self {
            symbol: symbol.into(),
            kind,
            field: None,
            synchronize: false,
            eod_ok: false,
        }
    }

    /// Atomic productions parse without recursing into sub-productions
    pub fn is_atomic(&self) -> bool {
        matches!(
            self.kind,
            ProductionKind::Epsilon | ProductionKind::Ctor { .. } | ProductionKind::Variable { .. } | ProductionKind::Skip { .. }
        )
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ProductionKind::Ctor { .. })
    }

    /// Terminals carry a token; everything else delegates
    pub fn is_terminal(&self) -> bool {
        self.is_atomic()
    }

    pub fn is_eod_ok(&self) -> bool {
        self.eod_ok
    }

    /// The token id, for literal productions
    pub fn token_id(&self) -> Option<u64> {
        match &self.kind {
            ProductionKind::Ctor { token_id, .. } => Some(*token_id),
            _ => None,
        }
    }

    /// The right-hand-side alternatives of this production
    pub fn rhs_alternatives(&self) -> Vec<Vec<ProductionId>> {
        match &self.kind {
            ProductionKind::Sequence { elements } => vec![elements.clone()],
            ProductionKind::Enclosure { inner } => vec![vec![*inner]],
            ProductionKind::Counter { body, .. } | ProductionKind::ForEach { body, .. } | ProductionKind::While { body } => {
                vec![vec![*body], Vec::new()]
            }
            ProductionKind::Switch { cases, default, .. } => {
                let mut alternatives: Vec<Vec<ProductionId>> = cases.iter().map(|(_, production)| vec![*production]).collect();
                if let Some(default) = default {
                    alternatives.push(vec![*default]);
                }
                alternatives
            }
            ProductionKind::LookAhead { alternative0, alternative1 } => vec![vec![*alternative0], vec![*alternative1]],
            ProductionKind::Resolved { target } => vec![vec![*target]],
            _ => Vec::new(),
        }
    }
}
