//! Expressions.
//!
//! Expressions that need a synthesized type own it as their first child
//! (`ty` slot); expressions whose type derives from an operand compute it on
//! demand via [`AstContext::expression_type`]. The resolver replaces
//! `UnresolvedOperator` nodes with `ResolvedOperator` nodes in place.

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::ast::context::AstContext;
use crate::ast::declaration::DeclarationKind;
use crate::ast::id::ID;
use crate::ast::node::{NodeId, NodeKind};
use crate::operators;

/// Keywords usable in expression position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// The current unit or struct instance
    Self_,
    /// The current field value inside a hook (`$$`)
    DollarDollar,
    /// The current error scope
    Scope,
}

/// Kind-specific payload of an expression
///
/// Child-slot conventions:
///
/// | kind | children |
/// |---|---|
/// | `Name` | none |
/// | `Member` | member pseudo-type QT |
/// | `Ctor` | the ctor node |
/// | `Assign` | target, source |
/// | `LogicalAnd`/`LogicalOr` | bool QT, op0, op1 |
/// | `LogicalNot` | bool QT, op0 |
/// | `Ternary` | condition, true branch, false branch |
/// | `Keyword` | QT of the keyword's value |
/// | `Deferred` | inner expression |
/// | `ListComprehension` | result QT, input, local decl, output, condition |
/// | `ResolvedOperator` | result QT, operands |
/// | `UnresolvedOperator` | operands |
/// | `PendingCoerced`/`Coerced`/`TypeWrapped` | expression, target QT |
/// | `BuiltInFunction` | result QT, arguments |
#[derive(Debug, Clone, PartialEq, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(ExpressionClass))]
pub enum ExpressionKind {
    /// A not-yet-bound identifier; the resolver caches the declaration here
    Name { id: ID, resolved: Option<NodeId> },
    /// A member name used as an operand of member operators
    Member { id: ID },
    Ctor,
    Assign,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    Ternary,
    Keyword { keyword: Keyword },
    /// Evaluation deferred to the runtime (`&requires` expressions and the
    /// like); `catch_exception` folds runtime errors into a result
    Deferred { catch_exception: bool },
    ListComprehension { local: ID },
    /// A fully resolved operator application
    ResolvedOperator {
        kind: operators::Kind,
        /// Index of the matched operator in the registry
        operator: usize,
    },
    /// An operator application awaiting overload resolution
    UnresolvedOperator { kind: operators::Kind },
    /// A coercion the resolver has queued but not yet materialized
    PendingCoerced,
    /// A materialized coercion of the inner expression to the target type
    Coerced,
    /// A call to a runtime-provided function known by its C++-side name
    BuiltInFunction { cxx_name: String },
    /// Wraps an expression with an explicit type without converting it
    TypeWrapped,
}

/// An expression node payload
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
}

impl Expression {
    pub fn new(kind: ExpressionKind) -> Self {
        Self { kind }
    }
}

impl AstContext {
    pub fn expression(&self, id: NodeId) -> &Expression {
        match &self.node(id).kind {
            NodeKind::Expression(expression) => expression,
            other => panic!("node {id:?} is not an expression: {other:?}"),
        }
    }

    pub fn expression_mut(&mut self, id: NodeId) -> &mut Expression {
        match &mut self.node_mut(id).kind {
            NodeKind::Expression(expression) => expression,
            other => panic!("node {id:?} is not an expression: {other:?}"),
        }
    }

    pub fn is_expression(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Expression(_))
    }

    /// The qualified type of the expression, if known yet
    ///
    /// Derived types follow the operand that determines them; synthesized
    /// types come from the expression's own type child.
    pub fn expression_type(&self, id: NodeId) -> Option<NodeId> {
        match &self.expression(id).kind {
            ExpressionKind::Name { resolved, .. } => {
                let decl = (*resolved)?;
                self.declaration_type(decl)
            }
            ExpressionKind::Member { .. } => self.child(id, 0),
            ExpressionKind::Ctor => {
                let ctor = self.child(id, 0)?;
                self.ctor_type(ctor)
            }
            ExpressionKind::Assign => {
                let target = self.child(id, 0)?;
                self.expression_type(target)
            }
            ExpressionKind::LogicalAnd | ExpressionKind::LogicalOr | ExpressionKind::LogicalNot => self.child(id, 0),
            ExpressionKind::Ternary => {
                let true_branch = self.child(id, 1)?;
                self.expression_type(true_branch)
            }
            ExpressionKind::Keyword { .. } => self.child(id, 0),
            ExpressionKind::Deferred { .. } => {
                let inner = self.child(id, 0)?;
                self.expression_type(inner)
            }
            ExpressionKind::ListComprehension { .. } => self.child(id, 0),
            ExpressionKind::ResolvedOperator { .. } => self.child(id, 0),
            ExpressionKind::UnresolvedOperator { .. } => None,
            ExpressionKind::PendingCoerced => None,
            ExpressionKind::Coerced => self.child(id, 1),
            ExpressionKind::BuiltInFunction { .. } => self.child(id, 0),
            ExpressionKind::TypeWrapped => self.child(id, 1),
        }
    }

    /// Whether the expression has been fully resolved
    pub fn expression_is_resolved(&self, id: NodeId) -> bool {
        match &self.expression(id).kind {
            ExpressionKind::UnresolvedOperator { .. } | ExpressionKind::PendingCoerced => false,
            _ => self.expression_type(id).is_some(),
        }
    }

    /// Whether the expression denotes a compile-time constant
    pub fn expression_is_constant(&self, id: NodeId) -> bool {
        match &self.expression(id).kind {
            ExpressionKind::Ctor => true,
            ExpressionKind::Name { resolved: Some(decl), .. } => {
                matches!(self.declaration(*decl).kind, DeclarationKind::Constant)
            }
            ExpressionKind::LogicalAnd | ExpressionKind::LogicalOr => {
                let a = self.child(id, 1);
                let b = self.child(id, 2);
                matches!((a, b), (Some(a), Some(b)) if self.expression_is_constant(a) && self.expression_is_constant(b))
            }
            ExpressionKind::LogicalNot => matches!(self.child(id, 1), Some(op) if self.expression_is_constant(op)),
            ExpressionKind::Coerced | ExpressionKind::TypeWrapped => {
                matches!(self.child(id, 0), Some(inner) if self.expression_is_constant(inner))
            }
            _ => false,
        }
    }

    /// The operand expressions of an operator application
    pub fn operator_operands(&self, id: NodeId) -> Vec<NodeId> {
        match &self.expression(id).kind {
            ExpressionKind::ResolvedOperator { .. } => self.children(id).skip(1).collect(),
            ExpressionKind::UnresolvedOperator { .. } => self.children(id).collect(),
            _ => Vec::new(),
        }
    }
}
