//! Statements.

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::ast::context::AstContext;
use crate::ast::node::{NodeId, NodeKind};

/// Kind-specific payload of a statement
///
/// Child-slot conventions (fixed slots; absent parts are `None`):
///
/// | kind | children |
/// |---|---|
/// | `Block` | the statements |
/// | `If` | init decl, condition, true block, else block |
/// | `While` | init decl, condition, body, else block |
/// | `For` | loop local decl, sequence expression, body |
/// | `Switch` | condition decl, case nodes |
/// | `SwitchCase` | body block, then the case expressions |
/// | `Return` | the value expression |
/// | `Assert` | condition, message expression |
/// | `Try` | body block, catch nodes |
/// | `TryCatch` | parameter decl, body block |
/// | `Declaration` | the declaration |
/// | `Expression` | the expression |
/// | `Print` | the argument expressions |
/// | `Confirm`/`Reject`/`Stop` | none |
#[derive(Debug, Clone, PartialEq, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(StatementClass))]
pub enum StatementKind {
    Block,
    If,
    While,
    For,
    Switch,
    SwitchCase {
        /// Set once the resolver has rewritten the case expressions into
        /// `condition == case` comparisons
        preprocessed: bool,
    },
    Return,
    Assert,
    Try,
    TryCatch,
    Declaration,
    Expression,
    /// Spicy `print`; lowered to a runtime call
    Print,
    /// Spicy `confirm`; leaves trial mode successfully
    Confirm,
    /// Spicy `reject`; fails the unit from trial mode
    Reject,
    /// Spicy `stop`; stops a container loop early
    Stop,
}

/// A statement node payload
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(kind: StatementKind) -> Self {
        Self { kind }
    }
}

impl AstContext {
    pub fn statement(&self, id: NodeId) -> &Statement {
        match &self.node(id).kind {
            NodeKind::Statement(statement) => statement,
            other => panic!("node {id:?} is not a statement: {other:?}"),
        }
    }

    pub fn statement_mut(&mut self, id: NodeId) -> &mut Statement {
        match &mut self.node_mut(id).kind {
            NodeKind::Statement(statement) => statement,
            other => panic!("node {id:?} is not a statement: {other:?}"),
        }
    }

    pub fn is_statement(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Statement(_))
    }
}
