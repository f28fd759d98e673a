//! The AST node: shared header plus a kind-specific payload.
//!
//! Nodes live in the arena owned by [`AstContext`](crate::ast::context::
//! AstContext) and reference each other by [`NodeId`]. The `children` list is
//! the ownership tree; every other node reference anywhere in a payload is a
//! weak link that does not keep its target alive and does not participate in
//! the acyclicity invariant.

use crate::ast::attribute::{Attribute, AttributeSet};
use crate::ast::ctor::Ctor;
use crate::ast::declaration::{Declaration, Function};
use crate::ast::expression::Expression;
use crate::ast::meta::Meta;
use crate::ast::scope::Scope;
use crate::ast::statement::Statement;
use crate::ast::types::{QualifiedType, UnqualifiedType};
use crate::error::ErrorPriority;
use crate::span::SpanInfo;
use crate::spicy::unit::UnitItem;

/// Identity of a node within its owning context
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Sentinel for an invalid or not-yet-assigned node
    pub const UNDEFINED: Self = NodeId(usize::MAX);
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

/// An error recorded on a node during validation or resolution
#[derive(Debug, Clone, PartialEq)]
pub struct NodeError {
    pub message: String,
    pub priority: ErrorPriority,
    /// Filled in from the nearest enclosing node location at collection time
    /// when the recording site had none
    pub location: Option<SpanInfo>,
}

/// The kind tag and payload of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// The context's root; children are module declarations plus the
    /// operator signature holder
    Root,
    Declaration(Declaration),
    Expression(Expression),
    Statement(Statement),
    Ctor(Ctor),
    Type(UnqualifiedType),
    QualifiedType(QualifiedType),
    Attribute(Attribute),
    AttributeSet(AttributeSet),
    Function(Function),
    /// A Spicy unit item (field, variable, property, inline hook)
    UnitItem(UnitItem),
}

/// An AST node
#[derive(Debug, Clone)]
pub struct Node {
    /// This node's identity in the owning context
    pub id: NodeId,
    /// Owning parent, maintained by the context on attach/detach
    pub parent: Option<NodeId>,
    /// Ordered children; `None` marks an empty fixed slot
    pub children: Vec<Option<NodeId>>,
    pub meta: Meta,
    /// Lexical scope, created lazily by the scope builder
    pub scope: Option<Box<Scope>>,
    /// Errors recorded during the current resolver round
    pub errors: Vec<NodeError>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind, meta: Meta) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            meta,
            scope: None,
            errors: Vec::new(),
            kind,
        }
    }

    /// Records an error with [`ErrorPriority::Normal`]
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.add_error_with_priority(message, ErrorPriority::Normal);
    }

    pub fn add_error_with_priority(&mut self, message: impl Into<String>, priority: ErrorPriority) {
        self.errors.push(NodeError {
            message: message.into(),
            priority,
            location: self.meta.location.clone(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The scope of this node, creating it on first access
    pub fn scope_mut(&mut self) -> &mut Scope {
        self.scope.get_or_insert_with(Default::default)
    }
}
