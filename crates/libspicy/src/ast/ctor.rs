//! Value constructors.
//!
//! Every ctor owns its type as child slot 0 so that the type of a literal is
//! available without synthesis at query time. The resolver refines these
//! types during inference (container element types, struct ctor types).

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::ast::context::AstContext;
use crate::ast::id::ID;
use crate::ast::node::{NodeId, NodeKind};

/// Kind-specific payload of a ctor
///
/// Child-slot conventions (slot 0 is always the ctor's qualified type):
///
/// | kind | children after the type |
/// |---|---|
/// | scalar ctors | none |
/// | `Tuple`/`List`/`Vector`/`Set` | element expressions |
/// | `Map` | alternating key and value expressions |
/// | `Struct`/`Unit` | field value expressions, ids in the payload |
/// | `Optional`/`Result_` | the value expression, if non-empty |
/// | `Default_` | constructor argument expressions |
/// | `Coerced` | the original ctor |
#[derive(Debug, Clone, PartialEq, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(CtorClass))]
pub enum CtorKind {
    Bool { value: bool },
    SignedInteger { value: i64, width: u16 },
    UnsignedInteger { value: u64, width: u16 },
    Real { value: f64 },
    String_ { value: String },
    Bytes { value: Vec<u8> },
    RegExp { patterns: Vec<String> },
    Tuple,
    List,
    Vector,
    Set,
    Map,
    Struct { ids: Vec<ID> },
    Optional,
    Result_,
    Null,
    /// The default value of the ctor's type
    Default_,
    /// A ctor coerced to a different type
    Coerced,
    /// A Spicy unit instance (rewritten to a struct ctor by the lowering)
    Unit { ids: Vec<ID> },
    /// An enum label value
    Enum { label: ID },
}

/// A ctor node payload
#[derive(Debug, Clone, PartialEq)]
pub struct Ctor {
    pub kind: CtorKind,
}

impl Ctor {
    pub fn new(kind: CtorKind) -> Self {
        Self { kind }
    }
}

impl AstContext {
    pub fn ctor(&self, id: NodeId) -> &Ctor {
        match &self.node(id).kind {
            NodeKind::Ctor(ctor) => ctor,
            other => panic!("node {id:?} is not a ctor: {other:?}"),
        }
    }

    pub fn ctor_mut(&mut self, id: NodeId) -> &mut Ctor {
        match &mut self.node_mut(id).kind {
            NodeKind::Ctor(ctor) => ctor,
            other => panic!("node {id:?} is not a ctor: {other:?}"),
        }
    }

    pub fn is_ctor(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Ctor(_))
    }

    /// The qualified type of the ctor
    pub fn ctor_type(&self, id: NodeId) -> Option<NodeId> {
        self.child(id, 0)
    }

    /// The value expressions of a container or struct ctor
    pub fn ctor_values(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id).skip(1).collect()
    }
}
