//! The operator registry.
//!
//! Operators are descriptors: a kind, operand specifications, and a result
//! specification. Each pipeline carries its own [`registry::Registry`]
//! rather than relying on process-wide state. Registration places an
//! operator in the *pending* list; `init_pending` materializes pending
//! entries against the live AST (some operators wait for a type to exist
//! first) and indexes them by name, kind, method identifier, and builtin
//! identifier.
//!
//! After the resolver's fixed point no builtin operator may remain pending;
//! `Registry::assert_no_pending` enforces that.

pub mod registry;
pub mod signature;
pub mod tables;

pub use registry::{Operator, Registry};
pub use signature::{Operand, OperandKind, ResultSpec, TypeSpec};

/// All operator kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Kind {
    /// Add an element to a set
    Add,
    Begin,
    BitAnd,
    BitOr,
    BitXor,
    Call,
    Cast,
    CustomAssign,
    DecrPostfix,
    DecrPrefix,
    /// Remove an element from a set or map
    Delete,
    Deref,
    Difference,
    DifferenceAssign,
    Division,
    DivisionAssign,
    End,
    Equal,
    Greater,
    GreaterEqual,
    HasMember,
    In,
    IncrPostfix,
    IncrPrefix,
    Index,
    IndexAssign,
    Lower,
    LowerEqual,
    Member,
    MemberCall,
    Modulo,
    Multiple,
    MultipleAssign,
    Negate,
    New,
    Pack,
    Power,
    ShiftLeft,
    ShiftRight,
    SignNeg,
    SignPos,
    Size,
    Sum,
    SumAssign,
    TryMember,
    Unequal,
    Unknown,
    Unpack,
    Unset,
}

impl Kind {
    /// Operators where `a op b` can also match as `b op a`
    pub fn is_commutative(&self) -> bool {
        matches!(self, Kind::Equal | Kind::Unequal | Kind::Sum | Kind::Multiple | Kind::BitAnd | Kind::BitOr | Kind::BitXor)
    }
}
