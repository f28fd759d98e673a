//! Operator signatures: operand and result specifications.
//!
//! Signatures are written as data, not as live AST: a [`TypeSpec`] names the
//! type an operand must have (possibly as a class wildcard), and
//! materialization turns it into a real type node owned by the context's
//! operator holder. Result types are computed per instantiation from the
//! matched operands.

use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::id::ID;
use crate::ast::node::NodeId;
use crate::ast::types::{Constness, FunctionFlavor, Side, TypeKind};

/// How an operand is passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    In,
    InOut,
    Copy,
    Unknown,
}

/// The type an operand or result must have
///
/// `*Any` variants are class wildcards; they match any concrete instance of
/// the class during coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Bool,
    SignedInteger(u16),
    UnsignedInteger(u16),
    SignedIntegerAny,
    UnsignedIntegerAny,
    Real,
    Interval,
    Time,
    Address,
    String_,
    Bytes,
    BytesIterator,
    Stream,
    StreamIterator,
    StreamView,
    RegExp,
    EnumAny,
    BitfieldAny,
    StructAny,
    UnionAny,
    TupleAny,
    ListAny,
    VectorAny,
    SetAny,
    MapAny,
    OptionalAny,
    ResultAny,
    StrongRefAny,
    WeakRefAny,
    ValueRefAny,
    FunctionAny,
    UnitAny,
    Sink,
    MemberAny,
    TypeAny,
    Void,
    /// An opaque runtime type known by its C++-side name
    Library(&'static str),
    /// A reference to a declared type by name, resolved at materialization
    Named(ID),
    OptionalOf(Box<TypeSpec>),
    ResultOf(Box<TypeSpec>),
    StrongRefOf(Box<TypeSpec>),
    VectorOf(Box<TypeSpec>),
    TupleOf(Vec<TypeSpec>),
}

impl TypeSpec {
    /// Materializes the spec as an unqualified type node
    pub fn materialize(&self, builder: &mut Builder<'_>) -> NodeId {
        match self {
            TypeSpec::Bool => builder.bool_type(),
            TypeSpec::SignedInteger(width) => builder.int_type(*width),
            TypeSpec::UnsignedInteger(width) => builder.uint_type(*width),
            TypeSpec::SignedIntegerAny => builder.wildcard_type(TypeKind::SignedInteger { width: 0 }),
            TypeSpec::UnsignedIntegerAny => builder.wildcard_type(TypeKind::UnsignedInteger { width: 0 }),
            TypeSpec::Real => builder.real_type(),
            TypeSpec::Interval => builder.type_node(TypeKind::Interval),
            TypeSpec::Time => builder.type_node(TypeKind::Time),
            TypeSpec::Address => builder.type_node(TypeKind::Address),
            TypeSpec::String_ => builder.string_type(),
            TypeSpec::Bytes => builder.bytes_type(),
            TypeSpec::BytesIterator => builder.wildcard_type(TypeKind::BytesIterator),
            TypeSpec::Stream => builder.stream_type(),
            TypeSpec::StreamIterator => builder.stream_iterator_type(),
            TypeSpec::StreamView => builder.stream_view_type(),
            TypeSpec::RegExp => builder.regexp_type(),
            TypeSpec::EnumAny => builder.wildcard_type(TypeKind::Enum { labels: Vec::new() }),
            TypeSpec::BitfieldAny => builder.wildcard_type(TypeKind::Bitfield { width: 0, bits: Vec::new() }),
            TypeSpec::StructAny => builder.wildcard_type(TypeKind::Struct { param_count: 0 }),
            TypeSpec::UnionAny => builder.wildcard_type(TypeKind::Union),
            TypeSpec::TupleAny => builder.wildcard_type(TypeKind::Tuple { names: Vec::new() }),
            TypeSpec::ListAny => builder.wildcard_type(TypeKind::List),
            TypeSpec::VectorAny => builder.wildcard_type(TypeKind::Vector),
            TypeSpec::SetAny => builder.wildcard_type(TypeKind::Set),
            TypeSpec::MapAny => builder.wildcard_type(TypeKind::Map),
            TypeSpec::OptionalAny => builder.wildcard_type(TypeKind::Optional),
            TypeSpec::ResultAny => builder.wildcard_type(TypeKind::Result_),
            TypeSpec::StrongRefAny => builder.wildcard_type(TypeKind::StrongReference),
            TypeSpec::WeakRefAny => builder.wildcard_type(TypeKind::WeakReference),
            TypeSpec::ValueRefAny => builder.wildcard_type(TypeKind::ValueReference),
            TypeSpec::FunctionAny => builder.wildcard_type(TypeKind::Function {
                flavor: FunctionFlavor::Function,
            }),
            TypeSpec::UnitAny => builder.wildcard_type(TypeKind::Unit(Box::default())),
            TypeSpec::Sink => builder.sink_type(),
            TypeSpec::MemberAny => builder.wildcard_type(TypeKind::Member { id: ID::default() }),
            TypeSpec::TypeAny => builder.wildcard_type(TypeKind::Type_),
            TypeSpec::Void => builder.void_type(),
            TypeSpec::Library(cxx_name) => builder.library_type(*cxx_name),
            TypeSpec::Named(id) => builder.name_type(id.clone()),
            TypeSpec::OptionalOf(inner) => {
                let inner = inner.materialize(builder);
                let inner_qt = builder.qtype_nonconst(inner);
                builder.optional_type(inner_qt)
            }
            TypeSpec::ResultOf(inner) => {
                let inner = inner.materialize(builder);
                let inner_qt = builder.qtype_nonconst(inner);
                builder.result_type(inner_qt)
            }
            TypeSpec::StrongRefOf(inner) => {
                let inner = inner.materialize(builder);
                let inner_qt = builder.qtype_nonconst(inner);
                builder.strong_reference_type(inner_qt)
            }
            TypeSpec::VectorOf(inner) => {
                let inner = inner.materialize(builder);
                let inner_qt = builder.qtype_nonconst(inner);
                builder.vector_type(inner_qt)
            }
            TypeSpec::TupleOf(elements) => {
                let elements = elements
                    .iter()
                    .map(|element| {
                        let ty = element.materialize(builder);
                        (None, builder.qtype_nonconst(ty))
                    })
                    .collect::<Vec<_>>();
                builder.tuple_type(elements)
            }
        }
    }
}

/// One operand of an operator signature
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub kind: OperandKind,
    /// `None` matches any operand type
    pub ty: Option<TypeSpec>,
    pub id: Option<&'static str>,
    pub optional: bool,
}

impl Operand {
    pub fn new(kind: OperandKind, ty: TypeSpec) -> Self {
        Self {
            kind,
            ty: Some(ty),
            id: None,
            optional: false,
        }
    }

    pub fn any(kind: OperandKind) -> Self {
        Self {
            kind,
            ty: None,
            id: None,
            optional: false,
        }
    }

    pub fn named(mut self, id: &'static str) -> Self {
        self.id = Some(id);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// How the result type of an operator application is computed
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSpec {
    /// A fixed type, independent of the operands
    Fixed(TypeSpec, Constness),
    /// The qualified type of operand `i`
    OperandType(usize),
    /// The element type of operand `i`'s type
    ElementOf(usize),
    /// The dereferenced type of operand `i`'s type
    DerefOf(usize),
    /// The iterator type of operand `i`'s type
    IteratorOf(usize),
    /// The view type of operand `i`'s type
    ViewOf(usize),
    /// The type of the member named by operand 1 inside operand 0's type
    MemberOf,
    /// Like `MemberOf` but wrapped in `optional<...>`
    TryMemberOf,
    /// The result type of the called function (operand 0)
    CallResult,
    /// The target type named by a type operand (cast, new, pack)
    TypeOperand(usize),
}

/// Computes the result qualified type for an operator application.
///
/// Returns a freshly owned (detached) qualified type node, deep-copied from
/// the determining operand where needed.
pub fn compute_result(context: &mut AstContext, result: &ResultSpec, operand_types: &[Option<NodeId>]) -> Option<NodeId> {
    let copy_of = |context: &mut AstContext, qt: NodeId| context.deep_copy(qt);

    match result {
        ResultSpec::Fixed(spec, constness) => {
            let mut builder = Builder::new(context);
            let ty = spec.materialize(&mut builder);
            Some(builder.qtype(ty, *constness, Side::Rhs))
        }
        ResultSpec::OperandType(i) => {
            let qt = (*operand_types.get(*i)?)?;
            Some(copy_of(context, qt))
        }
        ResultSpec::ElementOf(i) => {
            let qt = (*operand_types.get(*i)?)?;
            let element = context.element_type(context.inner_type(qt))?;
            Some(copy_of(context, element))
        }
        ResultSpec::DerefOf(i) => {
            let qt = (*operand_types.get(*i)?)?;
            let deref = context.dereferenced_type(context.inner_type(qt))?;
            Some(copy_of(context, deref))
        }
        ResultSpec::IteratorOf(i) => {
            let qt = (*operand_types.get(*i)?)?;
            let iterator = context.iterator_type(context.inner_type(qt))?;
            Some(copy_of(context, iterator))
        }
        ResultSpec::ViewOf(i) => {
            let qt = (*operand_types.get(*i)?)?;
            let view = context.view_type(context.inner_type(qt))?;
            Some(copy_of(context, view))
        }
        // MemberOf, TryMemberOf, CallResult, and TypeOperand need expression
        // context beyond the operand types; the resolver computes those
        // directly.
        ResultSpec::MemberOf | ResultSpec::TryMemberOf | ResultSpec::CallResult | ResultSpec::TypeOperand(_) => None,
    }
}
