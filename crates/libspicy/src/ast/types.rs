//! The type system: unqualified types, qualified wrappers, and the structural
//! queries the rest of the pipeline relies on.
//!
//! # Overview
//!
//! Types are AST nodes like everything else. An unqualified type carries its
//! class-specific payload plus three cross-cutting pieces of state:
//!
//! - the **unification string**, a structural fingerprint set exactly once by
//!   the type unifier; two types are equal iff their strings are equal
//! - the **wildcard** flag (`T<*>`), which matches any concrete instance of
//!   the same class during coercion but fails strict equality
//! - a weak **declaration backlink** to the type declaration that introduced
//!   the type, which gives declared types their nominal identity
//!
//! A [`QualifiedType`] wraps an unqualified type with constness and an
//! LHS/RHS side marker. Reading a qualified type's underlying type follows
//! `Name` references implicitly; see [`AstContext::inner_type`].
//!
//! Component types referenced by a type (element types, iterator types, view
//! types, function results) are regular owned children of the type node.
//! Backlinks and resolved `Name` targets are weak: they are plain node ids
//! stored in the payload and do not participate in ownership.

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::ast::context::AstContext;
use crate::ast::id::ID;
use crate::ast::node::{NodeId, NodeKind};
use crate::spicy::unit::UnitType;

/// Constness marker of a qualified type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constness {
    Const,
    NonConst,
}

/// Whether an expression of this type can appear on the left of an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Lhs,
    Rhs,
}

/// A unqualified type together with constness and side
///
/// Child slot 0 holds the owned unqualified type, unless `external` points to
/// an unqualified type owned elsewhere; the external form breaks ownership
/// cycles where a container type mentions its own iterator.
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedType {
    pub constness: Constness,
    pub side: Side,
    /// Weak pointer to an already-embedded unqualified type; when set, child
    /// slot 0 is empty
    pub external: Option<NodeId>,
}

/// The sentinel unification string that fails every structural comparison
pub const NEVER_MATCH: &str = "<never>";

/// Function flavor, relevant for hook multi-dispatch and calling conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionFlavor {
    Function,
    Method,
    Hook,
}

/// One label of an enum type
#[derive(Debug, Clone, PartialEq)]
pub struct EnumLabel {
    pub id: ID,
    pub value: u64,
}

/// One named bit range of a bitfield type
#[derive(Debug, Clone, PartialEq)]
pub struct BitRange {
    pub id: ID,
    pub lower: u32,
    pub upper: u32,
}

/// Class-specific payload of an unqualified type
///
/// Child-slot conventions, where a class has component types:
///
/// | class | children |
/// |---|---|
/// | `List`/`Vector`/`Set` | element QT, iterator QT |
/// | `Map` | key QT, value QT, iterator QT |
/// | `Bytes` | element QT, iterator QT |
/// | `Stream` | element QT, iterator QT, view QT |
/// | `StreamView` | element QT, iterator QT |
/// | `Iterator`/`BytesIterator`/`StreamIterator` | element QT |
/// | `Optional`/`Result_`/references | dereferenced QT |
/// | `Tuple` | element QTs |
/// | `Struct`/`Union` | self decl, parameter decls, field decls |
/// | `Function` | result QT, parameter decls |
/// | `OperandList` | operand QTs |
/// | `Type_` | wrapped QT |
/// | `Unit` | parameter decls, item nodes |
#[derive(Debug, Clone, PartialEq, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(TypeClass), derive(Hash))]
pub enum TypeKind {
    Bool,
    SignedInteger { width: u16 },
    UnsignedInteger { width: u16 },
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
    Enum { labels: Vec<EnumLabel> },
    Bitfield { width: u32, bits: Vec<BitRange> },
    Struct { param_count: usize },
    Tuple { names: Vec<Option<ID>> },
    Union,
    List,
    Vector,
    Set,
    Map,
    /// Generic container iterator; element type is child 0
    Iterator,
    Optional,
    Result_,
    StrongReference,
    WeakReference,
    ValueReference,
    Function { flavor: FunctionFlavor },
    /// Internal: the operand list of an operator signature
    OperandList,
    /// An unresolved reference to a declared type
    Name { id: ID, resolved: Option<NodeId> },
    Unknown,
    Auto,
    Void,
    /// Type-of-type; wraps the represented type
    Type_,
    /// A member name used as a pseudo-type in operator signatures
    Member { id: ID },
    /// An opaque type known only by its C++-side name
    Library { cxx_name: String },
    /// A Spicy unit type (compiled away by the lowering pass)
    Unit(Box<UnitType>),
    /// A Spicy sink (lowered to a strong reference to the runtime sink type)
    Sink,
}

/// An unqualified type node payload
#[derive(Debug, Clone, PartialEq)]
pub struct UnqualifiedType {
    pub kind: TypeKind,
    /// Structural fingerprint; `None` until the unifier computes it
    pub unification: Option<String>,
    /// `T<*>`: matches any concrete instance of the same class
    pub wildcard: bool,
    /// Weak backlink to the declaration introducing this type
    pub declaration: Option<NodeId>,
}

impl UnqualifiedType {
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            unification: None,
            wildcard: false,
            declaration: None,
        }
    }

    pub fn wildcard(kind: TypeKind) -> Self {
        Self {
            wildcard: true,
            ..Self::new(kind)
        }
    }

    pub fn class(&self) -> TypeClass {
        TypeClass::from(&self.kind)
    }

    /// Whether instances of the type can be created at runtime
    pub fn is_allocable(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool
                | TypeKind::SignedInteger { .. }
                | TypeKind::UnsignedInteger { .. }
                | TypeKind::Real
                | TypeKind::Interval
                | TypeKind::Time
                | TypeKind::Address
                | TypeKind::String_
                | TypeKind::Bytes
                | TypeKind::Stream
                | TypeKind::RegExp
                | TypeKind::Enum { .. }
                | TypeKind::Bitfield { .. }
                | TypeKind::Struct { .. }
                | TypeKind::Tuple { .. }
                | TypeKind::Union
                | TypeKind::List
                | TypeKind::Vector
                | TypeKind::Set
                | TypeKind::Map
                | TypeKind::Optional
                | TypeKind::Result_
                | TypeKind::ValueReference
                | TypeKind::Unit(_)
                | TypeKind::Sink
        )
    }

    /// Whether values of the type can be modified in place
    pub fn is_mutable(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bytes
                | TypeKind::Stream
                | TypeKind::Struct { .. }
                | TypeKind::Union
                | TypeKind::Vector
                | TypeKind::Set
                | TypeKind::Map
                | TypeKind::StrongReference
                | TypeKind::WeakReference
                | TypeKind::ValueReference
                | TypeKind::Unit(_)
                | TypeKind::Sink
        )
    }

    /// Whether equality of this type is nominal rather than structural
    pub fn is_name_type(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Enum { .. } | TypeKind::Struct { .. } | TypeKind::Union | TypeKind::Bitfield { .. } | TypeKind::Unit(_) | TypeKind::Library { .. }
        )
    }

    pub fn is_reference_type(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::StrongReference | TypeKind::WeakReference | TypeKind::ValueReference
        )
    }

    /// Shallow resolvedness; component types are checked by the unifier
    pub fn is_resolved(&self) -> bool {
        match &self.kind {
            TypeKind::Name { resolved, .. } => resolved.is_some(),
            TypeKind::Auto | TypeKind::Unknown => false,
            _ => true,
        }
    }

    /// Whether values can be ordered with `<`
    pub fn is_sortable(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool
                | TypeKind::SignedInteger { .. }
                | TypeKind::UnsignedInteger { .. }
                | TypeKind::Real
                | TypeKind::Interval
                | TypeKind::Time
                | TypeKind::Address
                | TypeKind::String_
                | TypeKind::Bytes
                | TypeKind::Stream
                | TypeKind::Enum { .. }
                | TypeKind::Tuple { .. }
        )
    }
}

impl AstContext {
    /// The payload of a qualified type node
    pub fn qtype(&self, id: NodeId) -> &QualifiedType {
        match &self.node(id).kind {
            NodeKind::QualifiedType(qt) => qt,
            other => panic!("node {id:?} is not a qualified type: {other:?}"),
        }
    }

    pub fn qtype_mut(&mut self, id: NodeId) -> &mut QualifiedType {
        match &mut self.node_mut(id).kind {
            NodeKind::QualifiedType(qt) => qt,
            other => panic!("node {id:?} is not a qualified type: {other:?}"),
        }
    }

    /// The payload of an unqualified type node
    pub fn utype(&self, id: NodeId) -> &UnqualifiedType {
        match &self.node(id).kind {
            NodeKind::Type(ty) => ty,
            other => panic!("node {id:?} is not a type: {other:?}"),
        }
    }

    pub fn utype_mut(&mut self, id: NodeId) -> &mut UnqualifiedType {
        match &mut self.node_mut(id).kind {
            NodeKind::Type(ty) => ty,
            other => panic!("node {id:?} is not a type: {other:?}"),
        }
    }

    /// True if the node is an unqualified type
    pub fn is_utype(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Type(_))
    }

    /// The unqualified type a qualified type wraps, without following names
    pub fn inner_type_raw(&self, qtype: NodeId) -> NodeId {
        let payload = self.qtype(qtype);
        if let Some(external) = payload.external {
            return external;
        }
        self.child(qtype, 0).expect("qualified type without inner type")
    }

    /// The unqualified type a qualified type wraps, following `Name` chains
    pub fn inner_type(&self, qtype: NodeId) -> NodeId {
        self.follow(self.inner_type_raw(qtype))
    }

    /// Walks `Name` references until a non-name or an unresolved name
    pub fn follow(&self, mut ty: NodeId) -> NodeId {
        loop {
            match &self.utype(ty).kind {
                TypeKind::Name { resolved: Some(decl), .. } => {
                    // A name resolves to a type declaration; its type is the
                    // declaration's qualified type child.
                    let Some(decl_type) = self.declaration_type(*decl) else { return ty };
                    ty = self.inner_type_raw(decl_type);
                }
                _ => return ty,
            }
        }
    }

    /// The fully-qualified ID of the type's declaration, if any
    pub fn type_id(&self, ty: NodeId) -> Option<ID> {
        let decl = self.utype(ty).declaration?;
        self.declaration(decl).fully_qualified_id.clone()
    }

    /// The C++-side name of a library type, if this is one
    pub fn type_cxx_name(&self, ty: NodeId) -> Option<&str> {
        match &self.utype(ty).kind {
            TypeKind::Library { cxx_name } => Some(cxx_name),
            _ => None,
        }
    }

    /// Element type projection (containers, bytes, stream, iterators)
    pub fn element_type(&self, ty: NodeId) -> Option<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::List | TypeKind::Vector | TypeKind::Set | TypeKind::Bytes | TypeKind::Stream | TypeKind::StreamView => self.child(ty, 0),
            TypeKind::Map => self.child(ty, 1),
            TypeKind::Iterator | TypeKind::BytesIterator | TypeKind::StreamIterator => self.child(ty, 0),
            _ => None,
        }
    }

    /// Key type projection (maps only)
    pub fn key_type(&self, ty: NodeId) -> Option<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::Map => self.child(ty, 0),
            _ => None,
        }
    }

    /// Dereference projection (references, optional, result, type-of-type,
    /// iterators)
    pub fn dereferenced_type(&self, ty: NodeId) -> Option<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::Optional
            | TypeKind::Result_
            | TypeKind::StrongReference
            | TypeKind::WeakReference
            | TypeKind::ValueReference
            | TypeKind::Type_
            | TypeKind::Iterator
            | TypeKind::BytesIterator
            | TypeKind::StreamIterator => self.child(ty, 0),
            _ => None,
        }
    }

    /// Iterator type projection
    pub fn iterator_type(&self, ty: NodeId) -> Option<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::List | TypeKind::Vector | TypeKind::Set | TypeKind::Bytes | TypeKind::Stream | TypeKind::StreamView => self.child(ty, 1),
            TypeKind::Map => self.child(ty, 2),
            _ => None,
        }
    }

    /// View type projection (stream only)
    pub fn view_type(&self, ty: NodeId) -> Option<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::Stream => self.child(ty, 2),
            _ => None,
        }
    }

    /// Result type projection (function types)
    pub fn result_type(&self, ty: NodeId) -> Option<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::Function { .. } => self.child(ty, 0),
            _ => None,
        }
    }

    /// Parameter declarations of a function, struct, or unit type
    pub fn type_parameters(&self, ty: NodeId) -> Vec<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::Function { .. } => self.children(ty).skip(1).collect(),
            TypeKind::Struct { param_count } => self.children(ty).skip(1).take(*param_count).collect(),
            TypeKind::Unit(unit) => self.children(ty).skip(1).take(unit.param_count).collect(),
            _ => Vec::new(),
        }
    }

    /// Field declarations of a struct or union type
    pub fn type_fields(&self, ty: NodeId) -> Vec<NodeId> {
        let ty = self.follow(ty);
        match &self.utype(ty).kind {
            TypeKind::Struct { param_count } => self.children(ty).skip(1 + param_count).collect(),
            TypeKind::Union => self.children(ty).collect(),
            _ => Vec::new(),
        }
    }

    /// Structural equality; requires both sides to be unified
    pub fn same_type(&self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return true;
        }

        let a = self.follow(a);
        let b = self.follow(b);
        let (ta, tb) = (self.utype(a), self.utype(b));

        if let (Some(ua), Some(ub)) = (&ta.unification, &tb.unification) {
            if !ua.is_empty() && ua != NEVER_MATCH && ua == ub {
                return true;
            }
        }

        // Wildcard matching: same class, at least one side a wildcard.
        ta.class() == tb.class() && (ta.wildcard || tb.wildcard)
    }

    /// Qualified equality: structure plus constness
    pub fn same_qualified_type(&self, a: NodeId, b: NodeId) -> bool {
        self.qtype(a).constness == self.qtype(b).constness && self.same_type(self.inner_type_raw(a), self.inner_type_raw(b))
    }

    /// Structural equality ignoring the outer const flag
    pub fn same_except_for_constness(&self, a: NodeId, b: NodeId) -> bool {
        self.same_type(self.inner_type_raw(a), self.inner_type_raw(b))
    }

    /// Records the unification string for a type. Strings are write-once;
    /// recomputing a different value for the same node is a compiler bug.
    pub fn set_unification(&mut self, ty: NodeId, unification: String) -> bool {
        let payload = self.utype_mut(ty);
        match &payload.unification {
            Some(existing) => {
                debug_assert_eq!(existing, &unification, "unification string changed for node {ty:?}");
                false
            }
            None => {
                payload.unification = Some(unification);
                true
            }
        }
    }

    /// Applies a const qualifier's constness to the component types that
    /// must share it (container elements and iterators).
    pub fn propagate_constness(&mut self, qtype: NodeId) {
        let constness = self.qtype(qtype).constness;
        if constness != Constness::Const {
            return;
        }

        let inner = self.inner_type_raw(qtype);
        let components: Vec<NodeId> = match self.utype(inner).kind {
            TypeKind::List | TypeKind::Vector | TypeKind::Set | TypeKind::Map => self.children(inner).collect(),
            _ => return,
        };

        for component in components {
            if matches!(self.node(component).kind, NodeKind::QualifiedType(_)) {
                self.qtype_mut(component).constness = Constness::Const;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_tables() {
        let stream = UnqualifiedType::new(TypeKind::Stream);
        assert!(stream.is_allocable());
        assert!(stream.is_mutable());
        assert!(stream.is_sortable());

        let auto = UnqualifiedType::new(TypeKind::Auto);
        assert!(!auto.is_resolved());
        assert!(!auto.is_allocable());

        let strong = UnqualifiedType::new(TypeKind::StrongReference);
        assert!(strong.is_reference_type());
        assert!(!strong.is_name_type());

        let name = UnqualifiedType::new(TypeKind::Name {
            id: ID::new("HTTP::Request"),
            resolved: None,
        });
        assert!(!name.is_resolved());
    }

    #[test]
    fn wildcard_construction() {
        let wildcard = UnqualifiedType::wildcard(TypeKind::Vector);
        assert!(wildcard.wildcard);
        assert_eq!(wildcard.class(), TypeClass::Vector);
    }
}
