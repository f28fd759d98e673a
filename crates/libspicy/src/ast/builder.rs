//! Node factories.
//!
//! `Builder` is the construction API over an [`AstContext`]: one factory
//! method per node class, each returning the new node's id with all children
//! attached. Front-end plugins build modules through this, and the lowering
//! and parser-builder passes use it to synthesize HILTI code.

use crate::ast::attribute::{Attribute, AttributeKind, AttributeSet};
use crate::ast::context::AstContext;
use crate::ast::ctor::{Ctor, CtorKind};
use crate::ast::declaration::{Declaration, DeclarationKind, Function, ImportedModule, Linkage, ModuleDecl, Parameter, ParameterKind};
use crate::ast::expression::{Expression, ExpressionKind, Keyword};
use crate::ast::id::{ModuleUid, ID};
use crate::ast::meta::Meta;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::statement::{Statement, StatementKind};
use crate::ast::types::{BitRange, Constness, EnumLabel, FunctionFlavor, QualifiedType, Side, TypeKind, UnqualifiedType};
use crate::operators;
use crate::span::SpanInfo;

/// Factory facade over an AST context
pub struct Builder<'ctx> {
    pub context: &'ctx mut AstContext,
    location: SpanInfo,
}

impl<'ctx> Builder<'ctx> {
    pub fn new(context: &'ctx mut AstContext) -> Self {
        Self {
            context,
            location: SpanInfo::synthetic(),
        }
    }

    /// Sets the location subsequently created nodes carry
    pub fn set_location(&mut self, location: SpanInfo) {
        self.location = location;
    }

    pub fn meta(&self) -> Meta {
        Meta::new(self.location.clone())
    }

    fn make(&mut self, kind: NodeKind) -> NodeId {
        let meta = self.meta();
        self.context.new_node(kind, meta)
    }

    /* ----- types ----- */

    pub fn type_node(&mut self, kind: TypeKind) -> NodeId {
        self.make(NodeKind::Type(UnqualifiedType::new(kind)))
    }

    /// A childless wildcard type of the given class (`T<*>`)
    pub fn wildcard_type(&mut self, kind: TypeKind) -> NodeId {
        self.make(NodeKind::Type(UnqualifiedType::wildcard(kind)))
    }

    pub fn bool_type(&mut self) -> NodeId {
        self.type_node(TypeKind::Bool)
    }

    pub fn int_type(&mut self, width: u16) -> NodeId {
        self.type_node(TypeKind::SignedInteger { width })
    }

    pub fn uint_type(&mut self, width: u16) -> NodeId {
        self.type_node(TypeKind::UnsignedInteger { width })
    }

    pub fn real_type(&mut self) -> NodeId {
        self.type_node(TypeKind::Real)
    }

    pub fn string_type(&mut self) -> NodeId {
        self.type_node(TypeKind::String_)
    }

    pub fn void_type(&mut self) -> NodeId {
        self.type_node(TypeKind::Void)
    }

    pub fn auto_type(&mut self) -> NodeId {
        self.type_node(TypeKind::Auto)
    }

    pub fn unknown_type(&mut self) -> NodeId {
        self.type_node(TypeKind::Unknown)
    }

    pub fn regexp_type(&mut self) -> NodeId {
        self.type_node(TypeKind::RegExp)
    }

    pub fn name_type(&mut self, id: ID) -> NodeId {
        self.type_node(TypeKind::Name { id, resolved: None })
    }

    pub fn member_type(&mut self, id: ID) -> NodeId {
        self.type_node(TypeKind::Member { id })
    }

    pub fn library_type(&mut self, cxx_name: impl Into<String>) -> NodeId {
        self.type_node(TypeKind::Library { cxx_name: cxx_name.into() })
    }

    pub fn sink_type(&mut self) -> NodeId {
        self.type_node(TypeKind::Sink)
    }

    /// Iterator over elements of the given type
    pub fn iterator_type(&mut self, element: NodeId) -> NodeId {
        let node = self.type_node(TypeKind::Iterator);
        self.context.attach_child(node, element);
        node
    }

    /// `bytes`, with its element and iterator children
    pub fn bytes_type(&mut self) -> NodeId {
        let element = self.uint_type(8);
        let element_qt = self.qtype_const(element);
        let iterator = {
            let inner = self.uint_type(8);
            let inner_qt = self.qtype_const(inner);
            let iterator = self.type_node(TypeKind::BytesIterator);
            self.context.attach_child(iterator, inner_qt);
            iterator
        };
        let iterator_qt = self.qtype_nonconst(iterator);
        let node = self.type_node(TypeKind::Bytes);
        self.context.attach_child(node, element_qt);
        self.context.attach_child(node, iterator_qt);
        node
    }

    /// `stream`, with element, iterator, and view children
    pub fn stream_type(&mut self) -> NodeId {
        let element = self.uint_type(8);
        let element_qt = self.qtype_const(element);
        let iterator_qt = {
            let iterator = self.stream_iterator_type();
            self.qtype_nonconst(iterator)
        };
        let view_qt = {
            let view = self.stream_view_type();
            self.qtype_nonconst(view)
        };
        let node = self.type_node(TypeKind::Stream);
        self.context.attach_child(node, element_qt);
        self.context.attach_child(node, iterator_qt);
        self.context.attach_child(node, view_qt);
        node
    }

    pub fn stream_iterator_type(&mut self) -> NodeId {
        let inner = self.uint_type(8);
        let inner_qt = self.qtype_const(inner);
        let node = self.type_node(TypeKind::StreamIterator);
        self.context.attach_child(node, inner_qt);
        node
    }

    pub fn stream_view_type(&mut self) -> NodeId {
        let element = self.uint_type(8);
        let element_qt = self.qtype_const(element);
        let iterator = self.stream_iterator_type();
        let iterator_qt = self.qtype_nonconst(iterator);
        let node = self.type_node(TypeKind::StreamView);
        self.context.attach_child(node, element_qt);
        self.context.attach_child(node, iterator_qt);
        node
    }

    fn container_type(&mut self, kind: TypeKind, element: NodeId) -> NodeId {
        let iterator_element = self.context.deep_copy(element);
        let iterator = self.iterator_type(iterator_element);
        let iterator_qt = self.qtype_nonconst(iterator);
        let node = self.type_node(kind);
        self.context.attach_child(node, element);
        self.context.attach_child(node, iterator_qt);
        node
    }

    /// `list<element>`; `element` is a qualified type
    pub fn list_type(&mut self, element: NodeId) -> NodeId {
        self.container_type(TypeKind::List, element)
    }

    pub fn vector_type(&mut self, element: NodeId) -> NodeId {
        self.container_type(TypeKind::Vector, element)
    }

    pub fn set_type(&mut self, element: NodeId) -> NodeId {
        self.container_type(TypeKind::Set, element)
    }

    /// `map<key, value>`; the iterator element is a `(key, value)` tuple
    pub fn map_type(&mut self, key: NodeId, value: NodeId) -> NodeId {
        let tuple_key = self.context.deep_copy(key);
        let tuple_value = self.context.deep_copy(value);
        let element = self.tuple_type(vec![(None, tuple_key), (None, tuple_value)]);
        let element_qt = self.qtype_nonconst(element);
        let iterator = self.type_node(TypeKind::Iterator);
        self.context.attach_child(iterator, element_qt);
        let iterator_qt = self.qtype_nonconst(iterator);

        let node = self.type_node(TypeKind::Map);
        self.context.attach_child(node, key);
        self.context.attach_child(node, value);
        self.context.attach_child(node, iterator_qt);
        node
    }

    pub fn tuple_type(&mut self, elements: Vec<(Option<ID>, NodeId)>) -> NodeId {
        let names = elements.iter().map(|(name, _)| name.clone()).collect();
        let node = self.type_node(TypeKind::Tuple { names });
        for (_, element) in elements {
            self.context.attach_child(node, element);
        }
        node
    }

    pub fn optional_type(&mut self, inner: NodeId) -> NodeId {
        let node = self.type_node(TypeKind::Optional);
        self.context.attach_child(node, inner);
        node
    }

    pub fn result_type(&mut self, inner: NodeId) -> NodeId {
        let node = self.type_node(TypeKind::Result_);
        self.context.attach_child(node, inner);
        node
    }

    pub fn strong_reference_type(&mut self, inner: NodeId) -> NodeId {
        let node = self.type_node(TypeKind::StrongReference);
        self.context.attach_child(node, inner);
        node
    }

    pub fn weak_reference_type(&mut self, inner: NodeId) -> NodeId {
        let node = self.type_node(TypeKind::WeakReference);
        self.context.attach_child(node, inner);
        node
    }

    pub fn value_reference_type(&mut self, inner: NodeId) -> NodeId {
        let node = self.type_node(TypeKind::ValueReference);
        self.context.attach_child(node, inner);
        node
    }

    pub fn enum_type(&mut self, labels: Vec<EnumLabel>) -> NodeId {
        self.type_node(TypeKind::Enum { labels })
    }

    pub fn bitfield_type(&mut self, width: u32, bits: Vec<BitRange>) -> NodeId {
        self.type_node(TypeKind::Bitfield { width, bits })
    }

    /// A struct type; synthesizes the hidden `self` declaration as the first
    /// child so that member resolution finds it
    pub fn struct_type(&mut self, parameters: Vec<NodeId>, fields: Vec<NodeId>) -> NodeId {
        let param_count = parameters.len();
        let node = self.type_node(TypeKind::Struct { param_count });

        let self_qt = self.qtype_external(node, Constness::NonConst, Side::Lhs);
        let self_expr = self.expr_keyword(Keyword::Self_, self_qt);
        let self_decl = self.expression_decl(ID::new("self"), self_expr);
        self.context.attach_child(node, self_decl);

        for parameter in parameters {
            self.context.attach_child(node, parameter);
        }
        for field in fields {
            self.context.attach_child(node, field);
        }
        node
    }

    pub fn union_type(&mut self, fields: Vec<NodeId>) -> NodeId {
        let node = self.type_node(TypeKind::Union);
        for field in fields {
            self.context.attach_child(node, field);
        }
        node
    }

    pub fn function_type(&mut self, flavor: FunctionFlavor, result: NodeId, parameters: Vec<NodeId>) -> NodeId {
        let node = self.type_node(TypeKind::Function { flavor });
        self.context.attach_child(node, result);
        for parameter in parameters {
            self.context.attach_child(node, parameter);
        }
        node
    }

    pub fn operand_list_type(&mut self, operands: Vec<NodeId>) -> NodeId {
        let node = self.type_node(TypeKind::OperandList);
        for operand in operands {
            self.context.attach_child(node, operand);
        }
        node
    }

    pub fn type_of_type(&mut self, wrapped: NodeId) -> NodeId {
        let node = self.type_node(TypeKind::Type_);
        self.context.attach_child(node, wrapped);
        node
    }

    /* ----- qualified types ----- */

    pub fn qtype(&mut self, inner: NodeId, constness: Constness, side: Side) -> NodeId {
        let node = self.make(NodeKind::QualifiedType(QualifiedType {
            constness,
            side,
            external: None,
        }));
        self.context.attach_child(node, inner);
        self.context.propagate_constness(node);
        node
    }

    pub fn qtype_const(&mut self, inner: NodeId) -> NodeId {
        self.qtype(inner, Constness::Const, Side::Rhs)
    }

    pub fn qtype_nonconst(&mut self, inner: NodeId) -> NodeId {
        self.qtype(inner, Constness::NonConst, Side::Rhs)
    }

    /// A qualified type pointing weakly at a type owned elsewhere
    pub fn qtype_external(&mut self, target: NodeId, constness: Constness, side: Side) -> NodeId {
        let node = self.make(NodeKind::QualifiedType(QualifiedType {
            constness,
            side,
            external: Some(target),
        }));
        self.context.attach_empty(node);
        node
    }

    /* ----- ctors ----- */

    fn ctor_with_type(&mut self, kind: CtorKind, ty: NodeId) -> NodeId {
        let node = self.make(NodeKind::Ctor(Ctor::new(kind)));
        self.context.attach_child(node, ty);
        node
    }

    pub fn ctor_bool(&mut self, value: bool) -> NodeId {
        let ty = self.bool_type();
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::Bool { value }, qt)
    }

    pub fn ctor_int(&mut self, value: i64, width: u16) -> NodeId {
        let ty = self.int_type(width);
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::SignedInteger { value, width }, qt)
    }

    pub fn ctor_uint(&mut self, value: u64, width: u16) -> NodeId {
        let ty = self.uint_type(width);
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::UnsignedInteger { value, width }, qt)
    }

    pub fn ctor_real(&mut self, value: f64) -> NodeId {
        let ty = self.real_type();
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::Real { value }, qt)
    }

    pub fn ctor_string(&mut self, value: impl Into<String>) -> NodeId {
        let ty = self.string_type();
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::String_ { value: value.into() }, qt)
    }

    pub fn ctor_bytes(&mut self, value: impl Into<Vec<u8>>) -> NodeId {
        let ty = self.bytes_type();
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::Bytes { value: value.into() }, qt)
    }

    pub fn ctor_regexp(&mut self, patterns: Vec<String>) -> NodeId {
        let ty = self.regexp_type();
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::RegExp { patterns }, qt)
    }

    pub fn ctor_null(&mut self) -> NodeId {
        let ty = self.unknown_type();
        let qt = self.qtype_const(ty);
        self.ctor_with_type(CtorKind::Null, qt)
    }

    /// Container ctor; the element type starts as `auto` (or `unknown` when
    /// empty) and is refined by the resolver
    fn ctor_container(&mut self, kind: CtorKind, make_type: fn(&mut Self, NodeId) -> NodeId, values: Vec<NodeId>) -> NodeId {
        let element = match values.is_empty() {
            true => self.unknown_type(),
            false => self.auto_type(),
        };
        let element_qt = self.qtype_nonconst(element);
        let ty = make_type(self, element_qt);
        let qt = self.qtype_const(ty);
        let node = self.ctor_with_type(kind, qt);
        for value in values {
            self.context.attach_child(node, value);
        }
        node
    }

    pub fn ctor_list(&mut self, values: Vec<NodeId>) -> NodeId {
        self.ctor_container(CtorKind::List, Self::list_type, values)
    }

    pub fn ctor_vector(&mut self, values: Vec<NodeId>) -> NodeId {
        self.ctor_container(CtorKind::Vector, Self::vector_type, values)
    }

    pub fn ctor_set(&mut self, values: Vec<NodeId>) -> NodeId {
        self.ctor_container(CtorKind::Set, Self::set_type, values)
    }

    /// Map ctor from alternating key/value expressions
    pub fn ctor_map(&mut self, entries: Vec<(NodeId, NodeId)>) -> NodeId {
        let (key, value) = match entries.is_empty() {
            true => (self.unknown_type(), self.unknown_type()),
            false => (self.auto_type(), self.auto_type()),
        };
        let key_qt = self.qtype_nonconst(key);
        let value_qt = self.qtype_nonconst(value);
        let ty = self.map_type(key_qt, value_qt);
        let qt = self.qtype_const(ty);
        let node = self.ctor_with_type(CtorKind::Map, qt);
        for (key_expr, value_expr) in entries {
            self.context.attach_child(node, key_expr);
            self.context.attach_child(node, value_expr);
        }
        node
    }

    pub fn ctor_tuple(&mut self, values: Vec<NodeId>) -> NodeId {
        let ty = self.auto_type();
        let qt = self.qtype_const(ty);
        let node = self.ctor_with_type(CtorKind::Tuple, qt);
        for value in values {
            self.context.attach_child(node, value);
        }
        node
    }

    pub fn ctor_struct(&mut self, fields: Vec<(ID, NodeId)>) -> NodeId {
        let ids = fields.iter().map(|(id, _)| id.clone()).collect();
        let ty = self.auto_type();
        let qt = self.qtype_const(ty);
        let node = self.ctor_with_type(CtorKind::Struct { ids }, qt);
        for (_, value) in fields {
            self.context.attach_child(node, value);
        }
        node
    }

    pub fn ctor_optional(&mut self, ty: NodeId, value: Option<NodeId>) -> NodeId {
        let node = self.ctor_with_type(CtorKind::Optional, ty);
        self.context.attach_optional(node, value);
        node
    }

    pub fn ctor_result(&mut self, ty: NodeId, value: Option<NodeId>) -> NodeId {
        let node = self.ctor_with_type(CtorKind::Result_, ty);
        self.context.attach_optional(node, value);
        node
    }

    pub fn ctor_default(&mut self, ty: NodeId, args: Vec<NodeId>) -> NodeId {
        let node = self.ctor_with_type(CtorKind::Default_, ty);
        for arg in args {
            self.context.attach_child(node, arg);
        }
        node
    }

    pub fn ctor_coerced(&mut self, ty: NodeId, original: NodeId) -> NodeId {
        let node = self.ctor_with_type(CtorKind::Coerced, ty);
        self.context.attach_child(node, original);
        node
    }

    pub fn ctor_enum(&mut self, enum_type: NodeId, label: ID) -> NodeId {
        let qt = self.qtype_external(enum_type, Constness::Const, Side::Rhs);
        self.ctor_with_type(CtorKind::Enum { label }, qt)
    }

    /* ----- expressions ----- */

    fn expr(&mut self, kind: ExpressionKind) -> NodeId {
        self.make(NodeKind::Expression(Expression::new(kind)))
    }

    pub fn expr_name(&mut self, id: ID) -> NodeId {
        self.expr(ExpressionKind::Name { id, resolved: None })
    }

    pub fn expr_member(&mut self, id: ID) -> NodeId {
        let ty = self.member_type(id.clone());
        let qt = self.qtype_const(ty);
        let node = self.expr(ExpressionKind::Member { id });
        self.context.attach_child(node, qt);
        node
    }

    pub fn expr_ctor(&mut self, ctor: NodeId) -> NodeId {
        let node = self.expr(ExpressionKind::Ctor);
        self.context.attach_child(node, ctor);
        node
    }

    pub fn expr_assign(&mut self, target: NodeId, source: NodeId) -> NodeId {
        let node = self.expr(ExpressionKind::Assign);
        self.context.attach_child(node, target);
        self.context.attach_child(node, source);
        node
    }

    fn expr_logical(&mut self, kind: ExpressionKind, operands: Vec<NodeId>) -> NodeId {
        let ty = self.bool_type();
        let qt = self.qtype_const(ty);
        let node = self.expr(kind);
        self.context.attach_child(node, qt);
        for operand in operands {
            self.context.attach_child(node, operand);
        }
        node
    }

    pub fn expr_logical_and(&mut self, op0: NodeId, op1: NodeId) -> NodeId {
        self.expr_logical(ExpressionKind::LogicalAnd, vec![op0, op1])
    }

    pub fn expr_logical_or(&mut self, op0: NodeId, op1: NodeId) -> NodeId {
        self.expr_logical(ExpressionKind::LogicalOr, vec![op0, op1])
    }

    pub fn expr_logical_not(&mut self, op0: NodeId) -> NodeId {
        self.expr_logical(ExpressionKind::LogicalNot, vec![op0])
    }

    pub fn expr_ternary(&mut self, condition: NodeId, true_branch: NodeId, false_branch: NodeId) -> NodeId {
        let node = self.expr(ExpressionKind::Ternary);
        self.context.attach_child(node, condition);
        self.context.attach_child(node, true_branch);
        self.context.attach_child(node, false_branch);
        node
    }

    pub fn expr_keyword(&mut self, keyword: Keyword, ty: NodeId) -> NodeId {
        let node = self.expr(ExpressionKind::Keyword { keyword });
        self.context.attach_child(node, ty);
        node
    }

    pub fn expr_deferred(&mut self, inner: NodeId, catch_exception: bool) -> NodeId {
        let node = self.expr(ExpressionKind::Deferred { catch_exception });
        self.context.attach_child(node, inner);
        node
    }

    pub fn expr_list_comprehension(&mut self, input: NodeId, local: ID, local_decl: NodeId, output: NodeId, condition: Option<NodeId>) -> NodeId {
        let ty = self.auto_type();
        let qt = self.qtype_const(ty);
        let node = self.expr(ExpressionKind::ListComprehension { local });
        self.context.attach_child(node, qt);
        self.context.attach_child(node, input);
        self.context.attach_child(node, local_decl);
        self.context.attach_child(node, output);
        self.context.attach_optional(node, condition);
        node
    }

    pub fn expr_unresolved_operator(&mut self, kind: operators::Kind, operands: Vec<NodeId>) -> NodeId {
        let node = self.expr(ExpressionKind::UnresolvedOperator { kind });
        for operand in operands {
            self.context.attach_child(node, operand);
        }
        node
    }

    pub fn expr_resolved_operator(&mut self, kind: operators::Kind, operator: usize, result: NodeId, operands: Vec<NodeId>) -> NodeId {
        let node = self.expr(ExpressionKind::ResolvedOperator { kind, operator });
        self.context.attach_child(node, result);
        for operand in operands {
            self.context.attach_child(node, operand);
        }
        node
    }

    pub fn expr_coerced(&mut self, inner: NodeId, target: NodeId) -> NodeId {
        let node = self.expr(ExpressionKind::Coerced);
        self.context.attach_child(node, inner);
        self.context.attach_child(node, target);
        node
    }

    pub fn expr_pending_coerced(&mut self, inner: NodeId, target: NodeId) -> NodeId {
        let node = self.expr(ExpressionKind::PendingCoerced);
        self.context.attach_child(node, inner);
        self.context.attach_child(node, target);
        node
    }

    pub fn expr_builtin_function(&mut self, cxx_name: impl Into<String>, result: NodeId, args: Vec<NodeId>) -> NodeId {
        let node = self.expr(ExpressionKind::BuiltInFunction { cxx_name: cxx_name.into() });
        self.context.attach_child(node, result);
        for arg in args {
            self.context.attach_child(node, arg);
        }
        node
    }

    pub fn expr_type_wrapped(&mut self, inner: NodeId, ty: NodeId) -> NodeId {
        let node = self.expr(ExpressionKind::TypeWrapped);
        self.context.attach_child(node, inner);
        self.context.attach_child(node, ty);
        node
    }

    /* ----- declarations ----- */

    fn declaration(&mut self, declaration: Declaration) -> NodeId {
        self.make(NodeKind::Declaration(declaration))
    }

    pub fn import_decl(&mut self, module_id: ID, scope: Option<ID>, parse_extension: impl Into<String>, search_dirs: Vec<String>) -> NodeId {
        let id = module_id.clone();
        self.declaration(Declaration::new(
            id,
            Linkage::Private,
            DeclarationKind::ImportedModule(ImportedModule {
                module_id,
                scope,
                parse_extension: parse_extension.into(),
                process_extension: None,
                search_dirs,
                resolved_uid: None,
            }),
        ))
    }

    /// Declares a type; for enum types, also synthesizes one constant per
    /// label so that scope building can inject them into the module scope
    pub fn type_decl(&mut self, id: ID, ty: NodeId, linkage: Linkage) -> NodeId {
        let qt = self.qtype_const(ty);
        let node = self.declaration(Declaration::new(id, linkage, DeclarationKind::Type));
        self.context.attach_child(node, qt);

        let inner = self.context.inner_type_raw(qt);
        self.context.utype_mut(inner).declaration = Some(node);

        if let TypeKind::Enum { labels } = &self.context.utype(inner).kind {
            for label in labels.clone() {
                let ctor = self.ctor_enum(inner, label.id.clone());
                let value = self.expr_ctor(ctor);
                let constant = self.constant_decl_with_external_type(label.id.clone(), inner, value);
                self.context.attach_child(node, constant);
            }
        }

        node
    }

    pub fn constant_decl(&mut self, id: ID, ty: NodeId, value: NodeId) -> NodeId {
        let node = self.declaration(Declaration::new(id, Linkage::Private, DeclarationKind::Constant));
        self.context.attach_child(node, ty);
        self.context.attach_child(node, value);
        node
    }

    fn constant_decl_with_external_type(&mut self, id: ID, ty: NodeId, value: NodeId) -> NodeId {
        let qt = self.qtype_external(ty, Constness::Const, Side::Rhs);
        self.constant_decl(id, qt, value)
    }

    pub fn global_decl(&mut self, id: ID, ty: NodeId, init: Option<NodeId>, linkage: Linkage) -> NodeId {
        let node = self.declaration(Declaration::new(id, linkage, DeclarationKind::GlobalVariable));
        self.context.attach_child(node, ty);
        self.context.attach_optional(node, init);
        node
    }

    pub fn local_decl(&mut self, id: ID, ty: NodeId, init: Option<NodeId>) -> NodeId {
        let node = self.declaration(Declaration::new(id, Linkage::Private, DeclarationKind::LocalVariable));
        self.context.attach_child(node, ty);
        self.context.attach_optional(node, init);
        node
    }

    pub fn parameter_decl(&mut self, id: ID, ty: NodeId, kind: ParameterKind, default: Option<NodeId>) -> NodeId {
        let node = self.declaration(Declaration::new(id, Linkage::Private, DeclarationKind::Parameter(Parameter { kind })));
        self.context.attach_child(node, ty);
        self.context.attach_optional(node, default);
        node
    }

    /// A function node: type plus optional body
    pub fn function(&mut self, id: ID, ftype: NodeId, body: Option<NodeId>) -> NodeId {
        let node = self.make(NodeKind::Function(Function { id }));
        self.context.attach_child(node, ftype);
        self.context.attach_optional(node, body);
        node
    }

    pub fn function_decl(&mut self, id: ID, function: NodeId, linkage: Linkage) -> NodeId {
        let node = self.declaration(Declaration::new(id, linkage, DeclarationKind::Function));
        self.context.attach_child(node, function);
        node
    }

    pub fn field_decl(&mut self, id: ID, ty: NodeId, attributes: Option<NodeId>, inline_function: Option<NodeId>) -> NodeId {
        let node = self.declaration(Declaration::new(id, Linkage::Struct, DeclarationKind::Field));
        self.context.attach_child(node, ty);
        self.context.attach_optional(node, attributes);
        self.context.attach_optional(node, inline_function);
        node
    }

    pub fn expression_decl(&mut self, id: ID, expression: NodeId) -> NodeId {
        let node = self.declaration(Declaration::new(id, Linkage::Private, DeclarationKind::Expression));
        self.context.attach_child(node, expression);
        node
    }

    pub fn unit_hook_decl(&mut self, id: ID, function: NodeId, unit: Option<NodeId>, field: Option<NodeId>, foreach: bool) -> NodeId {
        let node = self.declaration(Declaration::new(id, Linkage::Private, DeclarationKind::UnitHook { unit, field, foreach }));
        self.context.attach_child(node, function);
        node
    }

    /// Creates and registers a module declaration
    pub fn module(&mut self, uid: ModuleUid) -> NodeId {
        let meta = self.meta();
        let node = self.context.make_module(uid, meta);
        self.context.register_module(node, None);
        node
    }

    /// Creates a module without registering it (for plugin parse callbacks,
    /// where the context registers the module itself)
    pub fn module_unregistered(&mut self, uid: ModuleUid) -> NodeId {
        let meta = self.meta();
        self.context.make_module(uid, meta)
    }

    pub fn add_declaration(&mut self, module: NodeId, declaration: NodeId) {
        self.context.attach_child(module, declaration);
    }

    /* ----- statements ----- */

    fn stmt(&mut self, kind: StatementKind) -> NodeId {
        self.make(NodeKind::Statement(Statement::new(kind)))
    }

    pub fn block(&mut self, statements: Vec<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::Block);
        for statement in statements {
            self.context.attach_child(node, statement);
        }
        node
    }

    pub fn stmt_if(&mut self, init: Option<NodeId>, condition: NodeId, true_block: NodeId, else_block: Option<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::If);
        self.context.attach_optional(node, init);
        self.context.attach_child(node, condition);
        self.context.attach_child(node, true_block);
        self.context.attach_optional(node, else_block);
        node
    }

    pub fn stmt_while(&mut self, init: Option<NodeId>, condition: NodeId, body: NodeId, else_block: Option<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::While);
        self.context.attach_optional(node, init);
        self.context.attach_child(node, condition);
        self.context.attach_child(node, body);
        self.context.attach_optional(node, else_block);
        node
    }

    pub fn stmt_for(&mut self, local: NodeId, sequence: NodeId, body: NodeId) -> NodeId {
        let node = self.stmt(StatementKind::For);
        self.context.attach_child(node, local);
        self.context.attach_child(node, sequence);
        self.context.attach_child(node, body);
        node
    }

    pub fn stmt_switch(&mut self, condition: NodeId, cases: Vec<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::Switch);
        self.context.attach_child(node, condition);
        for case in cases {
            self.context.attach_child(node, case);
        }
        node
    }

    pub fn switch_case(&mut self, body: NodeId, expressions: Vec<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::SwitchCase { preprocessed: false });
        self.context.attach_child(node, body);
        for expression in expressions {
            self.context.attach_child(node, expression);
        }
        node
    }

    pub fn stmt_return(&mut self, expression: Option<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::Return);
        self.context.attach_optional(node, expression);
        node
    }

    pub fn stmt_assert(&mut self, condition: NodeId, message: Option<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::Assert);
        self.context.attach_child(node, condition);
        self.context.attach_optional(node, message);
        node
    }

    pub fn stmt_try(&mut self, body: NodeId, catches: Vec<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::Try);
        self.context.attach_child(node, body);
        for catch in catches {
            self.context.attach_child(node, catch);
        }
        node
    }

    pub fn try_catch(&mut self, parameter: Option<NodeId>, body: NodeId) -> NodeId {
        let node = self.stmt(StatementKind::TryCatch);
        self.context.attach_optional(node, parameter);
        self.context.attach_child(node, body);
        node
    }

    pub fn stmt_declaration(&mut self, declaration: NodeId) -> NodeId {
        let node = self.stmt(StatementKind::Declaration);
        self.context.attach_child(node, declaration);
        node
    }

    pub fn stmt_expression(&mut self, expression: NodeId) -> NodeId {
        let node = self.stmt(StatementKind::Expression);
        self.context.attach_child(node, expression);
        node
    }

    pub fn stmt_print(&mut self, args: Vec<NodeId>) -> NodeId {
        let node = self.stmt(StatementKind::Print);
        for arg in args {
            self.context.attach_child(node, arg);
        }
        node
    }

    pub fn stmt_confirm(&mut self) -> NodeId {
        self.stmt(StatementKind::Confirm)
    }

    pub fn stmt_reject(&mut self) -> NodeId {
        self.stmt(StatementKind::Reject)
    }

    pub fn stmt_stop(&mut self) -> NodeId {
        self.stmt(StatementKind::Stop)
    }

    /* ----- attributes ----- */

    pub fn attribute(&mut self, kind: AttributeKind, value: Option<NodeId>) -> NodeId {
        let node = self.make(NodeKind::Attribute(Attribute { kind }));
        self.context.attach_optional(node, value);
        node
    }

    pub fn attribute_set(&mut self, attributes: Vec<NodeId>) -> NodeId {
        let node = self.make(NodeKind::AttributeSet(AttributeSet));
        for attribute in attributes {
            self.context.attach_child(node, attribute);
        }
        node
    }

    /* ----- conveniences used by synthesized code ----- */

    /// `<target> = <value>` as a statement
    pub fn assign_stmt(&mut self, target: NodeId, value: NodeId) -> NodeId {
        let assign = self.expr_assign(target, value);
        self.stmt_expression(assign)
    }

    /// A call expression awaiting overload resolution:
    /// `Call(Name(name), Tuple(args))`
    pub fn call(&mut self, name: ID, args: Vec<NodeId>) -> NodeId {
        let callee = self.expr_name(name);
        let tuple = self.ctor_tuple(args);
        let args_expr = self.expr_ctor(tuple);
        self.expr_unresolved_operator(operators::Kind::Call, vec![callee, args_expr])
    }

    /// A member call awaiting overload resolution:
    /// `MemberCall(object, Member(member), Tuple(args))`
    pub fn member_call(&mut self, object: NodeId, member: ID, args: Vec<NodeId>) -> NodeId {
        let member_expr = self.expr_member(member);
        let tuple = self.ctor_tuple(args);
        let args_expr = self.expr_ctor(tuple);
        self.expr_unresolved_operator(operators::Kind::MemberCall, vec![object, member_expr, args_expr])
    }

    /// `object.member` awaiting overload resolution
    pub fn member(&mut self, object: NodeId, member: ID) -> NodeId {
        let member_expr = self.expr_member(member);
        self.expr_unresolved_operator(operators::Kind::Member, vec![object, member_expr])
    }
}
