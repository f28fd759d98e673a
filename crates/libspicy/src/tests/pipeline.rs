//! End-to-end pipeline scenarios over HILTI modules.

use pretty_assertions::assert_eq;

use crate::ast::builder::Builder;
use crate::ast::context::{AstContext, CompilerOptions};
use crate::ast::declaration::Linkage;
use crate::ast::expression::ExpressionKind;
use crate::ast::id::{ModuleUid, ID};
use crate::ast::types::TypeKind;
use crate::compiler::StandardDriver;
use crate::error::Result;

fn process(context: &mut AstContext) -> Result<()> {
    let mut driver = StandardDriver::default();
    crate::process_ast(context, &mut driver)
}

fn process_with_options(context: &mut AstContext, options: CompilerOptions) -> Result<()> {
    let mut driver = StandardDriver::new(options);
    crate::process_ast(context, &mut driver)
}

/// `global int<64> x = 5; global real y = x;` resolves with the initializer
/// of `y` wrapped in a coercion to real
#[test]
fn overload_resolution_via_coercion() {
    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);

    let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

    let x_ty = builder.int_type(64);
    let x_qt = builder.qtype_nonconst(x_ty);
    let five = builder.ctor_int(5, 64);
    let five_expr = builder.expr_ctor(five);
    let x = builder.global_decl(ID::new("x"), x_qt, Some(five_expr), Linkage::Private);
    builder.add_declaration(module, x);

    let y_ty = builder.real_type();
    let y_qt = builder.qtype_nonconst(y_ty);
    let x_ref = builder.expr_name(ID::new("x"));
    let y = builder.global_decl(ID::new("y"), y_qt, Some(x_ref), Linkage::Private);
    builder.add_declaration(module, y);

    process(&mut context).unwrap();

    // x keeps its integer type, y its real type.
    let x_type = context.declaration_type(x).unwrap();
    assert_eq!(context.utype(context.inner_type(x_type)).unification.as_deref(), Some("int(64)"));
    let y_type = context.declaration_type(y).unwrap();
    assert_eq!(context.utype(context.inner_type(y_type)).unification.as_deref(), Some("real"));

    // The initializer of y was wrapped in a coercion to real.
    let y_init = context.declaration_value(y).unwrap();
    assert!(matches!(context.expression(y_init).kind, ExpressionKind::Coerced));
    let coerced_ty = context.expression_type(y_init).unwrap();
    assert!(matches!(context.utype(context.inner_type(coerced_ty)).kind, TypeKind::Real));
}

/// Module B imports A and uses `A::T`; the dependency is recorded and the
/// usage resolves to A's declaration
#[test]
fn import_with_scope() {
    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);

    let uid_a = ModuleUid::new(ID::new("A"), "a.hlt");
    let module_a = builder.module(uid_a.clone());
    let t_ty = builder.int_type(32);
    let t = builder.type_decl(ID::new("T"), t_ty, Linkage::Public);
    builder.add_declaration(module_a, t);

    let uid_b = ModuleUid::new(ID::new("B"), "b.hlt");
    let module_b = builder.module(uid_b.clone());
    let import = builder.import_decl(ID::new("A"), None, "hlt", vec![]);
    builder.add_declaration(module_b, import);

    let use_ty = builder.name_type(ID::new("A::T"));
    let use_qt = builder.qtype_nonconst(use_ty);
    let g = builder.global_decl(ID::new("g"), use_qt, None, Linkage::Private);
    builder.add_declaration(module_b, g);

    process(&mut context).unwrap();

    // B depends exactly on A.
    assert_eq!(context.dependencies(&uid_b, true), vec![uid_a]);

    // The type name resolved to A's declaration.
    let g_type = context.declaration_type(g).unwrap();
    let inner = context.inner_type_raw(g_type);
    let TypeKind::Name { resolved, .. } = &context.utype(inner).kind else {
        panic!("expected a name type on g");
    };
    assert_eq!(*resolved, Some(t));

    // Canonical IDs carry the module-hash segment.
    let canonical = context.declaration(t).canonical_id.as_ref().unwrap().as_str();
    assert!(canonical.starts_with("A_"), "got '{canonical}'");
    assert!(canonical.ends_with("::T"), "got '{canonical}'");
}

/// An unused `&internal` struct field disappears under global optimization
#[test]
fn optimizer_removes_unused_internal_field() {
    use crate::ast::attribute::AttributeKind;

    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);

    let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

    let a_ty = builder.int_type(32);
    let a_qt = builder.qtype_nonconst(a_ty);
    let a = builder.field_decl(ID::new("a"), a_qt, None, None);

    let b_ty = builder.int_type(32);
    let b_qt = builder.qtype_nonconst(b_ty);
    let internal = builder.attribute(AttributeKind::Internal, None);
    let attrs = builder.attribute_set(vec![internal]);
    let b = builder.field_decl(ID::new("b"), b_qt, Some(attrs), None);

    let struct_ty = builder.struct_type(vec![], vec![a, b]);
    let s = builder.type_decl(ID::new("S"), struct_ty, Linkage::Public);
    builder.add_declaration(module, s);

    let options = CompilerOptions {
        global_optimizations: true,
        ..Default::default()
    };
    process_with_options(&mut context, options).unwrap();

    let fields = context.type_fields(struct_ty);
    assert_eq!(fields.len(), 1);
    assert_eq!(context.declaration(fields[0]).id.local(), "a");
}

/// Unification strings and canonical IDs are identical across two
/// independent runs over the same input
#[test]
fn canonical_ids_and_unification_are_deterministic() {
    let build_and_process = || {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let element = builder.real_type();
        let element_qt = builder.qtype_nonconst(element);
        let vector = builder.vector_type(element_qt);
        let v_qt = builder.qtype_nonconst(vector);
        let v = builder.global_decl(ID::new("v"), v_qt, None, Linkage::Private);
        builder.add_declaration(module, v);

        let t_ty = builder.bool_type();
        let t = builder.type_decl(ID::new("Flag"), t_ty, Linkage::Public);
        builder.add_declaration(module, t);

        process(&mut context).unwrap();

        let unification = context
            .utype(context.inner_type(context.declaration_type(v).unwrap()))
            .unification
            .clone()
            .unwrap();
        let canonical = context.declaration(t).canonical_id.clone().unwrap().to_string();
        (unification, canonical)
    };

    assert_eq!(build_and_process(), build_and_process());
}

/// The resolver flags an unknown identifier instead of looping
#[test]
fn unknown_identifier_is_reported() {
    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);
    let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

    let ty = builder.int_type(64);
    let qt = builder.qtype_nonconst(ty);
    let missing = builder.expr_name(ID::new("nowhere"));
    let g = builder.global_decl(ID::new("g"), qt, Some(missing), Linkage::Private);
    builder.add_declaration(module, g);

    let error = process(&mut context).unwrap_err();
    let message = error.to_string();
    assert!(message.contains("error"), "got '{message}'");
}

/// A for-loop local takes its type from the sequence's element type
#[test]
fn for_loop_local_is_typed_from_sequence() {
    use crate::ast::types::FunctionFlavor;

    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);
    let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

    // global vector<real> vs; function f() { for (e in vs) {} }
    let element = builder.real_type();
    let element_qt = builder.qtype_nonconst(element);
    let vector = builder.vector_type(element_qt);
    let vs_qt = builder.qtype_nonconst(vector);
    let vs = builder.global_decl(ID::new("vs"), vs_qt, None, Linkage::Private);
    builder.add_declaration(module, vs);

    let local_ty = builder.auto_type();
    let local_qt = builder.qtype_nonconst(local_ty);
    let local = builder.local_decl(ID::new("e"), local_qt, None);
    let sequence = builder.expr_name(ID::new("vs"));
    let body = builder.block(vec![]);
    let for_stmt = builder.stmt_for(local, sequence, body);
    let fn_body = builder.block(vec![for_stmt]);

    let void = builder.void_type();
    let void_qt = builder.qtype_const(void);
    let ftype = builder.function_type(FunctionFlavor::Function, void_qt, vec![]);
    let ftype_qt = builder.qtype_const(ftype);
    let function = builder.function(ID::new("f"), ftype_qt, Some(fn_body));
    let f = builder.function_decl(ID::new("f"), function, Linkage::Private);
    builder.add_declaration(module, f);

    process(&mut context).unwrap();

    let local_type = context.declaration_type(local).unwrap();
    assert!(matches!(context.utype(context.inner_type(local_type)).kind, TypeKind::Real));
}
