//! Spicy unit lowering and parser-builder scenarios.

use crate::ast::attribute::AttributeKind;
use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::id::{ModuleUid, ID};
use crate::ast::node::NodeId;
use crate::ast::statement::StatementKind;
use crate::ast::types::{FunctionFlavor, TypeKind};
use crate::ast::visitor;
use crate::compiler::StandardDriver;
use crate::spicy::parser_builder::ParserBuilder;

/// Builds `unit U { x: bytes &size=4; on %done { print self.x; } }` inside a
/// Spicy module and returns (context, module, unit declaration)
fn build_unit_module() -> (AstContext, NodeId, NodeId) {
    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);

    let module = builder.module(ModuleUid::new(ID::new("Proto"), "proto.spicy"));

    // x: bytes &size=4
    let x_ty = builder.bytes_type();
    let x_qt = builder.qtype_nonconst(x_ty);
    let four = builder.ctor_uint(4, 64);
    let four_expr = builder.expr_ctor(four);
    let size = builder.attribute(AttributeKind::Size, Some(four_expr));
    let attrs = builder.attribute_set(vec![size]);
    let x = builder.unit_field(Some(ID::new("x")), x_qt, Some(attrs), None, None, None);

    // on %done { print self.x; }
    let hook = {
        let self_expr = builder.expr_name(ID::new("self"));
        let member = builder.member(self_expr, ID::new("x"));
        let print = builder.stmt_print(vec![member]);
        let body = builder.block(vec![print]);
        let void = builder.void_type();
        let void_qt = builder.qtype_const(void);
        let ftype = builder.function_type(FunctionFlavor::Hook, void_qt, vec![]);
        let ftype_qt = builder.qtype_const(ftype);
        let function = builder.function(ID::new("%done"), ftype_qt, Some(body));
        builder.unit_hook("%done", false, function)
    };

    let unit = builder.unit_type(vec![], vec![x, hook]);
    let declaration = builder.type_decl(ID::new("U"), unit, crate::ast::declaration::Linkage::Public);
    builder.add_declaration(module, declaration);

    context.module_decl_mut(module).process_extension = Some(String::from("spicy"));
    (context, module, declaration)
}

/// Scenario: after the Spicy transform the unit is a struct with the user
/// field plus the internal parsing state, the stage methods, the parse entry
/// points, and the `%done` hook as a plain function
#[test]
fn unit_lowers_to_struct_with_parse_functions() {
    let (mut context, module, declaration) = build_unit_module();

    let mut driver = StandardDriver::default();
    crate::process_ast(&mut context, &mut driver).unwrap();

    // The declared type is now a struct.
    let qt = context.declaration_type(declaration).unwrap();
    let struct_ty = context.inner_type_raw(qt);
    assert!(matches!(context.utype(struct_ty).kind, TypeKind::Struct { .. }));

    // Its fields: x plus the internal state and the stage methods.
    let field_names: Vec<String> = context
        .type_fields(struct_ty)
        .into_iter()
        .map(|field| context.declaration(field).id.local().to_string())
        .collect();
    assert!(field_names.contains(&String::from("x")), "fields: {field_names:?}");
    assert!(field_names.contains(&String::from("__offset")), "fields: {field_names:?}");
    assert!(field_names.contains(&String::from("__error")), "fields: {field_names:?}");
    assert!(field_names.contains(&String::from("__parse_stage1")), "fields: {field_names:?}");
    assert!(field_names.contains(&String::from("__parse_stage2")), "fields: {field_names:?}");

    // The x field kept its bytes type.
    let x = context
        .type_fields(struct_ty)
        .into_iter()
        .find(|field| context.declaration(*field).id.local() == "x")
        .unwrap();
    let x_ty = context.declaration_type(x).unwrap();
    assert!(matches!(context.utype(context.inner_type(x_ty)).kind, TypeKind::Bytes));

    // The parse entry points and the lifted hook are module-level functions.
    let function_names: Vec<String> = context
        .children(module)
        .filter(|child| context.is_declaration(*child) && context.declaration(*child).kind.is_function())
        .map(|child| context.declaration(child).id.to_string())
        .collect();
    assert!(function_names.iter().any(|name| name.ends_with("parse1")), "functions: {function_names:?}");
    assert!(function_names.iter().any(|name| name.ends_with("parse2")), "functions: {function_names:?}");
    assert!(function_names.iter().any(|name| name.ends_with("parse3")), "functions: {function_names:?}");
    assert!(function_names.iter().any(|name| name.ends_with("__parse_stage1")), "functions: {function_names:?}");
    assert!(function_names.iter().any(|name| name.ends_with("__parse_stage2")), "functions: {function_names:?}");
    assert!(
        function_names.iter().any(|name| name == "__on_0x25_done"),
        "functions: {function_names:?}"
    );
}

/// A `&synchronize` field turns the preceding fields into a guarded region
/// with trial-mode recovery
#[test]
fn synchronize_field_guards_preceding_fields() {
    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);

    let a_ty = builder.bytes_type();
    let a_qt = builder.qtype_nonconst(a_ty);
    let two = builder.ctor_uint(2, 64);
    let two_expr = builder.expr_ctor(two);
    let a_size = builder.attribute(AttributeKind::Size, Some(two_expr));
    let a_attrs = builder.attribute_set(vec![a_size]);
    let a = builder.unit_field(Some(ID::new("a")), a_qt, Some(a_attrs), None, None, None);

    let b_ty = builder.bytes_type();
    let b_qt = builder.qtype_nonconst(b_ty);
    let sync = builder.attribute(AttributeKind::Synchronize, None);
    let b_attrs = builder.attribute_set(vec![sync]);
    let b = builder.unit_field(Some(ID::new("b")), b_qt, Some(b_attrs), None, None, None);

    let unit = builder.unit_type(vec![], vec![a, b]);

    let mut parser_builder = ParserBuilder::new(&mut context, unit, ID::new("L"));
    let compiled = parser_builder.compile();

    // Stage 2 (second generated function) carries a try/catch for recovery.
    let stage2 = compiled.functions[1];
    let has_try = visitor::post_order(&context, stage2)
        .into_iter()
        .any(|node| context.is_statement(node) && matches!(context.statement(node).kind, StatementKind::Try));
    assert!(has_try, "expected a trial-mode try block in stage 2");
}

/// An inner `&try` frame stays nested inside an outer `&synchronize` guard,
/// so the innermost frame absorbs failures first
#[test]
fn try_frame_nests_inside_synchronize_guard() {
    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);

    let a_ty = builder.bytes_type();
    let a_qt = builder.qtype_nonconst(a_ty);
    let trial = builder.attribute(AttributeKind::Try, None);
    let a_attrs = builder.attribute_set(vec![trial]);
    let a = builder.unit_field(Some(ID::new("a")), a_qt, Some(a_attrs), None, None, None);

    let b_ty = builder.bytes_type();
    let b_qt = builder.qtype_nonconst(b_ty);
    let sync = builder.attribute(AttributeKind::Synchronize, None);
    let b_attrs = builder.attribute_set(vec![sync]);
    let b = builder.unit_field(Some(ID::new("b")), b_qt, Some(b_attrs), None, None, None);

    let unit = builder.unit_type(vec![], vec![a, b]);

    let mut parser_builder = ParserBuilder::new(&mut context, unit, ID::new("T"));
    let compiled = parser_builder.compile();

    let stage2 = compiled.functions[1];
    let tries: Vec<NodeId> = visitor::post_order(&context, stage2)
        .into_iter()
        .filter(|node| context.is_statement(*node) && matches!(context.statement(*node).kind, StatementKind::Try))
        .collect();
    assert!(tries.len() >= 2, "expected both the &try frame and the sync guard, got {}", tries.len());

    // One try is an ancestor of the other: the &try frame nests inside the
    // guarded head of the synchronized sequence.
    let nested = tries
        .iter()
        .any(|inner| context.ancestors(*inner).any(|ancestor| tries.contains(&ancestor)));
    assert!(nested, "the &try frame must nest inside the synchronize guard");
}

/// A `void` field carrying attributes is rewritten into a skip field during
/// the Spicy resolver round (the deprecated form)
#[test]
fn void_field_with_attributes_becomes_skip() {
    let mut context = AstContext::default();
    let mut builder = Builder::new(&mut context);

    let module = builder.module(ModuleUid::new(ID::new("P"), "p.spicy"));

    let void_ty = builder.void_type();
    let void_qt = builder.qtype_nonconst(void_ty);
    let two = builder.ctor_uint(2, 64);
    let two_expr = builder.expr_ctor(two);
    let size = builder.attribute(AttributeKind::Size, Some(two_expr));
    let attrs = builder.attribute_set(vec![size]);
    let field = builder.unit_field(Some(ID::new("gap")), void_qt, Some(attrs), None, None, None);

    let unit = builder.unit_type(vec![], vec![field]);
    let declaration = builder.type_decl(ID::new("V"), unit, crate::ast::declaration::Linkage::Public);
    builder.add_declaration(module, declaration);
    context.module_decl_mut(module).process_extension = Some(String::from("spicy"));

    let mut driver = StandardDriver::default();
    crate::process_ast(&mut context, &mut driver).unwrap();

    // After the rewrite the (pre-lowering) field was marked skip with a
    // bytes type; post-lowering, the compiled struct no longer stores it.
    let qt = context.declaration_type(declaration).unwrap();
    let struct_ty = context.inner_type_raw(qt);
    let field_names: Vec<String> = context
        .type_fields(struct_ty)
        .into_iter()
        .map(|field| context.declaration(field).id.local().to_string())
        .collect();
    assert!(!field_names.contains(&String::from("gap")), "fields: {field_names:?}");
}
