//! The Spicy-to-HILTI lowering transform.
//!
//! Three passes. The first (run once) replaces unit type declarations with
//! the structs compiled by the parser builder, turns unit hooks into plain
//! HILTI functions, and rewrites unit ctors into struct ctors. The second
//! runs to a fixed point, rewriting every Spicy-only operator and statement
//! into its HILTI equivalent. The third strips the remaining coercion
//! wrappers so that the back end sees final nodes directly.
//!
//! Rewrites produce *unresolved* HILTI forms; the driver re-runs the HILTI
//! resolver over the transformed tree afterwards.

use simplelog::debug;

use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::ctor::CtorKind;
use crate::ast::declaration::{DeclarationKind, Linkage, ParameterKind};
use crate::ast::expression::ExpressionKind;
use crate::ast::id::ID;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::statement::StatementKind;
use crate::ast::types::{Constness, Side, TypeKind};
use crate::ast::visitor;
use crate::compiler::coercer;
use crate::error::Result;
use crate::operators::{Kind, Registry};
use crate::spicy::parser_builder::{hook_function_name, ParserBuilder};
use crate::spicy::unit::UnitItem;

/// The plugin's transform entry point
pub fn transform(context: &mut AstContext, registry: &mut Registry) -> Result<bool> {
    let mut modified = compile_units(context);

    loop {
        let changed = rewrite_spicy_constructs(context, registry);
        modified |= changed;
        if !changed {
            break;
        }
    }

    // Only Spicy modules lose their coercion wrappers; HILTI modules keep
    // theirs for the back end's type checks.
    for module in context.modules() {
        let is_spicy = context.module_decl(module).process_extension.as_deref() == Some("spicy");
        if is_spicy {
            modified |= coercer::strip_coercions(context, module);
        }
    }

    Ok(modified)
}

/* ----- pass 1: unit compilation ----- */

/// Replaces every unit type declaration with its compiled struct and lifts
/// hooks into module-level functions
fn compile_units(context: &mut AstContext) -> bool {
    let mut modified = false;

    for module in context.modules() {
        let declarations: Vec<NodeId> = context.children(module).collect();
        for declaration in declarations {
            if !context.is_declaration(declaration) || !context.declaration(declaration).kind.is_type() {
                continue;
            }
            let Some(qt) = context.declaration_type(declaration) else { continue };
            let unit = context.inner_type_raw(qt);
            if !context.utype(unit).kind.is_unit() {
                continue;
            }

            let unit_name = context.declaration(declaration).id.clone();
            debug!("[spicy-codegen] lowering unit '{unit_name}'");

            // Lift inline hooks into functions before the unit disappears.
            let hook_functions = lift_unit_hooks(context, unit, &unit_name);

            let compiled = {
                let mut builder = ParserBuilder::new(context, unit, unit_name.clone());
                builder.compile()
            };

            // Swap the declared type: the struct takes the unit's place and
            // the declaration backlink moves with it.
            let struct_qt = {
                let mut builder = Builder::new(context);
                builder.qtype_const(compiled.struct_type)
            };
            context.set_child(declaration, 0, Some(struct_qt));
            context.utype_mut(compiled.struct_type).declaration = Some(declaration);

            for function in compiled.functions.into_iter().chain(hook_functions) {
                context.attach_child(module, function);
            }

            modified = true;
        }

        // Declaration-level hooks become plain functions too, with a `self`
        // parameter naming the unit they attach to.
        let declarations: Vec<NodeId> = context.children(module).collect();
        for declaration in declarations {
            if !context.is_declaration(declaration) {
                continue;
            }
            let DeclarationKind::UnitHook { foreach, .. } = context.declaration(declaration).kind.clone() else {
                continue;
            };
            let hook_id = context.declaration(declaration).id.clone();
            let function_name = ID::new(hook_function_name(hook_id.local(), foreach));

            if hook_id.is_qualified() {
                if let Some(function) = context.child(declaration, 0) {
                    add_self_parameter(context, function, &ID::new(hook_id.namespace()));
                }
            }

            let payload = context.declaration_mut(declaration);
            payload.id = function_name;
            payload.kind = DeclarationKind::Function;
            payload.fully_qualified_id = None;
            payload.canonical_id = None;
            modified = true;
        }
    }

    if modified {
        // New declarations need fresh scopes and IDs.
        context.clear_all_scopes();
    }
    modified
}

/// Turns the unit's inline hook items into module-level function
/// declarations named `__on_<name>`, each taking the compiled struct as its
/// `self` parameter
fn lift_unit_hooks(context: &mut AstContext, unit: NodeId, unit_name: &ID) -> Vec<NodeId> {
    let mut functions = Vec::new();

    for item in context.unit_items(unit) {
        let UnitItem::Hook { name, foreach } = context.unit_item(item).clone() else { continue };
        let Some(function) = context.child(item, 0) else { continue };

        let function_copy = context.deep_copy(function);
        let function_name = ID::new(hook_function_name(&name, foreach));

        // The copy's name bindings point into the unit being dissolved;
        // reset them so the body re-resolves against its new surroundings.
        reset_name_bindings(context, function_copy);

        // Prepend a `self` parameter so the body's `self` keeps resolving
        // after the hook leaves the unit's scope.
        add_self_parameter(context, function_copy, unit_name);

        let declaration = {
            let mut builder = Builder::new(context);
            builder.function_decl(function_name.clone(), function_copy, Linkage::Private)
        };
        debug!("[spicy-codegen] hook 'on {name}' -> function '{function_name}'");
        functions.push(declaration);
    }

    functions
}

/// Adds an inout `self` parameter typed by the given unit/struct name
fn add_self_parameter(context: &mut AstContext, function: NodeId, unit_name: &ID) {
    let Some(ftype_qt) = context.child(function, 0) else { return };
    let ftype = context.inner_type_raw(ftype_qt);
    let self_param = {
        let mut builder = Builder::new(context);
        let self_ty = builder.name_type(unit_name.clone());
        let self_qt = builder.qtype(self_ty, Constness::NonConst, Side::Lhs);
        builder.parameter_decl(ID::new("self"), self_qt, ParameterKind::InOut, None)
    };
    context.attach_child(ftype, self_param);
}

/// Clears resolved name links below `root` so that lookup runs afresh
fn reset_name_bindings(context: &mut AstContext, root: NodeId) {
    for id in visitor::post_order(context, root) {
        if context.is_expression(id) {
            if let ExpressionKind::Name { resolved, .. } = &mut context.expression_mut(id).kind {
                *resolved = None;
            }
        } else if matches!(context.node(id).kind, NodeKind::Type(_)) {
            if let crate::ast::types::TypeKind::Name { resolved, .. } = &mut context.utype_mut(id).kind {
                *resolved = None;
            }
        }
    }
}

/* ----- pass 2: operator and statement rewrites ----- */

fn rewrite_spicy_constructs(context: &mut AstContext, registry: &Registry) -> bool {
    let mut modified = false;

    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            if context.parent(id).is_none() {
                continue;
            }
            if context.is_expression(id) {
                modified |= rewrite_expression(context, registry, id);
            } else if context.is_statement(id) {
                modified |= rewrite_statement(context, id);
            } else if matches!(context.node(id).kind, NodeKind::Type(_)) {
                modified |= rewrite_sink_type(context, id);
            } else if context.is_ctor(id) {
                modified |= rewrite_unit_ctor(context, id);
            }
        }
    }

    modified
}

/// Unit ctors become struct ctors once the unit type is a struct
fn rewrite_unit_ctor(context: &mut AstContext, id: NodeId) -> bool {
    let CtorKind::Unit { ids } = context.ctor(id).kind.clone() else { return false };
    context.ctor_mut(id).kind = CtorKind::Struct { ids };
    true
}

/// The Spicy `sink` type lowers to a strong reference to the runtime sink
fn rewrite_sink_type(context: &mut AstContext, id: NodeId) -> bool {
    if !matches!(context.utype(id).kind, TypeKind::Sink) {
        return false;
    }
    let Some(parent) = context.parent(id) else { return false };
    if !matches!(context.node(parent).kind, NodeKind::QualifiedType(_)) {
        return false;
    }

    let Some(slot) = (0..context.node(parent).children.len()).find(|slot| context.child(parent, *slot) == Some(id)) else {
        return false;
    };
    context.detach_child(parent, slot);

    let mut builder = Builder::new(context);
    let runtime_sink = builder.library_type("spicy_rt::Sink");
    let sink_qt = builder.qtype_nonconst(runtime_sink);
    let reference = builder.strong_reference_type(sink_qt);
    context.set_child(parent, slot, Some(reference));
    debug!("[spicy-codegen] lowered sink type to strong_ref<spicy_rt::Sink>");
    true
}

/// Rewrites resolved Spicy-only operators into HILTI forms
fn rewrite_expression(context: &mut AstContext, registry: &Registry, id: NodeId) -> bool {
    let ExpressionKind::ResolvedOperator { operator, .. } = context.expression(id).kind.clone() else {
        return false;
    };
    let descriptor = registry.operator(operator);
    let namespace = descriptor.namespace;
    if namespace != "unit" && namespace != "sink" {
        return false;
    }
    let member = descriptor.member_id;
    let kind = descriptor.kind;

    let operands = context.operator_operands(id);
    let object = operands.first().copied();
    let args = member_call_args(context, &operands);

    let replacement = match (namespace, member) {
        // Plain member access re-resolves against the compiled struct.
        ("unit", None) => {
            let Some(object) = object else { return false };
            let member_expr = operands.get(1).copied();
            let (Some(object), Some(member_expr)) = (detach(context, id, object), member_expr.and_then(|m| detach(context, id, m))) else {
                return false;
            };
            let mut builder = Builder::new(context);
            builder.expr_unresolved_operator(kind, vec![object, member_expr])
        }

        ("unit", Some("offset")) => rewrite_member_read(context, id, object, "__offset"),
        ("unit", Some("context")) => rewrite_member_read(context, id, object, "__context"),
        ("unit", Some("input")) => {
            let begin = rewrite_member_read(context, id, object, "__begin");
            let mut builder = Builder::new(context);
            builder.expr_unresolved_operator(Kind::Deref, vec![begin])
        }
        ("unit", Some("position")) => {
            // `*__begin + __offset`
            let Some(object) = object.and_then(|object| detach(context, id, object)) else { return false };
            let object_copy = context.deep_copy(object);
            let mut builder = Builder::new(context);
            let begin = builder.member(object, ID::new("__begin"));
            let deref = builder.expr_unresolved_operator(Kind::Deref, vec![begin]);
            let offset = builder.member(object_copy, ID::new("__offset"));
            builder.expr_unresolved_operator(Kind::Sum, vec![deref, offset])
        }
        ("unit", Some("set_input")) => {
            let Some(object) = object.and_then(|object| detach(context, id, object)) else { return false };
            let Some(value) = args.first().copied().and_then(|value| detach_arg(context, value)) else { return false };
            let mut builder = Builder::new(context);
            let target = builder.member(object, ID::new("__position_update"));
            builder.expr_assign(target, value)
        }
        ("unit", Some("find")) => runtime_call(context, id, "spicy_rt::unit_find", object, &args, |builder| {
            let iterator = builder.stream_iterator_type();
            let qt = builder.qtype_nonconst(iterator);
            builder.optional_type(qt)
        }),
        ("unit", Some("backtrack")) => runtime_void_call(context, id, "spicy_rt::backtrack", object, &args),
        ("unit", Some("connect_filter")) => runtime_void_call(context, id, "spicy_rt::filter_connect", object, &args),
        ("unit", Some("forward")) => runtime_void_call(context, id, "spicy_rt::filter_forward", object, &args),
        ("unit", Some("forward_eod")) => runtime_void_call(context, id, "spicy_rt::filter_forward_eod", object, &args),

        // All sink operations go through the runtime sink API.
        ("sink", Some(member)) => {
            let name = format!("spicy_rt::sink_{member}");
            runtime_void_call(context, id, name, object, &args)
        }
        ("sink", None) if kind == Kind::Size => runtime_call(context, id, "spicy_rt::sink_size", object, &args, |builder| builder.uint_type(64)),

        _ => return false,
    };

    context.replace_child(id, replacement);
    debug!("[spicy-codegen] rewrote {namespace} operator to HILTI form");
    true
}

/// The argument expressions of a member call's tuple operand
fn member_call_args(context: &AstContext, operands: &[NodeId]) -> Vec<NodeId> {
    operands
        .get(2)
        .and_then(|tuple_expr| match &context.expression(*tuple_expr).kind {
            ExpressionKind::Ctor => context.child(*tuple_expr, 0).map(|ctor| context.ctor_values(ctor)),
            _ => None,
        })
        .unwrap_or_default()
}

fn detach(context: &mut AstContext, parent: NodeId, child: NodeId) -> Option<NodeId> {
    context.remove_child(parent, child);
    Some(child)
}

/// Detaches an argument expression from inside the call's argument tuple
fn detach_arg(context: &mut AstContext, arg: NodeId) -> Option<NodeId> {
    let parent = context.parent(arg)?;
    context.remove_child(parent, arg);
    Some(arg)
}

fn rewrite_member_read(context: &mut AstContext, id: NodeId, object: Option<NodeId>, member: &str) -> NodeId {
    let object = object.and_then(|object| detach(context, id, object)).expect("member rewrite needs an object");
    let mut builder = Builder::new(context);
    builder.member(object, ID::new(member))
}

fn runtime_call(
    context: &mut AstContext,
    id: NodeId,
    name: impl Into<String>,
    object: Option<NodeId>,
    args: &[NodeId],
    make_type: impl FnOnce(&mut Builder<'_>) -> NodeId,
) -> NodeId {
    let mut all_args = Vec::new();
    if let Some(object) = object.and_then(|object| detach(context, id, object)) {
        all_args.push(object);
    }
    for arg in args {
        if let Some(arg) = detach_arg(context, *arg) {
            all_args.push(arg);
        }
    }

    let mut builder = Builder::new(context);
    let ty = make_type(&mut builder);
    let result = builder.qtype_nonconst(ty);
    builder.expr_builtin_function(name, result, all_args)
}

fn runtime_void_call(context: &mut AstContext, id: NodeId, name: impl Into<String>, object: Option<NodeId>, args: &[NodeId]) -> NodeId {
    runtime_call(context, id, name, object, args, |builder| builder.void_type())
}

/// Rewrites Spicy-only statements
fn rewrite_statement(context: &mut AstContext, id: NodeId) -> bool {
    match context.statement(id).kind.clone() {
        // `print a, b` lowers to hilti::print / hilti::printValues.
        StatementKind::Print => {
            let args: Vec<NodeId> = context.children(id).collect();
            for arg in &args {
                context.remove_child(id, *arg);
            }
            let function = match args.len() {
                0 | 1 => "print",
                _ => "printValues",
            };
            let mut builder = Builder::new(context);
            let call = builder.call(ID::new(format!("hilti::{function}")), args);
            let replacement = builder.stmt_expression(call);
            context.replace_child(id, replacement);
            true
        }

        // `confirm` / `reject` call the runtime with the current instance.
        StatementKind::Confirm | StatementKind::Reject => {
            let runtime = match context.statement(id).kind {
                StatementKind::Confirm => "spicy_rt::confirm",
                _ => "spicy_rt::reject",
            };
            let mut builder = Builder::new(context);
            let self_expr = builder.expr_name(ID::new("self"));
            let void = builder.void_type();
            let result = builder.qtype_const(void);
            let call = builder.expr_builtin_function(runtime, result, vec![self_expr]);
            let replacement = builder.stmt_expression(call);
            context.replace_child(id, replacement);
            true
        }

        // `stop` sets the stop flag and leaves the current hook.
        StatementKind::Stop => {
            let mut builder = Builder::new(context);
            let self_expr = builder.expr_name(ID::new("self"));
            let member = builder.member(self_expr, ID::new("__stop"));
            let true_ctor = builder.ctor_bool(true);
            let true_expr = builder.expr_ctor(true_ctor);
            let assign = builder.expr_assign(member, true_expr);
            let assign_stmt = builder.stmt_expression(assign);
            let ret = builder.stmt_return(None);
            let replacement = builder.block(vec![assign_stmt, ret]);
            context.replace_child(id, replacement);
            true
        }

        _ => false,
    }
}
