//! The global optimizer.
//!
//! Disabled unless `options.global_optimizations` is set. Runs a set of
//! independent visitors in rounds until none of them modifies the AST:
//!
//! - **feature-requirements**: toggles unused `__feat%<type>%<feature>`
//!   constants to `false` and annotates the affected type declarations
//! - **functions**: removes unimplemented, unreferenced functions and
//!   replaces calls to unimplemented hooks with default values
//! - **constant-folding**: folds boolean operations and eliminates dead
//!   branches
//! - **members**: drops `&internal` struct fields nobody reads
//! - **types**: drops never-referenced non-public struct and enum types
//!
//! Each visitor works in three phases: collect uses, prune uses, prune
//! declarations.

use std::collections::HashSet;

use simplelog::debug;

use crate::ast::attribute::AttributeKind;
use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::ctor::CtorKind;
use crate::ast::declaration::{DeclarationKind, Linkage};
use crate::ast::expression::ExpressionKind;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::statement::StatementKind;
use crate::ast::types::TypeKind;
use crate::ast::visitor;
use crate::operators::Kind;

/// Name prefix of feature-flag constants
pub const FEATURE_PREFIX: &str = "__feat%";

/// Runs the optimizer to its own fixed point
pub fn optimize(context: &mut AstContext) {
    debug!("[optimizer] starting global optimizations");
    loop {
        let mut modified = false;
        modified |= feature_requirements(context);
        modified |= functions(context);
        modified |= constant_folding(context);
        modified |= members(context);
        modified |= types(context);
        if !modified {
            break;
        }
    }
}

/// Everything the prune phases need to know about usage
struct Uses {
    /// Declarations referenced by resolved names or type names
    declarations: HashSet<NodeId>,
    /// Member names accessed through member or member-call operators
    members: HashSet<String>,
    /// Features exercised per type id: `(type, feature)` pairs
    features: HashSet<(String, String)>,
}

/// Collect phase shared by all visitors
fn collect_uses(context: &AstContext) -> Uses {
    let mut uses = Uses {
        declarations: HashSet::new(),
        members: HashSet::new(),
        features: HashSet::new(),
    };

    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            match &context.node(id).kind {
                NodeKind::Expression(expression) => match &expression.kind {
                    ExpressionKind::Name { resolved: Some(declaration), .. } => {
                        uses.declarations.insert(*declaration);
                    }
                    ExpressionKind::ResolvedOperator { kind, .. } | ExpressionKind::UnresolvedOperator { kind } => {
                        if matches!(kind, Kind::Member | Kind::TryMember | Kind::HasMember | Kind::MemberCall) {
                            let operands = context.operator_operands(id);
                            if let Some(member) = operands.get(1) {
                                if let ExpressionKind::Member { id: member_id } = &context.expression(*member).kind {
                                    uses.members.insert(member_id.local().to_string());
                                    record_feature_use(context, operands.first().copied(), member_id.local(), &mut uses);
                                }
                            }
                        }
                    }
                    _ => {}
                },
                NodeKind::Type(ty) => {
                    if let TypeKind::Name { resolved: Some(declaration), .. } = &ty.kind {
                        uses.declarations.insert(*declaration);
                    }
                }
                _ => {}
            }
        }
    }

    uses
}

/// Marks `(type, feature)` as exercised when an accessed member carries a
/// `&needed-by-feature` attribute
fn record_feature_use(context: &AstContext, object: Option<NodeId>, member: &str, uses: &mut Uses) {
    let Some(object) = object else { return };
    let Some(object_ty) = context.expression_type(object) else { return };
    let inner = context.inner_type(object_ty);

    let Some(type_id) = context.type_id(inner) else { return };
    let field = context
        .type_fields(inner)
        .into_iter()
        .find(|field| context.declaration(*field).id.local() == member);
    let Some(field) = field else { return };

    let attributes = context.field_attributes(field);
    if let Some(value) = context.attribute_value_of(attributes, AttributeKind::NeededByFeature) {
        if let Some(feature) = string_value(context, value) {
            uses.features.insert((type_id.to_string(), feature));
        }
    }
}

/// The literal string behind an expression, if it is one
fn string_value(context: &AstContext, expr: NodeId) -> Option<String> {
    let ctor = match &context.expression(expr).kind {
        ExpressionKind::Ctor => context.child(expr, 0)?,
        _ => return None,
    };
    match &context.ctor(ctor).kind {
        CtorKind::String_ { value } => Some(value.clone()),
        _ => None,
    }
}

/// Splits a `__feat%<type>%<feature>` constant name
fn parse_feature_constant(name: &str) -> Option<(String, String)> {
    let rest = name.strip_prefix(FEATURE_PREFIX)?;
    let (type_id, feature) = rest.split_once('%')?;
    Some((type_id.to_string(), feature.to_string()))
}

/// Toggles unused feature constants to `false`
fn feature_requirements(context: &mut AstContext) -> bool {
    let uses = collect_uses(context);
    let mut modified = false;

    for module in context.modules() {
        let declarations: Vec<NodeId> = context.children(module).collect();
        for declaration in declarations {
            if !context.is_declaration(declaration) {
                continue;
            }
            if !matches!(context.declaration(declaration).kind, DeclarationKind::Constant) {
                continue;
            }
            let name = context.declaration(declaration).id.local().to_string();
            let Some((type_id, feature)) = parse_feature_constant(&name) else { continue };
            if uses.features.contains(&(type_id.clone(), feature.clone())) {
                continue;
            }

            // Already false?
            let value_is_true = context
                .declaration_value(declaration)
                .and_then(|value| match &context.expression(value).kind {
                    ExpressionKind::Ctor => context.child(value, 0),
                    _ => None,
                })
                .map(|ctor| matches!(context.ctor(ctor).kind, CtorKind::Bool { value: true }))
                .unwrap_or(false);
            if !value_is_true {
                continue;
            }

            debug!("[optimizer-collect] disabling feature '{feature}' for type '{type_id}'");
            let mut builder = Builder::new(context);
            let false_ctor = builder.ctor_bool(false);
            let false_expr = builder.expr_ctor(false_ctor);
            context.set_child(declaration, 1, Some(false_expr));

            // Annotate the type declaration for downstream readers.
            for candidate_module in context.modules() {
                let lookup = context.lookup_id(candidate_module, &crate::ast::id::ID::new(type_id.clone()));
                for type_decl in lookup.candidates {
                    context
                        .node_mut(type_decl)
                        .meta
                        .comments
                        .push(format!("feature '{feature}' disabled by the optimizer"));
                }
            }

            modified = true;
        }
    }

    modified
}

/// True if the function declaration has an implementation body
fn has_body(context: &AstContext, declaration: NodeId) -> bool {
    context.function_body(declaration).is_some()
}

/// Removes unimplemented, unreferenced functions; replaces calls to
/// unimplemented hooks with the default value of their return type
fn functions(context: &mut AstContext) -> bool {
    let uses = collect_uses(context);
    let mut modified = false;

    // PruneUses: calls to hooks without any implementation produce the
    // return type's default value instead.
    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            if !context.is_expression(id) || context.parent(id).is_none() {
                continue;
            }
            let ExpressionKind::ResolvedOperator { kind: Kind::Call, .. } = &context.expression(id).kind else {
                continue;
            };
            let operands = context.operator_operands(id);
            let Some(callee) = operands.first() else { continue };
            let ExpressionKind::Name { resolved: Some(declaration), .. } = &context.expression(*callee).kind else {
                continue;
            };
            let declaration = *declaration;

            let is_unimplemented_hook = match &context.declaration(declaration).kind {
                DeclarationKind::Function => {
                    let ftype = context.declaration_type(declaration);
                    let is_hook = ftype
                        .map(|qt| {
                            matches!(
                                context.utype(context.inner_type(qt)).kind,
                                TypeKind::Function { flavor: crate::ast::types::FunctionFlavor::Hook }
                            )
                        })
                        .unwrap_or(false);
                    is_hook && !has_body(context, declaration)
                }
                DeclarationKind::UnitHook { .. } => !has_body(context, declaration),
                _ => false,
            };
            if !is_unimplemented_hook {
                continue;
            }

            let Some(result) = context.child(id, 0) else { continue };
            let result_copy = context.deep_copy(result);
            let mut builder = Builder::new(context);
            let default = builder.ctor_default(result_copy, Vec::new());
            let replacement = builder.expr_ctor(default);
            context.replace_child(id, replacement);
            modified = true;
            debug!("[optimizer] replaced call to unimplemented hook with default value");
        }
    }

    // PruneDecls: drop functions that have no body and no reference.
    for module in context.modules() {
        let declarations: Vec<NodeId> = context.children(module).collect();
        for declaration in declarations {
            if !context.is_declaration(declaration) {
                continue;
            }
            if !matches!(context.declaration(declaration).kind, DeclarationKind::Function) {
                continue;
            }
            if context.declaration(declaration).linkage == Linkage::Public {
                continue;
            }
            if has_body(context, declaration) || uses.declarations.contains(&declaration) {
                continue;
            }

            debug!("[optimizer] removing unimplemented function '{}'", context.declaration(declaration).id);
            context.remove_child(module, declaration);
            modified = true;
        }
    }

    modified
}

/// The literal boolean behind an expression, if it is one
fn bool_value(context: &AstContext, expr: NodeId) -> Option<bool> {
    let ctor = match &context.expression(expr).kind {
        ExpressionKind::Ctor => context.child(expr, 0)?,
        ExpressionKind::Coerced | ExpressionKind::TypeWrapped => return bool_value(context, context.child(expr, 0)?),
        ExpressionKind::Name { resolved: Some(declaration), .. } => {
            let value = context.declaration_value(*declaration)?;
            return bool_value(context, value);
        }
        _ => return None,
    };
    match &context.ctor(ctor).kind {
        CtorKind::Bool { value } => Some(*value),
        _ => None,
    }
}

/// Boolean constant folding and dead-branch elimination
fn constant_folding(context: &mut AstContext) -> bool {
    let mut modified = false;

    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            if context.parent(id).is_none() {
                continue;
            }

            if context.is_expression(id) {
                let kind = context.expression(id).kind.clone();
                let folded = match kind {
                    ExpressionKind::LogicalAnd => {
                        let (a, b) = (context.child(id, 1), context.child(id, 2));
                        match (a.and_then(|a| bool_value(context, a)), b.and_then(|b| bool_value(context, b))) {
                            (Some(a), Some(b)) => Some(a && b),
                            (Some(false), _) => Some(false),
                            (_, Some(false)) => Some(false),
                            _ => None,
                        }
                    }
                    ExpressionKind::LogicalOr => {
                        let (a, b) = (context.child(id, 1), context.child(id, 2));
                        match (a.and_then(|a| bool_value(context, a)), b.and_then(|b| bool_value(context, b))) {
                            (Some(a), Some(b)) => Some(a || b),
                            (Some(true), _) => Some(true),
                            (_, Some(true)) => Some(true),
                            _ => None,
                        }
                    }
                    ExpressionKind::LogicalNot => context.child(id, 1).and_then(|a| bool_value(context, a)).map(|a| !a),
                    ExpressionKind::Ternary => {
                        if let Some(condition) = context.child(id, 0) {
                            if let Some(value) = bool_value(context, condition) {
                                let slot = if value { 1 } else { 2 };
                                if let Some(branch) = context.detach_child(id, slot) {
                                    context.replace_child(id, branch);
                                    modified = true;
                                }
                            }
                        }
                        None
                    }
                    _ => None,
                };

                if let Some(value) = folded {
                    let mut builder = Builder::new(context);
                    let ctor = builder.ctor_bool(value);
                    let replacement = builder.expr_ctor(ctor);
                    context.replace_child(id, replacement);
                    modified = true;
                }
                continue;
            }

            // `if` with a literal condition keeps only the taken branch (or
            // disappears entirely).
            if context.is_statement(id) && matches!(context.statement(id).kind, StatementKind::If) {
                let Some(condition) = context.child(id, 1) else { continue };
                let Some(value) = bool_value(context, condition) else { continue };

                let taken = match value {
                    true => context.detach_child(id, 2),
                    false => context.detach_child(id, 3),
                };
                match taken {
                    Some(branch) => context.replace_child(id, branch),
                    None => {
                        let mut builder = Builder::new(context);
                        let empty = builder.block(Vec::new());
                        context.replace_child(id, empty);
                    }
                }
                modified = true;
                debug!("[optimizer] folded constant if-branch");
            }
        }
    }

    modified
}

/// Whether an active feature flag keeps this field alive
fn kept_by_feature(context: &AstContext, field: NodeId) -> bool {
    let attributes = context.field_attributes(field);
    let Some(value) = context.attribute_value_of(attributes, AttributeKind::NeededByFeature) else {
        return false;
    };
    let Some(feature) = string_value(context, value) else { return false };

    // The flag constant is alive when any module still carries it as true.
    for module in context.modules() {
        for declaration in context.children(module).collect::<Vec<_>>() {
            if !context.is_declaration(declaration) {
                continue;
            }
            let name = context.declaration(declaration).id.local().to_string();
            let Some((_, flag_feature)) = parse_feature_constant(&name) else { continue };
            if flag_feature != feature {
                continue;
            }
            let is_true = context
                .declaration_value(declaration)
                .and_then(|value| bool_value(context, value))
                .unwrap_or(false);
            if is_true {
                return true;
            }
        }
    }
    false
}

/// Drops `&internal` struct fields whose only reader is absent
fn members(context: &mut AstContext) -> bool {
    let uses = collect_uses(context);
    let mut modified = false;

    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            let is_struct = matches!(&context.node(id).kind, NodeKind::Type(ty) if matches!(ty.kind, TypeKind::Struct { .. }));
            if !is_struct || context.parent(id).is_none() {
                continue;
            }

            for field in context.type_fields(id) {
                let name = context.declaration(field).id.local().to_string();
                let attributes = context.field_attributes(field);
                if !context.has_attribute(attributes, AttributeKind::Internal) {
                    continue;
                }
                if uses.members.contains(&name) {
                    continue;
                }
                if kept_by_feature(context, field) {
                    continue;
                }

                debug!("[optimizer] dropping unused internal field '{name}'");
                context.remove_child(id, field);
                modified = true;
            }
        }
    }

    modified
}

/// Drops struct and enum type declarations nothing references
fn types(context: &mut AstContext) -> bool {
    let uses = collect_uses(context);
    let mut modified = false;

    for module in context.modules() {
        let declarations: Vec<NodeId> = context.children(module).collect();
        for declaration in declarations {
            if !context.is_declaration(declaration) {
                continue;
            }
            let payload = context.declaration(declaration);
            if !payload.kind.is_type() || payload.linkage == Linkage::Public {
                continue;
            }
            let Some(qt) = context.declaration_type(declaration) else { continue };
            let inner = context.inner_type_raw(qt);
            if !matches!(context.utype(inner).kind, TypeKind::Struct { .. } | TypeKind::Enum { .. }) {
                continue;
            }
            if uses.declarations.contains(&declaration) {
                continue;
            }

            debug!("[optimizer] removing unreferenced type '{}'", context.declaration(declaration).id);
            context.remove_child(module, declaration);
            modified = true;
        }
    }

    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::id::{ModuleUid, ID};

    #[test]
    fn folds_literal_if_branches() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let cond_ctor = builder.ctor_bool(false);
        let condition = builder.expr_ctor(cond_ctor);
        let then_block = builder.block(vec![]);
        let if_stmt = builder.stmt_if(None, condition, then_block, None);

        let body = builder.block(vec![if_stmt]);
        let void = builder.void_type();
        let void_qt = builder.qtype_const(void);
        let ftype = builder.function_type(crate::ast::types::FunctionFlavor::Function, void_qt, vec![]);
        let ftype_qt = builder.qtype_const(ftype);
        let function = builder.function(ID::new("f"), ftype_qt, Some(body));
        let decl = builder.function_decl(ID::new("f"), function, Linkage::Public);
        builder.add_declaration(module, decl);

        assert!(constant_folding(&mut context));
        // The false branch is gone; the body's only statement is an empty
        // block now.
        let statements: Vec<NodeId> = context.children(body).collect();
        assert_eq!(statements.len(), 1);
        assert!(context.statement(statements[0]).kind.is_block());
    }

    #[test]
    fn drops_unreferenced_private_struct() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let struct_ty = builder.struct_type(vec![], vec![]);
        let decl = builder.type_decl(ID::new("Unused"), struct_ty, Linkage::Private);
        builder.add_declaration(module, decl);

        assert!(types(&mut context));
        assert!(context.children(module).next().is_none());
    }

    #[test]
    fn keeps_public_struct() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let struct_ty = builder.struct_type(vec![], vec![]);
        let decl = builder.type_decl(ID::new("Kept"), struct_ty, Linkage::Public);
        builder.add_declaration(module, decl);

        assert!(!types(&mut context));
        assert_eq!(context.children(module).count(), 1);
    }

    #[test]
    fn drops_unread_internal_field() {
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
        let decl = builder.type_decl(ID::new("S"), struct_ty, Linkage::Public);
        builder.add_declaration(module, decl);

        assert!(members(&mut context));
        let fields = context.type_fields(struct_ty);
        assert_eq!(fields.len(), 1);
        assert_eq!(context.declaration(fields[0]).id.local(), "a");
    }
}
