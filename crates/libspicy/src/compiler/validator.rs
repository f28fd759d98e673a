//! The validator: read-only AST walks that record errors on nodes.
//!
//! Each plugin contributes `pre_resolve` and `post_resolve` hooks; the core
//! adds its own structural checks here. After both hooks, `collect_errors`
//! extracts the recorded errors, attaches the nearest enclosing source
//! location to any error lacking one, and reports only the highest-priority
//! bucket so that cascade errors stay quiet.

use indexmap::IndexMap;
use simplelog::debug;

use crate::ast::attribute::AttributeKind;
use crate::ast::context::AstContext;
use crate::ast::declaration::DeclarationKind;
use crate::ast::expression::ExpressionKind;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::visitor;
use crate::compiler::plugin::Plugin;
use crate::error::{CompileError, DiagnosticItem, ErrorPriority, Result};
use crate::file::SourceFile;
use crate::spicy::unit::UnitItem;

/// Hook names a unit hook may use besides field names
const UNIT_HOOK_NAMES: [&str; 6] = ["%init", "%done", "%error", "%synced", "%finally", "%confirmed"];

/// Pre-resolution validation: structural checks that do not need types
pub fn validate_pre(context: &mut AstContext, plugin: &Plugin) {
    debug!("[compiler] pre-validation ({})", plugin.extension);

    check_duplicate_module_declarations(context);

    if let Some(hook) = &plugin.ast_validate_pre {
        hook(context);
    }
}

/// Post-resolution validation: checks over the resolved AST
pub fn validate_post(context: &mut AstContext, plugin: &Plugin) {
    debug!("[compiler] post-validation ({})", plugin.extension);

    check_attribute_arguments(context);
    check_unit_hook_names(context);

    if let Some(hook) = &plugin.ast_validate_post {
        hook(context);
    }
}

/// Module-level duplicate detection; function and hook names may repeat
/// (overloads, multi-dispatch), everything else may not
fn check_duplicate_module_declarations(context: &mut AstContext) {
    for module in context.modules() {
        let mut seen: IndexMap<String, NodeId> = IndexMap::new();
        let declarations: Vec<NodeId> = context.children(module).collect();

        for declaration in declarations {
            if !context.is_declaration(declaration) {
                continue;
            }
            let payload = context.declaration(declaration);
            if matches!(payload.kind, DeclarationKind::Function | DeclarationKind::UnitHook { .. }) {
                continue;
            }
            let name = payload.id.local().to_string();
            if name.is_empty() {
                continue;
            }

            match seen.get(&name) {
                Some(_) => {
                    context.add_error(declaration, format!("redefinition of '{name}'"), ErrorPriority::Normal);
                }
                None => {
                    seen.insert(name, declaration);
                }
            }
        }
    }
}

/// Attributes that require a value must carry one; flag-only attributes must
/// not
fn check_attribute_arguments(context: &mut AstContext) {
    let needs_value = [
        AttributeKind::Size,
        AttributeKind::MaxSize,
        AttributeKind::Count,
        AttributeKind::Convert,
        AttributeKind::ParseFrom,
        AttributeKind::ParseAt,
        AttributeKind::Until,
        AttributeKind::UntilIncluding,
        AttributeKind::While,
        AttributeKind::Requires,
        AttributeKind::CxxName,
        AttributeKind::NeededByFeature,
        AttributeKind::RequiresTypeFeature,
    ];
    let forbids_value = [
        AttributeKind::Try,
        AttributeKind::Synchronize,
        AttributeKind::Optional,
        AttributeKind::Internal,
        AttributeKind::Anonymous,
        AttributeKind::Transient,
        AttributeKind::OnHeap,
        AttributeKind::AlwaysEmit,
        AttributeKind::Chunked,
        AttributeKind::Eod,
        AttributeKind::NoSub,
    ];

    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            if !matches!(context.node(id).kind, NodeKind::Attribute(_)) {
                continue;
            }
            let kind = context.attribute(id).kind;
            let has_value = context.attribute_value(id).is_some();

            if needs_value.contains(&kind) && !has_value {
                context.add_error(id, format!("attribute '{kind}' requires an argument"), ErrorPriority::Normal);
            }
            if forbids_value.contains(&kind) && has_value {
                context.add_error(id, format!("attribute '{kind}' does not take an argument"), ErrorPriority::Normal);
            }
        }
    }
}

/// Unit hooks must name a well-known event or an existing field
fn check_unit_hook_names(context: &mut AstContext) {
    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            if !matches!(context.node(id).kind, NodeKind::UnitItem(_)) {
                continue;
            }
            let UnitItem::Hook { name, .. } = context.unit_item(id).clone() else { continue };
            if UNIT_HOOK_NAMES.contains(&name.as_str()) {
                continue;
            }

            // A non-% hook must match a field of the enclosing unit.
            let unit = context
                .ancestors(id)
                .find(|ancestor| matches!(&context.node(*ancestor).kind, NodeKind::Type(ty) if ty.kind.is_unit()));
            let Some(unit) = unit else { continue };

            let field_exists = context.unit_fields(unit).iter().any(|field| {
                matches!(context.unit_item(*field), UnitItem::Field { id: Some(field_id), .. } if field_id.local() == name)
            });
            if !field_exists && !name.starts_with('%') {
                context.add_error(id, format!("hook 'on {name}' does not match any field"), ErrorPriority::Normal);
            } else if name.starts_with('%') {
                context.add_error(id, format!("unknown hook '{name}'"), ErrorPriority::Normal);
            }
        }
    }
}

/// Walks the AST, extracts all recorded errors, and reports the highest
/// non-empty priority bucket
pub fn collect_errors(context: &mut AstContext) -> Result<()> {
    let mut collected: Vec<DiagnosticItem> = Vec::new();
    let mut highest = ErrorPriority::NoError;

    let root = context.root();
    for id in visitor::post_order(context, root) {
        if context.node(id).errors.is_empty() {
            continue;
        }
        let location = context.nearest_location(id);
        for error in &context.node(id).errors {
            let location = error.location.clone().or_else(|| location.clone());
            let (position, file) = match location {
                Some(location) => (location.position, location.file),
                None => (0..0, SourceFile::synthetic()),
            };
            highest = highest.max(error.priority);
            collected.push(DiagnosticItem {
                message: error.message.clone(),
                priority: error.priority,
                position,
                code: file.into(),
            });
        }
    }

    if highest == ErrorPriority::NoError {
        return Ok(());
    }

    let reported: Vec<DiagnosticItem> = collected.into_iter().filter(|item| item.priority == highest).collect();
    debug!("[compiler] reporting {} error(s) at priority {:?}", reported.len(), highest);
    Err(CompileError::diagnostics(reported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::id::{ModuleUid, ID};

    #[test]
    fn duplicate_globals_are_flagged() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        for _ in 0..2 {
            let ty = builder.int_type(8);
            let qt = builder.qtype_nonconst(ty);
            let global = builder.global_decl(ID::new("dup"), qt, None, Default::default());
            builder.add_declaration(module, global);
        }

        check_duplicate_module_declarations(&mut context);
        assert!(collect_errors(&mut context).is_err());
    }

    #[test]
    fn highest_priority_bucket_wins() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let ty = builder.int_type(8);
        let qt = builder.qtype_nonconst(ty);
        let global = builder.global_decl(ID::new("x"), qt, None, Default::default());
        builder.add_declaration(module, global);

        context.add_error(global, "low follow-on", ErrorPriority::Low);
        context.add_error(module, "the real problem", ErrorPriority::High);

        let error = collect_errors(&mut context).unwrap_err();
        let CompileError::Diagnostics(diagnostics) = error else { panic!("expected diagnostics") };
        assert_eq!(diagnostics.errors.len(), 1);
        assert_eq!(diagnostics.errors[0].message, "the real problem");
    }

    #[test]
    fn no_errors_is_ok() {
        let mut context = AstContext::default();
        assert!(collect_errors(&mut context).is_ok());
    }
}
