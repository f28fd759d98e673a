//! Spicy: the parser-generator language layered on top of HILTI.
//!
//! The Spicy plugin adds unit types, their grammars, and the lowering that
//! rewrites every Spicy construct into HILTI before code generation.

pub mod grammar;
pub mod lowering;
pub mod parser_builder;
pub mod production;
pub mod unit;

use simplelog::debug;

use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::types::TypeKind;
use crate::ast::visitor;
use crate::compiler::plugin::Plugin;
use crate::error::Result;
use crate::operators::Registry;
use crate::spicy::unit::UnitItem;

/// The Spicy plugin: sorts after HILTI, contributes the unit resolver round
/// and the lowering transform
pub fn spicy_plugin() -> Plugin {
    let mut plugin = Plugin::new("spicy", 10);
    plugin.ast_resolve = Some(Box::new(resolve_round));
    plugin.ast_transform = Some(Box::new(lowering::transform));
    plugin
}

/// The Spicy-specific slice of a resolver round
fn resolve_round(context: &mut AstContext, _registry: &mut Registry) -> Result<bool> {
    Ok(rewrite_void_fields(context))
}

/// Deprecated form: a `void` field carrying attributes parses as a skip
/// field; rewritten with a warning rather than rejected
fn rewrite_void_fields(context: &mut AstContext) -> bool {
    let mut modified = false;

    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            if !matches!(context.node(id).kind, NodeKind::UnitItem(_)) {
                continue;
            }
            let UnitItem::Field { id: field_id, skip: false } = context.unit_item(id).clone() else {
                continue;
            };
            let Some(ty) = context.unit_item_type(id) else { continue };
            if !matches!(context.utype(context.inner_type(ty)).kind, TypeKind::Void) {
                continue;
            }
            if context.unit_field_attributes(id).is_none() {
                continue;
            }

            log::warn!(
                "field '{}' of type void with attributes is deprecated; parsing it as a skip field",
                field_id.as_ref().map(|id| id.to_string()).unwrap_or_else(|| String::from("<anonymous>"))
            );

            let bytes = {
                let mut builder = Builder::new(context);
                let bytes_ty = builder.bytes_type();
                builder.qtype_nonconst(bytes_ty)
            };
            context.set_child(id, 0, Some(bytes));
            if let NodeKind::UnitItem(UnitItem::Field { skip, .. }) = &mut context.node_mut(id).kind {
                *skip = true;
            }
            modified = true;
            debug!("[spicy-verbose] rewrote void field to skip bytes");
        }
    }

    modified
}

/// Finds all unit type declarations in a module (used by tests and the
/// transform)
pub fn unit_declarations(context: &AstContext, module: NodeId) -> Vec<NodeId> {
    context
        .children(module)
        .filter(|declaration| {
            context.is_declaration(*declaration)
                && context.declaration(*declaration).kind.is_type()
                && context
                    .declaration_type(*declaration)
                    .map(|qt| context.utype(context.inner_type_raw(qt)).kind.is_unit())
                    .unwrap_or(false)
        })
        .collect()
}
