//! The scope builder: populates lexical scopes from declarations.
//!
//! A single post-order pass per module. Each declaration lands in the scope
//! of the node that makes it visible: module scope for globals, types,
//! functions, constants, and imports; the owning statement node for locals,
//! for-loop variables, switch conditions, and catch parameters; the type
//! node itself for `self`, type parameters, and members. Enum labels are
//! injected into the declaring module's scope.
//!
//! Hooks get `$$` bound to their `__dd` parameter when the surrounding field
//! provides one; hooks without one get an explicit not-found marker so that
//! an enclosing `$$` cannot leak in.

use simplelog::debug;

use crate::ast::context::AstContext;
use crate::ast::declaration::DeclarationKind;
use crate::ast::expression::ExpressionKind;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::statement::StatementKind;
use crate::ast::types::TypeKind;
use crate::ast::visitor;
use crate::spicy::unit::UnitItem;

/// Rebuilds the scopes of every module in the context
pub fn build_scopes(context: &mut AstContext) {
    debug!("[compiler] building scopes");
    for module in context.modules() {
        build_module_scopes(context, module);
    }
}

fn build_module_scopes(context: &mut AstContext, module: NodeId) {
    for id in visitor::post_order(context, module) {
        let is_type = matches!(context.node(id).kind, NodeKind::Type(_));
        if context.is_declaration(id) {
            place_declaration(context, module, id);
        } else if is_type {
            populate_type_scope(context, module, id);
        } else if context.is_statement(id) {
            populate_statement_scope(context, id);
        } else if context.is_expression(id) {
            populate_expression_scope(context, id);
        }
    }
}

/// Inserts a declaration into the scope of the node that makes it visible
fn place_declaration(context: &mut AstContext, module: NodeId, decl: NodeId) {
    let Some(parent) = context.parent(decl) else { return };
    let name = context.declaration(decl).id.local().to_string();
    if name.is_empty() {
        return;
    }

    let class = crate::ast::declaration::DeclarationClass::from(&context.declaration(decl).kind);
    use crate::ast::declaration::DeclarationClass;

    match class {
        // Module-level declarations; also enum labels synthesized under a
        // type declaration.
        DeclarationClass::Type
        | DeclarationClass::Constant
        | DeclarationClass::GlobalVariable
        | DeclarationClass::Function
        | DeclarationClass::ImportedModule => {
            let target = match context.is_declaration(parent) && matches!(context.declaration(parent).kind, DeclarationKind::Type) {
                // A constant owned by a type declaration is an enum label;
                // it goes into the declaring module's scope.
                true => module,
                false => match parent == module {
                    true => module,
                    false => parent,
                },
            };
            context.node_mut(target).scope_mut().insert(name, decl);
        }

        DeclarationClass::UnitHook => {
            context.node_mut(module).scope_mut().insert(name, decl);
            bind_dollar_dollar(context, decl);
        }

        // Locals declared in statements are placed by the statement visitor;
        // locals in declaration statements land in the enclosing block.
        DeclarationClass::LocalVariable => {
            let in_declaration_stmt = context.is_statement(parent) && context.statement(parent).kind.is_declaration();
            if in_declaration_stmt {
                let block = context
                    .ancestors(parent)
                    .find(|a| matches!(&context.node(*a).kind, NodeKind::Statement(s) if s.kind.is_block()));
                if let Some(block) = block {
                    context.node_mut(block).scope_mut().insert(name, decl);
                }
            }
        }

        // Parameters become visible in the node owning the parameter list:
        // the function node for function types, the type node for structs
        // and units.
        DeclarationClass::Parameter => {
            let parent_is_type = matches!(context.node(parent).kind, NodeKind::Type(_));
            if !parent_is_type {
                return;
            }
            let is_function_type = matches!(context.utype(parent).kind, TypeKind::Function { .. });
            let target = match is_function_type {
                true => match context.parent(parent).map(|qt| context.parent(qt)) {
                    // function type -> qualified type -> function node
                    Some(Some(function)) if matches!(context.node(function).kind, NodeKind::Function(_)) => function,
                    _ => parent,
                },
                false => parent,
            };
            context.node_mut(target).scope_mut().insert(name, decl);
        }

        // `self` and other expression declarations bind in their parent.
        DeclarationClass::Expression => {
            context.node_mut(parent).scope_mut().insert(name, decl);
        }

        DeclarationClass::Field => {
            // Struct/union members live in the type node's scope.
            context.node_mut(parent).scope_mut().insert(name, decl);
        }

        DeclarationClass::Module => {}
    }
}

/// Per-type scope population beyond plain members
fn populate_type_scope(context: &mut AstContext, _module: NodeId, ty: NodeId) {
    let TypeKind::Unit(_) = &context.utype(ty).kind else { return };

    // Unit fields and variables are addressable as members. The items are
    // not declarations; the item node itself stands in until lowering
    // replaces the unit with its struct, and member resolution on units
    // understands that.
    for item in context.unit_items(ty) {
        match context.unit_item(item).clone() {
            UnitItem::Field { id: Some(id), .. } => {
                let name = id.local().to_string();
                context.node_mut(ty).scope_mut().insert(name, item);
            }
            UnitItem::Variable { id } => {
                let name = id.local().to_string();
                context.node_mut(ty).scope_mut().insert(name, item);
            }
            UnitItem::Hook { .. } => {
                bind_dollar_dollar(context, item);
            }
            _ => {}
        }
    }
}

/// Binds `$$` inside a hook body, or blocks it explicitly
fn bind_dollar_dollar(context: &mut AstContext, hook: NodeId) {
    let Some(function) = context.child(hook, 0) else { return };

    let dd_param = context
        .child(function, 0)
        .map(|ftype_qt| {
            let ftype = context.inner_type_raw(ftype_qt);
            context
                .type_parameters(ftype)
                .into_iter()
                .find(|param| context.declaration(*param).id.local() == "__dd")
        })
        .unwrap_or(None);

    match dd_param {
        Some(param) => context.node_mut(function).scope_mut().insert("$$", param),
        None => context.node_mut(function).scope_mut().insert_not_found("$$"),
    }
}

fn populate_statement_scope(context: &mut AstContext, stmt: NodeId) {
    match context.statement(stmt).kind.clone() {
        StatementKind::If | StatementKind::While => {
            if let Some(init) = context.child(stmt, 0) {
                let name = context.declaration(init).id.local().to_string();
                context.node_mut(stmt).scope_mut().insert(name, init);
            }
        }
        StatementKind::For => {
            if let Some(local) = context.child(stmt, 0) {
                let name = context.declaration(local).id.local().to_string();
                context.node_mut(stmt).scope_mut().insert(name, local);
            }
        }
        StatementKind::Switch => {
            if let Some(condition) = context.child(stmt, 0) {
                if context.is_declaration(condition) {
                    let name = context.declaration(condition).id.local().to_string();
                    context.node_mut(stmt).scope_mut().insert(name, condition);
                }
            }
        }
        StatementKind::TryCatch => {
            if let Some(parameter) = context.child(stmt, 0) {
                let name = context.declaration(parameter).id.local().to_string();
                context.node_mut(stmt).scope_mut().insert(name, parameter);
            }
        }
        _ => {}
    }
}

fn populate_expression_scope(context: &mut AstContext, expr: NodeId) {
    if !matches!(context.expression(expr).kind, ExpressionKind::ListComprehension { .. }) {
        return;
    }
    if let Some(local) = context.child(expr, 2) {
        let name = context.declaration(local).id.local().to_string();
        context.node_mut(expr).scope_mut().insert(name, local);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::id::{ModuleUid, ID};
    use crate::ast::scope::ScopeEntry;
    use crate::ast::types::Constness;

    #[test]
    fn module_scope_holds_globals_and_types() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);

        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let int64 = builder.int_type(64);
        let qt = builder.qtype_nonconst(int64);
        let global = builder.global_decl(ID::new("x"), qt, None, Default::default());
        builder.add_declaration(module, global);

        let bool_ty = builder.bool_type();
        let type_decl = builder.type_decl(ID::new("B"), bool_ty, Default::default());
        builder.add_declaration(module, type_decl);

        build_scopes(&mut context);

        let scope = context.node(module).scope.as_ref().unwrap();
        assert!(matches!(scope.lookup("x").unwrap()[0], ScopeEntry::Declaration(d) if d == global));
        assert!(matches!(scope.lookup("B").unwrap()[0], ScopeEntry::Declaration(d) if d == type_decl));
    }

    #[test]
    fn enum_labels_land_in_module_scope() {
        use crate::ast::types::EnumLabel;

        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);

        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let enum_ty = builder.enum_type(vec![
            EnumLabel { id: ID::new("A"), value: 1 },
            EnumLabel { id: ID::new("B"), value: 2 },
        ]);
        let decl = builder.type_decl(ID::new("Color"), enum_ty, Default::default());
        builder.add_declaration(module, decl);

        build_scopes(&mut context);

        let scope = context.node(module).scope.as_ref().unwrap();
        assert!(scope.lookup("A").is_some());
        assert!(scope.lookup("B").is_some());
        assert!(scope.lookup("Color").is_some());
    }

    #[test]
    fn struct_scope_holds_self_and_fields() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);

        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let field_ty = builder.int_type(32);
        let field_qt = builder.qtype(field_ty, Constness::NonConst, crate::ast::types::Side::Rhs);
        let field = builder.field_decl(ID::new("a"), field_qt, None, None);
        let struct_ty = builder.struct_type(vec![], vec![field]);
        let decl = builder.type_decl(ID::new("S"), struct_ty, Default::default());
        builder.add_declaration(module, decl);

        build_scopes(&mut context);

        let scope = context.node(struct_ty).scope.as_ref().unwrap();
        assert!(scope.lookup("self").is_some());
        assert!(scope.lookup("a").is_some());
    }
}
