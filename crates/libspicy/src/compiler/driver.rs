//! The driver loop: orchestrates the per-plugin pass sequence.
//!
//! ```text
//! process_ast(driver):
//!   import the built-in 'hilti' module
//!   for each plugin in order:
//!     validate_pre, unify, resolve (to fixed point), validate_post,
//!     hook_compilation_finished, transform
//!   optionally optimize and re-validate
//! ```
//!
//! `process_ast` is idempotent after success. Any pass that leaves errors on
//! nodes aborts the pipeline with the collected diagnostics.

use simplelog::debug;

use crate::ast::builder::Builder;
use crate::ast::context::{AstContext, CompilerOptions};
use crate::ast::declaration::{Linkage, ParameterKind};
use crate::ast::id::{ModuleUid, ID};
use crate::ast::node::NodeId;
use crate::ast::types::FunctionFlavor;
use crate::compiler::plugin::{Plugin, PluginRegistry};
use crate::compiler::{id_assigner, optimizer, resolver, type_unifier, validator};
use crate::error::Result;
use crate::operators::Registry;

/// The embedder-provided driver surface
pub trait Driver {
    fn options(&self) -> &CompilerOptions;

    /// Called once per plugin after its resolve and validation passes
    fn hook_compilation_finished(&mut self, _plugin: &Plugin) {}

    /// Records a compiled parser unit for later lookup
    fn register_unit(&mut self, _uid: &ModuleUid, _unit: NodeId) {}

    fn lookup_unit(&self, _uid: &ModuleUid) -> Option<NodeId> {
        None
    }
}

/// A driver with default hooks and explicit options
#[derive(Debug, Default)]
pub struct StandardDriver {
    pub options: CompilerOptions,
    /// Units registered by the parser builder, by unit type ID
    pub units: Vec<(ModuleUid, NodeId)>,
}

impl StandardDriver {
    pub fn new(options: CompilerOptions) -> Self {
        Self {
            options,
            units: Vec::new(),
        }
    }
}

impl Driver for StandardDriver {
    fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn register_unit(&mut self, uid: &ModuleUid, unit: NodeId) {
        self.units.push((uid.clone(), unit));
    }

    fn lookup_unit(&self, uid: &ModuleUid) -> Option<NodeId> {
        self.units.iter().find(|(known, _)| known == uid).map(|(_, unit)| *unit)
    }
}

/// Runs the full pipeline over the context
pub fn process_ast(context: &mut AstContext, registry: &mut Registry, plugins: &PluginRegistry, driver: &mut dyn Driver) -> Result<()> {
    if context.resolved {
        return Ok(());
    }

    context.options = driver.options().clone();
    ensure_hilti_module(context);

    let skip_validation = context.options.skip_validation;

    for plugin in plugins.in_order() {
        debug!("[compiler] running plugin '{}'", plugin.extension);

        if !skip_validation {
            validator::validate_pre(context, plugin);
            validator::collect_errors(context)?;
        }

        type_unifier::unify(context);
        resolver::resolve(context, registry, plugins, plugin)?;
        id_assigner::enforce(context);
        registry.assert_no_pending();

        if !skip_validation {
            validator::validate_post(context, plugin);
            validator::collect_errors(context)?;
        }

        driver.hook_compilation_finished(plugin);

        if let Some(transform) = &plugin.ast_transform {
            let modified = transform(context, registry)?;
            if modified {
                // New nodes from the transform resolve under the first
                // plugin's rules (the transform's output language).
                if let Some(first) = plugins.first() {
                    resolver::resolve(context, registry, plugins, first)?;
                    id_assigner::enforce(context);
                    if !skip_validation {
                        validator::collect_errors(context)?;
                    }
                }
            }
        }
    }

    if context.options.global_optimizations {
        optimizer::optimize(context);
        if let Some(first) = plugins.first() {
            if !skip_validation {
                validator::validate_post(context, first);
                validator::collect_errors(context)?;
            }
        }
    }

    context.resolved = true;
    debug!("[ast-final] processing complete, {} nodes", context.num_nodes());
    Ok(())
}

/// The built-in `hilti` module is always available: runtime-facing functions
/// that generated code calls into
fn ensure_hilti_module(context: &mut AstContext) {
    let uid = ModuleUid::new(ID::new("hilti"), "<builtin>/hilti.hlt");
    if context.module_by_uid(&uid).is_some() {
        return;
    }

    debug!("[compiler] registering built-in module 'hilti'");
    let mut builder = Builder::new(context);
    let module = builder.module_unregistered(uid.clone());

    for (name, cxx_name) in [("print", "hilti::rt::print"), ("printValues", "hilti::rt::printValues")] {
        let value_ty = builder.auto_type();
        let value_qt = builder.qtype_const(value_ty);
        let parameter = builder.parameter_decl(ID::new("values"), value_qt, ParameterKind::In, None);

        let void = builder.void_type();
        let void_qt = builder.qtype_const(void);
        let ftype = builder.function_type(FunctionFlavor::Function, void_qt, vec![parameter]);
        let ftype_qt = builder.qtype_const(ftype);
        let function = builder.function(ID::new(name), ftype_qt, None);
        let declaration = builder.function_decl(ID::new(name), function, Linkage::Public);
        builder.context.declaration_mut(declaration).doc = Some(format!("Runtime binding for {cxx_name}."));
        builder.add_declaration(module, declaration);
    }

    context.register_module(module, None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_module_is_registered_once() {
        let mut context = AstContext::default();
        ensure_hilti_module(&mut context);
        let count = context.modules().len();
        ensure_hilti_module(&mut context);
        assert_eq!(context.modules().len(), count);
    }

    #[test]
    fn process_ast_is_idempotent_after_success() {
        let mut context = AstContext::default();
        let mut registry = Registry::standard();
        let plugins = PluginRegistry::standard();
        let mut driver = StandardDriver::default();

        process_ast(&mut context, &mut registry, &plugins, &mut driver).unwrap();
        assert!(context.resolved);
        process_ast(&mut context, &mut registry, &plugins, &mut driver).unwrap();
    }
}
