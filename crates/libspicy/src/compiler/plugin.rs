//! Plugins: the per-language callback bundles driving the pipeline.
//!
//! A plugin contributes one language to the toolchain. The HILTI plugin is
//! always present and sorts first; the Spicy plugin adds its own resolver
//! obligations and the lowering transform. The driver runs the §4.13 pass
//! sequence once per plugin in `order`.
//!
//! The front-end parser is an external collaborator: the standard plugins
//! ship with a `parse` callback that rejects, and embedders (and the tests)
//! install their own callback that builds modules through
//! [`Builder`](crate::ast::Builder).

use crate::ast::context::AstContext;
use crate::ast::node::NodeId;
use crate::error::{CompileError, Result};
use crate::file::SourceFile;
use crate::operators::Registry;

/// Parses a source file into a (detached) module declaration
pub type ParseCallback = Box<dyn Fn(&mut AstContext, &SourceFile, &str) -> Result<NodeId>>;

/// Extra library search paths contributed by the plugin
pub type LibraryPathsCallback = Box<dyn Fn(&AstContext) -> Vec<String>>;

/// Plugin-specific ctor coercion; returns the coerced ctor node on success
pub type CoerceCtorCallback = Box<dyn Fn(&mut AstContext, NodeId, NodeId) -> Option<NodeId>>;

/// Plugin-specific type coercion; returns the coerced qualified type
pub type CoerceTypeCallback = Box<dyn Fn(&mut AstContext, NodeId, NodeId) -> Option<NodeId>>;

/// One additional scope-building visit; returns the modified flag
pub type BuildScopesCallback = Box<dyn Fn(&mut AstContext) -> bool>;

/// One additional resolver round visit; returns the modified flag
pub type ResolveCallback = Box<dyn Fn(&mut AstContext, &mut Registry) -> Result<bool>>;

/// A read-only validation walk recording errors on nodes
pub type ValidateCallback = Box<dyn Fn(&mut AstContext)>;

/// An AST-to-AST transform; returns the modified flag
pub type TransformCallback = Box<dyn Fn(&mut AstContext, &mut Registry) -> Result<bool>>;

/// A language plugin
pub struct Plugin {
    /// File extension routing imports and parsing (without the dot)
    pub extension: String,
    /// Pass ordering; the HILTI plugin has the lowest order
    pub order: usize,
    /// Opaque includes forwarded to the downstream emitter
    pub cxx_includes: Vec<String>,
    pub library_paths: LibraryPathsCallback,
    pub parse: ParseCallback,
    pub coerce_ctor: Option<CoerceCtorCallback>,
    pub coerce_type: Option<CoerceTypeCallback>,
    pub ast_build_scopes: Option<BuildScopesCallback>,
    pub ast_resolve: Option<ResolveCallback>,
    pub ast_validate_pre: Option<ValidateCallback>,
    pub ast_validate_post: Option<ValidateCallback>,
    pub ast_transform: Option<TransformCallback>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("extension", &self.extension)
            .field("order", &self.order)
            .finish()
    }
}

impl Plugin {
    /// A plugin skeleton with no callbacks beyond a rejecting parser
    pub fn new(extension: impl Into<String>, order: usize) -> Self {
        Self {
            extension: extension.into(),
            order,
            cxx_includes: Vec::new(),
            library_paths: Box::new(|_| Vec::new()),
            parse: Box::new(|_, file, path| {
                Err(CompileError::parse_failed(
                    format!("no front end linked for '{path}'"),
                    0..0,
                    file.clone(),
                ))
            }),
            coerce_ctor: None,
            coerce_type: None,
            ast_build_scopes: None,
            ast_resolve: None,
            ast_validate_pre: None,
            ast_validate_post: None,
            ast_transform: None,
        }
    }
}

/// The ordered plugin collection
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard two-language setup: HILTI first, then Spicy
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(crate::compiler::hilti_plugin());
        registry.register(crate::spicy::spicy_plugin());
        registry
    }

    /// Registers a plugin, keeping the collection sorted by `order`
    pub fn register(&mut self, plugin: Plugin) {
        self.plugins.push(plugin);
        self.plugins.sort_by_key(|plugin| plugin.order);
    }

    pub fn by_extension(&self, extension: &str) -> Option<&Plugin> {
        let extension = extension.trim_start_matches('.');
        self.plugins.iter().find(|plugin| plugin.extension == extension)
    }

    /// Plugins in pass order
    pub fn in_order(&self) -> &[Plugin] {
        &self.plugins
    }

    /// The lowest-order plugin; always HILTI in the standard setup
    pub fn first(&self) -> Option<&Plugin> {
        self.plugins.first()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_sorts_by_order() {
        let mut registry = PluginRegistry::new();
        registry.register(Plugin::new("spicy", 10));
        registry.register(Plugin::new("hlt", 0));

        let extensions: Vec<&str> = registry.in_order().iter().map(|plugin| plugin.extension.as_str()).collect();
        assert_eq!(extensions, vec!["hlt", "spicy"]);
        assert_eq!(registry.first().unwrap().extension, "hlt");
    }

    #[test]
    fn extension_lookup_ignores_leading_dot() {
        let mut registry = PluginRegistry::new();
        registry.register(Plugin::new("hlt", 0));
        assert!(registry.by_extension(".hlt").is_some());
        assert!(registry.by_extension("hlt").is_some());
        assert!(registry.by_extension("spicy").is_none());
    }
}
