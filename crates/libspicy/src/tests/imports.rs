//! Import resolution against preloaded sources and a synthetic front end.

use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::id::{ModuleUid, ID};
use crate::compiler::plugin::{Plugin, PluginRegistry};
use crate::error::CompileError;
use crate::file::SourceFile;

/// A minimal front end: the source text is the declared module id
fn test_plugin() -> Plugin {
    let mut plugin = Plugin::new("hlt", 0);
    plugin.parse = Box::new(|context, file, path| {
        let declared = ID::new(file.code().trim().to_string());
        let uid = ModuleUid::new(declared, path);
        let mut builder = Builder::new(context);
        Ok(builder.module_unregistered(uid))
    });
    plugin
}

fn registry_with_test_plugin() -> PluginRegistry {
    let mut plugins = PluginRegistry::new();
    plugins.register(test_plugin());
    plugins
}

#[test]
fn import_finds_preloaded_module() {
    let mut context = AstContext::default();
    let plugins = registry_with_test_plugin();

    context.preload_source("lib/filter.hlt", SourceFile::new(vec!["lib".into(), "filter.hlt".into()], "Filter".to_string()));

    let uid = context
        .import_module(&plugins, &ID::new("Filter"), None, "hlt", None, &[String::from("lib")])
        .unwrap();
    assert_eq!(uid.id, ID::new("Filter"));
    assert!(context.module_by_uid(&uid).is_some());
}

#[test]
fn import_is_idempotent_on_the_same_module() {
    let mut context = AstContext::default();
    let plugins = registry_with_test_plugin();

    context.preload_source("lib/filter.hlt", SourceFile::new(vec!["lib".into(), "filter.hlt".into()], "Filter".to_string()));

    let first = context
        .import_module(&plugins, &ID::new("Filter"), None, "hlt", None, &[String::from("lib")])
        .unwrap();
    let nodes_after_first = context.num_nodes();
    let second = context
        .import_module(&plugins, &ID::new("Filter"), None, "hlt", None, &[String::from("lib")])
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(context.num_nodes(), nodes_after_first, "re-import must not grow the AST");
}

#[test]
fn import_with_scope_searches_subdirectory() {
    let mut context = AstContext::default();
    let plugins = registry_with_test_plugin();

    context.preload_source(
        "lib/proto/tcp/http.hlt",
        SourceFile::new(vec!["http.hlt".into()], "Http".to_string()),
    );

    let uid = context
        .import_module(&plugins, &ID::new("Http"), Some(&ID::new("proto::tcp")), "hlt", None, &[String::from("lib")])
        .unwrap();
    assert_eq!(uid.id, ID::new("Http"));
}

#[test]
fn missing_module_is_an_import_error() {
    let mut context = AstContext::default();
    let plugins = registry_with_test_plugin();

    let error = context
        .import_module(&plugins, &ID::new("Nowhere"), None, "hlt", None, &[String::from("lib")])
        .unwrap_err();
    assert!(matches!(error, CompileError::ImportNotFound(_)), "got {error}");
}

#[test]
fn mismatched_module_id_is_rejected() {
    let mut context = AstContext::default();
    let plugins = registry_with_test_plugin();

    // The file exists under the requested name but declares another id.
    context.preload_source("lib/wrong.hlt", SourceFile::new(vec!["wrong.hlt".into()], "Other".to_string()));

    let error = context
        .import_module(&plugins, &ID::new("Wrong"), None, "hlt", None, &[String::from("lib")])
        .unwrap_err();
    assert!(matches!(error, CompileError::ModuleIdMismatch(_)), "got {error}");
}

#[test]
fn parse_source_routes_by_extension() {
    let mut context = AstContext::default();
    let plugins = registry_with_test_plugin();

    context.preload_source("m.unknown", SourceFile::new(vec!["m.unknown".into()], "M".to_string()));
    let error = context.parse_source(&plugins, "m.unknown", None).unwrap_err();
    assert!(matches!(error, CompileError::UnknownExtension(_)), "got {error}");

    context.preload_source("m.hlt", SourceFile::new(vec!["m.hlt".into()], "M".to_string()));
    let uid = context.parse_source(&plugins, "m.hlt", None).unwrap();
    assert_eq!(uid.id, ID::new("M"));
}
