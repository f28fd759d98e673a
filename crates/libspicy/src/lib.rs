//! Semantic-analysis core for the HILTI/Spicy compiler toolchain.
//!
//! This library implements the AST processing pipeline shared by the two
//! languages: the multi-pass, fixed-point loop that takes an unresolved
//! abstract syntax tree and drives it to a fully typed, resolved, validated,
//! and optionally optimized state ready for code generation.
//!
//! # Architecture
//!
//! - [`ast`]: the node arena, the [`ast::AstContext`] owning it, the type
//!   system, scopes, and the [`ast::Builder`] factories
//! - [`operators`]: the operator registry and the standard operator tables
//! - [`compiler`]: the passes (scope builder, type unifier, coercer,
//!   resolver, ID assigner, validator, optimizer) and the driver loop
//! - [`spicy`]: unit types, grammars, the parser builder, and the lowering
//!   transform into HILTI
//! - [`error`]: the `CompileError` family and diagnostic rendering
//!
//! # Pipeline
//!
//! The driver runs once per registered plugin (HILTI first, then Spicy):
//! pre-validate, unify, resolve to a fixed point, post-validate, transform.
//! After all plugins, the optimizer runs when requested, followed by a final
//! validation.
//!
//! # Usage
//!
//! ```ignore
//! use libspicy::{process_ast, ast::{AstContext, CompilerOptions}, compiler::StandardDriver};
//!
//! let mut context = AstContext::default();
//! // ... register modules through a plugin's parse callback or a Builder ...
//! let mut driver = StandardDriver::new(CompilerOptions::default());
//! process_ast(&mut context, &mut driver)?;
//! ```
//!
//! Front-end parsers are external: plugins receive a `parse` callback that
//! builds modules through [`ast::Builder`]. The tests in this crate install
//! synthetic plugins doing exactly that.

pub mod ast;
pub mod compiler;
pub mod error;
pub mod file;
pub mod operators;
pub mod span;
pub mod spicy;

#[cfg(test)]
mod tests;

use compiler::plugin::PluginRegistry;
use compiler::Driver;
use error::Result;
use operators::Registry;

/// Runs the full pipeline over a context with the standard plugin setup
/// (HILTI, then Spicy) and the standard operator tables.
///
/// Idempotent after success: re-processing a resolved context returns
/// immediately.
pub fn process_ast(context: &mut ast::AstContext, driver: &mut dyn Driver) -> Result<()> {
    let mut registry = Registry::standard();
    let plugins = PluginRegistry::standard();
    compiler::driver::process_ast(context, &mut registry, &plugins, driver)
}
