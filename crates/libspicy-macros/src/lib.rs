//! Procedural macros for the Spicy toolchain.
//!
//! The only macro exported here is `#[derive(SpicyError)]`, which generates a
//! `SpicyErrorTrait` implementation from the diagnostic attributes placed on
//! an error struct or enum. See the `error` module for the attribute set.

use proc_macro::TokenStream;

mod error;

/// Derives the `SpicyErrorTrait` implementation for an error type
///
/// Recognized attributes: `#[source_code]`, `#[label("…")]`, `#[help]`,
/// `#[errors]`, `#[reference]` on fields, and `#[diagnostic(code = "…",
/// help = "…", transparent)]` on the type or on enum variants.
#[proc_macro_derive(SpicyError, attributes(source_code, label, help, errors, reference, diagnostic))]
pub fn spicy_error(input: TokenStream) -> TokenStream {
    error::spicy_error(input)
}
