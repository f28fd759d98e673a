//! Core types and traits for the Spicy toolchain's diagnostic macros.
//!
//! This crate provides the fundamental types and traits shared between the
//! `SpicyError` derive macro and the diagnostic report generator in the
//! compiler library. It carries no dependencies of its own.

use std::fmt::{Display, Formatter};

pub mod traits;

/// Source code together with the name it should be reported under
///
/// Error types carry this struct so that diagnostics can show the offending
/// source snippet with its file name, without holding a borrow into the
/// compiler's own storage.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceCode {
    /// The source code content
    pub source: String,
    /// The name or path of the source file
    pub name: String,
}

impl Display for SourceCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}
