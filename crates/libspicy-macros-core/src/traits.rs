//! Traits backing the compiler's rich error reporting.
//!
//! Error types implement [`SpicyErrorTrait`] (normally via the `SpicyError`
//! derive) to expose labels, source context, help text, and nested errors to
//! the report generator.

use std::{fmt::{Debug, Display}, ops::Range};

/// A label attached to a span of source code
///
/// Associates a human-readable message with a position range; the report
/// generator turns these into primary labels on the rendered diagnostic.
#[derive(Clone, Debug)]
pub struct LabelField {
    /// The source position range where this label applies
    pub position: Range<usize>,
    /// The descriptive label text
    pub label: String,
}

/// A labeled span used where labels are collected dynamically
#[derive(Clone, Debug)]
pub struct LabeledSpan {
    /// The descriptive label text
    pub label: String,
    /// The source position range where this label applies
    pub span: Range<usize>,
}

impl LabeledSpan {
    /// Creates a new labeled span with the given label and source range
    pub fn new(label: String, span: Range<usize>) -> Self {
        Self { label, span }
    }
}

/// Diagnostic surface of an error type
///
/// The report generator only ever talks to errors through this trait. It is
/// designed to be implemented via the `SpicyError` derive macro; manual
/// implementations are possible but rarely needed.
pub trait SpicyErrorTrait: Display {
    /// Returns labeled fields that highlight specific parts of the source code
    fn labels(&self) -> Option<Vec<LabelField>>;

    /// Returns an iterator over nested errors contained within this error
    fn errors<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn SpicyErrorTrait> + 'a>>;

    /// Returns references to other related errors
    fn references(&self) -> Option<Vec<Box<&dyn SpicyErrorTrait>>>;

    /// Returns the source code context for this error
    fn source_code(&self) -> Option<Box<crate::SourceCode>> { None }

    /// Returns an optional error code for this error type
    fn error_code(&self) -> Option<Box<dyn Display>> { None }

    /// Returns optional help text to assist in resolving this error
    fn help(&self) -> Option<Box<dyn Display>> { None }
}
