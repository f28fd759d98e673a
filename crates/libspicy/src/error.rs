//! Error handling and reporting for the compiler core.
//!
//! Semantic errors discovered while processing an AST are *attached to nodes*
//! with a priority and only later collected into a [`CompileError`]; hard
//! failures (imports, parse callbacks, internal limits) are returned as
//! `CompileError` directly. Rendering goes through `codespan-reporting`.
//!
//! # Error Categories
//!
//! - [`ImportNotFound`], [`ModuleIdMismatch`], [`UnknownExtension`]: module
//!   import and routing failures
//! - [`AlreadyDefined`]: duplicate symbol definitions
//! - [`ParseFailed`]: a plugin's parse callback rejected its input
//! - [`Diagnostics`]: node-attached errors collected after validation
//! - [`InternalError`]: invariant violations surfaced as typed errors where a
//!   panic would hide them from the driver (resolver round cap)

use std::ops::Range;

use codespan_reporting::{
    diagnostic::{Diagnostic, Label},
    files::SimpleFiles,
    term::{self, termcolor::StandardStream},
};
use libspicy_macros::SpicyError;
use libspicy_macros_core::{traits::SpicyErrorTrait, SourceCode};
use simplelog::ColorChoice;
use strum_macros::EnumDiscriminants;

use crate::file::SourceFile;

/// Severity bucket for node-attached errors
///
/// The collector reports only the highest non-empty bucket, which suppresses
/// cascade errors at lower priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ErrorPriority {
    /// No error; placeholder ranking below every real priority
    #[default]
    NoError,
    /// Follow-on errors that are usually a consequence of another error
    Low,
    /// Regular semantic errors
    Normal,
    /// Errors that must be reported even when others are present
    High,
}

/// Error for when an imported module cannot be located
///
/// Raised when an import statement names a module that cannot be found in any
/// of the configured search directories.
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("cannot find module '{module}'")]
#[diagnostic(code("spicy::error::import_not_found"), help("check the module name and the import search paths"))]
pub struct ImportNotFound {
    /// The module id that could not be found
    pub module: String,

    /// Source location of the import
    #[label("no file for this module in any search directory")]
    pub position: Range<usize>,

    /// Source code context for the error
    #[source_code]
    pub code: SourceCode,
}

/// Error for when a module file declares a different id than requested
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("file declares module '{declared}', expected '{requested}'")]
#[diagnostic(code("spicy::error::module_id_mismatch"), help("rename the module or import it under its declared id"))]
pub struct ModuleIdMismatch {
    /// The id the import asked for
    pub requested: String,
    /// The id the file actually declares
    pub declared: String,

    #[label("declared here as '{declared}'")]
    pub position: Range<usize>,

    #[source_code]
    pub code: SourceCode,
}

/// Error for a source file whose extension no plugin claims
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("no plugin registered for extension '{extension}'")]
#[diagnostic(code("spicy::error::unknown_extension"))]
pub struct UnknownExtension {
    /// The unrecognized file extension
    pub extension: String,
    /// The path that was being parsed
    pub path: String,
}

/// Error for a symbol defined more than once in the same scope
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("already defined")]
#[diagnostic(code("spicy::error::already_defined"), help("change one of the names or remove the definition"))]
pub struct AlreadyDefined {
    /// Location of the original definition
    #[label("already defined here")]
    pub old_position: Range<usize>,

    /// Location of the duplicate definition
    #[label("but it is defined again here")]
    pub new_position: Range<usize>,

    #[source_code]
    pub code: SourceCode,
}

/// Error for a plugin parse callback rejecting its input
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("parse error: {message}")]
#[diagnostic(code("spicy::error::parse_failed"))]
pub struct ParseFailed {
    /// The plugin's error message
    pub message: String,

    #[label("{message}")]
    pub position: Range<usize>,

    #[source_code]
    pub code: SourceCode,
}

/// One collected node-attached error
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("{message}")]
#[diagnostic(code("spicy::error::semantic"))]
pub struct DiagnosticItem {
    /// The error text recorded on the node
    pub message: String,

    /// Priority bucket the error was recorded with
    pub priority: ErrorPriority,

    #[label("{message}")]
    pub position: Range<usize>,

    #[source_code]
    pub code: SourceCode,
}

/// The set of node-attached errors reported after a failed pipeline pass
///
/// Only the highest-priority bucket survives collection; see
/// `validator::collect_errors`.
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("{} error(s) detected", .errors.len())]
pub struct Diagnostics {
    #[errors]
    pub errors: Vec<DiagnosticItem>,
}

/// An invariant violation surfaced as a typed error
///
/// Most internal invariants abort via panic; the ones the driver needs to
/// observe (resolver nontermination) come through here.
#[derive(Clone, Debug, thiserror::Error, SpicyError)]
#[error("internal error: {message}")]
#[diagnostic(code("spicy::error::internal"))]
pub struct InternalError {
    /// Description of the violated invariant
    pub message: String,
}

/// Top-level error type of the compiler core
#[derive(Clone, Debug, thiserror::Error, SpicyError, EnumDiscriminants)]
pub enum CompileError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    ImportNotFound(Box<ImportNotFound>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ModuleIdMismatch(Box<ModuleIdMismatch>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    UnknownExtension(Box<UnknownExtension>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    AlreadyDefined(Box<AlreadyDefined>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ParseFailed(Box<ParseFailed>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Diagnostics(Box<Diagnostics>),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Internal(Box<InternalError>),
}

impl CompileError {
    pub fn import_not_found(module: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ImportNotFound(
            ImportNotFound {
                module: module.into(),
                position,
                code: source.into(),
            }
            .into(),
        )
    }

    pub fn module_id_mismatch(requested: impl Into<String>, declared: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ModuleIdMismatch(
            ModuleIdMismatch {
                requested: requested.into(),
                declared: declared.into(),
                position,
                code: source.into(),
            }
            .into(),
        )
    }

    pub fn unknown_extension(extension: impl Into<String>, path: impl Into<String>) -> Self {
        CompileError::UnknownExtension(
            UnknownExtension {
                extension: extension.into(),
                path: path.into(),
            }
            .into(),
        )
    }

    pub fn already_defined(new_position: Range<usize>, old_position: Range<usize>, source: SourceFile) -> Self {
        CompileError::AlreadyDefined(
            AlreadyDefined {
                new_position,
                old_position,
                code: source.into(),
            }
            .into(),
        )
    }

    pub fn parse_failed(message: impl Into<String>, position: Range<usize>, source: SourceFile) -> Self {
        CompileError::ParseFailed(
            ParseFailed {
                message: message.into(),
                position,
                code: source.into(),
            }
            .into(),
        )
    }

    pub fn diagnostics(errors: Vec<DiagnosticItem>) -> Self {
        CompileError::Diagnostics(Diagnostics { errors }.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal(InternalError { message: message.into() }.into())
    }
}

/// Result alias used across the compiler core
pub type Result<T> = std::result::Result<T, CompileError>;

/// Trait for generating error reports from compile errors
pub trait ReportGenerator {
    /// Generate a formatted error report for the given error
    fn generate(error: CompileError);
}

/// Report generator rendering through `codespan-reporting`
pub struct CodespanReportGenerator;

impl CodespanReportGenerator {
    fn inner_generate(files: &mut SimpleFiles<String, String>, diagnostics: &mut Vec<Diagnostic<usize>>, error: &dyn SpicyErrorTrait) {
        let mut diagnostic: Diagnostic<usize> = Diagnostic::error().with_message(error.to_string());

        if let Some(source_code) = error.source_code() {
            let file_id = files.add(source_code.name, source_code.source);

            if let Some(labels) = error.labels() {
                let labels = labels
                    .into_iter()
                    .map(|label| Label::primary(file_id, label.position).with_message(label.label))
                    .collect::<Vec<_>>();
                diagnostic = diagnostic.with_labels(labels);
            }
        }

        if let Some(help) = error.help() {
            diagnostic = diagnostic.with_notes(vec![help.to_string()]);
        }

        diagnostics.push(diagnostic);

        if let Some(references) = error.references() {
            for reference in references.into_iter() {
                Self::inner_generate(files, diagnostics, *reference);
            }
        }

        if let Some(errors) = error.errors() {
            for inner_error in errors {
                Self::inner_generate(files, diagnostics, inner_error);
            }
        }
    }
}

impl ReportGenerator for CodespanReportGenerator {
    fn generate(error: CompileError) {
        let mut diagnostics = Vec::new();
        let mut files = SimpleFiles::new();

        Self::inner_generate(&mut files, &mut diagnostics, &error);

        let writer = StandardStream::stderr(ColorChoice::Always);
        let config = codespan_reporting::term::Config::default();

        for diagnostic in diagnostics.into_iter() {
            term::emit(&mut writer.lock(), &config, &files, &diagnostic).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(ErrorPriority::High > ErrorPriority::Normal);
        assert!(ErrorPriority::Normal > ErrorPriority::Low);
        assert!(ErrorPriority::Low > ErrorPriority::NoError);
    }

    #[test]
    fn constructor_helpers() {
        let file = SourceFile::new(vec!["m".into()], "module m;".to_string());
        let error = CompileError::import_not_found("filter", 0..6, file.clone());
        if let CompileError::ImportNotFound(inner) = &error {
            assert_eq!(inner.module, "filter");
        } else {
            panic!("expected ImportNotFound, got {error}");
        }

        let error = CompileError::already_defined(10..12, 2..4, file);
        assert!(matches!(error, CompileError::AlreadyDefined(_)));
    }

    #[test]
    fn diagnostics_collects_items() {
        let file = SourceFile::new(vec!["m".into()], "module m;".to_string());
        let error = CompileError::diagnostics(vec![DiagnosticItem {
            message: "unknown id 'x'".into(),
            priority: ErrorPriority::Normal,
            position: 0..1,
            code: file.into(),
        }]);
        assert_eq!(error.to_string(), "1 error(s) detected");
    }
}
