//! Source file representation for the compiler core.
//!
//! A `SourceFile` pairs a path with the file's content. Both are Arc-backed so
//! that nodes, spans, and errors can all hold the file cheaply without
//! lifetime plumbing through the AST.

use std::{error::Error, path::PathBuf, sync::Arc};

use libspicy_macros_core::SourceCode;

/// A source file with its path and content
///
/// Used throughout the compiler to track where AST nodes came from and to
/// provide error reporting with file context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// The file path as a vector of path components
    pub path: Arc<Vec<String>>,
    /// The source code content of the file
    pub code: Arc<String>,
}

impl From<SourceFile> for SourceCode {
    fn from(file: SourceFile) -> Self {
        SourceCode::from(&file)
    }
}

impl From<&SourceFile> for SourceCode {
    fn from(file: &SourceFile) -> Self {
        let pathbuffer = PathBuf::from_iter(file.path.iter());
        let path = pathbuffer.to_string_lossy();

        SourceCode {
            source: file.code.to_string(),
            name: path.to_string(),
        }
    }
}

impl Error for SourceFile {}

impl std::fmt::Display for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceFile: {:?}", self.path)
    }
}

impl SourceFile {
    /// Creates a new source file with the given path components and content
    pub fn new(path: Vec<String>, code: String) -> Self {
        Self {
            path: path.into(),
            code: code.into(),
        }
    }

    /// A synthetic file for nodes the compiler creates itself
    pub fn synthetic() -> Self {
        Self::new(vec!["<generated>".into()], String::new())
    }

    /// Returns a reference to the file path components
    pub fn path(&self) -> &Vec<String> {
        &self.path
    }

    /// Returns a reference to the source code content
    pub fn code(&self) -> &String {
        self.code.as_ref()
    }

    /// The path joined with `/`, used for module lookup and display
    pub fn joined_path(&self) -> String {
        self.path.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_file_roundtrip() {
        let file = SourceFile::new(vec!["proto".into(), "http".into()], "module HTTP;".to_string());
        assert_eq!(file.joined_path(), "proto/http");
        assert_eq!(file.code(), "module HTTP;");

        let code: SourceCode = (&file).into();
        assert_eq!(code.source, "module HTTP;");
        assert!(code.name.contains("http"));
    }
}
