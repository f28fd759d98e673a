//! Source location tracking.
//!
//! `SpanInfo` is the owned form of a source location: a byte range plus the
//! file it belongs to. AST metadata and diagnostics both use it; there is no
//! borrowed span type because the AST outlives any individual parse.

use std::ops::Range;

use crate::file::SourceFile;

/// A source location without lifetime dependencies
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpanInfo {
    /// The position range in the source file
    pub position: Range<usize>,
    /// The source file this span belongs to
    pub file: SourceFile,
}

impl SpanInfo {
    /// Creates a span for the given position and file
    pub fn new(position: Range<usize>, file: SourceFile) -> Self {
        Self { position, file }
    }

    /// A location for compiler-generated nodes
    pub fn synthetic() -> Self {
        Self::new(0..0, SourceFile::synthetic())
    }
}

impl std::fmt::Display for SpanInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.file.joined_path(), self.position.start, self.position.end)
    }
}

/// Inclusive containment check on ranges
pub trait Between<T: PartialOrd> {
    /// Returns true if `t` lies within this range (inclusive)
    fn between(&self, t: T) -> bool;
}

impl<T: PartialOrd> Between<T> for Range<T> {
    fn between(&self, t: T) -> bool {
        self.start <= t && t <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_inclusive() {
        assert!((0..10).between(0));
        assert!((0..10).between(10));
        assert!(!(0..10).between(11));
    }
}
