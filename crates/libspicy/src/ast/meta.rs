//! Per-node metadata.

use crate::span::SpanInfo;

/// Metadata shared by every AST node
///
/// Carries the source location and any documentation comments the front end
/// attached. Inline errors live on the node itself, not here, because they
/// are cleared and re-recorded every resolver round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    /// Where the node came from, if it has a source location at all
    pub location: Option<SpanInfo>,
    /// Documentation comments preceding the node in the source
    pub comments: Vec<String>,
}

impl Meta {
    pub fn new(location: SpanInfo) -> Self {
        Self {
            location: Some(location),
            comments: Vec::new(),
        }
    }

    pub fn with_comments(location: SpanInfo, comments: Vec<String>) -> Self {
        Self {
            location: Some(location),
            comments,
        }
    }
}
