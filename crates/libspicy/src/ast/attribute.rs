//! Attributes (`&size=4`, `&requires=...`) and attribute sets.
//!
//! Attributes drive much of the parser generator's per-field behavior and a
//! couple of optimizer decisions. An attribute node optionally owns a value
//! expression in child slot 0; an attribute set owns its attributes as
//! children.

use strum_macros::{Display, EnumIter, EnumString};

use crate::ast::context::AstContext;
use crate::ast::node::{NodeId, NodeKind};

/// All attribute names the core understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum AttributeKind {
    #[strum(serialize = "&size")]
    Size,
    #[strum(serialize = "&max-size")]
    MaxSize,
    #[strum(serialize = "&parse-from")]
    ParseFrom,
    #[strum(serialize = "&parse-at")]
    ParseAt,
    #[strum(serialize = "&convert")]
    Convert,
    #[strum(serialize = "&until")]
    Until,
    #[strum(serialize = "&until-including")]
    UntilIncluding,
    #[strum(serialize = "&while")]
    While,
    #[strum(serialize = "&try")]
    Try,
    #[strum(serialize = "&synchronize")]
    Synchronize,
    #[strum(serialize = "&requires")]
    Requires,
    #[strum(serialize = "&default")]
    Default,
    #[strum(serialize = "&optional")]
    Optional,
    #[strum(serialize = "&internal")]
    Internal,
    #[strum(serialize = "&anonymous")]
    Anonymous,
    #[strum(serialize = "&transient")]
    Transient,
    #[strum(serialize = "&cxxname")]
    CxxName,
    #[strum(serialize = "&on-heap")]
    OnHeap,
    #[strum(serialize = "&needed-by-feature")]
    NeededByFeature,
    #[strum(serialize = "&requires-type-feature")]
    RequiresTypeFeature,
    #[strum(serialize = "&always-emit")]
    AlwaysEmit,
    #[strum(serialize = "&chunked")]
    Chunked,
    #[strum(serialize = "&eod")]
    Eod,
    #[strum(serialize = "&count")]
    Count,
    #[strum(serialize = "&nosub")]
    NoSub,
    #[strum(serialize = "&originator")]
    Originator,
    #[strum(serialize = "&responder")]
    Responder,
}

/// A single attribute; child slot 0 optionally holds its value expression
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub kind: AttributeKind,
}

/// A set of attributes; attributes are owned children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeSet;

impl AstContext {
    pub fn attribute(&self, id: NodeId) -> &Attribute {
        match &self.node(id).kind {
            NodeKind::Attribute(attribute) => attribute,
            other => panic!("node {id:?} is not an attribute: {other:?}"),
        }
    }

    /// The value expression of an attribute, if it has one
    pub fn attribute_value(&self, id: NodeId) -> Option<NodeId> {
        self.child(id, 0)
    }

    /// Finds an attribute of the given kind inside an attribute set node
    pub fn find_attribute(&self, set: Option<NodeId>, kind: AttributeKind) -> Option<NodeId> {
        let set = set?;
        self.children(set).find(|attr| self.attribute(*attr).kind == kind)
    }

    /// True if the set contains an attribute of the given kind
    pub fn has_attribute(&self, set: Option<NodeId>, kind: AttributeKind) -> bool {
        self.find_attribute(set, kind).is_some()
    }

    /// The value expression of the given attribute kind inside a set
    pub fn attribute_value_of(&self, set: Option<NodeId>, kind: AttributeKind) -> Option<NodeId> {
        self.find_attribute(set, kind).and_then(|attr| self.attribute_value(attr))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn attribute_names_round_trip() {
        assert_eq!(AttributeKind::Size.to_string(), "&size");
        assert_eq!(AttributeKind::from_str("&max-size").unwrap(), AttributeKind::MaxSize);
        assert_eq!(AttributeKind::from_str("&requires-type-feature").unwrap(), AttributeKind::RequiresTypeFeature);
        assert!(AttributeKind::from_str("&bogus").is_err());
    }
}
