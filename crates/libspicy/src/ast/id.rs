//! Identifiers and module UIDs.
//!
//! An [`ID`] is a `::`-separated path such as `HTTP::Request::uri`. IDs are
//! owned strings; the AST does not borrow from source buffers. A
//! [`ModuleUid`] combines a module's declared id with its normalized path and
//! derives the stable 16-bit hash segment used in canonical IDs.

use std::fmt::{Display, Formatter};

/// A (possibly dotted) identifier path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ID(String);

impl ID {
    pub fn new(id: impl Into<String>) -> Self {
        ID(id.into())
    }

    /// Builds an ID from path segments, skipping empty ones
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|part| part.as_ref().to_string())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("::");
        ID(joined)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final path segment
    pub fn local(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or("")
    }

    /// Everything before the final segment, empty if the ID is unqualified
    pub fn namespace(&self) -> &str {
        match self.0.rfind("::") {
            Some(index) => &self.0[..index],
            None => "",
        }
    }

    /// True if the ID contains more than one segment
    pub fn is_qualified(&self) -> bool {
        self.0.contains("::")
    }

    /// Appends another ID, inserting the separator as needed
    pub fn join(&self, other: &ID) -> ID {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => ID(format!("{}::{}", self.0, other.0)),
        }
    }

    /// Appends a single raw segment
    pub fn join_str(&self, other: &str) -> ID {
        self.join(&ID::new(other))
    }
}

impl Display for ID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ID {
    fn from(value: &str) -> Self {
        ID::new(value)
    }
}

impl From<String> for ID {
    fn from(value: String) -> Self {
        ID::new(value)
    }
}

/// FNV-1a, used for the stable module hash segment
fn fnv1a64(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Unique identifier of a module inside an AST context
///
/// Combines the declared module id with the normalized path of its source.
/// Two modules with the same id but different paths get distinct UIDs; the
/// 16-bit path hash is what distinguishes their canonical-ID segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleUid {
    /// The module id as declared in the source
    pub id: ID,
    /// The normalized path the module was loaded from
    pub path: String,
    /// `<id>_<hash>`, the unique per-module segment used in canonical IDs
    pub unique: String,
}

impl ModuleUid {
    pub fn new(id: ID, path: impl Into<String>) -> Self {
        let path = path.into();
        let hash = fnv1a64(path.as_bytes()) & 0xffff;
        let unique = format!("{}_{:04x}", id, hash);
        Self { id, path, unique }
    }

    /// The 16-bit hash segment of this module's path
    pub fn hash16(&self) -> u16 {
        (fnv1a64(self.path.as_bytes()) & 0xffff) as u16
    }
}

impl Display for ModuleUid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_decomposition() {
        let id = ID::new("HTTP::Request::uri");
        assert_eq!(id.local(), "uri");
        assert_eq!(id.namespace(), "HTTP::Request");
        assert!(id.is_qualified());

        let bare = ID::new("uri");
        assert_eq!(bare.local(), "uri");
        assert_eq!(bare.namespace(), "");
        assert!(!bare.is_qualified());
    }

    #[test]
    fn id_join() {
        let a = ID::new("A");
        let b = ID::new("T");
        assert_eq!(a.join(&b).as_str(), "A::T");
        assert_eq!(ID::default().join(&b).as_str(), "T");
        assert_eq!(a.join(&ID::default()).as_str(), "A");
    }

    #[test]
    fn module_uid_stable() {
        let uid1 = ModuleUid::new(ID::new("A"), "/lib/a.hlt");
        let uid2 = ModuleUid::new(ID::new("A"), "/lib/a.hlt");
        let uid3 = ModuleUid::new(ID::new("A"), "/other/a.hlt");
        assert_eq!(uid1, uid2);
        assert_eq!(uid1.unique, uid2.unique);
        assert_ne!(uid1.unique, uid3.unique);
    }
}
