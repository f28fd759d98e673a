//! Lexical scopes.
//!
//! A scope maps names to the declarations visible under them. Scopes hang
//! off nodes and are populated by the scope builder; lookup walks the parent
//! chain. A name can map to several declarations (function overloads, hooks),
//! and a scope can record an explicit *not-found* marker that stops the
//! parent-chain walk; that is how `$$` is blocked outside of field hooks.

use indexmap::IndexMap;

use crate::ast::context::AstContext;
use crate::ast::declaration::DeclarationKind;
use crate::ast::id::ID;
use crate::ast::node::NodeId;

/// One entry under a name in a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEntry {
    /// The name resolves to this declaration
    Declaration(NodeId),
    /// The name is explicitly absent here; lookup must not continue upward
    NotFound,
}

/// A lexical scope
#[derive(Debug, Clone, Default)]
pub struct Scope {
    items: IndexMap<String, Vec<ScopeEntry>>,
}

impl Scope {
    /// Adds a declaration under the given name
    pub fn insert(&mut self, name: impl Into<String>, declaration: NodeId) {
        self.items.entry(name.into()).or_default().push(ScopeEntry::Declaration(declaration));
    }

    /// Marks the name as explicitly not available in this scope
    pub fn insert_not_found(&mut self, name: impl Into<String>) {
        self.items.entry(name.into()).or_default().push(ScopeEntry::NotFound);
    }

    pub fn lookup(&self, name: &str) -> Option<&[ScopeEntry]> {
        self.items.get(name).map(|entries| entries.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }
}

/// Result of a scope-chain lookup
#[derive(Debug, Clone, Default)]
pub struct LookupResult {
    /// Candidate declarations, in scope order
    pub candidates: Vec<NodeId>,
    /// True if any candidate came from another module with non-public
    /// linkage; callers must treat the lookup as ambiguous then
    pub external_non_public: bool,
}

impl AstContext {
    /// Looks up an ID starting at `node`, walking the scope chain upward.
    ///
    /// Qualified IDs resolve their first segment first and then continue
    /// inside the found declaration's scope (imported module, type members).
    pub fn lookup_id(&self, node: NodeId, id: &ID) -> LookupResult {
        let mut segments = id.as_str().split("::");
        let first = match segments.next() {
            Some(first) if !first.is_empty() => first,
            _ => return LookupResult::default(),
        };

        let mut result = self.lookup_plain(node, first);

        // For qualified ids, registered modules form a namespace of last
        // resort; this is how the always-available 'hilti' module resolves
        // without an explicit import.
        if result.candidates.is_empty() && id.is_qualified() {
            if let Some(module) = self.module_by_scope_id(None, &ID::new(first)) {
                result.candidates.push(module);
            }
        }

        for segment in segments {
            let mut narrowed = LookupResult::default();
            for candidate in result.candidates {
                self.lookup_inside(candidate, segment, &mut narrowed);
            }
            narrowed.external_non_public |= result.external_non_public;
            result = narrowed;
        }

        result
    }

    /// Unqualified lookup through the scope chain
    fn lookup_plain(&self, node: NodeId, name: &str) -> LookupResult {
        let mut result = LookupResult::default();
        let mut current = Some(node);

        while let Some(id) = current {
            if let Some(scope) = &self.node(id).scope {
                if let Some(entries) = scope.lookup(name) {
                    for entry in entries {
                        match entry {
                            ScopeEntry::Declaration(decl) => result.candidates.push(*decl),
                            ScopeEntry::NotFound => return result,
                        }
                    }
                    if !result.candidates.is_empty() {
                        return result;
                    }
                }
            }
            current = self.node(id).parent;
        }

        result
    }

    /// Continues a qualified lookup inside a previously found declaration
    fn lookup_inside(&self, decl: NodeId, name: &str, result: &mut LookupResult) {
        if !self.is_declaration(decl) {
            return;
        }
        match &self.declaration(decl).kind {
            DeclarationKind::ImportedModule(import) => {
                let Some(uid) = &import.resolved_uid else { return };
                let Some(module) = self.module_by_uid(uid) else { return };
                if let Some(scope) = &self.node(module).scope {
                    if let Some(entries) = scope.lookup(name) {
                        for entry in entries {
                            if let ScopeEntry::Declaration(found) = entry {
                                let linkage = self.declaration(*found).linkage;
                                if linkage != crate::ast::declaration::Linkage::Public {
                                    result.external_non_public = true;
                                }
                                result.candidates.push(*found);
                            }
                        }
                    }
                }
            }
            DeclarationKind::Module(_) => {
                if let Some(scope) = &self.node(decl).scope {
                    if let Some(entries) = scope.lookup(name) {
                        for entry in entries {
                            if let ScopeEntry::Declaration(found) = entry {
                                result.candidates.push(*found);
                            }
                        }
                    }
                }
            }
            DeclarationKind::Type => {
                // Members of a declared type live in the type node's scope.
                if let Some(type_node) = self.declaration_type(decl) {
                    let inner = self.inner_type_raw(type_node);
                    if let Some(scope) = &self.node(inner).scope {
                        if let Some(entries) = scope.lookup(name) {
                            for entry in entries {
                                if let ScopeEntry::Declaration(found) = entry {
                                    result.candidates.push(*found);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_basic_insert_lookup() {
        let mut scope = Scope::default();
        scope.insert("x", NodeId(1));
        scope.insert("x", NodeId(2));
        let entries = scope.lookup("x").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(scope.lookup("y").is_none());
    }

    #[test]
    fn scope_not_found_marker() {
        let mut scope = Scope::default();
        scope.insert_not_found("$$");
        assert_eq!(scope.lookup("$$").unwrap(), &[ScopeEntry::NotFound]);
    }
}
