//! The AST context: owner of every node and every module.
//!
//! # Overview
//!
//! The context is the single authoritative identity for "this AST". It owns
//! the node arena, the root node whose children are the loaded modules, and
//! three module indexes: by UID, by normalized source path, and by
//! `(import scope, id)`. All structural mutation of the tree goes through the
//! context so that parent pointers stay consistent.
//!
//! # Ownership invariant
//!
//! A node has at most one parent, and only the `children` lists form the
//! ownership tree. Cycles are forbidden; [`AstContext::assert_acyclic`] is
//! re-run by the resolver after every round. Cross-tree references (type
//! backlinks, resolved names) are weak node ids held in payloads.
//!
//! # Import resolution
//!
//! `import_module` searches caller-supplied directories, plugin library
//! paths, and the globally configured search paths for `<id><ext>` (module id
//! lowercased, dotted scopes becoming subdirectories). Sources can also be
//! preloaded into the context, which both the tests and the build cache in
//! front of this core use; preloaded paths take precedence over the
//! filesystem.

use indexmap::IndexMap;
use simplelog::debug;

use crate::ast::declaration::{Declaration, DeclarationKind, ModuleDecl};
use crate::ast::id::{ModuleUid, ID};
use crate::ast::meta::Meta;
use crate::ast::node::{Node, NodeId, NodeKind};
use crate::compiler::plugin::PluginRegistry;
use crate::error::{CompileError, ErrorPriority, Result};
use crate::file::SourceFile;
use crate::span::SpanInfo;

/// Global knobs consulted by the driver and the passes
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub debug: bool,
    pub enable_profiling: bool,
    pub skip_validation: bool,
    pub skip_dependencies: bool,
    pub global_optimizations: bool,
    /// Globally configured import search directories
    pub library_paths: Vec<String>,
    /// Debug knob raising the resolver's round cap in tests
    pub max_resolver_rounds: Option<usize>,
}

/// The AST context; see the module documentation
#[derive(Debug)]
pub struct AstContext {
    nodes: Vec<Node>,
    root: NodeId,
    /// Holder for operator signature nodes, owned by the root
    operator_holder: NodeId,
    modules_by_uid: IndexMap<String, NodeId>,
    modules_by_path: IndexMap<String, NodeId>,
    modules_by_scope_id: IndexMap<(String, String), NodeId>,
    /// Sources registered in memory; looked up before the filesystem
    preloaded: IndexMap<String, SourceFile>,
    pub options: CompilerOptions,
    /// Set once `process_ast` has succeeded; later calls are no-ops
    pub resolved: bool,
}

impl Default for AstContext {
    fn default() -> Self {
        Self::new(CompilerOptions::default())
    }
}

impl AstContext {
    pub fn new(options: CompilerOptions) -> Self {
        let mut context = Self {
            nodes: Vec::new(),
            root: NodeId::UNDEFINED,
            operator_holder: NodeId::UNDEFINED,
            modules_by_uid: IndexMap::new(),
            modules_by_path: IndexMap::new(),
            modules_by_scope_id: IndexMap::new(),
            preloaded: IndexMap::new(),
            options,
            resolved: false,
        };

        context.root = context.new_node(NodeKind::Root, Meta::default());
        context.operator_holder = context.new_node(NodeKind::Root, Meta::default());
        let holder = context.operator_holder;
        let root = context.root;
        context.attach_child(root, holder);
        context
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The node owning materialized operator signatures
    pub fn operator_holder(&self) -> NodeId {
        self.operator_holder
    }

    /* ----- node management ----- */

    /// Creates a detached node and returns its identity
    pub fn new_node(&mut self, kind: NodeKind, meta: Meta) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, kind, meta));
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Appends a child, taking ownership
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(self.nodes[child.0].parent.is_none(), "node {child:?} already has a parent");
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(Some(child));
    }

    /// Appends an empty fixed slot
    pub fn attach_empty(&mut self, parent: NodeId) {
        self.nodes[parent.0].children.push(None);
    }

    /// Appends a child slot that may be empty
    pub fn attach_optional(&mut self, parent: NodeId, child: Option<NodeId>) {
        match child {
            Some(child) => self.attach_child(parent, child),
            None => self.attach_empty(parent),
        }
    }

    /// Replaces the child in `slot`, detaching any previous occupant
    pub fn set_child(&mut self, parent: NodeId, slot: usize, child: Option<NodeId>) {
        while self.nodes[parent.0].children.len() <= slot {
            self.nodes[parent.0].children.push(None);
        }

        if let Some(old) = self.nodes[parent.0].children[slot] {
            self.nodes[old.0].parent = None;
        }

        if let Some(child) = child {
            debug_assert!(self.nodes[child.0].parent.is_none(), "node {child:?} already has a parent");
            self.nodes[child.0].parent = Some(parent);
        }

        self.nodes[parent.0].children[slot] = child;
    }

    /// Swaps `old` for `new` under `old`'s parent; the standard node
    /// replacement used by mutating visitors
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) {
        let parent = self.nodes[old.0].parent.expect("cannot replace a detached node");
        let slot = self.nodes[parent.0]
            .children
            .iter()
            .position(|slot| *slot == Some(old))
            .expect("parent does not own the node being replaced");

        self.nodes[old.0].parent = None;
        debug_assert!(self.nodes[new.0].parent.is_none(), "replacement node already has a parent");
        self.nodes[new.0].parent = Some(parent);
        self.nodes[parent.0].children[slot] = Some(new);
    }

    /// Detaches and returns the child in `slot`
    pub fn detach_child(&mut self, parent: NodeId, slot: usize) -> Option<NodeId> {
        let child = self.nodes[parent.0].children.get_mut(slot)?.take();
        if let Some(child) = child {
            self.nodes[child.0].parent = None;
        }
        child
    }

    /// Removes the child from its parent's child list entirely
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|slot| *slot != Some(child));
        self.nodes[child.0].parent = None;
    }

    pub fn child(&self, parent: NodeId, slot: usize) -> Option<NodeId> {
        self.nodes[parent.0].children.get(slot).copied().flatten()
    }

    /// Iterates the non-empty children in order
    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[parent.0].children.iter().filter_map(|slot| *slot)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Walks from `id` to the root, excluding `id` itself
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut current = self.nodes[id.0].parent;
        std::iter::from_fn(move || {
            let next = current?;
            current = self.nodes[next.0].parent;
            Some(next)
        })
    }

    /// The nearest enclosing source location, walking upward from `id`
    pub fn nearest_location(&self, id: NodeId) -> Option<SpanInfo> {
        if let Some(location) = &self.nodes[id.0].meta.location {
            return Some(location.clone());
        }
        self.ancestors(id).find_map(|ancestor| self.nodes[ancestor.0].meta.location.clone())
    }

    /// Records an error on a node
    pub fn add_error(&mut self, id: NodeId, message: impl Into<String>, priority: ErrorPriority) {
        let location = self.nearest_location(id);
        let node = self.node_mut(id);
        node.errors.push(crate::ast::node::NodeError {
            message: message.into(),
            priority,
            location,
        });
    }

    /// Clears the per-round errors on every node
    pub fn clear_all_errors(&mut self) {
        for node in self.nodes.iter_mut() {
            node.errors.clear();
        }
    }

    /// Clears every node's scope, forcing a scope-builder rerun
    pub fn clear_all_scopes(&mut self) {
        for node in self.nodes.iter_mut() {
            node.scope = None;
        }
    }

    /// Verifies the ownership tree is acyclic and parent links agree with
    /// child lists; violations are compiler bugs and abort
    pub fn assert_acyclic(&self) {
        let mut state = vec![0u8; self.nodes.len()]; // 0 unseen, 1 on stack, 2 done
        let mut stack = vec![(self.root, 0usize)];

        while let Some((id, child_index)) = stack.pop() {
            if child_index == 0 {
                assert!(state[id.0] != 1, "cycle detected in AST ownership at node {id:?}");
                state[id.0] = 1;
            }

            let node = &self.nodes[id.0];
            match node.children.get(child_index..).and_then(|rest| rest.iter().enumerate().find_map(|(i, c)| c.map(|c| (i, c)))) {
                Some((offset, child)) => {
                    assert_eq!(
                        self.nodes[child.0].parent,
                        Some(id),
                        "parent pointer mismatch: {child:?} is owned by {id:?}"
                    );
                    stack.push((id, child_index + offset + 1));
                    stack.push((child, 0));
                }
                None => state[id.0] = 2,
            }
        }
    }

    /// Deep-copies a subtree, returning the detached copy's root.
    ///
    /// Weak references inside payloads are copied verbatim; they keep
    /// pointing at the original targets, which is the desired behavior for
    /// resolved names and type backlinks.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let mut node = self.nodes[id.0].clone();
        node.parent = None;
        node.scope = None;
        node.errors.clear();

        let children = std::mem::take(&mut node.children);
        let new_id = NodeId(self.nodes.len());
        node.id = new_id;
        self.nodes.push(node);

        for slot in children {
            match slot {
                Some(child) => {
                    let copy = self.deep_copy(child);
                    self.attach_child(new_id, copy);
                }
                None => self.attach_empty(new_id),
            }
        }

        new_id
    }

    /* ----- module management ----- */

    /// Registers a parsed module under the root and indexes it
    pub fn register_module(&mut self, module: NodeId, scope: Option<&ID>) -> ModuleUid {
        let uid = self.module_decl(module).uid.clone();
        debug!("[ast-declarations] registering module {} from {}", uid.id, uid.path);

        self.attach_child(self.root, module);
        self.modules_by_uid.insert(uid.unique.clone(), module);
        self.modules_by_path.insert(uid.path.clone(), module);
        let scope_key = scope.map(|scope| scope.to_string()).unwrap_or_default();
        self.modules_by_scope_id.insert((scope_key, uid.id.to_string()), module);
        uid
    }

    pub fn module_by_uid(&self, uid: &ModuleUid) -> Option<NodeId> {
        self.modules_by_uid.get(&uid.unique).copied()
    }

    pub fn module_by_path(&self, path: &str) -> Option<NodeId> {
        self.modules_by_path.get(path).copied()
    }

    pub fn module_by_scope_id(&self, scope: Option<&ID>, id: &ID) -> Option<NodeId> {
        let scope_key = scope.map(|scope| scope.to_string()).unwrap_or_default();
        self.modules_by_scope_id.get(&(scope_key, id.to_string())).copied()
    }

    /// All registered module nodes, in registration order
    pub fn modules(&self) -> Vec<NodeId> {
        self.modules_by_uid.values().copied().collect()
    }

    /// Registers an in-memory source; import resolution prefers these
    pub fn preload_source(&mut self, path: impl Into<String>, file: SourceFile) {
        self.preloaded.insert(normalize_path(&path.into()), file);
    }

    fn load_source(&self, path: &str) -> Option<SourceFile> {
        if let Some(file) = self.preloaded.get(path) {
            return Some(file.clone());
        }

        std::fs::read_to_string(path)
            .ok()
            .map(|code| SourceFile::new(path.split('/').map(str::to_string).collect(), code))
    }

    fn source_exists(&self, path: &str) -> bool {
        self.preloaded.contains_key(path) || std::path::Path::new(path).exists()
    }

    /// Parses a source file through the plugin registered for its extension.
    ///
    /// Idempotent on the normalized path: re-parsing the same file returns
    /// the cached UID without touching the AST.
    pub fn parse_source(&mut self, plugins: &PluginRegistry, path: &str, process_extension: Option<&str>) -> Result<ModuleUid> {
        let path = normalize_path(path);

        if let Some(module) = self.modules_by_path.get(&path) {
            debug!("[ast-cache] source {} already parsed", path);
            return Ok(self.module_decl(*module).uid.clone());
        }

        let extension = path.rsplit('.').next().unwrap_or_default().to_string();
        let plugin = plugins
            .by_extension(&extension)
            .ok_or_else(|| CompileError::unknown_extension(extension.clone(), path.clone()))?;

        let file = self
            .load_source(&path)
            .ok_or_else(|| CompileError::import_not_found(path.clone(), 0..0, SourceFile::synthetic()))?;

        debug!("[compiler] parsing {} with plugin '{}'", path, plugin.extension);
        let module = (plugin.parse)(self, &file, &path)?;

        let process_extension = process_extension.map(str::to_string).or_else(|| Some(plugin.extension.clone()));
        self.module_decl_mut(module).process_extension = process_extension;

        Ok(self.register_module(module, None))
    }

    /// Locates and parses `<id><ext>` within `scope`, against the given
    /// search directories plus the global configuration.
    pub fn import_module(
        &mut self,
        plugins: &PluginRegistry,
        id: &ID,
        scope: Option<&ID>,
        parse_extension: &str,
        process_extension: Option<&str>,
        search_dirs: &[String],
    ) -> Result<ModuleUid> {
        if let Some(module) = self.module_by_scope_id(scope, id) {
            return Ok(self.module_decl(module).uid.clone());
        }

        let mut filename = id.to_string().to_lowercase();
        filename.push('.');
        filename.push_str(parse_extension.trim_start_matches('.'));

        let subdir = scope
            .map(|scope| scope.as_str().split("::").collect::<Vec<_>>().join("/"))
            .unwrap_or_default();

        let mut all_dirs: Vec<String> = search_dirs.to_vec();
        if let Some(plugin) = plugins.by_extension(parse_extension.trim_start_matches('.')) {
            all_dirs.extend((plugin.library_paths)(self));
        }
        all_dirs.extend(self.options.library_paths.clone());
        all_dirs.push(String::from("."));

        for dir in &all_dirs {
            let candidate = match subdir.is_empty() {
                true => format!("{dir}/{filename}"),
                false => format!("{dir}/{subdir}/{filename}"),
            };
            let candidate = normalize_path(&candidate);

            if !self.source_exists(&candidate) {
                continue;
            }

            let uid = self.parse_source(plugins, &candidate, process_extension)?;

            // The file exists but must declare the module id we asked for.
            if &uid.id != id {
                let module = self.module_by_uid(&uid).expect("module just parsed");
                let location = self.nearest_location(module).unwrap_or_else(SpanInfo::synthetic);
                return Err(CompileError::module_id_mismatch(
                    id.to_string(),
                    uid.id.to_string(),
                    location.position,
                    location.file,
                ));
            }

            let module = self.module_by_uid(&uid).expect("module just parsed");
            let scope_key = scope.map(|scope| scope.to_string()).unwrap_or_default();
            self.modules_by_scope_id.insert((scope_key, id.to_string()), module);
            return Ok(uid);
        }

        Err(CompileError::import_not_found(id.to_string(), 0..0, SourceFile::synthetic()))
    }

    /// The modules `uid` depends on; available after a successful
    /// `process_ast`
    pub fn dependencies(&self, uid: &ModuleUid, recursive: bool) -> Vec<ModuleUid> {
        let mut out: Vec<ModuleUid> = Vec::new();
        let mut queue = vec![uid.clone()];
        let mut seen = vec![uid.clone()];

        while let Some(current) = queue.pop() {
            let Some(module) = self.module_by_uid(&current) else { continue };
            for dependency in &self.module_decl(module).dependencies {
                if seen.contains(dependency) {
                    continue;
                }
                seen.push(dependency.clone());
                out.push(dependency.clone());
                if recursive {
                    queue.push(dependency.clone());
                }
            }
        }

        out
    }

    /// Creates a module declaration node (detached; register separately)
    pub fn make_module(&mut self, uid: ModuleUid, meta: Meta) -> NodeId {
        let declaration = Declaration::new(
            uid.id.clone(),
            crate::ast::declaration::Linkage::Public,
            DeclarationKind::Module(ModuleDecl {
                uid,
                process_extension: None,
                dependencies: Vec::new(),
            }),
        );
        self.new_node(NodeKind::Declaration(declaration), meta)
    }

    /// The module enclosing a node, if it is inside one
    pub fn enclosing_module(&self, id: NodeId) -> Option<NodeId> {
        if self.is_declaration(id) && matches!(self.declaration(id).kind, DeclarationKind::Module(_)) {
            return Some(id);
        }
        self.ancestors(id)
            .find(|ancestor| self.is_declaration(*ancestor) && matches!(self.declaration(*ancestor).kind, DeclarationKind::Module(_)))
    }
}

/// Normalizes `.` and `..` segments and redundant separators
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let absolute = path.starts_with('/');

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().map(|last| *last != "..").unwrap_or(false) {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match absolute {
        true => format!("/{joined}"),
        false => joined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_paths() {
        assert_eq!(normalize_path("a/./b//c"), "a/b/c");
        assert_eq!(normalize_path("a/b/../c"), "a/c");
        assert_eq!(normalize_path("/lib/../usr/x.hlt"), "/usr/x.hlt");
    }

    #[test]
    fn attach_and_replace() {
        let mut context = AstContext::default();
        let root = context.root();

        let a = context.new_node(NodeKind::Root, Meta::default());
        let b = context.new_node(NodeKind::Root, Meta::default());
        context.attach_child(root, a);
        assert_eq!(context.parent(a), Some(root));

        context.replace_child(a, b);
        assert_eq!(context.parent(b), Some(root));
        assert_eq!(context.parent(a), None);
        assert!(context.children(root).any(|child| child == b));
        assert!(!context.children(root).any(|child| child == a));
    }

    #[test]
    fn acyclicity_assertion_passes_on_tree() {
        let mut context = AstContext::default();
        let root = context.root();
        let a = context.new_node(NodeKind::Root, Meta::default());
        let b = context.new_node(NodeKind::Root, Meta::default());
        context.attach_child(root, a);
        context.attach_child(a, b);
        context.assert_acyclic();
    }

    #[test]
    fn fixed_slots_support_none() {
        let mut context = AstContext::default();
        let root = context.root();
        let node = context.new_node(NodeKind::Root, Meta::default());
        context.attach_child(root, node);

        context.attach_empty(node);
        let child = context.new_node(NodeKind::Root, Meta::default());
        context.attach_optional(node, Some(child));

        assert_eq!(context.child(node, 0), None);
        assert_eq!(context.child(node, 1), Some(child));
        assert_eq!(context.children(node).count(), 1);
    }
}
