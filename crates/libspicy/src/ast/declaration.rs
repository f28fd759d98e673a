//! Declarations: modules, imports, types, constants, variables, parameters,
//! functions, fields, and hooks.
//!
//! All declarations share a header (id, linkage, the two assigned IDs, doc
//! string) with a kind-specific payload. The ID assigner is the only pass
//! that writes `fully_qualified_id` and `canonical_id`; both are write-once.

use strum_macros::{EnumDiscriminants, EnumIs};

use crate::ast::context::AstContext;
use crate::ast::id::{ModuleUid, ID};
use crate::ast::node::{NodeId, NodeKind};

/// Linkage of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Linkage {
    /// Executed at startup, after globals are initialized
    Init,
    /// Executed at startup, before globals are initialized
    PreInit,
    /// A member of a struct type
    Struct,
    /// Visible only inside the declaring module
    #[default]
    Private,
    /// Visible to importing modules
    Public,
}

/// Payload of a module declaration; the module's declarations are children
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDecl {
    pub uid: ModuleUid,
    /// Extension of the plugin that owns this module's later passes
    pub process_extension: Option<String>,
    /// Module UIDs this module depends on; populated during resolution
    pub dependencies: Vec<ModuleUid>,
}

/// Payload of an import declaration
///
/// Imports are executed lazily: the resolver fills in `resolved_uid` the
/// first time it visits the declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedModule {
    /// The module id being imported
    pub module_id: ID,
    /// Optional search scope (dotted, translated to subdirectories)
    pub scope: Option<ID>,
    /// Extension to parse the imported file with
    pub parse_extension: String,
    /// Plugin extension owning the imported module's later passes
    pub process_extension: Option<String>,
    /// Caller-supplied search directories
    pub search_dirs: Vec<String>,
    /// The UID of the imported module once resolved
    pub resolved_uid: Option<ModuleUid>,
}

/// Calling convention of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterKind {
    #[default]
    In,
    InOut,
    Copy,
    Unknown,
}

/// Payload of a parameter declaration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    pub kind: ParameterKind,
}

/// Kind-specific payload of a declaration
///
/// Child-slot conventions:
///
/// | kind | children |
/// |---|---|
/// | `Module` | the module's declarations |
/// | `ImportedModule` | none |
/// | `Type` | QT of the declared type, then synthesized label constants |
/// | `Constant` | QT (may be empty slot), value expression |
/// | `GlobalVariable`/`LocalVariable` | QT, optional init expression |
/// | `Parameter` | QT, optional default expression |
/// | `Function` | the `Function` node |
/// | `Field` | QT, optional attribute set, optional inline function |
/// | `Expression` | the expression |
/// | `UnitHook` | the `Function` node implementing the hook |
#[derive(Debug, Clone, PartialEq, EnumDiscriminants, EnumIs)]
#[strum_discriminants(name(DeclarationClass))]
pub enum DeclarationKind {
    Module(ModuleDecl),
    ImportedModule(ImportedModule),
    Type,
    Constant,
    GlobalVariable,
    LocalVariable,
    Parameter(Parameter),
    Function,
    Field,
    Expression,
    /// A Spicy `on ...` hook attached to a unit or one of its fields
    UnitHook {
        /// Weak link to the unit type the hook attaches to
        unit: Option<NodeId>,
        /// Weak link to the field, for field hooks
        field: Option<NodeId>,
        /// True for `foreach` hooks on container fields
        foreach: bool,
    },
}

/// A declaration node payload
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub id: ID,
    pub linkage: Linkage,
    /// User-visible dotted path from the module root; set by the ID assigner
    pub fully_qualified_id: Option<ID>,
    /// Globally unique ID with the module-hash segment; set by the ID assigner
    pub canonical_id: Option<ID>,
    /// Documentation comment, if the front end attached one
    pub doc: Option<String>,
    pub kind: DeclarationKind,
}

impl Declaration {
    pub fn new(id: ID, linkage: Linkage, kind: DeclarationKind) -> Self {
        Self {
            id,
            linkage,
            fully_qualified_id: None,
            canonical_id: None,
            doc: None,
            kind,
        }
    }
}

/// Payload of a function node; child 0 is the qualified function type, child
/// 1 the optional body block
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Function {
    pub id: ID,
}

impl AstContext {
    pub fn declaration(&self, id: NodeId) -> &Declaration {
        match &self.node(id).kind {
            NodeKind::Declaration(declaration) => declaration,
            other => panic!("node {id:?} is not a declaration: {other:?}"),
        }
    }

    pub fn declaration_mut(&mut self, id: NodeId) -> &mut Declaration {
        match &mut self.node_mut(id).kind {
            NodeKind::Declaration(declaration) => declaration,
            other => panic!("node {id:?} is not a declaration: {other:?}"),
        }
    }

    pub fn is_declaration(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Declaration(_))
    }

    pub fn function(&self, id: NodeId) -> &Function {
        match &self.node(id).kind {
            NodeKind::Function(function) => function,
            other => panic!("node {id:?} is not a function: {other:?}"),
        }
    }

    /// The qualified type associated with a declaration, when it has one
    pub fn declaration_type(&self, id: NodeId) -> Option<NodeId> {
        match &self.declaration(id).kind {
            DeclarationKind::Type
            | DeclarationKind::Constant
            | DeclarationKind::GlobalVariable
            | DeclarationKind::LocalVariable
            | DeclarationKind::Parameter(_)
            | DeclarationKind::Field => self.child(id, 0),
            DeclarationKind::Function | DeclarationKind::UnitHook { .. } => {
                let function = self.child(id, 0)?;
                self.child(function, 0)
            }
            DeclarationKind::Expression => {
                let expression = self.child(id, 0)?;
                self.expression_type(expression)
            }
            DeclarationKind::Module(_) | DeclarationKind::ImportedModule(_) => None,
        }
    }

    /// The value of a constant declaration or the init of a variable
    pub fn declaration_value(&self, id: NodeId) -> Option<NodeId> {
        match &self.declaration(id).kind {
            DeclarationKind::Constant | DeclarationKind::GlobalVariable | DeclarationKind::LocalVariable => self.child(id, 1),
            DeclarationKind::Parameter(_) => self.child(id, 1),
            DeclarationKind::Expression => self.child(id, 0),
            _ => None,
        }
    }

    /// The attribute set of a field declaration
    pub fn field_attributes(&self, id: NodeId) -> Option<NodeId> {
        match &self.declaration(id).kind {
            DeclarationKind::Field => self.child(id, 1),
            _ => None,
        }
    }

    /// The module declaration payload
    pub fn module_decl(&self, id: NodeId) -> &ModuleDecl {
        match &self.declaration(id).kind {
            DeclarationKind::Module(module) => module,
            other => panic!("node {id:?} is not a module declaration: {other:?}"),
        }
    }

    pub fn module_decl_mut(&mut self, id: NodeId) -> &mut ModuleDecl {
        match &mut self.declaration_mut(id).kind {
            DeclarationKind::Module(module) => module,
            other => panic!("node {id:?} is not a module declaration: {other:?}"),
        }
    }

    /// The function body block of a function declaration, if present
    pub fn function_body(&self, decl: NodeId) -> Option<NodeId> {
        let function = self.child(decl, 0)?;
        self.child(function, 1)
    }
}
