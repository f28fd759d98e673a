//! The AST data model.
//!
//! Everything the pipeline operates on is a [`node::Node`] owned by an
//! [`context::AstContext`]. The submodules split the model by concern:
//!
//! - [`context`]: the arena, module indexes, import resolution
//! - [`node`]: the node header and kind tag
//! - [`id`]: identifier paths and module UIDs
//! - [`types`]: unqualified and qualified types
//! - [`declaration`], [`expression`], [`statement`], [`ctor`]: kind payloads
//! - [`attribute`]: `&attr` attributes and attribute sets
//! - [`scope`]: lexical scopes and name lookup
//! - [`builder`]: node factories
//! - [`visitor`]: traversal order helpers and debug rendering

pub mod attribute;
pub mod builder;
pub mod context;
pub mod ctor;
pub mod declaration;
pub mod expression;
pub mod id;
pub mod meta;
pub mod node;
pub mod scope;
pub mod statement;
pub mod types;
pub mod visitor;

pub use builder::Builder;
pub use context::{AstContext, CompilerOptions};
pub use id::{ModuleUid, ID};
pub use meta::Meta;
pub use node::{Node, NodeId, NodeKind};
