//! The ID assigner: computes fully-qualified and canonical IDs.
//!
//! Two traversals. *Compute* walks each module pre-order, maintaining the
//! fully-qualified path (dotted from the module root) and the canonical path
//! (whose first segment is the module's UID, id plus 16-bit path hash).
//! *Enforce* runs after resolution and asserts every declaration ended up
//! with a canonical ID.
//!
//! Both IDs are write-once: recomputing a different value for a declaration
//! that already has one is a compiler bug and aborts.

use simplelog::debug;

use crate::ast::context::AstContext;
use crate::ast::id::ID;
use crate::ast::node::NodeId;
use crate::ast::visitor;

/// Computes missing IDs for every declaration in the context
pub fn assign(context: &mut AstContext) {
    for module in context.modules() {
        let uid = context.module_decl(module).uid.clone();
        let mut state = Assigner {
            context: &mut *context,
            path_fq: vec![uid.id.clone()],
            path_canon: vec![ID::new(uid.unique.clone())],
            anon_counter: 0,
        };
        state.set(module, Some(uid.id.clone()), Some(ID::new(uid.unique)));
        for child in state.context.children(module).collect::<Vec<_>>() {
            state.walk(child);
        }
    }
}

/// Asserts that resolution left no declaration without a canonical ID
pub fn enforce(context: &AstContext) {
    for module in context.modules() {
        for id in visitor::post_order(context, module) {
            if !context.is_declaration(id) {
                continue;
            }
            let declaration = context.declaration(id);
            assert!(
                declaration.canonical_id.is_some(),
                "declaration '{}' has no canonical ID after resolution",
                declaration.id
            );
        }
    }
}

struct Assigner<'a> {
    context: &'a mut AstContext,
    path_fq: Vec<ID>,
    path_canon: Vec<ID>,
    anon_counter: usize,
}

impl<'a> Assigner<'a> {
    fn fqdn(&self, id: &ID) -> ID {
        ID::from_parts(self.path_fq.iter().map(|part| part.as_str()).chain([id.as_str()]))
    }

    fn canon(&self, id: &ID) -> ID {
        ID::from_parts(self.path_canon.iter().map(|part| part.as_str()).chain([id.as_str()]))
    }

    /// Writes both IDs, verifying stability against earlier rounds
    fn set(&mut self, decl: NodeId, fq: Option<ID>, canonical: Option<ID>) {
        let declaration = self.context.declaration_mut(decl);

        if let Some(fq) = fq {
            match &declaration.fully_qualified_id {
                None => {
                    debug!("[id-assigner] fq '{fq}'");
                    declaration.fully_qualified_id = Some(fq);
                }
                Some(existing) => assert_eq!(existing, &fq, "fully qualified ID mismatch for '{}'", declaration.id),
            }
        }

        if let Some(canonical) = canonical {
            match &declaration.canonical_id {
                None => {
                    debug!("[id-assigner] canonical '{canonical}'");
                    declaration.canonical_id = Some(canonical);
                }
                Some(existing) => assert_eq!(existing, &canonical, "canonical ID mismatch for '{}'", declaration.id),
            }
        }
    }

    fn walk(&mut self, id: NodeId) {
        if self.context.is_declaration(id) {
            self.assign_declaration(id);
            return;
        }
        for child in self.context.children(id).collect::<Vec<_>>() {
            self.walk(child);
        }
    }

    fn assign_declaration(&mut self, decl: NodeId) {
        let class = crate::ast::declaration::DeclarationClass::from(&self.context.declaration(decl).kind);
        let mut id = self.context.declaration(decl).id.clone();

        // Anonymous fields get a synthetic, monotonically numbered segment.
        if id.is_empty() {
            id = ID::new(format!("anon_struct_{:x}", self.anon_counter));
            self.anon_counter += 1;
            self.context.declaration_mut(decl).id = id.clone();
        }

        use crate::ast::declaration::DeclarationClass;

        match class {
            // Locals and parameters are bare, never module-qualified; catch
            // parameters fall under Parameter as well.
            DeclarationClass::LocalVariable | DeclarationClass::Parameter => {
                let canonical = self.canon(&id);
                self.set(decl, Some(id.clone()), Some(canonical));
                self.walk_children(decl);
            }

            DeclarationClass::Expression => {
                let fq = match id.as_str() {
                    "self" => ID::new("self"),
                    _ => self.fqdn(&id),
                };
                let canonical = self.canon(&id);
                self.set(decl, Some(fq), Some(canonical));
            }

            // Functions clear the FQ path below them (locals are bare) but
            // extend the canonical path.
            DeclarationClass::Function | DeclarationClass::UnitHook => {
                let fq = match id.is_qualified() {
                    true => id.clone(), // qualified hook names stay as written
                    false => self.fqdn(&id),
                };
                let canonical = self.canon(&id);
                self.set(decl, Some(fq), Some(canonical));

                let saved_fq = std::mem::take(&mut self.path_fq);
                self.path_canon.push(id);
                self.walk_children(decl);
                self.path_canon.pop();
                self.path_fq = saved_fq;
            }

            // Types extend both paths for their members.
            DeclarationClass::Type => {
                let fq = self.fqdn(&id);
                let canonical = self.canon(&id);
                self.set(decl, Some(fq), Some(canonical));
                self.path_fq.push(id.clone());
                self.path_canon.push(id);
                self.walk_children(decl);
                self.path_fq.pop();
                self.path_canon.pop();
            }

            DeclarationClass::Module => {
                // Nested modules do not occur; the per-module entry handles
                // the root.
                self.walk_children(decl);
            }

            _ => {
                let fq = self.fqdn(&id);
                let canonical = self.canon(&id);
                self.set(decl, Some(fq), Some(canonical));
                self.walk_children(decl);
            }
        }
    }

    fn walk_children(&mut self, decl: NodeId) {
        for child in self.context.children(decl).collect::<Vec<_>>() {
            self.walk(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::id::ModuleUid;
    use pretty_assertions::assert_eq;

    #[test]
    fn global_gets_module_qualified_ids() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("A"), "a.hlt"));
        let int32 = builder.int_type(32);
        let qt = builder.qtype_nonconst(int32);
        let global = builder.global_decl(ID::new("x"), qt, None, Default::default());
        builder.add_declaration(module, global);

        assign(&mut context);

        let declaration = context.declaration(global);
        assert_eq!(declaration.fully_qualified_id.as_ref().unwrap().as_str(), "A::x");
        let canonical = declaration.canonical_id.as_ref().unwrap().as_str();
        assert!(canonical.starts_with("A_"), "canonical '{canonical}' must carry the module hash segment");
        assert!(canonical.ends_with("::x"));
    }

    #[test]
    fn ids_are_stable_across_reruns() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("A"), "a.hlt"));
        let bool_ty = builder.bool_type();
        let decl = builder.type_decl(ID::new("T"), bool_ty, Default::default());
        builder.add_declaration(module, decl);

        assign(&mut context);
        let first = context.declaration(decl).canonical_id.clone();
        assign(&mut context);
        assert_eq!(context.declaration(decl).canonical_id, first);
    }

    #[test]
    fn same_input_same_canonical_ids() {
        let build = || {
            let mut context = AstContext::default();
            let mut builder = Builder::new(&mut context);
            let module = builder.module(ModuleUid::new(ID::new("A"), "a.hlt"));
            let bool_ty = builder.bool_type();
            let decl = builder.type_decl(ID::new("T"), bool_ty, Default::default());
            builder.add_declaration(module, decl);
            assign(&mut context);
            context.declaration(decl).canonical_id.clone().unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn enforce_passes_after_assign() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("A"), "a.hlt"));
        let int8 = builder.int_type(8);
        let qt = builder.qtype_nonconst(int8);
        let global = builder.global_decl(ID::new("g"), qt, None, Default::default());
        builder.add_declaration(module, global);

        assign(&mut context);
        enforce(&context);
    }
}
