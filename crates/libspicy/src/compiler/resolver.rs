//! The resolver: a single-threaded, monotone fixed-point loop.
//!
//! Each round clears per-node errors, rebuilds scopes if needed, runs the ID
//! assigner, the resolver visitor, and the type unifier, then loops while
//! anything changed. The loop aborts with an internal error after 50 rounds
//! (a debug knob can raise the cap in tests).
//!
//! The visitor makes small local decisions: bind names, pick operator
//! overloads, infer `auto` types, coerce arguments, rewrite assignment
//! forms, and execute imports lazily. All changes are commit-in-place and
//! monotone; there is no rollback.

use indexmap::IndexMap;
use simplelog::debug;

use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::ctor::CtorKind;
use crate::ast::declaration::DeclarationKind;
use crate::ast::expression::{ExpressionKind, Keyword};
use crate::ast::id::ID;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::statement::StatementKind;
use crate::ast::types::{Constness, Side, TypeKind};
use crate::ast::visitor;
use crate::compiler::coercer::{self, Coerced, CoercionStyle};
use crate::compiler::plugin::{Plugin, PluginRegistry};
use crate::compiler::{id_assigner, scope_builder, type_unifier};
use crate::error::{CompileError, ErrorPriority, Result};
use crate::operators::{Kind, Registry, ResultSpec};

/// Default round cap; exceeding it indicates an oscillation bug
pub const MAX_ROUNDS: usize = 50;

/// The six increasingly permissive operand-matching styles
fn matching_styles() -> [CoercionStyle; 6] {
    let base = CoercionStyle::TRY_EXACT_MATCH;
    let promote = base | CoercionStyle::TRY_CONST_PROMOTION;
    let deref = promote | CoercionStyle::TRY_DEREF;
    let coerce = promote | CoercionStyle::TRY_COERCION | CoercionStyle::OPERAND_MATCHING;
    let contextual = coerce | CoercionStyle::CONTEXTUAL_CONVERSION;
    let all = contextual | CoercionStyle::TRY_DEREF;
    [base, promote, deref, coerce, contextual, all]
}

/// Drives resolution for one plugin to its fixed point
pub fn resolve(context: &mut AstContext, registry: &mut Registry, plugins: &PluginRegistry, plugin: &Plugin) -> Result<()> {
    let max_rounds = context.options.max_resolver_rounds.unwrap_or(MAX_ROUNDS);
    let mut rebuild_scopes = true;

    for round in 1.. {
        if round > max_rounds {
            return Err(CompileError::internal(format!(
                "resolver did not reach a fixed point after {max_rounds} rounds"
            )));
        }

        debug!("[resolver] round {round}");
        context.clear_all_errors();

        if rebuild_scopes {
            context.clear_all_scopes();
            scope_builder::build_scopes(context);
            if let Some(build_scopes) = &plugin.ast_build_scopes {
                build_scopes(context);
            }
        }

        id_assigner::assign(context);

        let mut modified = registry.init_pending(context);

        let mut pass = ResolverPass::new(context, registry, plugins);
        pass.run()?;
        modified |= pass.modified;

        if let Some(extra) = &plugin.ast_resolve {
            modified |= extra(context, registry)?;
        }

        modified |= type_unifier::unify(context);

        context.assert_acyclic();

        debug!("[ast-dump-iterations] round {round} modified={modified}");
        if !modified {
            break;
        }
        rebuild_scopes = true;
    }

    Ok(())
}

/// One resolver visitor sweep
pub struct ResolverPass<'a> {
    context: &'a mut AstContext,
    registry: &'a mut Registry,
    plugins: &'a PluginRegistry,
    pub modified: bool,
    /// `auto` inference updates: (qualified type holding auto) -> source QT
    auto_updates: IndexMap<NodeId, NodeId>,
}

impl<'a> ResolverPass<'a> {
    pub fn new(context: &'a mut AstContext, registry: &'a mut Registry, plugins: &'a PluginRegistry) -> Self {
        Self {
            context,
            registry,
            plugins,
            modified: false,
            auto_updates: IndexMap::new(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        for module in self.context.modules() {
            for id in visitor::post_order(self.context, module) {
                // The node may have been replaced by an earlier rewrite.
                if self.context.parent(id).is_none() && id != module {
                    continue;
                }
                self.visit(module, id)?;
            }
        }
        self.apply_auto_updates();
        Ok(())
    }

    fn visit(&mut self, module: NodeId, id: NodeId) -> Result<()> {
        let is_type = matches!(self.context.node(id).kind, NodeKind::Type(_));
        if self.context.is_expression(id) {
            self.visit_expression(id)
        } else if is_type {
            self.visit_type(id);
            Ok(())
        } else if self.context.is_ctor(id) {
            self.visit_ctor(id);
            Ok(())
        } else if self.context.is_declaration(id) {
            self.visit_declaration(module, id)
        } else if self.context.is_statement(id) {
            self.visit_statement(id);
            Ok(())
        } else {
            Ok(())
        }
    }

    /* ----- expressions ----- */

    fn visit_expression(&mut self, id: NodeId) -> Result<()> {
        match self.context.expression(id).kind.clone() {
            ExpressionKind::Name { id: name, resolved: None } => {
                self.resolve_name(id, &name);
                Ok(())
            }
            ExpressionKind::UnresolvedOperator { kind } => self.resolve_operator(id, kind),
            ExpressionKind::Assign => {
                self.rewrite_assignment(id);
                Ok(())
            }
            ExpressionKind::PendingCoerced => {
                self.resolve_pending_coerced(id);
                Ok(())
            }
            ExpressionKind::ListComprehension { .. } => {
                self.resolve_comprehension(id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn resolve_name(&mut self, id: NodeId, name: &ID) {
        let lookup = self.context.lookup_id(id, name);
        let candidates: Vec<NodeId> = lookup
            .candidates
            .into_iter()
            .filter(|candidate| self.context.is_declaration(*candidate))
            .collect();

        // Inside an unresolved call, missing or multiple hits are legitimate
        // until overload resolution runs; stay silent here.
        let inside_call = self
            .context
            .parent(id)
            .map(|parent| {
                self.context.is_expression(parent)
                    && matches!(self.context.expression(parent).kind, ExpressionKind::UnresolvedOperator { kind: Kind::Call })
            })
            .unwrap_or(false);

        match candidates.as_slice() {
            [] => {
                if !inside_call {
                    self.context.add_error(id, format!("unknown ID '{name}'"), ErrorPriority::Normal);
                }
            }
            [single] => {
                debug!("[resolver] name '{name}' -> {single:?}");
                let single = *single;
                if let ExpressionKind::Name { resolved, .. } = &mut self.context.expression_mut(id).kind {
                    *resolved = Some(single);
                }
                self.modified = true;
            }
            _ if inside_call => {}
            _ => {
                self.context.add_error(id, format!("ID '{name}' is ambiguous"), ErrorPriority::Normal);
            }
        }
    }

    /* ----- types ----- */

    fn visit_type(&mut self, id: NodeId) {
        let TypeKind::Name { id: name, resolved } = self.context.utype(id).kind.clone() else {
            return;
        };
        if resolved.is_some() {
            return;
        }

        let lookup = self.context.lookup_id(id, &name);
        let mut candidates = lookup
            .candidates
            .into_iter()
            .filter(|candidate| self.context.is_declaration(*candidate) && self.context.declaration(*candidate).kind.is_type());

        let Some(declaration) = candidates.next() else { return };

        debug!("[resolver] type name '{name}' -> {declaration:?}");
        if let TypeKind::Name { resolved, .. } = &mut self.context.utype_mut(id).kind {
            *resolved = Some(declaration);
        }
        self.modified = true;

        // On-heap types are transparently used through a value reference.
        let target = self.context.follow(id);
        if target != id && matches!(self.context.utype(target).kind, TypeKind::Struct { .. } | TypeKind::Unit(_)) {
            self.wrap_on_heap(id);
        }
    }

    /// Rewraps `qt(name)` as `qt(value_ref(qt(name)))` exactly once
    fn wrap_on_heap(&mut self, name_type: NodeId) {
        let Some(qt) = self.context.parent(name_type) else { return };
        if !matches!(self.context.node(qt).kind, NodeKind::QualifiedType(_)) {
            return;
        }
        // Already wrapped if the qualified type's parent is a value_ref.
        if let Some(grandparent) = self.context.parent(qt) {
            if matches!(&self.context.node(grandparent).kind, NodeKind::Type(ty) if matches!(ty.kind, TypeKind::ValueReference)) {
                return;
            }
        }

        let slot = 0;
        let Some(detached) = self.context.detach_child(qt, slot) else { return };
        let mut builder = Builder::new(self.context);
        let inner_qt = builder.qtype(detached, Constness::NonConst, Side::Rhs);
        let wrapper = builder.value_reference_type(inner_qt);
        self.context.set_child(qt, slot, Some(wrapper));
        self.modified = true;
        debug!("[resolver] wrapped on-heap type in value_ref");
    }

    /* ----- ctors ----- */

    fn visit_ctor(&mut self, id: NodeId) {
        let kind = self.context.ctor(id).kind.clone();
        match kind {
            CtorKind::List | CtorKind::Vector | CtorKind::Set => self.infer_container_elements(id),
            CtorKind::Map => self.infer_map_entries(id),
            CtorKind::Tuple => self.infer_tuple_type(id),
            CtorKind::Struct { ids } => self.infer_struct_type(id, ids),
            _ => {}
        }
    }

    /// True if the ctor's declared element type is still a placeholder
    fn ctor_needs_element(&self, ctor: NodeId) -> bool {
        let Some(qt) = self.context.ctor_type(ctor) else { return false };
        let inner = self.context.inner_type(qt);
        match self.context.element_type(inner) {
            Some(element) => matches!(self.context.utype(self.context.inner_type(element)).kind, TypeKind::Auto),
            None => matches!(self.context.utype(inner).kind, TypeKind::Auto),
        }
    }

    /// The common type of a ctor's value expressions, or an error
    fn common_element_type(&mut self, ctor: NodeId, values: &[NodeId]) -> Option<NodeId> {
        let first = self.context.expression_type(*values.first()?)?;
        for value in &values[1..] {
            let ty = self.context.expression_type(*value)?;
            if !self
                .context
                .same_type(self.context.inner_type(first), self.context.inner_type(ty))
            {
                self.context.add_error(ctor, "container elements have inconsistent types", ErrorPriority::Normal);
                return None;
            }
        }
        Some(first)
    }

    fn infer_container_elements(&mut self, id: NodeId) {
        if !self.ctor_needs_element(id) {
            return;
        }
        let values = self.context.ctor_values(id);
        if values.is_empty() {
            return; // stays unknown; outer context must constrain it
        }
        let Some(element) = self.common_element_type(id, &values) else { return };

        let element_copy = self.context.deep_copy(element);
        let kind = self.context.ctor(id).kind.clone();
        let mut builder = Builder::new(self.context);
        let container = match kind {
            CtorKind::List => builder.list_type(element_copy),
            CtorKind::Vector => builder.vector_type(element_copy),
            _ => builder.set_type(element_copy),
        };
        let qt = builder.qtype_const(container);
        self.context.set_child(id, 0, Some(qt));
        self.modified = true;
    }

    fn infer_map_entries(&mut self, id: NodeId) {
        if !self.ctor_needs_element(id) {
            return;
        }
        let entries = self.context.ctor_values(id);
        if entries.is_empty() {
            return;
        }
        let keys: Vec<NodeId> = entries.iter().step_by(2).copied().collect();
        let values: Vec<NodeId> = entries.iter().skip(1).step_by(2).copied().collect();
        let Some(key) = self.common_element_type(id, &keys) else { return };
        let Some(value) = self.common_element_type(id, &values) else { return };

        let key_copy = self.context.deep_copy(key);
        let value_copy = self.context.deep_copy(value);
        let mut builder = Builder::new(self.context);
        let map = builder.map_type(key_copy, value_copy);
        let qt = builder.qtype_const(map);
        self.context.set_child(id, 0, Some(qt));
        self.modified = true;
    }

    fn infer_tuple_type(&mut self, id: NodeId) {
        let Some(qt) = self.context.ctor_type(id) else { return };
        if !matches!(self.context.utype(self.context.inner_type(qt)).kind, TypeKind::Auto) {
            return;
        }

        let values = self.context.ctor_values(id);
        let mut elements = Vec::new();
        for value in &values {
            let Some(ty) = self.context.expression_type(*value) else { return };
            elements.push(self.context.deep_copy(ty));
        }

        let mut builder = Builder::new(self.context);
        let tuple = builder.tuple_type(elements.into_iter().map(|element| (None, element)).collect());
        let new_qt = builder.qtype_const(tuple);
        self.context.set_child(id, 0, Some(new_qt));
        self.modified = true;
    }

    fn infer_struct_type(&mut self, id: NodeId, ids: Vec<ID>) {
        let Some(qt) = self.context.ctor_type(id) else { return };
        if !matches!(self.context.utype(self.context.inner_type(qt)).kind, TypeKind::Auto) {
            return;
        }

        let values = self.context.ctor_values(id);
        let mut fields = Vec::new();
        for (field_id, value) in ids.iter().zip(&values) {
            let Some(ty) = self.context.expression_type(*value) else { return };
            let ty_copy = self.context.deep_copy(ty);
            let mut builder = Builder::new(self.context);
            fields.push(builder.field_decl(field_id.clone(), ty_copy, None, None));
        }

        let mut builder = Builder::new(self.context);
        let anonymous = builder.struct_type(Vec::new(), fields);
        let new_qt = builder.qtype_const(anonymous);
        self.context.set_child(id, 0, Some(new_qt));
        self.modified = true;
        debug!("[resolver] synthesized anonymous struct type for ctor");
    }

    /* ----- operators ----- */

    fn resolve_operator(&mut self, id: NodeId, kind: Kind) -> Result<()> {
        let operands = self.context.operator_operands(id);

        // Every operand needs a type before matching can start; names inside
        // calls resolve through the candidate sets instead.
        let operand_types: Vec<Option<NodeId>> = operands.iter().map(|operand| self.context.expression_type(*operand)).collect();

        match kind {
            Kind::Call => self.resolve_call(id, &operands, &operand_types),
            Kind::Cast => self.resolve_cast(id, &operands, &operand_types),
            _ => {
                if operand_types.iter().any(Option::is_none) {
                    return Ok(());
                }
                let candidates: Vec<usize> = match kind {
                    Kind::MemberCall => {
                        let member = operands.get(1).and_then(|operand| match &self.context.expression(*operand).kind {
                            ExpressionKind::Member { id } => Some(id.clone()),
                            _ => None,
                        });
                        match member {
                            Some(member) => self.registry.by_method(member.local()).to_vec(),
                            None => Vec::new(),
                        }
                    }
                    _ => self.registry.by_kind(kind).to_vec(),
                };
                self.resolve_against_candidates(id, kind, &operands, candidates)
            }
        }
    }

    /// Finds the matches for the candidate set across the style ladder and
    /// commits if the match is unique
    fn resolve_against_candidates(&mut self, id: NodeId, kind: Kind, operands: &[NodeId], candidates: Vec<usize>) -> Result<()> {
        if candidates.is_empty() {
            self.context.add_error(id, format!("no operator '{kind}' defined for these operands"), ErrorPriority::Low);
            return Ok(());
        }

        for style in matching_styles() {
            let mut matches = Vec::new();
            for candidate in &candidates {
                if let Some(coercions) = self.try_match(*candidate, operands, style) {
                    matches.push((*candidate, coercions, false));
                } else if kind.is_commutative() && operands.len() == 2 {
                    let swapped = [operands[1], operands[0]];
                    if let Some(coercions) = self.try_match(*candidate, &swapped, style) {
                        matches.push((*candidate, coercions, true));
                    }
                }
            }

            match matches.len() {
                0 => continue,
                1 => {
                    let (operator, coercions, swapped) = matches.remove(0);
                    self.commit_operator(id, kind, operator, operands, coercions, swapped)?;
                    return Ok(());
                }
                _ => {
                    let signatures = matches
                        .iter()
                        .map(|(operator, _, _)| self.registry.operator(*operator).render_signature())
                        .collect::<Vec<_>>()
                        .join("; ");
                    self.context.add_error(
                        id,
                        format!("operator usage is ambiguous, candidates: {signatures}"),
                        ErrorPriority::Normal,
                    );
                    return Ok(());
                }
            }
        }

        self.context.add_error(id, format!("no matching operator '{kind}' for these operands"), ErrorPriority::Normal);
        Ok(())
    }

    /// Tries one candidate under one style; returns per-operand replacements
    fn try_match(&mut self, operator: usize, operands: &[NodeId], style: CoercionStyle) -> Option<Vec<Option<NodeId>>> {
        let descriptor = self.registry.operator(operator);
        let specs = descriptor.materialized.clone()?;

        let required = descriptor.operands.iter().filter(|operand| !operand.optional).count();
        if operands.len() < required || operands.len() > specs.len() {
            return None;
        }

        let mut replacements = Vec::new();
        for (operand, spec) in operands.iter().zip(specs.iter()) {
            match spec {
                None => replacements.push(None),
                Some(signature_qt) => {
                    let src = self.context.expression_type(*operand)?;
                    let signature_qt = *signature_qt;
                    match coercer::coerce_expression(self.context, Some(self.plugins), *operand, src, signature_qt, style)? {
                        Coerced::Unchanged => replacements.push(None),
                        Coerced::Replaced(new_operand) => replacements.push(Some(new_operand)),
                    }
                }
            }
        }
        Some(replacements)
    }

    /// Replaces the unresolved node with its resolved form. Operands end up
    /// in signature order; a commutative match that succeeded swapped keeps
    /// the swapped order.
    fn commit_operator(
        &mut self,
        id: NodeId,
        kind: Kind,
        operator: usize,
        operands: &[NodeId],
        coercions: Vec<Option<NodeId>>,
        swapped: bool,
    ) -> Result<()> {
        let ordered: Vec<NodeId> = match swapped && operands.len() == 2 {
            true => vec![operands[1], operands[0]],
            false => operands.to_vec(),
        };

        // Compute the result first; if it is not derivable yet, leave the
        // node unresolved for a later round without touching the tree.
        let operand_types: Vec<Option<NodeId>> = ordered.iter().map(|operand| self.context.expression_type(*operand)).collect();
        let Some(result) = self.compute_result(operator, &ordered, &operand_types) else {
            return Ok(());
        };

        let mut final_operands = Vec::new();
        for (operand, replacement) in ordered.iter().zip(coercions.into_iter()) {
            match replacement {
                Some(new_operand) => final_operands.push(new_operand),
                None => {
                    self.context.remove_child(id, *operand);
                    final_operands.push(*operand);
                }
            }
        }

        let descriptor_name = self.registry.operator(operator).name();
        debug!("[resolver] resolved operator {descriptor_name}");

        let mut builder = Builder::new(self.context);
        let resolved = builder.expr_resolved_operator(kind, operator, result, final_operands);
        self.context.replace_child(id, resolved);
        self.modified = true;
        Ok(())
    }

    /// Computes the result type for a matched operator, handling the
    /// expression-dependent specs the table cannot express
    fn compute_result(&mut self, operator: usize, operands: &[NodeId], operand_types: &[Option<NodeId>]) -> Option<NodeId> {
        let spec = self.registry.operator(operator).result.clone();
        match &spec {
            ResultSpec::MemberOf => self.member_result(operands, operand_types, false),
            ResultSpec::TryMemberOf => self.member_result(operands, operand_types, true),
            ResultSpec::CallResult => {
                let callee_ty = (*operand_types.first()?)?;
                let inner = self.context.inner_type(callee_ty);
                let result = self.context.result_type(inner)?;
                Some(self.context.deep_copy(result))
            }
            ResultSpec::TypeOperand(index) => {
                let target = self.type_operand(operands, *index)?;
                let copy = self.context.deep_copy(target);
                match self.registry.operator(operator).kind {
                    Kind::New => {
                        let mut builder = Builder::new(self.context);
                        let reference = builder.strong_reference_type(copy);
                        Some(builder.qtype_nonconst(reference))
                    }
                    _ => Some(copy),
                }
            }
            other => crate::operators::signature::compute_result(self.context, other, operand_types),
        }
    }

    /// The declared type named by a type operand (a name bound to a type
    /// declaration, or an explicitly wrapped type)
    fn type_operand(&self, operands: &[NodeId], index: usize) -> Option<NodeId> {
        let operand = *operands.get(index)?;
        match &self.context.expression(operand).kind {
            ExpressionKind::Name { resolved: Some(declaration), .. } => {
                let declaration = *declaration;
                match self.context.declaration(declaration).kind.is_type() {
                    true => self.context.declaration_type(declaration),
                    false => None,
                }
            }
            ExpressionKind::TypeWrapped => self.context.child(operand, 1),
            _ => None,
        }
    }

    fn member_result(&mut self, operands: &[NodeId], operand_types: &[Option<NodeId>], wrap_optional: bool) -> Option<NodeId> {
        let object_ty = (*operand_types.first()?)?;
        let member = operands.get(1).and_then(|operand| match &self.context.expression(*operand).kind {
            ExpressionKind::Member { id } => Some(id.clone()),
            _ => None,
        })?;

        // Member access is transparent through references.
        let mut inner = self.context.inner_type(object_ty);
        if self.context.utype(inner).is_reference_type() {
            if let Some(deref) = self.context.dereferenced_type(inner) {
                inner = self.context.inner_type(deref);
            }
        }
        let member_ty = match self.context.utype(inner).kind.clone() {
            TypeKind::Struct { .. } | TypeKind::Union => {
                let field = self
                    .context
                    .type_fields(inner)
                    .into_iter()
                    .find(|field| self.context.declaration(*field).id.local() == member.local())?;
                self.context.declaration_type(field)?
            }
            TypeKind::Unit(_) => {
                let field = self.context.unit_field_by_id(inner, &member)?;
                self.context.unit_item_type(field)?
            }
            TypeKind::Bitfield { width, bits } => {
                bits.iter().find(|bit| bit.id.local() == member.local())?;
                let mut builder = Builder::new(self.context);
                let ty = builder.uint_type(width as u16);
                return match wrap_optional {
                    false => Some(builder.qtype_const(ty)),
                    true => {
                        let qt = builder.qtype_nonconst(ty);
                        let optional = builder.optional_type(qt);
                        Some(builder.qtype_const(optional))
                    }
                };
            }
            TypeKind::Tuple { names } => {
                let index = names.iter().position(|name| name.as_ref().map(|id| id.local() == member.local()).unwrap_or(false))?;
                self.context.children(inner).nth(index)?
            }
            _ => return None,
        };

        let copy = self.context.deep_copy(member_ty);
        match wrap_optional {
            false => Some(copy),
            true => {
                let mut builder = Builder::new(self.context);
                let optional = builder.optional_type(copy);
                Some(builder.qtype_const(optional))
            }
        }
    }

    /* ----- calls ----- */

    fn resolve_call(&mut self, id: NodeId, operands: &[NodeId], operand_types: &[Option<NodeId>]) -> Result<()> {
        let candidates = self.registry.call_candidates(self.context, id);

        if candidates.external_non_public {
            self.context.add_error(
                id,
                "call is ambiguous: a matching declaration in another module is not public",
                ErrorPriority::Normal,
            );
            return Ok(());
        }

        if !candidates.declarations.is_empty() {
            return self.resolve_declared_call(id, operands, candidates.declarations);
        }

        if !candidates.builtins.is_empty() {
            if operand_types.iter().skip(1).any(Option::is_none) {
                return Ok(());
            }
            return self.resolve_against_candidates(id, Kind::Call, operands, candidates.builtins);
        }

        // The callee may still be unresolved; report only when the name
        // itself cannot resolve either.
        if let Some(callee) = operands.first() {
            if let ExpressionKind::Name { id: name, .. } = &self.context.expression(*callee).kind {
                self.context.add_error(id, format!("call to unknown function '{name}'"), ErrorPriority::Normal);
            }
        }
        Ok(())
    }

    /// Overload resolution over function declarations found in scope
    fn resolve_declared_call(&mut self, id: NodeId, operands: &[NodeId], declarations: Vec<NodeId>) -> Result<()> {
        let args: Vec<NodeId> = operands
            .get(1)
            .and_then(|tuple_expr| match &self.context.expression(*tuple_expr).kind {
                ExpressionKind::Ctor => self.context.child(*tuple_expr, 0).map(|ctor| self.context.ctor_values(ctor)),
                _ => None,
            })
            .unwrap_or_default();

        if args.iter().any(|arg| self.context.expression_type(*arg).is_none()) {
            return Ok(());
        }

        for style in [
            CoercionStyle::try_direct_match_for_function_call(),
            CoercionStyle::try_all_for_function_call(),
        ] {
            let mut matches = Vec::new();
            for declaration in &declarations {
                if self.call_matches(*declaration, &args, style) {
                    matches.push(*declaration);
                }
            }

            match matches.len() {
                0 => continue,
                1 => return self.commit_declared_call(id, operands, matches[0]),
                _ => {
                    // Hooks are intentionally multi-dispatch: all matches
                    // naming the same hook are fine.
                    let all_hooks = matches.iter().all(|declaration| self.is_hook(*declaration));
                    let first_id = self.context.declaration(matches[0]).id.clone();
                    let same_target = matches.iter().all(|declaration| self.context.declaration(*declaration).id == first_id);
                    if all_hooks && same_target {
                        return self.commit_declared_call(id, operands, matches[0]);
                    }

                    let signatures = matches
                        .iter()
                        .map(|declaration| self.context.declaration(*declaration).id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ");
                    self.context.add_error(id, format!("call is ambiguous between: {signatures}"), ErrorPriority::Normal);
                    return Ok(());
                }
            }
        }

        self.context.add_error(id, "no matching function overload for these arguments", ErrorPriority::Normal);
        Ok(())
    }

    fn is_hook(&self, declaration: NodeId) -> bool {
        match &self.context.declaration(declaration).kind {
            DeclarationKind::UnitHook { .. } => true,
            DeclarationKind::Function => {
                let Some(ftype) = self.context.declaration_type(declaration) else { return false };
                matches!(
                    self.context.utype(self.context.inner_type(ftype)).kind,
                    TypeKind::Function { flavor: crate::ast::types::FunctionFlavor::Hook }
                )
            }
            _ => false,
        }
    }

    fn call_matches(&mut self, declaration: NodeId, args: &[NodeId], style: CoercionStyle) -> bool {
        let Some(ftype_qt) = self.context.declaration_type(declaration) else { return false };
        let ftype = self.context.inner_type(ftype_qt);
        let parameters = self.context.type_parameters(ftype);

        let required = parameters
            .iter()
            .filter(|parameter| self.context.declaration_value(**parameter).is_none())
            .count();
        if args.len() < required || args.len() > parameters.len() {
            return false;
        }

        for (arg, parameter) in args.iter().zip(parameters) {
            let Some(src) = self.context.expression_type(*arg) else { return false };
            let Some(dst) = self.context.declaration_type(parameter) else { return false };
            if !coercer::match_type(self.context, Some(self.plugins), src, dst, style) {
                return false;
            }
        }
        true
    }

    fn commit_declared_call(&mut self, id: NodeId, operands: &[NodeId], declaration: NodeId) -> Result<()> {
        // Bind the callee name to the chosen declaration.
        if let Some(callee) = operands.first() {
            if let ExpressionKind::Name { resolved, .. } = &mut self.context.expression_mut(*callee).kind {
                if resolved.is_none() {
                    *resolved = Some(declaration);
                    self.modified = true;
                }
            }
        }

        let Some(call_operator) = self.registry.by_name("function::Call") else {
            return Ok(());
        };

        let Some(ftype_qt) = self.context.declaration_type(declaration) else { return Ok(()) };
        let ftype = self.context.inner_type(ftype_qt);
        let Some(result) = self.context.result_type(ftype) else { return Ok(()) };
        let result = self.context.deep_copy(result);

        let mut detached = Vec::new();
        for operand in operands {
            self.context.remove_child(id, *operand);
            detached.push(*operand);
        }

        let mut builder = Builder::new(self.context);
        let resolved = builder.expr_resolved_operator(Kind::Call, call_operator, result, detached);
        self.context.replace_child(id, resolved);
        self.modified = true;
        Ok(())
    }

    /* ----- cast ----- */

    /// `cast<T>(e)` gets a privileged coerced match that bypasses operator
    /// lookup whenever a coercion to the target type succeeds
    fn resolve_cast(&mut self, id: NodeId, operands: &[NodeId], operand_types: &[Option<NodeId>]) -> Result<()> {
        let Some(value_ty) = operand_types.first().copied().flatten() else { return Ok(()) };
        let Some(target) = self.type_operand(operands, 1) else { return Ok(()) };

        let style = CoercionStyle::TRY_EXACT_MATCH
            | CoercionStyle::TRY_CONST_PROMOTION
            | CoercionStyle::TRY_COERCION
            | CoercionStyle::CONTEXTUAL_CONVERSION;

        let value = operands[0];
        let target = {
            // Work on a copy so the ctor coercion can own the target type.
            self.context.deep_copy(target)
        };

        match coercer::coerce_expression(self.context, Some(self.plugins), value, value_ty, target, style) {
            Some(Coerced::Unchanged) => {
                self.context.remove_child(id, value);
                let result = self.context.deep_copy(target);
                let cast_operator = self.registry.by_name("generic::Cast").unwrap_or_default();
                let mut builder = Builder::new(self.context);
                let resolved = builder.expr_resolved_operator(Kind::Cast, cast_operator, result, vec![value]);
                self.context.replace_child(id, resolved);
                self.modified = true;
            }
            Some(Coerced::Replaced(new_value)) => {
                let result = self.context.deep_copy(target);
                let cast_operator = self.registry.by_name("generic::Cast").unwrap_or_default();
                let mut builder = Builder::new(self.context);
                let resolved = builder.expr_resolved_operator(Kind::Cast, cast_operator, result, vec![new_value]);
                self.context.replace_child(id, resolved);
                self.modified = true;
            }
            None => {
                self.context.add_error(id, "cannot cast value to target type", ErrorPriority::Normal);
            }
        }
        Ok(())
    }

    /* ----- assignments ----- */

    fn rewrite_assignment(&mut self, id: NodeId) {
        let Some(target) = self.context.child(id, 0) else { return };
        let Some(source) = self.context.child(id, 1) else { return };

        // `x[i] = v` becomes IndexAssign(x, i, v).
        let target_kind = self.context.expression(target).kind.clone();
        if let ExpressionKind::UnresolvedOperator { kind: Kind::Index } | ExpressionKind::ResolvedOperator { kind: Kind::Index, .. } = &target_kind {
            let index_operands = self.context.operator_operands(target);
            if index_operands.len() == 2 {
                let object = index_operands[0];
                let index = index_operands[1];
                self.context.remove_child(target, object);
                self.context.remove_child(target, index);
                self.context.remove_child(id, source);

                let mut builder = Builder::new(self.context);
                let rewritten = builder.expr_unresolved_operator(Kind::IndexAssign, vec![object, index, source]);
                self.context.replace_child(id, rewritten);
                self.modified = true;
                debug!("[resolver] rewrote indexed assignment to IndexAssign");
                return;
            }
        }

        // Tuple targets route through the dedicated custom-assign operator,
        // preserving per-element constness.
        let is_tuple_target = match &target_kind {
            ExpressionKind::Ctor => self
                .context
                .child(target, 0)
                .map(|ctor| self.context.ctor(ctor).kind.is_tuple())
                .unwrap_or(false),
            _ => false,
        };
        if is_tuple_target {
            self.context.remove_child(id, target);
            self.context.remove_child(id, source);
            let mut builder = Builder::new(self.context);
            let rewritten = builder.expr_unresolved_operator(Kind::CustomAssign, vec![target, source]);
            self.context.replace_child(id, rewritten);
            self.modified = true;
            debug!("[resolver] rewrote tuple assignment to CustomAssign");
            return;
        }

        // Assigning through a const member re-resolves it as non-const.
        if let ExpressionKind::ResolvedOperator { kind: Kind::Member, .. } = &target_kind {
            if let Some(result) = self.context.child(target, 0) {
                if self.context.qtype(result).constness == Constness::Const {
                    self.context.qtype_mut(result).constness = Constness::NonConst;
                    self.modified = true;
                }
            }
        }

        // Coerce the source against the target type.
        let (Some(target_ty), Some(source_ty)) = (self.context.expression_type(target), self.context.expression_type(source)) else {
            return;
        };
        match coercer::coerce_expression(
            self.context,
            Some(self.plugins),
            source,
            source_ty,
            target_ty,
            CoercionStyle::try_all_for_assignment(),
        ) {
            Some(Coerced::Unchanged) => {}
            Some(Coerced::Replaced(new_source)) => {
                self.context.replace_child(source, new_source);
                self.modified = true;
            }
            None => {
                self.context.add_error(id, "cannot coerce assignment source to the target's type", ErrorPriority::Normal);
            }
        }
    }

    fn resolve_pending_coerced(&mut self, id: NodeId) {
        let (Some(inner), Some(target)) = (self.context.child(id, 0), self.context.child(id, 1)) else { return };
        let Some(src) = self.context.expression_type(inner) else { return };

        match coercer::coerce_expression(self.context, Some(self.plugins), inner, src, target, CoercionStyle::try_all_for_assignment()) {
            Some(Coerced::Unchanged) => {
                self.context.detach_child(id, 0);
                self.context.replace_child(id, inner);
                self.modified = true;
            }
            Some(Coerced::Replaced(new_inner)) => {
                self.context.replace_child(id, new_inner);
                self.modified = true;
            }
            None => {
                self.context.add_error(id, "queued coercion cannot be materialized", ErrorPriority::Normal);
            }
        }
    }

    fn resolve_comprehension(&mut self, id: NodeId) {
        let Some(ty_slot) = self.context.child(id, 0) else { return };
        if !matches!(self.context.utype(self.context.inner_type(ty_slot)).kind, TypeKind::Auto) {
            return;
        }

        // The local's type comes from the input container's element type;
        // the comprehension's type is a list of the output type.
        if let (Some(input), Some(local)) = (self.context.child(id, 1), self.context.child(id, 2)) {
            if let Some(input_ty) = self.context.expression_type(input) {
                if let Some(element) = self.context.element_type(self.context.inner_type(input_ty)) {
                    if let Some(local_ty) = self.context.declaration_type(local) {
                        if matches!(self.context.utype(self.context.inner_type(local_ty)).kind, TypeKind::Auto) {
                            self.auto_updates.insert(local_ty, element);
                        }
                    }
                }
            }
        }

        if let Some(output) = self.context.child(id, 3) {
            if let Some(output_ty) = self.context.expression_type(output) {
                let element = self.context.deep_copy(output_ty);
                let mut builder = Builder::new(self.context);
                let list = builder.list_type(element);
                let qt = builder.qtype_const(list);
                self.context.set_child(id, 0, Some(qt));
                self.modified = true;
            }
        }
    }

    /* ----- declarations ----- */

    fn visit_declaration(&mut self, module: NodeId, id: NodeId) -> Result<()> {
        match self.context.declaration(id).kind.clone() {
            DeclarationKind::ImportedModule(import) => self.execute_import(module, id, import),
            DeclarationKind::GlobalVariable | DeclarationKind::LocalVariable | DeclarationKind::Constant | DeclarationKind::Parameter(_) => {
                self.infer_declaration_auto(id);
                self.coerce_initializer(id);
                Ok(())
            }
            DeclarationKind::Function => {
                self.infer_function_return(id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Lazily executes an import the first time the resolver sees it
    fn execute_import(&mut self, module: NodeId, id: NodeId, import: crate::ast::declaration::ImportedModule) -> Result<()> {
        if import.resolved_uid.is_some() {
            return Ok(());
        }

        let result = self.context.import_module(
            self.plugins,
            &import.module_id,
            import.scope.as_ref(),
            &import.parse_extension,
            import.process_extension.as_deref(),
            &import.search_dirs,
        );

        match result {
            Ok(uid) => {
                debug!("[resolver] import '{}' -> {}", import.module_id, uid);
                if let DeclarationKind::ImportedModule(payload) = &mut self.context.declaration_mut(id).kind {
                    payload.resolved_uid = Some(uid.clone());
                }
                let dependencies = &mut self.context.module_decl_mut(module).dependencies;
                if !dependencies.contains(&uid) {
                    dependencies.push(uid);
                }
                self.modified = true;
                Ok(())
            }
            Err(CompileError::ImportNotFound(inner)) => {
                self.context
                    .add_error(id, format!("cannot find module '{}'", inner.module), ErrorPriority::High);
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Queues `auto` replacement from the declaration's initializer
    fn infer_declaration_auto(&mut self, id: NodeId) {
        let Some(ty) = self.context.declaration_type(id) else { return };
        if !matches!(self.context.utype(self.context.inner_type(ty)).kind, TypeKind::Auto) {
            return;
        }
        let Some(init) = self.context.declaration_value(id) else { return };
        let Some(init_ty) = self.context.expression_type(init) else { return };

        if let Some(previous) = self.auto_updates.get(&ty) {
            if !self.context.same_type(self.context.inner_type(*previous), self.context.inner_type(init_ty)) {
                self.context.add_error(id, "conflicting types inferred for 'auto' declaration", ErrorPriority::Normal);
            }
            return;
        }
        self.auto_updates.insert(ty, init_ty);
    }

    /// Coerces a variable initializer against the declared type
    fn coerce_initializer(&mut self, id: NodeId) {
        let Some(ty) = self.context.declaration_type(id) else { return };
        if matches!(self.context.utype(self.context.inner_type(ty)).kind, TypeKind::Auto) {
            return;
        }
        let Some(init) = self.context.declaration_value(id) else { return };
        let Some(init_ty) = self.context.expression_type(init) else { return };

        if self
            .context
            .same_type(self.context.inner_type(ty), self.context.inner_type(init_ty))
        {
            return;
        }

        match coercer::coerce_expression(
            self.context,
            Some(self.plugins),
            init,
            init_ty,
            ty,
            CoercionStyle::try_all_for_assignment(),
        ) {
            Some(Coerced::Unchanged) => {}
            Some(Coerced::Replaced(new_init)) => {
                self.context.replace_child(init, new_init);
                self.modified = true;
            }
            None => {
                self.context.add_error(id, "cannot coerce initializer to the declared type", ErrorPriority::Normal);
            }
        }
    }

    /// Infers an `auto` function return type from a resolved `return`
    fn infer_function_return(&mut self, id: NodeId) {
        let Some(function) = self.context.child(id, 0) else { return };
        let Some(ftype_qt) = self.context.child(function, 0) else { return };
        let ftype = self.context.inner_type(ftype_qt);
        let Some(result) = self.context.result_type(ftype) else { return };
        if !matches!(self.context.utype(self.context.inner_type(result)).kind, TypeKind::Auto) {
            return;
        }

        let Some(body) = self.context.child(function, 1) else { return };
        for node in visitor::post_order(self.context, body) {
            if !self.context.is_statement(node) || !matches!(self.context.statement(node).kind, StatementKind::Return) {
                continue;
            }
            let Some(value) = self.context.child(node, 0) else { continue };
            if let Some(value_ty) = self.context.expression_type(value) {
                self.auto_updates.insert(result, value_ty);
                return;
            }
        }
    }

    /* ----- statements ----- */

    fn visit_statement(&mut self, id: NodeId) {
        match self.context.statement(id).kind.clone() {
            StatementKind::If => self.coerce_condition(id, 1),
            StatementKind::While => self.coerce_condition(id, 1),
            StatementKind::Assert => self.coerce_condition(id, 0),
            StatementKind::For => self.type_for_local(id),
            StatementKind::Switch => self.preprocess_switch(id),
            _ => {}
        }
    }

    /// Conditions convert to bool under contextual conversion
    fn coerce_condition(&mut self, id: NodeId, slot: usize) {
        let Some(condition) = self.context.child(id, slot) else { return };
        let Some(condition_ty) = self.context.expression_type(condition) else { return };

        if matches!(self.context.utype(self.context.inner_type(condition_ty)).kind, TypeKind::Bool) {
            return;
        }

        let mut builder = Builder::new(self.context);
        let bool_ty = builder.bool_type();
        let target = builder.qtype_const(bool_ty);

        let style = CoercionStyle::try_all_for_assignment() | CoercionStyle::CONTEXTUAL_CONVERSION;
        match coercer::coerce_expression(self.context, Some(self.plugins), condition, condition_ty, target, style) {
            Some(Coerced::Unchanged) => {}
            Some(Coerced::Replaced(new_condition)) => {
                self.context.replace_child(condition, new_condition);
                self.modified = true;
            }
            None => {
                self.context.add_error(condition, "condition cannot convert to bool", ErrorPriority::Normal);
            }
        }
    }

    /// The for-loop local takes the sequence's element type
    fn type_for_local(&mut self, id: NodeId) {
        let (Some(local), Some(sequence)) = (self.context.child(id, 0), self.context.child(id, 1)) else { return };
        let Some(local_ty) = self.context.declaration_type(local) else { return };
        if !matches!(self.context.utype(self.context.inner_type(local_ty)).kind, TypeKind::Auto) {
            return;
        }
        let Some(sequence_ty) = self.context.expression_type(sequence) else { return };
        let inner = self.context.inner_type(sequence_ty);
        let element = self
            .context
            .iterator_type(inner)
            .map(|iterator| self.context.inner_type(iterator))
            .and_then(|iterator| self.context.dereferenced_type(iterator))
            .or_else(|| self.context.element_type(inner));
        if let Some(element) = element {
            self.auto_updates.insert(local_ty, element);
        }
    }

    /// Rewrites each case expression into `<condition> == <case>` so normal
    /// overload resolution applies
    fn preprocess_switch(&mut self, id: NodeId) {
        let Some(condition) = self.context.child(id, 0) else { return };
        let condition_id = match self.context.is_declaration(condition) {
            true => self.context.declaration(condition).id.clone(),
            false => return,
        };

        let cases: Vec<NodeId> = self.context.children(id).skip(1).collect();
        for case in cases {
            let StatementKind::SwitchCase { preprocessed } = self.context.statement(case).kind.clone() else { continue };
            if preprocessed {
                continue;
            }

            let expressions: Vec<NodeId> = self.context.children(case).skip(1).collect();
            for expression in expressions {
                self.context.remove_child(case, expression);
                let mut builder = Builder::new(self.context);
                let lhs = builder.expr_name(condition_id.clone());
                let comparison = builder.expr_unresolved_operator(Kind::Equal, vec![lhs, expression]);
                self.context.attach_child(case, comparison);
            }

            if let StatementKind::SwitchCase { preprocessed } = &mut self.context.statement_mut(case).kind {
                *preprocessed = true;
            }
            self.modified = true;
            debug!("[resolver] preprocessed switch case against condition '{condition_id}'");
        }
    }

    /* ----- auto application ----- */

    /// Applies the queued `auto` replacements (the second pass of auto
    /// propagation)
    fn apply_auto_updates(&mut self) {
        let updates: Vec<(NodeId, NodeId)> = self.auto_updates.drain(..).collect();
        for (auto_qt, inferred) in updates {
            let inferred_inner = self.context.inner_type(inferred);
            if matches!(self.context.utype(inferred_inner).kind, TypeKind::Auto | TypeKind::Unknown) {
                continue;
            }
            let copy = self.context.deep_copy(inferred_inner);
            self.context.set_child(auto_qt, 0, Some(copy));
            self.modified = true;
            debug!("[resolver] applied auto inference");
        }
    }
}

/// Resolves `self` keyword expressions against the enclosing type scope;
/// kept here because it runs as part of the standard visitor
pub fn keyword_name(keyword: Keyword) -> &'static str {
    match keyword {
        Keyword::Self_ => "self",
        Keyword::DollarDollar => "$$",
        Keyword::Scope => "scope",
    }
}
