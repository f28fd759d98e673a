//! Operator storage, indexing, and the pending-materialization drain.

use indexmap::IndexMap;
use simplelog::debug;

use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::expression::ExpressionKind;
use crate::ast::id::ID;
use crate::ast::node::NodeId;
use crate::ast::types::{Constness, Side};
use crate::operators::signature::{Operand, OperandKind, ResultSpec};
use crate::operators::Kind;

/// A registered operator descriptor
#[derive(Debug, Clone)]
pub struct Operator {
    pub kind: Kind,
    /// Namespace label, e.g. `signed_integer` or `map`
    pub namespace: &'static str,
    /// Documentation string carried through to generated docs
    pub doc: &'static str,
    pub operands: Vec<Operand>,
    pub result: ResultSpec,
    /// Method identifier, for `MemberCall` operators
    pub member_id: Option<&'static str>,
    /// Built-in function identifier, for `Call` operators
    pub builtin_id: Option<&'static str>,
    /// The operator stays pending until a declaration with this
    /// fully-qualified ID exists
    pub requires_type: Option<ID>,
    /// Materialized operand types (qualified type nodes); `None` entries
    /// match any operand
    pub materialized: Option<Vec<Option<NodeId>>>,
}

impl Operator {
    /// The registry key, e.g. `map::IndexAssign` or `unit::offset`
    pub fn name(&self) -> String {
        match self.member_id {
            Some(member) => format!("{}::{}", self.namespace, member),
            None => format!("{}::{}", self.namespace, self.kind),
        }
    }

    /// A short human-readable signature used in ambiguity diagnostics
    pub fn render_signature(&self) -> String {
        let operands = self
            .operands
            .iter()
            .map(|operand| match (&operand.id, &operand.ty) {
                (Some(id), Some(ty)) => format!("{id}: {ty:?}"),
                (Some(id), None) => format!("{id}: any"),
                (None, Some(ty)) => format!("{ty:?}"),
                (None, None) => String::from("any"),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name(), operands)
    }
}

/// Candidates for resolving an unresolved `Call`
#[derive(Debug, Default)]
pub struct CallCandidates {
    /// Matching built-in operators (registry indexes)
    pub builtins: Vec<usize>,
    /// Function declarations visible through scope lookup
    pub declarations: Vec<NodeId>,
    /// True when lookup crossed into another module's non-public
    /// declaration; the resolver must report ambiguity then
    pub external_non_public: bool,
}

/// The operator registry
#[derive(Debug, Default)]
pub struct Registry {
    operators: Vec<Operator>,
    pending: Vec<usize>,
    by_name: IndexMap<String, usize>,
    by_kind: IndexMap<Kind, Vec<usize>>,
    by_method: IndexMap<String, Vec<usize>>,
    by_builtin: IndexMap<String, Vec<usize>>,
}

impl Registry {
    /// A registry preloaded with the standard HILTI and Spicy tables
    pub fn standard() -> Self {
        let mut registry = Self::default();
        for operator in super::tables::standard_operators() {
            registry.register(operator);
        }
        registry
    }

    /// Submits an operator as pending
    pub fn register(&mut self, operator: Operator) {
        let index = self.operators.len();
        self.operators.push(operator);
        self.pending.push(index);
    }

    pub fn operator(&self, index: usize) -> &Operator {
        &self.operators[index]
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn by_kind(&self, kind: Kind) -> &[usize] {
        self.by_kind.get(&kind).map(|indexes| indexes.as_slice()).unwrap_or(&[])
    }

    pub fn by_method(&self, member: &str) -> &[usize] {
        self.by_method.get(member).map(|indexes| indexes.as_slice()).unwrap_or(&[])
    }

    pub fn by_builtin(&self, name: &str) -> &[usize] {
        self.by_builtin.get(name).map(|indexes| indexes.as_slice()).unwrap_or(&[])
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Attempts to materialize every pending operator against the live AST.
    /// Returns true if anything was materialized this round.
    pub fn init_pending(&mut self, context: &mut AstContext) -> bool {
        let mut changed = false;
        let mut still_pending = Vec::new();

        for index in std::mem::take(&mut self.pending) {
            let ready = match &self.operators[index].requires_type {
                Some(required) => type_exists(context, required),
                None => true,
            };

            if !ready {
                still_pending.push(index);
                continue;
            }

            self.materialize(context, index);
            changed = true;
        }

        self.pending = still_pending;
        changed
    }

    fn materialize(&mut self, context: &mut AstContext, index: usize) {
        let operands = self.operators[index].operands.clone();
        let holder = context.operator_holder();

        let mut builder = Builder::new(context);
        let signature = builder.operand_list_type(Vec::new());

        let mut materialized = Vec::new();
        for operand in &operands {
            match &operand.ty {
                Some(spec) => {
                    let ty = spec.materialize(&mut builder);
                    let (constness, side) = match operand.kind {
                        OperandKind::In => (Constness::Const, Side::Rhs),
                        OperandKind::InOut => (Constness::NonConst, Side::Lhs),
                        OperandKind::Copy | OperandKind::Unknown => (Constness::NonConst, Side::Rhs),
                    };
                    let qt = builder.qtype(ty, constness, side);
                    builder.context.attach_child(signature, qt);
                    materialized.push(Some(qt));
                }
                None => {
                    builder.context.attach_empty(signature);
                    materialized.push(None);
                }
            }
        }

        context.attach_child(holder, signature);

        let operator = &mut self.operators[index];
        operator.materialized = Some(materialized);

        let name = operator.name();
        debug!("[operator] materialized {}", name);
        self.by_name.insert(name, index);
        self.by_kind.entry(operator.kind).or_default().push(index);
        if let Some(member) = operator.member_id {
            self.by_method.entry(member.to_string()).or_default().push(index);
        }
        if let Some(builtin) = operator.builtin_id {
            self.by_builtin.entry(builtin.to_string()).or_default().push(index);
        }
    }

    /// Candidates for an unresolved `Call` operator: built-ins matching the
    /// callee name, or function declarations visible from the call site.
    pub fn call_candidates(&self, context: &AstContext, call: NodeId) -> CallCandidates {
        let mut candidates = CallCandidates::default();

        let operands = context.operator_operands(call);
        let Some(callee) = operands.first().copied() else { return candidates };

        let ExpressionKind::Name { id, .. } = &context.expression(callee).kind else {
            return candidates;
        };

        candidates.builtins = self.by_builtin(id.as_str()).to_vec();

        let lookup = context.lookup_id(call, id);
        candidates.external_non_public = lookup.external_non_public;
        for declaration in lookup.candidates {
            if context.is_declaration(declaration) && context.declaration(declaration).kind.is_function() {
                candidates.declarations.push(declaration);
            }
        }

        candidates
    }

    /// Internal-error check: after resolution no builtin may stay pending
    pub fn assert_no_pending(&self) {
        assert!(
            self.pending.is_empty(),
            "operators still pending after resolution: {:?}",
            self.pending.iter().map(|index| self.operators[*index].name()).collect::<Vec<_>>()
        );
    }
}

/// True if a declaration with the given fully-qualified ID exists
fn type_exists(context: &AstContext, id: &ID) -> bool {
    context
        .modules()
        .into_iter()
        .any(|module| !context.lookup_id(module, id).candidates.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::signature::TypeSpec;

    fn sample_operator() -> Operator {
        Operator {
            kind: Kind::Size,
            namespace: "bytes",
            doc: "Returns the number of bytes in the value.",
            operands: vec![Operand::new(OperandKind::In, TypeSpec::Bytes)],
            result: ResultSpec::Fixed(TypeSpec::UnsignedInteger(64), Constness::Const),
            member_id: None,
            builtin_id: None,
            requires_type: None,
            materialized: None,
        }
    }

    #[test]
    fn register_and_materialize() {
        let mut context = AstContext::default();
        let mut registry = Registry::default();
        registry.register(sample_operator());
        assert!(registry.has_pending());

        let changed = registry.init_pending(&mut context);
        assert!(changed);
        assert!(!registry.has_pending());
        assert_eq!(registry.by_kind(Kind::Size).len(), 1);
        assert!(registry.by_name("bytes::Size").is_some());
        registry.assert_no_pending();
    }

    #[test]
    fn pending_waits_for_required_type() {
        let mut context = AstContext::default();
        let mut registry = Registry::default();
        let mut operator = sample_operator();
        operator.requires_type = Some(ID::new("spicy_rt::Sink"));
        registry.register(operator);

        registry.init_pending(&mut context);
        assert!(registry.has_pending());
    }

    #[test]
    fn standard_table_materializes_fully() {
        let mut context = AstContext::default();
        let mut registry = Registry::standard();
        registry.init_pending(&mut context);
        registry.assert_no_pending();
        assert!(registry.len() > 50);
    }
}
