//! Grammars: production graphs synthesized from unit types.
//!
//! A grammar owns its productions in an arena and computes two fixed points
//! over them: nullability (bottom-up) and lookahead first sets. First sets
//! contain terminal production ids; a lookahead branch whose alternatives'
//! first sets intersect is ambiguous and reported as a grammar error.

use std::collections::BTreeSet;

use simplelog::debug;

use crate::ast::attribute::AttributeKind;
use crate::ast::context::AstContext;
use crate::ast::node::NodeId;
use crate::ast::types::TypeKind;
use crate::spicy::production::{Production, ProductionId, ProductionKind};
use crate::spicy::unit::UnitItem;

/// A unit's production graph
#[derive(Debug, Default)]
pub struct Grammar {
    pub name: String,
    productions: Vec<Production>,
    pub root: Option<ProductionId>,
    /// Nullability per production, computed bottom-up
    nullable: Vec<bool>,
    /// First sets per production: terminal production ids
    first: Vec<BTreeSet<ProductionId>>,
    /// Follow sets per production
    follow: Vec<BTreeSet<ProductionId>>,
    next_token_id: u64,
    /// Grammar-level problems found during construction or analysis
    pub errors: Vec<String>,
}

impl Grammar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            next_token_id: 1,
            ..Default::default()
        }
    }

    pub fn add(&mut self, production: Production) -> ProductionId {
        let id = ProductionId(self.productions.len());
        self.productions.push(production);
        id
    }

    pub fn production(&self, id: ProductionId) -> &Production {
        &self.productions[id.0]
    }

    pub fn production_mut(&mut self, id: ProductionId) -> &mut Production {
        &mut self.productions[id.0]
    }

    pub fn len(&self) -> usize {
        self.productions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.productions.is_empty()
    }

    pub fn fresh_token_id(&mut self) -> u64 {
        let id = self.next_token_id;
        self.next_token_id += 1;
        id
    }

    pub fn is_nullable(&self, id: ProductionId) -> bool {
        self.nullable.get(id.0).copied().unwrap_or(false)
    }

    pub fn first_set(&self, id: ProductionId) -> &BTreeSet<ProductionId> {
        &self.first[id.0]
    }

    pub fn follow_set(&self, id: ProductionId) -> &BTreeSet<ProductionId> {
        &self.follow[id.0]
    }

    /// Computes nullability and lookahead sets; records ambiguity errors
    pub fn finalize(&mut self) {
        self.compute_nullability();
        self.compute_first_sets();
        self.compute_follow_sets();
        self.check_lookahead_ambiguity();
    }

    /// Nullability propagates bottom-up to a fixed point
    fn compute_nullability(&mut self) {
        self.nullable = vec![false; self.productions.len()];
        loop {
            let mut changed = false;
            for index in 0..self.productions.len() {
                if self.nullable[index] {
                    continue;
                }
                let nullable = match &self.productions[index].kind {
                    ProductionKind::Epsilon => true,
                    // Repetitions may run zero times.
                    ProductionKind::Counter { .. } | ProductionKind::ForEach { .. } | ProductionKind::While { .. } => true,
                    ProductionKind::Sequence { elements } => elements.iter().all(|element| self.nullable[element.0]),
                    ProductionKind::Enclosure { inner } => self.nullable[inner.0],
                    ProductionKind::Resolved { target } => self.nullable[target.0],
                    ProductionKind::LookAhead { alternative0, alternative1 } => {
                        self.nullable[alternative0.0] || self.nullable[alternative1.0]
                    }
                    ProductionKind::Switch { cases, default, .. } => {
                        cases.iter().any(|(_, production)| self.nullable[production.0])
                            || default.map(|default| self.nullable[default.0]).unwrap_or(false)
                    }
                    _ => false,
                };
                if nullable {
                    self.nullable[index] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// First sets: the terminals that can begin each production
    fn compute_first_sets(&mut self) {
        self.first = vec![BTreeSet::new(); self.productions.len()];
        loop {
            let mut changed = false;
            for index in 0..self.productions.len() {
                let mut additions: BTreeSet<ProductionId> = BTreeSet::new();
                let production = &self.productions[index];

                if production.is_terminal() && !matches!(production.kind, ProductionKind::Epsilon) {
                    additions.insert(ProductionId(index));
                }

                for alternative in production.rhs_alternatives() {
                    for element in alternative {
                        additions.extend(self.first[element.0].iter().copied());
                        if !self.nullable[element.0] {
                            break;
                        }
                    }
                }

                let target = &mut self.first[index];
                let before = target.len();
                target.extend(additions);
                changed |= target.len() != before;
            }
            if !changed {
                break;
            }
        }
    }

    /// Follow sets over the sequence structure, seeded from the root
    fn compute_follow_sets(&mut self) {
        self.follow = vec![BTreeSet::new(); self.productions.len()];
        loop {
            let mut changed = false;
            for index in 0..self.productions.len() {
                let alternatives = self.productions[index].rhs_alternatives();
                for alternative in alternatives {
                    for (position, element) in alternative.iter().enumerate() {
                        let mut additions: BTreeSet<ProductionId> = BTreeSet::new();
                        let mut rest_nullable = true;
                        for follower in &alternative[position + 1..] {
                            additions.extend(self.first[follower.0].iter().copied());
                            if !self.nullable[follower.0] {
                                rest_nullable = false;
                                break;
                            }
                        }
                        if rest_nullable {
                            additions.extend(self.follow[index].iter().copied());
                        }

                        let target = &mut self.follow[element.0];
                        let before = target.len();
                        target.extend(additions);
                        changed |= target.len() != before;
                    }
                }
            }
            if !changed {
                break;
            }
        }
    }

    /// A lookahead with intersecting alternative first sets cannot decide
    fn check_lookahead_ambiguity(&mut self) {
        for index in 0..self.productions.len() {
            let ProductionKind::LookAhead { alternative0, alternative1 } = self.productions[index].kind else {
                continue;
            };
            let first0 = effective_lookahead(self, alternative0);
            let first1 = effective_lookahead(self, alternative1);
            if first0.intersection(&first1).next().is_some() {
                self.errors.push(format!(
                    "{}: look-ahead cannot depend on non-disjoint alternatives ({})",
                    self.name, self.productions[index].symbol
                ));
            }
        }
    }
}

/// The lookahead set of a production, falling back to its follow set when it
/// is nullable
fn effective_lookahead(grammar: &Grammar, id: ProductionId) -> BTreeSet<ProductionId> {
    let mut set = grammar.first_set(id).clone();
    if grammar.is_nullable(id) {
        set.extend(grammar.follow_set(id).iter().copied());
    }
    set
}

/// Builds the grammar for a unit type
pub fn build_unit_grammar(context: &AstContext, unit: NodeId, name: &str) -> Grammar {
    let mut grammar = Grammar::new(name);

    let mut elements = Vec::new();
    for item in context.unit_items(unit) {
        if let Some(production) = item_production(context, &mut grammar, item) {
            elements.push(production);
        }
    }

    let root = grammar.add(Production::new(format!("{name}_root"), ProductionKind::Sequence { elements }));
    grammar.root = Some(root);
    grammar.finalize();
    debug!("[parser-builder] grammar '{}' with {} productions", name, grammar.len());
    grammar
}

/// The production for one unit item, if it participates in parsing
fn item_production(context: &AstContext, grammar: &mut Grammar, item: NodeId) -> Option<ProductionId> {
    match context.unit_item(item).clone() {
        UnitItem::Field { id, skip } => {
            let symbol = id.as_ref().map(|id| id.local().to_string()).unwrap_or_else(|| format!("anon_{}", grammar.len()));
            let ty = context.unit_item_type(item)?;
            let attributes = context.unit_field_attributes(item);

            // Literal fields match their ctor directly.
            let base = match context.child(item, 4) {
                Some(literal) => {
                    let token_id = grammar.fresh_token_id();
                    grammar.add(Production::new(symbol.clone(), ProductionKind::Ctor { literal, token_id }))
                }
                None => {
                    let inner = context.inner_type(ty);
                    match &context.utype(inner).kind {
                        TypeKind::Unit(_) => grammar.add(Production::new(symbol.clone(), ProductionKind::Unit { unit: inner, arguments: Vec::new() })),
                        // Vector fields parse element-wise.
                        TypeKind::Vector | TypeKind::List => {
                            let element = context
                                .element_type(inner)
                                .map(|element| context.inner_type(element));
                            let body_kind = match element.map(|element| context.utype(element).kind.clone()) {
                                Some(TypeKind::Unit(_)) => ProductionKind::Unit {
                                    unit: element.expect("element type checked above"),
                                    arguments: Vec::new(),
                                },
                                _ => ProductionKind::Variable { ty },
                            };
                            let body = grammar.add(Production::new(format!("{symbol}_elem"), body_kind));
                            let until = context.attribute_value_of(attributes, AttributeKind::Until);
                            let until_including = context.attribute_value_of(attributes, AttributeKind::UntilIncluding);
                            match (until, until_including) {
                                (Some(condition), _) => grammar.add(Production::new(
                                    symbol.clone(),
                                    ProductionKind::ForEach {
                                        body,
                                        condition: Some(condition),
                                        including: false,
                                    },
                                )),
                                (None, Some(condition)) => grammar.add(Production::new(
                                    symbol.clone(),
                                    ProductionKind::ForEach {
                                        body,
                                        condition: Some(condition),
                                        including: true,
                                    },
                                )),
                                (None, None) => grammar.add(Production::new(symbol.clone(), ProductionKind::While { body })),
                            }
                        }
                        _ if skip => grammar.add(Production::new(symbol.clone(), ProductionKind::Skip { ty: Some(ty) })),
                        _ => grammar.add(Production::new(symbol.clone(), ProductionKind::Variable { ty })),
                    }
                }
            };

            // Repeat counts wrap the base production.
            let with_repeat = match context.child(item, 3) {
                Some(expression) => grammar.add(Production::new(format!("{symbol}_repeat"), ProductionKind::Counter { expression, body: base })),
                None => base,
            };

            let production = grammar.production_mut(with_repeat);
            production.field = Some(item);
            production.synchronize = context.has_attribute(attributes, AttributeKind::Synchronize);
            production.eod_ok = context.has_attribute(attributes, AttributeKind::Eod);
            Some(with_repeat)
        }

        UnitItem::Switch => {
            let condition = context.child(item, 0);
            let mut cases = Vec::new();
            let mut default = None;
            for case in context.children(item).skip(1).collect::<Vec<_>>() {
                let Some(field) = context.child(case, 0) else { continue };
                let Some(production) = item_production(context, grammar, field) else { continue };
                let expressions: Vec<NodeId> = context.children(case).skip(1).collect();
                match expressions.is_empty() {
                    true => default = Some(production),
                    false => cases.push((expressions, production)),
                }
            }
            Some(grammar.add(Production::new(
                format!("switch_{}", grammar.len()),
                ProductionKind::Switch { condition, cases, default },
            )))
        }

        // Variables, properties, and hooks do not parse anything.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spicy::production::{Production, ProductionKind};

    #[test]
    fn nullability_propagates_through_sequences() {
        let mut grammar = Grammar::new("g");
        let epsilon = grammar.add(Production::new("e", ProductionKind::Epsilon));
        let sequence = grammar.add(Production::new("s", ProductionKind::Sequence { elements: vec![epsilon] }));
        grammar.root = Some(sequence);
        grammar.finalize();

        assert!(grammar.is_nullable(epsilon));
        assert!(grammar.is_nullable(sequence));
    }

    #[test]
    fn first_sets_reach_through_nullable_prefix() {
        let mut grammar = Grammar::new("g");
        let epsilon = grammar.add(Production::new("e", ProductionKind::Epsilon));
        let variable = grammar.add(Production::new("v", ProductionKind::Variable { ty: crate::ast::NodeId::UNDEFINED }));
        let sequence = grammar.add(Production::new(
            "s",
            ProductionKind::Sequence {
                elements: vec![epsilon, variable],
            },
        ));
        grammar.root = Some(sequence);
        grammar.finalize();

        assert!(grammar.first_set(sequence).contains(&variable));
        assert!(!grammar.is_nullable(sequence));
    }

    #[test]
    fn intersecting_lookahead_alternatives_are_flagged() {
        let mut grammar = Grammar::new("g");
        let literal = grammar.add(Production::new("lit", ProductionKind::Variable { ty: crate::ast::NodeId::UNDEFINED }));
        let lookahead = grammar.add(Production::new(
            "branch",
            ProductionKind::LookAhead {
                alternative0: literal,
                alternative1: literal,
            },
        ));
        grammar.root = Some(lookahead);
        grammar.finalize();

        assert!(!grammar.errors.is_empty());
    }
}
