//! Spicy unit types and their items.
//!
//! A unit is the Spicy-side parser type. It exists only until the lowering
//! pass replaces it with the compiled HILTI struct produced by the parser
//! builder; until then, resolution and validation treat it like a struct
//! whose members are the unit items.
//!
//! Unit type node children: the synthesized `self` declaration, then
//! `param_count` parameter declarations, then the item nodes.

use strum_macros::{Display, EnumString};

use crate::ast::context::AstContext;
use crate::ast::id::ID;
use crate::ast::node::{NodeId, NodeKind};

/// Unit-level `%property` names the core understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum UnitProperty {
    #[strum(serialize = "%byte-order")]
    ByteOrder,
    #[strum(serialize = "%context")]
    Context,
    #[strum(serialize = "%filter")]
    Filter,
    #[strum(serialize = "%synchronize-at")]
    SynchronizeAt,
    #[strum(serialize = "%synchronize-after")]
    SynchronizeAfter,
    #[strum(serialize = "%skip")]
    Skip,
    #[strum(serialize = "%skip-pre")]
    SkipPre,
    #[strum(serialize = "%skip-post")]
    SkipPost,
    #[strum(serialize = "%mime-type")]
    MimeType,
    #[strum(serialize = "%port")]
    Port,
}

/// Payload of a unit type
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitType {
    /// Number of unit parameters (children after `self`)
    pub param_count: usize,
    /// True once the parser builder has compiled a grammar for this unit
    pub grammar_built: bool,
}

/// Payload of a unit item node
///
/// Child-slot conventions:
///
/// | item | children |
/// |---|---|
/// | `Field` | type QT, attribute set, `if` condition, repeat expression, literal ctor |
/// | `Variable` | type QT, default expression |
/// | `Property` | value expression |
/// | `Hook` | the function node |
/// | `Switch` | condition expression, then the case items |
/// | `SwitchCase` | the field item, then the case expressions |
#[derive(Debug, Clone, PartialEq)]
pub enum UnitItem {
    Field {
        /// Field name; anonymous fields have none and stay transient
        id: Option<ID>,
        /// Parse and discard, without storing a value
        skip: bool,
    },
    Variable {
        id: ID,
    },
    Property {
        property: UnitProperty,
    },
    /// An inline `on <name> { ... }` hook
    Hook {
        /// Hook name as written, e.g. `%done` or a field name
        name: String,
        foreach: bool,
    },
    Switch,
    SwitchCase,
}

impl AstContext {
    pub fn unit_item(&self, id: NodeId) -> &UnitItem {
        match &self.node(id).kind {
            NodeKind::UnitItem(item) => item,
            other => panic!("node {id:?} is not a unit item: {other:?}"),
        }
    }

    /// The item nodes of a unit type
    pub fn unit_items(&self, unit: NodeId) -> Vec<NodeId> {
        let crate::ast::types::TypeKind::Unit(payload) = &self.utype(unit).kind else {
            panic!("node {unit:?} is not a unit type");
        };
        self.children(unit).skip(1 + payload.param_count).collect()
    }

    /// The field items of a unit type, flattening switch cases
    pub fn unit_fields(&self, unit: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for item in self.unit_items(unit) {
            self.collect_fields(item, &mut out);
        }
        out
    }

    fn collect_fields(&self, item: NodeId, out: &mut Vec<NodeId>) {
        match self.unit_item(item) {
            UnitItem::Field { .. } => out.push(item),
            UnitItem::Switch => {
                for case in self.children(item).skip(1).collect::<Vec<_>>() {
                    self.collect_fields(case, out);
                }
            }
            UnitItem::SwitchCase => {
                if let Some(field) = self.child(item, 0) {
                    self.collect_fields(field, out);
                }
            }
            _ => {}
        }
    }

    /// The first property item with the given name, if present
    pub fn unit_property(&self, unit: NodeId, property: UnitProperty) -> Option<NodeId> {
        self.unit_items(unit)
            .into_iter()
            .find(|item| matches!(self.unit_item(*item), UnitItem::Property { property: found } if *found == property))
    }

    /// True if the unit is declared as a filter (`%filter`)
    pub fn unit_is_filter(&self, unit: NodeId) -> bool {
        self.unit_property(unit, UnitProperty::Filter).is_some()
    }

    /// The context type expression of a `%context` property
    pub fn unit_context(&self, unit: NodeId) -> Option<NodeId> {
        let property = self.unit_property(unit, UnitProperty::Context)?;
        self.child(property, 0)
    }

    /// The named field item of a unit
    pub fn unit_field_by_id(&self, unit: NodeId, id: &ID) -> Option<NodeId> {
        self.unit_fields(unit).into_iter().find(|field| {
            matches!(self.unit_item(*field), UnitItem::Field { id: Some(found), .. } if found == id)
        })
    }

    /// The declared type of a unit field or variable item
    pub fn unit_item_type(&self, item: NodeId) -> Option<NodeId> {
        match self.unit_item(item) {
            UnitItem::Field { .. } | UnitItem::Variable { .. } => self.child(item, 0),
            _ => None,
        }
    }

    /// The attribute set of a unit field
    pub fn unit_field_attributes(&self, field: NodeId) -> Option<NodeId> {
        match self.unit_item(field) {
            UnitItem::Field { .. } => self.child(field, 1),
            _ => None,
        }
    }
}

impl<'ctx> crate::ast::Builder<'ctx> {
    /// A unit type with the given parameters and items; synthesizes the
    /// hidden `self` declaration like struct types do
    pub fn unit_type(&mut self, parameters: Vec<NodeId>, items: Vec<NodeId>) -> NodeId {
        use crate::ast::expression::Keyword;
        use crate::ast::types::{Constness, Side, TypeKind};

        let param_count = parameters.len();
        let node = self.type_node(TypeKind::Unit(Box::new(UnitType {
            param_count,
            grammar_built: false,
        })));

        let self_qt = self.qtype_external(node, Constness::NonConst, Side::Lhs);
        let self_expr = self.expr_keyword(Keyword::Self_, self_qt);
        let self_decl = self.expression_decl(ID::new("self"), self_expr);
        self.context.attach_child(node, self_decl);

        for parameter in parameters {
            self.context.attach_child(node, parameter);
        }
        for item in items {
            self.context.attach_child(node, item);
        }
        node
    }

    pub fn unit_field(
        &mut self,
        id: Option<ID>,
        ty: NodeId,
        attributes: Option<NodeId>,
        condition: Option<NodeId>,
        repeat: Option<NodeId>,
        literal: Option<NodeId>,
    ) -> NodeId {
        let node = self.context.new_node(
            NodeKind::UnitItem(UnitItem::Field { id, skip: false }),
            self.meta(),
        );
        self.context.attach_child(node, ty);
        self.context.attach_optional(node, attributes);
        self.context.attach_optional(node, condition);
        self.context.attach_optional(node, repeat);
        self.context.attach_optional(node, literal);
        node
    }

    /// A skip field: parses and discards, never stores
    pub fn unit_skip_field(&mut self, ty: NodeId, attributes: Option<NodeId>) -> NodeId {
        let node = self.context.new_node(
            NodeKind::UnitItem(UnitItem::Field { id: None, skip: true }),
            self.meta(),
        );
        self.context.attach_child(node, ty);
        self.context.attach_optional(node, attributes);
        node
    }

    pub fn unit_variable(&mut self, id: ID, ty: NodeId, default: Option<NodeId>) -> NodeId {
        let node = self.context.new_node(NodeKind::UnitItem(UnitItem::Variable { id }), self.meta());
        self.context.attach_child(node, ty);
        self.context.attach_optional(node, default);
        node
    }

    pub fn unit_property(&mut self, property: UnitProperty, value: Option<NodeId>) -> NodeId {
        let node = self.context.new_node(NodeKind::UnitItem(UnitItem::Property { property }), self.meta());
        self.context.attach_optional(node, value);
        node
    }

    pub fn unit_hook(&mut self, name: impl Into<String>, foreach: bool, function: NodeId) -> NodeId {
        let node = self.context.new_node(
            NodeKind::UnitItem(UnitItem::Hook { name: name.into(), foreach }),
            self.meta(),
        );
        self.context.attach_child(node, function);
        node
    }

    pub fn unit_switch(&mut self, condition: Option<NodeId>, cases: Vec<NodeId>) -> NodeId {
        let node = self.context.new_node(NodeKind::UnitItem(UnitItem::Switch), self.meta());
        self.context.attach_optional(node, condition);
        for case in cases {
            self.context.attach_child(node, case);
        }
        node
    }

    pub fn unit_switch_case(&mut self, field: NodeId, expressions: Vec<NodeId>) -> NodeId {
        let node = self.context.new_node(NodeKind::UnitItem(UnitItem::SwitchCase), self.meta());
        self.context.attach_child(node, field);
        for expression in expressions {
            self.context.attach_child(node, expression);
        }
        node
    }
}
