//! The parser builder: synthesizes HILTI parse code from unit grammars.
//!
//! For every unit type the builder compiles the grammar into a HILTI struct
//! declaration plus parse functions:
//!
//! - `U::parse1(data, cur?, context?)`: parse into a fresh instance
//! - `U::parse2(self, data, cur?, context?)`: parse into a given instance
//! - `U::parse3(unit, data, cur?, context?)`: parse through a generic unit
//! - `U::context_new()`: allocate the `%context` instance, when declared
//!
//! Each entry point drives a two-stage protocol: stage 1 initializes the
//! unit (arguments, filters, profiling) and stage 2 parses the grammar's
//! root production. Field parsing follows a pre/body/post contract driven by
//! the field's attributes; `&synchronize` fields become recovery points for
//! trial mode. Runtime primitives are emitted as calls to well-known
//! `spicy_rt::...` names.

use simplelog::debug;

use crate::ast::attribute::AttributeKind;
use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::ctor::CtorKind;
use crate::ast::declaration::{Linkage, ParameterKind};
use crate::ast::id::ID;
use crate::ast::node::NodeId;
use crate::ast::types::{Constness, FunctionFlavor, Side, TypeClass};
use crate::error::ErrorPriority;
use crate::operators::Kind;
use crate::spicy::grammar::{build_unit_grammar, Grammar};
use crate::spicy::production::{LiteralMode, Production, ProductionId, ProductionKind};
use crate::spicy::unit::{UnitItem, UnitProperty};

/// Mutable per-unit state the builder tracks while generating code
///
/// The stack mirrors nested parse regions: `&size` limits, `&parse-from`
/// redirects, and filters each push a new state and pop it when the region
/// closes.
#[derive(Debug, Clone)]
pub struct ParserState {
    /// Name of the current data stream value-reference
    pub data: ID,
    /// Start iterator; unset means "use the view's start"
    pub begin: Option<ID>,
    /// Name of the current view
    pub cur: ID,
    /// Where to continue after a size-limited region
    pub ncur: Option<ID>,
    /// Current lookahead token id variable (0 none, -1 EOD)
    pub lahead: ID,
    /// End-of-lookahead iterator variable
    pub lahead_end: ID,
    /// Whether the input may be trimmed as parsing advances
    pub trim: bool,
    /// Recoverable-failure variable while in trial mode
    pub error: Option<ID>,
    /// The unit instance expression name
    pub self_id: ID,
    /// Capture-group storage, while a regexp with captures is active
    pub captures: Option<ID>,
    pub literal_mode: LiteralMode,
}

impl Default for ParserState {
    fn default() -> Self {
        Self {
            data: ID::new("__data"),
            begin: Some(ID::new("__begin")),
            cur: ID::new("__cur"),
            ncur: None,
            lahead: ID::new("__lahead"),
            lahead_end: ID::new("__lahead_end"),
            trim: true,
            error: None,
            // Generated code reaches the instance through the stage
            // functions' `__unit` parameter.
            self_id: ID::new("__unit"),
            captures: None,
            literal_mode: LiteralMode::Default,
        }
    }
}

/// The output of compiling one unit
#[derive(Debug)]
pub struct CompiledUnit {
    /// The HILTI struct type replacing the unit type
    pub struct_type: NodeId,
    /// Module-level function declarations (parse entry points and stages)
    pub functions: Vec<NodeId>,
}

/// Turns a hook name into its generated function name: `%done` becomes
/// `__on_0x25_done`, a field `x` becomes `__on_x`, foreach hooks append
/// `_foreach`
pub fn hook_function_name(name: &str, foreach: bool) -> String {
    let escaped = name.replace('%', "0x25_");
    match foreach {
        true => format!("__on_{escaped}_foreach"),
        false => format!("__on_{escaped}"),
    }
}

pub struct ParserBuilder<'a> {
    pub context: &'a mut AstContext,
    states: Vec<ParserState>,
    /// Unit type being compiled
    unit: NodeId,
    unit_name: ID,
}

impl<'a> ParserBuilder<'a> {
    pub fn new(context: &'a mut AstContext, unit: NodeId, unit_name: ID) -> Self {
        Self {
            context,
            states: vec![ParserState::default()],
            unit,
            unit_name,
        }
    }

    pub fn state(&self) -> &ParserState {
        self.states.last().expect("parser state stack is never empty")
    }

    pub fn push_state(&mut self, state: ParserState) {
        self.states.push(state);
    }

    pub fn pop_state(&mut self) -> ParserState {
        assert!(self.states.len() > 1, "cannot pop the root parser state");
        self.states.pop().expect("checked above")
    }

    /// Compiles the unit into its struct type and parse functions
    pub fn compile(&mut self) -> CompiledUnit {
        let grammar = build_unit_grammar(self.context, self.unit, self.unit_name.as_str());
        for error in &grammar.errors {
            self.context.add_error(self.unit, error.clone(), ErrorPriority::Normal);
        }

        let struct_type = self.synthesize_struct();
        let mut functions = vec![
            self.generate_stage1(),
            self.generate_stage2(&grammar),
            self.generate_parse1(),
            self.generate_parse2(),
            self.generate_parse3(),
        ];
        if self.context.unit_context(self.unit).is_some() {
            functions.push(self.generate_context_new());
        }

        debug!("[spicy-codegen] compiled unit '{}' ({} functions)", self.unit_name, functions.len());
        CompiledUnit { struct_type, functions }
    }

    /* ----- struct synthesis ----- */

    /// The HILTI struct replacing the unit: user fields and variables plus
    /// the internal parsing state fields
    fn synthesize_struct(&mut self) -> NodeId {
        let items = self.context.unit_items(self.unit);
        let has_context = self.context.unit_context(self.unit).is_some();

        let mut fields = Vec::new();
        for item in items {
            match self.context.unit_item(item).clone() {
                UnitItem::Field { id: Some(id), skip: false } => {
                    if let Some(ty) = self.context.unit_item_type(item) {
                        let ty_copy = self.context.deep_copy(ty);
                        let attrs = self
                            .context
                            .unit_field_attributes(item)
                            .map(|attrs| self.context.deep_copy(attrs));
                        let mut builder = Builder::new(self.context);
                        fields.push(builder.field_decl(id, ty_copy, attrs, None));
                    }
                }
                UnitItem::Variable { id } => {
                    if let Some(ty) = self.context.unit_item_type(item) {
                        let ty_copy = self.context.deep_copy(ty);
                        let mut builder = Builder::new(self.context);
                        fields.push(builder.field_decl(id, ty_copy, None, None));
                    }
                }
                _ => {}
            }
        }

        fields.push(self.internal_field("__offset", |builder| builder.uint_type(64)));
        fields.push(self.internal_field("__begin", |builder| {
            let iterator = builder.stream_iterator_type();
            let qt = builder.qtype_nonconst(iterator);
            builder.optional_type(qt)
        }));
        fields.push(self.internal_field("__position_update", |builder| {
            let iterator = builder.stream_iterator_type();
            let qt = builder.qtype_nonconst(iterator);
            builder.optional_type(qt)
        }));
        fields.push(self.internal_field("__error", |builder| {
            let failure = builder.library_type("spicy_rt::RecoverableFailure");
            let qt = builder.qtype_nonconst(failure);
            builder.optional_type(qt)
        }));
        fields.push(self.internal_field("__stop", |builder| builder.bool_type()));
        if has_context {
            fields.push(self.internal_field("__context", |builder| {
                let context_ty = builder.library_type("spicy_rt::UnitContext");
                let qt = builder.qtype_nonconst(context_ty);
                builder.strong_reference_type(qt)
            }));
        }

        // The two stage methods appear as function-typed fields so that
        // member lookup and feature analysis see them.
        for stage in ["__parse_stage1", "__parse_stage2"] {
            let field = {
                let mut builder = Builder::new(self.context);
                let view = builder.stream_view_type();
                let result = builder.qtype_nonconst(view);
                let ftype = builder.function_type(FunctionFlavor::Method, result, Vec::new());
                let ftype_qt = builder.qtype_const(ftype);
                builder.field_decl(ID::new(stage), ftype_qt, None, None)
            };
            fields.push(field);
        }

        let mut builder = Builder::new(self.context);
        builder.struct_type(Vec::new(), fields)
    }

    fn internal_field(&mut self, name: &str, make_type: impl FnOnce(&mut Builder<'_>) -> NodeId) -> NodeId {
        let mut builder = Builder::new(self.context);
        let ty = make_type(&mut builder);
        let qt = builder.qtype(ty, Constness::NonConst, Side::Lhs);
        let internal = builder.attribute(AttributeKind::Internal, None);
        let attrs = builder.attribute_set(vec![internal]);
        builder.field_decl(ID::new(name), qt, Some(attrs), None)
    }

    /* ----- runtime call helpers ----- */

    /// A `spicy_rt` call that produces a stream view
    fn rt_view_call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let mut builder = Builder::new(self.context);
        let view = builder.stream_view_type();
        let result = builder.qtype_nonconst(view);
        builder.expr_builtin_function(name, result, args)
    }

    /// A `spicy_rt` call that produces no value
    fn rt_void_call(&mut self, name: &str, args: Vec<NodeId>) -> NodeId {
        let mut builder = Builder::new(self.context);
        let void = builder.void_type();
        let result = builder.qtype_const(void);
        builder.expr_builtin_function(name, result, args)
    }

    /// A `spicy_rt` call producing a value of the given unqualified type
    fn rt_typed_call(&mut self, name: &str, make_type: impl FnOnce(&mut Builder<'_>) -> NodeId, args: Vec<NodeId>) -> NodeId {
        let mut builder = Builder::new(self.context);
        let ty = make_type(&mut builder);
        let result = builder.qtype_nonconst(ty);
        builder.expr_builtin_function(name, result, args)
    }

    fn cur_expr(&mut self) -> NodeId {
        let cur = self.state().cur.clone();
        Builder::new(self.context).expr_name(cur)
    }

    fn self_member(&mut self, member: &str) -> NodeId {
        let self_id = self.state().self_id.clone();
        let mut builder = Builder::new(self.context);
        let object = builder.expr_name(self_id);
        builder.member(object, ID::new(member))
    }

    /* ----- entry points ----- */

    /// `parse1`: allocate a fresh unit, run stage 1, return the new view
    fn generate_parse1(&mut self) -> NodeId {
        let body = {
            let unit_local = {
                let type_ref = self.unit_type_reference();
                let mut builder = Builder::new(self.context);
                let default = builder.ctor_default(type_ref, Vec::new());
                let init = builder.expr_ctor(default);
                let auto = builder.auto_type();
                let auto_qt = builder.qtype_nonconst(auto);
                builder.local_decl(ID::new("__unit"), auto_qt, Some(init))
            };
            let unit_stmt = Builder::new(self.context).stmt_declaration(unit_local);

            let stage1 = {
                let mut builder = Builder::new(self.context);
                let unit = builder.expr_name(ID::new("__unit"));
                let data = builder.expr_name(ID::new("__data"));
                let cur = builder.expr_name(ID::new("__cur"));
                drop(builder);
                self.rt_view_call("spicy_rt::unit_parse_stage1", vec![unit, data, cur])
            };
            let ret = Builder::new(self.context).stmt_return(Some(stage1));
            Builder::new(self.context).block(vec![unit_stmt, ret])
        };

        self.parse_entry_function("parse1", false, body)
    }

    /// `parse2`: parse into a caller-provided instance
    fn generate_parse2(&mut self) -> NodeId {
        let body = {
            let stage1 = {
                let mut builder = Builder::new(self.context);
                let unit = builder.expr_name(ID::new("__unit"));
                let data = builder.expr_name(ID::new("__data"));
                let cur = builder.expr_name(ID::new("__cur"));
                drop(builder);
                self.rt_view_call("spicy_rt::unit_parse_stage1", vec![unit, data, cur])
            };
            let ret = Builder::new(self.context).stmt_return(Some(stage1));
            Builder::new(self.context).block(vec![ret])
        };

        self.parse_entry_function("parse2", true, body)
    }

    /// `parse3`: parse through a type-erased unit handle
    fn generate_parse3(&mut self) -> NodeId {
        let body = {
            let dispatch = {
                let mut builder = Builder::new(self.context);
                let unit = builder.expr_name(ID::new("__gunit"));
                let data = builder.expr_name(ID::new("__data"));
                let cur = builder.expr_name(ID::new("__cur"));
                drop(builder);
                self.rt_view_call("spicy_rt::unit_parse_generic", vec![unit, data, cur])
            };
            let ret = Builder::new(self.context).stmt_return(Some(dispatch));
            Builder::new(self.context).block(vec![ret])
        };

        self.parse_entry_function("parse3", false, body)
    }

    /// `context_new`: allocates the `%context` instance
    fn generate_context_new(&mut self) -> NodeId {
        let name = self.unit_name.join_str("context_new");
        let body = {
            let allocate = self.rt_typed_call(
                "spicy_rt::context_new",
                |builder| {
                    let context_ty = builder.library_type("spicy_rt::UnitContext");
                    let qt = builder.qtype_nonconst(context_ty);
                    builder.strong_reference_type(qt)
                },
                Vec::new(),
            );
            let mut builder = Builder::new(self.context);
            let ret = builder.stmt_return(Some(allocate));
            builder.block(vec![ret])
        };

        let mut builder = Builder::new(self.context);
        let context_ty = builder.library_type("spicy_rt::UnitContext");
        let context_qt = builder.qtype_nonconst(context_ty);
        let result = builder.strong_reference_type(context_qt);
        let result_qt = builder.qtype_nonconst(result);
        let ftype = builder.function_type(FunctionFlavor::Function, result_qt, Vec::new());
        let ftype_qt = builder.qtype_const(ftype);
        let function = builder.function(name.clone(), ftype_qt, Some(body));
        builder.function_decl(name, function, Linkage::Public)
    }

    /// Shared shape of the external entry points: `(data, cur?, context?)`
    /// returning the new view
    fn parse_entry_function(&mut self, name: &str, with_self: bool, body: NodeId) -> NodeId {
        let qualified = self.unit_name.join_str(name);
        let type_ref = self.unit_type_reference();

        let mut builder = Builder::new(self.context);
        let mut parameters = Vec::new();

        if with_self {
            let self_qt = builder.qtype(type_ref, Constness::NonConst, Side::Lhs);
            parameters.push(builder.parameter_decl(ID::new("__unit"), self_qt, ParameterKind::InOut, None));
        } else if name == "parse3" {
            let generic = builder.library_type("spicy_rt::ParsedUnit");
            let generic_qt = builder.qtype(generic, Constness::NonConst, Side::Lhs);
            parameters.push(builder.parameter_decl(ID::new("__gunit"), generic_qt, ParameterKind::InOut, None));
        }

        let stream = builder.stream_type();
        let stream_qt = builder.qtype_nonconst(stream);
        let data_ty = builder.value_reference_type(stream_qt);
        let data_qt = builder.qtype(data_ty, Constness::NonConst, Side::Lhs);
        parameters.push(builder.parameter_decl(ID::new("__data"), data_qt, ParameterKind::InOut, None));

        let view = builder.stream_view_type();
        let view_qt = builder.qtype_nonconst(view);
        let cur_inner = builder.optional_type(view_qt);
        let cur_qt = builder.qtype_nonconst(cur_inner);
        parameters.push(builder.parameter_decl(ID::new("__cur"), cur_qt, ParameterKind::In, None));

        let result_view = builder.stream_view_type();
        let result = builder.qtype_nonconst(result_view);
        let ftype = builder.function_type(FunctionFlavor::Function, result, parameters);
        let ftype_qt = builder.qtype_const(ftype);
        let function = builder.function(qualified.clone(), ftype_qt, Some(body));
        builder.function_decl(qualified, function, Linkage::Public)
    }

    /// A detached name-type QT referencing the unit's declaration
    fn unit_type_reference(&mut self) -> NodeId {
        let name = self.unit_name.clone();
        let mut builder = Builder::new(self.context);
        let ty = builder.name_type(name);
        builder.qtype_nonconst(ty)
    }

    /* ----- stages ----- */

    /// Stage 1: initialize the instance, wire a filter when one may be
    /// connected, then hand over to stage 2
    fn generate_stage1(&mut self) -> NodeId {
        let name = self.unit_name.join_str("__parse_stage1");
        let is_filter_host = self.context.unit_is_filter(self.unit);

        let mut statements = Vec::new();

        statements.push({
            let args = vec![{
                let mut builder = Builder::new(self.context);
                builder.expr_name(ID::new("__unit"))
            }];
            let call = self.rt_void_call("spicy_rt::unit_init", args);
            Builder::new(self.context).stmt_expression(call)
        });

        if self.context.options.enable_profiling {
            let call = self.rt_void_call("hilti::rt::profiler_start", Vec::new());
            statements.push(Builder::new(self.context).stmt_expression(call));
        }

        statements.push({
            let call = self.rt_void_call("hilti::rt::debug_indent", Vec::new());
            Builder::new(self.context).stmt_expression(call)
        });

        // With a filter in play, stage 2 reads the filter's output stream
        // instead of the original data.
        if is_filter_host {
            let filtered = {
                let mut builder = Builder::new(self.context);
                let unit = builder.expr_name(ID::new("__unit"));
                let data = builder.expr_name(ID::new("__data"));
                drop(builder);
                self.rt_view_call("spicy_rt::filter_init", vec![unit, data])
            };
            let mut builder = Builder::new(self.context);
            let auto = builder.auto_type();
            let auto_qt = builder.qtype_nonconst(auto);
            let local = builder.local_decl(ID::new("__filtered"), auto_qt, Some(filtered));
            statements.push(builder.stmt_declaration(local));
        }

        statements.push({
            let stage2 = {
                let mut builder = Builder::new(self.context);
                let unit = builder.expr_name(ID::new("__unit"));
                let cur = builder.expr_name(ID::new("__cur"));
                drop(builder);
                self.rt_view_call("spicy_rt::unit_parse_stage2", vec![unit, cur])
            };
            Builder::new(self.context).stmt_return(Some(stage2))
        });

        let body = Builder::new(self.context).block(statements);
        self.parse_entry_function("__parse_stage1", true, body)
    }

    /// Stage 2: parse the grammar's root production and finish the unit
    fn generate_stage2(&mut self, grammar: &Grammar) -> NodeId {
        let mut statements = Vec::new();

        if let Some(root) = grammar.root {
            statements.extend(self.production_statements(grammar, root));
        }

        // Run the %done hook, then fail the unit if it is still in trial
        // mode (no confirm was executed).
        if self.unit_has_hook("%done") {
            statements.push(self.hook_call("%done", false));
        }
        statements.push({
            let error = self.self_member("__error");
            let call = self.rt_void_call("spicy_rt::reject_if_unconfirmed", vec![error]);
            Builder::new(self.context).stmt_expression(call)
        });

        statements.push({
            let cur = self.cur_expr();
            Builder::new(self.context).stmt_return(Some(cur))
        });

        let body = Builder::new(self.context).block(statements);
        self.parse_entry_function("__parse_stage2", true, body)
    }

    fn unit_has_hook(&self, name: &str) -> bool {
        self.context.unit_items(self.unit).iter().any(|item| {
            matches!(self.context.unit_item(*item), UnitItem::Hook { name: found, .. } if found == name)
        })
    }

    fn field_has_hook(&self, field: &str) -> bool {
        self.unit_has_hook(field)
    }

    /// A statement calling the generated hook function with `self`
    fn hook_call(&mut self, hook: &str, foreach: bool) -> NodeId {
        let name = hook_function_name(hook, foreach);
        let self_id = self.state().self_id.clone();
        let mut builder = Builder::new(self.context);
        let self_expr = builder.expr_name(self_id);
        let call = builder.call(ID::new(name), vec![self_expr]);
        builder.stmt_expression(call)
    }

    /* ----- production codegen ----- */

    /// The statements parsing one production, with the full per-field
    /// pre/body/post contract applied
    fn production_statements(&mut self, grammar: &Grammar, id: ProductionId) -> Vec<NodeId> {
        let production = grammar.production(id).clone();
        let mut statements = Vec::new();

        let attributes = production.field.and_then(|field| self.context.unit_field_attributes(field));

        /* pre-field */

        // `&parse-from` / `&parse-at` redirect the input for this field.
        let redirected = match (
            self.context.attribute_value_of(attributes, AttributeKind::ParseFrom),
            self.context.attribute_value_of(attributes, AttributeKind::ParseAt),
        ) {
            (Some(source), _) | (None, Some(source)) => {
                let source_copy = self.context.deep_copy(source);
                let redirect = self.rt_view_call("spicy_rt::redirect_input", vec![source_copy]);
                let mut builder = Builder::new(self.context);
                let auto = builder.auto_type();
                let auto_qt = builder.qtype_nonconst(auto);
                let local = builder.local_decl(ID::new("__redirected_cur"), auto_qt, Some(redirect));
                statements.push(builder.stmt_declaration(local));

                let mut state = self.state().clone();
                state.data = ID::new("__redirected_data");
                state.cur = ID::new("__redirected_cur");
                state.begin = None;
                self.push_state(state);
                true
            }
            _ => false,
        };

        // `&size` / `&max-size` limit the view and remember where to
        // continue afterwards.
        let size_attr = self.context.attribute_value_of(attributes, AttributeKind::Size);
        let max_size_attr = self.context.attribute_value_of(attributes, AttributeKind::MaxSize);
        let limited = size_attr.or(max_size_attr);
        if let Some(size) = limited {
            let size_copy = self.context.deep_copy(size);
            let cur = self.cur_expr();
            let ncur = {
                let size_for_advance = self.context.deep_copy(size_copy);
                let cur_again = self.cur_expr();
                self.rt_view_call("spicy_rt::view_advance", vec![cur_again, size_for_advance])
            };
            let limit = self.rt_view_call("spicy_rt::view_limit", vec![cur, size_copy]);

            let mut builder = Builder::new(self.context);
            let auto = builder.auto_type();
            let auto_qt = builder.qtype_nonconst(auto);
            let ncur_local = builder.local_decl(ID::new("__ncur"), auto_qt, Some(ncur));
            statements.push(builder.stmt_declaration(ncur_local));
            let auto2 = builder.auto_type();
            let auto2_qt = builder.qtype_nonconst(auto2);
            let limited_local = builder.local_decl(ID::new("__limited_cur"), auto2_qt, Some(limit));
            statements.push(builder.stmt_declaration(limited_local));

            let mut state = self.state().clone();
            state.cur = ID::new("__limited_cur");
            state.ncur = Some(ID::new("__ncur"));
            self.push_state(state);
        }

        /* body */

        let mut body = self.production_body(grammar, id, &production);

        /* post-field */

        if let Some(field) = production.field {
            body.extend(self.post_field_statements(field, attributes, &production));
        }

        // `&try` wraps the whole field in a backtrackable frame; failures
        // inside are absorbed here, before any outer sync point sees them.
        if self.context.has_attribute(attributes, AttributeKind::Try) {
            let try_body = Builder::new(self.context).block(body);
            let catch_body = {
                let restore = self.rt_void_call("spicy_rt::backtrack_restore", Vec::new());
                let mut builder = Builder::new(self.context);
                let restore_stmt = builder.stmt_expression(restore);
                builder.block(vec![restore_stmt])
            };
            let catch = {
                let mut builder = Builder::new(self.context);
                let failure = builder.library_type("spicy_rt::RecoverableFailure");
                let failure_qt = builder.qtype_const(failure);
                let parameter = builder.parameter_decl(ID::new("__trial_error"), failure_qt, ParameterKind::In, None);
                builder.try_catch(Some(parameter), catch_body)
            };
            let wrapped = Builder::new(self.context).stmt_try(try_body, vec![catch]);
            body = vec![wrapped];
        }

        statements.extend(body);

        /* close the size-limited region */
        if limited.is_some() {
            if size_attr.is_some() {
                // `&size` must consume the limited view entirely.
                let cur = self.cur_expr();
                let check = self.rt_void_call("spicy_rt::check_size_consumed", vec![cur]);
                statements.push(Builder::new(self.context).stmt_expression(check));
            } else {
                // `&max-size` only verifies the sentinel was not overrun.
                let cur = self.cur_expr();
                let check = self.rt_void_call("spicy_rt::check_max_size", vec![cur]);
                statements.push(Builder::new(self.context).stmt_expression(check));
            }
            self.pop_state();

            // Continue after the limited region.
            let mut builder = Builder::new(self.context);
            let cur = builder.expr_name(self.states.last().expect("state").cur.clone());
            let ncur = builder.expr_name(ID::new("__ncur"));
            let assign = builder.expr_assign(cur, ncur);
            statements.push(builder.stmt_expression(assign));
        }

        if redirected {
            self.pop_state();
        }

        // An `if` condition gates the entire field.
        if let Some(condition) = production.field.and_then(|field| self.context.child(field, 2)) {
            let condition_copy = self.context.deep_copy(condition);
            let mut builder = Builder::new(self.context);
            let block = builder.block(statements);
            return vec![builder.stmt_if(None, condition_copy, block, None)];
        }

        statements
    }

    fn production_body(&mut self, grammar: &Grammar, id: ProductionId, production: &Production) -> Vec<NodeId> {
        match &production.kind {
            ProductionKind::Epsilon => Vec::new(),

            ProductionKind::Ctor { literal, token_id } => {
                let literal_copy = self.context.deep_copy(*literal);
                let cur_name = self.state().cur.clone();
                let mut builder = Builder::new(self.context);
                let literal_expr = builder.expr_ctor(literal_copy);
                let token = builder.ctor_uint(*token_id, 64);
                let token_expr = builder.expr_ctor(token);
                let cur = builder.expr_name(cur_name);
                drop(builder);

                let rt = match self.state().literal_mode {
                    LiteralMode::Default => "spicy_rt::expect_literal",
                    LiteralMode::Try => "spicy_rt::try_literal",
                    LiteralMode::Search => "spicy_rt::search_literal",
                    LiteralMode::Skip => "spicy_rt::skip_literal",
                };
                let matched = self.rt_view_call(rt, vec![cur, literal_expr, token_expr]);
                let assign = {
                    let cur_name = self.state().cur.clone();
                    let mut builder = Builder::new(self.context);
                    let cur = builder.expr_name(cur_name);
                    builder.expr_assign(cur, matched)
                };
                vec![Builder::new(self.context).stmt_expression(assign)]
            }

            ProductionKind::Variable { ty } => {
                let parsed = self.parse_value_call(*ty);
                match production.field {
                    Some(field) => self.store_field_value(field, parsed),
                    None => vec![Builder::new(self.context).stmt_expression(parsed)],
                }
            }

            ProductionKind::Skip { ty } => {
                let args = match ty {
                    Some(ty) => {
                        let parsed = self.parse_value_call(*ty);
                        vec![parsed]
                    }
                    None => Vec::new(),
                };
                let call = self.rt_void_call("spicy_rt::skip", args);
                vec![Builder::new(self.context).stmt_expression(call)]
            }

            ProductionKind::Sequence { elements } => {
                self.sequence_statements(grammar, elements.clone())
            }

            ProductionKind::Enclosure { inner } => self.production_statements(grammar, *inner),

            ProductionKind::Counter { expression, body } => {
                let count_copy = self.context.deep_copy(*expression);
                let body_statements = self.production_statements(grammar, *body);

                let mut builder = Builder::new(self.context);
                let zero = builder.ctor_uint(0, 64);
                let zero_expr = builder.expr_ctor(zero);
                let auto = builder.auto_type();
                let auto_qt = builder.qtype_nonconst(auto);
                let counter = builder.local_decl(ID::new("__i"), auto_qt, Some(zero_expr));

                let condition = {
                    let i = builder.expr_name(ID::new("__i"));
                    builder.expr_unresolved_operator(Kind::Lower, vec![i, count_copy])
                };
                let increment = {
                    let i = builder.expr_name(ID::new("__i"));
                    let one = builder.ctor_uint(1, 64);
                    let one_expr = builder.expr_ctor(one);
                    let i2 = builder.expr_name(ID::new("__i"));
                    let sum = builder.expr_unresolved_operator(Kind::Sum, vec![i2, one_expr]);
                    let assign = builder.expr_assign(i, sum);
                    builder.stmt_expression(assign)
                };
                let mut loop_body = body_statements;
                loop_body.push(increment);
                let loop_block = builder.block(loop_body);
                let while_stmt = builder.stmt_while(Some(counter), condition, loop_block, None);
                vec![while_stmt]
            }

            ProductionKind::ForEach { body, condition, .. } => {
                let body_statements = self.production_statements(grammar, *body);
                let condition_expr = match condition {
                    Some(condition) => {
                        let copy = self.context.deep_copy(*condition);
                        Builder::new(self.context).expr_logical_not(copy)
                    }
                    None => {
                        let mut builder = Builder::new(self.context);
                        let ctor = builder.ctor_bool(true);
                        builder.expr_ctor(ctor)
                    }
                };
                let mut builder = Builder::new(self.context);
                let block = builder.block(body_statements);
                vec![builder.stmt_while(None, condition_expr, block, None)]
            }

            ProductionKind::While { body } => {
                // Lookahead-driven list: keep parsing elements while the
                // lookahead matches the body's first set.
                let probe = {
                    let cur = self.cur_expr();
                    self.rt_typed_call("spicy_rt::lookahead_try", |builder| builder.uint_type(64), vec![cur])
                };
                let body_statements = self.production_statements(grammar, *body);

                let mut builder = Builder::new(self.context);
                let auto = builder.auto_type();
                let auto_qt = builder.qtype_nonconst(auto);
                let lahead_local = builder.local_decl(self.states.last().expect("state").lahead.clone(), auto_qt, Some(probe));

                let condition = {
                    let lahead = builder.expr_name(self.states.last().expect("state").lahead.clone());
                    let zero = builder.ctor_uint(0, 64);
                    let zero_expr = builder.expr_ctor(zero);
                    builder.expr_unresolved_operator(Kind::Unequal, vec![lahead, zero_expr])
                };
                let block = builder.block(body_statements);
                vec![builder.stmt_while(Some(lahead_local), condition, block, None)]
            }

            ProductionKind::Switch { condition, cases, default } => {
                self.switch_statements(grammar, condition.clone(), cases.clone(), *default)
            }

            ProductionKind::LookAhead { alternative0, alternative1 } => {
                self.lookahead_statements(grammar, id, *alternative0, *alternative1)
            }

            ProductionKind::Resolved { target } => self.production_statements(grammar, *target),

            ProductionKind::Unit { unit, .. } => {
                let symbol = self
                    .context
                    .type_id(*unit)
                    .map(|type_id| type_id.to_string())
                    .unwrap_or_else(|| String::from("<anonymous unit>"));
                let mut builder = Builder::new(self.context);
                let name = builder.ctor_string(symbol);
                let name_expr = builder.expr_ctor(name);
                let cur = builder.expr_name(self.states.last().expect("state").cur.clone());
                drop(builder);

                let call = self.rt_view_call("spicy_rt::parse_unit", vec![name_expr, cur]);
                let assign = {
                    let cur_name = self.state().cur.clone();
                    let mut builder = Builder::new(self.context);
                    let cur = builder.expr_name(cur_name);
                    builder.expr_assign(cur, call)
                };
                let assign_stmt = Builder::new(self.context).stmt_expression(assign);
                vec![assign_stmt]
            }
        }
    }

    /// Sequence with trial-mode recovery: a `&synchronize` element catches
    /// recoverable failures from everything before it, records the original
    /// error, re-synchronizes the input, runs `%synced`, and continues in
    /// trial mode
    fn sequence_statements(&mut self, grammar: &Grammar, elements: Vec<ProductionId>) -> Vec<NodeId> {
        let sync_index = elements.iter().position(|element| grammar.production(*element).synchronize);

        match sync_index {
            None | Some(0) => {
                let mut statements = Vec::new();
                for element in elements {
                    statements.extend(self.production_statements(grammar, element));
                }
                statements
            }
            Some(index) => {
                let mut head = Vec::new();
                for element in &elements[..index] {
                    head.extend(self.production_statements(grammar, *element));
                }

                // On recoverable failure before the sync point: remember the
                // error, search for the sync token, run the hook, enter
                // trial mode.
                let catch_body = {
                    let mut recovery = Vec::new();

                    recovery.push({
                        let error_member = self.self_member("__error");
                        let mut builder = Builder::new(self.context);
                        let error_value = builder.expr_name(ID::new("__trial_error"));
                        let assign = builder.expr_assign(error_member, error_value);
                        builder.stmt_expression(assign)
                    });

                    // Search mode: advance byte-wise until the sync target
                    // matches; %synchronize-at/-after override the target.
                    let sync_target = self
                        .context
                        .unit_property(self.unit, UnitProperty::SynchronizeAt)
                        .or_else(|| self.context.unit_property(self.unit, UnitProperty::SynchronizeAfter))
                        .and_then(|property| self.context.child(property, 0));
                    let mut args = vec![self.cur_expr()];
                    if let Some(target) = sync_target {
                        let target_copy = self.context.deep_copy(target);
                        let target_expr = Builder::new(self.context).expr_ctor(target_copy);
                        args.push(target_expr);
                    }
                    let synced = self.rt_view_call("spicy_rt::synchronize", args);
                    recovery.push({
                        let cur_name = self.state().cur.clone();
                        let mut builder = Builder::new(self.context);
                        let cur = builder.expr_name(cur_name);
                        let assign = builder.expr_assign(cur, synced);
                        builder.stmt_expression(assign)
                    });

                    if self.unit_has_hook("%synced") {
                        recovery.push(self.hook_call("%synced", false));
                    }

                    Builder::new(self.context).block(recovery)
                };

                let catch = {
                    let mut builder = Builder::new(self.context);
                    let failure = builder.library_type("spicy_rt::RecoverableFailure");
                    let failure_qt = builder.qtype_const(failure);
                    let parameter = builder.parameter_decl(ID::new("__trial_error"), failure_qt, ParameterKind::In, None);
                    builder.try_catch(Some(parameter), catch_body)
                };

                let head_block = Builder::new(self.context).block(head);
                let guarded = Builder::new(self.context).stmt_try(head_block, vec![catch]);

                let mut statements = vec![guarded];
                for element in &elements[index..] {
                    statements.extend(self.production_statements(grammar, *element));
                }
                statements
            }
        }
    }

    fn switch_statements(
        &mut self,
        grammar: &Grammar,
        condition: Option<NodeId>,
        cases: Vec<(Vec<NodeId>, ProductionId)>,
        default: Option<ProductionId>,
    ) -> Vec<NodeId> {
        match condition {
            Some(condition) => {
                let condition_copy = self.context.deep_copy(condition);
                let condition_local = {
                    let mut builder = Builder::new(self.context);
                    let auto = builder.auto_type();
                    let auto_qt = builder.qtype_nonconst(auto);
                    builder.local_decl(ID::new("__switch_cond"), auto_qt, Some(condition_copy))
                };

                let mut case_nodes = Vec::new();
                for (expressions, production) in cases {
                    let body_statements = self.production_statements(grammar, production);
                    let expressions_copies: Vec<NodeId> = expressions.iter().map(|expression| self.context.deep_copy(*expression)).collect();
                    let mut builder = Builder::new(self.context);
                    let body = builder.block(body_statements);
                    case_nodes.push(builder.switch_case(body, expressions_copies));
                }
                if let Some(default) = default {
                    let body_statements = self.production_statements(grammar, default);
                    let mut builder = Builder::new(self.context);
                    let body = builder.block(body_statements);
                    case_nodes.push(builder.switch_case(body, Vec::new()));
                }

                vec![Builder::new(self.context).stmt_switch(condition_local, case_nodes)]
            }
            None => {
                // Unconditional switch: dispatch by lookahead token.
                let probe = {
                    let cur = self.cur_expr();
                    self.rt_typed_call("spicy_rt::lookahead_try", |builder| builder.uint_type(64), vec![cur])
                };
                let lahead_decl = {
                    let mut builder = Builder::new(self.context);
                    let auto = builder.auto_type();
                    let auto_qt = builder.qtype_nonconst(auto);
                    builder.local_decl(ID::new("__lahead"), auto_qt, Some(probe))
                };
                let lahead_stmt = Builder::new(self.context).stmt_declaration(lahead_decl);

                let mut statements = vec![lahead_stmt];
                for (_, production) in cases {
                    let first_token = grammar
                        .first_set(production)
                        .iter()
                        .find_map(|terminal| grammar.production(*terminal).token_id());
                    let body_statements = self.production_statements(grammar, production);
                    let Some(token) = first_token else {
                        statements.extend(body_statements);
                        continue;
                    };

                    let mut builder = Builder::new(self.context);
                    let lahead = builder.expr_name(ID::new("__lahead"));
                    let token_ctor = builder.ctor_uint(token, 64);
                    let token_expr = builder.expr_ctor(token_ctor);
                    let matches = builder.expr_unresolved_operator(Kind::Equal, vec![lahead, token_expr]);
                    let body = builder.block(body_statements);
                    statements.push(builder.stmt_if(None, matches, body, None));
                }
                if let Some(default) = default {
                    statements.extend(self.production_statements(grammar, default));
                }
                statements
            }
        }
    }

    /// Binary lookahead: regex literals are matched in parallel through one
    /// combined regex whose branches carry token ids; other literals match
    /// sequentially, longest match first. An equal-length double match is a
    /// parse error.
    fn lookahead_statements(&mut self, grammar: &Grammar, id: ProductionId, alternative0: ProductionId, alternative1: ProductionId) -> Vec<NodeId> {
        let mut regex_branches: Vec<(u64, String)> = Vec::new();
        let mut literal_tokens: Vec<u64> = Vec::new();

        for terminal in grammar.first_set(id).clone() {
            let production = grammar.production(terminal).clone();
            let ProductionKind::Ctor { literal, token_id } = production.kind else { continue };
            match self.context.ctor(literal).kind.clone() {
                CtorKind::RegExp { patterns } => {
                    for pattern in patterns {
                        regex_branches.push((token_id, pattern));
                    }
                }
                _ => literal_tokens.push(token_id),
            }
        }

        let mut statements = Vec::new();

        // One combined regex for all regex branches.
        if !regex_branches.is_empty() {
            let combined = regex_branches
                .iter()
                .map(|(token, pattern)| format!("({pattern})$({token})"))
                .collect::<Vec<_>>()
                .join("|");
            let cur_name = self.state().cur.clone();
            let mut builder = Builder::new(self.context);
            let pattern = builder.ctor_string(combined);
            let pattern_expr = builder.expr_ctor(pattern);
            let cur = builder.expr_name(cur_name);
            drop(builder);
            let probe = self.rt_typed_call("spicy_rt::lookahead_regexp", |builder| builder.uint_type(64), vec![cur, pattern_expr]);
            let mut builder = Builder::new(self.context);
            let auto = builder.auto_type();
            let auto_qt = builder.qtype_nonconst(auto);
            let local = builder.local_decl(ID::new("__lahead"), auto_qt, Some(probe));
            statements.push(builder.stmt_declaration(local));
        } else {
            // Sequential literal matching, longest match wins; ambiguity at
            // equal length raises inside the runtime helper.
            let mut args = vec![self.cur_expr()];
            for token in &literal_tokens {
                let mut builder = Builder::new(self.context);
                let ctor = builder.ctor_uint(*token, 64);
                args.push(builder.expr_ctor(ctor));
            }
            let probe = self.rt_typed_call("spicy_rt::lookahead_literals", |builder| builder.uint_type(64), args);
            let mut builder = Builder::new(self.context);
            let auto = builder.auto_type();
            let auto_qt = builder.qtype_nonconst(auto);
            let local = builder.local_decl(ID::new("__lahead"), auto_qt, Some(probe));
            statements.push(builder.stmt_declaration(local));
        }

        // Branch on whether the token belongs to alternative 0.
        let first0: Vec<u64> = grammar
            .first_set(alternative0)
            .iter()
            .filter_map(|terminal| grammar.production(*terminal).token_id())
            .collect();

        let body0 = self.production_statements(grammar, alternative0);
        let body1 = self.production_statements(grammar, alternative1);

        let mut builder = Builder::new(self.context);
        let condition = {
            let lahead = builder.expr_name(ID::new("__lahead"));
            let token = builder.ctor_uint(first0.first().copied().unwrap_or(0), 64);
            let token_expr = builder.expr_ctor(token);
            builder.expr_unresolved_operator(Kind::Equal, vec![lahead, token_expr])
        };
        let block0 = builder.block(body0);
        let block1 = builder.block(body1);
        statements.push(builder.stmt_if(None, condition, block0, Some(block1)));
        statements
    }

    /// A runtime call parsing one value of the given type from the input
    fn parse_value_call(&mut self, ty: NodeId) -> NodeId {
        let inner = self.context.inner_type(ty);
        let class = self.context.utype(inner).class();
        let rt = match class {
            TypeClass::UnsignedInteger => "spicy_rt::parse_uint",
            TypeClass::SignedInteger => "spicy_rt::parse_int",
            TypeClass::Bytes => "spicy_rt::parse_bytes",
            TypeClass::Real => "spicy_rt::parse_real",
            TypeClass::Address => "spicy_rt::parse_address",
            TypeClass::Bitfield => "spicy_rt::parse_bitfield",
            _ => "spicy_rt::parse_value",
        };

        let ty_copy = self.context.deep_copy(ty);
        let cur = self.cur_expr();
        let mut builder = Builder::new(self.context);
        builder.expr_builtin_function(rt, ty_copy, vec![cur])
    }

    /// Post-parse value handling: `&convert`, field hooks, `&requires`, and
    /// the offset bookkeeping
    fn post_field_statements(&mut self, field: NodeId, attributes: Option<NodeId>, production: &Production) -> Vec<NodeId> {
        let mut statements = Vec::new();

        let field_id = match self.context.unit_item(field).clone() {
            UnitItem::Field { id: Some(id), skip: false } => Some(id),
            _ => None,
        };

        // `&convert` computes the stored value from the parsed one.
        if let (Some(field_id), Some(convert)) = (&field_id, self.context.attribute_value_of(attributes, AttributeKind::Convert)) {
            let convert_copy = self.context.deep_copy(convert);
            let member = self.self_member(field_id.local());
            let mut builder = Builder::new(self.context);
            let assign = builder.expr_assign(member, convert_copy);
            statements.push(builder.stmt_expression(assign));
        }

        // Field hooks run for non-transient fields.
        if let Some(field_id) = &field_id {
            if self.field_has_hook(field_id.local()) {
                statements.push(self.hook_call(field_id.local(), false));
            }
            if production_is_container(production) && self.unit_has_hook(&format!("{}_foreach", field_id.local())) {
                statements.push(self.hook_call(field_id.local(), true));
            }
        }

        // `&requires` evaluates after the value is in place; false is a
        // parse error.
        if let Some(requires) = self.context.attribute_value_of(attributes, AttributeKind::Requires) {
            let requires_copy = self.context.deep_copy(requires);
            let mut builder = Builder::new(self.context);
            let negated = builder.expr_logical_not(requires_copy);
            drop(builder);
            let message = {
                let mut builder = Builder::new(self.context);
                let ctor = builder.ctor_string("&requires failed");
                builder.expr_ctor(ctor)
            };
            let raise = self.rt_void_call("spicy_rt::parse_error", vec![message]);
            let mut builder = Builder::new(self.context);
            let raise_stmt = builder.stmt_expression(raise);
            let block = builder.block(vec![raise_stmt]);
            statements.push(builder.stmt_if(None, negated, block, None));
        }

        // Track the unit's offset after every stored field.
        let offset_member = self.self_member("__offset");
        let cur = self.cur_expr();
        let offset = self.rt_typed_call("spicy_rt::view_offset", |builder| builder.uint_type(64), vec![cur]);
        let mut builder = Builder::new(self.context);
        let assign = builder.expr_assign(offset_member, offset);
        statements.push(builder.stmt_expression(assign));

        statements
    }

    /// `self.<field> = <parsed>`
    fn store_field_value(&mut self, field: NodeId, parsed: NodeId) -> Vec<NodeId> {
        let field_id = match self.context.unit_item(field).clone() {
            UnitItem::Field { id: Some(id), skip: false } => id,
            // Transient or skip fields only consume input.
            _ => return vec![Builder::new(self.context).stmt_expression(parsed)],
        };

        let member = self.self_member(field_id.local());
        let mut builder = Builder::new(self.context);
        let assign = builder.expr_assign(member, parsed);
        vec![builder.stmt_expression(assign)]
    }
}

fn production_is_container(production: &Production) -> bool {
    matches!(
        production.kind,
        ProductionKind::Counter { .. } | ProductionKind::ForEach { .. } | ProductionKind::While { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_names_escape_percent() {
        assert_eq!(hook_function_name("%done", false), "__on_0x25_done");
        assert_eq!(hook_function_name("%synced", false), "__on_0x25_synced");
        assert_eq!(hook_function_name("x", false), "__on_x");
        assert_eq!(hook_function_name("items", true), "__on_items_foreach");
    }

    #[test]
    fn parser_state_stack_push_pop() {
        let mut context = AstContext::default();
        let unit = {
            let mut builder = Builder::new(&mut context);
            builder.unit_type(vec![], vec![])
        };
        let mut parser_builder = ParserBuilder::new(&mut context, unit, ID::new("U"));

        let mut limited = parser_builder.state().clone();
        limited.cur = ID::new("__limited_cur");
        limited.ncur = Some(ID::new("__ncur"));
        parser_builder.push_state(limited);
        assert_eq!(parser_builder.state().cur.as_str(), "__limited_cur");

        parser_builder.pop_state();
        assert_eq!(parser_builder.state().cur.as_str(), "__cur");
    }
}
