//! The coercion engine.
//!
//! Answers two questions: *may this value or type convert to that type*, and
//! *materialize the conversion*. Behavior is selected by a [`CoercionStyle`]
//! bitmask; the rules run in a fixed order and the first success wins. A
//! successful coercion either reports "no change needed" or returns a new
//! detached expression for the caller to swap in.
//!
//! Plugin-specific coercions are consulted in plugin order before the
//! generic ctor and type rules.

use bitflags::bitflags;
use simplelog::debug;

use crate::ast::builder::Builder;
use crate::ast::context::AstContext;
use crate::ast::ctor::CtorKind;
use crate::ast::expression::ExpressionKind;
use crate::ast::node::NodeId;
use crate::ast::types::{Constness, TypeClass, TypeKind};
use crate::ast::visitor;
use crate::compiler::plugin::PluginRegistry;

bitflags! {
    /// Mode bits controlling which coercion rules may apply
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CoercionStyle: u32 {
        const TRY_EXACT_MATCH = 1 << 0;
        const TRY_CONST_PROMOTION = 1 << 1;
        const TRY_COERCION = 1 << 2;
        const TRY_COERCION_WITHIN_SAME_TYPE = 1 << 3;
        const TRY_DEREF = 1 << 4;
        const DISALLOW_TYPE_CHANGES = 1 << 5;
        const ASSIGNMENT = 1 << 6;
        const FUNCTION_CALL = 1 << 7;
        const OPERAND_MATCHING = 1 << 8;
        const CONTEXTUAL_CONVERSION = 1 << 9;
    }
}

impl CoercionStyle {
    pub fn try_all_for_assignment() -> Self {
        Self::TRY_EXACT_MATCH | Self::TRY_CONST_PROMOTION | Self::TRY_COERCION | Self::ASSIGNMENT
    }

    pub fn try_all_for_matching() -> Self {
        Self::TRY_EXACT_MATCH | Self::TRY_CONST_PROMOTION | Self::TRY_COERCION | Self::OPERAND_MATCHING
    }

    pub fn try_all_for_function_call() -> Self {
        Self::TRY_EXACT_MATCH | Self::TRY_CONST_PROMOTION | Self::TRY_COERCION | Self::FUNCTION_CALL
    }

    pub fn try_direct_match_for_function_call() -> Self {
        Self::TRY_EXACT_MATCH | Self::TRY_CONST_PROMOTION | Self::FUNCTION_CALL
    }
}

/// Outcome of a coercion attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The value already has the requested type; nothing to do
    Unchanged,
    /// A new (detached) expression carrying the converted value
    Replaced(NodeId),
}

/// Tests whether a value of type `src` can become `dst` under `style`,
/// without materializing anything
pub fn match_type(context: &mut AstContext, plugins: Option<&PluginRegistry>, src: NodeId, dst: NodeId, style: CoercionStyle) -> bool {
    attempt(context, plugins, None, src, dst, style).is_some()
}

/// Coerces `expr` (of type `src`) to `dst`. `None` means the coercion is not
/// possible under the given style.
pub fn coerce_expression(
    context: &mut AstContext,
    plugins: Option<&PluginRegistry>,
    expr: NodeId,
    src: NodeId,
    dst: NodeId,
    style: CoercionStyle,
) -> Option<Coerced> {
    attempt(context, plugins, Some(expr), src, dst, style)
}

/// The rule chain. `expr` is `None` for type-only matching; rules that would
/// materialize still succeed then, reporting `Unchanged`.
fn attempt(
    context: &mut AstContext,
    plugins: Option<&PluginRegistry>,
    expr: Option<NodeId>,
    src: NodeId,
    dst: NodeId,
    style: CoercionStyle,
) -> Option<Coerced> {
    let src_inner = context.inner_type(src);
    let dst_inner = context.inner_type(dst);
    let src_kind = context.utype(src_inner).class();
    let dst_kind = context.utype(dst_inner).class();

    // 1. `auto` on either side is a placeholder for later inference.
    if matches!(src_kind, TypeClass::Auto) || matches!(dst_kind, TypeClass::Auto) {
        return Some(Coerced::Unchanged);
    }

    // 2. Matching language-level names or declared type identities.
    if let (Some(a), Some(b)) = (context.type_cxx_name(src_inner), context.type_cxx_name(dst_inner)) {
        if a == b {
            return Some(Coerced::Unchanged);
        }
    }
    if let (Some(a), Some(b)) = (context.type_id(src_inner), context.type_id(dst_inner)) {
        if a == b {
            return Some(Coerced::Unchanged);
        }
    }

    // 3. Exact structural equality.
    if style.contains(CoercionStyle::TRY_EXACT_MATCH)
        && context.same_type(src_inner, dst_inner)
        && context.qtype(src).constness == context.qtype(dst).constness
    {
        return Some(Coerced::Unchanged);
    }

    // 4. Equal except for constness under promotion-friendly modes.
    if style.intersects(CoercionStyle::TRY_CONST_PROMOTION | CoercionStyle::ASSIGNMENT | CoercionStyle::FUNCTION_CALL | CoercionStyle::OPERAND_MATCHING)
        && context.same_type(src_inner, dst_inner)
    {
        return Some(Coerced::Unchanged);
    }

    // 5. Wildcard class match (covered by same_type, but also across
    //    constness).
    if src_kind == dst_kind && (context.utype(src_inner).wildcard || context.utype(dst_inner).wildcard) {
        return Some(Coerced::Unchanged);
    }

    if style.contains(CoercionStyle::DISALLOW_TYPE_CHANGES) {
        return None;
    }

    // 6. Under assignment or call context, T fits into optional<T>,
    //    result<T>, and (for non-references) value_ref<T>.
    if style.intersects(CoercionStyle::ASSIGNMENT | CoercionStyle::FUNCTION_CALL) {
        if matches!(dst_kind, TypeClass::Optional | TypeClass::Result_) {
            if let Some(wrapped) = context.dereferenced_type(dst_inner) {
                let wrapped_inner = context.inner_type(wrapped);
                if context.same_type(src_inner, wrapped_inner) {
                    return Some(wrap(context, expr, dst));
                }
            }
        }
        if matches!(dst_kind, TypeClass::ValueReference) && !context.utype(src_inner).is_reference_type() {
            if let Some(wrapped) = context.dereferenced_type(dst_inner) {
                let wrapped_inner = context.inner_type(wrapped);
                if context.same_type(src_inner, wrapped_inner) {
                    return Some(wrap(context, expr, dst));
                }
            }
        }
    }

    // 7a. Plugin coercions, in plugin order.
    if let (Some(plugins), Some(expr)) = (plugins, expr) {
        if let Some(ctor) = ctor_of(context, expr) {
            for plugin in plugins.in_order() {
                if let Some(coerce_ctor) = &plugin.coerce_ctor {
                    if let Some(new_ctor) = coerce_ctor(context, ctor, dst) {
                        let mut builder = Builder::new(context);
                        let new_expr = builder.expr_ctor(new_ctor);
                        return Some(Coerced::Replaced(new_expr));
                    }
                }
            }
        }
        for plugin in plugins.in_order() {
            if let Some(coerce_type) = &plugin.coerce_type {
                if coerce_type(context, src, dst).is_some() {
                    return Some(wrap(context, Some(expr), dst));
                }
            }
        }
    }

    // 7b. Ctor-specific value rules.
    if style.contains(CoercionStyle::TRY_COERCION) {
        if let Some(expr) = expr {
            if let Some(ctor) = ctor_of(context, expr) {
                if let Some(new_ctor) = coerce_ctor(context, plugins, ctor, dst, style) {
                    let mut builder = Builder::new(context);
                    let new_expr = builder.expr_ctor(new_ctor);
                    return Some(Coerced::Replaced(new_expr));
                }
            }
        }
    }

    // 7c. Context- and class-specific type rules.
    if style.contains(CoercionStyle::TRY_COERCION) && type_coerces(context, src_inner, dst_inner, style) {
        return Some(wrap(context, expr, dst));
    }

    None
}

/// Wraps an expression in a `Coerced` node targeting `dst`
fn wrap(context: &mut AstContext, expr: Option<NodeId>, dst: NodeId) -> Coerced {
    let Some(expr) = expr else { return Coerced::Unchanged };
    let inner = context.deep_copy(expr);
    let target = context.deep_copy(dst);
    let mut builder = Builder::new(context);
    let coerced = builder.expr_coerced(inner, target);
    Coerced::Replaced(coerced)
}

/// The ctor node behind an expression, unwrapping `Coerced` ctor wrappers
fn ctor_of(context: &AstContext, expr: NodeId) -> Option<NodeId> {
    match &context.expression(expr).kind {
        ExpressionKind::Ctor => context.child(expr, 0),
        _ => None,
    }
}

/// Pure type-level conversions (no literal inspection)
fn type_coerces(context: &AstContext, src: NodeId, dst: NodeId, style: CoercionStyle) -> bool {
    let src_payload = &context.utype(src).kind;
    let dst_payload = &context.utype(dst).kind;

    match (src_payload, dst_payload) {
        // Integer values widen into real.
        (TypeKind::SignedInteger { .. } | TypeKind::UnsignedInteger { .. }, TypeKind::Real) => true,

        // bytes flow into streams, streams into their views.
        (TypeKind::Bytes, TypeKind::Stream) => true,
        (TypeKind::Stream, TypeKind::StreamView) => true,

        // The three reference flavors interconvert when the referents agree.
        (TypeKind::ValueReference, TypeKind::StrongReference)
        | (TypeKind::ValueReference, TypeKind::WeakReference)
        | (TypeKind::StrongReference, TypeKind::ValueReference)
        | (TypeKind::StrongReference, TypeKind::WeakReference)
        | (TypeKind::WeakReference, TypeKind::StrongReference)
        | (TypeKind::WeakReference, TypeKind::ValueReference) => {
            match (context.dereferenced_type(src), context.dereferenced_type(dst)) {
                (Some(a), Some(b)) => context.same_type(context.inner_type(a), context.inner_type(b)),
                _ => false,
            }
        }

        // A reference also derefs into its referent under operand matching.
        (TypeKind::StrongReference | TypeKind::WeakReference | TypeKind::ValueReference, _) if style.contains(CoercionStyle::TRY_DEREF) => {
            match context.dereferenced_type(src) {
                Some(deref) => context.same_type(context.inner_type(deref), dst),
                None => false,
            }
        }

        // Truth-value contexts.
        (
            TypeKind::Enum { .. }
            | TypeKind::Interval
            | TypeKind::Time
            | TypeKind::Result_
            | TypeKind::Union
            | TypeKind::Optional
            | TypeKind::StrongReference
            | TypeKind::WeakReference
            | TypeKind::ValueReference,
            TypeKind::Bool,
        ) => style.contains(CoercionStyle::CONTEXTUAL_CONVERSION),

        _ => false,
    }
}

/// Ctor-specific coercions; returns the converted (detached) ctor
pub fn coerce_ctor(context: &mut AstContext, plugins: Option<&PluginRegistry>, ctor: NodeId, dst: NodeId, style: CoercionStyle) -> Option<NodeId> {
    let dst_inner = context.inner_type(dst);
    let dst_kind = context.utype(dst_inner).kind.clone();
    let ctor_kind = context.ctor(ctor).kind.clone();

    match (&ctor_kind, &dst_kind) {
        /* integer literals */
        (CtorKind::SignedInteger { value, .. }, TypeKind::SignedInteger { width }) => {
            fits_signed(*value, *width).then(|| Builder::new(context).ctor_int(*value, *width))
        }
        (CtorKind::SignedInteger { value, .. }, TypeKind::UnsignedInteger { width }) => {
            (*value >= 0 && fits_unsigned(*value as u64, *width)).then(|| Builder::new(context).ctor_uint(*value as u64, *width))
        }
        (CtorKind::UnsignedInteger { value, .. }, TypeKind::UnsignedInteger { width }) => {
            fits_unsigned(*value, *width).then(|| Builder::new(context).ctor_uint(*value, *width))
        }
        (CtorKind::UnsignedInteger { value, .. }, TypeKind::SignedInteger { width }) => {
            (i64::try_from(*value).map(|value| fits_signed(value, *width)).unwrap_or(false))
                .then(|| Builder::new(context).ctor_int(*value as i64, *width))
        }

        /* integer to real, if exactly representable */
        (CtorKind::SignedInteger { value, .. }, TypeKind::Real) => {
            ((*value as f64) as i64 == *value).then(|| Builder::new(context).ctor_real(*value as f64))
        }
        (CtorKind::UnsignedInteger { value, .. }, TypeKind::Real) => {
            ((*value as f64) as u64 == *value).then(|| Builder::new(context).ctor_real(*value as f64))
        }

        /* real to sized integer, if exactly representable */
        (CtorKind::Real { value }, TypeKind::SignedInteger { width }) => {
            (value.fract() == 0.0 && fits_signed(*value as i64, *width) && (*value as i64) as f64 == *value)
                .then(|| Builder::new(context).ctor_int(*value as i64, *width))
        }
        (CtorKind::Real { value }, TypeKind::UnsignedInteger { width }) => {
            (value.fract() == 0.0 && *value >= 0.0 && fits_unsigned(*value as u64, *width) && (*value as u64) as f64 == *value)
                .then(|| Builder::new(context).ctor_uint(*value as u64, *width))
        }

        /* tuple to tuple, pointwise */
        (CtorKind::Tuple, TypeKind::Tuple { .. }) => {
            let values = context.ctor_values(ctor);
            let targets: Vec<NodeId> = context.children(dst_inner).collect();
            if values.len() != targets.len() {
                return None;
            }
            let mut coerced = Vec::new();
            for (value, target) in values.into_iter().zip(targets) {
                coerced.push(coerce_element(context, plugins, value, target, style)?);
            }
            let target_copy = context.deep_copy(dst);
            let mut builder = Builder::new(context);
            let tuple = builder.ctor_tuple(coerced);
            builder.context.set_child(tuple, 0, Some(target_copy));
            Some(tuple)
        }

        /* list ctor into list, vector, or set */
        (CtorKind::List, TypeKind::List | TypeKind::Vector | TypeKind::Set) => {
            let element = context.element_type(dst_inner)?;
            let values = context.ctor_values(ctor);
            let mut coerced = Vec::new();
            for value in values {
                coerced.push(coerce_element(context, plugins, value, element, style)?);
            }
            let target_copy = context.deep_copy(dst);
            let mut builder = Builder::new(context);
            let new_ctor = match dst_kind {
                TypeKind::List => builder.ctor_list(coerced),
                TypeKind::Vector => builder.ctor_vector(coerced),
                _ => builder.ctor_set(coerced),
            };
            builder.context.set_child(new_ctor, 0, Some(target_copy));
            Some(new_ctor)
        }

        /* map ctor into map, pointwise over keys and values */
        (CtorKind::Map, TypeKind::Map) => {
            let key_ty = context.key_type(dst_inner)?;
            let value_ty = context.element_type(dst_inner)?;
            let entries = context.ctor_values(ctor);
            let mut coerced = Vec::new();
            for pair in entries.chunks(2) {
                let [key, value] = pair else { return None };
                let key = coerce_element(context, plugins, *key, key_ty, style)?;
                let value = coerce_element(context, plugins, *value, value_ty, style)?;
                coerced.push((key, value));
            }
            let target_copy = context.deep_copy(dst);
            let mut builder = Builder::new(context);
            let new_ctor = builder.ctor_map(coerced);
            builder.context.set_child(new_ctor, 0, Some(target_copy));
            Some(new_ctor)
        }

        /* struct ctor into struct type */
        (CtorKind::Struct { ids }, TypeKind::Struct { .. }) => {
            coerce_struct_ctor(context, plugins, ctor, ids, dst, dst_inner, style)
        }

        /* struct ctor into bitfield */
        (CtorKind::Struct { ids }, TypeKind::Bitfield { bits, .. }) => {
            let known: Vec<&str> = bits.iter().map(|bit| bit.id.as_str()).collect();
            if !ids.iter().all(|id| known.contains(&id.as_str())) {
                return None;
            }
            let target_copy = context.deep_copy(dst);
            let original = context.deep_copy(ctor);
            let mut builder = Builder::new(context);
            let node = builder.ctor_coerced(target_copy, original);
            Some(node)
        }

        /* null into optional and references */
        (CtorKind::Null, TypeKind::Optional) => {
            let target_copy = context.deep_copy(dst);
            Some(Builder::new(context).ctor_optional(target_copy, None))
        }
        (CtorKind::Null, TypeKind::StrongReference | TypeKind::WeakReference) => {
            let target_copy = context.deep_copy(dst);
            Some(Builder::new(context).ctor_default(target_copy, Vec::new()))
        }

        /* bytes into stream */
        (CtorKind::Bytes { .. }, TypeKind::Stream) => {
            let target_copy = context.deep_copy(dst);
            let original = context.deep_copy(ctor);
            Some(Builder::new(context).ctor_coerced(target_copy, original))
        }

        /* a value fits into optional<T> / result<T> as a ctor too */
        (_, TypeKind::Optional | TypeKind::Result_) if style.intersects(CoercionStyle::ASSIGNMENT | CoercionStyle::FUNCTION_CALL) => {
            let wrapped = context.dereferenced_type(dst_inner)?;
            let ctor_ty = context.ctor_type(ctor)?;
            if !context.same_type(context.inner_type(ctor_ty), context.inner_type(wrapped)) {
                return None;
            }
            let target_copy = context.deep_copy(dst);
            let original = context.deep_copy(ctor);
            let mut builder = Builder::new(context);
            let value = builder.expr_ctor(original);
            match dst_kind {
                TypeKind::Optional => Some(builder.ctor_optional(target_copy, Some(value))),
                _ => Some(builder.ctor_result(target_copy, Some(value))),
            }
        }

        _ => None,
    }
}

/// Coerces one element expression inside a container ctor
fn coerce_element(context: &mut AstContext, plugins: Option<&PluginRegistry>, value: NodeId, target: NodeId, style: CoercionStyle) -> Option<NodeId> {
    let src = context.expression_type(value)?;
    match attempt(context, plugins, Some(value), src, target, style)? {
        Coerced::Unchanged => Some(context.deep_copy(value)),
        Coerced::Replaced(new_value) => Some(new_value),
    }
}

fn coerce_struct_ctor(
    context: &mut AstContext,
    plugins: Option<&PluginRegistry>,
    ctor: NodeId,
    ids: &[crate::ast::id::ID],
    dst: NodeId,
    dst_inner: NodeId,
    style: CoercionStyle,
) -> Option<NodeId> {
    let fields = context.type_fields(dst_inner);
    let field_names: Vec<String> = fields.iter().map(|field| context.declaration(*field).id.local().to_string()).collect();

    // Every ctor field must exist in the target.
    for id in ids {
        if !field_names.iter().any(|name| name == id.local()) {
            debug!("[coercer] struct ctor field '{id}' not in target type");
            return None;
        }
    }

    // Every omitted target field must be optional, internal, defaulted, or
    // function-typed.
    for (field, name) in fields.iter().zip(&field_names) {
        if ids.iter().any(|id| id.local() == name) {
            continue;
        }
        if !field_is_omittable(context, *field) {
            debug!("[coercer] target field '{name}' may not be omitted");
            return None;
        }
    }

    // Coerce each ctor value against its target field type.
    let values = context.ctor_values(ctor);
    let mut coerced = Vec::new();
    for (id, value) in ids.iter().zip(values) {
        let field = fields
            .iter()
            .zip(&field_names)
            .find(|(_, name)| name.as_str() == id.local())
            .map(|(field, _)| *field)?;
        let field_ty = context.declaration_type(field)?;
        let new_value = coerce_element(context, plugins, value, field_ty, style)?;
        coerced.push((id.clone(), new_value));
    }

    let target_copy = context.deep_copy(dst);
    let mut builder = Builder::new(context);
    let new_ctor = builder.ctor_struct(coerced);
    builder.context.set_child(new_ctor, 0, Some(target_copy));
    Some(new_ctor)
}

fn field_is_omittable(context: &AstContext, field: NodeId) -> bool {
    use crate::ast::attribute::AttributeKind;

    let attributes = context.field_attributes(field);
    if context.has_attribute(attributes, AttributeKind::Optional)
        || context.has_attribute(attributes, AttributeKind::Internal)
        || context.has_attribute(attributes, AttributeKind::Default)
    {
        return true;
    }

    match context.declaration_type(field) {
        Some(ty) => context.utype(context.inner_type(ty)).kind.is_function(),
        None => false,
    }
}

fn fits_signed(value: i64, width: u16) -> bool {
    match width {
        8 => i8::try_from(value).is_ok(),
        16 => i16::try_from(value).is_ok(),
        32 => i32::try_from(value).is_ok(),
        64 => true,
        _ => false,
    }
}

fn fits_unsigned(value: u64, width: u16) -> bool {
    match width {
        8 => u8::try_from(value).is_ok(),
        16 => u16::try_from(value).is_ok(),
        32 => u32::try_from(value).is_ok(),
        64 => true,
        _ => false,
    }
}

/// Strips `Coerced` wrappers below `root`, exposing the final nodes; used by
/// the transform pipeline once the back end should see results directly
pub fn strip_coercions(context: &mut AstContext, root: NodeId) -> bool {
    let mut modified = false;
    for id in visitor::post_order(context, root) {
        if !context.is_expression(id) {
            continue;
        }
        if let ExpressionKind::Coerced = context.expression(id).kind {
            if let Some(inner) = context.child(id, 0) {
                context.detach_child(id, 0);
                context.replace_child(id, inner);
                modified = true;
            }
        }
    }
    modified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::id::ID;
    use rstest::rstest;

    fn ctx() -> AstContext {
        AstContext::default()
    }

    #[rstest]
    #[case(-128, 8, true)]
    #[case(-129, 8, false)]
    #[case(127, 8, true)]
    #[case(128, 8, false)]
    #[case(32767, 16, true)]
    #[case(32768, 16, false)]
    fn signed_literal_width_fit(#[case] value: i64, #[case] width: u16, #[case] expected: bool) {
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let ctor = builder.ctor_int(value, 64);
        let target_ty = builder.int_type(width);
        let target = builder.qtype_const(target_ty);

        let result = coerce_ctor(&mut context, None, ctor, target, CoercionStyle::try_all_for_assignment());
        assert_eq!(result.is_some(), expected);
    }

    #[test]
    fn negative_literal_never_fits_unsigned() {
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let ctor = builder.ctor_int(-128, 64);
        let target_ty = builder.uint_type(8);
        let target = builder.qtype_const(target_ty);

        assert!(coerce_ctor(&mut context, None, ctor, target, CoercionStyle::try_all_for_assignment()).is_none());
    }

    #[test]
    fn unsigned_literal_range_check() {
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let ctor = builder.ctor_uint(256, 64);
        let target_ty = builder.uint_type(8);
        let target = builder.qtype_const(target_ty);

        assert!(coerce_ctor(&mut context, None, ctor, target, CoercionStyle::try_all_for_assignment()).is_none());
    }

    #[rstest]
    #[case(3.0, true)]
    #[case(3.5, false)]
    fn real_to_integer_exactness(#[case] value: f64, #[case] expected: bool) {
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let ctor = builder.ctor_real(value);
        let target_ty = builder.int_type(8);
        let target = builder.qtype_const(target_ty);

        let result = coerce_ctor(&mut context, None, ctor, target, CoercionStyle::try_all_for_assignment());
        assert_eq!(result.is_some(), expected);
    }

    #[test]
    fn int_to_real_coerces_exactly() {
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let ctor = builder.ctor_int(5, 64);
        let target_ty = builder.real_type();
        let target = builder.qtype_const(target_ty);

        let coerced = coerce_ctor(&mut context, None, ctor, target, CoercionStyle::try_all_for_assignment()).unwrap();
        assert!(matches!(context.ctor(coerced).kind, CtorKind::Real { value } if value == 5.0));
    }

    #[test]
    fn coercion_is_idempotent_on_same_type() {
        use crate::ast::id::ModuleUid;

        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let ctor = builder.ctor_int(5, 64);
        let expr = builder.expr_ctor(ctor);
        let target_ty = builder.int_type(64);
        let target = builder.qtype_const(target_ty);

        // Attach everything so the unifier reaches it.
        let holder = builder.global_decl(ID::new("x"), target, Some(expr), Default::default());
        builder.add_declaration(module, holder);

        crate::compiler::type_unifier::unify(&mut context);
        let src = context.expression_type(expr).unwrap();
        let outcome = coerce_expression(&mut context, None, expr, src, target, CoercionStyle::try_all_for_assignment()).unwrap();
        assert_eq!(outcome, Coerced::Unchanged);
    }

    #[test]
    fn null_coerces_into_optional() {
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let ctor = builder.ctor_null();
        let inner = builder.int_type(32);
        let inner_qt = builder.qtype_nonconst(inner);
        let optional = builder.optional_type(inner_qt);
        let target = builder.qtype_const(optional);

        let coerced = coerce_ctor(&mut context, None, ctor, target, CoercionStyle::try_all_for_assignment()).unwrap();
        assert!(context.ctor(coerced).kind.is_optional());
    }

    #[test]
    fn list_ctor_coerces_into_vector() {
        use crate::ast::id::ModuleUid;

        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let a = builder.ctor_int(1, 64);
        let a = builder.expr_ctor(a);
        let b = builder.ctor_int(2, 64);
        let b = builder.expr_ctor(b);
        let list = builder.ctor_list(vec![a, b]);
        let list_expr = builder.expr_ctor(list);

        let element = builder.int_type(64);
        let element_qt = builder.qtype_nonconst(element);
        let vector = builder.vector_type(element_qt);
        let target = builder.qtype_const(vector);

        let holder = builder.global_decl(ID::new("v"), target, Some(list_expr), Default::default());
        builder.add_declaration(module, holder);

        crate::compiler::type_unifier::unify(&mut context);
        let coerced = coerce_ctor(&mut context, None, list, target, CoercionStyle::try_all_for_assignment()).unwrap();
        assert!(context.ctor(coerced).kind.is_vector());
        assert_eq!(context.ctor_values(coerced).len(), 2);
    }

    #[test]
    fn struct_ctor_rejects_unknown_field() {
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);

        let field_ty = builder.int_type(32);
        let field_qt = builder.qtype_nonconst(field_ty);
        let field = builder.field_decl(ID::new("a"), field_qt, None, None);
        let struct_ty = builder.struct_type(vec![], vec![field]);
        let target = builder.qtype_const(struct_ty);

        let value = builder.ctor_int(1, 32);
        let value = builder.expr_ctor(value);
        let ctor = builder.ctor_struct(vec![(ID::new("bogus"), value)]);

        crate::compiler::type_unifier::unify(&mut context);
        assert!(coerce_ctor(&mut context, None, ctor, target, CoercionStyle::try_all_for_assignment()).is_none());
    }

    #[test]
    fn superset_style_still_succeeds() {
        use crate::ast::id::ModuleUid;

        // Monotonicity: if a style succeeds, a superset (without
        // DISALLOW_TYPE_CHANGES) succeeds too.
        let mut context = ctx();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));
        let ctor = builder.ctor_int(7, 64);
        let expr = builder.expr_ctor(ctor);
        let target_ty = builder.int_type(64);
        let target = builder.qtype_const(target_ty);
        let holder = builder.global_decl(ID::new("x"), target, Some(expr), Default::default());
        builder.add_declaration(module, holder);

        crate::compiler::type_unifier::unify(&mut context);
        let src = context.expression_type(expr).unwrap();

        let small = CoercionStyle::TRY_EXACT_MATCH;
        let large = CoercionStyle::try_all_for_assignment() | CoercionStyle::CONTEXTUAL_CONVERSION;
        assert!(coerce_expression(&mut context, None, expr, src, target, small).is_some());
        assert!(coerce_expression(&mut context, None, expr, src, target, large).is_some());
    }
}
