//! The type unifier: computes structural fingerprint strings.
//!
//! A post-order, mutating, monotone pass. Each unqualified type without a
//! unification string gets one computed from a fixed per-class prefix plus
//! the strings of its component types; if any component is not yet unified,
//! the type stays unset and a later round picks it up. Strings never change
//! once set.
//!
//! Types that resolve to a declaration with a fully-qualified ID serialize
//! as `name(<id>)` regardless of structure, which makes user-declared types
//! nominal while anonymous compounds stay structural. `unknown` serializes
//! to the never-match sentinel; `auto` and wildcards are never unified.

use simplelog::debug;

use crate::ast::context::AstContext;
use crate::ast::node::{NodeId, NodeKind};
use crate::ast::types::{TypeKind, NEVER_MATCH};
use crate::ast::visitor;

/// Runs one unification round over the whole context. Returns true if any
/// type received its string this round.
pub fn unify(context: &mut AstContext) -> bool {
    let mut modified = false;

    for id in visitor::post_order(context, context.root()) {
        if !matches!(context.node(id).kind, NodeKind::Type(_)) {
            continue;
        }
        let payload = context.utype(id);
        if payload.unification.is_some() || payload.wildcard {
            continue;
        }

        if let Some(serial) = serialize(context, id) {
            debug!("[type-unifier] {:?} -> {}", payload.class(), serial);
            modified |= context.set_unification(id, serial);
        }
    }

    modified
}

/// The unification string of a qualified type's inner type, if available
fn qt_serial(context: &AstContext, qt: NodeId) -> Option<String> {
    let inner = context.inner_type(qt);
    let payload = context.utype(inner);
    if payload.wildcard {
        return Some(format!("{:?}(*)", payload.class()));
    }
    payload.unification.clone()
}

/// Serializes one unqualified type, or `None` if a component is not ready
fn serialize(context: &AstContext, ty: NodeId) -> Option<String> {
    // Nominal short-circuit for declared name types.
    let payload = context.utype(ty);
    if payload.is_name_type() {
        if let Some(id) = context.type_id(ty) {
            return Some(format!("name({id})"));
        }
    }

    match &payload.kind {
        TypeKind::Bool => Some(String::from("bool")),
        TypeKind::SignedInteger { width } => Some(format!("int({width})")),
        TypeKind::UnsignedInteger { width } => Some(format!("uint({width})")),
        TypeKind::Real => Some(String::from("real")),
        TypeKind::Interval => Some(String::from("interval")),
        TypeKind::Time => Some(String::from("time")),
        TypeKind::Address => Some(String::from("address")),
        TypeKind::String_ => Some(String::from("string")),
        TypeKind::Bytes => Some(String::from("bytes")),
        TypeKind::BytesIterator => Some(String::from("iterator(bytes)")),
        TypeKind::Stream => Some(String::from("stream")),
        TypeKind::StreamIterator => Some(String::from("iterator(stream)")),
        TypeKind::StreamView => Some(String::from("view(stream)")),
        TypeKind::RegExp => Some(String::from("regexp")),
        TypeKind::Void => Some(String::from("void")),
        TypeKind::Sink => Some(String::from("sink")),
        TypeKind::Unknown => Some(String::from(NEVER_MATCH)),
        // Never set; unified once the actual type has been inferred.
        TypeKind::Auto => None,

        TypeKind::Name { resolved, .. } => match resolved {
            Some(_) => {
                let followed = context.follow(ty);
                match followed == ty {
                    true => None,
                    false => {
                        let target = context.utype(followed);
                        if target.is_name_type() {
                            context.type_id(followed).map(|id| format!("name({id})"))
                        } else {
                            target.unification.clone()
                        }
                    }
                }
            }
            None => None,
        },

        // Anonymous nominal classes (no declaration yet): structural form.
        TypeKind::Enum { labels } => {
            let body = labels.iter().map(|label| format!("{}:{}", label.id, label.value)).collect::<Vec<_>>().join(",");
            Some(format!("enum({body})"))
        }
        TypeKind::Bitfield { width, bits } => {
            let mut serial = format!("bitfield({width},");
            for bit in bits {
                serial.push_str(&format!("{}:{}:{},", bit.id, bit.lower, bit.upper));
            }
            serial.push(')');
            Some(serial)
        }
        TypeKind::Struct { .. } => {
            let mut parts = Vec::new();
            for field in context.type_fields(ty) {
                let field_ty = context.declaration_type(field)?;
                parts.push(format!("{}:{}", context.declaration(field).id, qt_serial(context, field_ty)?));
            }
            Some(format!("struct({})", parts.join(",")))
        }
        TypeKind::Union => {
            let mut parts = Vec::new();
            for field in context.type_fields(ty) {
                let field_ty = context.declaration_type(field)?;
                parts.push(format!("{}:{}", context.declaration(field).id, qt_serial(context, field_ty)?));
            }
            Some(format!("union({})", parts.join(",")))
        }
        TypeKind::Tuple { names } => {
            let mut parts = Vec::new();
            for (index, element) in context.children(ty).enumerate() {
                let name = names.get(index).cloned().flatten().map(|id| format!("{id}:")).unwrap_or_default();
                parts.push(format!("{name}{}", qt_serial(context, element)?));
            }
            Some(format!("tuple({})", parts.join(",")))
        }

        TypeKind::List => Some(format!("list({})", element_serial(context, ty)?)),
        TypeKind::Vector => Some(format!("vector({})", element_serial(context, ty)?)),
        TypeKind::Set => Some(format!("set({})", element_serial(context, ty)?)),
        TypeKind::Map => {
            let key = context.child(ty, 0).and_then(|key| qt_serial(context, key))?;
            let value = context.child(ty, 1).and_then(|value| qt_serial(context, value))?;
            Some(format!("map({key},{value})"))
        }
        TypeKind::Iterator => Some(format!("iterator({})", element_serial(context, ty)?)),
        TypeKind::Optional => Some(format!("optional({})", inner_serial(context, ty)?)),
        TypeKind::Result_ => Some(format!("result({})", inner_serial(context, ty)?)),
        TypeKind::StrongReference => Some(format!("strong_ref({})", inner_serial(context, ty)?)),
        TypeKind::WeakReference => Some(format!("weak_ref({})", inner_serial(context, ty)?)),
        TypeKind::ValueReference => Some(format!("value_ref({})", inner_serial(context, ty)?)),

        TypeKind::Function { .. } => {
            let result = context.child(ty, 0).and_then(|result| qt_serial(context, result))?;
            let mut serial = format!("function(result:{result}");
            for parameter in context.type_parameters(ty) {
                let parameter_ty = context.declaration_type(parameter)?;
                serial.push_str(", ");
                serial.push_str(&qt_serial(context, parameter_ty)?);
            }
            serial.push(')');
            Some(serial)
        }

        TypeKind::OperandList => {
            let mut parts = Vec::new();
            for slot in context.node(ty).children.clone() {
                match slot {
                    Some(operand) => parts.push(qt_serial(context, operand)?),
                    None => parts.push(String::from("any")),
                }
            }
            Some(format!("operand-list({})", parts.join(",")))
        }

        TypeKind::Type_ => Some(format!("type({})", inner_serial(context, ty)?)),
        TypeKind::Member { id } => Some(format!("member({id})")),
        TypeKind::Library { cxx_name } => Some(format!("library({cxx_name})")),

        // Units are always declared; without a declaration they cannot be
        // unified yet.
        TypeKind::Unit(_) => None,
    }
}

fn element_serial(context: &AstContext, ty: NodeId) -> Option<String> {
    context.child(ty, 0).and_then(|element| qt_serial(context, element))
}

fn inner_serial(context: &AstContext, ty: NodeId) -> Option<String> {
    context.child(ty, 0).and_then(|inner| qt_serial(context, inner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::builder::Builder;
    use crate::ast::id::{ModuleUid, ID};
    use pretty_assertions::assert_eq;

    #[test]
    fn scalar_unifications() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let int64 = builder.int_type(64);
        let qt = builder.qtype_nonconst(int64);
        let global = builder.global_decl(ID::new("x"), qt, None, Default::default());
        builder.add_declaration(module, global);

        unify(&mut context);
        assert_eq!(context.utype(int64).unification.as_deref(), Some("int(64)"));
    }

    #[test]
    fn container_unification_waits_for_elements() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let auto = builder.auto_type();
        let auto_qt = builder.qtype_nonconst(auto);
        let vector = builder.vector_type(auto_qt);
        let vector_qt = builder.qtype_nonconst(vector);
        let global = builder.global_decl(ID::new("v"), vector_qt, None, Default::default());
        builder.add_declaration(module, global);

        unify(&mut context);
        // Element type is auto, so the vector must stay un-unified.
        assert_eq!(context.utype(vector).unification, None);
    }

    #[test]
    fn vector_of_real_unifies() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let real = builder.real_type();
        let real_qt = builder.qtype_nonconst(real);
        let vector = builder.vector_type(real_qt);
        let vector_qt = builder.qtype_nonconst(vector);
        let global = builder.global_decl(ID::new("v"), vector_qt, None, Default::default());
        builder.add_declaration(module, global);

        unify(&mut context);
        assert_eq!(context.utype(vector).unification.as_deref(), Some("vector(real)"));
    }

    #[test]
    fn unification_is_stable_across_reruns() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let real = builder.real_type();
        let qt = builder.qtype_nonconst(real);
        let global = builder.global_decl(ID::new("y"), qt, None, Default::default());
        builder.add_declaration(module, global);

        assert!(unify(&mut context));
        let first = context.utype(real).unification.clone();
        assert!(!unify(&mut context));
        assert_eq!(context.utype(real).unification, first);
    }

    #[test]
    fn empty_map_ctor_defaults_to_unknown() {
        use crate::ast::types::NEVER_MATCH;

        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let ctor = builder.ctor_map(vec![]);
        let expr = builder.expr_ctor(ctor);
        let auto = builder.auto_type();
        let auto_qt = builder.qtype_nonconst(auto);
        let global = builder.global_decl(ID::new("m"), auto_qt, Some(expr), Default::default());
        builder.add_declaration(module, global);

        unify(&mut context);

        // Without an outer constraint, key and value stay at the never-match
        // sentinel; resolution must be driven by an annotation.
        let map_qt = context.ctor_type(ctor).unwrap();
        let map_ty = context.inner_type(map_qt);
        let key = context.key_type(map_ty).unwrap();
        assert_eq!(context.utype(context.inner_type(key)).unification.as_deref(), Some(NEVER_MATCH));
    }

    #[test]
    fn declared_struct_is_nominal() {
        let mut context = AstContext::default();
        let mut builder = Builder::new(&mut context);
        let module = builder.module(ModuleUid::new(ID::new("M"), "m.hlt"));

        let struct_ty = builder.struct_type(vec![], vec![]);
        let decl = builder.type_decl(ID::new("S"), struct_ty, Default::default());
        builder.add_declaration(module, decl);
        context.declaration_mut(decl).fully_qualified_id = Some(ID::new("M::S"));

        unify(&mut context);
        assert_eq!(context.utype(struct_ty).unification.as_deref(), Some("name(M::S)"));
    }
}
