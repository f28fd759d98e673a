//! Traversal helpers.
//!
//! Passes operate on id snapshots rather than holding borrows into the arena:
//! [`post_order`] collects the subtree's node ids in post order, and the pass
//! then processes them one by one with full mutable access to the context.
//! Mutating visitors must not retain child ids across mutations; taking a
//! fresh snapshot per round is the supported pattern.

use crate::ast::context::AstContext;
use crate::ast::node::{NodeId, NodeKind};

/// Collects the ids of `root`'s subtree in post order (children before
/// parents, siblings in child-list order)
pub fn post_order(context: &AstContext, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    collect(context, root, &mut out);
    out
}

fn collect(context: &AstContext, id: NodeId, out: &mut Vec<NodeId>) {
    for child in context.children(id).collect::<Vec<_>>() {
        collect(context, child, out);
    }
    out.push(id);
}

/// Collects the ids of `root`'s subtree in pre order
pub fn pre_order(context: &AstContext, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        out.push(id);
        let children = context.children(id).collect::<Vec<_>>();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    out
}

/// True if `id` is still attached below `root`
pub fn is_attached(context: &AstContext, root: NodeId, id: NodeId) -> bool {
    id == root || context.ancestors(id).any(|ancestor| ancestor == root)
}

/// A one-line textual rendering of a node, used by the `ast-*` debug streams
pub fn render(context: &AstContext, id: NodeId) -> String {
    match &context.node(id).kind {
        NodeKind::Root => String::from("<root>"),
        NodeKind::Declaration(declaration) => {
            format!("decl {:?} {}", crate::ast::declaration::DeclarationClass::from(&declaration.kind), declaration.id)
        }
        NodeKind::Expression(expression) => {
            format!("expr {:?}", crate::ast::expression::ExpressionClass::from(&expression.kind))
        }
        NodeKind::Statement(statement) => format!("stmt {:?}", crate::ast::statement::StatementClass::from(&statement.kind)),
        NodeKind::Ctor(ctor) => format!("ctor {:?}", crate::ast::ctor::CtorClass::from(&ctor.kind)),
        NodeKind::Type(ty) => match &ty.unification {
            Some(unification) => format!("type {:?} [{unification}]", ty.class()),
            None => format!("type {:?} [not unified]", ty.class()),
        },
        NodeKind::QualifiedType(qt) => format!("qtype {:?} {:?}", qt.constness, qt.side),
        NodeKind::Attribute(attribute) => format!("attribute {}", attribute.kind),
        NodeKind::AttributeSet(_) => String::from("attributes"),
        NodeKind::Function(function) => format!("function {}", function.id),
        NodeKind::UnitItem(item) => format!("unit-item {item:?}"),
    }
}

/// Renders a whole subtree with indentation, one node per line
pub fn render_tree(context: &AstContext, root: NodeId) -> String {
    let mut out = String::new();
    render_indent(context, root, 0, &mut out);
    out
}

fn render_indent(context: &AstContext, id: NodeId, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&render(context, id));
    out.push('\n');
    for child in context.children(id).collect::<Vec<_>>() {
        render_indent(context, child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::meta::Meta;

    #[test]
    fn post_order_visits_children_first() {
        let mut context = AstContext::default();
        let root = context.root();
        let a = context.new_node(NodeKind::Root, Meta::default());
        let b = context.new_node(NodeKind::Root, Meta::default());
        let c = context.new_node(NodeKind::Root, Meta::default());
        context.attach_child(root, a);
        context.attach_child(a, b);
        context.attach_child(a, c);

        let order = post_order(&context, a);
        assert_eq!(order, vec![b, c, a]);
    }

    #[test]
    fn pre_order_visits_parent_first() {
        let mut context = AstContext::default();
        let root = context.root();
        let a = context.new_node(NodeKind::Root, Meta::default());
        let b = context.new_node(NodeKind::Root, Meta::default());
        context.attach_child(root, a);
        context.attach_child(a, b);

        let order = pre_order(&context, a);
        assert_eq!(order, vec![a, b]);
    }
}
