//! Grammar-agnostic syntax node matching.
//!
//! Everything here uses only the generic node interface (kind tag, children,
//! fields, byte span), so the same code serves every registered grammar.

use tree_sitter::{Node, TreeCursor};

/// Kind of a plain identifier node.
pub const IDENTIFIER_KIND: &str = "identifier";

/// Kinds accepted by the fallback scan when resolving a definition's name.
pub const NAME_KINDS: &[&str] = &[IDENTIFIER_KIND, "property_identifier"];

/// Pre-order iterator over the nodes of one kind below (and including) a root.
///
/// Created by [`find_nodes`]. Walks with a [`TreeCursor`], so it allocates
/// nothing per node and never leaves the subtree it started from.
pub struct NodesOfKind<'tree, 'k> {
    cursor: TreeCursor<'tree>,
    kind: &'k str,
    done: bool,
}

impl<'tree> NodesOfKind<'tree, '_> {
    fn advance(&mut self) {
        if self.cursor.goto_first_child() {
            return;
        }
        loop {
            if self.cursor.goto_next_sibling() {
                return;
            }
            if !self.cursor.goto_parent() {
                self.done = true;
                return;
            }
        }
    }
}

impl<'tree> Iterator for NodesOfKind<'tree, '_> {
    type Item = Node<'tree>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let node = self.cursor.node();
            self.advance();
            if node.kind() == self.kind {
                return Some(node);
            }
        }
        None
    }
}

/// Lazily yield every node of `kind` in `root`'s subtree, in pre-order.
///
/// `root` itself is yielded first when it matches. Children are visited in
/// source order, anonymous nodes included.
pub fn find_nodes<'tree, 'k>(root: Node<'tree>, kind: &'k str) -> NodesOfKind<'tree, 'k> {
    NodesOfKind {
        cursor: root.walk(),
        kind,
        done: false,
    }
}

/// Source text of a node, or `None` if empty or not on a UTF-8 boundary.
pub fn node_text<'s>(node: Node<'_>, source: &'s [u8]) -> Option<&'s str> {
    node.utf8_text(source).ok().filter(|text| !text.is_empty())
}

/// First direct child whose kind is one of `kinds`.
fn first_child_of_kinds<'tree>(node: Node<'tree>, kinds: &[&str]) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| kinds.contains(&child.kind()));
    found
}

/// Resolve a definition's name.
///
/// Tries the child bound to `field_name` first and returns its text. If the
/// node has no such child, falls back to the first direct child of an
/// identifier kind (see [`NAME_KINDS`]). With several identifier children
/// the fallback is ambiguous and the first one wins.
///
/// `None` means the node has no usable name and should be skipped.
pub fn resolve_name(node: Node<'_>, field_name: &str, source: &[u8]) -> Option<String> {
    let named = match node.child_by_field_name(field_name) {
        Some(child) => child,
        None => first_child_of_kinds(node, NAME_KINDS)?,
    };
    node_text(named, source).map(str::to_string)
}

/// Resolve the callee of a call node, restricted to plain identifiers.
///
/// Same field-first strategy as [`resolve_name`], but the field child only
/// counts when it is itself an identifier, so member and qualified callees
/// (`a.b()`, `a::b()`) are not reconstructed. Without the field, the first
/// direct identifier child is used.
pub fn resolve_callee(node: Node<'_>, field_name: &str, source: &[u8]) -> Option<String> {
    let callee = match node.child_by_field_name(field_name) {
        Some(child) if child.kind() == IDENTIFIER_KIND => child,
        Some(_) => return None,
        None => first_child_of_kinds(node, &[IDENTIFIER_KIND])?,
    };
    node_text(callee, source).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str, language: tree_sitter::Language) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&language).unwrap();
        parser.parse(source, None).unwrap()
    }

    fn python(source: &str) -> tree_sitter::Tree {
        parse(source, tree_sitter_python::LANGUAGE.into())
    }

    fn javascript(source: &str) -> tree_sitter::Tree {
        parse(source, tree_sitter_javascript::LANGUAGE.into())
    }

    #[test]
    fn test_find_nodes_preorder() {
        let source = "def outer():\n    def inner():\n        pass\n\ndef last():\n    pass\n";
        let tree = python(source);
        let names: Vec<_> = find_nodes(tree.root_node(), "function_definition")
            .filter_map(|n| resolve_name(n, "name", source.as_bytes()))
            .collect();
        assert_eq!(names, vec!["outer", "inner", "last"]);
    }

    #[test]
    fn test_find_nodes_includes_root() {
        let source = "x = 1\n";
        let tree = python(source);
        let root = tree.root_node();
        let found: Vec<_> = find_nodes(root, root.kind()).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), root.id());
    }

    #[test]
    fn test_find_nodes_stays_in_subtree() {
        let source = "def a():\n    f()\n\ndef b():\n    g()\n";
        let tree = python(source);
        let first = find_nodes(tree.root_node(), "function_definition")
            .next()
            .unwrap();
        let calls: Vec<_> = find_nodes(first, "call")
            .filter_map(|n| resolve_callee(n, "function", source.as_bytes()))
            .collect();
        assert_eq!(calls, vec!["f"]);
    }

    #[test]
    fn test_find_nodes_no_match() {
        let tree = python("x = 1\n");
        assert_eq!(find_nodes(tree.root_node(), "class_definition").count(), 0);
    }

    #[test]
    fn test_resolve_name_by_field() {
        let source = "class Foo { bar() { return 1; } }";
        let tree = javascript(source);
        let method = find_nodes(tree.root_node(), "method_definition")
            .next()
            .unwrap();
        assert_eq!(
            resolve_name(method, "name", source.as_bytes()).as_deref(),
            Some("bar")
        );
    }

    #[test]
    fn test_resolve_name_fallback_takes_first_identifier() {
        // Arrow functions have no name field; the parameter is the first identifier child
        let source = "const f = x => x + 1;";
        let tree = javascript(source);
        let arrow = find_nodes(tree.root_node(), "arrow_function")
            .next()
            .unwrap();
        assert_eq!(
            resolve_name(arrow, "name", source.as_bytes()).as_deref(),
            Some("x")
        );
    }

    #[test]
    fn test_resolve_name_none_for_anonymous() {
        let source = "const f = () => 1;";
        let tree = javascript(source);
        let arrow = find_nodes(tree.root_node(), "arrow_function")
            .next()
            .unwrap();
        assert_eq!(resolve_name(arrow, "name", source.as_bytes()), None);
    }

    #[test]
    fn test_resolve_callee_skips_member_expressions() {
        let source = "function run() { helper(); obj.method(); }";
        let tree = javascript(source);
        let calls: Vec<_> = find_nodes(tree.root_node(), "call_expression")
            .map(|n| resolve_callee(n, "function", source.as_bytes()))
            .collect();
        assert_eq!(calls, vec![Some("helper".to_string()), None]);
    }

    #[test]
    fn test_resolve_callee_python_attribute() {
        let source = "os.path.join(a, b)\nprint(a)\n";
        let tree = python(source);
        let calls: Vec<_> = find_nodes(tree.root_node(), "call")
            .filter_map(|n| resolve_callee(n, "function", source.as_bytes()))
            .collect();
        assert_eq!(calls, vec!["print"]);
    }

    #[test]
    fn test_resolve_callee_java_method_invocation() {
        let source = "class A { void run() { helper(); this.other(); } }";
        let tree = parse(source, tree_sitter_java::LANGUAGE.into());
        let calls: Vec<_> = find_nodes(tree.root_node(), "method_invocation")
            .filter_map(|n| resolve_callee(n, "name", source.as_bytes()))
            .collect();
        assert_eq!(calls, vec!["helper", "other"]);
    }

    #[test]
    fn test_node_text_empty_is_none() {
        let source = "";
        let tree = python(source);
        assert_eq!(node_text(tree.root_node(), source.as_bytes()), None);
    }
}
