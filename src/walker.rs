//! Tree Walker (C4)
//!
//! Flattens a `tree_sitter::Tree` into a pre-order sequence of named nodes
//! with explicit parent indices, using an explicit-stack loop rather than
//! recursion: a syntax tree can nest arbitrarily deep, and a recursive
//! walk would blow the call stack on a file built to exploit that.

use tree_sitter::{Node, Tree};

/// One visited node plus the index of its parent in the same output
/// vector (`None` for the root).
pub struct WalkedNode<'tree> {
    pub node: Node<'tree>,
    pub parent_index: Option<usize>,
    pub depth: usize,
}

/// Pre-order walk of every named node in `tree`, including the root.
/// Anonymous tokens (punctuation, keywords) are skipped via
/// `node.is_named()`.
pub fn walk(tree: &Tree) -> Vec<WalkedNode<'_>> {
    let mut out = Vec::new();
    let mut stack: Vec<(Node, Option<usize>, usize)> = vec![(tree.root_node(), None, 0)];

    while let Some((node, parent_index, depth)) = stack.pop() {
        if !node.is_named() && parent_index.is_some() {
            // Anonymous children never get their own entry, but their
            // named descendants (if any) should still be visited.
            push_children(&mut stack, &node, parent_index, depth);
            continue;
        }

        let index = out.len();
        out.push(WalkedNode {
            node,
            parent_index,
            depth,
        });
        push_children(&mut stack, &node, Some(index), depth + 1);
    }

    out
}

fn push_children<'tree>(
    stack: &mut Vec<(Node<'tree>, Option<usize>, usize)>,
    node: &Node<'tree>,
    parent_index: Option<usize>,
    depth: usize,
) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    for child in children.into_iter().rev() {
        stack.push((child, parent_index, depth));
    }
}

/// Whether the tree contains any ERROR node or missing-token node.
pub fn has_syntax_error(tree: &Tree) -> bool {
    tree.root_node().has_error()
}

/// The first ERROR node's start position, if the tree has one.
pub fn first_error_position(tree: &Tree) -> Option<(usize, usize)> {
    let mut stack = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.is_error() {
            let pos = node.start_position();
            return Some((pos.row, pos.column));
        }
        let mut cursor = node.walk();
        let mut children: Vec<Node> = node.children(&mut cursor).collect();
        children.reverse();
        stack.extend(children);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    #[test]
    fn walk_visits_root_first() {
        let tree = parse("fn main() {}");
        let walked = walk(&tree);
        assert_eq!(walked[0].parent_index, None);
        assert_eq!(walked[0].depth, 0);
    }

    #[test]
    fn walk_records_parent_indices() {
        let tree = parse("fn main() { let x = 1; }");
        let walked = walk(&tree);
        assert!(walked.len() > 1);
        for entry in &walked[1..] {
            assert!(entry.parent_index.is_some());
        }
    }

    #[test]
    fn deeply_nested_expression_does_not_overflow() {
        let mut source = String::from("fn main() { let x = ");
        for _ in 0..5000 {
            source.push_str("(1+");
        }
        source.push('1');
        for _ in 0..5000 {
            source.push(')');
        }
        source.push_str("; }");
        let tree = parse(&source);
        let walked = walk(&tree);
        assert!(walked.len() > 1000);
    }

    #[test]
    fn detects_syntax_errors() {
        let tree = parse("fn main( {");
        assert!(has_syntax_error(&tree));
    }

    #[test]
    fn clean_source_has_no_syntax_error() {
        let tree = parse("fn main() {}");
        assert!(!has_syntax_error(&tree));
    }
}
