use std::collections::HashMap;

use super::types::Span;

/// A span plus the positions of its children, in the order the children
/// were first seen. Children are resolved through [`SpanTree::children`].
#[derive(Debug)]
pub struct SpanNode<'a> {
    pub span: &'a Span,
    children: Vec<usize>,
}

/// One entry of the rendering order produced by [`SpanTree::walk`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TreeLine<'a> {
    /// A span at the given nesting depth (roots are depth 0).
    Span { depth: usize, span: &'a Span },
    /// Blank line between two sibling subtrees.
    Separator,
}

/// Forest rebuilt from a flat span list.
///
/// Spans without a parent are roots. So are orphans, whose `parent_uuid`
/// names a span that is not in the list, and spans caught in a parent cycle
/// (those are attached at the first cycle member in input order). Every input
/// span appears exactly once. No step depends on map iteration order, so the
/// same input always walks the same way.
///
/// Nodes live in one flat vector indexed like the input, so building,
/// walking and dropping never recurse, however deep the parent chain.
#[derive(Debug)]
pub struct SpanTree<'a> {
    nodes: Vec<SpanNode<'a>>,
    roots: Vec<usize>,
}

impl<'a> SpanTree<'a> {
    pub fn build(spans: &'a [Span]) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(spans.len());
        for (i, span) in spans.iter().enumerate() {
            index.entry(span.uuid.as_str()).or_insert(i);
        }

        let mut candidates: Vec<Vec<usize>> = vec![Vec::new(); spans.len()];
        let mut root_ids: Vec<usize> = Vec::new();
        for (i, span) in spans.iter().enumerate() {
            let parent = span
                .parent_uuid
                .as_deref()
                .filter(|p| !p.is_empty())
                .and_then(|p| index.get(p).copied())
                .filter(|p| *p != i);
            match parent {
                Some(p) => candidates[p].push(i),
                None => root_ids.push(i),
            }
        }

        let mut nodes: Vec<SpanNode<'a>> = spans
            .iter()
            .map(|span| SpanNode {
                span,
                children: Vec::new(),
            })
            .collect();
        let mut visited = vec![false; spans.len()];
        let mut roots = Vec::with_capacity(root_ids.len());
        for i in root_ids.into_iter().chain(0..spans.len()) {
            if visited[i] {
                continue;
            }
            roots.push(i);
            attach(i, &candidates, &mut visited, &mut nodes);
        }

        Self { nodes, roots }
    }

    pub fn roots(&self) -> impl Iterator<Item = &SpanNode<'a>> {
        self.roots.iter().map(|i| &self.nodes[*i])
    }

    pub fn children(&self, node: &SpanNode<'a>) -> impl Iterator<Item = &SpanNode<'a>> {
        node.children.iter().map(|i| &self.nodes[*i])
    }

    /// Number of spans in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first, pre-order rendering sequence with a separator between
    /// sibling subtrees (never before the first sibling).
    pub fn walk(&self) -> Vec<TreeLine<'a>> {
        let mut lines = Vec::with_capacity(self.nodes.len() * 2);
        // (node, depth, preceded by a sibling)
        let mut stack: Vec<(usize, usize, bool)> = Vec::new();
        push_siblings(&mut stack, &self.roots, 0);
        while let Some((i, depth, after_sibling)) = stack.pop() {
            if after_sibling {
                lines.push(TreeLine::Separator);
            }
            let node = &self.nodes[i];
            lines.push(TreeLine::Span {
                depth,
                span: node.span,
            });
            push_siblings(&mut stack, &node.children, depth + 1);
        }
        lines
    }
}

/// Marks everything reachable from `root` as visited and records the kept
/// parent-child edges. A candidate already visited is an ancestor closing a
/// cycle and is left out.
fn attach(
    root: usize,
    candidates: &[Vec<usize>],
    visited: &mut [bool],
    nodes: &mut [SpanNode<'_>],
) {
    visited[root] = true;
    let mut stack = vec![root];
    while let Some(i) = stack.pop() {
        let kept: Vec<usize> = candidates[i].iter().copied().filter(|c| !visited[*c]).collect();
        for c in &kept {
            visited[*c] = true;
        }
        stack.extend(kept.iter().rev());
        nodes[i].children = kept;
    }
}

fn push_siblings(stack: &mut Vec<(usize, usize, bool)>, ids: &[usize], depth: usize) {
    stack.extend(ids.iter().enumerate().rev().map(|(n, i)| (*i, depth, n > 0)));
}
