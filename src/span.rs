use std::collections::HashMap;

use crate::tree::{Forest, NodeId};

/// An inclusive range of word positions within one sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Number of words covered (spans are inclusive on both ends).
    pub fn word_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A source span paired with a target span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BiSpan {
    pub src: Span,
    pub tgt: Span,
}

/// Span-to-nodes lookup for one tree, built once per sentence pair and
/// reused by every exact-match probe. Only real tree nodes are indexed;
/// virtual and string-span nodes synthesized during the search never
/// enter the index.
#[derive(Debug, Default)]
pub struct SpanIndex {
    by_span: HashMap<Span, Vec<NodeId>>,
}

impl SpanIndex {
    pub fn build(forest: &Forest, root: NodeId) -> Self {
        let mut index = SpanIndex { by_span: HashMap::new() };
        index.fill(forest, root);
        index
    }

    fn fill(&mut self, forest: &Forest, node: NodeId) {
        if let Some(span) = forest.node(node).span {
            self.by_span.entry(span).or_default().push(node);
        }
        for child in forest.node(node).children.clone() {
            self.fill(forest, child);
        }
    }

    pub fn get(&self, span: Span) -> &[NodeId] {
        self.by_span.get(&span).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Forest;

    #[test]
    fn span_display_and_contains() {
        let a = Span::new(1, 4);
        let b = Span::new(2, 3);
        assert!(a.contains(b));
        assert!(!b.contains(a));
        assert_eq!(a.to_string(), "1-4");
        assert_eq!(a.word_count(), 4);
    }

    #[test]
    fn index_groups_same_span_nodes() {
        let mut forest = Forest::new();
        // (B (C c) (D d)): C and its terminal share span 0-0.
        let root = forest.parse_tree("(B (C c) (D d))").unwrap();
        let index = SpanIndex::build(&forest, root);
        assert_eq!(index.get(Span::new(0, 0)).len(), 2);
        assert_eq!(index.get(Span::new(0, 1)).len(), 1);
        assert!(index.get(Span::new(1, 2)).is_empty());
    }
}
