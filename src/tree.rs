//! Parse tree arena for one sentence pair.
//!
//! Both trees of a pair, plus every node synthesized while aligning them
//! (virtual sibling groups, string spans, the null placeholder), live in
//! a single `Forest`. Nodes reference each other by `NodeId`; no owning
//! pointers, no lifetimes threading through the search code.
//!
//! The node variant set is closed: a node is an ordinary constituent, a
//! terminal word, a virtual grouping of adjacent real siblings, a string
//! span treating the opposite side as flat words, or the null
//! placeholder used to keep one side of a rule part non-empty. All
//! capability checks (`is_lhs`, `is_terminal`, ...) dispatch on that
//! variant; there is no open-ended class hierarchy.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::aligner::AlignKind;
use crate::bits::BitVec;
use crate::error::Error;
use crate::extract::ExtractedRule;
use crate::span::Span;

/// Sentinel generation for nodes that never constrain the dominance
/// check: terminals, string spans, and the null placeholder.
pub const GENERATION_LEAF: u32 = u32::MAX;

/// Index of a node in its `Forest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A real constituent from the input tree (including preterminals).
    Ordinary,
    /// A terminal word.
    Terminal,
    /// A synthesized grouping of adjacent real siblings.
    Virtual,
    /// A synthesized node over a word range of the opposite sentence.
    StringSpan,
    /// The empty placeholder padding one side of a rule part.
    Null,
}

#[derive(Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Constituent label; for terminals the word itself, for string
    /// spans the covered words joined by spaces, for virtual nodes the
    /// component labels joined by `-`.
    pub category: String,
    /// Inclusive word span; `None` only for the null placeholder.
    pub span: Option<Span>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Virtual children keyed by span start. Reused by exact span, so
    /// two search paths needing the same grouping share one instance.
    pub virtual_children: BTreeMap<usize, BTreeSet<NodeId>>,
    /// Distance from the root: root 0, one more per level down.
    pub generation: u32,
    /// Flattened terminal ids; populated for string spans only.
    pub terminal_components: Vec<NodeId>,
    /// Per-alignment-kind sets of opposite-side nodes.
    aligned_to: Vec<BTreeSet<NodeId>>,
    is_aligned: bool,
    /// Opposite-side word indexes covered by this subtree.
    pub proj_cov: BitVec,
    /// Opposite-side word indexes covered by the rest of this tree.
    pub proj_comp: BitVec,
    /// Rules already extracted with this node as LHS. Valid only for
    /// the single sentence pair this forest was built for.
    pub rules: Vec<ExtractedRule>,
}

impl Node {
    fn new(kind: NodeKind, category: String, span: Option<Span>) -> Self {
        Node {
            kind,
            category,
            span,
            parent: None,
            children: Vec::new(),
            virtual_children: BTreeMap::new(),
            generation: 0,
            terminal_components: Vec::new(),
            aligned_to: vec![BTreeSet::new(); AlignKind::SLOTS],
            is_aligned: false,
            proj_cov: BitVec::new(),
            proj_comp: BitVec::new(),
            rules: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal | NodeKind::StringSpan | NodeKind::Null)
    }

    pub fn is_real(&self) -> bool {
        self.kind != NodeKind::Virtual
    }

    pub fn is_string(&self) -> bool {
        self.kind == NodeKind::StringSpan
    }

    pub fn is_null(&self) -> bool {
        self.kind == NodeKind::Null
    }

    /// Whether this node may appear on the left-hand side of a rule.
    pub fn is_lhs(&self) -> bool {
        matches!(self.kind, NodeKind::Ordinary | NodeKind::Virtual)
    }

    /// Whether the projected search may align this node to opposite
    /// tree structure (as opposed to bare strings).
    pub fn is_t_alignable(&self) -> bool {
        self.kind != NodeKind::Terminal
    }

    /// `O` for ordinary constituents, `V` for virtual groupings, empty
    /// for everything else.
    pub fn align_category(&self) -> &'static str {
        match self.kind {
            NodeKind::Ordinary => "O",
            NodeKind::Virtual => "V",
            _ => "",
        }
    }

    pub fn is_aligned_any(&self) -> bool {
        self.is_aligned
    }

    /// A terminal with no tree-to-tree alignment counts as unaligned
    /// for padding purposes, whatever other annotations it carries.
    pub fn has_t2t_alignment(&self) -> bool {
        !self.aligned_to[AlignKind::T2T.slot()].is_empty()
    }
}

/// Arena of all nodes for one sentence pair.
#[derive(Debug, Default)]
pub struct Forest {
    nodes: Vec<Node>,
    string_cache: HashMap<(NodeId, usize, usize), NodeId>,
    null_node: Option<NodeId>,
}

impl Forest {
    pub fn new() -> Self {
        Forest::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    // --- Parsing ------------------------------------------------------------

    /// Parse a parenthesized tree string, e.g. `"(S (NP (D the) (N cat)))"`.
    /// Terminal words occupy consecutive 0-based positions.
    pub fn parse_tree(&mut self, text: &str) -> Result<NodeId, Error> {
        let root = self.parse_subtree(text, 0)?;
        self.assign_generations(root, 0);
        Ok(root)
    }

    fn parse_subtree(&mut self, text: &str, start: usize) -> Result<NodeId, Error> {
        let text = text.trim();
        let caps = regex!(r"^\((\S+) (.*)\)$")
            .captures(text)
            .ok_or_else(|| Error::MalformedTree(text.to_string()))?;
        let category = caps[1].to_string();
        let subtree = &caps[2];

        if !subtree.contains('(') {
            // Preterminal over a single word.
            let node = self.alloc(Node::new(NodeKind::Ordinary, category, Some(Span::new(start, start))));
            let word = self.alloc(Node::new(NodeKind::Terminal, subtree.to_string(), Some(Span::new(start, start))));
            self.node_mut(word).parent = Some(node);
            self.node_mut(node).children.push(word);
            return Ok(node);
        }

        // Split the subtree into child subtrees at parenthesis depth zero.
        let mut child_texts = Vec::new();
        let mut depth = 0i32;
        let mut curr_start = 0;
        let bytes = subtree.as_bytes();
        for i in 0..bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
            if depth == 0 && i != curr_start {
                child_texts.push(&subtree[curr_start..=i]);
                curr_start = i + 1;
            }
        }
        if depth != 0 {
            return Err(Error::MalformedTree(text.to_string()));
        }

        let node = self.alloc(Node::new(NodeKind::Ordinary, category, None));
        let mut child_start = start;
        for child_text in child_texts {
            let child = self.parse_subtree(child_text, child_start)?;
            self.node_mut(child).parent = Some(node);
            child_start = self.node(child).span.map(|s| s.end + 1).unwrap_or(child_start);
            self.node_mut(node).children.push(child);
        }
        if child_start == start {
            return Err(Error::MalformedTree(text.to_string()));
        }
        self.node_mut(node).span = Some(Span::new(start, child_start - 1));
        Ok(node)
    }

    fn assign_generations(&mut self, node: NodeId, depth: u32) {
        self.node_mut(node).generation =
            if self.node(node).kind == NodeKind::Terminal { GENERATION_LEAF } else { depth };
        for child in self.node(node).children.clone() {
            self.assign_generations(child, depth + 1);
        }
    }

    /// Number of words under `root`.
    pub fn word_count(&self, root: NodeId) -> usize {
        self.node(root).span.map(|s| s.end + 1).unwrap_or(0)
    }

    // --- Synthesized nodes --------------------------------------------------

    /// The shared null placeholder for this pair.
    pub fn null_node(&mut self) -> NodeId {
        match self.null_node {
            Some(id) => id,
            None => {
                let mut node = Node::new(NodeKind::Null, String::new(), None);
                node.generation = GENERATION_LEAF;
                let id = self.alloc(node);
                self.null_node = Some(id);
                id
            }
        }
    }

    /// Existing virtual child of `parent` with exactly this span, if any.
    pub fn virtual_child(&self, parent: NodeId, span: Span) -> Option<NodeId> {
        self.node(parent)
            .virtual_children
            .get(&span.start)?
            .iter()
            .copied()
            .find(|&v| self.node(v).span == Some(span))
    }

    /// Synthesize a virtual node grouping the given adjacent siblings
    /// under `parent`. The node's span is the search window widened to
    /// cover every component. Callers check [`Forest::virtual_child`]
    /// first so each span is synthesized at most once.
    pub fn synthesize_virtual(&mut self, parent: NodeId, components: Vec<NodeId>, window: Span) -> NodeId {
        let start = components.iter().filter_map(|&c| self.node(c).span).map(|s| s.start).min().unwrap_or(window.start);
        let end = components.iter().filter_map(|&c| self.node(c).span).map(|s| s.end).max().unwrap_or(window.end);
        let span = Span::new(start.min(window.start), end.max(window.end));
        let category =
            components.iter().map(|&c| self.node(c).category.as_str()).collect::<Vec<_>>().join("-");
        let generation = components.first().map(|&c| self.node(c).generation).unwrap_or(0);

        let mut node = Node::new(NodeKind::Virtual, category, Some(span));
        node.generation = generation;
        node.children = components;
        let id = self.alloc(node);

        // Cross-link with the parent's other virtual children so nesting
        // is visible from both sides.
        let existing: Vec<NodeId> =
            self.node(parent).virtual_children.values().flatten().copied().collect();
        for other in existing {
            let other_span = match self.node(other).span {
                Some(s) => s,
                None => continue,
            };
            if span.contains(other_span) {
                self.add_virtual_child(id, other);
            }
            if other_span.contains(span) && other_span != span {
                self.add_virtual_child(other, id);
            }
        }

        self.add_virtual_child(parent, id);
        self.node_mut(id).parent = Some(parent);
        id
    }

    fn add_virtual_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(span) = self.node(child).span {
            self.node_mut(parent).virtual_children.entry(span.start).or_default().insert(child);
        }
    }

    pub fn virtual_children(&self, node: NodeId) -> Vec<NodeId> {
        self.node(node).virtual_children.values().flatten().copied().collect()
    }

    /// String-span node over `start..=end` of the tree rooted at `root`,
    /// synthesized once per range and reused afterwards.
    pub fn string_span(&mut self, root: NodeId, start: usize, end: usize) -> NodeId {
        if let Some(&id) = self.string_cache.get(&(root, start, end)) {
            return id;
        }
        let mut terminals = Vec::new();
        for node in self.nodes_spanning(root, start, end) {
            self.terminals_under(node, &mut terminals);
        }
        let category =
            terminals.iter().map(|&t| self.node(t).category.as_str()).collect::<Vec<_>>().join(" ");
        let mut node = Node::new(NodeKind::StringSpan, category, Some(Span::new(start, end)));
        node.generation = GENERATION_LEAF;
        node.terminal_components = terminals;
        let id = self.alloc(node);
        self.string_cache.insert((root, start, end), id);
        id
    }

    // --- Span queries -------------------------------------------------------

    /// Highest nodes under `root` wholly within `start..=end`, in
    /// left-to-right order.
    pub fn nodes_spanning(&self, root: NodeId, start: usize, end: usize) -> Vec<NodeId> {
        let mut results = Vec::new();
        self.nodes_spanning_helper(root, start, end, &mut results);
        results
    }

    fn nodes_spanning_helper(&self, node: NodeId, start: usize, end: usize, results: &mut Vec<NodeId>) {
        if self.node(node).kind == NodeKind::Virtual {
            return;
        }
        let span = match self.node(node).span {
            Some(s) => s,
            None => return,
        };
        if span.start >= start && span.end <= end {
            results.push(node);
        } else if span.end < start || span.start > end {
            // Wholly outside the search range.
        } else {
            for child in &self.node(node).children {
                self.nodes_spanning_helper(*child, start, end, results);
            }
        }
    }

    pub fn terminal_nodes_spanning(&self, root: NodeId, start: usize, end: usize) -> Vec<NodeId> {
        let mut terminals = Vec::new();
        for node in self.nodes_spanning(root, start, end) {
            self.terminals_under(node, &mut terminals);
        }
        terminals
    }

    pub fn terminals_under(&self, node: NodeId, out: &mut Vec<NodeId>) {
        if self.node(node).is_terminal() {
            out.push(node);
        } else {
            for child in &self.node(node).children {
                self.terminals_under(*child, out);
            }
        }
    }

    /// Terminal descendants carrying no tree-to-tree alignment.
    pub fn unaligned_terminals(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &child in &self.node(node).children {
            if self.node(child).is_terminal() {
                if !self.node(child).has_t2t_alignment() {
                    out.push(child);
                }
            } else {
                out.extend(self.unaligned_terminals(child));
            }
        }
        out
    }

    // --- Node alignments ----------------------------------------------------

    pub fn add_node_alignment(&mut self, node: NodeId, kind: AlignKind, aligned: NodeId) {
        let n = self.node_mut(node);
        n.aligned_to[kind.slot()].insert(aligned);
        n.is_aligned = true;
    }

    /// Union of this node's alignment sets for every flag in `mask`.
    pub fn alignments(&self, node: NodeId, mask: AlignKind) -> BTreeSet<NodeId> {
        let mut out = BTreeSet::new();
        for flag in mask.iter() {
            out.extend(self.node(node).aligned_to[flag.slot()].iter().copied());
        }
        out
    }

    pub fn alignments_all(&self, node: NodeId) -> BTreeSet<NodeId> {
        self.alignments(node, AlignKind::all())
    }

    // --- Rendering ----------------------------------------------------------

    /// Parenthesized rendering of the subtree at `node`.
    pub fn paren_string(&self, node: NodeId) -> String {
        let n = self.node(node);
        if n.children.is_empty() {
            return n.category.clone();
        }
        let children =
            n.children.iter().map(|&c| self.paren_string(c)).collect::<Vec<_>>().join(" ");
        format!("({} {})", n.category, children)
    }

    /// Sort key placing null placeholders before any spanned node.
    pub fn position_key(&self, node: NodeId) -> i64 {
        self.node(node).span.map(|s| s.start as i64).unwrap_or(-1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spans_bottom_up() {
        let mut f = Forest::new();
        let root = f.parse_tree("(S (NP (D the) (N cat)) (VP (V sat)))").unwrap();
        assert_eq!(f.node(root).span, Some(Span::new(0, 2)));
        assert_eq!(f.node(root).category, "S");
        let np = f.node(root).children[0];
        let vp = f.node(root).children[1];
        assert_eq!(f.node(np).span, Some(Span::new(0, 1)));
        assert_eq!(f.node(vp).span, Some(Span::new(2, 2)));
        assert_eq!(f.word_count(root), 3);
        assert_eq!(f.paren_string(root), "(S (NP (D the) (N cat)) (VP (V sat)))");
    }

    #[test]
    fn generations_start_at_zero_and_leaves_are_sentinels() {
        let mut f = Forest::new();
        let root = f.parse_tree("(S (NP (D the) (N cat)) (VP (V sat)))").unwrap();
        assert_eq!(f.node(root).generation, 0);
        let np = f.node(root).children[0];
        assert_eq!(f.node(np).generation, 1);
        let d = f.node(np).children[0];
        assert_eq!(f.node(d).generation, 2);
        let the = f.node(d).children[0];
        assert_eq!(f.node(the).generation, GENERATION_LEAF);
        assert_eq!(f.node(the).category, "the");
    }

    #[test]
    fn rejects_malformed_trees() {
        for bad in ["", "S", "(S)", "(S (NP", "(S (NP x) extra)"] {
            let mut f = Forest::new();
            assert!(matches!(f.parse_tree(bad), Err(Error::MalformedTree(_))), "accepted {bad:?}");
        }
    }

    #[test]
    fn multiword_terminal_occupies_one_position() {
        let mut f = Forest::new();
        let root = f.parse_tree("(NP (NNP New York) (NN subway))").unwrap();
        assert_eq!(f.node(root).span, Some(Span::new(0, 1)));
        let nnp = f.node(root).children[0];
        let word = f.node(nnp).children[0];
        assert_eq!(f.node(word).category, "New York");
        assert_eq!(f.node(word).span, Some(Span::new(0, 0)));
    }

    #[test]
    fn spanning_queries_return_highest_nodes_in_order() {
        let mut f = Forest::new();
        let root = f.parse_tree("(A (B b) (C c) (D d))").unwrap();
        let ids = f.nodes_spanning(root, 0, 1);
        assert_eq!(ids.len(), 2);
        assert_eq!(f.node(ids[0]).category, "B");
        assert_eq!(f.node(ids[1]).category, "C");
        let all = f.nodes_spanning(root, 0, 2);
        assert_eq!(all, vec![root]);
        let terms = f.terminal_nodes_spanning(root, 1, 2);
        let cats: Vec<_> = terms.iter().map(|&t| f.node(t).category.clone()).collect();
        assert_eq!(cats, vec!["c", "d"]);
    }

    #[test]
    fn virtual_nodes_are_reused_by_span() {
        let mut f = Forest::new();
        let root = f.parse_tree("(A (B b) (C c) (D d))").unwrap();
        let b = f.node(root).children[0];
        let c = f.node(root).children[1];
        let span = Span::new(0, 1);
        assert_eq!(f.virtual_child(root, span), None);
        let v = f.synthesize_virtual(root, vec![b, c], span);
        assert_eq!(f.node(v).category, "B-C");
        assert_eq!(f.node(v).span, Some(span));
        assert_eq!(f.node(v).generation, f.node(b).generation);
        assert_eq!(f.virtual_child(root, span), Some(v));
        assert!(!f.node(v).is_real());
        assert!(f.node(v).is_lhs());
    }

    #[test]
    fn string_spans_flatten_and_are_cached() {
        let mut f = Forest::new();
        let root = f.parse_tree("(A (B b) (C c) (D d))").unwrap();
        let s1 = f.string_span(root, 1, 2);
        let s2 = f.string_span(root, 1, 2);
        assert_eq!(s1, s2);
        assert_eq!(f.node(s1).category, "c d");
        assert!(f.node(s1).is_terminal());
        assert!(!f.node(s1).is_lhs());
        assert_eq!(f.node(s1).terminal_components.len(), 2);
        assert_eq!(f.node(f.node(s1).terminal_components[0]).category, "c");
    }
}
