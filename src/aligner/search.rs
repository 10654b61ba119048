//! The node alignment search itself.
//!
//! One `NodeAligner::align` call runs three passes over a sentence pair:
//! source-side nodes against the target tree, target-side nodes against
//! the source tree, and a sibling-window sweep for virtual-to-virtual
//! alignments. Each pass walks one tree and, for every consistently
//! aligned node, probes the opposite tree for exact spans, flat strings,
//! and same-parent node groups, growing the probe window over unaligned
//! boundary words.

use crate::bits::BitVec;
use crate::span::{Span, SpanIndex};
use crate::tree::{Forest, NodeId};
use crate::word_align::WordAlignment;

use super::records::{AlignKind, NodeAlignmentList};
use super::vectors;

/// Runs the alignment search for one sentence pair.
#[derive(Debug, Clone, Copy)]
pub struct NodeAligner {
    max_virtual_components: usize,
}

impl NodeAligner {
    pub fn new(max_virtual_components: usize) -> Self {
        NodeAligner { max_virtual_components }
    }

    /// Align the two trees of `forest` given their word alignment.
    ///
    /// Besides the returned span-pair records, this annotates forest
    /// nodes in place: per-kind node alignment sets, and any virtual or
    /// string-span nodes the search synthesized. Rule extraction reads
    /// those annotations afterwards.
    pub fn align(
        &self,
        forest: &mut Forest,
        src_root: NodeId,
        tgt_root: NodeId,
        word_aligns: &WordAlignment,
    ) -> NodeAlignmentList {
        vectors::compute_coverage(forest, src_root, true, word_aligns);
        vectors::compute_coverage(forest, tgt_root, false, word_aligns);
        vectors::compute_complement(forest, src_root);
        vectors::compute_complement(forest, tgt_root);

        let src_unaligned =
            vectors::unaligned_mask(forest.word_count(src_root), |i| word_aligns.src_is_aligned(i));
        let tgt_unaligned =
            vectors::unaligned_mask(forest.word_count(tgt_root), |i| word_aligns.tgt_is_aligned(i));

        let src_index = SpanIndex::build(forest, src_root);
        let tgt_index = SpanIndex::build(forest, tgt_root);

        let mut out = NodeAlignmentList::new();
        self.compute_node_alignments(
            forest, src_root, tgt_root, &tgt_index, &src_unaligned, &tgt_unaligned, true, &mut out,
        );
        self.compute_node_alignments(
            forest, tgt_root, src_root, &src_index, &tgt_unaligned, &src_unaligned, false, &mut out,
        );
        self.ts2ts_alignments(forest, src_root, tgt_root, &src_unaligned, &tgt_unaligned, &mut out);

        if crate::debug_enabled() {
            for line in out.interchange_lines() {
                eprintln!("[align] {line}");
            }
        }
        out
    }

    /// Walk the side-1 tree; consistent nodes go through the three
    /// probes, inconsistent terminals may still pick up one-to-many
    /// annotations.
    #[allow(clippy::too_many_arguments)]
    fn compute_node_alignments(
        &self,
        forest: &mut Forest,
        node1: NodeId,
        tree2: NodeId,
        index2: &SpanIndex,
        unaligned1: &BitVec,
        unaligned2: &BitVec,
        side1_is_src: bool,
        out: &mut NodeAlignmentList,
    ) {
        if vectors::is_consistent(forest, node1) {
            self.find_exact(forest, node1, index2, unaligned1, unaligned2, side1_is_src, out);
            self.find_string(forest, node1, tree2, unaligned1, unaligned2, side1_is_src, out);
            self.find_projected(forest, node1, tree2, unaligned1, unaligned2, side1_is_src, out);
        } else if forest.node(node1).is_terminal() && forest.node(node1).proj_cov.cardinality() > 1 {
            // A terminal fanning out over words that no single span can
            // cover still records which opposite terminals it touches.
            for aligned in self.terminal_aligns(forest, node1, tree2) {
                forest.add_node_alignment(node1, AlignKind::T2P, aligned);
                forest.add_node_alignment(aligned, AlignKind::P2T, node1);
            }
        }

        for child in forest.node(node1).children.clone() {
            self.compute_node_alignments(
                forest, child, tree2, index2, unaligned1, unaligned2, side1_is_src, out,
            );
        }
    }

    /// Opposite-tree terminals inside this terminal's projection that it
    /// actually links to.
    fn terminal_aligns(&self, forest: &Forest, node1: NodeId, tree2: NodeId) -> Vec<NodeId> {
        let cov = &forest.node(node1).proj_cov;
        let (Some(min), Some(max)) = (cov.min_set(), cov.max_set()) else {
            return Vec::new();
        };
        forest
            .terminal_nodes_spanning(tree2, min, max)
            .into_iter()
            .filter(|&t| forest.node(t).span.is_some_and(|s| cov.get(s.start)))
            .collect()
    }

    /// Tree-to-tree: opposite-tree nodes whose span equals this node's
    /// projection, plus ancestors that add only unaligned words.
    #[allow(clippy::too_many_arguments)]
    fn find_exact(
        &self,
        forest: &mut Forest,
        node1: NodeId,
        index2: &SpanIndex,
        unaligned1: &BitVec,
        unaligned2: &BitVec,
        side1_is_src: bool,
        out: &mut NodeAlignmentList,
    ) {
        let cov = forest.node(node1).proj_cov.clone();
        let (Some(min), Some(max)) = (cov.min_set(), cov.max_set()) else {
            return;
        };

        // Any gap in the projection must consist of unaligned words,
        // otherwise no contiguous opposite span can match.
        if !(min..=max).all(|i| cov.get(i) || unaligned2.get(i)) {
            return;
        }

        let mut matches: Vec<NodeId> = index2.get(Span::new(min, max)).to_vec();
        let mut frontier = matches.clone();
        while let Some(m) = frontier.pop() {
            let Some(parent) = forest.node(m).parent else { continue };
            let Some(pspan) = forest.node(parent).span else { continue };
            let only_unaligned_extra =
                (pspan.start..=pspan.end).all(|i| cov.get(i) || unaligned2.get(i));
            if only_unaligned_extra && !matches.contains(&parent) {
                matches.push(parent);
                frontier.push(parent);
            }
        }

        for m in matches {
            let Some(span2) = forest.node(m).span else { continue };
            self.add_alignment(
                forest, node1, span2, m, unaligned1, unaligned2, side1_is_src, out, AlignKind::T2T,
            );
        }
    }

    /// Tree-to-string: align this node to every window of opposite
    /// words reachable by growing its projection over unaligned
    /// boundaries, recording the mirrored string-to-tree direction too.
    #[allow(clippy::too_many_arguments)]
    fn find_string(
        &self,
        forest: &mut Forest,
        node1: NodeId,
        tree2: NodeId,
        unaligned1: &BitVec,
        unaligned2: &BitVec,
        side1_is_src: bool,
        out: &mut NodeAlignmentList,
    ) {
        let cov = forest.node(node1).proj_cov.clone();
        let (Some(min), Some(max)) = (cov.min_set(), cov.max_set()) else {
            return;
        };
        let Some(span1) = forest.node(node1).span else {
            return;
        };

        // A consistent terminal spread over several opposite words gets
        // the same one-to-many annotation as an inconsistent one.
        if forest.node(node1).is_terminal() && max > min {
            for t in forest.terminal_nodes_spanning(tree2, min, max) {
                if forest.node(t).span.is_some_and(|s| cov.get(s.start)) {
                    forest.add_node_alignment(node1, AlignKind::T2P, t);
                    forest.add_node_alignment(t, AlignKind::P2T, node1);
                }
            }
        }

        let mut t2_min = min;
        loop {
            let mut t2_max = max;
            loop {
                let window = Span::new(t2_min, t2_max);
                let string = forest.string_span(tree2, t2_min, t2_max);
                self.add_alignment(
                    forest, node1, window, string, unaligned1, unaligned2, side1_is_src, out,
                    AlignKind::T2S,
                );
                self.add_alignment(
                    forest, string, span1, node1, unaligned2, unaligned1, !side1_is_src, out,
                    AlignKind::S2T,
                );
                t2_max += 1;
                if !unaligned2.get(t2_max) {
                    break;
                }
            }
            if t2_min == 0 || !unaligned2.get(t2_min - 1) {
                break;
            }
            t2_min -= 1;
        }
    }

    /// Tree-to-tree/string: align this node to the highest same-parent
    /// group of opposite nodes covering each grown window, synthesizing
    /// a virtual node when the group has more than one member.
    #[allow(clippy::too_many_arguments)]
    fn find_projected(
        &self,
        forest: &mut Forest,
        node1: NodeId,
        tree2: NodeId,
        unaligned1: &BitVec,
        unaligned2: &BitVec,
        side1_is_src: bool,
        out: &mut NodeAlignmentList,
    ) {
        {
            let n = forest.node(node1);
            if !n.is_t_alignable() || !n.is_real() || n.is_string() {
                return;
            }
        }
        let cov = forest.node(node1).proj_cov.clone();
        let (Some(min), Some(max)) = (cov.min_set(), cov.max_set()) else {
            return;
        };
        let Some(span1) = forest.node(node1).span else {
            return;
        };

        let mut t2_min = min;
        loop {
            let mut t2_max = max;
            loop {
                let window = Span::new(t2_min, t2_max);
                let spanning = forest.nodes_spanning(tree2, t2_min, t2_max);
                let parent = spanning.first().and_then(|&n| forest.node(n).parent);
                let same_parent =
                    spanning.iter().all(|&n| forest.node(n).parent == parent);

                if same_parent {
                    let aligned = if spanning.len() > self.max_virtual_components {
                        None
                    } else if spanning.len() > 1 {
                        parent.map(|p| match forest.virtual_child(p, window) {
                            Some(v) => v,
                            None => forest.synthesize_virtual(p, spanning.clone(), window),
                        })
                    } else {
                        spanning.first().copied()
                    };

                    if let Some(aligned) = aligned {
                        self.add_alignment(
                            forest, node1, window, aligned, unaligned1, unaligned2, side1_is_src,
                            out, AlignKind::T2TS,
                        );
                        self.add_alignment(
                            forest, aligned, span1, node1, unaligned2, unaligned1, !side1_is_src,
                            out, AlignKind::TS2T,
                        );
                    }
                }

                t2_max += 1;
                if !unaligned2.get(t2_max) {
                    break;
                }
            }
            if t2_min == 0 || !unaligned2.get(t2_min - 1) {
                break;
            }
            t2_min -= 1;
        }
    }

    /// Virtual-to-virtual: for every window of three-or-more siblings,
    /// check whether some same-parent group on the target side covers
    /// exactly its projection plus unaligned words, and align the two
    /// synthesized groupings when it does.
    fn ts2ts_alignments(
        &self,
        forest: &mut Forest,
        node: NodeId,
        tgt_root: NodeId,
        src_unaligned: &BitVec,
        tgt_unaligned: &BitVec,
        out: &mut NodeAlignmentList,
    ) {
        let children = forest.node(node).children.clone();
        if children.len() > 2 {
            for i in 0..children.len() - 1 {
                for j in i + 1..children.len() {
                    // Skip the window covering every child; that is the
                    // parent node itself.
                    if !(j < children.len() - 1 || i > 0) {
                        break;
                    }
                    if j - i + 1 > self.max_virtual_components {
                        break;
                    }
                    self.ts2ts_window(
                        forest, node, &children, i, j, tgt_root, src_unaligned, tgt_unaligned, out,
                    );
                }
            }
        }

        for child in children {
            self.ts2ts_alignments(forest, child, tgt_root, src_unaligned, tgt_unaligned, out);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn ts2ts_window(
        &self,
        forest: &mut Forest,
        node: NodeId,
        children: &[NodeId],
        i: usize,
        j: usize,
        tgt_root: NodeId,
        src_unaligned: &BitVec,
        tgt_unaligned: &BitVec,
        out: &mut NodeAlignmentList,
    ) {
        let mut cov = BitVec::new();
        for &child in &children[i..=j] {
            cov.or(&forest.node(child).proj_cov);
        }
        cov.or(tgt_unaligned);

        let mut comp = forest.node(node).proj_comp.clone();
        for &child in children[..i].iter().chain(&children[j + 1..]) {
            comp.or(&forest.node(child).proj_cov);
        }

        if !vectors::are_consistent(&cov, &comp) {
            return;
        }
        let (Some(cmin), Some(cmax)) = (cov.min_set(), cov.max_set()) else {
            return;
        };

        let spanning = forest.nodes_spanning(tgt_root, cmin, cmax);
        if spanning.len() <= 1 || spanning.len() > self.max_virtual_components {
            return;
        }
        let parent = forest.node(spanning[0]).parent;
        if !spanning.iter().all(|&n| forest.node(n).parent == parent) {
            return;
        }

        let (Some(first), Some(last)) =
            (forest.node(children[i]).span, forest.node(children[j]).span)
        else {
            return;
        };
        let src_span = Span::new(first.start, last.end);
        let (Some(t_first), Some(t_last)) = (
            forest.node(spanning[0]).span,
            forest.node(spanning[spanning.len() - 1]).span,
        ) else {
            return;
        };
        let tgt_span = Span::new(t_first.start, t_last.end);

        let src_node = match forest.virtual_child(node, src_span) {
            Some(v) => v,
            None => forest.synthesize_virtual(node, children[i..=j].to_vec(), src_span),
        };
        let Some(parent) = parent else { return };
        let tgt_node = match forest.virtual_child(parent, tgt_span) {
            Some(v) => v,
            None => forest.synthesize_virtual(parent, spanning, tgt_span),
        };

        self.add_alignment(
            forest, src_node, tgt_span, tgt_node, src_unaligned, tgt_unaligned, true, out,
            AlignKind::TS2TS,
        );
    }

    /// Record one alignment: grown flags from unaligned boundary words,
    /// a span-pair record oriented by which side discovered it, and a
    /// node-level annotation when both ends share LHS eligibility.
    #[allow(clippy::too_many_arguments)]
    fn add_alignment(
        &self,
        forest: &mut Forest,
        alignee: NodeId,
        span2: Span,
        aligned: NodeId,
        unaligned1: &BitVec,
        unaligned2: &BitVec,
        side1_is_src: bool,
        out: &mut NodeAlignmentList,
        kind: AlignKind,
    ) {
        let Some(span1) = forest.node(alignee).span else {
            return;
        };

        let mut kinds = kind;
        if side1_is_src {
            if unaligned1.get(span1.start) || unaligned1.get(span1.end) {
                kinds |= AlignKind::SRC_GROWN;
            }
            if unaligned2.get(span2.start) || unaligned2.get(span2.end) {
                kinds |= AlignKind::TGT_GROWN;
            }
            out.add(span1, span2, true, kinds);
        } else {
            if unaligned1.get(span1.start) || unaligned1.get(span1.end) {
                kinds |= AlignKind::TGT_GROWN;
            }
            if unaligned2.get(span2.start) || unaligned2.get(span2.end) {
                kinds |= AlignKind::SRC_GROWN;
            }
            out.add(span2, span1, false, kinds);
        }

        if forest.node(alignee).is_lhs() == forest.node(aligned).is_lhs() {
            forest.add_node_alignment(alignee, kind, aligned);
        }
    }
}
