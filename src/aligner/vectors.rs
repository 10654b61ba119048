//! Projected coverage and complement vectors.
//!
//! Every node carries two bit vectors over the *opposite* sentence's
//! word positions: the coverage vector (words its own terminals align
//! to, unioned bottom-up) and the complement vector (words the rest of
//! its own tree aligns to, accumulated top-down). A node is consistently
//! aligned when the contiguous span of its coverage touches nothing in
//! its complement; only consistent nodes enter the alignment search.

use crate::bits::BitVec;
use crate::tree::{Forest, NodeId};
use crate::word_align::WordAlignment;

/// Fill coverage vectors for the whole tree under `node`, bottom-up.
/// A terminal's coverage is exactly its word links; an internal node's
/// is the union of its children's.
pub fn compute_coverage(forest: &mut Forest, node: NodeId, is_src: bool, aligns: &WordAlignment) {
    let children = forest.node(node).children.clone();
    if children.is_empty() {
        let position = forest.node(node).span.map(|s| s.start).unwrap_or(0);
        let cov: BitVec = if is_src {
            aligns.links_for_src(position).collect()
        } else {
            aligns.links_for_tgt(position).collect()
        };
        forest.node_mut(node).proj_cov = cov;
    } else {
        let mut cov = BitVec::new();
        for child in children {
            compute_coverage(forest, child, is_src, aligns);
            cov.or(&forest.node(child).proj_cov);
        }
        forest.node_mut(node).proj_cov = cov;
    }
}

/// Fill complement vectors top-down: the root's is empty, and each child
/// gets its parent's complement unioned with every sibling's coverage.
/// Coverage vectors must already be computed.
pub fn compute_complement(forest: &mut Forest, node: NodeId) {
    let mut comp = BitVec::new();
    if let Some(parent) = forest.node(node).parent {
        comp.or(&forest.node(parent).proj_comp);
        for sibling in forest.node(parent).children.clone() {
            if sibling != node {
                comp.or(&forest.node(sibling).proj_cov);
            }
        }
    }
    forest.node_mut(node).proj_comp = comp;
    for child in forest.node(node).children.clone() {
        compute_complement(forest, child);
    }
}

/// Mask of word positions in `0..word_count` with no word alignment.
pub fn unaligned_mask(word_count: usize, is_aligned: impl Fn(usize) -> bool) -> BitVec {
    (0..word_count).filter(|&i| !is_aligned(i)).collect()
}

/// A coverage/complement pair is consistent when the coverage is
/// non-empty and no complement bit falls inside the coverage *span*
/// (gaps inside the span are fine at this stage).
pub fn are_consistent(cov: &BitVec, comp: &BitVec) -> bool {
    match (cov.min_set(), cov.max_set()) {
        (Some(min), Some(max)) => !comp.intersects_range(min, max + 1),
        _ => false,
    }
}

pub fn is_consistent(forest: &Forest, node: NodeId) -> bool {
    let n = forest.node(node);
    are_consistent(&n.proj_cov, &n.proj_comp)
}
