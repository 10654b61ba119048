//! Extracted rules and the deduplicating rule set.

use std::collections::HashSet;

use crate::tree::{Forest, NodeId};

use super::part::RulePart;

/// One synchronous rule: a left-hand-side node pair plus the right-hand
/// side that decomposes it.
#[derive(Debug, Clone)]
pub struct ExtractedRule {
    src_lhs: NodeId,
    tgt_lhs: NodeId,
    rhs: RulePart,
}

impl ExtractedRule {
    /// `lhs1` is the node the extraction pass walked; which tree it
    /// came from decides the side assignment.
    pub fn new(lhs1: NodeId, lhs2: NodeId, rhs: RulePart, side1_is_src: bool) -> ExtractedRule {
        let (src_lhs, tgt_lhs) = if side1_is_src { (lhs1, lhs2) } else { (lhs2, lhs1) };
        ExtractedRule { src_lhs, tgt_lhs, rhs }
    }

    pub fn src_lhs(&self) -> NodeId {
        self.src_lhs
    }

    pub fn tgt_lhs(&self) -> NodeId {
        self.tgt_lhs
    }

    pub fn rhs(&self) -> &RulePart {
        &self.rhs
    }

    pub fn is_parallel_unary(&self, forest: &Forest) -> bool {
        self.rhs.is_parallel_unary(forest)
    }

    /// Render the rule in interchange form:
    ///
    /// ```text
    /// TYPE ||| [srcLHS::tgtLHS] ||| src RHS ||| tgt RHS ||| align types ||| reorder
    /// ```
    pub fn render(&self, forest: &Forest) -> String {
        let (src_field, tgt_field) = self.rhs.render_sides(forest);
        let lhs_pair = format!(
            "{}{}",
            forest.node(self.src_lhs).align_category(),
            forest.node(self.tgt_lhs).align_category()
        );
        let mut aligns = lhs_pair;
        let rhs_aligns = self.rhs.align_type_pairs(forest);
        if !rhs_aligns.is_empty() {
            aligns.push(' ');
            aligns.push_str(&rhs_aligns);
        }
        format!(
            "{} ||| [{}::{}] ||| {} ||| {} ||| {} ||| {}",
            self.rhs.rule_type(),
            forest.node(self.src_lhs).category,
            forest.node(self.tgt_lhs).category,
            src_field,
            tgt_field,
            aligns,
            self.rhs.reorder_string(),
        )
        .trim_end()
        .to_string()
    }

    fn key(&self) -> RuleKey {
        let (covered_src, covered_tgt) = self.rhs.covered_words();
        RuleKey {
            src_lhs: self.src_lhs,
            tgt_lhs: self.tgt_lhs,
            src_part: self.rhs.src_components().to_vec(),
            tgt_part: self.rhs.tgt_components().to_vec(),
            covered_src: covered_src.iter().copied().collect(),
            covered_tgt: covered_tgt.iter().copied().collect(),
        }
    }
}

/// Identity of a rule for deduplication. Two rules are the same when
/// they share left-hand sides, components, and coverage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    src_lhs: NodeId,
    tgt_lhs: NodeId,
    src_part: Vec<NodeId>,
    tgt_part: Vec<NodeId>,
    covered_src: Vec<usize>,
    covered_tgt: Vec<usize>,
}

/// Rules in first-seen order, with duplicate inserts dropped.
#[derive(Debug, Default)]
pub struct RuleSet {
    seen: HashSet<RuleKey>,
    rules: Vec<ExtractedRule>,
}

impl RuleSet {
    pub fn new() -> RuleSet {
        RuleSet::default()
    }

    /// Returns whether the rule was new.
    pub fn insert(&mut self, rule: ExtractedRule) -> bool {
        if self.seen.insert(rule.key()) {
            self.rules.push(rule);
            true
        } else {
            false
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::AlignKind;

    #[test]
    fn duplicate_rules_collapse_in_the_set() {
        let mut f = Forest::new();
        let src = f.parse_tree("(B (C c) (D d))").unwrap();
        let tgt = f.parse_tree("(R (Q q) (P p))").unwrap();
        let d = f.node(src).children[1];
        let q = f.node(tgt).children[0];
        f.add_node_alignment(d, AlignKind::T2T, q);
        let rhs = RulePart::from_aligned_pair(&f, d, q, 4, 4, true).unwrap().unwrap();

        let mut set = RuleSet::new();
        assert!(set.insert(ExtractedRule::new(src, tgt, rhs.clone(), true)));
        assert!(!set.insert(ExtractedRule::new(src, tgt, rhs.clone(), true)));
        // The same pair reached from the target pass is still one rule.
        assert!(!set.insert(ExtractedRule::new(tgt, src, rhs, false)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn rendering_follows_the_interchange_field_order() {
        let mut f = Forest::new();
        let src = f.parse_tree("(B (C c) (D d))").unwrap();
        let tgt = f.parse_tree("(R (Q q) (P p))").unwrap();
        let d = f.node(src).children[1];
        let q = f.node(tgt).children[0];
        f.add_node_alignment(d, AlignKind::T2T, q);
        let rhs = RulePart::from_aligned_pair(&f, d, q, 4, 4, true).unwrap().unwrap();
        let rule = ExtractedRule::new(src, tgt, rhs, true);
        assert_eq!(rule.render(&f), "G ||| [B::R] ||| [D::Q,1] ||| [D::Q,1] ||| OO OO ||| 0-0");
    }
}
