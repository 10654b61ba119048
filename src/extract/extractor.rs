//! Bottom-up combinatorial rule extraction.

use std::collections::BTreeMap;

use crate::aligner::AlignKind;
use crate::error::Error;
use crate::tree::{Forest, NodeId};

use super::part::RulePart;
use super::rule::{ExtractedRule, RuleSet};

/// Alignment kinds a right-hand-side component may be linked by.
fn rhs_mask() -> AlignKind {
    AlignKind::T2T
        | AlignKind::T2S
        | AlignKind::S2T
        | AlignKind::T2TS
        | AlignKind::TS2T
        | AlignKind::TS2TS
        | AlignKind::SRC_GROWN
        | AlignKind::TGT_GROWN
}

/// Walks an aligned forest and extracts every synchronous rule within
/// the size limits. Stateless apart from its configuration; all
/// per-sentence state (rule caches included) lives on the forest.
#[derive(Debug, Clone)]
pub struct GrammarExtractor {
    max_grammar_rule_size: usize,
    max_phrase_rule_size: usize,
    allow_triangular: bool,
    minimal_rules_only: bool,
}

impl GrammarExtractor {
    pub fn new(
        max_grammar_rule_size: usize,
        max_phrase_rule_size: usize,
        allow_triangular: bool,
        minimal_rules_only: bool,
    ) -> GrammarExtractor {
        GrammarExtractor {
            max_grammar_rule_size,
            max_phrase_rule_size,
            allow_triangular,
            minimal_rules_only,
        }
    }

    /// Extract all rules for one aligned sentence pair. The forest must
    /// already carry node alignments for both trees.
    pub fn extract(
        &self,
        forest: &mut Forest,
        src_root: NodeId,
        tgt_root: NodeId,
    ) -> Result<RuleSet, Error> {
        let mut rules = RuleSet::new();
        self.extract_rules_for_node(forest, src_root, true, rhs_mask(), &mut rules)?;

        if self.allow_triangular {
            // The target-side walk caches triangular decompositions on
            // the target nodes; the rules it would emit mirror ones the
            // source pass already produced, so they are dropped.
            let mut mirrored = RuleSet::new();
            let tgt_lhs_mask = AlignKind::T2TS | AlignKind::T2T;
            self.extract_rules_for_node(forest, tgt_root, false, tgt_lhs_mask, &mut mirrored)?;
        }

        Ok(rules)
    }

    fn extract_rules_for_node(
        &self,
        forest: &mut Forest,
        node1: NodeId,
        side1_is_src: bool,
        lhs_mask: AlignKind,
        out: &mut RuleSet,
    ) -> Result<(), Error> {
        if !forest.node(node1).rules.is_empty() {
            return Ok(());
        }

        for child in forest.virtual_children(node1) {
            self.extract_rules_for_node(forest, child, side1_is_src, lhs_mask, out)?;
        }
        if forest.node(node1).is_lhs() {
            for child in forest.node(node1).children.clone() {
                self.extract_rules_for_node(forest, child, side1_is_src, lhs_mask, out)?;
            }
        }

        if forest.node(node1).is_terminal() {
            return Ok(());
        }

        let decomps = self.decomp_points(forest, node1);
        for aligned in forest.alignments(node1, lhs_mask) {
            for decomp in &decomps {
                for rhs in self.rhs_parts(forest, decomp, aligned, side1_is_src)? {
                    if !rhs.spans_match(forest, node1, aligned) {
                        continue;
                    }
                    let gen1 = forest.node(node1).generation;
                    let gen2 = forest.node(aligned).generation;
                    let dominates = if side1_is_src {
                        gen1 <= rhs.min_src_generation() && gen2 <= rhs.min_tgt_generation()
                    } else {
                        gen1 <= rhs.min_tgt_generation() && gen2 <= rhs.min_src_generation()
                    };
                    if !dominates {
                        continue;
                    }

                    let rule = ExtractedRule::new(node1, aligned, rhs, side1_is_src);
                    if crate::debug_enabled() {
                        eprintln!("syngram: rule {}", rule.render(forest));
                    }
                    forest.node_mut(node1).rules.push(rule.clone());
                    // String-span partners feed larger rules through the
                    // cache but never stand as a LHS themselves.
                    if forest.node(aligned).is_lhs() {
                        out.insert(rule);
                    }
                }
            }
        }
        Ok(())
    }

    /// All ways to cut `node`'s span into adjacent decomposition pieces:
    /// terminals and aligned descendants, at most `max_size` per cut.
    fn decomp_points(&self, forest: &Forest, node: NodeId) -> Vec<Vec<NodeId>> {
        let span = match forest.node(node).span {
            Some(s) => s,
            None => return Vec::new(),
        };
        let length = span.word_count();
        let max_size = if length > self.max_phrase_rule_size {
            self.max_grammar_rule_size
        } else {
            self.max_grammar_rule_size.max(self.max_phrase_rule_size)
        };

        // Pieces keyed by relative start position; the value is the
        // relative position the next piece must start at.
        let mut starts: Vec<BTreeMap<NodeId, usize>> = vec![BTreeMap::new(); length];
        for &child in &forest.node(node).children {
            collect_pieces(forest, child, span.start, &mut starts);
        }
        for child in forest.virtual_children(node) {
            collect_pieces(forest, child, span.start, &mut starts);
        }

        // Chain pieces left to right until the whole span is covered.
        let mut lists: Vec<Vec<Vec<NodeId>>> = vec![Vec::new(); length + 1];
        lists[0].push(Vec::new());
        for i in 0..length {
            let partials = std::mem::take(&mut lists[i]);
            for (&piece, &next) in &starts[i] {
                for partial in &partials {
                    if partial.len() < max_size {
                        let mut extended = partial.clone();
                        extended.push(piece);
                        lists[next].push(extended);
                    }
                }
            }
        }
        std::mem::take(&mut lists[length])
    }

    /// Build every right-hand side for one decomposition of a LHS pair,
    /// combining the expansion choices of each piece left to right.
    fn rhs_parts(
        &self,
        forest: &mut Forest,
        nodes: &[NodeId],
        aligned: NodeId,
        side1_is_src: bool,
    ) -> Result<Vec<RulePart>, Error> {
        if nodes.len() > self.max_grammar_rule_size.max(self.max_phrase_rule_size) {
            return Ok(Vec::new());
        }
        let pool = forest.unaligned_terminals(aligned);
        let aligns_for_src = !side1_is_src;

        let mut parts: Vec<RulePart> = Vec::new();
        for (idx, &child) in nodes.iter().enumerate() {
            let last = idx + 1 == nodes.len();
            let mut expansions = self.rule_alignments(forest, child, side1_is_src)?;
            if !self.minimal_rules_only {
                // A unary chain below a piece offers its descendants'
                // uses as alternative expansions.
                let mut descendant = child;
                while forest.node(descendant).children.len() == 1 {
                    descendant = forest.node(descendant).children[0];
                    for part in self.rule_alignments_unary(forest, descendant, side1_is_src)? {
                        push_unique(&mut expansions, part);
                    }
                }
            }

            if idx == 0 {
                if self.allow_triangular {
                    parts = expansions;
                } else {
                    for part in expansions {
                        if part.contains(aligned, side1_is_src) {
                            continue;
                        }
                        if last {
                            if let Some(padded) =
                                part.with_unaligned_added(forest, &pool, aligns_for_src)?
                            {
                                push_unique(&mut parts, padded);
                            }
                        } else {
                            push_unique(&mut parts, part);
                        }
                    }
                }
            } else {
                let bases = std::mem::take(&mut parts);
                for base in &bases {
                    for expansion in &expansions {
                        if !self.allow_triangular && expansion.contains(aligned, side1_is_src) {
                            continue;
                        }
                        let extra = if last { Some(pool.as_slice()) } else { None };
                        if let Some(combined) =
                            base.combine(forest, expansion, extra, aligns_for_src)?
                        {
                            push_unique(&mut parts, combined);
                        }
                    }
                }
            }

            if parts.is_empty() {
                return Ok(Vec::new());
            }
        }
        Ok(parts)
    }

    /// Expansion choices for one decomposition piece: right-hand sides
    /// of rules already extracted below it, plus a fresh part per node
    /// alignment, plus a null-padded part for unaligned terminals.
    fn rule_alignments(
        &self,
        forest: &mut Forest,
        node: NodeId,
        side1_is_src: bool,
    ) -> Result<Vec<RulePart>, Error> {
        let mut out = Vec::new();
        if !self.minimal_rules_only {
            let cached: Vec<RulePart> =
                forest.node(node).rules.iter().map(|r| r.rhs().clone()).collect();
            for part in cached {
                push_unique(&mut out, part);
            }
        }
        for partner in forest.alignments(node, rhs_mask()) {
            self.push_pair(forest, node, partner, side1_is_src, &mut out)?;
        }
        if out.is_empty() && forest.node(node).is_terminal() {
            let null = forest.null_node();
            self.push_pair(forest, node, null, side1_is_src, &mut out)?;
        }
        Ok(out)
    }

    /// The unary-chain variant: alignments of every kind count, except
    /// terminal-to-phrase ones, which only exist to license strings.
    fn rule_alignments_unary(
        &self,
        forest: &mut Forest,
        node: NodeId,
        side1_is_src: bool,
    ) -> Result<Vec<RulePart>, Error> {
        let mut out = Vec::new();
        let cached: Vec<RulePart> =
            forest.node(node).rules.iter().map(|r| r.rhs().clone()).collect();
        for part in cached {
            push_unique(&mut out, part);
        }
        let excluded = forest.alignments(node, AlignKind::T2P);
        for partner in forest.alignments_all(node) {
            if excluded.contains(&partner) {
                continue;
            }
            self.push_pair(forest, node, partner, side1_is_src, &mut out)?;
        }
        if out.is_empty() && forest.node(node).is_terminal() {
            let null = forest.null_node();
            self.push_pair(forest, node, null, side1_is_src, &mut out)?;
        }
        Ok(out)
    }

    fn push_pair(
        &self,
        forest: &Forest,
        node: NodeId,
        partner: NodeId,
        side1_is_src: bool,
        out: &mut Vec<RulePart>,
    ) -> Result<(), Error> {
        if let Some(part) = RulePart::from_aligned_pair(
            forest,
            node,
            partner,
            self.max_grammar_rule_size,
            self.max_phrase_rule_size,
            side1_is_src,
        )? {
            push_unique(out, part);
        }
        Ok(())
    }
}

fn collect_pieces(
    forest: &Forest,
    node: NodeId,
    base: usize,
    starts: &mut [BTreeMap<NodeId, usize>],
) {
    let n = forest.node(node);
    let span = match n.span {
        Some(s) => s,
        None => return,
    };
    if n.is_terminal() || n.is_aligned_any() {
        starts[span.start - base].insert(node, span.end + 1 - base);
        return;
    }
    for &child in &n.children {
        collect_pieces(forest, child, base, starts);
    }
    for child in forest.virtual_children(node) {
        collect_pieces(forest, child, base, starts);
    }
}

fn push_unique(parts: &mut Vec<RulePart>, part: RulePart) {
    if !parts.contains(&part) {
        parts.push(part);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::NodeAligner;
    use crate::word_align::WordAlignment;

    fn extract_lines(src: &str, tgt: &str, aligns: &str) -> Vec<String> {
        extract_configured(src, tgt, aligns, false, false)
    }

    fn extract_configured(
        src: &str,
        tgt: &str,
        aligns: &str,
        allow_triangular: bool,
        minimal_rules_only: bool,
    ) -> Vec<String> {
        let mut forest = Forest::new();
        let src_root = forest.parse_tree(src).unwrap();
        let tgt_root = forest.parse_tree(tgt).unwrap();
        let word_aligns = WordAlignment::parse(aligns).unwrap();
        NodeAligner::new(4).align(&mut forest, src_root, tgt_root, &word_aligns);

        let extractor = GrammarExtractor::new(4, 4, allow_triangular, minimal_rules_only);
        let rules = extractor.extract(&mut forest, src_root, tgt_root).unwrap();
        let mut lines: Vec<String> = rules.iter().map(|r| r.render(&forest)).collect();
        lines.sort();
        lines
    }

    fn sorted(mut lines: Vec<String>) -> Vec<String> {
        lines.sort();
        lines
    }

    #[test]
    fn single_link_pair_yields_phrase_and_grammar_rules() {
        let lines = extract_lines("(B (C c) (D d))", "(R (Q q) (P p))", "1-0");
        let expected = sorted(
            [
                "P ||| [B::Q] ||| c d ||| q ||| OO ||| 1-0",
                "P ||| [B::R] ||| c d ||| q p ||| OO ||| 1-0",
                "P ||| [D::Q] ||| d ||| q ||| OO ||| 0-0",
                "P ||| [D::R] ||| d ||| q p ||| OO ||| 0-0",
                "G ||| [B::R] ||| c [D::Q,1] ||| [D::Q,1] p ||| OO OO ||| 1-0",
            ]
            .map(String::from)
            .to_vec(),
        );
        assert_eq!(lines, expected);
    }

    #[test]
    fn one_to_many_links_force_a_single_root_phrase() {
        // Both target preterminals are inconsistent, so the target root
        // is the source root's only partner.
        let lines = extract_lines("(A a)", "(Z (Y y) (X x))", "0-0 0-1");
        assert_eq!(lines, vec!["P ||| [A::Z] ||| a ||| y x ||| OO ||| 0-0 0-1".to_string()]);
    }

    #[test]
    fn swapped_links_produce_the_full_reordered_rule_set() {
        let lines =
            extract_lines("(A (B b) (C c) (D d))", "(Z (V v) (W w) (X x))", "0-1 1-0 2-2");
        let expected = sorted(
            [
                "G ||| [A::Z] ||| b [C::V,1] d ||| [C::V,1] w x ||| OO OO ||| 0-1 1-0 2-2",
                "G ||| [B-C::V-W] ||| b [C::V,1] ||| [C::V,1] w ||| VV OO ||| 0-1 1-0",
                "P ||| [D::X] ||| d ||| x ||| OO ||| 0-0",
                "G ||| [A::Z] ||| b [C::V,1] [D::X,2] ||| [C::V,1] w [D::X,2] ||| OO OO OO ||| 0-1 1-0 2-2",
                "P ||| [B-C::V-W] ||| b c ||| v w ||| VV ||| 0-1 1-0",
                "G ||| [A::Z] ||| [B-C::V-W,1] d ||| [B-C::V-W,1] x ||| OO VV ||| 0-0 1-1",
                "G ||| [B-C::V-W] ||| [B::W,1] c ||| v [B::W,1] ||| VV OO ||| 0-1 1-0",
                "P ||| [C::V] ||| c ||| v ||| OO ||| 0-0",
                "G ||| [A::Z] ||| [B::W,1] [C::V,2] d ||| [C::V,2] [B::W,1] x ||| OO OO OO ||| 0-1 1-0 2-2",
                "G ||| [A::Z] ||| [B::W,1] c [D::X,2] ||| v [B::W,1] [D::X,2] ||| OO OO OO ||| 0-1 1-0 2-2",
                "P ||| [A::Z] ||| b c d ||| v w x ||| OO ||| 0-1 1-0 2-2",
                "G ||| [A::Z] ||| [B-C::V-W,1] [D::X,2] ||| [B-C::V-W,1] [D::X,2] ||| OO VV OO ||| 0-0 1-1",
                "G ||| [B-C::V-W] ||| [B::W,1] [C::V,2] ||| [C::V,2] [B::W,1] ||| VV OO OO ||| 0-1 1-0",
                "G ||| [A::Z] ||| b c [D::X,1] ||| v w [D::X,1] ||| OO OO ||| 0-1 1-0 2-2",
                "G ||| [A::Z] ||| [B::W,1] c d ||| v [B::W,1] x ||| OO OO ||| 0-1 1-0 2-2",
                "P ||| [B::W] ||| b ||| w ||| OO ||| 0-0",
                "G ||| [A::Z] ||| [B::W,1] [C::V,2] [D::X,3] ||| [C::V,2] [B::W,1] [D::X,3] ||| OO OO OO OO ||| 0-1 1-0 2-2",
            ]
            .map(String::from)
            .to_vec(),
        );
        assert_eq!(lines, expected);
    }

    #[test]
    fn minimal_mode_composes_from_direct_alignments_only() {
        // Without cached-rule reuse, a piece only expands through its own
        // node alignments: the two phrase rules that rebuilt D's cached
        // right-hand sides under B disappear, the rest survive.
        let lines = extract_configured("(B (C c) (D d))", "(R (Q q) (P p))", "1-0", false, true);
        let expected = sorted(
            [
                "G ||| [B::R] ||| c [D::Q,1] ||| [D::Q,1] p ||| OO OO ||| 1-0",
                "P ||| [D::Q] ||| d ||| q ||| OO ||| 0-0",
                "P ||| [D::R] ||| d ||| q p ||| OO ||| 0-0",
            ]
            .map(String::from)
            .to_vec(),
        );
        assert_eq!(lines, expected);
    }

    #[test]
    fn triangular_mode_admits_right_hand_sides_naming_the_partner() {
        // Everything the plain run finds plus the two decompositions
        // whose right-hand side mentions the aligned LHS node itself.
        let lines = extract_configured("(B (C c) (D d))", "(R (Q q) (P p))", "1-0", true, false);
        let expected = sorted(
            [
                "P ||| [B::Q] ||| c d ||| q ||| OO ||| 1-0",
                "P ||| [B::R] ||| c d ||| q p ||| OO ||| 1-0",
                "P ||| [D::Q] ||| d ||| q ||| OO ||| 0-0",
                "P ||| [D::R] ||| d ||| q p ||| OO ||| 0-0",
                "G ||| [B::R] ||| c [D::Q,1] ||| [D::Q,1] p ||| OO OO ||| 1-0",
                "G ||| [B::Q] ||| c [D::Q,1] ||| [D::Q,1] ||| OO OO ||| 1-0",
                "G ||| [B::R] ||| c [D::R,1] ||| [D::R,1] ||| OO OO ||| 1-0",
            ]
            .map(String::from)
            .to_vec(),
        );
        assert_eq!(lines, expected);
    }

    #[test]
    fn unaligned_pairs_yield_no_rules() {
        let lines = extract_lines("(B (C c) (D d))", "(R (Q q) (P p))", "");
        assert!(lines.is_empty());
    }

    #[test]
    fn decompositions_cut_at_aligned_nodes_and_terminals() {
        let mut forest = Forest::new();
        let src_root = forest.parse_tree("(B (C c) (D d))").unwrap();
        let tgt_root = forest.parse_tree("(R (Q q) (P p))").unwrap();
        let word_aligns = WordAlignment::parse("1-0").unwrap();
        NodeAligner::new(4).align(&mut forest, src_root, tgt_root, &word_aligns);

        let extractor = GrammarExtractor::new(4, 4, false, false);
        let decomps = extractor.decomp_points(&forest, src_root);
        // C is inconsistent, so its word stands in for it; D is aligned
        // and stays whole.
        assert_eq!(decomps.len(), 1);
        let cats: Vec<_> =
            decomps[0].iter().map(|&n| forest.node(n).category.clone()).collect();
        assert_eq!(cats, vec!["c", "D"]);
    }
}
