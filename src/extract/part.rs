//! Rule right-hand sides and their combination algebra.

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use crate::error::Error;
use crate::tree::{Forest, NodeId};

use super::reorder::ReorderingList;

/// One right-hand side of a rule in progress: parallel component lists
/// for both sides, the word positions they cover, and the bookkeeping
/// needed to decide whether a combination may still grow.
///
/// Parts are immutable once built; combining two parts produces a new
/// one or nothing at all, so a partially merged side can never leak
/// into a rule.
#[derive(Debug, Clone)]
pub struct RulePart {
    src_part: Vec<NodeId>,
    tgt_part: Vec<NodeId>,
    reorder: ReorderingList,
    covered_src: BTreeSet<usize>,
    covered_tgt: BTreeSet<usize>,
    max_grammar_components: usize,
    max_phrase_components: usize,
    from_source: bool,
    is_phrase: bool,
    min_src_generation: u32,
    min_tgt_generation: u32,
}

impl RulePart {
    /// Seed a part from one node-aligned pair. `part1` is the side-1
    /// node, `part2` its aligned partner. String-span nodes dissolve
    /// into their terminals; `None` when that alone overflows the
    /// phrase size.
    pub fn from_aligned_pair(
        forest: &Forest,
        part1: NodeId,
        part2: NodeId,
        max_grammar: usize,
        max_phrase: usize,
        from_source: bool,
    ) -> Result<Option<RulePart>, Error> {
        let is_phrase = forest.node(part1).is_terminal() && forest.node(part2).is_terminal();
        let (src, tgt) = if from_source { (part1, part2) } else { (part2, part1) };

        let mut src_part = Vec::new();
        if forest.node(src).is_string() {
            src_part.extend(forest.node(src).terminal_components.iter().copied());
            if src_part.len() > max_phrase {
                return Ok(None);
            }
        } else {
            src_part.push(src);
        }

        let mut tgt_part = Vec::new();
        if forest.node(tgt).is_string() {
            tgt_part.extend(forest.node(tgt).terminal_components.iter().copied());
            if tgt_part.len() > max_phrase {
                return Ok(None);
            }
        } else {
            tgt_part.push(tgt);
        }

        Ok(Some(Self::assemble(
            forest,
            src_part,
            tgt_part,
            max_grammar,
            max_phrase,
            from_source,
            is_phrase,
            forest.node(src).generation,
            forest.node(tgt).generation,
        )?))
    }

    /// Build a part from already-collected component lists, sorting
    /// them into word order and recomputing coverage and links.
    #[allow(clippy::too_many_arguments)]
    fn assemble(
        forest: &Forest,
        mut src_part: Vec<NodeId>,
        mut tgt_part: Vec<NodeId>,
        max_grammar: usize,
        max_phrase: usize,
        from_source: bool,
        is_phrase: bool,
        min_src_generation: u32,
        min_tgt_generation: u32,
    ) -> Result<RulePart, Error> {
        src_part.sort_by_key(|&n| forest.position_key(n));
        tgt_part.sort_by_key(|&n| forest.position_key(n));

        let src_nonterminals = src_part.iter().filter(|&&n| !forest.node(n).is_terminal()).count();
        let tgt_nonterminals = tgt_part.iter().filter(|&&n| !forest.node(n).is_terminal()).count();
        if src_nonterminals != tgt_nonterminals {
            return Err(Error::InternalConsistency(format!(
                "unbalanced nonterminals: {src_nonterminals} source vs {tgt_nonterminals} target"
            )));
        }

        let reorder = ReorderingList::build(forest, &src_part, &tgt_part, from_source)?;
        Ok(RulePart {
            covered_src: coverage(forest, &src_part),
            covered_tgt: coverage(forest, &tgt_part),
            src_part,
            tgt_part,
            reorder,
            max_grammar_components: max_grammar,
            max_phrase_components: max_phrase,
            from_source,
            is_phrase,
            min_src_generation,
            min_tgt_generation,
        })
    }

    /// Append `other` to this part. All-or-nothing: `None` when the
    /// target coverages collide or a side outgrows its limit.
    ///
    /// `extra` is the pool of unaligned opposite-side terminals; on the
    /// final combination of a right-hand side they pad whichever side
    /// `aligns_for_src` selects, filling positions no component covers.
    pub fn combine(
        &self,
        forest: &mut Forest,
        other: &RulePart,
        extra: Option<&[NodeId]>,
        aligns_for_src: bool,
    ) -> Result<Option<RulePart>, Error> {
        if self.covered_tgt.intersection(&other.covered_tgt).next().is_some() {
            return Ok(None);
        }

        let mut src = strip_leading_nulls(forest, &self.src_part);
        src.extend(strip_leading_nulls(forest, &other.src_part));
        if aligns_for_src {
            if let Some(extra) = extra {
                add_uncovered(forest, extra, &mut src);
            }
        }
        if src.is_empty() {
            src.push(forest.null_node());
        }

        let mut tgt = strip_leading_nulls(forest, &self.tgt_part);
        tgt.extend(strip_leading_nulls(forest, &other.tgt_part));
        if !aligns_for_src {
            if let Some(extra) = extra {
                add_uncovered(forest, extra, &mut tgt);
            }
        }
        if tgt.is_empty() {
            tgt.push(forest.null_node());
        }

        let is_phrase = self.is_phrase && other.is_phrase;
        let max_size = if is_phrase {
            self.max_grammar_components.max(self.max_phrase_components)
        } else {
            self.max_grammar_components
        };
        if src.len() > max_size || tgt.len() > max_size {
            return Ok(None);
        }

        Ok(Some(Self::assemble(
            forest,
            src,
            tgt,
            self.max_grammar_components,
            self.max_phrase_components,
            self.from_source,
            is_phrase,
            self.min_src_generation.min(other.min_src_generation),
            self.min_tgt_generation.min(other.min_tgt_generation),
        )?))
    }

    /// The single-component variant of final padding: pad this part
    /// directly instead of combining first.
    pub fn with_unaligned_added(
        &self,
        forest: &Forest,
        extra: &[NodeId],
        aligns_for_src: bool,
    ) -> Result<Option<RulePart>, Error> {
        let mut part = self.clone();
        let max_size =
            if part.is_phrase { part.max_phrase_components } else { part.max_grammar_components };

        if aligns_for_src {
            add_uncovered(forest, extra, &mut part.src_part);
            if part.src_part.len() > max_size {
                return Ok(None);
            }
            part.src_part.sort_by_key(|&n| forest.position_key(n));
            part.covered_src = coverage(forest, &part.src_part);
        } else {
            add_uncovered(forest, extra, &mut part.tgt_part);
            if part.tgt_part.len() > max_size {
                return Ok(None);
            }
            part.tgt_part.sort_by_key(|&n| forest.position_key(n));
            part.covered_tgt = coverage(forest, &part.tgt_part);
        }

        part.reorder = ReorderingList::build(forest, &part.src_part, &part.tgt_part, true)?;
        Ok(Some(part))
    }

    /// Whether this part's coverage equals exactly the spans of the two
    /// left-hand-side nodes.
    pub fn spans_match(&self, forest: &Forest, node1: NodeId, aligned: NodeId) -> bool {
        let (src, tgt) = if self.from_source { (node1, aligned) } else { (aligned, node1) };
        let src_range = match forest.node(src).span {
            Some(s) => (s.start..=s.end).collect::<BTreeSet<_>>(),
            None => BTreeSet::new(),
        };
        let tgt_range = match forest.node(tgt).span {
            Some(s) => (s.start..=s.end).collect::<BTreeSet<_>>(),
            None => BTreeSet::new(),
        };
        self.covered_src == src_range && self.covered_tgt == tgt_range
    }

    pub fn contains(&self, node: NodeId, search_in_tgt: bool) -> bool {
        if search_in_tgt { self.tgt_part.contains(&node) } else { self.src_part.contains(&node) }
    }

    pub fn is_parallel_unary(&self, forest: &Forest) -> bool {
        self.src_part.len() == 1
            && self.tgt_part.len() == 1
            && !forest.node(self.src_part[0]).is_terminal()
            && !forest.node(self.tgt_part[0]).is_terminal()
    }

    /// `P` for all-terminal parts, `G` otherwise.
    pub fn rule_type(&self) -> &'static str {
        if self.is_phrase { "P" } else { "G" }
    }

    pub fn min_src_generation(&self) -> u32 {
        self.min_src_generation
    }

    pub fn min_tgt_generation(&self) -> u32 {
        self.min_tgt_generation
    }

    pub fn src_components(&self) -> &[NodeId] {
        &self.src_part
    }

    pub fn tgt_components(&self) -> &[NodeId] {
        &self.tgt_part
    }

    pub fn covered_words(&self) -> (&BTreeSet<usize>, &BTreeSet<usize>) {
        (&self.covered_src, &self.covered_tgt)
    }

    // --- Rendering ----------------------------------------------------------

    /// Target component index paired with each source component; `None`
    /// for terminals, nulls, and (defensively) unlinked components.
    fn partner_map(&self, forest: &Forest) -> Vec<Option<usize>> {
        self.src_part
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let node = forest.node(n);
                if node.is_terminal() || node.is_null() {
                    None
                } else {
                    self.reorder.from_source(i).first().copied()
                }
            })
            .collect()
    }

    /// Render both sides: terminals as their words, each nonterminal as
    /// `[SRC::TGT,k]` with `k` numbering constituent pairs in source
    /// order.
    pub fn render_sides(&self, forest: &Forest) -> (String, String) {
        let partners = self.partner_map(forest);

        let mut src_num = vec![0usize; self.src_part.len()];
        let mut tgt_num = vec![0usize; self.tgt_part.len()];
        let mut tgt_partner: Vec<Option<usize>> = vec![None; self.tgt_part.len()];
        let mut count = 1;
        for (i, partner) in partners.iter().enumerate() {
            if let Some(j) = *partner {
                src_num[i] = count;
                tgt_num[j] = count;
                tgt_partner[j] = Some(i);
                count += 1;
            }
        }

        let mut src_field = Vec::new();
        for (i, &n) in self.src_part.iter().enumerate() {
            let node = forest.node(n);
            if node.is_null() {
                continue;
            }
            if node.is_terminal() {
                src_field.push(node.category.clone());
            } else if let Some(j) = partners[i] {
                let partner = forest.node(self.tgt_part[j]);
                src_field.push(format!("[{}::{},{}]", node.category, partner.category, src_num[i]));
            }
        }

        let mut tgt_field = Vec::new();
        for (j, &n) in self.tgt_part.iter().enumerate() {
            let node = forest.node(n);
            if node.is_null() {
                continue;
            }
            if node.is_terminal() {
                tgt_field.push(node.category.clone());
            } else if let Some(i) = tgt_partner[j] {
                let partner = forest.node(self.src_part[i]);
                tgt_field.push(format!("[{}::{},{}]", partner.category, node.category, tgt_num[j]));
            }
        }

        (src_field.join(" "), tgt_field.join(" "))
    }

    /// `OO`-style category pair per constituent pair, in source order.
    pub fn align_type_pairs(&self, forest: &Forest) -> String {
        let partners = self.partner_map(forest);
        let mut out = Vec::new();
        for (i, partner) in partners.iter().enumerate() {
            if let Some(j) = *partner {
                let a = if forest.node(self.src_part[i]).is_real() { "O" } else { "V" };
                let b = if forest.node(self.tgt_part[j]).is_real() { "O" } else { "V" };
                out.push(format!("{a}{b}"));
            }
        }
        out.join(" ")
    }

    pub fn reorder_string(&self) -> String {
        self.reorder.render()
    }
}

/// Parts are interchangeable when they list the same components over
/// the same words; size limits, generations, and links all derive from
/// those.
impl PartialEq for RulePart {
    fn eq(&self, other: &Self) -> bool {
        self.src_part == other.src_part
            && self.tgt_part == other.tgt_part
            && self.covered_src == other.covered_src
            && self.covered_tgt == other.covered_tgt
    }
}

impl Eq for RulePart {}

impl Hash for RulePart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.src_part.hash(state);
        self.tgt_part.hash(state);
        self.covered_src.hash(state);
        self.covered_tgt.hash(state);
    }
}

fn coverage(forest: &Forest, nodes: &[NodeId]) -> BTreeSet<usize> {
    let mut out = BTreeSet::new();
    for &n in nodes {
        if let Some(span) = forest.node(n).span {
            out.extend(span.start..=span.end);
        }
    }
    out
}

fn strip_leading_nulls(forest: &Forest, nodes: &[NodeId]) -> Vec<NodeId> {
    let skip = nodes.iter().take_while(|&&n| forest.node(n).is_null()).count();
    nodes[skip..].to_vec()
}

/// Append each pool terminal whose position no current component
/// covers.
fn add_uncovered(forest: &Forest, extra: &[NodeId], list: &mut Vec<NodeId>) {
    let covered = coverage(forest, list);
    for &n in extra {
        if let Some(span) = forest.node(n).span {
            if !covered.contains(&span.start) {
                list.push(n);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aligner::AlignKind;

    fn linked_pair(forest: &mut Forest) -> (NodeId, NodeId, NodeId, NodeId) {
        let src = forest.parse_tree("(B (C c) (D d))").unwrap();
        let tgt = forest.parse_tree("(R (Q q) (P p))").unwrap();
        let d = forest.node(src).children[1];
        let q = forest.node(tgt).children[0];
        forest.add_node_alignment(d, AlignKind::T2T, q);
        (src, tgt, d, q)
    }

    #[test]
    fn aligned_pair_seeds_a_grammar_part() {
        let mut f = Forest::new();
        let (_, _, d, q) = linked_pair(&mut f);
        let part = RulePart::from_aligned_pair(&f, d, q, 4, 4, true).unwrap().unwrap();
        assert_eq!(part.rule_type(), "G");
        assert_eq!(part.covered_words().0.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(part.covered_words().1.iter().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(part.min_src_generation(), 1);
        assert_eq!(part.render_sides(&f), ("[D::Q,1]".to_string(), "[D::Q,1]".to_string()));
        assert_eq!(part.align_type_pairs(&f), "OO");
    }

    #[test]
    fn string_partner_dissolves_into_terminals() {
        let mut f = Forest::new();
        let (_, tgt, d, _) = linked_pair(&mut f);
        let d_word = f.node(d).children[0];
        let string = f.string_span(tgt, 0, 1);
        let part = RulePart::from_aligned_pair(&f, d_word, string, 4, 4, true).unwrap().unwrap();
        assert_eq!(part.rule_type(), "P");
        assert_eq!(part.tgt_components().len(), 2);
        assert_eq!(part.render_sides(&f), ("d".to_string(), "q p".to_string()));

        // A two-word string cannot seed a one-word phrase part.
        let tight = RulePart::from_aligned_pair(&f, d_word, string, 4, 1, true).unwrap();
        assert!(tight.is_none());
    }

    #[test]
    fn overlapping_target_coverage_blocks_combination() {
        let mut f = Forest::new();
        let (src, tgt, d, q) = linked_pair(&mut f);
        let c = f.node(src).children[0];
        let v = f.node(tgt).children[1];
        f.add_node_alignment(c, AlignKind::T2T, q);
        f.add_node_alignment(d, AlignKind::T2T, v);

        let a = RulePart::from_aligned_pair(&f, c, q, 4, 4, true).unwrap().unwrap();
        let b = RulePart::from_aligned_pair(&f, d, q, 4, 4, true).unwrap().unwrap();
        assert!(a.combine(&mut f, &b, None, true).unwrap().is_none());

        let b = RulePart::from_aligned_pair(&f, d, v, 4, 4, true).unwrap().unwrap();
        let combined = a.combine(&mut f, &b, None, true).unwrap().unwrap();
        assert_eq!(combined.src_components().len(), 2);
        // D carries links to both Q and V by now; all of them surface.
        assert_eq!(combined.reorder_string(), "0-0 1-0 1-1");
    }

    #[test]
    fn final_combination_pads_uncovered_positions_only() {
        let mut f = Forest::new();
        let (src, tgt, d, q) = linked_pair(&mut f);
        let c_word = f.node(f.node(src).children[0]).children[0];
        let p_word = f.node(f.node(tgt).children[1]).children[0];

        let null = f.null_node();
        let left = RulePart::from_aligned_pair(&f, c_word, null, 4, 4, true).unwrap().unwrap();
        let right = RulePart::from_aligned_pair(&f, d, q, 4, 4, true).unwrap().unwrap();
        let padded = left.combine(&mut f, &right, Some(&[p_word]), false).unwrap().unwrap();
        assert_eq!(padded.tgt_components().len(), 2);
        assert_eq!(padded.covered_words().1.iter().copied().collect::<Vec<_>>(), vec![0, 1]);

        // A pool terminal whose position is already covered is skipped.
        let q_word = f.node(q).children[0];
        let again = left.combine(&mut f, &right, Some(&[q_word, p_word]), false).unwrap().unwrap();
        assert_eq!(again.tgt_components().len(), 2);
    }

    #[test]
    fn size_limits_respect_part_kind() {
        let mut f = Forest::new();
        let (src, tgt, d, q) = linked_pair(&mut f);
        let c = f.node(src).children[0];
        let v = f.node(tgt).children[1];
        f.add_node_alignment(c, AlignKind::T2T, v);

        // Grammar parts are capped by the grammar size even when the
        // phrase cap is larger.
        let a = RulePart::from_aligned_pair(&f, c, v, 1, 4, true).unwrap().unwrap();
        let b = RulePart::from_aligned_pair(&f, d, q, 1, 4, true).unwrap().unwrap();
        assert!(a.combine(&mut f, &b, None, true).unwrap().is_none());
    }
}
