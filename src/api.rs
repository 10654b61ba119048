use std::time::{Duration, Instant};

use crate::aligner::NodeAligner;
use crate::error::Error;
use crate::extract::GrammarExtractor;
use crate::tree::Forest;
use crate::word_align::WordAlignment;

/// Options controlling alignment and extraction for one sentence pair.
#[derive(Debug, Clone)]
pub struct Options {
    /// Largest number of components on either side of a grammar rule.
    pub max_grammar_rule_size: usize,
    /// Largest number of words on either side of a phrase rule.
    pub max_phrase_rule_size: usize,
    /// Largest sibling group a virtual node may cover.
    pub max_virtual_node_components: usize,
    /// Keep rules whose right-hand side is a single nonterminal pair.
    pub allow_unary: bool,
    /// Allow a right-hand side to mention the opposite LHS node, and run
    /// the mirrored target-side decomposition pass.
    pub allow_triangular: bool,
    /// Compose right-hand sides only from direct node alignments,
    /// ignoring rules already extracted below.
    pub minimal_rules_only: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_grammar_rule_size: 4,
            max_phrase_rule_size: 4,
            max_virtual_node_components: 4,
            allow_unary: true,
            allow_triangular: false,
            minimal_rules_only: false,
        }
    }
}

/// Result from [`extract`] and [`extract_with`].
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Rendered rules in discovery order, duplicates removed.
    pub rules: Vec<String>,
    /// Node alignment records as `s1-s2 ||| t1-t2 ||| KIND...` lines.
    pub alignments: Vec<String>,
    /// Time spent aligning and extracting.
    pub elapsed: Duration,
}

/// Extract rules from one sentence pair with default [`Options`].
///
/// Both trees are parenthesized strings; the alignment is a Moses-style
/// `i-j` link list over their 0-based word positions.
///
/// # Example
/// ```
/// let res = syngram::extract("(B (C c) (D d))", "(R (Q q) (P p))", "1-0").unwrap();
/// assert!(res.rules.contains(&"P ||| [B::Q] ||| c d ||| q ||| OO ||| 1-0".to_string()));
/// ```
pub fn extract(src_tree: &str, tgt_tree: &str, alignment: &str) -> Result<Extraction, Error> {
    extract_with(src_tree, tgt_tree, alignment, &Options::default())
}

/// Extract rules from one sentence pair with explicit [`Options`].
pub fn extract_with(
    src_tree: &str,
    tgt_tree: &str,
    alignment: &str,
    opts: &Options,
) -> Result<Extraction, Error> {
    let started = Instant::now();

    let mut forest = Forest::new();
    let src_root = forest.parse_tree(src_tree)?;
    let tgt_root = forest.parse_tree(tgt_tree)?;
    let word_aligns = WordAlignment::parse(alignment)?;

    let aligner = NodeAligner::new(opts.max_virtual_node_components);
    let node_aligns = aligner.align(&mut forest, src_root, tgt_root, &word_aligns);

    let extractor = GrammarExtractor::new(
        opts.max_grammar_rule_size,
        opts.max_phrase_rule_size,
        opts.allow_triangular,
        opts.minimal_rules_only,
    );
    let rules = extractor.extract(&mut forest, src_root, tgt_root)?;

    let mut lines = Vec::with_capacity(rules.len());
    for rule in rules.iter() {
        if !opts.allow_unary && rule.is_parallel_unary(&forest) {
            continue;
        }
        lines.push(rule.render(&forest));
    }

    Ok(Extraction {
        rules: lines,
        alignments: node_aligns.interchange_lines(),
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_filter_drops_parallel_nonterminal_pairs() {
        let full = extract("(A (B b))", "(Z (V v))", "0-0").unwrap();
        assert!(full.rules.iter().any(|r| r.contains("[B::V,1] ||| [B::V,1]")));

        let opts = Options { allow_unary: false, ..Options::default() };
        let filtered = extract_with("(A (B b))", "(Z (V v))", "0-0", &opts).unwrap();
        assert!(!filtered.rules.iter().any(|r| r.contains("[B::V,1] ||| [B::V,1]")));
        // Phrase rules over single words survive the filter.
        assert!(filtered.rules.iter().any(|r| r.starts_with("P ")));
    }

    #[test]
    fn extraction_options_reach_the_extractor() {
        let base = extract("(B (C c) (D d))", "(R (Q q) (P p))", "1-0").unwrap();
        assert_eq!(base.rules.len(), 5);

        let opts = Options { minimal_rules_only: true, ..Options::default() };
        let minimal = extract_with("(B (C c) (D d))", "(R (Q q) (P p))", "1-0", &opts).unwrap();
        assert_eq!(minimal.rules.len(), 3);

        let opts = Options { allow_triangular: true, ..Options::default() };
        let triangular = extract_with("(B (C c) (D d))", "(R (Q q) (P p))", "1-0", &opts).unwrap();
        assert_eq!(triangular.rules.len(), 7);
        assert!(
            triangular.rules.contains(&"G ||| [B::Q] ||| c [D::Q,1] ||| [D::Q,1] ||| OO OO ||| 1-0".to_string())
        );
    }

    #[test]
    fn malformed_input_is_reported_not_swallowed() {
        assert!(extract("(B", "(R (Q q) (P p))", "").is_err());
        assert!(extract("(B (C c))", "(R (Q q))", "0-0 nope").is_err());
    }
}
