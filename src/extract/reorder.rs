//! Component reordering links for a rule right-hand side.

use crate::error::Error;
use crate::tree::{Forest, NodeId};

/// Source-to-target links between the components of one rule part,
/// indexed by source component position. Rebuilt whenever the component
/// lists change; rendering and the constituent-index map both read it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderingList {
    links: Vec<Vec<usize>>,
}

impl ReorderingList {
    /// Derive the links from node-level alignments: component `i` on
    /// the driving side links to every opposite component its node is
    /// aligned to, of any kind.
    ///
    /// Every source nonterminal must end up linked; a combination that
    /// leaves one dangling indicates corrupted alignment state.
    pub fn build(
        forest: &Forest,
        src_part: &[NodeId],
        tgt_part: &[NodeId],
        from_source: bool,
    ) -> Result<Self, Error> {
        let mut list = ReorderingList { links: vec![Vec::new(); src_part.len()] };

        let (driving, opposite) = if from_source { (src_part, tgt_part) } else { (tgt_part, src_part) };
        for (i, &node) in driving.iter().enumerate() {
            let aligns = forest.alignments_all(node);
            for (j, &other) in opposite.iter().enumerate() {
                if aligns.contains(&other) {
                    let (s, t) = if from_source { (i, j) } else { (j, i) };
                    list.links[s].push(t);
                }
            }
        }

        for (i, &node) in src_part.iter().enumerate() {
            let n = forest.node(node);
            if !n.is_terminal() && !n.is_null() && list.links[i].is_empty() {
                return Err(Error::InternalConsistency(format!(
                    "nonterminal '{}' has no reordering link",
                    n.category
                )));
            }
        }
        Ok(list)
    }

    /// Target components linked to source component `i`.
    pub fn from_source(&self, i: usize) -> &[usize] {
        self.links.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parse a rendered pair list back into the slot pairing. Slots
    /// never mentioned stay unlinked.
    pub fn parse(text: &str) -> Result<ReorderingList, Error> {
        let mut links: Vec<Vec<usize>> = Vec::new();
        for token in text.split_whitespace() {
            if !regex!(r"^\d+-\d+$").is_match(token) {
                return Err(Error::MalformedAlignment(token.to_string()));
            }
            let (i, j) = token
                .split_once('-')
                .ok_or_else(|| Error::MalformedAlignment(token.to_string()))?;
            let i = i.parse::<usize>().map_err(|_| Error::MalformedAlignment(token.to_string()))?;
            let j = j.parse::<usize>().map_err(|_| Error::MalformedAlignment(token.to_string()))?;
            if links.len() <= i {
                links.resize(i + 1, Vec::new());
            }
            links[i].push(j);
        }
        Ok(ReorderingList { links })
    }

    /// `i-j` pairs in source order, space separated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, targets) in self.links.iter().enumerate() {
            for &j in targets {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&format!("{i}-{j}"));
            }
        }
        out
    }
}
