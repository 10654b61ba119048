use std::collections::{BTreeMap, BTreeSet};

use crate::error::Error;

/// A many-to-many word alignment between a source and a target sentence,
/// parsed from Moses-format `i-j` link strings. Indexes are 0-based and
/// the table is immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordAlignment {
    from_src: BTreeMap<usize, BTreeSet<usize>>,
    from_tgt: BTreeMap<usize, BTreeSet<usize>>,
}

impl WordAlignment {
    /// Parse a Moses alignment string, e.g. `"0-0 1-2 1-3"`.
    ///
    /// Whitespace-only input is a valid empty alignment. Any token that
    /// is not exactly one non-empty numeric pair fails hard.
    pub fn parse(line: &str) -> Result<Self, Error> {
        let mut aligns = WordAlignment::default();
        for token in line.split_whitespace() {
            if !regex!(r"^\d+-\d+$").is_match(token) {
                return Err(Error::MalformedAlignment(token.to_string()));
            }
            let (src, tgt) = token
                .split_once('-')
                .ok_or_else(|| Error::MalformedAlignment(token.to_string()))?;
            let src = src.parse::<usize>().map_err(|_| Error::MalformedAlignment(token.to_string()))?;
            let tgt = tgt.parse::<usize>().map_err(|_| Error::MalformedAlignment(token.to_string()))?;
            aligns.add_link(src, tgt);
        }
        Ok(aligns)
    }

    fn add_link(&mut self, src: usize, tgt: usize) {
        self.from_src.entry(src).or_default().insert(tgt);
        self.from_tgt.entry(tgt).or_default().insert(src);
    }

    /// Target indexes linked to the given source word.
    pub fn links_for_src(&self, src: usize) -> impl Iterator<Item = usize> + '_ {
        self.from_src.get(&src).into_iter().flatten().copied()
    }

    /// Source indexes linked to the given target word.
    pub fn links_for_tgt(&self, tgt: usize) -> impl Iterator<Item = usize> + '_ {
        self.from_tgt.get(&tgt).into_iter().flatten().copied()
    }

    pub fn src_is_aligned(&self, src: usize) -> bool {
        self.from_src.contains_key(&src)
    }

    pub fn tgt_is_aligned(&self, tgt: usize) -> bool {
        self.from_tgt.contains_key(&tgt)
    }

    pub fn is_empty(&self) -> bool {
        self.from_src.is_empty()
    }
}
