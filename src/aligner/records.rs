use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::span::{BiSpan, Span};

bitflags! {
    /// Node alignment types, stored as a bitmask per span pair.
    ///
    /// `SRC_GROWN` / `TGT_GROWN` annotate how a span was reached (its
    /// boundary sits on unaligned words on that side); the remaining
    /// flags classify the structural relationship itself. `T2P` / `P2T`
    /// mark one-to-many terminal links and never license rule LHS use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AlignKind: u16 {
        const SRC_GROWN = 1;
        const TGT_GROWN = 2;
        const T2T = 4;
        const T2S = 8;
        const S2T = 16;
        const T2TS = 32;
        const TS2T = 64;
        const TS2TS = 128;
        const T2P = 256;
        const P2T = 512;
    }
}

impl AlignKind {
    /// Number of distinct single-flag kinds.
    pub const SLOTS: usize = 10;

    /// Slot index of a single-flag kind, used to key per-node alignment
    /// sets.
    pub fn slot(self) -> usize {
        debug_assert_eq!(self.bits().count_ones(), 1);
        self.bits().trailing_zeros() as usize
    }

    fn token(self) -> &'static str {
        match self {
            AlignKind::SRC_GROWN => "SRC_GROWN",
            AlignKind::TGT_GROWN => "TGT_GROWN",
            AlignKind::T2T => "T2T",
            AlignKind::T2S => "T2S",
            AlignKind::S2T => "S2T",
            AlignKind::T2TS => "T2TS",
            AlignKind::TS2T => "TS2T",
            AlignKind::TS2TS => "TS2TS",
            AlignKind::T2P => "T2P",
            AlignKind::P2T => "P2T",
            _ => "UNKNOWN",
        }
    }

    /// Render a bitmask as space-separated type tokens.
    pub fn decode(mask: AlignKind) -> String {
        let mut out = String::new();
        for flag in mask.iter() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(flag.token());
        }
        out
    }
}

/// Span-pair alignment records for one sentence pair.
///
/// Two views are kept: keyed by source span and keyed by target span,
/// depending on which side discovered the record. Interchange output and
/// the merged view read the from-source map only.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NodeAlignmentList {
    from_src: BTreeMap<Span, BTreeMap<Span, AlignKind>>,
    from_tgt: BTreeMap<Span, BTreeMap<Span, AlignKind>>,
}

impl NodeAlignmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an alignment between a source and a target span; types
    /// accumulate across repeated additions of the same pair.
    pub fn add(&mut self, src: Span, tgt: Span, from_src: bool, kinds: AlignKind) {
        let map = if from_src { &mut self.from_src } else { &mut self.from_tgt };
        let (outer, inner) = if from_src { (src, tgt) } else { (tgt, src) };
        let entry = map.entry(outer).or_default().entry(inner).or_insert(AlignKind::empty());
        *entry |= kinds;
    }

    /// All from-source records as `(spans, type bitmask)` pairs.
    pub fn all_aligns(&self) -> Vec<(BiSpan, AlignKind)> {
        let mut out = Vec::new();
        for (src, inner) in &self.from_src {
            for (tgt, kinds) in inner {
                out.push((BiSpan { src: *src, tgt: *tgt }, *kinds));
            }
        }
        out
    }

    /// `s1-s2 ||| t1-t2 ||| TYPE…` lines, one per from-source record.
    pub fn interchange_lines(&self) -> Vec<String> {
        self.all_aligns()
            .into_iter()
            .map(|(bi, kinds)| format!("{} ||| {} ||| {}", bi.src, bi.tgt, AlignKind::decode(kinds)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_accumulate_per_span_pair() {
        let mut list = NodeAlignmentList::new();
        let src = Span::new(0, 1);
        let tgt = Span::new(0, 0);
        list.add(src, tgt, true, AlignKind::T2T | AlignKind::SRC_GROWN);
        list.add(src, tgt, true, AlignKind::T2S);
        let all = list.all_aligns();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].1, AlignKind::T2T | AlignKind::T2S | AlignKind::SRC_GROWN);
    }

    #[test]
    fn from_target_records_stay_out_of_interchange_output() {
        let mut list = NodeAlignmentList::new();
        list.add(Span::new(0, 0), Span::new(1, 1), false, AlignKind::T2T);
        assert!(list.interchange_lines().is_empty());
        list.add(Span::new(0, 0), Span::new(1, 1), true, AlignKind::T2T);
        assert_eq!(list.interchange_lines(), vec!["0-0 ||| 1-1 ||| T2T"]);
    }

    #[test]
    fn decode_orders_tokens_by_bit_value() {
        let mask = AlignKind::TS2T | AlignKind::SRC_GROWN | AlignKind::T2S;
        assert_eq!(AlignKind::decode(mask), "SRC_GROWN T2S TS2T");
    }
}
