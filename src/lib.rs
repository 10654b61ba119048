//! Synchronous grammar rule learning from word-aligned parse tree pairs.
//!
//! Given a source-side parse tree, a target-side parse tree, and a word
//! alignment between their sentences, this crate aligns the two trees
//! node by node and then extracts every synchronous grammar and phrase
//! rule licensed by those alignments, within configurable size bounds.
//!
//! The top-level entry points are [`extract`] and [`extract_with`]; the
//! [`NodeAligner`] and [`GrammarExtractor`] stages are also exposed for
//! callers that want to reuse a [`Forest`] or inspect alignments.

use once_cell::sync::Lazy;

#[macro_use]
mod macros;

mod aligner;
mod api;
mod bits;
mod error;
mod extract;
mod span;
mod tree;
mod word_align;

pub use aligner::{AlignKind, NodeAligner, NodeAlignmentList};
pub use api::{Extraction, Options, extract, extract_with};
pub use error::Error;
pub use extract::{ExtractedRule, GrammarExtractor, RulePart, RuleSet};
pub use span::{BiSpan, Span};
pub use tree::{Forest, NodeId, NodeKind};
pub use word_align::WordAlignment;

/// Whether `SYNGRAM_DEBUG` is set (to anything but `0`). Checked once.
pub(crate) fn debug_enabled() -> bool {
    static ENABLED: Lazy<bool> =
        Lazy::new(|| std::env::var("SYNGRAM_DEBUG").is_ok_and(|v| v != "0"));
    *ENABLED
}
