//! Node alignment between the two parse trees of a sentence pair.
//!
//! ## How the parts work together
//!
//! Aligning a sentence pair is a pipeline:
//!
//! ```text
//! word links ── compute_coverage / compute_complement   (vectors.rs)
//!                     │
//!                     v
//!        NodeAligner::align                             (search.rs)
//!          - source pass: every consistent source node probes the
//!            target tree (exact spans, strings, projected groups)
//!          - target pass: the mirror image
//!          - sibling-window pass: virtual-to-virtual alignments
//!                     │
//!                     ├─ node annotations on the Forest (per-kind sets,
//!                     │  synthesized virtual / string-span nodes)
//!                     v
//!              NodeAlignmentList                        (records.rs)
//!                span pairs + AlignKind bitmasks, rendered as
//!                `s1-s2 ||| t1-t2 ||| TYPE...` interchange lines
//! ```
//!
//! The search leans on **consistency**: a node participates only when
//! the contiguous span of its projected coverage touches nothing the
//! rest of its tree projects to. Growing over unaligned boundary words
//! relaxes the spans without breaking that guarantee; such alignments
//! carry the `SRC_GROWN` / `TGT_GROWN` flags.
//!
//! ## Responsibilities by module
//!
//! - `vectors.rs`: projected coverage/complement bit vectors and the
//!   consistency predicate.
//! - `search.rs`: the three alignment passes and all window growing.
//! - `records.rs`: `AlignKind` flags and the span-pair record list.
//!
//! ## Debugging
//!
//! Set `SYNGRAM_DEBUG=1` to print every alignment record found.

#[path = "aligner/records.rs"]
mod records;
#[path = "aligner/search.rs"]
mod search;
#[path = "aligner/vectors.rs"]
mod vectors;

pub use records::{AlignKind, NodeAlignmentList};
pub use search::NodeAligner;
