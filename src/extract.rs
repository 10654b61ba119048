//! Synchronous grammar rule extraction from an aligned forest.
//!
//! ## How the parts work together
//!
//! Extraction runs after node alignment and consumes its annotations:
//!
//! ```text
//! aligned Forest ── GrammarExtractor::extract        (extractor.rs)
//!                     - bottom-up walk, children and virtual
//!                       groupings before their parents
//!                     - per LHS pair: decompose the span, then
//!                       combine each piece's expansion choices
//!                     │
//!                     ├─ RulePart: one right-hand side candidate
//!                     │  (part.rs), its links kept in a
//!                     │  ReorderingList (reorder.rs)
//!                     v
//!                  RuleSet                            (rule.rs)
//!                    deduplicated ExtractedRules in discovery
//!                    order, rendered as `|||`-separated lines
//! ```
//!
//! A candidate becomes a rule only when it covers exactly the words of
//! both left-hand-side nodes and neither side reaches above its LHS in
//! the tree. Accepted rules are also cached on their LHS node, so a
//! parent's search composes its children's rules instead of re-deriving
//! them.
//!
//! ## Responsibilities by module
//!
//! - `part.rs`: right-hand-side candidates and their combination rules.
//! - `reorder.rs`: source-to-target component links.
//! - `rule.rs`: finished rules, dedup, interchange rendering.
//! - `extractor.rs`: the walk, span decomposition, and acceptance.
//!
//! ## Debugging
//!
//! Set `SYNGRAM_DEBUG=1` to print every rule as it is accepted.

#[path = "extract/extractor.rs"]
mod extractor;
#[path = "extract/part.rs"]
mod part;
#[path = "extract/reorder.rs"]
mod reorder;
#[path = "extract/rule.rs"]
mod rule;

pub use extractor::GrammarExtractor;
pub use part::RulePart;
pub use reorder::ReorderingList;
pub use rule::{ExtractedRule, RuleSet};
