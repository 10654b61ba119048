use thiserror::Error;

/// Errors raised while building or processing a sentence pair.
///
/// Running out of room in a rule (size bounds) is never an error; those
/// branches simply produce no candidates. The variants here are genuine
/// input or invariant failures, and callers processing a batch are
/// expected to report them and move on to the next sentence pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The parenthesized tree string could not be parsed.
    #[error("not a valid tree: '{0}'")]
    MalformedTree(String),

    /// A word alignment token was not a single `i-j` numeric pair.
    #[error("not a valid alignment: '{0}'")]
    MalformedAlignment(String),

    /// An internal invariant was violated while composing a rule, for
    /// example a nonterminal slot with no reordering partner.
    #[error("internal consistency violation: {0}")]
    InternalConsistency(String),
}
