use thiserror::Error;

/// Errors returned by the pattern compiler.
///
/// Every error aborts the compilation as a whole; a partially compiled
/// program is never returned. Compilation is deterministic, so retrying
/// with the same pattern produces the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A quantifier wraps a subpattern that cannot consume any input,
    /// like `(\b)*`. Repeating it would not advance the match.
    #[error("nothing to repeat")]
    NothingToRepeat,

    /// The pattern has more capture groups than the matching engine
    /// supports.
    #[error("too many capture groups: {groups} (max: {max})")]
    GroupLimitExceeded { groups: u32, max: u32 },

    /// The compiled program does not fit in the code word domain.
    #[error("pattern too large")]
    TooLarge,
}
