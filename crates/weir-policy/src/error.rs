//! Rule construction errors.

use thiserror::Error;

/// Errors raised while compiling a rule set.
///
/// Patterns are validated once at construction; evaluation itself never
/// fails.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A pattern in one of the rule lists is not a valid glob.
    #[error("invalid glob pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}
