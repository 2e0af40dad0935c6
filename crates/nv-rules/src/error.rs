//! Error types for the rule engine.

use thiserror::Error;

/// Alias for `Result<T, RuleError>`.
pub type RuleResult<T> = Result<T, RuleError>;

/// Errors raised while registering or parsing rules.
#[derive(Debug, Error)]
pub enum RuleError {
    /// A rule was registered without an id.
    #[error("rule id must not be empty")]
    MissingId,

    /// A rule with the same id is already registered.
    #[error("duplicate rule id: \"{0}\"")]
    DuplicateId(String),

    /// A rule document could not be parsed.
    #[error("invalid rule document: {0}")]
    Parse(#[from] serde_json::Error),
}
