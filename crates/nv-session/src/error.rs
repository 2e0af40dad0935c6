//! Error types for the session facade.

use std::path::PathBuf;

use nv_rules::RuleError;
use nv_save::SaveError;
use nv_story::StoryError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by [`crate::NovelSession`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// The interpreter refused the operation or halted.
    #[error(transparent)]
    Story(#[from] StoryError),

    /// Saving or loading failed.
    #[error(transparent)]
    Save(#[from] SaveError),

    /// A rule could not be registered or parsed.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// `novel.json` exists but is not a valid configuration.
    #[error("invalid configuration {}: {source}", path.display())]
    Config {
        /// The configuration file.
        path: PathBuf,
        /// Parser message.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration or rules file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
