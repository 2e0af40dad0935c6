//! Error types for the core crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::content::ContentKind;

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while loading external content.
///
/// Unresolved paths are deliberately absent: they are logged and treated as
/// no-ops by the resolver rather than surfaced as errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested record does not exist in the content source.
    #[error("{kind} not found: \"{id}\"")]
    ContentNotFound {
        /// Which kind of record was requested.
        kind: ContentKind,
        /// The requested identifier.
        id: String,
    },

    /// The record exists but could not be parsed.
    #[error("malformed {kind} \"{id}\": {reason}")]
    MalformedContent {
        /// Which kind of record was requested.
        kind: ContentKind,
        /// The requested identifier.
        id: String,
        /// Parser message.
        reason: String,
    },

    /// Reading a content file failed for a reason other than absence.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl CoreError {
    /// The content kind involved in this failure, if any.
    pub fn content_kind(&self) -> Option<ContentKind> {
        match self {
            Self::ContentNotFound { kind, .. } | Self::MalformedContent { kind, .. } => {
                Some(*kind)
            }
            Self::Io { .. } => None,
        }
    }
}
