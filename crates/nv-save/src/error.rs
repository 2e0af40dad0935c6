//! Error types for saving and loading.

use std::path::PathBuf;

use nv_core::CoreError;
use nv_story::StoryError;
use thiserror::Error;

/// Alias for `Result<T, SaveError>`.
pub type SaveResult<T> = Result<T, SaveError>;

/// Errors raised by the save codec and slot stores.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The record holds a value JSON cannot represent. Nothing was written.
    #[error("save state is not serializable at {path}")]
    NonSerializable {
        /// Dotted path of the offending value.
        path: String,
    },

    /// The slot holds no save.
    #[error("save slot {0} is empty")]
    SlotNotFound(u32),

    /// Reloading content for a restore failed.
    #[error(transparent)]
    Content(#[from] CoreError),

    /// The interpreter refused the snapshot or halted while resuming.
    #[error(transparent)]
    Story(#[from] StoryError),

    /// A save file could not be encoded or decoded.
    #[error("invalid save file {}: {source}", path.display())]
    Format {
        /// The file involved.
        path: PathBuf,
        /// Parser message.
        #[source]
        source: serde_json::Error,
    },

    /// Reading or writing the save directory failed.
    #[error("save I/O failed for {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
