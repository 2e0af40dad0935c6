//! Step interpreter for Novella story units.
//!
//! An [`Interpreter`] owns the state tree, the history log and the audio
//! registry of one play session. It runs steps until one waits for the
//! player and exposes what to render through [`Presentation`] and
//! [`StoryEvent`]s.

/// Interpreter limits.
pub mod config;
/// Resumption descriptors and title timers.
pub mod continuation;
/// Error types.
pub mod error;
/// The interpreter and its control operations.
pub mod interpreter;
/// Screen contents, status and host events.
pub mod presentation;
/// Captured execution position.
pub mod snapshot;

pub use config::StoryConfig;
pub use continuation::{Continuation, TitleTimer};
pub use error::{StoryError, StoryResult};
pub use interpreter::Interpreter;
pub use presentation::{InputPrompt, Presentation, Status, StoryEvent, TitleCard};
pub use snapshot::Snapshot;
