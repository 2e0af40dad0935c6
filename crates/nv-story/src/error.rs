//! Error types for the story interpreter.

use nv_core::CoreError;
use thiserror::Error;

/// Result type for interpreter operations.
pub type StoryResult<T> = Result<T, StoryError>;

/// Errors returned by interpreter control operations.
///
/// Dispatch failures halt the interpreter; the host decides whether to
/// [`retry`](crate::Interpreter::retry), end or restart the session.
#[derive(Debug, Error)]
pub enum StoryError {
    /// A story unit, character or scene could not be loaded.
    #[error(transparent)]
    Content(#[from] CoreError),

    /// A step handler failed.
    #[error("step {step} of \"{unit}\" failed: {source}")]
    StepDispatch {
        /// Unit being executed.
        unit: String,
        /// Index of the failing step.
        step: usize,
        /// Underlying failure.
        source: CoreError,
    },

    /// Too many steps ran without reaching a point that waits for input.
    #[error("more than {limit} steps ran without waiting for input")]
    StepLimit {
        /// Configured limit.
        limit: usize,
    },

    /// The selected option does not exist.
    #[error("invalid choice: {0}")]
    InvalidChoice(usize),

    /// `select_choice` was called while no choice is shown.
    #[error("no choice is pending")]
    NoPendingChoice,

    /// `submit_input` was called while no text input is shown.
    #[error("no text input is pending")]
    NoPendingInput,

    /// An operation needs a started story.
    #[error("no story has been started")]
    NotStarted,
}
