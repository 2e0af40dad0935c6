//! Interpreter configuration.

use nv_core::DEFAULT_HISTORY_LIMIT;

/// Limits for one interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryConfig {
    /// Entries kept in the history log.
    pub history_limit: usize,
    /// Consecutive auto-advancing steps allowed before halting.
    pub max_auto_steps: usize,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            max_auto_steps: 10_000,
        }
    }
}

impl StoryConfig {
    /// Set the history size (at least 1).
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    /// Set the auto-advance guard (at least 1).
    pub fn with_max_auto_steps(mut self, steps: usize) -> Self {
        self.max_auto_steps = steps.max(1);
        self
    }
}
