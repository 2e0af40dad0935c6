//! Condition and action rules that watch a running story.
//!
//! A [`RuleEngine`] holds [`Rule`]s. Each evaluation checks every enabled
//! rule's [`Condition`]s against a [`RuleHost`] and runs the [`Action`]s of
//! the rules that fire.

/// Actions and notifications.
pub mod action;
/// Conditions and operators.
pub mod condition;
/// The engine.
pub mod engine;
/// Error types.
pub mod error;
/// The host interface.
pub mod host;
/// Rule definitions and statistics.
pub mod rule;

#[cfg(test)]
mod test_support;

pub use action::{Action, Callback, Notification, Severity};
pub use condition::{
    Check, CharacterField, Condition, LocationField, Operator, Predicate, StoryField,
};
pub use engine::RuleEngine;
pub use error::{RuleError, RuleResult};
pub use host::RuleHost;
pub use rule::{Rule, RuleStats, TriggerMode};
