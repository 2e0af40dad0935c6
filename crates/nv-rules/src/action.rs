//! Rule actions and notifications.

use std::fmt;
use std::sync::Arc;

use nv_core::Value;
use serde::{Deserialize, Serialize};

use crate::host::RuleHost;

/// Something a firing rule does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Redirect the interpreter.
    Goto {
        /// Label or unit id.
        target: String,
    },
    /// Write a state path.
    SetVariable {
        /// State path.
        path: String,
        /// Value written.
        #[serde(default)]
        value: Value,
    },
    /// Show a notification.
    Notification(Notification),
    /// Show a one-off line.
    Dialogue {
        /// Speaker id; narration when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        character: Option<String>,
        /// Line text.
        text: String,
    },
    /// End the story session.
    EndStory,
    /// Restart a unit, or the current one.
    RestartStory {
        /// Unit to restart.
        #[serde(default, rename = "storyId", skip_serializing_if = "Option::is_none")]
        story_id: Option<String>,
    },
    /// Write a log line.
    Log {
        /// Message.
        message: String,
    },
    /// Arbitrary callback, only available from code.
    #[serde(skip)]
    Callback(Callback),
}

impl Action {
    /// Apply the action to `host`.
    pub fn execute(&self, host: &mut dyn RuleHost) {
        match self {
            Self::Goto { target } => {
                tracing::debug!(%target, "rule redirect");
                host.goto_label(target);
            }
            Self::SetVariable { path, value } => {
                if host.write(path, value.clone()) {
                    tracing::debug!(%path, %value, "rule set variable");
                }
            }
            Self::Notification(notification) => host.notify(notification.clone()),
            Self::Dialogue { character, text } => host.show_dialogue(character.as_deref(), text),
            Self::EndStory => host.end_story(),
            Self::RestartStory { story_id } => host.restart_story(story_id.as_deref()),
            Self::Log { message } => tracing::info!(target: "nv_rules::log", "{message}"),
            Self::Callback(callback) => callback.call(host),
        }
    }
}

/// A message for the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Message text.
    pub text: String,
    /// How urgent it is.
    #[serde(default, rename = "notificationType")]
    pub severity: Severity,
    /// How long to show it, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

/// Notification urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Neutral information.
    #[default]
    Info,
    /// Something went well.
    Success,
    /// Something needs attention.
    Warning,
    /// Something went badly.
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Warning => write!(f, "warning"),
            Self::Danger => write!(f, "danger"),
        }
    }
}

/// A callback supplied by code for `callback` actions and rule triggers.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(&mut dyn RuleHost) + Send + Sync>);

impl Callback {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&mut dyn RuleHost) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Run the callback.
    pub fn call(&self, host: &mut dyn RuleHost) {
        (self.0)(host)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}
