//! Session configuration, optionally read from `novel.json`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use nv_story::StoryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{SessionError, SessionResult};

/// Name of the optional configuration file in a content directory.
pub const CONFIG_FILE: &str = "novel.json";

/// Configuration for one play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NovelConfig {
    /// Unit a new game starts in.
    pub start_unit: String,
    /// Characters loaded when a game starts.
    pub characters: Vec<String>,
    /// Entries kept in the history log.
    pub history_limit: usize,
    /// Consecutive auto-advancing steps allowed before halting.
    pub max_auto_steps: usize,
    /// Whether registered rules are evaluated.
    pub rules_enabled: bool,
}

impl Default for NovelConfig {
    fn default() -> Self {
        let story = StoryConfig::default();
        Self {
            start_unit: "start".to_string(),
            characters: vec!["mc".to_string()],
            history_limit: story.history_limit,
            max_auto_steps: story.max_auto_steps,
            rules_enabled: true,
        }
    }
}

impl NovelConfig {
    /// Read `novel.json` from a content directory, or the defaults when the
    /// file does not exist.
    pub fn from_dir(dir: &Path) -> SessionResult<Self> {
        let path = dir.join(CONFIG_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => return Err(SessionError::Io { path, source }),
        };
        let config = serde_json::from_str(&text).map_err(|source| SessionError::Config {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded session configuration");
        Ok(config)
    }

    /// Set the start unit.
    pub fn with_start_unit(mut self, unit: impl Into<String>) -> Self {
        self.start_unit = unit.into();
        self
    }

    /// Set the character roster.
    pub fn with_characters<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.characters = ids.into_iter().map(Into::into).collect();
        self
    }

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

    /// Turn rule evaluation on or off.
    pub fn with_rules_enabled(mut self, enabled: bool) -> Self {
        self.rules_enabled = enabled;
        self
    }

    /// Interpreter limits derived from this configuration.
    pub fn story_config(&self) -> StoryConfig {
        StoryConfig::default()
            .with_history_limit(self.history_limit)
            .with_max_auto_steps(self.max_auto_steps)
    }
}
