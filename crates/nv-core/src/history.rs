use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Default number of entries kept.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// What produced a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    /// Spoken line with a speaker.
    Dialogue,
    /// Narration without a speaker.
    Narration,
    /// Title card.
    Titles,
}

/// One rendered line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Entry kind.
    pub kind: HistoryKind,
    /// Speaker name; empty for narration and titles.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub speaker: String,
    /// Rendered text, placeholders already substituted.
    pub text: String,
    /// Index of the step that produced the entry.
    #[serde(default, rename = "stepIndex", skip_serializing_if = "Option::is_none")]
    pub origin_step: Option<usize>,
}

impl HistoryEntry {
    /// A dialogue line.
    pub fn dialogue(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: HistoryKind::Dialogue,
            speaker: speaker.into(),
            text: text.into(),
            origin_step: None,
        }
    }

    /// A narration line.
    pub fn narration(text: impl Into<String>) -> Self {
        Self {
            kind: HistoryKind::Narration,
            speaker: String::new(),
            text: text.into(),
            origin_step: None,
        }
    }

    /// A title card.
    pub fn titles(text: impl Into<String>) -> Self {
        Self {
            kind: HistoryKind::Titles,
            speaker: String::new(),
            text: text.into(),
            origin_step: None,
        }
    }

    /// Record the producing step.
    pub fn at_step(mut self, index: usize) -> Self {
        self.origin_step = Some(index);
        self
    }
}

/// Append-only log bounded to a fixed number of entries. When full, the
/// oldest entry is dropped.
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    /// Create an empty log holding at most `limit` entries (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    /// Append an entry, dropping the oldest on overflow.
    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.limit {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Replace the whole log, keeping only the newest `limit` entries.
    pub fn replace(&mut self, entries: impl IntoIterator<Item = HistoryEntry>) {
        self.entries.clear();
        for entry in entries {
            self.push(entry);
        }
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Copy of the entries, oldest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// The newest entry.
    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries kept.
    pub fn limit(&self) -> usize {
        self.limit
    }
}
