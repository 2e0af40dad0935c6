//! What the host renders: status, on-screen text and outgoing events.

use std::fmt;

/// Where the interpreter stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// No story has been started.
    NotStarted,
    /// A line is shown; `advance()` continues.
    Dialogue,
    /// A title card is shown. With a duration, the pending timer resumes.
    Titles {
        /// Delay before the story resumes on its own.
        auto_resume_ms: Option<u64>,
    },
    /// Waiting for `submit_input()`.
    Input,
    /// Waiting for `select_choice()`.
    Choice,
    /// The session reached its end.
    Completed,
    /// A step failed; see [`crate::Interpreter::retry`].
    Halted(String),
}

impl Status {
    /// Whether the player has to act before the story moves on.
    pub fn is_waiting(&self) -> bool {
        matches!(
            self,
            Self::Dialogue | Self::Titles { .. } | Self::Input | Self::Choice
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Dialogue => write!(f, "dialogue"),
            Self::Titles { .. } => write!(f, "titles"),
            Self::Input => write!(f, "input"),
            Self::Choice => write!(f, "choice"),
            Self::Completed => write!(f, "completed"),
            Self::Halted(reason) => write!(f, "halted: {reason}"),
        }
    }
}

/// Notifications for the host, drained with
/// [`crate::Interpreter::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryEvent {
    /// The session ended.
    Completed,
    /// A title timer fired on a card with an exit effect; the renderer plays
    /// it and then calls `acknowledge_title_effect()`.
    TitleEffectEnd {
        /// Exit effect name.
        effect: String,
    },
    /// All audio should pause.
    AudioPaused,
    /// Paused audio should resume.
    AudioResumed,
    /// The character roster was (re)loaded.
    CharactersLoaded(Vec<String>),
}

/// A title card.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleCard {
    /// Title text, placeholders substituted.
    pub text: String,
    /// Entry effect.
    pub effect_start: Option<String>,
    /// Effect held while shown.
    pub effect: Option<String>,
    /// Exit effect.
    pub effect_end: Option<String>,
    /// Reveal character by character.
    pub typewriter: bool,
    /// Auto-resume delay.
    pub duration_ms: Option<u64>,
}

/// A pending text input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputPrompt {
    /// Prompt text.
    pub text: String,
    /// Path the answer is written to.
    pub variable: Option<String>,
    /// Current value at that path, as text.
    pub initial: String,
}

/// Everything currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Presentation {
    /// Speaker display name; empty for narration.
    pub speaker: String,
    /// Spoken text.
    pub dialogue: String,
    /// Narration text.
    pub narration: String,
    /// Title card, if shown.
    pub title: Option<TitleCard>,
    /// Rendered option labels.
    pub choices: Vec<String>,
    /// Text input, if shown.
    pub input: Option<InputPrompt>,
    /// Characters of the current line already shown before the latest part
    /// of a multi-part dialogue.
    pub printed_len: usize,
}

impl Presentation {
    /// The line being shown, dialogue or narration.
    pub fn line(&self) -> &str {
        if self.dialogue.is_empty() {
            &self.narration
        } else {
            &self.dialogue
        }
    }

    pub(crate) fn clear_text(&mut self) {
        self.dialogue.clear();
        self.narration.clear();
        self.printed_len = 0;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
