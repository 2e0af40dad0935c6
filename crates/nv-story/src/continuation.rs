//! Resumption descriptors and title timers.
//!
//! A suspended interpreter that has more to do than "move to the next step"
//! records what remains as plain data. The next `advance()` pops exactly one
//! descriptor and resumes from it.

use chrono::{DateTime, Duration, Utc};
use nv_core::ChoiceAction;

use crate::presentation::{Presentation, Status};

/// Work left over from an interrupted step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Show the next part of the current multi-part dialogue.
    DialogueParts {
        /// Index of the part to show next.
        next: usize,
    },
    /// Keep running the actions of a selected choice option.
    ChoiceActions {
        /// Actions not yet run.
        remaining: Vec<ChoiceAction>,
    },
    /// Dismiss an injected line and put back what was on screen.
    Interjection {
        /// Screen contents before the line.
        presentation: Box<Presentation>,
        /// Status before the line.
        status: Status,
    },
}

/// A pending title auto-resume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleTimer {
    /// Identifies this timer. Firing with any other token does nothing.
    pub token: u64,
    /// When the title should resume.
    pub deadline: DateTime<Utc>,
    /// Set when the card has an exit effect the renderer must play first.
    pub await_effect_end: bool,
}

impl TitleTimer {
    pub(crate) fn new(token: u64, now: DateTime<Utc>, duration_ms: u64, await_effect_end: bool) -> Self {
        let deadline = i64::try_from(duration_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            token,
            deadline,
            await_effect_end,
        }
    }

    /// Whether the deadline has passed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_becomes_due_at_deadline() {
        let start = Utc::now();
        let timer = TitleTimer::new(1, start, 1500, false);
        assert!(!timer.is_due(start + Duration::milliseconds(1499)));
        assert!(timer.is_due(start + Duration::milliseconds(1500)));
    }
}
