use nv_core::{HistoryEntry, Step, StepKind, StoryUnit, substitute};

use super::Interpreter;
use crate::continuation::Continuation;
use crate::error::{StoryError, StoryResult};
use crate::presentation::Status;
use crate::snapshot::Snapshot;

impl Interpreter {
    /// Capture the current position. Only looping audio streams are kept.
    pub fn snapshot(&self) -> StoryResult<Snapshot> {
        let unit = self.unit.as_deref().ok_or(StoryError::NotStarted)?;
        Ok(Snapshot {
            unit_id: unit.id.clone(),
            step_index: self.step_index,
            call_stack: self.call_stack.clone(),
            visible: self.visible.clone(),
            scene: self.scene.as_ref().map(|s| s.id.clone()),
            history: Some(self.history.to_vec()),
            audio: self.audio.looping_streams().cloned().collect(),
            dialogue_part: self.shown_parts(),
        })
    }

    /// How many parts of the current multi-part dialogue are on screen.
    fn shown_parts(&self) -> Option<usize> {
        let total = match self.current_step() {
            Some(Step {
                kind: StepKind::Dialogue(dialogue),
                ..
            }) if !dialogue.parts.is_empty() => dialogue.parts.len(),
            _ => return None,
        };
        let pending = self.continuations.iter().rev().find_map(|c| match c {
            Continuation::DialogueParts { next } => Some(*next),
            _ => None,
        });
        Some(pending.unwrap_or(total))
    }

    /// Resume at a captured position. The state tree is expected to be
    /// restored already.
    ///
    /// Presentation-only steps are skipped until the first step that waits
    /// for the player, which is displayed without being logged again.
    pub fn resume_from(&mut self, snapshot: Snapshot) -> StoryResult<Status> {
        let unit = self.load_unit(&snapshot.unit_id)?;
        self.continuations.clear();
        self.clear_display();
        self.restoring = true;
        self.restore_parts = snapshot.dialogue_part.unwrap_or(0);
        self.call_stack = snapshot.call_stack;

        let state = &self.state;
        self.visible = snapshot
            .visible
            .into_iter()
            .filter(|id| state.character(id).is_some())
            .collect();

        self.scene = match snapshot.scene {
            Some(id) => match self.content.load_scene(&id) {
                Ok(scene) => Some(scene),
                Err(e) => {
                    tracing::warn!(scene = %id, error = %e, "saved scene unavailable");
                    None
                }
            },
            None => None,
        };

        self.step_index = snapshot.step_index.min(unit.len());
        match snapshot.history {
            Some(entries) => self.history.replace(entries),
            None => {
                let entries = self.rebuild_history(&unit, self.restore_parts);
                self.history.replace(entries);
            }
        }

        self.audio.stop_all();
        for stream in snapshot.audio.into_iter().filter(|s| s.looping) {
            self.audio.insert(stream);
        }

        self.unit = Some(unit);
        self.status = Status::NotStarted;
        self.state.touch();
        tracing::info!(unit = ?self.unit_id(), step = self.step_index, "resuming");
        self.run()
    }

    /// History as it would read after playing `unit` up to the current step,
    /// rendered against the current state. A multi-part line at the current
    /// step with `shown_parts` still short of its end is left out; it is
    /// logged once its last part is shown.
    fn rebuild_history(&self, unit: &StoryUnit, shown_parts: usize) -> Vec<HistoryEntry> {
        let end = (self.step_index + 1).min(unit.len());
        let mut entries = Vec::new();
        for (index, step) in unit.steps[..end].iter().enumerate() {
            let entry = match &step.kind {
                StepKind::Dialogue(dialogue)
                    if index == self.step_index && shown_parts < dialogue.parts.len() =>
                {
                    continue;
                }
                StepKind::Dialogue(dialogue) => {
                    let mut text = substitute(&dialogue.text, &self.state);
                    for part in &dialogue.parts {
                        text.push_str(&substitute(&part.text, &self.state));
                    }
                    match dialogue.character.as_deref() {
                        Some(id) => HistoryEntry::dialogue(self.display_name(id), text),
                        None => HistoryEntry::narration(text),
                    }
                }
                StepKind::Titles(titles) => {
                    HistoryEntry::titles(substitute(&titles.text, &self.state))
                }
                _ => continue,
            };
            entries.push(entry.at_step(index));
        }
        entries
    }
}
