use chrono::Utc;
use nv_core::{
    AudioCue, ChoiceStep, CoreResult, Dialogue, HistoryEntry, Step, StepKind, StreamKind, Titles,
    substitute,
};

use super::{Flow, Interpreter};
use crate::continuation::{Continuation, TitleTimer};
use crate::presentation::{InputPrompt, Status, TitleCard};

impl Interpreter {
    /// Execute one step.
    ///
    /// While a save is being resumed, steps that only re-establish
    /// presentation (scene, show/hide, audio, titles) are skipped; the first
    /// step that waits for the player ends the resume.
    pub(super) fn dispatch(&mut self, step: &Step) -> CoreResult<Flow> {
        match &step.kind {
            StepKind::Assign { variable } => {
                self.state.apply_assignment(variable);
                Ok(Flow::Next)
            }
            StepKind::Scene { scene } => {
                if !self.restoring {
                    match scene.as_deref().or(step.id.as_deref()) {
                        Some(id) => self.change_scene(id)?,
                        None => tracing::warn!(step = self.step_index, "scene step has no scene id"),
                    }
                }
                Ok(Flow::Next)
            }
            StepKind::Show { character } => {
                if !self.restoring {
                    self.show_character(character);
                }
                Ok(Flow::Next)
            }
            StepKind::Hide { character } => {
                if !self.restoring {
                    self.hide_character(character);
                }
                Ok(Flow::Next)
            }
            StepKind::Sound(cue) => Ok(self.play_cue(StreamKind::Sound, cue)),
            StepKind::Voice(cue) => Ok(self.play_cue(StreamKind::Voice, cue)),
            StepKind::Music(cue) => Ok(self.play_cue(StreamKind::Music, cue)),
            StepKind::StopStream { stream } => {
                if !self.restoring {
                    self.audio.stop(stream);
                }
                Ok(Flow::Next)
            }
            StepKind::StopAllStreams => {
                if !self.restoring {
                    self.audio.stop_all();
                }
                Ok(Flow::Next)
            }
            StepKind::Dialogue(dialogue) => Ok(self.show_dialogue(dialogue)),
            StepKind::Titles(titles) => {
                if self.restoring {
                    // The saved card is not shown again; what follows it
                    // has not been played yet.
                    self.restoring = false;
                    return Ok(Flow::Next);
                }
                Ok(self.show_titles(titles))
            }
            StepKind::Inputtext { variable, text } => {
                Ok(self.show_input(variable.as_deref(), text.as_deref()))
            }
            StepKind::Choice(choice) => Ok(self.show_choice(choice)),
            StepKind::Goto { target } => {
                self.jump(target)?;
                Ok(Flow::Jumped)
            }
            StepKind::Continue => self.continue_caller(),
            StepKind::End => {
                self.restoring = false;
                self.continue_caller()
            }
        }
    }

    fn change_scene(&mut self, id: &str) -> CoreResult<()> {
        let scene = self.content.load_scene(id)?;
        tracing::debug!(scene = id, "scene changed");
        self.scene = Some(scene);
        Ok(())
    }

    pub(super) fn show_character(&mut self, id: &str) {
        if self.state.character(id).is_none() {
            tracing::warn!(character = id, "cannot show unknown character");
            return;
        }
        if !self.visible.iter().any(|v| v == id) {
            self.visible.push(id.to_string());
        }
    }

    pub(super) fn hide_character(&mut self, id: &str) {
        self.visible.retain(|v| v != id);
    }

    fn play_cue(&mut self, kind: StreamKind, cue: &AudioCue) -> Flow {
        if !self.restoring {
            self.audio
                .play(kind, cue.file.as_str(), cue.looping, cue.stream.as_deref());
        }
        Flow::Next
    }

    /// Display name of a character, falling back to its id.
    pub(super) fn display_name(&self, id: &str) -> String {
        self.state
            .character(id)
            .and_then(|c| c.name())
            .unwrap_or(id)
            .to_string()
    }

    /// Put a line on screen as dialogue or narration. Returns the rendered text.
    pub(super) fn render_line(&mut self, character: Option<&str>, text: &str) -> String {
        let rendered = substitute(text, &self.state);
        let speaker = character.map(|id| self.display_name(id));
        self.presentation.clear();
        match speaker {
            Some(name) => {
                self.presentation.speaker = name;
                self.presentation.dialogue = rendered.clone();
            }
            None => self.presentation.narration = rendered.clone(),
        }
        rendered
    }

    /// Log the line on screen.
    pub(super) fn record_line(&mut self, character: Option<&str>, text: impl Into<String>) {
        let entry = match character {
            Some(_) => HistoryEntry::dialogue(self.presentation.speaker.clone(), text),
            None => HistoryEntry::narration(text),
        };
        self.history.push(entry.at_step(self.step_index));
    }

    fn show_dialogue(&mut self, dialogue: &Dialogue) -> Flow {
        // A resumed save already holds this line's assignments and history.
        let restoring = std::mem::take(&mut self.restoring);
        let shown_parts = std::mem::take(&mut self.restore_parts);
        if let Some(expr) = dialogue.variable.as_deref().filter(|_| !restoring) {
            self.state.apply_assignment(expr);
        }
        let character = dialogue.character.as_deref();
        let rendered = self.render_line(character, &dialogue.text);
        if dialogue.parts.is_empty() {
            if !restoring {
                self.record_line(character, rendered);
            }
            return Flow::Suspend(Status::Dialogue);
        }

        let shown = if restoring {
            shown_parts.min(dialogue.parts.len())
        } else {
            0
        };
        for part in &dialogue.parts[..shown] {
            self.append_part(character.is_some(), part);
        }
        if shown < dialogue.parts.len() {
            self.continuations
                .push(Continuation::DialogueParts { next: shown });
        }
        Flow::Suspend(Status::Dialogue)
    }

    fn show_titles(&mut self, titles: &Titles) -> Flow {
        if let Some(expr) = &titles.variable {
            self.state.apply_assignment(expr);
        }
        self.clear_display();
        let text = substitute(&titles.text, &self.state);
        let duration_ms = titles.duration_ms();
        self.presentation.title = Some(TitleCard {
            text: text.clone(),
            effect_start: titles.effect_start.clone(),
            effect: titles.effect.clone(),
            effect_end: titles.effect_end.clone(),
            typewriter: titles.typewriter,
            duration_ms,
        });
        self.history
            .push(HistoryEntry::titles(text).at_step(self.step_index));

        if let Some(ms) = duration_ms {
            let token = self.next_token;
            self.next_token += 1;
            self.title_timer = Some(TitleTimer::new(
                token,
                Utc::now(),
                ms,
                titles.effect_end.is_some(),
            ));
            tracing::debug!(token, duration_ms = ms, "title timer armed");
        }
        Flow::Suspend(Status::Titles {
            auto_resume_ms: duration_ms,
        })
    }

    fn show_input(&mut self, variable: Option<&str>, text: Option<&str>) -> Flow {
        self.presentation.clear();
        let initial = variable
            .and_then(|path| self.state.read(path))
            .map(ToString::to_string)
            .unwrap_or_default();
        self.presentation.input = Some(InputPrompt {
            text: text.map(|t| substitute(t, &self.state)).unwrap_or_default(),
            variable: variable.map(str::to_string),
            initial,
        });
        self.restoring = false;
        Flow::Suspend(Status::Input)
    }

    fn show_choice(&mut self, choice: &ChoiceStep) -> Flow {
        self.presentation.clear();
        self.presentation.speaker = choice
            .speaker
            .as_deref()
            .map(|id| self.display_name(id))
            .unwrap_or_default();
        if let Some(text) = &choice.text {
            self.presentation.dialogue = substitute(text, &self.state);
        }
        self.presentation.choices = choice
            .options
            .iter()
            .map(|option| substitute(&option.text, &self.state))
            .collect();
        self.restoring = false;
        Flow::Suspend(Status::Choice)
    }
}
