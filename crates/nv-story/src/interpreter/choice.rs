use nv_core::{ChoiceAction, DialoguePart, Step, StepKind, substitute};

use super::Interpreter;
use crate::continuation::Continuation;
use crate::error::{StoryError, StoryResult};
use crate::presentation::{Presentation, Status};

impl Interpreter {
    /// Pick option `index` of the pending choice and run its actions.
    pub fn select_choice(&mut self, index: usize) -> StoryResult<Status> {
        if self.status != Status::Choice {
            return Err(StoryError::NoPendingChoice);
        }
        let option = match self.current_step() {
            Some(Step {
                kind: StepKind::Choice(choice),
                ..
            }) => choice.options.get(index).cloned(),
            _ => return Err(StoryError::NoPendingChoice),
        };
        let Some(option) = option else {
            return Err(StoryError::InvalidChoice(index));
        };
        tracing::info!(index, option = %option.text, "choice selected");
        self.presentation.clear();
        self.run_actions(option.actions.unwrap_or_default())
    }

    /// Show a one-off line over whatever is on screen. The next `advance()`
    /// dismisses it and puts the previous screen back.
    pub fn inject_dialogue(&mut self, character: Option<&str>, text: &str) -> Status {
        let previous = Continuation::Interjection {
            presentation: Box::new(self.presentation.clone()),
            status: self.status.clone(),
        };
        let rendered = self.render_line(character, text);
        self.record_line(character, rendered);
        self.continuations.push(previous);
        self.status = Status::Dialogue;
        Status::Dialogue
    }

    /// Run choice actions in order. A dialogue action suspends with the rest
    /// saved; a goto ends the list.
    fn run_actions(&mut self, actions: Vec<ChoiceAction>) -> StoryResult<Status> {
        let mut remaining = actions.into_iter();
        while let Some(action) = remaining.next() {
            match action {
                ChoiceAction::Show { character } => self.show_character(&character),
                ChoiceAction::Hide { character } => self.hide_character(&character),
                ChoiceAction::Dialogue { character, text } => {
                    let rendered = self.render_line(character.as_deref(), &text);
                    self.record_line(character.as_deref(), rendered);
                    self.continuations.push(Continuation::ChoiceActions {
                        remaining: remaining.collect(),
                    });
                    self.status = Status::Dialogue;
                    return Ok(Status::Dialogue);
                }
                ChoiceAction::Goto { target } => {
                    tracing::debug!(target = %target, "choice goto");
                    return self.redirect(&target);
                }
            }
        }
        self.step_forward()
    }

    /// Pick up where a continuation left off.
    pub(super) fn resume(&mut self, continuation: Continuation) -> StoryResult<Status> {
        match continuation {
            Continuation::DialogueParts { next } => self.show_dialogue_part(next),
            Continuation::ChoiceActions { remaining } => {
                self.presentation.clear();
                self.run_actions(remaining)
            }
            Continuation::Interjection {
                presentation,
                status,
            } => Ok(self.restore_screen(*presentation, status)),
        }
    }

    pub(super) fn restore_screen(&mut self, presentation: Presentation, status: Status) -> Status {
        self.presentation = presentation;
        self.status = status.clone();
        status
    }

    /// Add one part to the line on screen, moving the printed cursor to
    /// where the part begins.
    pub(super) fn append_part(&mut self, speaking: bool, part: &DialoguePart) {
        let addition = substitute(&part.text, &self.state);
        let line = if speaking {
            &mut self.presentation.dialogue
        } else {
            &mut self.presentation.narration
        };
        let printed = line.chars().count();
        line.push_str(&addition);
        self.presentation.printed_len = printed;
    }

    fn show_dialogue_part(&mut self, next: usize) -> StoryResult<Status> {
        let dialogue = match self.current_step() {
            Some(Step {
                kind: StepKind::Dialogue(dialogue),
                ..
            }) => dialogue.clone(),
            _ => return self.step_forward(),
        };
        let Some(part) = dialogue.parts.get(next) else {
            return self.step_forward();
        };

        if let Some(expr) = &part.variable {
            self.state.apply_assignment(expr);
        }
        self.append_part(dialogue.character.is_some(), part);

        if next + 1 < dialogue.parts.len() {
            self.continuations
                .push(Continuation::DialogueParts { next: next + 1 });
        } else {
            let full = self.presentation.line().to_string();
            self.record_line(dialogue.character.as_deref(), full);
        }
        self.status = Status::Dialogue;
        Ok(Status::Dialogue)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::interpreter;
    use crate::error::StoryError;
    use crate::presentation::Status;

    const BRANCHING: &str = r#"[
        {"type":"choice","text":"Which way?","options":[
            {"text":"Left","actions":[{"type":"goto","target":"ending_a"}]},
            {"text":"Right","actions":[{"type":"goto","target":"ending_b"}]}
        ]},
        {"id":"ending_a","type":"dialogue","text":"A"},
        {"type":"end"},
        {"id":"ending_b","type":"dialogue","text":"B"},
        {"type":"end"}
    ]"#;

    #[test]
    fn goto_action_jumps_to_label() {
        let mut vn = interpreter(&[("start", BRANCHING)]);
        assert_eq!(vn.start("start").unwrap(), Status::Choice);
        assert_eq!(vn.select_choice(1).unwrap(), Status::Dialogue);
        assert_eq!(vn.step_index(), 3);
        assert_eq!(vn.presentation().narration, "B");
        assert!(vn.presentation().choices.is_empty());
        assert_eq!(vn.advance().unwrap(), Status::Completed);
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        let mut vn = interpreter(&[("start", BRANCHING)]);
        vn.start("start").unwrap();
        assert!(matches!(vn.select_choice(2), Err(StoryError::InvalidChoice(2))));
        assert_eq!(*vn.status(), Status::Choice);
        assert_eq!(vn.presentation().choices.len(), 2);
    }

    #[test]
    fn choice_without_pending_choice_is_rejected() {
        let mut vn = interpreter(&[("start", r#"[{"type":"dialogue","text":"a"}]"#)]);
        vn.start("start").unwrap();
        assert!(matches!(vn.select_choice(0), Err(StoryError::NoPendingChoice)));
    }

    #[test]
    fn option_without_actions_moves_on() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"choice","options":[{"text":"ok"}]},{"type":"dialogue","text":"after"}]"#,
        )]);
        vn.start("start").unwrap();
        vn.select_choice(0).unwrap();
        assert_eq!(vn.step_index(), 1);
        assert_eq!(vn.presentation().narration, "after");
    }

    #[test]
    fn dialogue_actions_suspend_and_resume() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"choice","options":[{"text":"talk","actions":[
                {"type":"show","character":"mc"},
                {"type":"dialogue","character":"mc","text":"first"},
                {"type":"dialogue","text":"second"},
                {"type":"hide","character":"mc"}
            ]}]},{"type":"dialogue","text":"after"}]"#,
        )]);
        vn.start("start").unwrap();
        assert_eq!(vn.select_choice(0).unwrap(), Status::Dialogue);
        assert_eq!(vn.presentation().dialogue, "first");
        assert_eq!(vn.visible_characters(), ["mc"]);
        assert_eq!(vn.step_index(), 0);

        vn.advance().unwrap();
        assert_eq!(vn.presentation().narration, "second");
        assert_eq!(vn.step_index(), 0);

        vn.advance().unwrap();
        assert!(vn.visible_characters().is_empty());
        assert_eq!(vn.presentation().narration, "after");
        assert_eq!(vn.step_index(), 1);
        assert_eq!(vn.history().len(), 3);
    }

    #[test]
    fn injected_line_restores_pending_choice() {
        let mut vn = interpreter(&[("start", BRANCHING)]);
        vn.start("start").unwrap();
        assert_eq!(vn.inject_dialogue(Some("mc"), "Hold on"), Status::Dialogue);
        assert_eq!(vn.presentation().dialogue, "Hold on");
        assert!(vn.presentation().choices.is_empty());

        assert_eq!(vn.advance().unwrap(), Status::Choice);
        assert_eq!(vn.presentation().choices.len(), 2);
        assert_eq!(vn.presentation().dialogue, "Which way?");
        assert_eq!(vn.select_choice(0).unwrap(), Status::Dialogue);
        assert_eq!(vn.presentation().narration, "A");
    }

    #[test]
    fn injected_line_defers_title_timer() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"titles","text":"Ch 1","duration":1000},{"type":"dialogue","text":"after"}]"#,
        )]);
        vn.start("start").unwrap();
        let deadline = vn.pending_title_timer().unwrap().deadline;
        vn.inject_dialogue(None, "Psst");

        assert_eq!(vn.tick(deadline).unwrap(), Status::Dialogue);
        assert_eq!(vn.presentation().narration, "Psst");
        assert!(vn.pending_title_timer().is_some());

        assert!(matches!(vn.advance().unwrap(), Status::Titles { .. }));
        assert_eq!(vn.presentation().title.as_ref().unwrap().text, "Ch 1");
        assert_eq!(vn.tick(deadline).unwrap(), Status::Dialogue);
        assert_eq!(vn.presentation().narration, "after");
    }
}
