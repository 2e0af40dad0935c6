//! The step interpreter.
//!
//! [`Interpreter`] walks the steps of a story unit against a [`StateTree`],
//! running auto-advancing steps until it reaches one that waits for the
//! player. Control operations return the resulting [`Status`].

mod choice;
mod dispatch;
mod restore;
#[cfg(test)]
mod test_support;

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use nv_core::{
    AudioRegistry, AudioSignal, CallFrame, Character, ContentSource, CoreError, CoreResult,
    History, Map, SceneDescriptor, StateTree, Step, StoryUnit,
};

use crate::config::StoryConfig;
use crate::continuation::{Continuation, TitleTimer};
use crate::error::{StoryError, StoryResult};
use crate::presentation::{Presentation, Status, StoryEvent};

/// What the run loop does after a step.
#[derive(Debug)]
enum Flow {
    /// Move to the next step.
    Next,
    /// The position was set by the step itself.
    Jumped,
    /// Wait for the player.
    Suspend(Status),
    /// The session is over.
    Complete,
}

/// Executes story units one step at a time.
pub struct Interpreter {
    content: Box<dyn ContentSource>,
    config: StoryConfig,
    units: HashMap<String, Rc<StoryUnit>>,
    unit: Option<Rc<StoryUnit>>,
    step_index: usize,
    call_stack: Vec<CallFrame>,
    state: StateTree,
    scene: Option<SceneDescriptor>,
    visible: Vec<String>,
    presentation: Presentation,
    audio: AudioRegistry,
    history: History,
    continuations: Vec<Continuation>,
    title_timer: Option<TitleTimer>,
    effect_pending: bool,
    next_token: u64,
    restoring: bool,
    restore_parts: usize,
    status: Status,
    events: Vec<StoryEvent>,
}

impl fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpreter")
            .field("unit", &self.unit_id())
            .field("step_index", &self.step_index)
            .field("call_stack", &self.call_stack)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Create an interpreter reading content from `content`.
    pub fn new(content: impl ContentSource + 'static, config: StoryConfig) -> Self {
        let history = History::new(config.history_limit);
        Self {
            content: Box::new(content),
            config,
            units: HashMap::new(),
            unit: None,
            step_index: 0,
            call_stack: Vec::new(),
            state: StateTree::new(),
            scene: None,
            visible: Vec::new(),
            presentation: Presentation::default(),
            audio: AudioRegistry::new(),
            history,
            continuations: Vec::new(),
            title_timer: None,
            effect_pending: false,
            next_token: 1,
            restoring: false,
            restore_parts: 0,
            status: Status::NotStarted,
            events: Vec::new(),
        }
    }

    // -- Accessors ----------------------------------------------------------

    /// The content source.
    pub fn content(&self) -> &dyn ContentSource {
        self.content.as_ref()
    }

    /// Current status.
    pub fn status(&self) -> &Status {
        &self.status
    }

    /// What is on screen.
    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// The state tree.
    pub fn state(&self) -> &StateTree {
        &self.state
    }

    /// Mutable state tree, for hosts, rules and the save codec.
    pub fn state_mut(&mut self) -> &mut StateTree {
        &mut self.state
    }

    /// The history log.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Active audio streams.
    pub fn audio(&self) -> &AudioRegistry {
        &self.audio
    }

    /// Id of the unit being executed.
    pub fn unit_id(&self) -> Option<&str> {
        self.unit.as_deref().map(|u| u.id.as_str())
    }

    /// The unit being executed.
    pub fn current_unit(&self) -> Option<&StoryUnit> {
        self.unit.as_deref()
    }

    /// The step at the current position.
    pub fn current_step(&self) -> Option<&Step> {
        self.unit.as_deref()?.step(self.step_index)
    }

    /// Current step index.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Return positions, innermost last.
    pub fn call_stack(&self) -> &[CallFrame] {
        &self.call_stack
    }

    /// Current scene.
    pub fn current_scene(&self) -> Option<&SceneDescriptor> {
        self.scene.as_ref()
    }

    /// Visible character ids in display order.
    pub fn visible_characters(&self) -> &[String] {
        &self.visible
    }

    /// The pending title auto-resume, if any.
    pub fn pending_title_timer(&self) -> Option<&TitleTimer> {
        self.title_timer.as_ref()
    }

    /// Pending resumption descriptors, innermost last.
    pub fn continuations(&self) -> &[Continuation] {
        &self.continuations
    }

    /// Take the events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<StoryEvent> {
        std::mem::take(&mut self.events)
    }

    // -- Content ------------------------------------------------------------

    /// Load a unit through the cache.
    pub fn load_unit(&mut self, id: &str) -> StoryResult<Rc<StoryUnit>> {
        Ok(self.fetch_unit(id)?)
    }

    fn fetch_unit(&mut self, id: &str) -> CoreResult<Rc<StoryUnit>> {
        if let Some(unit) = self.units.get(id) {
            return Ok(Rc::clone(unit));
        }
        let mut unit = self.content.load_story_unit(id)?;
        if unit.id != id {
            if !unit.id.is_empty() {
                tracing::warn!(requested = id, declared = %unit.id, "story unit id differs from its name");
            }
            unit.id = id.to_string();
        }
        tracing::info!(unit = id, steps = unit.len(), "story unit loaded");
        let unit = Rc::new(unit);
        self.units.insert(id.to_string(), Rc::clone(&unit));
        Ok(unit)
    }

    /// (Re)load the character roster. Missing characters are skipped with a
    /// warning; malformed records are an error. Returns the loaded ids.
    pub fn load_characters<I, S>(&mut self, ids: I) -> StoryResult<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = Vec::new();
        for id in ids {
            let id = id.as_ref();
            match self.content.load_character(id) {
                Ok(record) => {
                    self.state
                        .insert_character(Character::from_record(id, record));
                    loaded.push(id.to_string());
                }
                Err(CoreError::ContentNotFound { .. }) => {
                    tracing::warn!(character = id, "character not found, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }
        let state = &self.state;
        self.visible.retain(|id| state.character(id).is_some());
        self.events.push(StoryEvent::CharactersLoaded(loaded.clone()));
        Ok(loaded)
    }

    // -- Control ------------------------------------------------------------

    /// Start `unit_id` from its first step with an empty call stack.
    pub fn start(&mut self, unit_id: &str) -> StoryResult<Status> {
        self.restart_story(Some(unit_id))
    }

    /// Continue past the current line. A no-op while a choice or text input
    /// is pending, after completion and while halted.
    pub fn advance(&mut self) -> StoryResult<Status> {
        if let Some(Continuation::Interjection {
            presentation,
            status,
        }) = self.continuations.last().cloned()
        {
            self.continuations.pop();
            return Ok(self.restore_screen(*presentation, status));
        }
        match &self.status {
            Status::NotStarted => return Err(StoryError::NotStarted),
            Status::Choice | Status::Input | Status::Completed | Status::Halted(_) => {
                return Ok(self.status.clone());
            }
            Status::Dialogue | Status::Titles { .. } => {}
        }
        match self.continuations.pop() {
            Some(continuation) => self.resume(continuation),
            None => self.step_forward(),
        }
    }

    /// Jump to `target` from wherever the story is: a local label, or else
    /// a call into the unit of that name. Pending continuations and title
    /// timers are dropped.
    pub fn goto(&mut self, target: &str) -> StoryResult<Status> {
        if self.unit.is_none() {
            return Err(StoryError::NotStarted);
        }
        tracing::info!(target, "redirect");
        self.continuations.clear();
        self.restoring = false;
        self.redirect(target)
    }

    /// Re-dispatch the current step after a halt. Otherwise a no-op.
    pub fn retry(&mut self) -> StoryResult<Status> {
        if !matches!(self.status, Status::Halted(_)) {
            return Ok(self.status.clone());
        }
        tracing::info!(unit = ?self.unit_id(), step = self.step_index, "retrying");
        self.run()
    }

    /// End the session now.
    pub fn end_story(&mut self) -> Status {
        self.continuations.clear();
        self.clear_display();
        self.complete()
    }

    /// Restart at the first step of `unit_id`, or of the current unit, with
    /// an empty call stack.
    pub fn restart_story(&mut self, unit_id: Option<&str>) -> StoryResult<Status> {
        let id = unit_id
            .map(str::to_string)
            .or_else(|| self.unit_id().map(str::to_string))
            .unwrap_or_else(|| "start".to_string());
        let unit = self.fetch_unit(&id)?;
        tracing::info!(unit = %id, "starting story");
        self.call_stack.clear();
        self.continuations.clear();
        self.clear_display();
        self.restoring = false;
        self.unit = Some(unit);
        self.step_index = 0;
        self.run()
    }

    /// Clear position, display, visible characters, scene, global data,
    /// history and audio. Characters and cached units stay loaded.
    pub fn reset(&mut self) {
        self.unit = None;
        self.step_index = 0;
        self.call_stack.clear();
        self.continuations.clear();
        self.clear_display();
        self.visible.clear();
        self.scene = None;
        self.state.set_global(Map::new());
        self.history.clear();
        self.audio.stop_all();
        self.restoring = false;
        self.status = Status::NotStarted;
    }

    /// Fire the title timer identified by `token`. Stale tokens are ignored.
    ///
    /// While an injected line covers the card the timer stays armed and
    /// fires on the first tick after the line is dismissed.
    pub fn fire_title_timer(&mut self, token: u64) -> StoryResult<Status> {
        if self.title_timer.as_ref().is_none_or(|t| t.token != token) {
            tracing::debug!(token, "ignoring stale title timer");
            return Ok(self.status.clone());
        }
        if self.interjection_pending() {
            tracing::debug!(token, "title timer deferred behind injected line");
            return Ok(self.status.clone());
        }
        let Some(timer) = self.title_timer.take() else {
            return Ok(self.status.clone());
        };
        if timer.await_effect_end {
            let effect = self
                .presentation
                .title
                .as_ref()
                .and_then(|t| t.effect_end.clone())
                .unwrap_or_default();
            self.effect_pending = true;
            self.events.push(StoryEvent::TitleEffectEnd { effect });
            return Ok(self.status.clone());
        }
        self.advance()
    }

    /// Fire the title timer if its deadline has passed at `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> StoryResult<Status> {
        match &self.title_timer {
            Some(timer) if timer.is_due(now) => {
                let token = timer.token;
                self.fire_title_timer(token)
            }
            _ => Ok(self.status.clone()),
        }
    }

    /// The renderer finished a title exit effect; resume the story.
    pub fn acknowledge_title_effect(&mut self) -> StoryResult<Status> {
        if !self.effect_pending {
            return Ok(self.status.clone());
        }
        self.effect_pending = false;
        self.advance()
    }

    /// Current value at the pending input's path, as text.
    pub fn initial_input_value(&self) -> String {
        self.presentation
            .input
            .as_ref()
            .and_then(|i| i.variable.as_deref())
            .and_then(|path| self.state.read(path))
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    /// Write the player's answer and move on.
    pub fn submit_input(&mut self, value: &str) -> StoryResult<Status> {
        if self.status != Status::Input {
            return Err(StoryError::NoPendingInput);
        }
        let variable = self
            .presentation
            .input
            .take()
            .and_then(|prompt| prompt.variable);
        if let Some(path) = variable {
            self.state.write(&path, value.into());
        }
        self.step_forward()
    }

    /// Ask the host to pause all audio.
    pub fn pause_audio(&mut self) {
        self.audio.pause_all();
        self.forward_audio_signals();
    }

    /// Ask the host to resume paused audio.
    pub fn resume_audio(&mut self) {
        self.audio.resume_all();
        self.forward_audio_signals();
    }

    fn forward_audio_signals(&mut self) {
        for signal in self.audio.drain_signals() {
            self.events.push(match signal {
                AudioSignal::PauseAll => StoryEvent::AudioPaused,
                AudioSignal::ResumeAll => StoryEvent::AudioResumed,
            });
        }
    }

    fn interjection_pending(&self) -> bool {
        matches!(
            self.continuations.last(),
            Some(Continuation::Interjection { .. })
        )
    }

    // -- Run loop -----------------------------------------------------------

    /// Leave the current step normally and run on.
    fn step_forward(&mut self) -> StoryResult<Status> {
        self.clear_display();
        self.restoring = false;
        self.step_index += 1;
        self.run()
    }

    /// Jump and run, halting if the target cannot be loaded.
    fn redirect(&mut self, target: &str) -> StoryResult<Status> {
        if let Err(e) = self.jump(target) {
            return Err(self.halt_dispatch(e));
        }
        self.run()
    }

    /// Execute steps until one waits for the player or the session ends.
    fn run(&mut self) -> StoryResult<Status> {
        let mut auto_steps = 0usize;
        loop {
            let Some(unit) = self.unit.clone() else {
                return Ok(self.complete());
            };

            let Some(step) = unit.step(self.step_index) else {
                // Exhausted: return to the caller, or finish.
                match self.continue_caller() {
                    Ok(Flow::Complete) => return Ok(self.complete()),
                    Ok(_) => continue,
                    Err(e) => return Err(self.halt_dispatch(e)),
                }
            };

            auto_steps += 1;
            if auto_steps > self.config.max_auto_steps {
                let limit = self.config.max_auto_steps;
                return Err(self.halt(StoryError::StepLimit { limit }));
            }

            tracing::debug!(unit = %unit.id, step = self.step_index, kind = step.kind.name(), "dispatch");
            match self.dispatch(step) {
                Ok(Flow::Next) => self.step_index += 1,
                Ok(Flow::Jumped) => {}
                Ok(Flow::Suspend(status)) => {
                    self.status = status.clone();
                    return Ok(status);
                }
                Ok(Flow::Complete) => return Ok(self.complete()),
                Err(e) => return Err(self.halt_dispatch(e)),
            }
        }
    }

    /// Jump to a local label, or call the unit named `target`.
    fn jump(&mut self, target: &str) -> CoreResult<()> {
        self.clear_display();
        let Some(unit) = self.unit.clone() else {
            return Err(CoreError::ContentNotFound {
                kind: nv_core::ContentKind::StoryUnit,
                id: target.to_string(),
            });
        };
        if let Some(index) = unit.label_index(target) {
            tracing::debug!(unit = %unit.id, label = target, index, "local jump");
            self.step_index = index;
            return Ok(());
        }

        self.call_stack.push(CallFrame {
            story_id: unit.id.clone(),
            step_index: self.step_index + 1,
        });
        match self.fetch_unit(target) {
            Ok(next) => {
                tracing::debug!(from = %unit.id, to = target, depth = self.call_stack.len(), "call");
                self.unit = Some(next);
                self.step_index = 0;
                Ok(())
            }
            Err(e) => {
                self.call_stack.pop();
                Err(e)
            }
        }
    }

    /// Pop the call stack and resume the caller, or report completion.
    fn continue_caller(&mut self) -> CoreResult<Flow> {
        let Some(frame) = self.call_stack.pop() else {
            return Ok(Flow::Complete);
        };
        match self.fetch_unit(&frame.story_id) {
            Ok(unit) => {
                tracing::debug!(unit = %frame.story_id, step = frame.step_index, "return");
                self.clear_display();
                self.unit = Some(unit);
                self.step_index = frame.step_index;
                Ok(Flow::Jumped)
            }
            Err(e) => {
                self.call_stack.push(frame);
                Err(e)
            }
        }
    }

    fn complete(&mut self) -> Status {
        if self.status != Status::Completed {
            tracing::info!(unit = ?self.unit_id(), "story completed");
            self.events.push(StoryEvent::Completed);
        }
        self.continuations.clear();
        self.clear_timer();
        self.restoring = false;
        self.status = Status::Completed;
        Status::Completed
    }

    fn halt_dispatch(&mut self, source: CoreError) -> StoryError {
        let err = StoryError::StepDispatch {
            unit: self.unit_id().unwrap_or_default().to_string(),
            step: self.step_index,
            source,
        };
        self.halt(err)
    }

    fn halt(&mut self, err: StoryError) -> StoryError {
        tracing::error!(
            unit = ?self.unit_id(),
            step = self.step_index,
            kind = self.current_step().map(|s| s.kind.name()),
            error = %err,
            "interpreter halted"
        );
        self.status = Status::Halted(err.to_string());
        err
    }

    fn clear_display(&mut self) {
        self.presentation.clear();
        self.clear_timer();
    }

    fn clear_timer(&mut self) {
        self.title_timer = None;
        self.effect_pending = false;
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{interpreter, interpreter_with};
    use super::*;
    use crate::presentation::StoryEvent;
    use nv_core::{HistoryKind, MemoryContent, StoryUnit, Value};
    use proptest::prelude::*;

    #[test]
    fn score_placeholder_renders_after_assignment() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"variable":"global.score=0"},{"type":"dialogue","character":"mc","text":"Score: {global.score}"}]"#,
        )]);
        assert_eq!(vn.start("start").unwrap(), Status::Dialogue);
        assert_eq!(vn.step_index(), 1);
        assert_eq!(vn.presentation().dialogue, "Score: 0");
        assert_eq!(vn.presentation().speaker, "Mia");
    }

    #[test]
    fn narration_has_no_speaker() {
        let mut vn = interpreter(&[("start", r#"[{"type":"dialogue","text":"Wind howls."}]"#)]);
        vn.start("start").unwrap();
        assert_eq!(vn.presentation().narration, "Wind howls.");
        assert!(vn.presentation().speaker.is_empty());
        assert_eq!(vn.history().last().unwrap().kind, HistoryKind::Narration);
    }

    #[test]
    fn exhausting_top_level_unit_completes() {
        let mut vn = interpreter(&[("start", r#"[{"type":"dialogue","text":"a"}]"#)]);
        vn.start("start").unwrap();
        assert_eq!(vn.advance().unwrap(), Status::Completed);
        assert_eq!(vn.drain_events(), vec![
            StoryEvent::CharactersLoaded(vec!["mc".into()]),
            StoryEvent::Completed
        ]);
        assert_eq!(vn.advance().unwrap(), Status::Completed);
        assert!(vn.drain_events().is_empty());
    }

    #[test]
    fn goto_local_label() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"goto","target":"b"},{"type":"dialogue","text":"skipped"},{"id":"b","type":"dialogue","text":"here"}]"#,
        )]);
        vn.start("start").unwrap();
        assert_eq!(vn.step_index(), 2);
        assert_eq!(vn.presentation().narration, "here");
        assert!(vn.call_stack().is_empty());
    }

    #[test]
    fn goto_external_unit_calls_and_continue_returns() {
        let mut vn = interpreter(&[
            (
                "start",
                r#"[{"type":"goto","target":"side"},{"type":"dialogue","text":"back"}]"#,
            ),
            (
                "side",
                r#"[{"type":"dialogue","text":"in side"},{"type":"continue"}]"#,
            ),
        ]);
        vn.start("start").unwrap();
        assert_eq!(vn.unit_id(), Some("side"));
        assert_eq!(
            vn.call_stack(),
            &[CallFrame {
                story_id: "start".into(),
                step_index: 1
            }]
        );
        vn.advance().unwrap();
        assert_eq!(vn.unit_id(), Some("start"));
        assert_eq!(vn.presentation().narration, "back");
        assert!(vn.call_stack().is_empty());
    }

    #[test]
    fn exhausted_callee_returns_to_caller() {
        let mut vn = interpreter(&[
            (
                "start",
                r#"[{"type":"goto","target":"side"},{"type":"dialogue","text":"back"}]"#,
            ),
            ("side", r#"[{"type":"dialogue","text":"in side"}]"#),
        ]);
        vn.start("start").unwrap();
        vn.advance().unwrap();
        assert_eq!(vn.presentation().narration, "back");
    }

    #[test]
    fn end_inside_callee_behaves_as_continue() {
        let mut vn = interpreter(&[
            (
                "start",
                r#"[{"type":"goto","target":"side"},{"type":"end"}]"#,
            ),
            ("side", r#"[{"type":"end"},{"type":"dialogue","text":"never"}]"#),
        ]);
        assert_eq!(vn.start("start").unwrap(), Status::Completed);
        assert_eq!(vn.unit_id(), Some("start"));
    }

    #[test]
    fn missing_goto_target_halts_and_retry_redispatches() {
        let mut vn = interpreter(&[("start", r#"[{"type":"goto","target":"nowhere"}]"#)]);
        let err = vn.start("start").unwrap_err();
        assert!(matches!(err, StoryError::StepDispatch { step: 0, .. }));
        assert!(matches!(vn.status(), Status::Halted(_)));
        assert!(vn.call_stack().is_empty());
        assert_eq!(vn.advance().unwrap(), *vn.status());
        assert!(vn.retry().is_err());
        assert_eq!(vn.step_index(), 0);
    }

    #[test]
    fn goto_cycle_hits_step_limit() {
        let content = test_support::content(&[(
            "start",
            r#"[{"id":"loop","type":"goto","target":"loop"}]"#,
        )]);
        let mut vn = Interpreter::new(content, StoryConfig::default().with_max_auto_steps(50));
        assert!(matches!(
            vn.start("start"),
            Err(StoryError::StepLimit { limit: 50 })
        ));
    }

    #[test]
    fn missing_start_unit_is_content_error() {
        let mut vn = Interpreter::new(MemoryContent::new(), StoryConfig::default());
        assert!(matches!(vn.start("start"), Err(StoryError::Content(_))));
        assert_eq!(*vn.status(), Status::NotStarted);
        assert!(matches!(vn.advance(), Err(StoryError::NotStarted)));
    }

    #[test]
    fn input_writes_variable_and_advances() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"inputtext","variable":"character.mc.name","text":"Name?"},{"type":"dialogue","character":"mc","text":"Hi {character.mc.name}"}]"#,
        )]);
        assert_eq!(vn.start("start").unwrap(), Status::Input);
        assert_eq!(vn.initial_input_value(), "Mia");
        assert_eq!(vn.advance().unwrap(), Status::Input);
        vn.submit_input("Rin").unwrap();
        assert_eq!(vn.presentation().dialogue, "Hi Rin");
        assert_eq!(vn.presentation().speaker, "Rin");
        assert!(matches!(vn.submit_input("x"), Err(StoryError::NoPendingInput)));
    }

    #[test]
    fn redirect_clears_title_timer() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"titles","text":"Ch 1","duration":1000},{"id":"b","type":"dialogue","text":"b"}]"#,
        )]);
        vn.start("start").unwrap();
        let token = vn.pending_title_timer().unwrap().token;
        vn.goto("b").unwrap();
        assert!(vn.pending_title_timer().is_none());
        assert_eq!(vn.fire_title_timer(token).unwrap(), Status::Dialogue);
        assert_eq!(vn.step_index(), 1);
    }

    #[test]
    fn title_timer_auto_resumes() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"titles","text":"Ch {global.n}","duration":1000},{"type":"dialogue","text":"after"}]"#,
        )]);
        vn.state_mut().write("global.n", Value::Int(2));
        assert_eq!(
            vn.start("start").unwrap(),
            Status::Titles {
                auto_resume_ms: Some(1000)
            }
        );
        assert_eq!(vn.presentation().title.as_ref().unwrap().text, "Ch 2");
        let deadline = vn.pending_title_timer().unwrap().deadline;
        assert!(matches!(vn.tick(deadline - chrono::Duration::milliseconds(1)).unwrap(), Status::Titles { .. }));
        assert_eq!(vn.tick(deadline).unwrap(), Status::Dialogue);
        assert_eq!(vn.presentation().narration, "after");
        assert_eq!(vn.history().iter().next().unwrap().kind, HistoryKind::Titles);
    }

    #[test]
    fn title_with_exit_effect_waits_for_acknowledgement() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"titles","text":"End","duration":500,"effect-end":"fade"},{"type":"dialogue","text":"after"}]"#,
        )]);
        vn.start("start").unwrap();
        vn.drain_events();
        let token = vn.pending_title_timer().unwrap().token;
        assert!(matches!(vn.fire_title_timer(token).unwrap(), Status::Titles { .. }));
        assert_eq!(
            vn.drain_events(),
            vec![StoryEvent::TitleEffectEnd {
                effect: "fade".into()
            }]
        );
        assert_eq!(vn.acknowledge_title_effect().unwrap(), Status::Dialogue);
        assert_eq!(vn.acknowledge_title_effect().unwrap(), Status::Dialogue);
    }

    #[test]
    fn titles_without_duration_wait_for_advance() {
        let mut vn = interpreter(&[("start", r#"[{"type":"titles","text":"T"}]"#)]);
        assert_eq!(
            vn.start("start").unwrap(),
            Status::Titles {
                auto_resume_ms: None
            }
        );
        assert!(vn.pending_title_timer().is_none());
        assert_eq!(vn.advance().unwrap(), Status::Completed);
    }

    #[test]
    fn end_and_restart() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"dialogue","text":"a"},{"type":"dialogue","text":"b"}]"#,
        )]);
        vn.start("start").unwrap();
        vn.advance().unwrap();
        assert_eq!(vn.end_story(), Status::Completed);
        assert_eq!(vn.restart_story(None).unwrap(), Status::Dialogue);
        assert_eq!(vn.step_index(), 0);
    }

    #[test]
    fn reset_clears_session_state() {
        let mut vn = interpreter(&[(
            "start",
            r#"[{"type":"show","character":"mc"},{"type":"music","file":"m.ogg"},{"variable":"global.x=1"},{"type":"dialogue","text":"a"}]"#,
        )]);
        vn.start("start").unwrap();
        assert_eq!(vn.visible_characters(), ["mc"]);
        assert_eq!(vn.audio().len(), 1);
        vn.reset();
        assert_eq!(*vn.status(), Status::NotStarted);
        assert!(vn.visible_characters().is_empty());
        assert!(vn.audio().is_empty());
        assert!(vn.history().is_empty());
        assert!(vn.state().global().is_empty());
        assert!(vn.state().character("mc").is_some());
    }

    #[test]
    fn audio_pause_resume_become_events() {
        let mut vn = interpreter_with(&[("start", r#"[{"type":"dialogue","text":"a"}]"#)], &[]);
        vn.pause_audio();
        vn.resume_audio();
        assert_eq!(
            vn.drain_events(),
            vec![StoryEvent::AudioPaused, StoryEvent::AudioResumed]
        );
    }

    proptest! {
        #[test]
        fn auto_advance_stops_at_first_wait_or_limit(n in 0usize..40, limit in 1usize..40) {
            let mut steps: Vec<Step> = (0..n).map(|i| Step::assign(format!("global.v{i}=1"))).collect();
            steps.push(Step::dialogue(None, "done"));
            let content = MemoryContent::new().with_unit(StoryUnit::new("start", steps));
            let mut vn = Interpreter::new(content, StoryConfig::default().with_max_auto_steps(limit));
            let result = vn.start("start");
            if n < limit {
                prop_assert_eq!(result.ok(), Some(Status::Dialogue));
                prop_assert_eq!(vn.step_index(), n);
            } else {
                let halted = matches!(result, Err(StoryError::StepLimit { .. }));
                prop_assert!(halted);
            }
        }
    }
}
