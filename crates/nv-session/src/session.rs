//! Novel session management.
//!
//! `NovelSession` owns the interpreter together with the rule engine, the
//! save codec and a slot store. Every operation that may change state is
//! followed by at most one rule evaluation, and only when the state tree's
//! revision moved since the last pass.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};

use nv_core::{ContentSource, Value};
use nv_rules::{Notification, Rule, RuleEngine, RuleStats};
use nv_save::{SaveCodec, SaveFile, SlotStore};
use nv_story::{Interpreter, Presentation, Status, StoryEvent};

use crate::config::NovelConfig;
use crate::error::{SessionError, SessionResult};
use crate::host::SessionHost;

/// Name of the optional rules file in a content directory.
pub const RULES_FILE: &str = "rules.json";

/// One playthrough: interpreter, rules, saves and the player's location.
pub struct NovelSession {
    config: NovelConfig,
    vn: Interpreter,
    rules: RuleEngine,
    codec: SaveCodec,
    slots: Box<dyn SlotStore>,
    location: Option<Value>,
    notifications: Vec<Notification>,
    evaluated_revision: Option<u64>,
}

impl NovelSession {
    /// Create a session over `content`, saving into `slots`.
    pub fn new(
        content: impl ContentSource + 'static,
        slots: impl SlotStore + 'static,
        config: NovelConfig,
    ) -> Self {
        let vn = Interpreter::new(content, config.story_config());
        Self {
            config,
            vn,
            rules: RuleEngine::new(),
            codec: SaveCodec::new(),
            slots: Box::new(slots),
            location: None,
            notifications: Vec::new(),
            evaluated_revision: None,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &NovelConfig {
        &self.config
    }

    /// Get the interpreter.
    pub fn interpreter(&self) -> &Interpreter {
        &self.vn
    }

    /// Get the interpreter mutably. State written here is seen by the rules
    /// after the next session operation.
    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.vn
    }

    /// Get the rule engine.
    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Where the interpreter stopped.
    pub fn status(&self) -> Status {
        self.vn.status().clone()
    }

    /// What is on screen.
    pub fn presentation(&self) -> &Presentation {
        self.vn.presentation()
    }

    /// The player's current location.
    pub fn location(&self) -> Option<&Value> {
        self.location.as_ref()
    }

    /// Firing statistics of every rule.
    pub fn rule_stats(&self) -> Vec<RuleStats> {
        self.rules.stats()
    }

    // -- Rules ---------------------------------------------------------------

    /// Register one rule.
    pub fn register_rule(&mut self, rule: Rule) -> SessionResult<()> {
        Ok(self.rules.register(rule)?)
    }

    /// Register several rules.
    pub fn register_rules(&mut self, rules: impl IntoIterator<Item = Rule>) -> SessionResult<()> {
        Ok(self.rules.register_all(rules)?)
    }

    /// Register the rules in `dir/rules.json`, if that file exists. Returns
    /// how many were registered.
    pub fn load_rules_file(&mut self, dir: &Path) -> SessionResult<usize> {
        let path = dir.join(RULES_FILE);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(SessionError::Io { path, source }),
        };
        let rules = Rule::parse_all(&text)?;
        let count = rules.len();
        self.register_rules(rules)?;
        tracing::info!(path = %path.display(), count, "loaded rules");
        Ok(count)
    }

    // -- Story control -------------------------------------------------------

    /// Start `unit`, or the configured start unit. The character roster is
    /// loaded and baselined first if it is not yet.
    pub fn start(&mut self, unit: Option<&str>) -> SessionResult<Status> {
        self.prepare()?;
        let unit = unit.unwrap_or(&self.config.start_unit).to_string();
        self.vn.start(&unit)?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Throw away all progress and start over from the start unit.
    pub fn new_game(&mut self) -> SessionResult<Status> {
        tracing::info!("new game");
        self.vn.reset();
        self.vn.state_mut().clear();
        self.codec.clear_baselines();
        self.rules.reset();
        self.notifications.clear();
        self.evaluated_revision = None;
        self.start(None)
    }

    /// Continue past the current line.
    pub fn advance(&mut self) -> SessionResult<Status> {
        self.vn.advance()?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Pick a choice option.
    pub fn select_choice(&mut self, index: usize) -> SessionResult<Status> {
        self.vn.select_choice(index)?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Answer the pending text input.
    pub fn submit_input(&mut self, value: &str) -> SessionResult<Status> {
        self.vn.submit_input(value)?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Jump to a label or unit.
    pub fn goto(&mut self, target: &str) -> SessionResult<Status> {
        self.vn.goto(target)?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Re-run the current step after a halt.
    pub fn retry(&mut self) -> SessionResult<Status> {
        self.vn.retry()?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Fire a due title timer.
    pub fn tick(&mut self, now: DateTime<Utc>) -> SessionResult<Status> {
        self.vn.tick(now)?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Continue once a title card's exit effect has played.
    pub fn acknowledge_title_effect(&mut self) -> SessionResult<Status> {
        self.vn.acknowledge_title_effect()?;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// Move the player. Location rules are evaluated right away.
    pub fn set_location(&mut self, location: Option<Value>) {
        tracing::debug!(location = ?location, "location changed");
        self.location = location;
        self.evaluated_revision = None;
        self.evaluate_rules();
    }

    // -- Saves ---------------------------------------------------------------

    /// Save into `slot` under `player_name`, or the main character's name.
    pub fn save(&mut self, slot: u32, player_name: Option<&str>) -> SessionResult<SaveFile> {
        let record = self.codec.serialize(&self.vn)?;
        let name = player_name
            .map(str::to_string)
            .or_else(|| self.player_name())
            .unwrap_or_default();
        let file = SaveFile::new(slot, &name, record, Utc::now());
        self.slots.write_slot(&file)?;
        tracing::info!(slot, player = %file.mc_name, "game saved");
        Ok(file)
    }

    /// Load the save in `slot`.
    pub fn load(&mut self, slot: u32) -> SessionResult<Status> {
        let file = self.slots.read_slot(slot)?;
        self.prepare()?;
        self.rules.reset();
        self.notifications.clear();
        self.codec.restore(file.game_state, &mut self.vn)?;
        tracing::info!(slot, "game loaded");
        self.evaluated_revision = None;
        self.evaluate_rules();
        Ok(self.status())
    }

    /// The latest save of every slot.
    pub fn list_saves(&self) -> SessionResult<Vec<SaveFile>> {
        Ok(self.slots.list_slots()?)
    }

    /// Empty a slot.
    pub fn delete_save(&mut self, slot: u32) -> SessionResult<()> {
        self.slots.delete_slot(slot)?;
        tracing::info!(slot, "save deleted");
        Ok(())
    }

    // -- Host output ---------------------------------------------------------

    /// Take the queued notifications.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Take the interpreter's queued events.
    pub fn drain_events(&mut self) -> Vec<StoryEvent> {
        self.vn.drain_events()
    }

    /// Load and baseline any roster character not loaded yet, and start the
    /// rule engine when rules are enabled.
    fn prepare(&mut self) -> SessionResult<()> {
        let missing: Vec<&String> = self
            .config
            .characters
            .iter()
            .filter(|id| self.vn.state().character(id).is_none())
            .collect();
        if !missing.is_empty() {
            self.vn.load_characters(missing)?;
        }
        self.codec.capture_baseline(self.vn.state());
        if self.config.rules_enabled && !self.rules.is_running() {
            self.rules.start();
        }
        Ok(())
    }

    fn player_name(&self) -> Option<String> {
        self.vn
            .state()
            .character("mc")
            .and_then(|c| c.name())
            .map(str::to_string)
    }

    /// Run one evaluation pass if state changed since the previous one.
    /// Writes made by the firing rules count as seen.
    fn evaluate_rules(&mut self) {
        if !self.rules.is_running() {
            return;
        }
        let revision = self.vn.state().revision();
        if self.evaluated_revision == Some(revision) {
            return;
        }
        let mut host = SessionHost {
            vn: &mut self.vn,
            location: self.location.as_ref(),
            notifications: &mut self.notifications,
        };
        let fired = self.rules.evaluate(&mut host);
        if !fired.is_empty() {
            tracing::debug!(rules = ?fired, "rules fired");
        }
        self.evaluated_revision = Some(self.vn.state().revision());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nv_core::{CharacterRecord, Map, MemoryContent, StoryUnit};
    use nv_rules::{Action, Check, Operator, Severity, TriggerMode};
    use nv_save::{MemorySlotStore, SaveError};

    fn content(units: &[(&str, &str)]) -> MemoryContent {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::from("Mia"));
        fields.insert("health".into(), Value::Int(10));
        let mc = CharacterRecord::from_split(fields, Value::Null, Vec::new());
        let mut content = MemoryContent::new().with_character("mc", mc);
        for (id, steps) in units {
            let steps = serde_json::from_str(steps).unwrap();
            content = content.with_unit(StoryUnit::new(*id, steps));
        }
        content
    }

    fn session(units: &[(&str, &str)]) -> NovelSession {
        NovelSession::new(content(units), MemorySlotStore::new(), NovelConfig::default())
    }

    fn gas_rule() -> Rule {
        Rule::new("gas")
            .with_trigger_mode(TriggerMode::OnChange)
            .when(Check::Variable {
                path: "global.gas".into(),
                operator: Some(Operator::Gte),
                value: Value::Int(1),
            })
            .then(Action::Notification(Notification {
                text: "Low oxygen!".into(),
                severity: Severity::Danger,
                duration: Some(2000),
            }))
            .then(Action::Goto {
                target: "death".into(),
            })
    }

    const CAVE: &[(&str, &str)] = &[
        (
            "start",
            r#"[{"type":"dialogue","text":"A cave."},{"variable":"global.gas=1"},{"type":"dialogue","text":"You cough."}]"#,
        ),
        ("death", r#"[{"type":"dialogue","text":"You died."}]"#),
    ];

    #[test]
    fn start_loads_roster_and_runs() {
        let mut s = session(CAVE);
        assert_eq!(s.start(None).unwrap(), Status::Dialogue);
        assert_eq!(s.presentation().line(), "A cave.");
        assert!(s.interpreter().state().character("mc").is_some());
    }

    #[test]
    fn rules_redirect_after_state_change() {
        let mut s = session(CAVE);
        s.register_rule(gas_rule()).unwrap();
        s.start(None).unwrap();
        assert!(s.drain_notifications().is_empty());

        s.advance().unwrap();
        assert_eq!(s.presentation().line(), "You died.");
        assert_eq!(s.interpreter().unit_id(), Some("death"));
        let notes = s.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].severity, Severity::Danger);
        assert_eq!(s.rule_stats()[0].trigger_count, 1);
    }

    #[test]
    fn evaluation_is_coalesced_per_revision() {
        let mut s = session(&[(
            "start",
            r#"[{"type":"dialogue","text":"a"},{"type":"dialogue","text":"b"},{"type":"dialogue","text":"c"}]"#,
        )]);
        s.register_rule(Rule::new("every")).unwrap();
        s.start(None).unwrap();
        assert_eq!(s.rule_stats()[0].trigger_count, 1);

        s.advance().unwrap();
        assert_eq!(s.rule_stats()[0].trigger_count, 1);

        s.interpreter_mut()
            .state_mut()
            .write("global.flag", Value::Bool(true));
        s.advance().unwrap();
        assert_eq!(s.rule_stats()[0].trigger_count, 2);
    }

    #[test]
    fn disabled_rules_never_run() {
        let mut s = NovelSession::new(
            content(CAVE),
            MemorySlotStore::new(),
            NovelConfig::default().with_rules_enabled(false),
        );
        s.register_rule(gas_rule()).unwrap();
        s.start(None).unwrap();
        s.advance().unwrap();
        assert_eq!(s.presentation().line(), "You cough.");
        assert!(!s.rules().is_running());
    }

    #[test]
    fn location_changes_trigger_rules() {
        let mut s = session(&[
            ("start", r#"[{"type":"dialogue","text":"Outside."}]"#),
            ("lab", r#"[{"type":"dialogue","text":"The lab hums."}]"#),
        ]);
        s.register_rule(
            Rule::new("enter_lab")
                .with_trigger_mode(TriggerMode::OnChange)
                .when(Check::Location {
                    field: nv_rules::LocationField::Id,
                    operator: Some(Operator::Eq),
                    value: Value::from("lab"),
                })
                .then(Action::Goto {
                    target: "lab".into(),
                }),
        )
        .unwrap();
        s.start(None).unwrap();
        s.set_location(Some(Value::from("yard")));
        assert_eq!(s.presentation().line(), "Outside.");
        s.set_location(Some(Value::from("lab")));
        assert_eq!(s.presentation().line(), "The lab hums.");
        assert_eq!(s.location(), Some(&Value::from("lab")));
    }

    #[test]
    fn save_and_load_round_trip() {
        let mut s = session(&[(
            "start",
            r#"[{"type":"dialogue","text":"one"},{"variable":"character.mc.health-=3"},{"type":"dialogue","text":"two"},{"type":"dialogue","text":"three"}]"#,
        )]);
        s.start(None).unwrap();
        s.advance().unwrap();
        let file = s.save(2, None).unwrap();
        assert_eq!(file.mc_name, "Mia");
        assert_eq!(
            file.game_state.character_data_delta["mc"]["health"],
            Value::Int(7)
        );

        s.advance().unwrap();
        assert_eq!(s.presentation().line(), "three");

        assert_eq!(s.load(2).unwrap(), Status::Dialogue);
        assert_eq!(s.presentation().line(), "two");
        assert_eq!(
            s.interpreter().state().read_value("character.mc.health"),
            Some(Value::Int(7))
        );
        assert_eq!(s.list_saves().unwrap().len(), 1);

        s.delete_save(2).unwrap();
        assert!(matches!(
            s.load(2),
            Err(SessionError::Save(SaveError::SlotNotFound(2)))
        ));
    }

    #[test]
    fn new_game_discards_progress() {
        let mut s = session(&[(
            "start",
            r#"[{"variable":"character.mc.health=1"},{"type":"dialogue","text":"hurt"}]"#,
        )]);
        s.start(None).unwrap();
        s.interpreter_mut()
            .state_mut()
            .write("global.seen", Value::Bool(true));
        s.new_game().unwrap();
        assert_eq!(s.interpreter().state().read_value("global.seen"), None);
        assert_eq!(s.presentation().line(), "hurt");
        assert_eq!(
            s.interpreter().state().read_value("character.mc.health"),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn rules_file_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(CAVE);
        assert_eq!(s.load_rules_file(dir.path()).unwrap(), 0);

        fs::write(
            dir.path().join(RULES_FILE),
            r#"[{"id":"r1","conditions":[],"actions":[{"type":"log","message":"hi"}]}]"#,
        )
        .unwrap();
        assert_eq!(s.load_rules_file(dir.path()).unwrap(), 1);
        assert!(matches!(
            s.load_rules_file(dir.path()),
            Err(SessionError::Rule(_))
        ));
    }
}
