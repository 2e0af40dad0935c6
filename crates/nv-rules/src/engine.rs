//! The rule engine.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{RuleError, RuleResult};
use crate::host::RuleHost;
use crate::rule::{Rule, RuleStats, TriggerMode};

/// Evaluates registered rules against a [`RuleHost`].
///
/// The last condition result of every rule is kept here rather than on the
/// rule, so rule definitions stay plain data.
#[derive(Debug, Default)]
pub struct RuleEngine {
    rules: Vec<Rule>,
    condition_state: HashMap<String, bool>,
    running: bool,
}

impl RuleEngine {
    /// Create a stopped engine with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. Ids must be unique and non-empty.
    pub fn register(&mut self, mut rule: Rule) -> RuleResult<()> {
        if rule.id.trim().is_empty() {
            return Err(RuleError::MissingId);
        }
        if self.rule(&rule.id).is_some() {
            return Err(RuleError::DuplicateId(rule.id));
        }
        rule.trigger_count = 0;
        rule.last_triggered = None;
        tracing::debug!(rule = %rule.id, "rule registered");
        self.rules.push(rule);
        Ok(())
    }

    /// Add several rules, stopping at the first invalid one.
    pub fn register_all(&mut self, rules: impl IntoIterator<Item = Rule>) -> RuleResult<()> {
        rules.into_iter().try_for_each(|rule| self.register(rule))
    }

    /// Registered rules in registration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Look up a rule.
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Enable or disable a rule. Returns whether it exists.
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> bool {
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Allow evaluation.
    pub fn start(&mut self) {
        self.running = true;
        tracing::info!(rules = self.rules.len(), "rule engine started");
    }

    /// Suspend evaluation.
    pub fn stop(&mut self) {
        self.running = false;
        tracing::info!("rule engine stopped");
    }

    /// Whether evaluation is allowed.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Evaluate every enabled rule now. Returns the ids of rules that fired.
    pub fn evaluate(&mut self, host: &mut dyn RuleHost) -> Vec<String> {
        self.evaluate_at(host, Utc::now())
    }

    /// Evaluate every enabled rule as of `now`.
    ///
    /// All conditions are evaluated first, against the same state; actions
    /// of the firing rules run afterwards in registration order.
    pub fn evaluate_at(&mut self, host: &mut dyn RuleHost, now: DateTime<Utc>) -> Vec<String> {
        if !self.running {
            return Vec::new();
        }

        let mut due = Vec::new();
        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.enabled {
                continue;
            }
            let holds = rule.conditions_hold(&*host);
            let previous = self
                .condition_state
                .insert(rule.id.clone(), holds)
                .unwrap_or(false);
            let trigger = match rule.trigger_mode {
                TriggerMode::OnChange => holds && !previous,
                TriggerMode::Always => holds,
            };
            if trigger {
                due.push(index);
            }
        }

        let mut fired = Vec::new();
        for index in due {
            let Some(rule) = self.rules.get_mut(index) else {
                continue;
            };
            if rule.is_suppressed(now) {
                tracing::debug!(rule = %rule.id, "rule suppressed");
                continue;
            }
            rule.trigger_count += 1;
            rule.last_triggered = Some(now);
            tracing::info!(rule = %rule.id, name = %rule.name, count = rule.trigger_count, "rule fired");

            for action in &rule.actions {
                action.execute(host);
            }
            if let Some(callback) = &rule.on_triggered {
                callback.call(host);
            }
            fired.push(rule.id.clone());
        }
        fired
    }

    /// Statistics of every rule.
    pub fn stats(&self) -> Vec<RuleStats> {
        self.rules.iter().map(Rule::stats).collect()
    }

    /// Clear trigger counts and times.
    pub fn reset_stats(&mut self) {
        for rule in &mut self.rules {
            rule.trigger_count = 0;
            rule.last_triggered = None;
        }
    }

    /// Forget condition history and statistics, e.g. for a new game.
    pub fn reset(&mut self) {
        self.condition_state.clear();
        self.reset_stats();
        tracing::debug!("rule engine state reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Callback};
    use crate::condition::{Check, Operator};
    use crate::test_support::{HostCall, TestHost};
    use chrono::Duration;
    use nv_core::Value;

    fn gas_high() -> Check {
        Check::Variable {
            path: "global.gas".into(),
            operator: Some(Operator::Gte),
            value: Value::Int(1),
        }
    }

    fn running(rules: Vec<Rule>) -> RuleEngine {
        let mut engine = RuleEngine::new();
        engine.register_all(rules).unwrap();
        engine.start();
        engine
    }

    #[test]
    fn registration_rejects_bad_ids() {
        let mut engine = RuleEngine::new();
        assert!(matches!(engine.register(Rule::new(" ")), Err(RuleError::MissingId)));
        engine.register(Rule::new("a")).unwrap();
        assert!(matches!(
            engine.register(Rule::new("a")),
            Err(RuleError::DuplicateId(id)) if id == "a"
        ));
    }

    #[test]
    fn stopped_engine_does_nothing() {
        let mut engine = RuleEngine::new();
        engine.register(Rule::new("always")).unwrap();
        let mut host = TestHost::default();
        assert!(engine.evaluate(&mut host).is_empty());
        engine.start();
        assert_eq!(engine.evaluate(&mut host), vec!["always".to_string()]);
        engine.stop();
        assert!(engine.evaluate(&mut host).is_empty());
    }

    #[test]
    fn on_change_fires_once_per_transition() {
        let mut engine = running(vec![
            Rule::new("gas")
                .with_trigger_mode(TriggerMode::OnChange)
                .when(gas_high())
                .then(Action::Goto {
                    target: "death".into(),
                }),
        ]);
        let mut host = TestHost::default();
        host.set("global.gas", Value::Int(1));
        let t = Utc::now();

        assert_eq!(engine.evaluate_at(&mut host, t).len(), 1);
        assert!(engine.evaluate_at(&mut host, t).is_empty());
        assert_eq!(host.calls, vec![HostCall::Goto("death".into())]);

        host.set("global.gas", Value::Int(0));
        assert!(engine.evaluate_at(&mut host, t).is_empty());
        host.set("global.gas", Value::Int(3));
        assert_eq!(engine.evaluate_at(&mut host, t).len(), 1);
        assert_eq!(engine.rule("gas").unwrap().trigger_count, 2);
    }

    #[test]
    fn debounce_suppresses_within_window() {
        let mut engine = running(vec![Rule::new("tick").with_debounce_ms(1000).when(gas_high())]);
        let mut host = TestHost::default();
        host.set("global.gas", Value::Int(1));
        let t0 = Utc::now();

        assert_eq!(engine.evaluate_at(&mut host, t0).len(), 1);
        assert!(engine
            .evaluate_at(&mut host, t0 + Duration::milliseconds(500))
            .is_empty());
        assert_eq!(
            engine
                .evaluate_at(&mut host, t0 + Duration::milliseconds(1500))
                .len(),
            1
        );
    }

    #[test]
    fn once_rules_fire_a_single_time() {
        let mut engine = running(vec![Rule::new("intro").with_once(true)]);
        let mut host = TestHost::default();
        assert_eq!(engine.evaluate(&mut host).len(), 1);
        assert!(engine.evaluate(&mut host).is_empty());
        engine.reset();
        assert_eq!(engine.evaluate(&mut host).len(), 1);
    }

    #[test]
    fn conditions_see_state_before_any_action() {
        let mut engine = running(vec![
            Rule::new("first").when(gas_high()).then(Action::SetVariable {
                path: "global.gas".into(),
                value: Value::Int(0),
            }),
            Rule::new("second").when(gas_high()),
        ]);
        let mut host = TestHost::default();
        host.set("global.gas", Value::Int(1));
        assert_eq!(engine.evaluate(&mut host), vec!["first".to_string(), "second".to_string()]);
        assert!(engine.evaluate(&mut host).is_empty());
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut engine = running(vec![Rule::new("r")]);
        assert!(engine.set_enabled("r", false));
        assert!(!engine.set_enabled("missing", false));
        let mut host = TestHost::default();
        assert!(engine.evaluate(&mut host).is_empty());
        assert!(!engine.stats()[0].enabled);
    }

    #[test]
    fn actions_then_trigger_callback() {
        let mut engine = running(vec![
            Rule::new("r")
                .with_name("Rule")
                .then(Action::EndStory)
                .on_triggered(Callback::new(|h| h.restart_story(Some("start")))),
        ]);
        let mut host = TestHost::default();
        let t = Utc::now();
        engine.evaluate_at(&mut host, t);
        assert_eq!(
            host.calls,
            vec![HostCall::End, HostCall::Restart(Some("start".into()))]
        );

        let stats = engine.stats();
        assert_eq!(stats[0].name, "Rule");
        assert_eq!(stats[0].trigger_count, 1);
        assert_eq!(stats[0].last_triggered, Some(t));
        engine.reset_stats();
        assert_eq!(engine.stats()[0].trigger_count, 0);
    }
}
