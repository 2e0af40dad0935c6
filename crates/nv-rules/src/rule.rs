//! Rule definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::{Action, Callback};
use crate::condition::Condition;
use crate::error::RuleResult;
use crate::host::RuleHost;

fn enabled_by_default() -> bool {
    true
}

/// When a rule whose conditions hold is allowed to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerMode {
    /// On every evaluation where the conditions hold.
    #[default]
    Always,
    /// Only when the conditions go from false to true.
    OnChange,
}

/// A set of conditions and the actions run when they hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// What the rule is for.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Disabled rules are not evaluated.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Edge or level triggering.
    #[serde(default)]
    pub trigger_mode: TriggerMode,
    /// Minimum milliseconds between firings.
    #[serde(default, rename = "debounce")]
    pub debounce_ms: u64,
    /// Fire at most once.
    #[serde(default)]
    pub once: bool,
    /// All must hold. An empty list always holds.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Run in order when the rule fires.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Run after the actions.
    #[serde(skip)]
    pub on_triggered: Option<Callback>,
    /// Times fired.
    #[serde(skip)]
    pub trigger_count: u64,
    /// When it last fired.
    #[serde(skip)]
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Rule {
    /// An enabled, level-triggered rule with no conditions or actions.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            description: String::new(),
            enabled: true,
            trigger_mode: TriggerMode::Always,
            debounce_ms: 0,
            once: false,
            conditions: Vec::new(),
            actions: Vec::new(),
            on_triggered: None,
            trigger_count: 0,
            last_triggered: None,
        }
    }

    /// Parse a JSON array of rules.
    pub fn parse_all(json: &str) -> RuleResult<Vec<Self>> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the trigger mode.
    pub fn with_trigger_mode(mut self, mode: TriggerMode) -> Self {
        self.trigger_mode = mode;
        self
    }

    /// Set the debounce window.
    pub fn with_debounce_ms(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Fire at most once.
    pub fn with_once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Add a condition.
    pub fn when(mut self, condition: impl Into<Condition>) -> Self {
        self.conditions.push(condition.into());
        self
    }

    /// Add an action.
    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Run `callback` after the actions.
    pub fn on_triggered(mut self, callback: Callback) -> Self {
        self.on_triggered = Some(callback);
        self
    }

    /// Whether every condition holds.
    pub fn conditions_hold(&self, host: &dyn RuleHost) -> bool {
        self.conditions.iter().all(|c| c.evaluate(host))
    }

    /// Whether `once` or the debounce window blocks firing at `now`.
    pub(crate) fn is_suppressed(&self, now: DateTime<Utc>) -> bool {
        if self.once && self.trigger_count > 0 {
            return true;
        }
        match self.last_triggered {
            Some(last) if self.debounce_ms > 0 => {
                let window = i64::try_from(self.debounce_ms).unwrap_or(i64::MAX);
                (now - last).num_milliseconds() < window
            }
            _ => false,
        }
    }

    pub(crate) fn stats(&self) -> RuleStats {
        RuleStats {
            id: self.id.clone(),
            name: self.name.clone(),
            trigger_count: self.trigger_count,
            last_triggered: self.last_triggered,
            enabled: self.enabled,
        }
    }
}

/// Firing statistics of one rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleStats {
    /// Rule id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Times fired.
    pub trigger_count: u64,
    /// When it last fired.
    pub last_triggered: Option<DateTime<Utc>>,
    /// Whether the rule is enabled.
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const TOXIC_GAS: &str = r#"[{
        "id": "toxic_gas_no_mask",
        "name": "Suffocation",
        "triggerMode": "on-change",
        "debounce": 100,
        "conditions": [
            {"type": "equipment", "field": "mask", "operator": "ne", "value": "gasmask"},
            {"type": "variable", "path": "global.toxic_gas", "operator": "gte", "value": 1},
            {"type": "story", "field": "isPlaying", "operator": "eq", "value": true}
        ],
        "actions": [
            {"type": "notification", "text": "Low oxygen!", "notificationType": "danger", "duration": 2000},
            {"type": "goto", "target": "death/suffocation"}
        ]
    }]"#;

    #[test]
    fn parses_rule_documents() {
        let rules = Rule::parse_all(TOXIC_GAS).unwrap();
        let rule = &rules[0];
        assert_eq!(rule.id, "toxic_gas_no_mask");
        assert!(rule.enabled);
        assert_eq!(rule.trigger_mode, TriggerMode::OnChange);
        assert_eq!(rule.debounce_ms, 100);
        assert_eq!(rule.conditions.len(), 3);
        assert_eq!(rule.actions.len(), 2);
        assert_eq!(rule.trigger_count, 0);
    }

    #[test]
    fn suppression_by_once_and_debounce() {
        let now = Utc::now();
        let mut rule = Rule::new("r").with_debounce_ms(1000);
        assert!(!rule.is_suppressed(now));
        rule.trigger_count = 1;
        rule.last_triggered = Some(now);
        assert!(rule.is_suppressed(now + Duration::milliseconds(999)));
        assert!(!rule.is_suppressed(now + Duration::milliseconds(1000)));
        rule.once = true;
        assert!(rule.is_suppressed(now + Duration::milliseconds(5000)));
    }
}
