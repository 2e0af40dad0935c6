//! Rule conditions and comparison operators.

use std::fmt;
use std::sync::Arc;

use nv_core::{EQUIPMENT_SLOTS, Value, slot_item_id};
use serde::{Deserialize, Serialize};

use crate::host::RuleHost;

fn default_character() -> String {
    "mc".to_string()
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One predicate of a rule, optionally negated with `"not": true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    /// What is checked.
    #[serde(flatten)]
    pub check: Check,
    /// Invert the result.
    #[serde(default, rename = "not", skip_serializing_if = "is_false")]
    pub negate: bool,
}

impl Condition {
    /// A condition that is not negated.
    pub fn new(check: Check) -> Self {
        Self {
            check,
            negate: false,
        }
    }

    /// Negate this condition.
    pub fn negated(mut self) -> Self {
        self.negate = !self.negate;
        self
    }

    /// Evaluate against `host`.
    pub fn evaluate(&self, host: &dyn RuleHost) -> bool {
        self.check.evaluate(host) != self.negate
    }
}

impl From<Check> for Condition {
    fn from(check: Check) -> Self {
        Self::new(check)
    }
}

/// The kinds of condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Check {
    /// Compare the value at a state path.
    Variable {
        /// State path, e.g. `global.toxic_gas`.
        path: String,
        /// Comparison.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<Operator>,
        /// Expected value.
        #[serde(default)]
        value: Value,
    },
    /// Check the player's location.
    Location {
        /// Which aspect of the location.
        #[serde(default)]
        field: LocationField,
        /// Comparison.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<Operator>,
        /// Expected value.
        #[serde(default)]
        value: Value,
    },
    /// Check the story being played.
    Story {
        /// Which aspect of the story.
        field: StoryField,
        /// Comparison.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<Operator>,
        /// Expected value.
        #[serde(default)]
        value: Value,
    },
    /// Check a character's health.
    Character {
        /// Character id.
        #[serde(default = "default_character")]
        character: String,
        /// Which aspect of the character.
        field: CharacterField,
        /// Comparison.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<Operator>,
        /// Expected value.
        #[serde(default)]
        value: Value,
    },
    /// Check a character's equipment slots.
    Equipment {
        /// Character id.
        #[serde(default = "default_character")]
        character: String,
        /// `hasItem`, or the name of a slot to compare.
        field: String,
        /// Comparison; `has`/`not` for `hasItem`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<Operator>,
        /// Expected item id.
        #[serde(default)]
        value: Value,
    },
    /// Arbitrary predicate, only available from code.
    #[serde(skip)]
    Custom(Predicate),
}

impl Check {
    /// Evaluate without negation.
    pub fn evaluate(&self, host: &dyn RuleHost) -> bool {
        match self {
            Self::Variable {
                path,
                operator,
                value,
            } => compare_with(host.read(path).as_ref(), *operator, value),
            Self::Location {
                field,
                operator,
                value,
            } => {
                let location = host.current_location();
                match field {
                    LocationField::Current | LocationField::Id => {
                        let id = location.as_ref().map(location_id);
                        compare_with(id.as_ref(), *operator, value)
                    }
                    LocationField::HasAttribute => location
                        .as_ref()
                        .and_then(|l| l.get("attributes"))
                        .and_then(Value::as_list)
                        .is_some_and(|attrs| attrs.iter().any(|a| a.loose_eq(value))),
                }
            }
            Self::Story {
                field,
                operator,
                value,
            } => match field {
                StoryField::Id | StoryField::Active => {
                    let story = host.active_story().map(Value::String);
                    compare_with(story.as_ref(), *operator, value)
                }
                StoryField::IsPlaying => Value::Bool(host.story_playing()).loose_eq(value),
            },
            Self::Character {
                character,
                field,
                operator,
                value,
            } => {
                let read = |key: &str| host.read(&format!("character.{character}.{key}"));
                let health = read("health")
                    .filter(|v| !v.is_empty())
                    .or_else(|| read("hp"));
                match field {
                    CharacterField::Health | CharacterField::Hp => {
                        compare_with(health.as_ref(), *operator, value)
                    }
                    CharacterField::IsDead => health
                        .as_ref()
                        .and_then(Value::coerce_number)
                        .is_some_and(|hp| hp <= 0.0),
                }
            }
            Self::Equipment {
                character,
                field,
                operator,
                value,
            } => {
                let slots = host
                    .read(&format!("character.{character}.{EQUIPMENT_SLOTS}"))
                    .and_then(|v| v.as_map().cloned())
                    .unwrap_or_default();
                if field == "hasItem" {
                    let expected = slot_item_id(value);
                    let has = expected.is_some()
                        && slots.values().any(|r| slot_item_id(r) == expected);
                    return match operator {
                        Some(Operator::Has | Operator::Eq) => has,
                        _ => !has,
                    };
                }
                let equipped = slots
                    .get(field.as_str())
                    .map(|r| slot_item_id(r).map_or(Value::Null, Value::String));
                compare_with(equipped.as_ref(), *operator, value)
            }
            Self::Custom(predicate) => predicate.call(host),
        }
    }
}

fn location_id(location: &Value) -> Value {
    match location {
        Value::Map(m) => m.get("id").cloned().unwrap_or_default(),
        other => other.clone(),
    }
}

fn compare_with(actual: Option<&Value>, operator: Option<Operator>, expected: &Value) -> bool {
    match operator {
        Some(op) => op.compare(actual, expected),
        None => {
            tracing::warn!("condition has no operator");
            false
        }
    }
}

/// Which aspect of the location a `location` condition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LocationField {
    /// The location id.
    #[default]
    Current,
    /// The location id.
    Id,
    /// Whether the location's `attributes` contain the value.
    HasAttribute,
}

/// Which aspect of the story a `story` condition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoryField {
    /// Id of the unit being played.
    Id,
    /// Id of the unit being played.
    Active,
    /// Whether a story is being played.
    IsPlaying,
}

/// Which aspect of a character a `character` condition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharacterField {
    /// `health`, falling back to `hp`.
    Health,
    /// Same as `health`.
    Hp,
    /// Health at or below zero.
    IsDead,
}

/// Comparison operators. Numbers compare numerically whatever their
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// Equal.
    #[serde(rename = "eq", alias = "=", alias = "==")]
    Eq,
    /// Not equal.
    #[serde(rename = "ne", alias = "!=")]
    Ne,
    /// Greater than.
    #[serde(rename = "gt", alias = ">")]
    Gt,
    /// Greater than or equal.
    #[serde(rename = "gte", alias = ">=")]
    Gte,
    /// Less than.
    #[serde(rename = "lt", alias = "<")]
    Lt,
    /// Less than or equal.
    #[serde(rename = "lte", alias = "<=")]
    Lte,
    /// Actual is one of the expected list.
    #[serde(rename = "in")]
    In,
    /// Actual is none of the expected list.
    #[serde(rename = "nin", alias = "not-in")]
    Nin,
    /// Text contains, or list holds, the expected value.
    #[serde(rename = "contains")]
    Contains,
    /// Text starts with the expected value.
    #[serde(rename = "startsWith")]
    StartsWith,
    /// Text ends with the expected value.
    #[serde(rename = "endsWith")]
    EndsWith,
    /// The path holds a non-null value.
    #[serde(rename = "exists")]
    Exists,
    /// The value is missing or empty.
    #[serde(rename = "empty")]
    Empty,
    /// Equipment membership.
    #[serde(rename = "has")]
    Has,
    /// Equipment non-membership.
    #[serde(rename = "not")]
    Not,
}

impl Operator {
    /// Compare `actual` (absent when the path is unresolved) with `expected`.
    pub fn compare(self, actual: Option<&Value>, expected: &Value) -> bool {
        match self {
            Self::Eq | Self::Has => actual.is_some_and(|a| a.loose_eq(expected)),
            Self::Ne | Self::Not => !actual.is_some_and(|a| a.loose_eq(expected)),
            Self::Gt => order(actual, expected).is_some_and(|o| o.is_gt()),
            Self::Gte => order(actual, expected).is_some_and(|o| o.is_ge()),
            Self::Lt => order(actual, expected).is_some_and(|o| o.is_lt()),
            Self::Lte => order(actual, expected).is_some_and(|o| o.is_le()),
            Self::In => match (actual, expected.as_list()) {
                (Some(a), Some(list)) => list.iter().any(|v| v.loose_eq(a)),
                _ => false,
            },
            Self::Nin => match (actual, expected.as_list()) {
                (Some(a), Some(list)) => !list.iter().any(|v| v.loose_eq(a)),
                (None, Some(_)) | (_, None) => true,
            },
            Self::Contains => match actual {
                Some(Value::List(items)) => items.iter().any(|v| v.loose_eq(expected)),
                _ => text(actual).contains(&expected.to_string()),
            },
            Self::StartsWith => text(actual).starts_with(&expected.to_string()),
            Self::EndsWith => text(actual).ends_with(&expected.to_string()),
            Self::Exists => actual.is_some_and(|a| !a.is_null()),
            Self::Empty => actual.is_none_or(Value::is_empty),
        }
    }
}

fn text(value: Option<&Value>) -> String {
    value.map(ToString::to_string).unwrap_or_default()
}

/// Numbers by value, text lexicographically; anything else is unordered.
fn order(actual: Option<&Value>, expected: &Value) -> Option<std::cmp::Ordering> {
    let actual = actual?;
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => actual.as_f64()?.partial_cmp(&expected.as_f64()?),
    }
}

/// A predicate supplied by code for `custom` conditions.
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&dyn RuleHost) -> bool + Send + Sync>);

impl Predicate {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&dyn RuleHost) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Run the predicate.
    pub fn call(&self, host: &dyn RuleHost) -> bool {
        (self.0)(host)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestHost;
    use proptest::prelude::*;

    fn parse(json: &str) -> Condition {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_documents() {
        let c = parse(r#"{"type":"variable","path":"global.gas","operator":">=","value":1}"#);
        assert!(matches!(
            c.check,
            Check::Variable {
                operator: Some(Operator::Gte),
                ..
            }
        ));
        assert!(!c.negate);
        let c = parse(r#"{"type":"location","field":"id","operator":"ne","value":"x","not":true}"#);
        assert!(c.negate);
        assert!(serde_json::from_str::<Condition>(r#"{"type":"weather"}"#).is_err());
        assert!(
            serde_json::from_str::<Condition>(r#"{"type":"variable","path":"a","operator":"~"}"#)
                .is_err()
        );
    }

    #[test]
    fn variable_comparisons() {
        let mut host = TestHost::default();
        host.set("global.gas", Value::Int(2));
        host.set("global.name", Value::from("Mia"));
        let eval = |json: &str| parse(json).evaluate(&host);

        assert!(eval(r#"{"type":"variable","path":"global.gas","operator":"gte","value":1}"#));
        assert!(eval(r#"{"type":"variable","path":"global.gas","operator":"eq","value":2.0}"#));
        assert!(!eval(r#"{"type":"variable","path":"global.gas","operator":"lt","value":2}"#));
        assert!(eval(r#"{"type":"variable","path":"global.name","operator":"startsWith","value":"Mi"}"#));
        assert!(eval(r#"{"type":"variable","path":"global.name","operator":"in","value":["Kai","Mia"]}"#));
        assert!(eval(r#"{"type":"variable","path":"global.missing","operator":"empty"}"#));
        assert!(!eval(r#"{"type":"variable","path":"global.missing","operator":"exists"}"#));
        assert!(eval(r#"{"type":"variable","path":"global.missing","operator":"ne","value":1}"#));
        assert!(!eval(r#"{"type":"variable","path":"global.gas","operator":"gt","value":"a"}"#));
        assert!(!eval(r#"{"type":"variable","path":"global.gas"}"#));
        assert!(!eval(r#"{"type":"variable","path":"global.gas","operator":"gte","value":1,"not":true}"#));
    }

    #[test]
    fn location_and_story_conditions() {
        let mut host = TestHost::default();
        host.location = Some(serde_json::from_str(r#"{"id":"mine","attributes":["dark"]}"#).unwrap());
        host.story = Some("chapter1".into());
        host.playing = true;

        assert!(parse(r#"{"type":"location","field":"id","operator":"eq","value":"mine"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"location","operator":"eq","value":"mine"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"location","field":"hasAttribute","value":"dark"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"story","field":"id","operator":"eq","value":"chapter1"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"story","field":"isPlaying","value":true}"#).evaluate(&host));
        host.playing = false;
        assert!(!parse(r#"{"type":"story","field":"isPlaying","value":true}"#).evaluate(&host));
    }

    #[test]
    fn character_health() {
        let mut host = TestHost::default();
        host.set("character.mc.hp", Value::Int(0));
        assert!(parse(r#"{"type":"character","field":"isDead"}"#).evaluate(&host));
        host.set("character.mc.health", Value::Int(5));
        assert!(!parse(r#"{"type":"character","field":"isDead"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"character","field":"hp","operator":"gt","value":3}"#).evaluate(&host));
        assert!(!parse(r#"{"type":"character","character":"ally","field":"isDead"}"#).evaluate(&host));
    }

    #[test]
    fn equipment_conditions() {
        let mut host = TestHost::default();
        host.set(
            "character.mc.equipment_slots",
            serde_json::from_str(r#"{"mask":{"id":"gasmask"},"hand":"torch"}"#).unwrap(),
        );
        assert!(parse(r#"{"type":"equipment","field":"mask","operator":"eq","value":"gasmask"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"equipment","field":"hasItem","operator":"has","value":"torch"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"equipment","field":"hasItem","operator":"not","value":"sword"}"#).evaluate(&host));
        assert!(parse(r#"{"type":"equipment","field":"feet","operator":"ne","value":"boots"}"#).evaluate(&host));
    }

    #[test]
    fn custom_predicate() {
        let mut host = TestHost::default();
        let c = Condition::new(Check::Custom(Predicate::new(|h| h.story_playing())));
        assert!(!c.evaluate(&host));
        host.playing = true;
        assert!(c.evaluate(&host));
        assert!(!c.clone().negated().evaluate(&host));
    }

    proptest! {
        #[test]
        fn numeric_order_ignores_representation(a in -1_000i64..1_000, b in -1_000i64..1_000) {
            let int = Value::Int(a);
            let float = Value::Float(b as f64);
            prop_assert_eq!(Operator::Lt.compare(Some(&int), &float), a < b);
            prop_assert_eq!(Operator::Gte.compare(Some(&int), &float), a >= b);
            prop_assert_eq!(Operator::Eq.compare(Some(&int), &float), a == b);
        }
    }
}
