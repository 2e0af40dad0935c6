//! The persisted save document.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use nv_core::{AudioStream, CallFrame, HistoryEntry, Map, Value};
use serde::{Deserialize, Serialize};

/// Display fields copied between visible characters and save records.
pub const DISPLAY_FIELDS: [&str; 5] = ["position", "orientation", "back", "customClass", "scale"];

fn default_story_id() -> String {
    "start".to_string()
}

/// Execution position and state delta for one save.
///
/// Story unit bodies and character baselines are never stored; both are
/// reloaded from content by id on restore.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecord {
    /// Unit being executed.
    #[serde(default = "default_story_id")]
    pub story_id: String,
    /// Current step index.
    #[serde(default)]
    pub step_index: usize,
    /// Return positions, innermost last.
    #[serde(default)]
    pub call_stack: Vec<CallFrame>,
    /// The whole `global` namespace.
    #[serde(default)]
    pub global_data: Map,
    /// Per character, the fields that differ from the content baseline.
    #[serde(default)]
    pub character_data_delta: BTreeMap<String, Map>,
    /// Visible characters with their display fields.
    #[serde(default)]
    pub visible_characters: Vec<VisibleCharacter>,
    /// Current scene id.
    #[serde(default)]
    pub current_scene: Option<String>,
    /// Compacted history. Older saves without it get a rebuilt log.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    /// Looping audio streams keyed by stream id.
    #[serde(default)]
    pub audio_streams: BTreeMap<String, AudioStream>,
    /// Parts of a multi-part dialogue already shown at the saved step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialogue_part: Option<usize>,
}

impl SaveRecord {
    /// Dotted path of the first value JSON cannot represent.
    pub fn find_non_serializable(&self) -> Option<String> {
        if let Some(path) = Value::Map(self.global_data.clone()).non_finite_path("globalData") {
            return Some(path);
        }
        for (id, delta) in &self.character_data_delta {
            let prefix = format!("characterDataDelta.{id}");
            if let Some(path) = Value::Map(delta.clone()).non_finite_path(&prefix) {
                return Some(path);
            }
        }
        self.visible_characters
            .iter()
            .enumerate()
            .find_map(|(i, v)| v.non_finite_path(&format!("visibleCharacters[{i}]")))
    }
}

/// A visible character's display projection.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleCharacter {
    /// Character id.
    pub id: String,
    /// Stage position.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub position: Value,
    /// Facing.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub orientation: Value,
    /// Drawn behind other characters.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub back: Value,
    /// Extra style class.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub custom_class: Value,
    /// Sprite scale.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub scale: Value,
}

impl VisibleCharacter {
    /// Project the display fields out of a character's fields.
    pub fn from_fields(id: impl Into<String>, fields: &Map) -> Self {
        let field = |key: &str| fields.get(key).cloned().unwrap_or_default();
        Self {
            id: id.into(),
            position: field("position"),
            orientation: field("orientation"),
            back: field("back"),
            custom_class: field("customClass"),
            scale: field("scale"),
        }
    }

    /// Display fields that are set, keyed by their field name.
    pub fn display_fields(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        DISPLAY_FIELDS
            .into_iter()
            .zip([
                &self.position,
                &self.orientation,
                &self.back,
                &self.custom_class,
                &self.scale,
            ])
            .filter(|(_, v)| !v.is_null())
    }

    fn non_finite_path(&self, prefix: &str) -> Option<String> {
        self.display_fields()
            .find_map(|(key, v)| v.non_finite_path(&format!("{prefix}.{key}")))
    }
}

/// A save slot file: the record plus listing metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveFile {
    /// Slot number.
    pub slot: u32,
    /// Save time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Save time as `YYYY-MM-DD_HHMMSS`.
    pub timestamp_formatted: String,
    /// Name of the main character, for listings.
    pub mc_name: String,
    /// The saved game.
    pub game_state: SaveRecord,
}

impl SaveFile {
    /// Wrap a record for `slot`, stamped with `now`. A blank name is stored
    /// as `Unknown`.
    pub fn new(slot: u32, mc_name: &str, game_state: SaveRecord, now: DateTime<Utc>) -> Self {
        let mc_name = if mc_name.trim().is_empty() {
            "Unknown".to_string()
        } else {
            mc_name.to_string()
        };
        Self {
            slot,
            timestamp: now.timestamp_millis(),
            timestamp_formatted: now.format("%Y-%m-%d_%H%M%S").to_string(),
            mc_name,
            game_state,
        }
    }

    /// File name used by directory stores.
    pub fn file_name(&self) -> String {
        let name: String = self
            .mc_name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '-' })
            .collect();
        format!("{}_{}_{}.json", self.slot, name, self.timestamp_formatted)
    }

    /// Save time, when representable.
    pub fn saved_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_uses_camel_case_keys() {
        let record = SaveRecord {
            story_id: "start".into(),
            ..SaveRecord::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        for key in [
            "storyId",
            "stepIndex",
            "callStack",
            "globalData",
            "characterDataDelta",
            "visibleCharacters",
            "currentScene",
            "audioStreams",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("history").is_none());
    }

    #[test]
    fn old_record_defaults_story_and_history() {
        let record: SaveRecord = serde_json::from_str(r#"{"stepIndex":3}"#).unwrap();
        assert_eq!(record.story_id, "start");
        assert_eq!(record.step_index, 3);
        assert!(record.history.is_none());
    }

    #[test]
    fn non_finite_values_are_located() {
        let mut record = SaveRecord::default();
        let mut stats = Map::new();
        stats.insert("hp".into(), Value::Float(f64::NAN));
        record.character_data_delta.insert("mc".into(), stats);
        assert_eq!(
            record.find_non_serializable().as_deref(),
            Some("characterDataDelta.mc.hp")
        );

        record.character_data_delta.clear();
        record.visible_characters.push(VisibleCharacter {
            id: "mc".into(),
            scale: Value::Float(f64::INFINITY),
            ..VisibleCharacter::default()
        });
        assert_eq!(
            record.find_non_serializable().as_deref(),
            Some("visibleCharacters[0].scale")
        );
    }

    #[test]
    fn projection_reads_display_fields_only() {
        let mut fields = Map::new();
        fields.insert("position".into(), Value::from("left"));
        fields.insert("hp".into(), Value::Int(3));
        let v = VisibleCharacter::from_fields("mc", &fields);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, serde_json::json!({"id": "mc", "position": "left"}));
    }

    #[test]
    fn save_file_metadata() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 2).unwrap();
        let file = SaveFile::new(2, " ", SaveRecord::default(), now);
        assert_eq!(file.mc_name, "Unknown");
        assert_eq!(file.timestamp_formatted, "2025-03-09_070502");
        assert_eq!(file.file_name(), "2_Unknown_2025-03-09_070502.json");
        assert_eq!(file.saved_at(), Some(now));

        let file = SaveFile::new(1, "Mia/../x", SaveRecord::default(), now);
        assert_eq!(file.file_name(), "1_Mia----x_2025-03-09_070502.json");
    }
}
