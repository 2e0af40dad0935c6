//! Delta save codec.
//!
//! Character records are large and mostly static, so a save stores only the
//! fields that differ from a baseline captured when the content was loaded.
//! Restoring reloads the records from content and layers the delta on top.

use std::collections::{BTreeMap, BTreeSet};

use nv_core::{DERIVED_KEYS, Map, StateTree, Value, slot_item_id};
use nv_story::{Interpreter, Snapshot, Status};

use crate::error::{SaveError, SaveResult};
use crate::markup::compact_history;
use crate::record::{SaveRecord, VisibleCharacter};

const EQUIPMENT_SLOTS_KEY: &str = "equipment_slots";

/// Captures baselines and converts between interpreters and save records.
#[derive(Debug, Clone, Default)]
pub struct SaveCodec {
    baselines: BTreeMap<String, Map>,
}

impl SaveCodec {
    /// Create a codec without baselines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the authored fields of every character that has no baseline
    /// yet. Call right after content is loaded, before play mutates state.
    pub fn capture_baseline(&mut self, state: &StateTree) {
        for (id, character) in state.characters() {
            if self.baselines.contains_key(id) {
                continue;
            }
            let fields = authored_fields(character.fields());
            tracing::debug!(character = %id, fields = fields.len(), "baseline captured");
            self.baselines.insert(id.clone(), fields);
        }
    }

    /// Forget all baselines, e.g. before loading different content.
    pub fn clear_baselines(&mut self) {
        self.baselines.clear();
    }

    /// Captured baseline of one character.
    pub fn baseline(&self, id: &str) -> Option<&Map> {
        self.baselines.get(id)
    }

    /// Build a record of the interpreter's position and state.
    pub fn serialize(&self, vn: &Interpreter) -> SaveResult<SaveRecord> {
        let snapshot = vn.snapshot()?;
        let state = vn.state();

        let visible_characters = snapshot
            .visible
            .iter()
            .filter_map(|id| state.character(id))
            .map(|c| VisibleCharacter::from_fields(c.id(), c.fields()))
            .collect();

        let audio_streams = snapshot
            .audio
            .into_iter()
            .filter(|s| s.looping)
            .map(|s| (s.id.clone(), s))
            .collect();

        let record = SaveRecord {
            story_id: snapshot.unit_id,
            step_index: snapshot.step_index,
            call_stack: snapshot.call_stack,
            global_data: state.global().clone(),
            character_data_delta: self.delta(state),
            visible_characters,
            current_scene: snapshot.scene,
            history: snapshot.history.as_ref().map(compact_history),
            audio_streams,
            dialogue_part: snapshot.dialogue_part,
        };
        ensure_serializable(&record)?;
        tracing::info!(
            unit = %record.story_id,
            step = record.step_index,
            characters = record.character_data_delta.len(),
            "game state serialized"
        );
        Ok(record)
    }

    /// Per character, the authored fields that differ from the baseline.
    /// Characters without a baseline are skipped.
    pub fn delta(&self, state: &StateTree) -> BTreeMap<String, Map> {
        let mut out = BTreeMap::new();
        for (id, character) in state.characters() {
            let Some(baseline) = self.baselines.get(id) else {
                continue;
            };
            let current = authored_fields(character.fields());
            let changed: Map = current
                .into_iter()
                .filter(|(key, value)| baseline.get(key) != Some(value))
                .collect();
            if !changed.is_empty() {
                out.insert(id.clone(), changed);
            }
        }
        out
    }

    /// Put the interpreter back where `record` left it.
    ///
    /// Characters are reloaded from content and the stored delta is applied
    /// on top, then the interpreter resumes at the stored position.
    pub fn restore(&mut self, record: SaveRecord, vn: &mut Interpreter) -> SaveResult<Status> {
        ensure_serializable(&record)?;

        let roster: BTreeSet<String> = vn
            .state()
            .characters()
            .keys()
            .chain(self.baselines.keys())
            .chain(record.character_data_delta.keys())
            .cloned()
            .collect();
        vn.load_characters(&roster)?;
        self.capture_baseline(vn.state());

        let state = vn.state_mut();
        for (id, delta) in record.character_data_delta {
            let Some(character) = state.character_mut(&id) else {
                tracing::warn!(character = %id, "saved character no longer exists");
                continue;
            };
            let mut fields = character.fields().clone();
            fields.extend(delta);
            character.replace_fields(fields);
        }
        for display in &record.visible_characters {
            if let Some(character) = state.character_mut(&display.id) {
                let mut fields = character.fields().clone();
                for (key, value) in display.display_fields() {
                    fields.insert(key.to_string(), value.clone());
                }
                character.replace_fields(fields);
            }
        }
        state.set_global(record.global_data);

        let audio = record
            .audio_streams
            .into_iter()
            .filter(|(_, s)| s.looping)
            .map(|(id, mut stream)| {
                stream.id = id;
                stream
            })
            .collect();

        let snapshot = Snapshot {
            unit_id: record.story_id,
            step_index: record.step_index,
            call_stack: record.call_stack,
            visible: record
                .visible_characters
                .into_iter()
                .map(|v| v.id)
                .collect(),
            scene: record.current_scene,
            history: record.history,
            audio,
            dialogue_part: record.dialogue_part,
        };
        tracing::info!(unit = %snapshot.unit_id, step = snapshot.step_index, "restoring game state");
        Ok(vn.resume_from(snapshot)?)
    }
}

/// Authored fields prepared for comparison: derived keys removed and
/// equipment slot references collapsed to item ids.
fn authored_fields(fields: &Map) -> Map {
    fields
        .iter()
        .filter(|(key, _)| !DERIVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| {
            let value = if key == EQUIPMENT_SLOTS_KEY {
                sanitize_slots(value)
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

fn sanitize_slots(slots: &Value) -> Value {
    match slots.as_map() {
        Some(map) => Value::Map(
            map.iter()
                .map(|(slot, reference)| {
                    let id = match reference {
                        Value::Map(_) => slot_item_id(reference).map(Value::String),
                        _ => None,
                    };
                    (slot.clone(), id.unwrap_or_else(|| reference.clone()))
                })
                .collect(),
        ),
        None => slots.clone(),
    }
}

fn ensure_serializable(record: &SaveRecord) -> SaveResult<()> {
    match record.find_non_serializable() {
        Some(path) => {
            tracing::error!(%path, "save state is not serializable");
            Err(SaveError::NonSerializable { path })
        }
        None => Ok(()),
    }
}
