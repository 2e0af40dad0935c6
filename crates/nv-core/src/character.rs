use serde::{Deserialize, Serialize};

use crate::value::{Map, Value};

/// Keys of derived, visual-only character data. Readable through paths,
/// never writable and never persisted.
pub const DERIVED_KEYS: [&str; 3] = ["sprites", "equipment", "equipmentBySlot"];

/// Authored field holding the slot-name to item-reference mapping.
pub const EQUIPMENT_SLOTS: &str = "equipment_slots";

/// A character as delivered by a content source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// Authored, writable fields (name, stats, `equipment_slots`, pose...).
    pub fields: Map,
    /// Sprite layer data.
    #[serde(default)]
    pub sprites: Value,
    /// Item catalogue the slots refer to.
    #[serde(default)]
    pub equipment: Vec<Value>,
}

impl CharacterRecord {
    /// Build a record from the split layout (`values`, `body`, `equipment`).
    pub fn from_split(values: Map, body: Value, equipment: Vec<Value>) -> Self {
        Self {
            fields: values,
            sprites: body,
            equipment,
        }
    }

    /// Build a record from a single legacy document, pulling the derived
    /// keys out of the field set.
    pub fn from_legacy(mut doc: Map) -> Self {
        let sprites = doc.remove("sprites").unwrap_or_default();
        let equipment = match doc.remove("equipment") {
            Some(Value::List(items)) => items,
            _ => Vec::new(),
        };
        doc.remove("equipmentBySlot");
        Self {
            fields: doc,
            sprites,
            equipment,
        }
    }
}

/// A loaded character: authored fields plus derived visual data.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    id: String,
    fields: Map,
    derived: Map,
}

impl Character {
    /// Create a character from a content record and build its equipment index.
    pub fn from_record(id: impl Into<String>, record: CharacterRecord) -> Self {
        let mut derived = Map::new();
        derived.insert("sprites".to_string(), record.sprites);
        derived.insert("equipment".to_string(), Value::List(record.equipment));
        let mut character = Self {
            id: id.into(),
            fields: record.fields,
            derived,
        };
        character.rebuild_equipment_index();
        character
    }

    /// The character id (`mc`, `albedo`...).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, from the authored `name` field.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Authored fields.
    pub fn fields(&self) -> &Map {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map {
        &mut self.fields
    }

    /// Replace all authored fields, then rebuild derived indices.
    pub fn replace_fields(&mut self, fields: Map) {
        self.fields = fields;
        self.rebuild_equipment_index();
    }

    /// Read a derived value (`sprites`, `equipment`, `equipmentBySlot`).
    pub fn derived(&self, key: &str) -> Option<&Value> {
        self.derived.get(key)
    }

    /// The slot-name to `{ id, item, parts }` index.
    pub fn equipment_by_slot(&self) -> Option<&Map> {
        self.derived("equipmentBySlot").and_then(Value::as_map)
    }

    /// Whether any slot currently holds the item `item_id`.
    pub fn has_item(&self, item_id: &str) -> bool {
        self.fields
            .get(EQUIPMENT_SLOTS)
            .and_then(Value::as_map)
            .is_some_and(|slots| {
                slots
                    .values()
                    .any(|r| slot_item_id(r).as_deref() == Some(item_id))
            })
    }

    /// Recompute `equipmentBySlot` from `equipment_slots` and the catalogue.
    /// Slots referring to unknown items are left out.
    pub fn rebuild_equipment_index(&mut self) {
        let catalogue: Vec<&Value> = self
            .derived
            .get("equipment")
            .and_then(Value::as_list)
            .map(|items| items.iter().collect())
            .unwrap_or_default();

        let mut by_slot = Map::new();
        if let Some(slots) = self.fields.get(EQUIPMENT_SLOTS).and_then(Value::as_map) {
            for (slot, reference) in slots {
                let Some(item_id) = slot_item_id(reference) else {
                    continue;
                };
                let Some(item) = catalogue
                    .iter()
                    .find(|item| item.get("id").and_then(id_text).as_deref() == Some(item_id.as_str()))
                else {
                    continue;
                };
                let mut entry = Map::new();
                entry.insert("id".to_string(), Value::String(item_id));
                entry.insert("item".to_string(), (*item).clone());
                entry.insert(
                    "parts".to_string(),
                    item.get("parts").cloned().unwrap_or(Value::List(Vec::new())),
                );
                by_slot.insert(slot.clone(), Value::Map(entry));
            }
        }
        self.derived
            .insert("equipmentBySlot".to_string(), Value::Map(by_slot));
    }
}

/// The item id a slot reference points at. Accepts a bare id (text or
/// number), `{ id }` or `{ item: { id } }`.
pub fn slot_item_id(reference: &Value) -> Option<String> {
    match reference {
        Value::String(_) | Value::Int(_) => id_text(reference),
        Value::Map(m) => m
            .get("id")
            .and_then(id_text)
            .or_else(|| m.get("item").and_then(|i| i.get("id")).and_then(id_text)),
        _ => None,
    }
}

fn id_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Int(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> CharacterRecord {
        let doc: Map = serde_json::from_str(
            r#"{
                "name": "Ainz",
                "health": 10,
                "equipment_slots": {"mask": "m1", "hand": {"item": {"id": "s1"}}, "feet": "missing"},
                "sprites": {"base": "body.png"},
                "equipment": [
                    {"id": "m1", "parts": ["mask.png"]},
                    {"id": "s1"}
                ]
            }"#,
        )
        .unwrap();
        CharacterRecord::from_legacy(doc)
    }

    #[test]
    fn legacy_record_splits_derived_keys() {
        let r = record();
        assert!(!r.fields.contains_key("sprites"));
        assert!(!r.fields.contains_key("equipment"));
        assert_eq!(r.equipment.len(), 2);
        assert_eq!(r.sprites.get("base"), Some(&Value::from("body.png")));
    }

    #[test]
    fn equipment_index_resolves_all_reference_shapes() {
        let c = Character::from_record("mc", record());
        let by_slot = c.equipment_by_slot().unwrap();
        assert_eq!(by_slot.len(), 2);
        assert_eq!(by_slot["mask"].get("id"), Some(&Value::from("m1")));
        assert_eq!(
            by_slot["mask"].get("parts"),
            Some(&Value::List(vec![Value::from("mask.png")]))
        );
        assert_eq!(by_slot["hand"].get("parts"), Some(&Value::List(Vec::new())));
        assert!(!by_slot.contains_key("feet"));
    }

    #[test]
    fn has_item_checks_slot_references() {
        let c = Character::from_record("mc", record());
        assert!(c.has_item("s1"));
        assert!(!c.has_item("missing-item"));
        assert_eq!(c.name(), Some("Ainz"));
    }

    #[test]
    fn replacing_fields_rebuilds_index() {
        let mut c = Character::from_record("mc", record());
        let mut fields = c.fields().clone();
        fields.insert(EQUIPMENT_SLOTS.to_string(), Value::map());
        c.replace_fields(fields);
        assert!(c.equipment_by_slot().unwrap().is_empty());
    }
}
