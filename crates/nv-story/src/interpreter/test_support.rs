use nv_core::{CharacterRecord, Map, MemoryContent, SceneDescriptor, StoryUnit, Value};

use super::Interpreter;
use crate::config::StoryConfig;

/// Content with the given `(id, steps-json)` units, a `mc` character named
/// Mia, an `ally` named Kai and a `forest` scene.
pub(crate) fn content(units: &[(&str, &str)]) -> MemoryContent {
    let mut content = MemoryContent::new()
        .with_character("mc", record("Mia"))
        .with_character("ally", record("Kai"))
        .with_scene(SceneDescriptor {
            id: "forest".into(),
            fields: Map::new(),
        });
    for (id, steps) in units {
        let steps = serde_json::from_str(steps).expect("test steps parse");
        content = content.with_unit(StoryUnit::new(*id, steps));
    }
    content
}

pub(crate) fn record(name: &str) -> CharacterRecord {
    let mut fields = Map::new();
    fields.insert("name".into(), Value::from(name));
    CharacterRecord::from_split(fields, Value::Null, Vec::new())
}

/// An interpreter with `mc` loaded.
pub(crate) fn interpreter(units: &[(&str, &str)]) -> Interpreter {
    interpreter_with(units, &["mc"])
}

pub(crate) fn interpreter_with(units: &[(&str, &str)], characters: &[&str]) -> Interpreter {
    let mut vn = Interpreter::new(content(units), StoryConfig::default());
    if !characters.is_empty() {
        vn.load_characters(characters).expect("characters load");
    }
    vn
}
