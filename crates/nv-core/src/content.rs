use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::character::CharacterRecord;
use crate::error::{CoreError, CoreResult};
use crate::story::StoryUnit;
use crate::value::Map;

/// Which kind of external record a load refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// A story unit.
    StoryUnit,
    /// A character record.
    Character,
    /// A scene record.
    Scene,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoryUnit => write!(f, "story unit"),
            Self::Character => write!(f, "character"),
            Self::Scene => write!(f, "scene"),
        }
    }
}

/// A backdrop record. Only the id matters to the core; the rest is passed
/// through to the renderer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// Scene id; single-file scenes default it to the file name.
    #[serde(default)]
    pub id: String,
    /// Renderer fields (background, music hints...).
    #[serde(flatten)]
    pub fields: Map,
}

/// Read access to authored content.
pub trait ContentSource {
    /// Load a story unit by id.
    fn load_story_unit(&self, id: &str) -> CoreResult<StoryUnit>;

    /// Load a character record by id.
    fn load_character(&self, id: &str) -> CoreResult<CharacterRecord>;

    /// Load a scene record by id.
    fn load_scene(&self, id: &str) -> CoreResult<SceneDescriptor>;

    /// Ids of every story unit the source can enumerate.
    fn story_unit_ids(&self) -> CoreResult<Vec<String>> {
        Ok(Vec::new())
    }
}

/// In-memory content, built up with `with_*` calls.
#[derive(Debug, Clone, Default)]
pub struct MemoryContent {
    units: HashMap<String, StoryUnit>,
    characters: HashMap<String, CharacterRecord>,
    scenes: HashMap<String, SceneDescriptor>,
}

impl MemoryContent {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a story unit under its own id.
    pub fn with_unit(mut self, unit: StoryUnit) -> Self {
        self.units.insert(unit.id.clone(), unit);
        self
    }

    /// Add a character record.
    pub fn with_character(mut self, id: impl Into<String>, record: CharacterRecord) -> Self {
        self.characters.insert(id.into(), record);
        self
    }

    /// Add a scene.
    pub fn with_scene(mut self, scene: SceneDescriptor) -> Self {
        self.scenes.insert(scene.id.clone(), scene);
        self
    }
}

impl ContentSource for MemoryContent {
    fn load_story_unit(&self, id: &str) -> CoreResult<StoryUnit> {
        self.units
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(ContentKind::StoryUnit, id))
    }

    fn load_character(&self, id: &str) -> CoreResult<CharacterRecord> {
        self.characters
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(ContentKind::Character, id))
    }

    fn load_scene(&self, id: &str) -> CoreResult<SceneDescriptor> {
        self.scenes
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(ContentKind::Scene, id))
    }

    fn story_unit_ids(&self) -> CoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.units.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Content stored as JSON files under one directory:
///
/// ```text
/// <root>/story/<id>.json
/// <root>/characters/<id>/values.json, body.json, equipment.json
/// <root>/characters/<id>.json            (legacy single file)
/// <root>/scenes/scenes.json              ({ "scenes": [...] })
/// <root>/scenes/<id>.json
/// ```
#[derive(Debug, Clone)]
pub struct JsonDirContent {
    root: PathBuf,
}

#[derive(Deserialize)]
struct SceneList {
    #[serde(default)]
    scenes: Vec<SceneDescriptor>,
}

impl JsonDirContent {
    /// Read content from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The content directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn checked_path(&self, kind: ContentKind, id: &str, parts: &[&str]) -> CoreResult<PathBuf> {
        let relative: PathBuf = parts.iter().collect();
        let escapes = id.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(not_found(kind, id));
        }
        Ok(self.root.join(relative))
    }
}

impl ContentSource for JsonDirContent {
    fn load_story_unit(&self, id: &str) -> CoreResult<StoryUnit> {
        let file = format!("{id}.json");
        let path = self.checked_path(ContentKind::StoryUnit, id, &["story", &file])?;
        let mut unit: StoryUnit = read_json(ContentKind::StoryUnit, id, &path)?;
        if unit.id.is_empty() {
            unit.id = id.to_string();
        }
        tracing::info!(unit = id, steps = unit.len(), "loaded story unit");
        Ok(unit)
    }

    fn load_character(&self, id: &str) -> CoreResult<CharacterRecord> {
        let kind = ContentKind::Character;
        let dir = self.checked_path(kind, id, &["characters", id])?;
        let values_path = dir.join("values.json");
        if values_path.is_file() {
            let values: Map = read_json(kind, id, &values_path)?;
            let body = read_optional(kind, id, &dir.join("body.json"))?.unwrap_or_default();
            let equipment =
                read_optional(kind, id, &dir.join("equipment.json"))?.unwrap_or_default();
            tracing::debug!(character = id, "loaded split character record");
            return Ok(CharacterRecord::from_split(values, body, equipment));
        }

        let file = format!("{id}.json");
        let legacy = self.checked_path(kind, id, &["characters", &file])?;
        let doc: Map = read_json(kind, id, &legacy)?;
        tracing::debug!(character = id, "loaded legacy character record");
        Ok(CharacterRecord::from_legacy(doc))
    }

    fn load_scene(&self, id: &str) -> CoreResult<SceneDescriptor> {
        let kind = ContentKind::Scene;
        let file = format!("{id}.json");
        let single = self.checked_path(kind, id, &["scenes", &file])?;
        if let Some(mut scene) = read_optional::<SceneDescriptor>(kind, id, &single)? {
            if scene.id.is_empty() {
                scene.id = id.to_string();
            }
            return Ok(scene);
        }

        let list_path = self.root.join("scenes").join("scenes.json");
        let list: Option<SceneList> = read_optional(kind, id, &list_path)?;
        list.and_then(|l| l.scenes.into_iter().find(|s| s.id == id))
            .ok_or_else(|| not_found(kind, id))
    }

    fn story_unit_ids(&self) -> CoreResult<Vec<String>> {
        let story_dir = self.root.join("story");
        let mut ids = Vec::new();
        if story_dir.is_dir() {
            collect_unit_ids(&story_dir, &story_dir, &mut ids)?;
        }
        ids.sort();
        Ok(ids)
    }
}

fn collect_unit_ids(base: &Path, dir: &Path, out: &mut Vec<String>) -> CoreResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| CoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| CoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_unit_ids(base, &path, out)?;
        } else if path.extension().is_some_and(|e| e == "json") {
            let Ok(relative) = path.with_extension("").strip_prefix(base).map(Path::to_path_buf)
            else {
                continue;
            };
            let id: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            out.push(id.join("/"));
        }
    }
    Ok(())
}

fn not_found(kind: ContentKind, id: &str) -> CoreError {
    CoreError::ContentNotFound {
        kind,
        id: id.to_string(),
    }
}

fn read_json<T: DeserializeOwned>(kind: ContentKind, id: &str, path: &Path) -> CoreResult<T> {
    read_optional(kind, id, path)?.ok_or_else(|| not_found(kind, id))
}

fn read_optional<T: DeserializeOwned>(
    kind: ContentKind,
    id: &str,
    path: &Path,
) -> CoreResult<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CoreError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| CoreError::MalformedContent {
            kind,
            id: id.to_string(),
            reason: e.to_string(),
        })
}
