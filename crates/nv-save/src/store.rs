//! Save slot storage.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SaveError, SaveResult};
use crate::record::SaveFile;

/// Durable storage keyed by slot number.
pub trait SlotStore {
    /// Store `file` in its slot, replacing whatever the slot held.
    fn write_slot(&mut self, file: &SaveFile) -> SaveResult<()>;

    /// Read the save in `slot`.
    fn read_slot(&self, slot: u32) -> SaveResult<SaveFile>;

    /// The latest save of every slot, ordered by slot.
    fn list_slots(&self) -> SaveResult<Vec<SaveFile>>;

    /// Empty `slot`.
    fn delete_slot(&mut self, slot: u32) -> SaveResult<()>;
}

/// Slots kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySlotStore {
    slots: BTreeMap<u32, SaveFile>,
}

impl MemorySlotStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlotStore {
    fn write_slot(&mut self, file: &SaveFile) -> SaveResult<()> {
        ensure_serializable(file)?;
        self.slots.insert(file.slot, file.clone());
        Ok(())
    }

    fn read_slot(&self, slot: u32) -> SaveResult<SaveFile> {
        self.slots
            .get(&slot)
            .cloned()
            .ok_or(SaveError::SlotNotFound(slot))
    }

    fn list_slots(&self) -> SaveResult<Vec<SaveFile>> {
        Ok(self.slots.values().cloned().collect())
    }

    fn delete_slot(&mut self, slot: u32) -> SaveResult<()> {
        self.slots
            .remove(&slot)
            .map(|_| ())
            .ok_or(SaveError::SlotNotFound(slot))
    }
}

/// Slots stored as pretty-printed JSON files named
/// `{slot}_{mcName}_{YYYY-MM-DD_HHMMSS}.json`.
#[derive(Debug, Clone)]
pub struct DirSlotStore {
    dir: PathBuf,
}

impl DirSlotStore {
    /// Store saves under `dir`, created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The save directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save files in the directory, with the slot parsed from the name.
    fn slot_files(&self) -> SaveResult<Vec<(u32, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SaveError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SaveError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let slot = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(slot_from_file_name);
            match slot {
                Some(slot) => files.push((slot, path)),
                None => tracing::warn!(file = %path.display(), "file does not match the save name pattern"),
            }
        }
        files.sort();
        Ok(files)
    }

    /// Latest parsable save per slot.
    fn latest_by_slot(&self) -> SaveResult<BTreeMap<u32, SaveFile>> {
        let mut latest: BTreeMap<u32, SaveFile> = BTreeMap::new();
        for (slot, path) in self.slot_files()? {
            let mut file = match read_file(&path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping unreadable save");
                    continue;
                }
            };
            file.slot = slot;
            let newer = latest
                .get(&slot)
                .is_none_or(|current| file.timestamp > current.timestamp);
            if newer {
                latest.insert(slot, file);
            }
        }
        Ok(latest)
    }

    /// Remove every file of `slot` except `keep`.
    fn remove_slot_files(&self, slot: u32, keep: Option<&Path>) -> SaveResult<usize> {
        let mut removed = 0;
        let stale = self
            .slot_files()?
            .into_iter()
            .filter(|(s, path)| *s == slot && keep != Some(path.as_path()));
        for (_, path) in stale {
            fs::remove_file(&path).map_err(|source| SaveError::Io {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(file = %path.display(), "removed save file");
            removed += 1;
        }
        Ok(removed)
    }
}

impl SlotStore for DirSlotStore {
    fn write_slot(&mut self, file: &SaveFile) -> SaveResult<()> {
        ensure_serializable(file)?;
        let json = serde_json::to_string_pretty(file).map_err(|source| SaveError::Format {
            path: self.dir.join(file.file_name()),
            source,
        })?;
        fs::create_dir_all(&self.dir).map_err(|source| SaveError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.dir.join(file.file_name());
        fs::write(&path, json).map_err(|source| SaveError::Io {
            path: path.clone(),
            source,
        })?;
        // Older files of the slot go only once the new one is on disk.
        self.remove_slot_files(file.slot, Some(&path))?;
        tracing::info!(slot = file.slot, file = %path.display(), "game saved");
        Ok(())
    }

    fn read_slot(&self, slot: u32) -> SaveResult<SaveFile> {
        let mut latest = self.latest_by_slot()?;
        latest.remove(&slot).ok_or(SaveError::SlotNotFound(slot))
    }

    fn list_slots(&self) -> SaveResult<Vec<SaveFile>> {
        Ok(self.latest_by_slot()?.into_values().collect())
    }

    fn delete_slot(&mut self, slot: u32) -> SaveResult<()> {
        match self.remove_slot_files(slot, None)? {
            0 => Err(SaveError::SlotNotFound(slot)),
            n => {
                tracing::info!(slot, files = n, "save deleted");
                Ok(())
            }
        }
    }
}

/// Slot number from a `{slot}_...` file name.
fn slot_from_file_name(name: &str) -> Option<u32> {
    let (slot, _) = name.split_once('_')?;
    slot.parse().ok()
}

fn read_file(path: &Path) -> SaveResult<SaveFile> {
    let text = fs::read_to_string(path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| SaveError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_serializable(file: &SaveFile) -> SaveResult<()> {
    match file.game_state.find_non_serializable() {
        Some(path) => Err(SaveError::NonSerializable {
            path: format!("gameState.{path}"),
        }),
        None => Ok(()),
    }
}
