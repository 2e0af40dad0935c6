pub mod check;
pub mod delete;
pub mod play;
pub mod saves;

use std::path::{Path, PathBuf};

use nv_core::JsonDirContent;
use nv_save::DirSlotStore;
use nv_session::{NovelConfig, NovelSession};

/// The save directory: `--saves`, else `<dir>/saves`.
fn saves_dir(dir: &Path, saves: Option<&Path>) -> PathBuf {
    saves.map_or_else(|| dir.join("saves"), Path::to_path_buf)
}

/// Open a session over a content directory, with its `novel.json` and
/// `rules.json` applied.
fn open_session(dir: &Path, saves: Option<&Path>) -> Result<NovelSession, String> {
    if !dir.is_dir() {
        return Err(format!("content directory '{}' does not exist", dir.display()));
    }
    let config = NovelConfig::from_dir(dir).map_err(|e| e.to_string())?;
    let mut session = NovelSession::new(
        JsonDirContent::new(dir),
        DirSlotStore::new(saves_dir(dir, saves)),
        config,
    );
    session.load_rules_file(dir).map_err(|e| e.to_string())?;
    Ok(session)
}
