use std::path::Path;

use nv_save::{DirSlotStore, SlotStore};

pub fn run(dir: &Path, saves: Option<&Path>, slot: u32) -> Result<(), String> {
    let mut store = DirSlotStore::new(super::saves_dir(dir, saves));
    store.delete_slot(slot).map_err(|e| e.to_string())?;
    println!("  Deleted save slot {slot}.");
    Ok(())
}
