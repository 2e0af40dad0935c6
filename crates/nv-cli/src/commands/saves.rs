use std::path::Path;

use comfy_table::{ContentArrangement, Table};

use nv_save::{DirSlotStore, SlotStore};

pub fn run(dir: &Path, saves: Option<&Path>) -> Result<(), String> {
    let store = DirSlotStore::new(super::saves_dir(dir, saves));
    let files = store.list_slots().map_err(|e| e.to_string())?;

    if files.is_empty() {
        println!("  No saves found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Slot", "Player", "Saved", "Story", "Step"]);

    for file in &files {
        table.add_row(vec![
            file.slot.to_string(),
            file.mc_name.clone(),
            file.timestamp_formatted.clone(),
            file.game_state.story_id.clone(),
            file.game_state.step_index.to_string(),
        ]);
    }

    println!("{table}");
    println!();
    println!("  {} saves", files.len());

    Ok(())
}
