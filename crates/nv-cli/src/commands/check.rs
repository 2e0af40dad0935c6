use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use colored::Colorize;

use nv_core::{ContentSource, JsonDirContent};
use nv_rules::Rule;
use nv_session::{NovelConfig, RULES_FILE};

pub fn run(dir: &Path) -> Result<(), String> {
    let content = JsonDirContent::new(dir);
    let ids = content.story_unit_ids().map_err(|e| e.to_string())?;
    if ids.is_empty() {
        return Err(format!("no story units found under '{}'", dir.join("story").display()));
    }
    let known: BTreeSet<&str> = ids.iter().map(String::as_str).collect();

    let mut problems = Vec::new();
    let mut steps = 0;
    for id in &ids {
        let unit = match content.load_story_unit(id) {
            Ok(unit) => unit,
            Err(e) => {
                problems.push(e.to_string());
                continue;
            }
        };
        steps += unit.len();
        for (index, target) in unit.goto_targets() {
            if unit.label_index(target).is_none() && !known.contains(target) {
                problems.push(format!(
                    "{id} step {index}: goto target \"{target}\" is neither a label nor a unit"
                ));
            }
        }
    }

    if let Err(e) = NovelConfig::from_dir(dir) {
        problems.push(e.to_string());
    }
    let rules_path = dir.join(RULES_FILE);
    let rules_error = fs::read_to_string(&rules_path)
        .ok()
        .and_then(|text| Rule::parse_all(&text).err());
    if let Some(e) = rules_error {
        problems.push(format!("{}: {e}", rules_path.display()));
    }

    if problems.is_empty() {
        println!("  All checks passed.");
        println!("  {} story units, {steps} steps", ids.len());
        return Ok(());
    }

    for problem in &problems {
        eprintln!("  {} {problem}", "✗".red().bold());
    }
    Err(format!(
        "{} problem{} found",
        problems.len(),
        if problems.len() == 1 { "" } else { "s" }
    ))
}
