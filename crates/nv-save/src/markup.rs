//! Cleanup of renderer markup left in history text.

use std::sync::LazyLock;

use nv_core::HistoryEntry;
use regex::Regex;

/// Scoped-style and framework-internal attributes a renderer may have left in
/// rendered text: `data-v-1a2b3c4d="..."`, bare `data-v-1a2b3c4d` and `__v...`.
static RENDERER_ATTRS: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\s*(?:data-v-[a-f0-9]{0,8}(?:="[^"]*"|[^\s>]*)|__v[a-zA-Z0-9]*[^\s>]*)"#).ok()
});

/// Remove renderer-only attributes from `text`.
pub fn strip_presentation_markup(text: &str) -> String {
    match RENDERER_ATTRS.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

/// History as stored in a save: no origin step, no renderer markup.
/// Empty speakers are already omitted by the entry's serializer.
pub fn compact_history<'a>(entries: impl IntoIterator<Item = &'a HistoryEntry>) -> Vec<HistoryEntry> {
    entries
        .into_iter()
        .map(|entry| HistoryEntry {
            text: strip_presentation_markup(&entry.text),
            origin_step: None,
            ..entry.clone()
        })
        .collect()
}
