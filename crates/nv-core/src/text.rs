use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::state::StateTree;

/// A `{path}` placeholder. The innermost braces win, so in `{x {a.b}}` only
/// `{a.b}` is a placeholder.
static PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").ok());

/// Replace every `{path}` placeholder with the text form of the value at
/// that path. Placeholders that do not resolve are kept verbatim, braces
/// included.
pub fn substitute(text: &str, state: &StateTree) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return text.to_string();
    };
    re.replace_all(text, |caps: &Captures| {
        let inner = &caps[1];
        match state.read(inner.trim()) {
            Some(value) => value.to_string(),
            None => {
                tracing::debug!(placeholder = inner, "unresolved placeholder");
                caps[0].to_string()
            }
        }
    })
    .into_owned()
}
