//! What the engine needs from the game it watches.

use nv_core::Value;

use crate::action::Notification;

/// Game-side operations available to conditions and actions.
///
/// Reads and writes go through the same state tree the interpreter uses;
/// story operations redirect the interpreter.
pub trait RuleHost {
    /// Read a state path.
    fn read(&self, path: &str) -> Option<Value>;

    /// Write a state path. Returns whether the path resolved.
    fn write(&mut self, path: &str, value: Value) -> bool;

    /// Where the player is: a location id, or a map with `id` and
    /// `attributes`.
    fn current_location(&self) -> Option<Value>;

    /// Id of the story unit being played.
    fn active_story(&self) -> Option<String>;

    /// Whether a story is being played (as opposed to a menu).
    fn story_playing(&self) -> bool;

    /// Redirect the interpreter to a label or unit.
    fn goto_label(&mut self, target: &str);

    /// End the story session.
    fn end_story(&mut self);

    /// Restart a unit, or the current one.
    fn restart_story(&mut self, unit: Option<&str>);

    /// Show a one-off line.
    fn show_dialogue(&mut self, character: Option<&str>, text: &str);

    /// Show a notification to the player.
    fn notify(&mut self, notification: Notification);
}
