//! Bridge from the rule engine to the interpreter.

use nv_core::Value;
use nv_rules::{Notification, RuleHost};
use nv_story::{Interpreter, Status};

/// Borrows the session parts rules may read and drive during one
/// evaluation pass.
pub(crate) struct SessionHost<'a> {
    pub(crate) vn: &'a mut Interpreter,
    pub(crate) location: Option<&'a Value>,
    pub(crate) notifications: &'a mut Vec<Notification>,
}

impl RuleHost for SessionHost<'_> {
    fn read(&self, path: &str) -> Option<Value> {
        self.vn.state().read_value(path)
    }

    fn write(&mut self, path: &str, value: Value) -> bool {
        self.vn.state_mut().write(path, value)
    }

    fn current_location(&self) -> Option<Value> {
        self.location.cloned()
    }

    fn active_story(&self) -> Option<String> {
        self.vn.unit_id().map(str::to_string)
    }

    fn story_playing(&self) -> bool {
        !matches!(self.vn.status(), Status::NotStarted | Status::Completed)
    }

    fn goto_label(&mut self, target: &str) {
        if let Err(e) = self.vn.goto(target) {
            tracing::error!(target, error = %e, "rule redirect failed");
        }
    }

    fn end_story(&mut self) {
        self.vn.end_story();
    }

    fn restart_story(&mut self, unit: Option<&str>) {
        if let Err(e) = self.vn.restart_story(unit) {
            tracing::error!(unit = ?unit, error = %e, "rule restart failed");
        }
    }

    fn show_dialogue(&mut self, character: Option<&str>, text: &str) {
        self.vn.inject_dialogue(character, text);
    }

    fn notify(&mut self, notification: Notification) {
        tracing::info!(severity = %notification.severity, text = %notification.text, "notification");
        self.notifications.push(notification);
    }
}
