use std::collections::BTreeMap;

use nv_core::Value;

use crate::action::Notification;
use crate::host::RuleHost;

/// Story operations recorded by [`TestHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    Goto(String),
    End,
    Restart(Option<String>),
    Dialogue(Option<String>, String),
}

/// A host whose state is a flat map of full paths.
#[derive(Debug, Default)]
pub(crate) struct TestHost {
    values: BTreeMap<String, Value>,
    pub(crate) location: Option<Value>,
    pub(crate) story: Option<String>,
    pub(crate) playing: bool,
    pub(crate) calls: Vec<HostCall>,
    pub(crate) notifications: Vec<Notification>,
}

impl TestHost {
    pub(crate) fn set(&mut self, path: &str, value: Value) {
        self.values.insert(path.to_string(), value);
    }
}

impl RuleHost for TestHost {
    fn read(&self, path: &str) -> Option<Value> {
        self.values.get(path).cloned()
    }

    fn write(&mut self, path: &str, value: Value) -> bool {
        self.set(path, value);
        true
    }

    fn current_location(&self) -> Option<Value> {
        self.location.clone()
    }

    fn active_story(&self) -> Option<String> {
        self.story.clone()
    }

    fn story_playing(&self) -> bool {
        self.playing
    }

    fn goto_label(&mut self, target: &str) {
        self.calls.push(HostCall::Goto(target.to_string()));
    }

    fn end_story(&mut self) {
        self.calls.push(HostCall::End);
    }

    fn restart_story(&mut self, unit: Option<&str>) {
        self.calls.push(HostCall::Restart(unit.map(str::to_string)));
    }

    fn show_dialogue(&mut self, character: Option<&str>, text: &str) {
        self.calls
            .push(HostCall::Dialogue(character.map(str::to_string), text.to_string()));
    }

    fn notify(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }
}
