//! Execution position captured for saving and restored on load.

use nv_core::{AudioStream, CallFrame, HistoryEntry};

/// Everything about the interpreter's position that a save needs, apart
/// from the state tree itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Unit being executed.
    pub unit_id: String,
    /// Current step index.
    pub step_index: usize,
    /// Return positions, innermost last.
    pub call_stack: Vec<CallFrame>,
    /// Visible character ids, in display order.
    pub visible: Vec<String>,
    /// Current scene id.
    pub scene: Option<String>,
    /// History log. `None` asks the interpreter to rebuild it from the
    /// steps leading up to `step_index`.
    pub history: Option<Vec<HistoryEntry>>,
    /// Looping audio streams.
    pub audio: Vec<AudioStream>,
    /// Parts of the current multi-part dialogue already shown. `None` when
    /// the current step has no parts.
    pub dialogue_part: Option<usize>,
}

impl Snapshot {
    /// A snapshot positioned at the start of `unit_id`.
    pub fn at_start(unit_id: impl Into<String>) -> Self {
        Self {
            unit_id: unit_id.into(),
            step_index: 0,
            call_stack: Vec::new(),
            visible: Vec::new(),
            scene: None,
            history: None,
            audio: Vec::new(),
            dialogue_part: None,
        }
    }
}
