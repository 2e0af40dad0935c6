//! Core types for Novella: the state tree, path resolution, text substitution,
//! audio streams, the history log and the story-unit model.
//!
//! This crate knows nothing about how steps are executed. The interpreter in
//! `nv-story`, the save codec in `nv-save` and the rule engine in `nv-rules`
//! all operate on the [`StateTree`] defined here.

/// Audio stream registry.
pub mod audio;
/// Character records and the derived equipment index.
pub mod character;
/// Content sources: story units, characters and scenes.
pub mod content;
/// Error types used throughout the crate.
pub mod error;
/// Bounded history log of rendered text.
pub mod history;
/// Dotted path parsing.
pub mod path;
/// The mutable state tree and its path resolver.
pub mod state;
/// Story units and the closed set of step kinds.
pub mod story;
/// `{path}` placeholder substitution.
pub mod text;
/// JSON-shaped state values.
pub mod value;

pub use audio::{AudioRegistry, AudioSignal, AudioStream, StreamKind};
pub use character::{Character, CharacterRecord, DERIVED_KEYS, EQUIPMENT_SLOTS, slot_item_id};
pub use content::{ContentKind, ContentSource, JsonDirContent, MemoryContent, SceneDescriptor};
pub use error::{CoreError, CoreResult};
pub use history::{DEFAULT_HISTORY_LIMIT, History, HistoryEntry, HistoryKind};
pub use path::{Path, Segment};
pub use state::{PathHandle, Root, StateTree};
pub use story::{
    AudioCue, CallFrame, ChoiceAction, ChoiceOption, ChoiceStep, Dialogue, DialoguePart, Step,
    StepKind, StoryUnit, Titles,
};
pub use text::substitute;
pub use value::{Map, Value};
