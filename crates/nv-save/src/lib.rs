//! Saving and loading Novella games.
//!
//! [`SaveCodec`] turns an interpreter into a [`SaveRecord`] holding only what
//! changed since the content was loaded, and back. [`SlotStore`]s persist
//! records wrapped in [`SaveFile`]s.

/// Delta encoding against content baselines.
pub mod codec;
/// Error types.
pub mod error;
/// History text cleanup.
pub mod markup;
/// Persisted documents.
pub mod record;
/// Slot storage.
pub mod store;

pub use codec::SaveCodec;
pub use error::{SaveError, SaveResult};
pub use markup::{compact_history, strip_presentation_markup};
pub use record::{DISPLAY_FIELDS, SaveFile, SaveRecord, VisibleCharacter};
pub use store::{DirSlotStore, MemorySlotStore, SlotStore};
