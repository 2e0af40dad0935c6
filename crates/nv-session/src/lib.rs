//! Host facade for Novella.
//!
//! [`NovelSession`] ties an interpreter to a rule engine, a save codec and a
//! slot store, and keeps rules in step with the story.

/// Session configuration.
pub mod config;
/// Error types.
pub mod error;
mod host;
/// The session facade.
pub mod session;

pub use config::{CONFIG_FILE, NovelConfig};
pub use error::{SessionError, SessionResult};
pub use session::{NovelSession, RULES_FILE};
