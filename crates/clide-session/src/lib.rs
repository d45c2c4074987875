//! `clide-session` - Translation-unit session cache for editor code completion.
//!
//! This crate keeps parsed representations of source files warm across an
//! editing session and answers completion queries against them:
//!
//! - **Session Manager**: `open`/`save`/`close`/`find_completions` entry points
//! - **Session Table**: concurrent map from file identity to session entry
//! - **Session Entry**: one parsed unit plus its pin count and closing flag
//! - **Backend**: the parsing collaborator that produces and updates units
//!
//! # Locking
//!
//! The table lock guards structural changes only (insert, unlink). Each entry
//! carries its own reader/writer lock around the parsed unit, so a reparse of
//! one file never blocks a completion query on another. Locks are always
//! taken table first, and no call holds two entry locks at once.
//!
//! # Example
//!
//! ```no_run
//! use clide_session::{CompileArgs, SessionManager};
//! # fn demo<B: clide_session::Backend>(backend: B) -> Result<(), clide_session::SessionError> {
//! let sessions = SessionManager::new(backend, CompileArgs::new(["-std=c++17"]));
//! sessions.open("src/main.cpp")?;
//! let items = sessions.find_completions("src/main.cpp", 17, 7, "int main() { p. }")?;
//! for item in items {
//!     println!("{} {}", item.kind.tag(), item.label);
//! }
//! sessions.close("src/main.cpp")?;
//! sessions.shutdown();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]

mod backend;
mod buffer;
mod candidate;
mod entry;
mod error;
mod file_id;
mod manager;
mod table;
#[cfg(test)]
mod test_support;
pub mod trigger;
mod unit;

pub use backend::{Backend, CompileArgs};
pub use buffer::BufferSnapshot;
pub use candidate::{BackendCandidate, Completion, CompletionChunk, CompletionKind, CursorKind};
pub use error::{BackendError, SessionError};
pub use file_id::FileId;
pub use manager::{SessionManager, SessionStats};
pub use trigger::{TriggerError, TriggerMatcher};
