//! Replicated text engine.
//!
//! A [`Document`] is a sequence of characters, each tagged with a unique
//! [`Id`] and kept (as a tombstone) after deletion. Local edits return the
//! [`Update`] they produced; the caller decides where to send it.
//!
//! # Usage
//!
//! ```
//! use livesync_core::crdt::Document;
//!
//! let mut alice = Document::new();
//! let update = alice.local_insert(0, "hello").unwrap();
//!
//! let mut bob = Document::new();
//! bob.apply_update(&update);
//! assert_eq!(bob.text(), "hello");
//! ```

mod document;
mod id;
mod update;

use thiserror::Error;

pub use document::{Document, MAX_PENDING_DELETES};
pub use id::{Id, ReplicaId};
pub use update::{DeleteRun, InsertRun, Update, MAX_COUNTER, MAX_DELETE_RUN};

/// Errors raised by the text engine.
#[derive(Debug, Error)]
pub enum CrdtError {
    /// A visible position past the end of the document.
    #[error("Position {position} is out of bounds (document length {len})")]
    OutOfBounds { position: usize, len: usize },

    /// The local Lamport clock has no room left for new characters.
    #[error("Lamport clock exhausted")]
    ClockExhausted,

    #[error("Failed to encode update: {0}")]
    Encode(String),

    #[error("Failed to decode update: {0}")]
    Decode(String),
}
