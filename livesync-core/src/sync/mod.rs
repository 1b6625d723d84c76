//! Client sync sessions.
//!
//! ## Protocol
//!
//! The client talks to a relay:
//! 1. `POST /session` creates a session and returns its id (share only)
//! 2. `GET /session/{id}` upgrades to a WebSocket
//! 3. The relay sends a `FullState` message first, then `Update`s from other peers
//! 4. The client sends an `Update` for every local change
//!
//! Messages are framed by [`crate::protocol`]; payloads are CBOR-encoded
//! [`crate::crdt::Update`]s.

mod client;
mod conflict;
mod error;
mod guard;
mod relay_url;
mod watcher;

pub use client::{SessionOptions, SyncSession, DEFAULT_DEBOUNCE, DEFAULT_JOIN_TIMEOUT};
pub use conflict::{Conflict, ConflictResolver, Resolution};
pub use error::SyncError;
pub use guard::WriteGuard;
pub use relay_url::RelayUrl;
pub use watcher::FileWatcher;
