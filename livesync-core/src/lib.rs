//! LiveSync Core Library
//!
//! Convergent plain-text synchronization: the replicated text engine, the
//! snapshot diff translator, the wire protocol and the client session that
//! ties them to a file and a relay connection.

pub mod crdt;
pub mod diff;
pub mod protocol;
pub mod sync;

pub use crdt::{CrdtError, Document, Id, ReplicaId, Update};
pub use diff::{apply_text_diff, compute_ops, DiffOp};
pub use protocol::{Message, MessageKind, ProtocolError, SessionCreated};
pub use sync::{
    Conflict, ConflictResolver, RelayUrl, Resolution, SessionOptions, SyncError, SyncSession,
};
