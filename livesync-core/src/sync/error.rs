//! Sync error types.

use std::path::PathBuf;

use crate::crdt::CrdtError;
use crate::protocol::ProtocolError;

/// Errors that can occur while sharing or joining a session.
#[derive(Debug)]
pub enum SyncError {
    /// Reading or writing the synced file failed
    Io(PathBuf, std::io::Error),
    /// Session bootstrap request failed
    Bootstrap(String),
    /// Failed to connect to the relay
    Connection(String),
    /// WebSocket error on an open connection
    WebSocket(String),
    /// Malformed frame
    Protocol(ProtocolError),
    /// Text engine error
    Crdt(CrdtError),
    /// Relay did not send the initial state in time
    JoinTimeout,
    /// Relay closed the connection
    ConnectionClosed,
    /// File watch could not be set up
    Watch(String),
    /// Operator input could not be read
    Prompt(String),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::Io(path, e) => write!(f, "I/O error for {}: {}", path.display(), e),
            SyncError::Bootstrap(e) => write!(f, "Failed to create session: {}", e),
            SyncError::Connection(e) => write!(f, "Connection error: {}", e),
            SyncError::WebSocket(e) => write!(f, "WebSocket error: {}", e),
            SyncError::Protocol(e) => write!(f, "Protocol error: {}", e),
            SyncError::Crdt(e) => write!(f, "Document error: {}", e),
            SyncError::JoinTimeout => write!(f, "Timed out waiting for session state from relay"),
            SyncError::ConnectionClosed => write!(f, "Relay closed the connection"),
            SyncError::Watch(e) => write!(f, "File watch error: {}", e),
            SyncError::Prompt(e) => write!(f, "Failed to read answer: {}", e),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Io(_, e) => Some(e),
            SyncError::Protocol(e) => Some(e),
            SyncError::Crdt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CrdtError> for SyncError {
    fn from(e: CrdtError) -> Self {
        SyncError::Crdt(e)
    }
}

impl From<ProtocolError> for SyncError {
    fn from(e: ProtocolError) -> Self {
        SyncError::Protocol(e)
    }
}
