//! Join-time reconciliation between a local file and the session document.

use std::path::Path;

use super::error::SyncError;

/// The local file and the session document disagree.
#[derive(Debug)]
pub struct Conflict<'a> {
    pub path: &'a Path,
    pub local: &'a str,
    pub remote: &'a str,
}

/// Which side wins a join conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overwrite the local file with the session text.
    Remote,
    /// Push the local file's content into the session.
    Local,
}

impl Resolution {
    /// Interprets an operator answer: anything starting with `l` keeps local.
    pub fn from_answer(answer: &str) -> Self {
        if answer.trim().to_lowercase().starts_with('l') {
            Resolution::Local
        } else {
            Resolution::Remote
        }
    }
}

/// Decides join conflicts. Blocking is expected: it waits on the operator.
///
/// `resolve` runs on the thread that polls `SyncSession::join`. On a
/// multi-threaded runtime that thread is taken out of the worker pool for the
/// duration of the call; on a current-thread runtime every other task waits.
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &Conflict<'_>) -> Result<Resolution, SyncError>;
}

/// A fixed answer, for non-interactive use.
impl ConflictResolver for Resolution {
    fn resolve(&mut self, _conflict: &Conflict<'_>) -> Result<Resolution, SyncError> {
        Ok(*self)
    }
}
