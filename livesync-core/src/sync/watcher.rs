//! Debounced notifications for changes to a single file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::error::SyncError;

/// Watches one file and yields a notification once it settles after a change.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by writing a temporary file and renaming it over the
/// original are still seen.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
    /// A change was seen but has not settled yet.
    pending: bool,
}

impl FileWatcher {
    pub fn new(path: &Path, debounce: Duration) -> Result<Self, SyncError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name: Option<OsString> = path.file_name().map(|n| n.to_os_string());

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if ours {
                    let _ = tx.send(());
                }
            }
            Err(e) => tracing::warn!("File watch error: {}", e),
        })
        .map_err(|e| SyncError::Watch(e.to_string()))?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| SyncError::Watch(format!("{}: {}", dir.display(), e)))?;

        tracing::debug!("Watching {} for changes", path.display());

        Ok(Self {
            _watcher: watcher,
            events,
            debounce,
            pending: false,
        })
    }

    /// Waits until the file has changed and then stayed quiet for the debounce
    /// window. Returns `None` if the watcher has shut down.
    ///
    /// Cancel-safe: a change seen before cancellation is reported by the next
    /// call.
    pub async fn changed(&mut self) -> Option<()> {
        if !self.pending {
            self.events.recv().await?;
            self.pending = true;
        }

        loop {
            match tokio::time::timeout(self.debounce, self.events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return None,
                Err(_) => {
                    self.pending = false;
                    return Some(());
                }
            }
        }
    }
}
