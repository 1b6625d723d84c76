//! Client side of a collaboration session.
//!
//! A [`SyncSession`] binds one file, one local [`Document`] replica and one
//! WebSocket connection to the relay:
//!
//! 1. `share` creates a session on the relay and seeds it with the file;
//!    `join` waits for the session's full state and reconciles it with the
//!    local file.
//! 2. A background task then merges remote updates into the document (writing
//!    the file) and turns local file changes into updates for the relay.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;
use tokio::task::{block_in_place, JoinHandle};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::conflict::{Conflict, ConflictResolver, Resolution};
use super::error::SyncError;
use super::guard::WriteGuard;
use super::relay_url::RelayUrl;
use super::watcher::FileWatcher;
use crate::crdt::{Document, Update};
use crate::diff::apply_text_diff;
use crate::protocol::{self, Message, MessageKind, SessionCreated};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default quiet period before a file change is acted on.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);
/// Default bound on waiting for the relay's initial state.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub debounce: Duration,
    pub join_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            join_timeout: DEFAULT_JOIN_TIMEOUT,
        }
    }
}

/// A running collaboration on one file.
#[derive(Debug)]
pub struct SyncSession {
    session_id: String,
    path: PathBuf,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), SyncError>>>,
}

impl SyncSession {
    /// Shares `path` in a new session on `relay`.
    pub async fn share(
        path: impl AsRef<Path>,
        relay: &RelayUrl,
        options: SessionOptions,
    ) -> Result<Self, SyncError> {
        let path = path.as_ref().to_path_buf();
        // Armed before the read so that no edit slips between the two.
        let watcher = FileWatcher::new(&path, options.debounce)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SyncError::Io(path.clone(), e))?;

        let session_id = create_session(relay).await?;
        let mut ws = connect(relay, &session_id).await?;

        let mut doc = Document::new();
        if let Some(update) = apply_text_diff(&mut doc, &content)? {
            send_update(&mut ws, &update).await?;
        }
        tracing::info!(
            session = %session_id,
            chars = doc.len(),
            "Seeded session from {}",
            path.display()
        );

        let worker = Worker {
            doc,
            path: path.clone(),
            guard: WriteGuard::new(),
            ws,
            watcher,
        };

        Ok(Self::spawn(session_id, path, worker))
    }

    /// Joins the existing session `session_id`, syncing it into `path`.
    ///
    /// If `path` already exists with different content, `resolver` decides
    /// which side wins.
    pub async fn join<R: ConflictResolver>(
        session_id: &str,
        path: impl AsRef<Path>,
        relay: &RelayUrl,
        options: SessionOptions,
        resolver: &mut R,
    ) -> Result<Self, SyncError> {
        let path = path.as_ref().to_path_buf();
        let mut ws = connect(relay, session_id).await?;

        let mut doc = Document::new();
        timeout(options.join_timeout, await_full_state(&mut ws, &mut doc))
            .await
            .map_err(|_| SyncError::JoinTimeout)??;

        let watcher = FileWatcher::new(&path, options.debounce)?;
        let remote = doc.text();
        if let Some(local) = read_existing(&path).await? {
            if local != remote {
                let conflict = Conflict {
                    path: &path,
                    local: &local,
                    remote: &remote,
                };
                match resolve_off_runtime(resolver, &conflict)? {
                    Resolution::Local => {
                        tracing::info!("Keeping local content of {}", path.display());
                        if let Some(update) = apply_text_diff(&mut doc, &local)? {
                            send_update(&mut ws, &update).await?;
                        }
                    }
                    Resolution::Remote => {
                        tracing::info!("Replacing {} with session content", path.display());
                    }
                }
            }
        }

        let mut guard = WriteGuard::new();
        write_file(&path, &doc.text(), &mut guard).await?;

        let worker = Worker {
            doc,
            path: path.clone(),
            guard,
            ws,
            watcher,
        };

        Ok(Self::spawn(session_id.to_string(), path, worker))
    }

    fn spawn(session_id: String, path: PathBuf, worker: Worker) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(worker.run(stop_rx));
        Self {
            session_id,
            path,
            stop_tx: Some(stop_tx),
            task: Some(task),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Waits until the session ends on its own, e.g. because the relay went
    /// away. Returns immediately if it has already ended.
    pub async fn wait(&mut self) -> Result<(), SyncError> {
        match self.task.as_mut() {
            Some(task) => {
                let result = task.await;
                self.task = None;
                flatten(result)
            }
            None => Ok(()),
        }
    }

    /// Closes the connection and the file watch. No messages are processed
    /// afterwards.
    pub async fn stop(mut self) -> Result<(), SyncError> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        match self.task.take() {
            Some(task) => flatten(task.await),
            None => Ok(()),
        }
    }
}

fn flatten(result: Result<Result<(), SyncError>, tokio::task::JoinError>) -> Result<(), SyncError> {
    result.unwrap_or_else(|e| Err(SyncError::WebSocket(format!("Session task failed: {}", e))))
}

/// State owned by the background task.
struct Worker {
    doc: Document,
    path: PathBuf,
    guard: WriteGuard,
    ws: WsStream,
    watcher: FileWatcher,
}

impl Worker {
    async fn run(mut self, mut stop: oneshot::Receiver<()>) -> Result<(), SyncError> {
        loop {
            tokio::select! {
                _ = &mut stop => {
                    tracing::debug!("Stopping session for {}", self.path.display());
                    let _ = self.ws.close(None).await;
                    return Ok(());
                }
                msg = self.ws.next() => match msg {
                    Some(Ok(WsMessage::Binary(data))) => self.handle_frame(&data).await?,
                    Some(Ok(WsMessage::Ping(data))) => {
                        self.ws
                            .send(WsMessage::Pong(data))
                            .await
                            .map_err(|e| SyncError::WebSocket(e.to_string()))?;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return Err(SyncError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {
                        // Text and pong frames carry nothing for us
                    }
                    Some(Err(e)) => return Err(SyncError::WebSocket(e.to_string())),
                },
                changed = self.watcher.changed() => match changed {
                    Some(()) => self.handle_file_change().await?,
                    None => return Err(SyncError::Watch("File watcher stopped".to_string())),
                },
            }
        }
    }

    /// Merges a relay message and writes the file if the text changed.
    async fn handle_frame(&mut self, data: &[u8]) -> Result<(), SyncError> {
        let message = match protocol::decode(data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Dropping frame from relay: {}", e);
                return Ok(());
            }
        };

        let update = match Update::decode(&message.payload) {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!("Dropping {:?} message: {}", message.kind, e);
                return Ok(());
            }
        };

        if self.doc.apply_update(&update) {
            tracing::debug!(kind = ?message.kind, "Merged remote changes");
            write_file(&self.path, &self.doc.text(), &mut self.guard).await?;
        }

        Ok(())
    }

    /// Diffs the file against the document and forwards the resulting update.
    async fn handle_file_change(&mut self) -> Result<(), SyncError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                // Likely mid-write; the next notification retries.
                tracing::warn!("Skipping change to {}: {}", self.path.display(), e);
                return Ok(());
            }
        };

        if self.guard.is_own_write(&content) {
            return Ok(());
        }

        if let Some(update) = apply_text_diff(&mut self.doc, &content)? {
            tracing::debug!("Sending local changes to relay");
            send_update(&mut self.ws, &update).await?;
        }

        Ok(())
    }
}

/// Runs a resolver that may block on the operator. On a multi-threaded
/// runtime the worker thread is handed over first so other tasks keep running.
fn resolve_off_runtime<R: ConflictResolver>(
    resolver: &mut R,
    conflict: &Conflict<'_>,
) -> Result<Resolution, SyncError> {
    match Handle::current().runtime_flavor() {
        RuntimeFlavor::MultiThread => block_in_place(|| resolver.resolve(conflict)),
        _ => resolver.resolve(conflict),
    }
}

async fn create_session(relay: &RelayUrl) -> Result<String, SyncError> {
    let response = reqwest::Client::new()
        .post(relay.bootstrap_url())
        .send()
        .await
        .map_err(|e| SyncError::Bootstrap(e.to_string()))?;

    if !response.status().is_success() {
        return Err(SyncError::Bootstrap(format!(
            "Relay returned status {}",
            response.status()
        )));
    }

    let created: SessionCreated = response
        .json()
        .await
        .map_err(|e| SyncError::Bootstrap(e.to_string()))?;

    Ok(created.session_id)
}

async fn connect(relay: &RelayUrl, session_id: &str) -> Result<WsStream, SyncError> {
    let url = relay.session_url(session_id);
    let (ws, _) = connect_async(&url)
        .await
        .map_err(|e| SyncError::Connection(e.to_string()))?;
    tracing::info!("Connected to {}", url);
    Ok(ws)
}

/// Reads messages until the relay's `FullState` has been merged.
async fn await_full_state(ws: &mut WsStream, doc: &mut Document) -> Result<(), SyncError> {
    while let Some(msg) = ws.next().await {
        match msg {
            Ok(WsMessage::Binary(data)) => match protocol::decode(&data) {
                Ok(Message {
                    kind: MessageKind::FullState,
                    payload,
                }) => {
                    doc.apply_encoded(&payload)?;
                    return Ok(());
                }
                Ok(Message {
                    kind: MessageKind::Update,
                    payload,
                }) => {
                    // Merging is order-independent, so an early update is harmless.
                    doc.apply_encoded(&payload)?;
                }
                Err(e) => tracing::warn!("Dropping frame from relay: {}", e),
            },
            Ok(WsMessage::Ping(data)) => {
                ws.send(WsMessage::Pong(data))
                    .await
                    .map_err(|e| SyncError::WebSocket(e.to_string()))?;
            }
            Ok(WsMessage::Close(_)) => return Err(SyncError::ConnectionClosed),
            Ok(_) => {}
            Err(e) => return Err(SyncError::WebSocket(e.to_string())),
        }
    }

    Err(SyncError::ConnectionClosed)
}

async fn send_update(ws: &mut WsStream, update: &Update) -> Result<(), SyncError> {
    if update.is_empty() {
        return Ok(());
    }
    let frame = Message::update(update.encode()?).encode();
    ws.send(WsMessage::Binary(frame.into()))
        .await
        .map_err(|e| SyncError::WebSocket(e.to_string()))
}

/// Reads `path`, returning `None` if it does not exist.
async fn read_existing(path: &Path) -> Result<Option<String>, SyncError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::Io(path.to_path_buf(), e)),
    }
}

/// Writes `content`, arming the guard first so the echo is ignored.
async fn write_file(path: &Path, content: &str, guard: &mut WriteGuard) -> Result<(), SyncError> {
    let generation = guard.arm(content);
    tokio::fs::write(path, content)
        .await
        .map_err(|e| SyncError::Io(path.to_path_buf(), e))?;
    tracing::debug!(generation, "Wrote {}", path.display());
    Ok(())
}
