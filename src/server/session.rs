//! Session actor.
//!
//! Each session is owned by one task that holds the authoritative document
//! and the set of connected peers. Commands arrive through a single mailbox,
//! so a peer's full state is always queued before any update it could miss.

use std::collections::HashMap;
use std::sync::Weak;
use std::time::Duration;

use axum::body::Bytes;
use livesync_core::protocol::{self, MessageKind};
use livesync_core::{Document, Update};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use super::registry::SessionRegistry;

/// Identifies one WebSocket connection.
pub type PeerId = Uuid;

/// Queue of encoded frames for one peer, drained by its writer task.
pub type Outbound = mpsc::UnboundedSender<Bytes>;

/// Sending side of a session's mailbox.
pub type Mailbox = mpsc::UnboundedSender<SessionCommand>;

/// Commands understood by a session actor.
#[derive(Debug)]
pub enum SessionCommand {
    /// A peer joined. The full state is queued to it before it is added.
    Connect { peer: PeerId, outbound: Outbound },
    /// An encoded update payload sent by `peer`.
    Update { peer: PeerId, payload: Vec<u8> },
    /// A peer's connection ended.
    Disconnect { peer: PeerId },
    /// Current visible text of the session document.
    Snapshot { reply: oneshot::Sender<String> },
}

/// State owned by the session task.
pub struct SessionActor {
    id: String,
    doc: Document,
    peers: HashMap<PeerId, Outbound>,
}

impl SessionActor {
    /// Creates a session with an empty document.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc: Document::new(),
            peers: HashMap::new(),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn text(&self) -> String {
        self.doc.text()
    }

    /// Processes one command.
    pub fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Connect { peer, outbound } => self.connect(peer, outbound),
            SessionCommand::Update { peer, payload } => self.relay_update(peer, &payload),
            SessionCommand::Disconnect { peer } => {
                if self.peers.remove(&peer).is_some() {
                    tracing::info!(
                        session = %self.id,
                        %peer,
                        peers = self.peers.len(),
                        "Peer disconnected"
                    );
                }
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.doc.text());
            }
        }
    }

    fn connect(&mut self, peer: PeerId, outbound: Outbound) {
        let state = match self.doc.encode_full_state() {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(session = %self.id, %peer, "Failed to encode full state: {}", e);
                return;
            }
        };

        let frame = Bytes::from(protocol::encode(MessageKind::FullState, &state));
        if outbound.send(frame).is_err() {
            tracing::debug!(session = %self.id, %peer, "Peer left before receiving state");
            return;
        }

        self.peers.insert(peer, outbound);
        tracing::info!(
            session = %self.id,
            %peer,
            peers = self.peers.len(),
            "Peer connected"
        );
    }

    /// Merges the update and forwards the same payload to every other peer.
    fn relay_update(&mut self, from: PeerId, payload: &[u8]) {
        let update = match Update::decode(payload) {
            Ok(update) => update,
            Err(e) => {
                tracing::warn!(session = %self.id, peer = %from, "Dropping update: {}", e);
                return;
            }
        };
        self.doc.apply_update(&update);

        let frame = Bytes::from(protocol::encode(MessageKind::Update, payload));
        let mut delivered = 0;
        for (peer, outbound) in &self.peers {
            // A closed queue means a Disconnect is already on its way.
            if *peer != from && outbound.send(frame.clone()).is_ok() {
                delivered += 1;
            }
        }
        tracing::debug!(session = %self.id, peer = %from, delivered, "Relayed update");
    }

    /// Runs the actor until it is evicted after `idle_timeout` without peers.
    pub async fn run(
        mut self,
        mut mailbox: mpsc::UnboundedReceiver<SessionCommand>,
        registry: Weak<SessionRegistry>,
        idle_timeout: Duration,
    ) {
        loop {
            let command = if self.peers.is_empty() {
                match tokio::time::timeout(idle_timeout, mailbox.recv()).await {
                    Ok(command) => command,
                    Err(_) => {
                        let evicted = match registry.upgrade() {
                            Some(registry) => registry.evict(&self.id, &mut mailbox).await,
                            None => true,
                        };
                        if evicted {
                            tracing::info!(session = %self.id, "Session idle, dropping document");
                            return;
                        }
                        continue;
                    }
                }
            } else {
                mailbox.recv().await
            };

            match command {
                Some(command) => self.handle(command),
                None => return,
            }
        }
    }
}
