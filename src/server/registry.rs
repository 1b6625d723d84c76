//! Routing layer from session ids to session actors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, oneshot, RwLock};

use super::session::{Mailbox, Outbound, PeerId, SessionActor, SessionCommand};

/// Tracks the running session actors.
///
/// Actors are created on first reference and remove themselves after their
/// idle timeout. Connects are delivered while holding the map lock, and an
/// actor only closes its mailbox under the write lock, so a connect is never
/// queued into a session that is shutting down.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Mailbox>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Adds `peer` to session `id`, starting the session if needed.
    ///
    /// The full state is queued on `outbound` before this returns. The
    /// returned mailbox is valid for as long as the peer stays connected.
    pub async fn connect(self: &Arc<Self>, id: &str, peer: PeerId, outbound: Outbound) -> Mailbox {
        let mut command = SessionCommand::Connect { peer, outbound };

        {
            let sessions = self.sessions.read().await;
            if let Some(mailbox) = sessions.get(id) {
                match mailbox.send(command) {
                    Ok(()) => return mailbox.clone(),
                    Err(SendError(returned)) => command = returned,
                }
            }
        }

        let mut sessions = self.sessions.write().await;
        if let Some(mailbox) = sessions.get(id) {
            match mailbox.send(command) {
                Ok(()) => return mailbox.clone(),
                Err(SendError(returned)) => {
                    tracing::warn!(session = %id, "Replacing stopped session");
                    command = returned;
                }
            }
        }

        let mut actor = SessionActor::new(id);
        actor.handle(command);

        let (mailbox, receiver) = mpsc::unbounded_channel();
        tokio::spawn(actor.run(receiver, Arc::downgrade(self), self.idle_timeout));
        sessions.insert(id.to_string(), mailbox.clone());
        tracing::info!(session = %id, "Session started");

        mailbox
    }

    /// Current text of session `id`, if it is running.
    pub async fn snapshot(&self, id: &str) -> Option<String> {
        let (reply, rx) = oneshot::channel();
        {
            let sessions = self.sessions.read().await;
            sessions
                .get(id)?
                .send(SessionCommand::Snapshot { reply })
                .ok()?;
        }
        rx.await.ok()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of running sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes session `id` unless commands are still waiting in its mailbox.
    pub(crate) async fn evict(
        &self,
        id: &str,
        mailbox: &mut mpsc::UnboundedReceiver<SessionCommand>,
    ) -> bool {
        let mut sessions = self.sessions.write().await;
        if !mailbox.is_empty() {
            return false;
        }
        mailbox.close();
        sessions.remove(id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use livesync_core::protocol::{self, MessageKind};
    use livesync_core::{Document, Update};
    use uuid::Uuid;

    fn registry(idle: Duration) -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(idle))
    }

    async fn full_state_text(rx: &mut mpsc::UnboundedReceiver<Bytes>) -> String {
        let frame = rx.recv().await.unwrap();
        let message = protocol::decode(&frame).unwrap();
        assert_eq!(message.kind, MessageKind::FullState);
        let mut doc = Document::new();
        doc.apply_encoded(&message.payload).unwrap();
        doc.text()
    }

    fn insert_payload(text: &str) -> Vec<u8> {
        let mut doc = Document::new();
        doc.local_insert(0, text).unwrap().encode().unwrap()
    }

    #[tokio::test]
    async fn test_connect_starts_session_lazily() {
        let registry = registry(Duration::from_secs(60));
        assert!(registry.is_empty().await);

        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.connect("abc123", Uuid::new_v4(), tx).await;

        assert!(registry.contains("abc123").await);
        assert_eq!(full_state_text(&mut rx).await, "");
    }

    #[tokio::test]
    async fn test_peers_in_same_session_share_updates() {
        let registry = registry(Duration::from_secs(60));
        let a = Uuid::new_v4();
        let (a_tx, mut a_rx) = mpsc::unbounded_channel();
        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        let mailbox = registry.connect("abc123", a, a_tx).await;
        registry.connect("abc123", Uuid::new_v4(), b_tx).await;
        full_state_text(&mut a_rx).await;
        full_state_text(&mut b_rx).await;

        let payload = insert_payload("shared");
        mailbox
            .send(SessionCommand::Update {
                peer: a,
                payload: payload.clone(),
            })
            .unwrap();

        let frame = b_rx.recv().await.unwrap();
        let message = protocol::decode(&frame).unwrap();
        assert_eq!(message.kind, MessageKind::Update);
        assert_eq!(
            Update::decode(&message.payload).unwrap(),
            Update::decode(&payload).unwrap()
        );
        assert_eq!(registry.snapshot("abc123").await.unwrap(), "shared");
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let registry = registry(Duration::from_secs(60));
        let a = Uuid::new_v4();
        let (a_tx, _a_rx) = mpsc::unbounded_channel();
        let mailbox = registry.connect("one", a, a_tx).await;
        mailbox
            .send(SessionCommand::Update {
                peer: a,
                payload: insert_payload("only here"),
            })
            .unwrap();

        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        registry.connect("two", Uuid::new_v4(), b_tx).await;
        assert_eq!(full_state_text(&mut b_rx).await, "");
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_idle_session_is_evicted() {
        let registry = registry(Duration::from_millis(50));
        let a = Uuid::new_v4();
        let (a_tx, _a_rx) = mpsc::unbounded_channel();
        let mailbox = registry.connect("abc123", a, a_tx).await;
        mailbox
            .send(SessionCommand::Update {
                peer: a,
                payload: insert_payload("gone soon"),
            })
            .unwrap();
        mailbox.send(SessionCommand::Disconnect { peer: a }).unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!registry.contains("abc123").await);

        let (b_tx, mut b_rx) = mpsc::unbounded_channel();
        registry.connect("abc123", Uuid::new_v4(), b_tx).await;
        assert_eq!(full_state_text(&mut b_rx).await, "");
    }

    #[tokio::test]
    async fn test_session_survives_while_peers_connected() {
        let registry = registry(Duration::from_millis(50));
        let (a_tx, _a_rx) = mpsc::unbounded_channel();
        registry.connect("abc123", Uuid::new_v4(), a_tx).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(registry.contains("abc123").await);
    }

    #[tokio::test]
    async fn test_snapshot_of_unknown_session() {
        let registry = registry(Duration::from_secs(60));
        assert_eq!(registry.snapshot("missing").await, None);
    }
}
