//! HTTP and WebSocket surface of the relay.
//!
//! # Endpoints
//!
//! - `GET /`: Landing page
//! - `GET /health`: Health check
//! - `POST /session`: Create a session id, returns `{"sessionId": "..."}`
//! - `GET /session/{id}`: WebSocket connection to session `id`

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, Method, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use livesync_core::protocol::{self, MessageKind};
use livesync_core::SessionCreated;
use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use super::registry::SessionRegistry;
use super::session::SessionCommand;

const SESSION_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SESSION_ID_LEN: usize = 6;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(registry: SessionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Builds the relay router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(landing))
        .route("/health", get(health))
        .route("/session", post(create_session))
        .route("/session/{id}", get(session_socket))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Random six-character session id.
pub fn generate_session_id() -> String {
    let mut rng = rand::rng();
    (0..SESSION_ID_LEN)
        .map(|_| SESSION_ID_ALPHABET[rng.random_range(0..SESSION_ID_ALPHABET.len())] as char)
        .collect()
}

/// Session ids are non-empty lowercase ASCII alphanumerics.
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn landing() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn create_session() -> Json<SessionCreated> {
    let session_id = generate_session_id();
    tracing::debug!(session = %session_id, "Issued session id");
    Json(SessionCreated { session_id })
}

async fn session_socket(
    Path(id): Path<String>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !is_valid_session_id(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, id, state.registry)),
        Err(_) => (StatusCode::BAD_REQUEST, "Expected WebSocket").into_response(),
    }
}

/// Pumps one peer's connection into its session until either side closes.
async fn handle_socket(socket: WebSocket, session_id: String, registry: Arc<SessionRegistry>) {
    let peer = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (outbound, mut queue) = mpsc::unbounded_channel::<Bytes>();

    let mailbox = registry.connect(&session_id, peer, outbound).await;

    // The session drops our queue on Disconnect, which ends this task.
    let writer = tokio::spawn(async move {
        while let Some(frame) = queue.recv().await {
            if sink.send(Message::Binary(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Binary(data)) => match protocol::decode(&data) {
                Ok(message) if message.kind == MessageKind::Update => {
                    let command = SessionCommand::Update {
                        peer,
                        payload: message.payload,
                    };
                    if mailbox.send(command).is_err() {
                        break;
                    }
                }
                Ok(message) => {
                    tracing::debug!(session = %session_id, %peer, kind = ?message.kind, "Ignoring message");
                }
                Err(e) => {
                    tracing::warn!(session = %session_id, %peer, "Dropping frame: {}", e);
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session = %session_id, %peer, "WebSocket error: {}", e);
                break;
            }
        }
    }

    let _ = mailbox.send(SessionCommand::Disconnect { peer });
    let _ = writer.await;
}

const LANDING_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>LiveSync Relay</title>
</head>
<body>
  <h1>LiveSync Relay</h1>
  <p>This relay forwards edits between LiveSync clients collaborating on local files.</p>
  <pre><code># Share a file
livesync share notes.md

# On another machine, join with the session id
livesync join abc123</code></pre>
  <ul>
    <li><code>POST /session</code>: create a session</li>
    <li><code>GET /session/{id}</code>: connect via WebSocket</li>
  </ul>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState::new(SessionRegistry::new(Duration::from_secs(60))))
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..100 {
            let id = generate_session_id();
            assert_eq!(id.len(), 6);
            assert!(is_valid_session_id(&id), "invalid id {}", id);
        }
    }

    #[test]
    fn test_session_id_validation() {
        assert!(is_valid_session_id("abc123"));
        assert!(is_valid_session_id("a"));
        assert!(!is_valid_session_id(""));
        assert!(!is_valid_session_id("ABC123"));
        assert!(!is_valid_session_id("abc-12"));
        assert!(!is_valid_session_id("../etc"));
    }

    #[tokio::test]
    async fn test_create_session_returns_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let created: SessionCreated = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(is_valid_session_id(&created.session_id));
        assert_eq!(created.session_id.len(), 6);
    }

    #[tokio::test]
    async fn test_session_without_upgrade_is_bad_request() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/session/abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Expected WebSocket");
    }

    #[tokio::test]
    async fn test_invalid_session_id_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/session/ABC")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let response = app()
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_landing_page() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("LiveSync Relay"));
    }
}
