//! LiveSync Relay
//!
//! Relays edits between clients sharing a text file. Each session keeps the
//! merged document in memory so late joiners start from the current state.
//!
//! # Configuration
//!
//! Environment variables:
//! - `LIVESYNC_HOST`: Address to bind (default: 0.0.0.0)
//! - `LIVESYNC_PORT`: Port to listen on (default: 8787)
//! - `LIVESYNC_SESSION_IDLE_SECS`: Seconds before an empty session is dropped (default: 600)
//! - `RUST_LOG`: Log filter (default: livesync=info,tower_http=info)

use livesync::server::{router, AppState, RelayConfig, SessionRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livesync=info,livesync_relay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RelayConfig::from_env();
    tracing::info!(
        "Sessions idle for {}s are dropped",
        config.session_idle_timeout.as_secs()
    );

    let state = AppState::new(SessionRegistry::new(config.session_idle_timeout));
    let app = router(state);

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Starting relay on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
