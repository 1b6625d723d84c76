//! Relay server: session registry, per-session actors and the HTTP surface.

pub mod config;
pub mod registry;
pub mod routes;
pub mod session;

pub use config::RelayConfig;
pub use registry::SessionRegistry;
pub use routes::{router, AppState};
pub use session::{PeerId, SessionActor, SessionCommand};
