//! LiveSync relay and client binaries.
//!
//! The relay lives in [`server`]; everything shared with clients is in
//! `livesync_core`.

pub mod server;
