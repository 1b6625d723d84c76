mod config_cmd;
mod join;
mod prompt;
mod share;

pub use config_cmd::ConfigCommand;
pub use join::JoinCommand;
pub use prompt::PromptResolver;
pub use share::ShareCommand;

use livesync_core::{SyncError, SyncSession};

pub(crate) const EDITOR_TIP: &str = "Tip: Make sure your editor auto-reloads files changed on disk.";

/// Runs `session` until Ctrl-C, then stops it and prints `farewell`.
///
/// Returns the session's error if it ends on its own first.
pub(crate) async fn run_until_interrupted(
    mut session: SyncSession,
    farewell: &str,
) -> Result<(), SyncError> {
    tokio::select! {
        result = session.wait() => {
            result?;
            return Err(SyncError::ConnectionClosed);
        }
        _ = interrupted() => {}
    }

    session.stop().await?;
    println!("\n{}", farewell);
    Ok(())
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
