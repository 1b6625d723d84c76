use clap::Args;
use livesync_core::{RelayUrl, SyncSession};
use std::path::PathBuf;

use super::{run_until_interrupted, EDITOR_TIP};
use crate::config::Config;

#[derive(Args)]
pub struct ShareCommand {
    /// File to share
    pub filepath: PathBuf,

    /// Relay server URL
    #[arg(long, short)]
    pub relay: Option<String>,
}

impl ShareCommand {
    pub async fn run(&self, config: Config) -> Result<(), Box<dyn std::error::Error>> {
        let config = config.with_relay_flag(self.relay.as_deref());
        let relay = RelayUrl::new(&config.relay_url.value);
        let path = std::path::absolute(&self.filepath)?;

        println!("{}", EDITOR_TIP);
        println!();

        let session = SyncSession::share(&path, &relay, config.session_options())
            .await
            .map_err(|e| format!("Failed to share: {}", e))?;

        println!("Sharing {}", self.filepath.display());
        println!("Session: {}", session.session_id());
        println!();
        println!("Others can join with:");
        println!("  livesync join {}", session.session_id());
        println!();
        println!("Press Ctrl+C to stop sharing.");

        run_until_interrupted(session, "Stopped sharing.").await?;
        Ok(())
    }
}
