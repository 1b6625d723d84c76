use clap::Args;
use livesync_core::{RelayUrl, SyncSession};
use std::path::PathBuf;

use super::{run_until_interrupted, PromptResolver, EDITOR_TIP};
use crate::config::Config;

#[derive(Args)]
pub struct JoinCommand {
    /// Session id printed by `livesync share`
    pub session_id: String,

    /// File to sync into (default: <session-id>.md)
    pub filepath: Option<PathBuf>,

    /// Relay server URL
    #[arg(long, short)]
    pub relay: Option<String>,
}

impl JoinCommand {
    /// Target file, defaulting to `<session-id>.md` in the working directory.
    pub fn target(&self) -> PathBuf {
        self.filepath
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.md", self.session_id)))
    }

    pub async fn run(&self, config: Config) -> Result<(), Box<dyn std::error::Error>> {
        let config = config.with_relay_flag(self.relay.as_deref());
        let relay = RelayUrl::new(&config.relay_url.value);
        let file = self.target();
        let path = std::path::absolute(&file)?;

        println!("{}", EDITOR_TIP);
        println!();

        let mut resolver = PromptResolver::stdio();
        let session = SyncSession::join(
            &self.session_id,
            &path,
            &relay,
            config.session_options(),
            &mut resolver,
        )
        .await
        .map_err(|e| format!("Failed to join: {}", e))?;

        println!("Joined session {}", self.session_id);
        println!("Syncing to {}", file.display());
        println!();
        println!("Press Ctrl+C to stop.");

        run_until_interrupted(session, "Disconnected.").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_target_uses_session_id() {
        let cmd = JoinCommand {
            session_id: "abc123".to_string(),
            filepath: None,
            relay: None,
        };
        assert_eq!(cmd.target(), PathBuf::from("abc123.md"));
    }

    #[test]
    fn test_explicit_target() {
        let cmd = JoinCommand {
            session_id: "abc123".to_string(),
            filepath: Some(PathBuf::from("notes/todo.md")),
            relay: None,
        };
        assert_eq!(cmd.target(), PathBuf::from("notes/todo.md"));
    }
}
