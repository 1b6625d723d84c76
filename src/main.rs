use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{ConfigCommand, JoinCommand, ShareCommand};
use config::Config;

#[derive(Parser)]
#[command(name = "livesync")]
#[command(version)]
#[command(about = "Real-time collaboration on local files", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Share a file for real-time collaboration
    Share(ShareCommand),

    /// Join a shared file session
    Join(JoinCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    match cli.command {
        Commands::Share(cmd) => cmd.run(config).await?,
        Commands::Join(cmd) => cmd.run(config).await?,
        Commands::Config(cmd) => cmd.run(&config)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_join_with_relay() {
        let cli = Cli::parse_from(["livesync", "join", "abc123", "-r", "localhost:9000"]);
        match cli.command {
            Commands::Join(cmd) => {
                assert_eq!(cmd.session_id, "abc123");
                assert_eq!(cmd.filepath, None);
                assert_eq!(cmd.relay.as_deref(), Some("localhost:9000"));
            }
            _ => panic!("expected join"),
        }
    }

    #[test]
    fn test_parse_share_with_global_config() {
        let cli = Cli::parse_from(["livesync", "share", "notes.md", "-c", "/tmp/ls.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/ls.yaml")));
        match cli.command {
            Commands::Share(cmd) => assert_eq!(cmd.filepath, PathBuf::from("notes.md")),
            _ => panic!("expected share"),
        }
    }
}
