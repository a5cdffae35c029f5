//! Twitch emote counting bot - main binary

use clap::{Parser, Subcommand};
use emotebot_core::{Config, EmoteCounter, SessionController};
use std::path::PathBuf;
use tracing::info;

/// Twitch emote counting bot
#[derive(Parser)]
#[command(name = "emotebot")]
#[command(about = "Counts configured emotes in a Twitch chat channel")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Test configuration and exit
    #[arg(long)]
    test_config: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a default configuration file
    Config {
        /// Output file path
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli.log_level)?;

    // Handle subcommands
    if let Some(command) = cli.command {
        match command {
            Commands::Config { output } => {
                generate_config(&output)?;
                return Ok(());
            }
            Commands::Version => {
                show_version();
                return Ok(());
            }
        }
    }

    // Load configuration
    info!("Loading configuration from {:?}", cli.config);
    let config = Config::from_file(&cli.config)?;
    config.validate()?;

    if cli.test_config {
        info!("Configuration is valid");
        return Ok(());
    }

    // Build a counter per tracked emote, with a logging subscriber
    // standing in for the statistics display
    let mut counters = Vec::new();
    for token in &config.session.emotes {
        let mut counter = EmoteCounter::new(token.clone())?;
        counter.subscribe(|event| {
            info!(
                "{}: count={} queries={}",
                event.token, event.count, event.queries
            );
        });
        counters.push(counter);
    }

    info!(
        "Starting emote bot: channel {}, tracking {} emotes",
        config.session.channel,
        config.session.emotes.len()
    );

    let mut session = SessionController::new(&config, counters);
    session.start().await?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("interrupt received, shutting down"),
        _ = session.wait() => info!("session ended"),
    }

    session.stop().await;
    Ok(())
}

/// Initialize logging
fn init_logging(level: &str) -> anyhow::Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    Ok(())
}

/// Generate default configuration file
fn generate_config(output: &PathBuf) -> anyhow::Result<()> {
    let config = Config::default();
    config.to_file(output)?;
    println!("Generated default configuration file: {:?}", output);
    println!("Fill in the channel, nickname, oauth token, and emotes before running.");
    Ok(())
}

/// Show version information
fn show_version() {
    println!("emotebot {}", env!("CARGO_PKG_VERSION"));
}
