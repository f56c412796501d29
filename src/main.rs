mod aggregator;
mod client;
mod collector;
mod config;
mod extract;
mod platform;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::aggregator::Scanner;
use crate::collector::KeywordMatcher;
use crate::config::Config;
use crate::platform::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,telescan=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Input lists must load before any network contact; a missing or
    // empty file is fatal
    let chats =
        config::load_list(&config.inputs.chats_file).context("Failed to load the chat list")?;
    let keywords = config::load_list(&config.inputs.keywords_file)
        .context("Failed to load the keyword list")?;

    info!("Configuration loaded successfully");
    info!("  Chats: {}", chats.len());
    info!("  Keywords: {}", keywords.len());
    info!("  Lookback: {} hours", config.scan.lookback_hours);
    info!(
        "  Dedup: per-user={}, cross-chat={}",
        config.scan.per_user_dedup, config.scan.cross_chat_dedup
    );

    let telegram = TelegramClient::connect(&config.telegram).await?;
    let scanner = Scanner::new(telegram, config.scan.clone(), config.retry.clone());

    // Per-chat failures are handled inside the scan; once connected the
    // run always completes and exits zero
    let run_result = run_scan(&scanner, &chats, &keywords, &config).await;

    // Save the session on all paths after a successful connect
    if let Err(e) = scanner.into_client().disconnect() {
        warn!("Failed to disconnect cleanly: {:#}", e);
    }

    run_result
}

async fn run_scan(
    scanner: &Scanner<TelegramClient>,
    chats: &[String],
    keywords: &[String],
    config: &Config,
) -> Result<()> {
    let messages = scanner.run(chats, keywords).await?;

    let matcher = KeywordMatcher::new(keywords)?;
    report::write_report(&config.output.report_file, &messages, &matcher)?;
    info!(
        "Wrote {} message blocks to {}",
        messages.len(),
        config.output.report_file.display()
    );

    Ok(())
}
