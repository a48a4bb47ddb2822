mod bot;
mod config;
mod dispatch;
mod error;
mod eventlog;
mod platform;
mod relay;
mod update;

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::UpdateHandler;
use crate::config::Config;
use crate::eventlog::{EntryData, EventLog};
use crate::platform::telegram::TelegramApi;

#[derive(Parser)]
#[command(name = "relaybot", about = "Telegram echo and file relay bot")]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one webhook update read from a file, or stdin when omitted or `-`
    Handle { payload: Option<PathBuf> },
    /// Show event log entries, newest first
    Log {
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        per_page: usize,
        /// Truncate the log instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,relaybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        Command::Handle { payload } => handle(&config, payload).await,
        Command::Log {
            page,
            per_page,
            clear,
        } => show_log(&config, page, per_page, clear),
    }
}

async fn handle(config: &Config, payload: Option<PathBuf>) -> Result<()> {
    let body = read_payload(payload)?;

    info!("Bot API: {}", config.telegram.effective_api_url());
    let api = TelegramApi::new(&config.telegram.bot_token, config.telegram.api_url()?);
    let handler = UpdateHandler::new(Arc::new(api), config);

    handler.handle_payload(&body).await;
    Ok(())
}

fn read_payload(payload: Option<PathBuf>) -> Result<String> {
    match payload {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read payload: {}", path.display())),
        _ => {
            let mut body = String::new();
            std::io::stdin()
                .read_to_string(&mut body)
                .context("Failed to read payload from stdin")?;
            Ok(body)
        }
    }
}

fn show_log(config: &Config, page: usize, per_page: usize, clear: bool) -> Result<()> {
    let log = EventLog::open(&config.storage.log_file);

    if clear {
        log.clear()?;
        println!("Log file cleared: {}", log.path().display());
        return Ok(());
    }

    let page = log.page(page, per_page)?;
    if page.total_entries == 0 {
        println!("No log entries in {}", log.path().display());
        return Ok(());
    }

    for entry in &page.entries {
        println!(
            "[{}] {}",
            entry.timestamp.as_deref().unwrap_or("-"),
            entry.message
        );
        match &entry.data {
            Some(EntryData::Json(value)) => {
                println!("{}", serde_json::to_string_pretty(value)?)
            }
            Some(EntryData::Raw(raw)) => println!("{}", raw),
            None => {}
        }
        println!();
    }
    println!(
        "Page {} of {} ({} entries)",
        page.page,
        page.total_pages.max(1),
        page.total_entries
    );

    Ok(())
}
