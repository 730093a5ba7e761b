//! tabicache - command-line driver for the offline trip cache.
//!
//! Runs one command against the local store: sync from the remote source,
//! warm the offline page cache, look up the exchange rate, inspect sync
//! status or guide content, or reset the store to its seed data.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tabicache_core::auth::CredentialStore;
use tabicache_core::cache::{CohortCount, WarmOutcome};
use tabicache_core::store::age_display;
use tabicache_core::sync::SyncTable;
use tabicache_core::{Config, NetworkStatus, TripClient};

/// Log file prefix inside the data directory
const LOG_FILE_PREFIX: &str = "tabicache.log";

/// Initialize the tracing subscriber for logging.
/// Logs go to stderr and to a daily-rotated file in the data directory.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter)
        .init();

    guard
}

fn format_count(count: CohortCount) -> String {
    format!("{}/{}", count.cached, count.total)
}

#[derive(Parser, Debug)]
#[command(name = "tabicache", version, about = "Offline trip cache driver")]
struct Cli {
    /// Treat the network as offline for this run
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pull all tables from the sync source, then warm the page cache
    Sync,
    /// Warm the offline page cache
    Warm,
    /// Show the USD/JPY exchange rate
    Rate,
    /// Convert dollars to yen at the current rate
    Convert {
        #[arg(value_name = "USD")]
        usd: f64,
    },
    /// Show per-table sync status
    Status,
    /// Resolve a label to tour guide content
    Content { label: String, category: String },
    /// Store the sync API key in the OS keychain
    Login {
        api_key: String,
        /// Also save this sync source URL to the config file
        #[arg(long)]
        sync_url: Option<String>,
    },
    /// Remove the sync API key from the OS keychain
    Logout,
    /// Delete all local data and reseed
    Reset,
}

impl Command {
    /// Name for logging; never includes arguments.
    fn name(&self) -> &'static str {
        match self {
            Command::Sync => "sync",
            Command::Warm => "warm",
            Command::Rate => "rate",
            Command::Convert { .. } => "convert",
            Command::Status => "status",
            Command::Content { .. } => "content",
            Command::Login { .. } => "login",
            Command::Logout => "logout",
            Command::Reset => "reset",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Keep the file copy separate so `login` never persists env overrides
    let stored_config = Config::load()?;
    let mut config = stored_config.clone();
    config.apply_env();

    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    let _log_guard = init_tracing(&data_dir);
    info!(command = cli.command.name(), "tabicache starting");

    match cli.command {
        Command::Login { api_key, sync_url } => login(stored_config, &api_key, sync_url),
        Command::Logout => {
            CredentialStore::delete(&config.sync_key_name)?;
            println!("Sync API key '{}' removed from keychain", config.sync_key_name);
            Ok(())
        }
        command => {
            let client = TripClient::create(&config)?;
            if cli.offline {
                client.network().set_status(NetworkStatus::Offline);
            }
            let result = run(&client, command).await;
            client.dispose();
            result
        }
    }
}

fn login(mut config: Config, api_key: &str, sync_url: Option<String>) -> Result<()> {
    CredentialStore::store(&config.sync_key_name, api_key)?;
    println!("Sync API key stored in keychain as '{}'", config.sync_key_name);
    if let Some(url) = sync_url {
        config.sync_url = Some(url);
        config.save()?;
        println!("Sync source saved to config");
    }
    Ok(())
}

async fn run(client: &TripClient, command: Command) -> Result<()> {
    match command {
        Command::Sync => {
            let report = client.sync().sync_all().await?;
            if report.skipped_offline {
                println!("Offline - sync skipped");
                return Ok(());
            }
            for outcome in &report.outcomes {
                match &outcome.result {
                    Ok(synced) if synced.quarantined > 0 => println!(
                        "{:<16} {} rows ({} quarantined)",
                        outcome.table, synced.rows, synced.quarantined
                    ),
                    Ok(synced) => println!("{:<16} {} rows", outcome.table, synced.rows),
                    Err(e) => println!("{:<16} FAILED: {}", outcome.table, e),
                }
            }
            // The CLI exits after this command, so wait for the warm instead of detaching it
            if let Some(task) = report.warm_task {
                print_warm(task.await.context("Cache warm task panicked")?);
            }
        }
        Command::Warm => print_warm(client.warmer().warm_all_caches().await),
        Command::Rate => {
            let quote = client.rates().get_rate().await;
            let source = if quote.is_fallback {
                "fallback".to_string()
            } else {
                match quote.last_updated {
                    Some(ts) => format!("updated {}", age_display(ts)),
                    None => "cached".to_string(),
                }
            };
            let offline = if quote.is_offline { ", offline" } else { "" };
            println!("1 USD = {:.2} JPY ({}{})", quote.rate, source, offline);
        }
        Command::Convert { usd } => {
            let quote = client.rates().get_rate().await;
            println!("${:.2} = ¥{}", usd, quote.usd_to_jpy(usd));
        }
        Command::Status => {
            for table in SyncTable::ALL {
                let status = client.tracker().get_sync_status(table.local_name());
                let last = status
                    .last_synced_at
                    .map(age_display)
                    .unwrap_or_else(|| "never".to_string());
                println!("{:<16} last synced {}", status.table_name, last);
            }
            match client.warmer().last_warmed() {
                Some(ts) => println!("{:<16} {}", "page cache", age_display(ts)),
                None => println!("{:<16} never warmed", "page cache"),
            }
        }
        Command::Content { label, category } => {
            let resolver = client.content();
            match resolver.resolve_location_id_for_label(&label, &category) {
                Some(location_id) => match resolver.fetch_content(&location_id) {
                    Some(content) => {
                        println!("{} [{}]", content.title, location_id);
                        println!("{}", content.content);
                        for tip in &content.etiquette_tips {
                            println!("  - {}", tip);
                        }
                    }
                    None => println!("No content for {}", location_id),
                },
                None => println!("No guide content matches '{}'", label),
            }
        }
        Command::Reset => {
            let seeded = client.store().reset()?;
            println!("Local data reset ({} seed records)", seeded);
        }
        // Handled before the client is created
        Command::Login { .. } | Command::Logout => {}
    }
    Ok(())
}

fn print_warm(outcome: WarmOutcome) {
    match outcome {
        WarmOutcome::SkippedOffline => println!("Offline - cache warm skipped"),
        WarmOutcome::SkippedRecent { last_warmed } => {
            println!("Page cache warmed {} - skipped", age_display(last_warmed))
        }
        WarmOutcome::Completed(report) => {
            println!("static pages     {}", format_count(report.static_pages));
            println!("detail pages     {}", format_count(report.detail_pages));
            println!("restaurant pages {}", format_count(report.restaurant_pages));
            if report.quarantined > 0 {
                println!("quarantined      {}", report.quarantined);
            }
            println!("overall          {}", format_count(report.overall()));
        }
    }
}
