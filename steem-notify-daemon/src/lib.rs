pub mod cli;
pub mod config;
pub mod error;
pub mod storage;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::{load_config, DaemonConfig};
use std::sync::Arc;
use steem_notify_connector::{
    client::JsonRpcClient,
    storage::FeedStore,
    workers::{BlockScanner, WorkerContext},
};
use storage::SledFeedStore;
use tokio::signal;

/// The main entry point for running the daemon application logic.
/// This function handles CLI parsing, configuration, and command dispatch.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => {
            steem_notify_logger::init(&config.daemon.log)?;
            tracing::info!("Configuration loaded: {:#?}", &config);
            run_scanner(config).await
        }
        Commands::Feed(cmd) => print_feed(&config, &cmd.account).await,
        Commands::Cursor => print_cursor(&config).await,
    }
}

fn open_store(config: &DaemonConfig) -> Result<SledFeedStore> {
    SledFeedStore::open(&config.daemon.db_path)
        .with_context(|| format!("Failed to open database at '{}'", config.daemon.db_path))
}

/// Starts the block scanner and handles graceful shutdown.
async fn run_scanner(config: DaemonConfig) -> Result<()> {
    let store = Arc::new(open_store(&config)?);
    let client = Arc::new(
        JsonRpcClient::new(&config.connector.steem).context("Failed to build the RPC client")?,
    );
    let ctx = WorkerContext::new(Arc::new(config.connector), client, store);
    let (scanner, handle) = BlockScanner::new(ctx);
    let mut scanner_task = tokio::spawn(scanner.run());

    tokio::select! {
        res = signal::ctrl_c() => {
            match res {
                Ok(()) => tracing::info!("Received Ctrl+C, initiating graceful shutdown..."),
                Err(err) => tracing::error!(error = %err, "Failed to listen for shutdown signal."),
            }
            handle.stop();
            scanner_task.await??;
            tracing::info!("Shutdown complete.");
        }
        res = &mut scanner_task => {
            res?.context("Block scanner stopped")?;
        }
    }
    Ok(())
}

async fn print_feed(config: &DaemonConfig, account: &str) -> Result<()> {
    let store = open_store(config)?;
    let notifications = store
        .notifications(account)
        .await
        .with_context(|| format!("Failed to read the feed of '{account}'"))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "result": notifications }))?
    );
    Ok(())
}

async fn print_cursor(config: &DaemonConfig) -> Result<()> {
    let store = open_store(config)?;
    match store.last_block().await.context("Failed to read the cursor")? {
        Some(height) => println!("{height}"),
        None => println!("No block processed yet."),
    }
    Ok(())
}
