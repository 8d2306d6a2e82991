//! NFT Events Server
//!
//! Watches Ethereum, Tezos and the Bitmark ledger for NFT transfers and
//! metadata changes, and pushes them to the event processor.

mod config;
mod shutdown;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use nftevents_core::block_time::BlockTimeResolver;
use nftevents_core::checkpoint::Watermark;
use nftevents_core::emitter::{Emitter, SharedSink};
use nftevents_core::entities::{PgCacheStore, PgCheckpointStore};
use nftevents_core::framework::DatabaseProcessor;
use nftevents_core::processors::{
    BitmarkWatcher, EthereumLogHandler, EthereumWatcher, TezosWatcher, WatcherError,
};
use nftevents_core::sources::bitmark::BitmarkLedger;
use nftevents_core::sources::ethereum::{RpcBlockTimeSource, WsLogSource};
use nftevents_core::sources::tzkt::TzktClient;
use nftevents_sdk::client::ProcessorClient;
use shutdown::shutdown_signal;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// NFT Events - multi-chain NFT event watcher
#[derive(Parser, Debug)]
#[command(name = "nftevents-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./nftevents-config.toml")]
    config: PathBuf,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "NFTEVENTS_LOG_JSON", default_value = "false")]
    log_json: bool,
}

type WatcherResult = (&'static str, Result<(), WatcherError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting nftevents-server v{}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::new(&args.config).load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!(
        watchers = ?config.enabled_watchers(),
        "Configuration loaded from {:?}",
        args.config
    );

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let db = DatabaseProcessor::new(db_pool.clone());
    let http = reqwest::Client::builder()
        .timeout(config.processor.request_timeout)
        .build()?;
    let sink: SharedSink = Arc::new(Emitter::new(
        ProcessorClient::new(config.processor.endpoint.clone()).with_http_client(http),
    ));

    let shutdown = shutdown_signal()?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut watchers: JoinSet<WatcherResult> = JoinSet::new();

    if let Some(ethereum) = config.ethereum {
        let blocks = RpcBlockTimeSource::connect(&ethereum.rpc_url, ethereum.rpc_timeout).await?;
        let resolver =
            BlockTimeResolver::new(Arc::new(PgCacheStore::new(db.clone())), Arc::new(blocks));
        let watcher = EthereumWatcher::new(
            Arc::new(WsLogSource::new(ethereum.ws_url)),
            EthereumLogHandler::new(resolver, sink.clone()),
            ethereum.reconnect,
        );
        let rx = shutdown_rx.clone();
        watchers.spawn(async move {
            watcher.run(rx).await;
            ("ethereum", Ok(()))
        });
    }

    if let Some(tezos) = config.tezos {
        let explorer = Arc::new(TzktClient::new(tezos.api_url, tezos.request_timeout));
        let watermark = Watermark::new(
            Arc::new(PgCheckpointStore::new(db.clone())),
            tezos.checkpoint_key,
        );
        let watcher = TezosWatcher::new(explorer, sink.clone(), watermark);
        let rx = shutdown_rx.clone();
        watchers.spawn(async move {
            let result = watcher
                .run(&tezos.hub_url, tezos.connect_timeout, rx)
                .await;
            ("tezos", result)
        });
    }

    if let Some(bitmark) = config.bitmark {
        tracing::info!("Connecting to ledger database...");
        let ledger_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&bitmark.database_url)
            .await?;
        let ledger = Arc::new(BitmarkLedger::new(
            DatabaseProcessor::new(ledger_pool),
            bitmark.api_url,
            bitmark.request_timeout,
        ));
        let watcher = BitmarkWatcher::new(
            ledger,
            sink.clone(),
            bitmark.database_url,
            bitmark.listen_channel,
        );
        let rx = shutdown_rx.clone();
        watchers.spawn(async move { ("bitmark", watcher.run(rx).await) });
    }
    drop(shutdown_rx);

    let mut shutdown = std::pin::pin!(shutdown);
    let mut shutting_down = false;
    let mut failed = false;
    loop {
        tokio::select! {
            _ = &mut shutdown, if !shutting_down => {
                shutting_down = true;
                let _ = shutdown_tx.send(true);
            }
            joined = watchers.join_next() => match joined {
                None => break,
                Some(Ok((name, Ok(())))) => tracing::info!(watcher = name, "Watcher stopped"),
                Some(Ok((name, Err(e)))) => {
                    tracing::error!(watcher = name, error = %e, "Watcher failed, shutting down");
                    failed = true;
                    shutting_down = true;
                    let _ = shutdown_tx.send(true);
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Watcher task aborted, shutting down");
                    failed = true;
                    shutting_down = true;
                    let _ = shutdown_tx.send(true);
                }
            }
        }
    }

    tracing::info!("Closing database connections...");
    db_pool.close().await;

    if failed {
        anyhow::bail!("a watcher stopped with an error");
    }
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
