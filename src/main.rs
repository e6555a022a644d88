//! Standalone worker process: loads configuration, opens the job store,
//! launches the shared browser pool, and drives the job queue until a
//! shutdown signal arrives.
//!
//! The HTTP API façade, auth, and billing live outside this crate; jobs
//! reach `JobStore` through whatever writes `waiting` rows into it, and
//! progress is observed through `BroadcastProgressBus::subscribe`.

use std::sync::Arc;

use mapleads::browser_pool::{BrowserPool, BrowserPoolConfig};
use mapleads::config::PipelineConfig;
use mapleads::job::{self, BroadcastProgressBus, CancellationRegistry, NoOpCreditLedger, QueueRunnerContext};
use mapleads::verify;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Arc::new(PipelineConfig::default());

    let store = Arc::new(
        mapleads::job::JobStore::connect(config.db_path())
            .await
            .expect("failed to open job store"),
    );

    let pool = BrowserPool::new(BrowserPoolConfig {
        headless: config.headless(),
        browser_ws_endpoint: config.browser_ws_endpoint().map(str::to_string),
        max_concurrent_pages: config.max_concurrent_pages(),
        ..BrowserPoolConfig::default()
    });

    let resolver = Arc::new(verify::build_resolver());
    let progress_sink = BroadcastProgressBus::new();
    let cancellations = CancellationRegistry::new();

    let runner_ctx = Arc::new(QueueRunnerContext {
        pool: Arc::clone(&pool),
        config: Arc::clone(&config),
        resolver,
        progress_sink,
        credit_ledger: Arc::new(NoOpCreditLedger),
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let queue_handle = tokio::spawn(job::run_queue(
        store,
        runner_ctx,
        job::DEFAULT_QUEUE_CONCURRENCY,
        cancellations,
        shutdown_rx,
    ));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining job queue");
    let _ = shutdown_tx.send(());
    let _ = queue_handle.await;

    pool.shutdown().await;
    Ok(())
}
