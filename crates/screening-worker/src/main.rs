use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tokio::time;

use ingestion_pipeline::IngestionPipeline;
use queue_coordinator::QueueCoordinator;
use screening_core::QueueItem;
use screening_store::Store;

mod config;

use config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting TraceIQ screening worker");

    let config = WorkerConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Database: {}", config.database_url);
    tracing::info!("  Poll interval: {}s", config.poll_interval_secs);
    tracing::info!("  Processing lease: {}s", config.lease_secs);
    tracing::info!("  Workers: {}", config.worker_count);

    let store = Store::connect(&config.database_url).await?;
    store.init_tables().await?;
    tracing::info!("Screening store initialized");

    // Startup connectivity check
    sqlx_check(&store).await?;
    tracing::info!("Startup check: database OK");

    let pipeline = Arc::new(IngestionPipeline::new(store.clone()));
    let queue = Arc::new(
        QueueCoordinator::new(store.pool().clone()).with_lease_secs(config.lease_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = Vec::new();
    for worker_id in 0..config.worker_count {
        workers.push(tokio::spawn(run_worker(
            worker_id,
            Arc::clone(&pipeline),
            Arc::clone(&queue),
            config.clone(),
            shutdown_rx.clone(),
        )));
    }
    tracing::info!(
        "{} worker task(s) polling every {}s. Press Ctrl+C to stop.",
        config.worker_count,
        config.poll_interval_secs
    );

    // Graceful shutdown on SIGINT or SIGTERM
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT");
        }
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
    }
    shutdown_tx.send(true).ok();

    for worker in workers {
        worker.await.ok();
    }
    tracing::info!("All workers stopped, bye");
    Ok(())
}

async fn sqlx_check(store: &Store) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(store.pool())
        .await
        .map_err(|e| anyhow::anyhow!("Database connectivity check failed: {}", e))?;
    Ok(())
}

/// Poll loop: claim one item, run the pipeline, report the outcome.
/// Errors never propagate out of a cycle; the retry bound in the queue
/// is the only limit on attempts per item.
async fn run_worker(
    worker_id: usize,
    pipeline: Arc<IngestionPipeline>,
    queue: Arc<QueueCoordinator>,
    config: WorkerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = time::interval(Duration::from_secs(config.poll_interval_secs));
    let mut cycles: u64 = 0;
    let mut processed: u64 = 0;
    let mut failed: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    tracing::info!(worker = worker_id, processed, failed, "worker shutting down");
                    return;
                }
            }
        }

        cycles += 1;
        if config.heartbeat_interval_cycles > 0 && cycles % config.heartbeat_interval_cycles == 0 {
            match queue.pending_count().await {
                Ok(depth) => tracing::info!(
                    worker = worker_id,
                    cycles,
                    processed,
                    failed,
                    queue_depth = depth,
                    "worker heartbeat"
                ),
                Err(e) => tracing::warn!(worker = worker_id, "heartbeat query failed: {e}"),
            }
        }

        // Drain everything claimable before idling again
        loop {
            if *shutdown.borrow() {
                tracing::info!(worker = worker_id, processed, failed, "worker shutting down");
                return;
            }

            let item = match queue.claim().await {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(worker = worker_id, "claim failed: {e}");
                    break;
                }
            };

            match pipeline.process_queued(&item.txn_id).await {
                Ok(txn) => {
                    if let Err(e) = queue.complete(&item.id).await {
                        tracing::error!(worker = worker_id, item = %item.id, "complete failed: {e}");
                    } else {
                        processed += 1;
                        tracing::info!(worker = worker_id, txn = %txn.id, "transaction screened");
                    }
                }
                Err(e) => {
                    tracing::error!(
                        worker = worker_id,
                        item = %item.id,
                        txn = %item.txn_id,
                        "processing error: {e}"
                    );
                    match queue.fail(&item.id).await {
                        Ok(updated) if updated.status == QueueItem::STATUS_FAILED => failed += 1,
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(worker = worker_id, item = %item.id, "fail transition failed: {e}");
                        }
                    }
                }
            }
        }
    }
}
