pub mod state;
pub mod worker;

use anyhow::Context;
use boxoffice_booking::{ExpiryWorker, ReconciliationSweep};
use boxoffice_store::app_config::Config;
use boxoffice_store::ExpiryConsumer;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

pub use state::AppState;

/// Run the expiry consumer and the reconciliation sweep until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::connect(&config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer = tokio::spawn(worker::run_expiry_consumer(
        ExpiryConsumer::new(config.broker.clone()),
        Arc::new(ExpiryWorker::new(state.manager.clone())),
        config.broker.reconnect_delay(),
        shutdown_rx.clone(),
    ));

    let sweep = ReconciliationSweep::new(state.manager.clone(), config.expiry.sweep_batch_size);
    let interval = config.expiry.sweep_interval();
    let sweeper = tokio::spawn(async move { sweep.run(interval, shutdown_rx).await });

    info!("Booking expiry worker running");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    info!("Shutdown requested");
    // Receivers may already be gone if both tasks ended
    let _ = shutdown_tx.send(true);

    consumer.await.context("expiry consumer task panicked")?;
    sweeper.await.context("sweep task panicked")?;
    Ok(())
}
