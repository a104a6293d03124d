use boxoffice_core::ExpiryHandler;
use boxoffice_store::ExpiryConsumer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Keep a consumer attached to the expired queue until shutdown, reconnecting
/// after `reconnect_delay` whenever the broker drops us.
pub async fn run_expiry_consumer(
    consumer: ExpiryConsumer,
    handler: Arc<dyn ExpiryHandler>,
    reconnect_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        match consumer.consume(handler.as_ref(), &mut shutdown).await {
            Ok(()) => break,
            Err(e) => {
                error!(
                    error = %e,
                    retry_in_secs = reconnect_delay.as_secs(),
                    "Expiry consumer lost its broker connection"
                );
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(reconnect_delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    info!("Expiry consumer stopped");
}
