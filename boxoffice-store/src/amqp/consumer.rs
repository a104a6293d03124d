use boxoffice_core::{CoreError, CoreResult, Disposition, ExpiryHandler};
use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection, ConnectionProperties};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::{declare_topology, EXPIRED_QUEUE};
use crate::app_config::BrokerConfig;

/// Consumes the expired queue and settles each delivery per the handler's verdict.
pub struct ExpiryConsumer {
    config: BrokerConfig,
}

impl ExpiryConsumer {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    /// One connection's worth of consumption.
    ///
    /// Returns `Ok(())` when `shutdown` flips to true and a `Transport` error when the
    /// broker connection or the delivery stream is lost. Reconnecting is up to the caller.
    pub async fn consume(
        &self,
        handler: &dyn ExpiryHandler,
        shutdown: &mut watch::Receiver<bool>,
    ) -> CoreResult<()> {
        let connection = Connection::connect(&self.config.url(), ConnectionProperties::default())
            .await
            .map_err(|e| CoreError::transport("connect to broker", e))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| CoreError::transport("open channel", e))?;

        declare_topology(&channel)
            .await
            .map_err(|e| CoreError::transport("declare topology", e))?;
        channel
            .basic_qos(self.config.prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| CoreError::transport("set prefetch", e))?;

        let mut deliveries = channel
            .basic_consume(
                EXPIRED_QUEUE,
                &self.config.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| CoreError::transport("start consuming", e))?;

        info!(
            queue = EXPIRED_QUEUE,
            consumer_tag = %self.config.consumer_tag,
            "Expiry consumer started"
        );

        while !*shutdown.borrow() {
            tokio::select! {
                next = deliveries.next() => {
                    let delivery = match next {
                        Some(Ok(delivery)) => delivery,
                        Some(Err(e)) => return Err(CoreError::transport("receive delivery", e)),
                        None => {
                            return Err(CoreError::transport(
                                "receive delivery",
                                "consumer stream closed",
                            ))
                        }
                    };
                    let disposition = handler.handle(&delivery.data).await;
                    settle(&delivery, disposition).await?;
                }
                changed = shutdown.changed() => {
                    // Sender gone counts as shutdown
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Expiry consumer stopping");
        if let Err(e) = connection.close(200, "shutdown").await {
            warn!(error = %e, "Failed to close broker connection cleanly");
        }
        Ok(())
    }
}

async fn settle(delivery: &Delivery, disposition: Disposition) -> CoreResult<()> {
    debug!(delivery_tag = delivery.delivery_tag, ?disposition, "Settling delivery");
    let result = match disposition {
        Disposition::Ack => delivery.acker.ack(BasicAckOptions::default()).await,
        Disposition::Requeue => {
            delivery
                .acker
                .nack(BasicNackOptions {
                    requeue: true,
                    ..BasicNackOptions::default()
                })
                .await
        }
        Disposition::Discard => delivery.acker.reject(BasicRejectOptions { requeue: false }).await,
    };
    result
        .map(|_| ())
        .map_err(|e| CoreError::transport("settle delivery", e))
}
