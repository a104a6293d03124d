use async_trait::async_trait;
use boxoffice_core::{CoreError, CoreResult, ExpiryScheduler};
use boxoffice_shared::ExpiryNotification;
use chrono::Utc;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{declare_topology, DELAYED_EXCHANGE, DELAYED_ROUTING_KEY};
use crate::app_config::BrokerConfig;

const PERSISTENT: u8 = 2;

struct Link {
    connection: Connection,
    channel: Channel,
}

impl Link {
    fn is_open(&self) -> bool {
        self.connection.status().connected() && self.channel.status().connected()
    }
}

/// Publishes expiry notifications onto the delay queue with broker confirms.
///
/// The broker link is opened on first use and reopened whenever it is found
/// closed, so a broker restart costs the in-flight publish and nothing more.
/// Connecting and publishing together are bounded by `publish_timeout`.
pub struct ExpiryPublisher {
    config: BrokerConfig,
    link: Mutex<Option<Link>>,
    publish_timeout: Duration,
}

impl ExpiryPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        let publish_timeout = config.publish_timeout();
        Self {
            config,
            link: Mutex::new(None),
            publish_timeout,
        }
    }

    /// Open the link and declare the topology now instead of on the first publish.
    pub async fn ensure_connected(&self) -> CoreResult<()> {
        tokio::time::timeout(self.publish_timeout, self.channel())
            .await
            .map_err(|e| CoreError::transport("connect expiry publisher timed out", e))??;
        Ok(())
    }

    async fn channel(&self) -> CoreResult<Channel> {
        let mut link = self.link.lock().await;
        if let Some(open) = link.as_ref().filter(|l| l.is_open()) {
            return Ok(open.channel.clone());
        }

        let fresh = open_link(&self.config)
            .await
            .map_err(|e| CoreError::transport("connect expiry publisher", e))?;
        let channel = fresh.channel.clone();
        *link = Some(fresh);
        info!("Expiry publisher connected");
        Ok(channel)
    }

    /// Drop the current link so the next publish starts from a fresh connection.
    async fn reset(&self) {
        if let Some(stale) = self.link.lock().await.take() {
            if let Err(e) = stale.connection.close(200, "reconnecting").await {
                debug!(error = %e, "Stale broker connection did not close cleanly");
            }
        }
    }

    async fn publish_confirmed(
        &self,
        notification: &ExpiryNotification,
        payload: &[u8],
    ) -> CoreResult<()> {
        let channel = self.channel().await?;
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(PERSISTENT)
            .with_message_id(notification.booking_id.to_string().into())
            .with_expiration(notification.expiration_ms().to_string().into())
            .with_timestamp(u64::try_from(Utc::now().timestamp()).unwrap_or_default());

        let confirmation = channel
            .basic_publish(
                DELAYED_EXCHANGE,
                DELAYED_ROUTING_KEY,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| CoreError::transport("publish expiry notification", e))?
            .await
            .map_err(|e| CoreError::transport("await publisher confirm", e))?;

        if confirmation.is_nack() {
            return Err(CoreError::transport(
                "publish expiry notification",
                "broker rejected the message",
            ));
        }
        Ok(())
    }
}

async fn open_link(config: &BrokerConfig) -> Result<Link, lapin::Error> {
    let connection = Connection::connect(&config.url(), ConnectionProperties::default()).await?;
    let channel = connection.create_channel().await?;

    declare_topology(&channel).await?;
    channel.confirm_select(ConfirmSelectOptions::default()).await?;

    Ok(Link { connection, channel })
}

#[async_trait]
impl ExpiryScheduler for ExpiryPublisher {
    async fn schedule(&self, notification: &ExpiryNotification) -> CoreResult<()> {
        let payload = notification
            .to_json()
            .map_err(|e| CoreError::transport("encode expiry notification", e))?;

        let publish = self.publish_confirmed(notification, &payload);
        let published = tokio::time::timeout(self.publish_timeout, publish)
            .await
            .map_err(|e| CoreError::transport("publish expiry notification timed out", e))
            .and_then(|result| result);

        if let Err(e) = published {
            warn!(
                booking_id = %notification.booking_id,
                error = %e,
                "Dropping broker link after failed publish"
            );
            self.reset().await;
            return Err(e);
        }

        debug!(
            booking_id = %notification.booking_id,
            ttl_minutes = notification.ttl_minutes,
            "Expiry notification published"
        );
        Ok(())
    }
}
