use async_trait::async_trait;
use boxoffice_shared::ExpiryNotification;

use crate::CoreResult;

/// Arranges for a notification to be delivered once its TTL has elapsed.
#[async_trait]
pub trait ExpiryScheduler: Send + Sync {
    /// Fails fast with `CoreError::Transport` if the channel is unavailable.
    async fn schedule(&self, notification: &ExpiryNotification) -> CoreResult<()>;
}

/// What the consumer should do with a delivery once it has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processed (including no-ops); remove from the queue.
    Ack,
    /// Transient failure; hand back to the broker for redelivery.
    Requeue,
    /// Can never succeed; drop it.
    Discard,
}

/// Consumer-side counterpart of [`ExpiryScheduler`].
#[async_trait]
pub trait ExpiryHandler: Send + Sync {
    async fn handle(&self, payload: &[u8]) -> Disposition;
}
