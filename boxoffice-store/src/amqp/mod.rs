//! Delayed expiry over AMQP.
//!
//! Messages are published to a delay queue nobody consumes. Each carries a
//! per-message expiration equal to the booking TTL; when it lapses the broker
//! dead-letters the message into the expired queue, where the worker picks it up.

pub mod consumer;
pub mod publisher;

use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{Channel, ExchangeKind};
use tracing::info;

pub use consumer::ExpiryConsumer;
pub use publisher::ExpiryPublisher;

pub const DELAYED_EXCHANGE: &str = "booking.delayed";
pub const DELAYED_QUEUE: &str = "booking.delayed.queue";
pub const EXPIRED_EXCHANGE: &str = "booking.expired";
pub const EXPIRED_QUEUE: &str = "booking.expired.queue";
pub const DELAYED_ROUTING_KEY: &str = "booking.delay";
pub const EXPIRED_ROUTING_KEY: &str = "booking.expire";

/// Declare both exchange/queue pairs. Safe to repeat: every declaration is
/// durable and argument-identical, so redeclaring is a no-op.
pub async fn declare_topology(channel: &Channel) -> Result<(), lapin::Error> {
    channel
        .exchange_declare(
            EXPIRED_EXCHANGE,
            ExchangeKind::Direct,
            durable_exchange(),
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_declare(EXPIRED_QUEUE, durable_queue(), FieldTable::default())
        .await?;
    // Dead-lettered messages arrive with `booking.expire`
    for routing_key in [DELAYED_ROUTING_KEY, EXPIRED_ROUTING_KEY] {
        channel
            .queue_bind(
                EXPIRED_QUEUE,
                EXPIRED_EXCHANGE,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    channel
        .exchange_declare(
            DELAYED_EXCHANGE,
            ExchangeKind::Direct,
            durable_exchange(),
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_declare(DELAYED_QUEUE, durable_queue(), dead_letter_args())
        .await?;
    channel
        .queue_bind(
            DELAYED_QUEUE,
            DELAYED_EXCHANGE,
            DELAYED_ROUTING_KEY,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!("Expiry topology declared");
    Ok(())
}

fn durable_exchange() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        ..ExchangeDeclareOptions::default()
    }
}

fn durable_queue() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    }
}

fn dead_letter_args() -> FieldTable {
    let mut args = FieldTable::default();
    args.insert(
        "x-dead-letter-exchange".into(),
        AMQPValue::LongString(EXPIRED_EXCHANGE.into()),
    );
    args.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(EXPIRED_ROUTING_KEY.into()),
    );
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::ShortString;

    #[test]
    fn test_delay_queue_dead_letters_into_expired_exchange() {
        let args = dead_letter_args();
        let inner = args.inner();

        assert_eq!(
            inner.get(&ShortString::from("x-dead-letter-exchange")),
            Some(&AMQPValue::LongString(EXPIRED_EXCHANGE.into()))
        );
        assert_eq!(
            inner.get(&ShortString::from("x-dead-letter-routing-key")),
            Some(&AMQPValue::LongString(EXPIRED_ROUTING_KEY.into()))
        );
    }
}
