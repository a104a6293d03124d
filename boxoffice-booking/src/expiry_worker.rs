use async_trait::async_trait;
use boxoffice_core::{CoreError, Disposition, ExpiryHandler};
use boxoffice_shared::ExpiryNotification;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::manager::ReservationManager;

/// Turns a delivered expiry notification into an idempotent cancel.
pub struct ExpiryWorker {
    manager: Arc<ReservationManager>,
}

impl ExpiryWorker {
    pub fn new(manager: Arc<ReservationManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ExpiryHandler for ExpiryWorker {
    async fn handle(&self, payload: &[u8]) -> Disposition {
        let notification = match ExpiryNotification::from_json(payload) {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, bytes = payload.len(), "Discarding undecodable expiry message");
                return Disposition::Discard;
            }
        };

        let booking_id = notification.booking_id;
        let place_id = notification.place_id;

        match self.manager.cancel_booking(booking_id).await {
            Ok(true) => {
                info!(%booking_id, %place_id, "Booking expired and place freed");
                Disposition::Ack
            }
            Ok(false) => {
                info!(%booking_id, %place_id, "Expiry skipped, booking already paid or released");
                Disposition::Ack
            }
            Err(CoreError::NotFound(entity, id)) => {
                warn!(%booking_id, %entity, %id, "Discarding expiry for missing booking");
                Disposition::Discard
            }
            Err(e) if e.is_retryable() => {
                error!(%booking_id, error = %e, "Failed to expire booking, requeueing");
                Disposition::Requeue
            }
            Err(e) => {
                error!(%booking_id, error = %e, "Discarding expiry message that cannot succeed");
                Disposition::Discard
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::dto::{CreateBookingRequest, CreateEventRequest};
    use boxoffice_core::{BookingStatus, ManualClock};
    use boxoffice_store::{InMemoryExpiryChannel, InMemoryStore};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    struct Fixture {
        worker: ExpiryWorker,
        manager: Arc<ReservationManager>,
        store: Arc<InMemoryStore>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(InMemoryExpiryChannel::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager =
            Arc::new(ReservationManager::new(store.clone(), store.clone(), channel, clock));
        Fixture {
            worker: ExpiryWorker::new(manager.clone()),
            manager,
            store,
        }
    }

    async fn book_one(f: &Fixture) -> ExpiryNotification {
        let event = f
            .manager
            .create_event(CreateEventRequest {
                name: "Matinee".into(),
                description: String::new(),
                event_date: Utc::now() + Duration::days(1),
                rows: 1,
                seats: 1,
                booking_ttl_minutes: 5,
            })
            .await
            .unwrap();
        let place_id = f.manager.get_event(event.event_id).await.unwrap().places[0].id;
        let booking = f
            .manager
            .create_booking(CreateBookingRequest {
                event_id: event.event_id,
                place_id,
            })
            .await
            .unwrap();
        ExpiryNotification::new(booking.booking_id, event.event_id, place_id, Utc::now(), 5)
    }

    #[tokio::test]
    async fn test_pending_booking_is_expired_and_acked() {
        let f = fixture();
        let n = book_one(&f).await;

        let disposition = f.worker.handle(&n.to_json().unwrap()).await;
        assert_eq!(disposition, Disposition::Ack);

        let booking = f.manager.get_booking(n.booking_id).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Expired);
        assert!(!f.manager.get_event(n.event_id).await.unwrap().places[0].is_booked);
    }

    #[tokio::test]
    async fn test_paid_booking_is_acked_untouched() {
        let f = fixture();
        let n = book_one(&f).await;
        f.manager.pay_booking(n.booking_id).await.unwrap();

        assert_eq!(f.worker.handle(&n.to_json().unwrap()).await, Disposition::Ack);
        assert_eq!(
            f.manager.get_booking(n.booking_id).await.unwrap().status,
            BookingStatus::Paid
        );
        assert!(f.manager.get_event(n.event_id).await.unwrap().places[0].is_booked);
    }

    #[tokio::test]
    async fn test_redelivery_is_a_no_op() {
        let f = fixture();
        let n = book_one(&f).await;
        let payload = n.to_json().unwrap();

        assert_eq!(f.worker.handle(&payload).await, Disposition::Ack);
        assert_eq!(f.worker.handle(&payload).await, Disposition::Ack);
        assert_eq!(
            f.manager.get_booking(n.booking_id).await.unwrap().status,
            BookingStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_poison_message_is_discarded() {
        let f = fixture();
        assert_eq!(f.worker.handle(b"not json").await, Disposition::Discard);
        assert_eq!(f.worker.handle(b"{\"booking_id\":42}").await, Disposition::Discard);
    }

    #[tokio::test]
    async fn test_missing_booking_is_discarded() {
        let f = fixture();
        let n =
            ExpiryNotification::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now(), 5);
        assert_eq!(f.worker.handle(&n.to_json().unwrap()).await, Disposition::Discard);
    }

    #[tokio::test]
    async fn test_nil_booking_id_is_discarded() {
        let f = fixture();
        let n = ExpiryNotification::new(Uuid::nil(), Uuid::new_v4(), Uuid::new_v4(), Utc::now(), 5);
        assert_eq!(f.worker.handle(&n.to_json().unwrap()).await, Disposition::Discard);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_requeued() {
        let f = fixture();
        let n = book_one(&f).await;

        f.store.set_unavailable(true);
        assert_eq!(f.worker.handle(&n.to_json().unwrap()).await, Disposition::Requeue);

        f.store.set_unavailable(false);
        assert_eq!(f.worker.handle(&n.to_json().unwrap()).await, Disposition::Ack);
        assert_eq!(
            f.manager.get_booking(n.booking_id).await.unwrap().status,
            BookingStatus::Expired
        );
    }
}
