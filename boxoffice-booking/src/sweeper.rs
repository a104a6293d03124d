use boxoffice_core::{CoreError, CoreResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::manager::ReservationManager;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Expires PENDING bookings whose notification never arrived.
///
/// Goes through the same idempotent cancel as the expiry worker, so running it
/// alongside workers or other sweepers is harmless.
pub struct ReconciliationSweep {
    manager: Arc<ReservationManager>,
    batch_size: i64,
}

impl ReconciliationSweep {
    pub fn new(manager: Arc<ReservationManager>, batch_size: i64) -> Self {
        Self { manager, batch_size }
    }

    pub async fn run_once(&self) -> CoreResult<SweepReport> {
        let overdue = self.manager.overdue_bookings(self.batch_size).await?;
        let mut report = SweepReport {
            scanned: overdue.len(),
            ..SweepReport::default()
        };

        for booking_id in overdue {
            match self.manager.cancel_booking(booking_id).await {
                Ok(true) => {
                    info!(%booking_id, "Overdue booking expired by sweep");
                    report.expired += 1;
                }
                // Paid, expired, or deleted since the scan
                Ok(false) | Err(CoreError::NotFound(..)) => {}
                Err(e) => {
                    warn!(%booking_id, error = %e, "Sweep failed to expire booking");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Sweep every `interval` until `shutdown` flips to true.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) if report.scanned > 0 => info!(
                            scanned = report.scanned,
                            expired = report.expired,
                            failed = report.failed,
                            "Reconciliation sweep finished"
                        ),
                        Ok(_) => debug!("Reconciliation sweep found nothing overdue"),
                        Err(e) => error!(error = %e, "Reconciliation sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation sweep stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::dto::{CreateBookingRequest, CreateEventRequest};
    use boxoffice_core::{BookingStatus, Clock, ManualClock};
    use boxoffice_store::{InMemoryExpiryChannel, InMemoryStore};
    use chrono::{Duration as ChronoDuration, Utc};
    use uuid::Uuid;

    struct Fixture {
        manager: Arc<ReservationManager>,
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        // Unreachable broker: every notification is lost, only the sweep can expire
        let channel = Arc::new(InMemoryExpiryChannel::default());
        channel.set_unavailable(true);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let manager = Arc::new(ReservationManager::new(
            store.clone(),
            store.clone(),
            channel,
            clock.clone(),
        ));
        Fixture { manager, store, clock }
    }

    async fn book_seats(f: &Fixture, seats: i32, ttl: i32) -> (Uuid, Vec<Uuid>) {
        let event = f
            .manager
            .create_event(CreateEventRequest {
                name: "Gala".into(),
                description: String::new(),
                event_date: f.clock.now() + ChronoDuration::days(1),
                rows: 1,
                seats,
                booking_ttl_minutes: ttl,
            })
            .await
            .unwrap();

        let places = f.manager.get_event(event.event_id).await.unwrap().places;
        let mut bookings = Vec::new();
        for place in places {
            let booked = f
                .manager
                .create_booking(CreateBookingRequest {
                    event_id: event.event_id,
                    place_id: place.id,
                })
                .await
                .unwrap();
            bookings.push(booked.booking_id);
        }
        (event.event_id, bookings)
    }

    #[tokio::test]
    async fn test_sweep_expires_only_overdue_pending() {
        let f = fixture();
        let (_, short) = book_seats(&f, 2, 5).await;
        let (_, long) = book_seats(&f, 1, 60).await;
        f.manager.pay_booking(short[1]).await.unwrap();

        let sweep = ReconciliationSweep::new(f.manager.clone(), 100);
        assert_eq!(sweep.run_once().await.unwrap(), SweepReport::default());

        f.clock.advance(ChronoDuration::minutes(6));
        let report = sweep.run_once().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                scanned: 1,
                expired: 1,
                failed: 0
            }
        );

        assert_eq!(f.manager.get_booking(short[0]).await.unwrap().status, BookingStatus::Expired);
        assert_eq!(f.manager.get_booking(short[1]).await.unwrap().status, BookingStatus::Paid);
        assert_eq!(f.manager.get_booking(long[0]).await.unwrap().status, BookingStatus::Pending);

        // Nothing left to do on the next pass
        assert_eq!(sweep.run_once().await.unwrap().scanned, 0);
    }

    #[tokio::test]
    async fn test_sweep_respects_batch_size() {
        let f = fixture();
        book_seats(&f, 5, 5).await;
        f.clock.advance(ChronoDuration::minutes(10));

        let sweep = ReconciliationSweep::new(f.manager.clone(), 2);
        assert_eq!(sweep.run_once().await.unwrap().expired, 2);
        assert_eq!(sweep.run_once().await.unwrap().expired, 2);
        assert_eq!(sweep.run_once().await.unwrap().expired, 1);
        assert_eq!(sweep.run_once().await.unwrap().scanned, 0);
    }

    #[tokio::test]
    async fn test_sweep_surfaces_scan_failure() {
        let f = fixture();
        f.store.set_unavailable(true);

        let sweep = ReconciliationSweep::new(f.manager.clone(), 10);
        let err = sweep.run_once().await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_until_shutdown() {
        let f = fixture();
        let (event_id, bookings) = book_seats(&f, 1, 5).await;
        f.clock.advance(ChronoDuration::minutes(6));

        let sweep = ReconciliationSweep::new(f.manager.clone(), 10);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task =
            tokio::spawn(async move { sweep.run(Duration::from_secs(60), shutdown_rx).await });

        // First tick fires immediately
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(
            f.manager.get_booking(bookings[0]).await.unwrap().status,
            BookingStatus::Expired
        );
        assert!(!f.manager.get_event(event_id).await.unwrap().places[0].is_booked);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}
