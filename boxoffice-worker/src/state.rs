use anyhow::Context;
use boxoffice_booking::ReservationManager;
use boxoffice_core::{BookingRepository, Clock, EventRepository, ExpiryScheduler, SystemClock};
use boxoffice_store::app_config::Config;
use boxoffice_store::{DbClient, ExpiryPublisher, StoreBookingRepository, StoreEventRepository};
use std::sync::Arc;
use tracing::{info, warn};

/// Wired services, ready to be embedded by an API layer or driven by the worker loops.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ReservationManager>,
}

impl AppState {
    pub fn new(
        events: Arc<dyn EventRepository>,
        bookings: Arc<dyn BookingRepository>,
        scheduler: Arc<dyn ExpiryScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            manager: Arc::new(ReservationManager::new(events, bookings, scheduler, clock)),
        }
    }

    /// Connect to PostgreSQL, run migrations if configured, and try the broker.
    ///
    /// An unreachable broker is not fatal: the publisher reconnects on the next
    /// booking and the consumer loop keeps retrying on its own.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        let db = DbClient::new(&config.database)
            .await
            .context("failed to connect to database")?;
        if config.database.run_migrations {
            db.migrate().await.context("failed to run migrations")?;
        }

        let publisher = ExpiryPublisher::new(config.broker.clone());
        match publisher.ensure_connected().await {
            Ok(()) => info!("Broker connected"),
            Err(e) => warn!(
                error = %e,
                "Broker unavailable at startup; publisher will reconnect on demand"
            ),
        }

        Ok(Self::new(
            Arc::new(StoreEventRepository::new(db.pool.clone())),
            Arc::new(StoreBookingRepository::new(db.pool.clone())),
            Arc::new(publisher),
            Arc::new(SystemClock),
        ))
    }
}
