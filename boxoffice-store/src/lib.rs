pub mod amqp;
pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod delay_queue;
pub mod event_repo;
pub mod memory;
mod pg_error;

pub use amqp::{ExpiryConsumer, ExpiryPublisher};
pub use booking_repo::StoreBookingRepository;
pub use database::DbClient;
pub use delay_queue::InMemoryExpiryChannel;
pub use event_repo::StoreEventRepository;
pub use memory::InMemoryStore;
