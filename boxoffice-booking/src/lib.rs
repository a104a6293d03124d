pub mod expiry_worker;
pub mod manager;
pub mod sweeper;

pub use expiry_worker::ExpiryWorker;
pub use manager::ReservationManager;
pub use sweeper::{ReconciliationSweep, SweepReport};
