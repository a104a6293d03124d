pub mod models;
pub mod secret;

pub use models::messages::ExpiryNotification;
pub use secret::Masked;
