pub mod event;
pub mod layout;
pub mod rules;

pub use event::{Event, EventSummary, Place};
pub use layout::SeatLayout;
pub use rules::CatalogError;
