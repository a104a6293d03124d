use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::event::Place;
use crate::rules::{validate_dimensions, CatalogError};

/// Rectangular seat map: `rows` rows of `seats_per_row` seats, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatLayout {
    rows: i32,
    seats_per_row: i32,
}

impl SeatLayout {
    pub fn new(rows: i32, seats_per_row: i32) -> Result<Self, CatalogError> {
        validate_dimensions(rows, seats_per_row)?;
        Ok(Self { rows, seats_per_row })
    }

    pub fn capacity(&self) -> usize {
        self.rows as usize * self.seats_per_row as usize
    }

    /// Generate every place of the map in row-major order, all free.
    pub fn places(&self, event_id: Uuid, now: DateTime<Utc>) -> Vec<Place> {
        let mut places = Vec::with_capacity(self.capacity());

        for row in 1..=self.rows {
            for seat in 1..=self.seats_per_row {
                places.push(Place {
                    id: Uuid::new_v4(),
                    event_id,
                    row,
                    seat,
                    is_booked: false,
                    created_at: now,
                    updated_at: now,
                });
            }
        }

        places
    }
}
