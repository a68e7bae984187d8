use async_trait::async_trait;
use findmyseat_core::{LedgerChange, LedgerStore, StoreError};
use findmyseat_shared::{Booking, Seat};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    seats: HashMap<String, Seat>,
    bookings: HashMap<Uuid, Booking>,
}

/// Process-local store, for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated store, as if a previous run had written these records.
    pub fn with_records(seats: Vec<Seat>, bookings: Vec<Booking>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                seats: seats.into_iter().map(|s| (s.seat_id.clone(), s)).collect(),
                bookings: bookings.into_iter().map(|b| (b.id, b)).collect(),
            }),
        }
    }

    pub async fn booking(&self, id: Uuid) -> Option<Booking> {
        self.tables.read().await.bookings.get(&id).cloned()
    }

    pub async fn seat(&self, seat_id: &str) -> Option<Seat> {
        self.tables.read().await.seats.get(seat_id).cloned()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load_seats(&self) -> Result<Vec<Seat>, StoreError> {
        let mut seats: Vec<Seat> = self.tables.read().await.seats.values().cloned().collect();
        seats.sort_by_key(|s| s.position);
        Ok(seats)
    }

    async fn load_active_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.is_active())
            .cloned()
            .collect())
    }

    async fn persist(&self, change: &LedgerChange) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        for seat in &change.seats {
            tables.seats.insert(seat.seat_id.clone(), seat.clone());
        }
        for booking in &change.bookings {
            tables.bookings.insert(booking.id, booking.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use findmyseat_shared::{BookingStatus, SeatStatus};

    #[tokio::test]
    async fn test_persist_and_reload() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let mut seat = Seat::new("A1", 0, 0);
        seat.status = SeatStatus::Booked;
        let booking = Booking::new("user-1", "A1", now, now + Duration::hours(1));

        store
            .persist(&LedgerChange::new().seat(seat.clone()).booking(booking.clone()))
            .await
            .unwrap();
        assert_eq!(store.load_seats().await.unwrap(), vec![seat]);
        assert_eq!(store.load_active_bookings().await.unwrap(), vec![booking.clone()]);

        let mut cancelled = booking.clone();
        cancelled.status = BookingStatus::Cancelled;
        store.persist(&LedgerChange::new().booking(cancelled)).await.unwrap();
        assert!(store.load_active_bookings().await.unwrap().is_empty());
        assert_eq!(store.booking(booking.id).await.unwrap().status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_seats_load_in_layout_order() {
        let mut seats = Seat::grid(2, 2);
        seats.reverse();
        let store = MemoryStore::with_records(seats, Vec::new());
        let ids: Vec<String> = store.load_seats().await.unwrap().into_iter().map(|s| s.seat_id).collect();
        assert_eq!(ids, vec!["A1", "A2", "B1", "B2"]);
    }
}
