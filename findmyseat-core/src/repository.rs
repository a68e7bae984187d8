use async_trait::async_trait;
use findmyseat_shared::{Booking, Seat};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// A batch of records written together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerChange {
    pub seats: Vec<Seat>,
    pub bookings: Vec<Booking>,
}

impl LedgerChange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seat(mut self, seat: Seat) -> Self {
        self.seats.push(seat);
        self
    }

    pub fn booking(mut self, booking: Booking) -> Self {
        self.bookings.push(booking);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty() && self.bookings.is_empty()
    }
}

/// Durable storage for seat and booking records.
///
/// `persist` must apply the whole batch or nothing. Bookings whose status is
/// no longer active drop out of `load_active_bookings`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load_seats(&self) -> Result<Vec<Seat>, StoreError>;

    async fn load_active_bookings(&self) -> Result<Vec<Booking>, StoreError>;

    async fn persist(&self, change: &LedgerChange) -> Result<(), StoreError>;
}
