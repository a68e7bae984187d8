pub mod clock;
pub mod coordinator;
pub mod geofence;
pub mod hub;
pub mod registry;
pub mod repository;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{BookingCoordinator, LedgerEvent};
pub use geofence::{GeofenceValidator, Venue};
pub use hub::{BroadcastHub, Group, HubMessage, Subscription, SubscriptionId};
pub use registry::SeatRegistry;
pub use repository::{LedgerChange, LedgerStore, StoreError};
pub use sweeper::ExpirySweeper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConflictKind {
    #[error("You already have an active booking")]
    AlreadyBooked,
    #[error("Seat is not available")]
    SeatUnavailable,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("You must be inside the reading hall to book a seat ({distance_meters:.0} m away)")]
    Geofence { distance_meters: f64 },
    #[error("{0}")]
    Conflict(ConflictKind),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_messages() {
        assert_eq!(ConflictKind::AlreadyBooked.to_string(), "You already have an active booking");
        assert_eq!(
            CoreError::Conflict(ConflictKind::SeatUnavailable).to_string(),
            "Seat is not available"
        );
    }
}
