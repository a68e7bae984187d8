use crate::models::seat::SeatStatus;
use serde::{Deserialize, Serialize};

/// A single seat's status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatDelta {
    pub seat_id: String,
    pub status: SeatStatus,
}

/// Live occupancy of the hall at the moment a change was committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occupancy {
    pub total_seats: usize,
    pub booked_seats: usize,
    pub occupancy_rate: f64,
}

impl Occupancy {
    pub fn new(total_seats: usize, booked_seats: usize) -> Self {
        let occupancy_rate = if total_seats == 0 {
            0.0
        } else {
            booked_seats as f64 / total_seats as f64 * 100.0
        };
        Self { total_seats, booked_seats, occupancy_rate }
    }
}

/// JSON payload carried inside a server-push data frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WireEvent {
    SeatDelta { delta: SeatDelta },
    AnalyticsUpdate { analytics: Occupancy },
}
