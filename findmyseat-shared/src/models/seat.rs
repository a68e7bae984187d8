use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Booked,
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatStatus::Available => write!(f, "available"),
            SeatStatus::Booked => write!(f, "booked"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatPosition {
    pub row: u32,
    pub col: u32,
}

/// A bookable physical slot in the hall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub seat_id: String,
    pub position: SeatPosition,
    pub status: SeatStatus,
}

impl Seat {
    pub fn new(seat_id: impl Into<String>, row: u32, col: u32) -> Self {
        Self {
            seat_id: seat_id.into(),
            position: SeatPosition { row, col },
            status: SeatStatus::Available,
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }

    /// Provision a `rows` x `cols` grid of available seats.
    ///
    /// Rows are labelled with letters (`A`..`Z`, then `AA`, `AB`, ...) and
    /// columns are numbered from 1, so the first seat is `A1`.
    pub fn grid(rows: u32, cols: u32) -> Vec<Seat> {
        let mut seats = Vec::with_capacity((rows * cols) as usize);
        for row in 0..rows {
            let label = row_label(row);
            for col in 0..cols {
                seats.push(Seat::new(format!("{}{}", label, col + 1), row, col));
            }
        }
        seats
    }
}

fn row_label(mut row: u32) -> String {
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (row % 26) as u8);
        if row < 26 {
            break;
        }
        row = row / 26 - 1;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_labels() {
        let seats = Seat::grid(2, 3);
        let ids: Vec<&str> = seats.iter().map(|s| s.seat_id.as_str()).collect();
        assert_eq!(ids, vec!["A1", "A2", "A3", "B1", "B2", "B3"]);
        assert!(seats.iter().all(Seat::is_available));
        assert_eq!(seats[4].position, SeatPosition { row: 1, col: 1 });
    }

    #[test]
    fn test_row_label_wraps_past_z() {
        assert_eq!(row_label(25), "Z");
        assert_eq!(row_label(26), "AA");
        assert_eq!(row_label(27), "AB");
    }

    #[test]
    fn test_seat_wire_shape() {
        let json = serde_json::to_value(Seat::new("A1", 0, 0)).unwrap();
        assert_eq!(json["seatId"], "A1");
        assert_eq!(json["status"], "available");
        assert_eq!(json["position"]["row"], 0);
    }
}
