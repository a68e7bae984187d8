use findmyseat_shared::{Seat, SeatStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Authoritative seat id -> seat record table.
///
/// The set of seats is fixed at construction; each seat sits behind its own
/// lock so mutations on different seats never contend.
pub struct SeatRegistry {
    seats: HashMap<String, Mutex<Seat>>,
    order: Vec<String>,
    booked: AtomicUsize,
}

impl SeatRegistry {
    pub fn new(seats: Vec<Seat>) -> Self {
        let mut table = HashMap::with_capacity(seats.len());
        let mut order = Vec::with_capacity(seats.len());
        let mut booked = 0;

        for seat in seats {
            if table.contains_key(&seat.seat_id) {
                warn!("Duplicate seat id {} ignored during provisioning", seat.seat_id);
                continue;
            }
            if seat.status == SeatStatus::Booked {
                booked += 1;
            }
            order.push(seat.seat_id.clone());
            table.insert(seat.seat_id.clone(), Mutex::new(seat));
        }

        // Listing follows the physical layout.
        order.sort_by_key(|id| table[id].lock().position);

        Self {
            seats: table,
            order,
            booked: AtomicUsize::new(booked),
        }
    }

    pub fn get(&self, seat_id: &str) -> Option<Seat> {
        self.seats.get(seat_id).map(|seat| seat.lock().clone())
    }

    pub fn contains(&self, seat_id: &str) -> bool {
        self.seats.contains_key(seat_id)
    }

    /// Snapshot of every seat, ordered by position.
    pub fn list(&self) -> Vec<Seat> {
        self.order
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn booked_count(&self) -> usize {
        self.booked.load(Ordering::SeqCst)
    }

    /// Available -> Booked. Returns false if the seat is unknown or already booked.
    pub fn try_set_booked(&self, seat_id: &str) -> bool {
        let Some(slot) = self.seats.get(seat_id) else {
            return false;
        };
        let mut seat = slot.lock();
        if seat.status == SeatStatus::Booked {
            return false;
        }
        seat.status = SeatStatus::Booked;
        self.booked.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Marks the seat available. Idempotent; returns false only for an unknown seat.
    pub fn set_available(&self, seat_id: &str) -> bool {
        let Some(slot) = self.seats.get(seat_id) else {
            return false;
        };
        let mut seat = slot.lock();
        if seat.status == SeatStatus::Booked {
            seat.status = SeatStatus::Available;
            self.booked.fetch_sub(1, Ordering::SeqCst);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_book_and_release() {
        let registry = SeatRegistry::new(Seat::grid(1, 2));
        assert!(registry.try_set_booked("A1"));
        assert!(!registry.try_set_booked("A1"));
        assert_eq!(registry.get("A1").unwrap().status, SeatStatus::Booked);
        assert_eq!(registry.booked_count(), 1);

        assert!(registry.set_available("A1"));
        assert!(registry.set_available("A1"));
        assert_eq!(registry.get("A1").unwrap().status, SeatStatus::Available);
        assert_eq!(registry.booked_count(), 0);
    }

    #[test]
    fn test_unknown_seat() {
        let registry = SeatRegistry::new(Seat::grid(1, 1));
        assert!(registry.get("Z9").is_none());
        assert!(!registry.try_set_booked("Z9"));
        assert!(!registry.set_available("Z9"));
    }

    #[test]
    fn test_list_is_ordered_by_position() {
        let mut seats = Seat::grid(2, 2);
        seats.reverse();
        let registry = SeatRegistry::new(seats);
        let ids: Vec<String> = registry.list().into_iter().map(|s| s.seat_id).collect();
        assert_eq!(ids, vec!["A1", "A2", "B1", "B2"]);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut seats = Seat::grid(1, 2);
        seats.push(Seat::new("A1", 5, 5));
        let registry = SeatRegistry::new(seats);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("A1").unwrap().position.row, 0);
    }

    #[test]
    fn test_concurrent_try_set_booked_has_one_winner() {
        let registry = Arc::new(SeatRegistry::new(Seat::grid(1, 1)));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.try_set_booked("A1"))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(registry.booked_count(), 1);
    }
}
