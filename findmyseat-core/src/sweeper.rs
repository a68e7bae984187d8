use crate::coordinator::BookingCoordinator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically expires bookings whose end time has passed.
///
/// Runs the same reconciliation the coordinator applies lazily on reads, so
/// a missed tick is caught up by the next tick or the next read.
pub struct ExpirySweeper {
    coordinator: Arc<BookingCoordinator>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(coordinator: Arc<BookingCoordinator>, interval: Duration) -> Self {
        Self { coordinator, interval }
    }

    /// One pass. Returns the number of bookings expired.
    pub async fn tick(&self) -> usize {
        let expired = self.coordinator.reconcile_expired().await;
        if expired > 0 {
            info!("Expiry sweep released {} seats", expired);
        } else {
            debug!("Expiry sweep found nothing to do");
        }
        expired
    }

    pub async fn run(self) {
        info!("Expiry sweeper started, interval {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::{harness, VENUE_LAT, VENUE_LON};
    use chrono::Duration as ChronoDuration;
    use findmyseat_shared::{BookingStatus, SeatStatus};

    #[tokio::test]
    async fn test_sweep_expires_then_is_noop() {
        let mut h = harness(1, 2);
        let booking = h.coordinator.book("user-1", "A1", 2.0, VENUE_LAT, VENUE_LON).await.unwrap();
        while h.events.try_recv().is_ok() {}

        let sweeper = ExpirySweeper::new(h.coordinator.clone(), Duration::from_secs(30));
        assert_eq!(sweeper.tick().await, 0);

        h.clock.advance(ChronoDuration::hours(2) + ChronoDuration::seconds(1));
        assert_eq!(sweeper.tick().await, 1);
        assert!(h.coordinator.registry().get("A1").unwrap().is_available());

        let event = h.events.try_recv().unwrap();
        assert_eq!(event.delta.seat_id, "A1");
        assert_eq!(event.delta.status, SeatStatus::Available);
        assert!(h.events.try_recv().is_err());

        let writes = h.store.writes.lock().len();
        let last = h.store.writes.lock().last().unwrap().bookings[0].clone();
        assert_eq!(last.id, booking.id);
        assert_eq!(last.status, BookingStatus::Expired);

        assert_eq!(sweeper.tick().await, 0);
        assert!(h.events.try_recv().is_err());
        assert_eq!(h.store.writes.lock().len(), writes);
    }

    #[tokio::test]
    async fn test_sweep_leaves_cancelled_booking_alone() {
        let mut h = harness(1, 1);
        h.coordinator.book("user-1", "A1", 1.0, VENUE_LAT, VENUE_LON).await.unwrap();
        h.coordinator.cancel("user-1").await.unwrap();
        while h.events.try_recv().is_ok() {}

        h.clock.advance(ChronoDuration::hours(3));
        let sweeper = ExpirySweeper::new(h.coordinator.clone(), Duration::from_secs(30));
        assert_eq!(sweeper.tick().await, 0);
        assert!(h.events.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_sweeps_expire_once() {
        let mut h = harness(2, 5);
        for i in 0..10 {
            let seat = format!("{}{}", if i < 5 { 'A' } else { 'B' }, i % 5 + 1);
            h.coordinator
                .book(&format!("user-{}", i), &seat, 1.0, VENUE_LAT, VENUE_LON)
                .await
                .unwrap();
        }
        while h.events.try_recv().is_ok() {}
        h.clock.advance(ChronoDuration::hours(1));

        let sweeps: Vec<_> = (0..4)
            .map(|_| {
                let sweeper = ExpirySweeper::new(h.coordinator.clone(), Duration::from_secs(30));
                tokio::spawn(async move { sweeper.tick().await })
            })
            .collect();
        let mut total = 0;
        for sweep in sweeps {
            total += sweep.await.unwrap();
        }

        assert_eq!(total, 10);
        let mut released = 0;
        while h.events.try_recv().is_ok() {
            released += 1;
        }
        assert_eq!(released, 10);
        assert_eq!(h.coordinator.occupancy().booked_seats, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sweep_racing_cancel_settles_booking_once() {
        for _ in 0..20 {
            let mut h = harness(1, 1);
            let booking = h.coordinator.book("user-1", "A1", 1.0, VENUE_LAT, VENUE_LON).await.unwrap();
            while h.events.try_recv().is_ok() {}
            let writes = h.store.writes.lock().len();
            h.clock.advance(ChronoDuration::hours(1));

            let sweeper = ExpirySweeper::new(h.coordinator.clone(), Duration::from_secs(30));
            let sweep = tokio::spawn(async move { sweeper.tick().await });
            let coordinator = h.coordinator.clone();
            let cancel = tokio::spawn(async move { coordinator.cancel("user-1").await });

            let expired = sweep.await.unwrap();
            let cancelled = cancel.await.unwrap();
            match &cancelled {
                Ok(b) => assert_eq!(b.status, BookingStatus::Cancelled),
                Err(e) => assert!(matches!(e, crate::CoreError::NotFound(_))),
            }
            assert!(expired <= 1);

            assert_eq!(h.store.writes.lock().len(), writes + 1);
            let last = h.store.writes.lock().last().unwrap().bookings[0].clone();
            assert_eq!(last.id, booking.id);
            assert!(matches!(last.status, BookingStatus::Expired | BookingStatus::Cancelled));

            let mut released = 0;
            while let Ok(event) = h.events.try_recv() {
                assert_eq!(event.delta.status, SeatStatus::Available);
                released += 1;
            }
            assert_eq!(released, 1);
            assert!(h.coordinator.registry().get("A1").unwrap().is_available());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_on_interval() {
        let h = harness(1, 1);
        h.coordinator.book("user-1", "A1", 1.0, VENUE_LAT, VENUE_LON).await.unwrap();
        h.clock.advance(ChronoDuration::hours(1));

        let sweeper = ExpirySweeper::new(h.coordinator.clone(), Duration::from_secs(30));
        let task = tokio::spawn(sweeper.run());
        tokio::time::sleep(Duration::from_secs(31)).await;
        task.abort();

        assert!(h.coordinator.registry().get("A1").unwrap().is_available());
    }
}
