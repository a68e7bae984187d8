use crate::clock::Clock;
use crate::geofence::GeofenceValidator;
use crate::registry::SeatRegistry;
use crate::repository::{LedgerChange, LedgerStore, StoreError};
use crate::{ConflictKind, CoreError, CoreResult};
use chrono::{DateTime, Duration, Utc};
use findmyseat_shared::{Booking, BookingStatus, Occupancy, Seat, SeatDelta, SeatStatus};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound on a single booking, in hours.
pub const MAX_BOOKING_HOURS: f64 = 6.0;

const SHARDS: usize = 16;
const USER_GATES: usize = 64;

/// Emitted once per committed seat status change.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    pub delta: SeatDelta,
    pub occupancy: Occupancy,
}

/// Single logical writer for seat and booking state.
///
/// Locking discipline:
/// - every mutation for a user runs under the user's async gate (a fixed pool
///   picked by hashing the user id), then under the async gate of the seat it
///   touches. Both are held across persistence and event emission, so one
///   user's records and one seat's status changes reach the store and the
///   event feed in commit order;
/// - the in-memory transition itself happens under the user's shard lock and
///   then the seat's lock (always in that order), and neither is held across
///   an `.await`.
///
/// No path takes a user gate while holding a seat gate. Operations on
/// different users and seats only meet on the shard lock, and only for the
/// few instructions it takes to flip state.
pub struct BookingCoordinator {
    registry: SeatRegistry,
    active: Vec<Mutex<HashMap<String, Booking>>>,
    user_gates: Vec<tokio::sync::Mutex<()>>,
    seat_gates: HashMap<String, tokio::sync::Mutex<()>>,
    geofence: GeofenceValidator,
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<LedgerEvent>,
}

impl BookingCoordinator {
    pub fn new(
        seats: Vec<Seat>,
        geofence: GeofenceValidator,
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<LedgerEvent>,
    ) -> Self {
        let registry = SeatRegistry::new(seats);
        let seat_gates = registry
            .list()
            .into_iter()
            .map(|seat| (seat.seat_id, tokio::sync::Mutex::new(())))
            .collect();
        Self {
            registry,
            active: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            user_gates: (0..USER_GATES).map(|_| tokio::sync::Mutex::new(())).collect(),
            seat_gates,
            geofence,
            store,
            clock,
            events,
        }
    }

    /// Builds a coordinator from what the store holds.
    ///
    /// An empty store is provisioned with a `rows` x `cols` grid. Active
    /// bookings are the source of truth for seat status: a seat marked booked
    /// with no active booking is freed, and an active booking that collides
    /// with an earlier one (same user or same seat) is closed as cancelled.
    pub async fn hydrate(
        store: Arc<dyn LedgerStore>,
        geofence: GeofenceValidator,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<LedgerEvent>,
        rows: u32,
        cols: u32,
    ) -> CoreResult<Self> {
        let mut seats = store.load_seats().await.map_err(store_failure)?;
        let mut repairs = LedgerChange::new();

        if seats.is_empty() {
            seats = Seat::grid(rows, cols);
            info!("Provisioning {} seats ({} rows x {} cols)", seats.len(), rows, cols);
            repairs.seats.extend(seats.iter().cloned());
        }

        let declared: HashMap<String, SeatStatus> = seats
            .iter()
            .map(|seat| (seat.seat_id.clone(), seat.status))
            .collect();
        for seat in &mut seats {
            seat.status = SeatStatus::Available;
        }

        let mut bookings = store.load_active_bookings().await.map_err(store_failure)?;
        bookings.sort_by_key(|b| b.start_time);

        let coordinator = Self::new(seats, geofence, store.clone(), clock, events);

        for booking in bookings.into_iter().filter(Booking::is_active) {
            if let Err(mut rejected) = coordinator.adopt(booking) {
                warn!(
                    "Closing conflicting booking {} (user {}, seat {})",
                    rejected.id, rejected.user_id, rejected.seat_id
                );
                rejected.status = BookingStatus::Cancelled;
                repairs.bookings.push(rejected);
            }
        }

        for seat in coordinator.registry.list() {
            if declared.get(&seat.seat_id) != Some(&seat.status) {
                repairs.seats.retain(|s| s.seat_id != seat.seat_id);
                repairs.seats.push(seat);
            }
        }

        if !repairs.is_empty() {
            store.persist(&repairs).await.map_err(store_failure)?;
        }

        info!(
            "Ledger hydrated: {} seats, {} booked",
            coordinator.registry.len(),
            coordinator.registry.booked_count()
        );
        Ok(coordinator)
    }

    pub fn registry(&self) -> &SeatRegistry {
        &self.registry
    }

    pub fn occupancy(&self) -> Occupancy {
        Occupancy::new(self.registry.len(), self.registry.booked_count())
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Books `seat_id` for `user_id` for `duration_hours`, starting now.
    ///
    /// Checks run in order: duration, geofence, the user's existing booking,
    /// then seat availability. Of any number of concurrent calls racing for
    /// the same seat exactly one succeeds; the rest get `SeatUnavailable`.
    pub async fn book(
        &self,
        user_id: &str,
        seat_id: &str,
        duration_hours: f64,
        user_lat: f64,
        user_lon: f64,
    ) -> CoreResult<Booking> {
        let duration = booking_duration(duration_hours)?;
        if user_id.is_empty() || seat_id.is_empty() {
            return Err(CoreError::Validation("user and seat are required".to_string()));
        }
        self.geofence.check(user_lat, user_lon)?;

        // Must run before taking our own gate; reconciliation takes gates too.
        self.reconcile_expired().await;

        let _user = self.gate(user_id).lock().await;
        // Unknown seats have no gate; `claim` rejects them.
        let _seat = self.lock_seat(seat_id).await;

        let now = self.clock.now();
        let booking = match self.claim(user_id, seat_id, now, now + duration) {
            Ok(booking) => booking,
            Err(e) => {
                debug!("Booking of seat {} by {} rejected: {}", seat_id, user_id, e);
                return Err(e);
            }
        };

        let change = LedgerChange::new()
            .seat(seat_record(&self.registry, seat_id, SeatStatus::Booked))
            .booking(booking.clone());
        if let Err(e) = self.store.persist(&change).await {
            error!("Failed to persist booking {}: {}", booking.id, e);
            self.undo_claim(&booking);
            return Err(store_failure(e));
        }

        info!(
            "Seat {} booked by {} until {} (booking {})",
            seat_id, user_id, booking.end_time, booking.id
        );
        self.emit(seat_id, SeatStatus::Booked);
        Ok(booking)
    }

    /// Cancels the user's active booking and frees its seat.
    ///
    /// Returns the booking in its cancelled state. With no active booking the
    /// call fails with `NotFound` and changes nothing.
    pub async fn cancel(&self, user_id: &str) -> CoreResult<Booking> {
        self.reconcile_expired().await;

        let _user = self.gate(user_id).lock().await;

        let booking = self
            .active_booking_of(user_id)
            .ok_or_else(|| CoreError::NotFound("No active booking found".to_string()))?;
        let _seat = self.lock_seat(&booking.seat_id).await;
        let cancelled = self
            .close(user_id, booking.id, BookingStatus::Cancelled, None)
            .ok_or_else(|| CoreError::NotFound("No active booking found".to_string()))?;

        if let Err(e) = self.persist_release(&cancelled).await {
            error!("Failed to persist cancellation of booking {}: {}", cancelled.id, e);
            self.undo_close(&cancelled);
            return Err(store_failure(e));
        }

        info!("Booking {} cancelled by {}, seat {} released", cancelled.id, user_id, cancelled.seat_id);
        self.emit(&cancelled.seat_id, SeatStatus::Available);
        Ok(cancelled)
    }

    /// Snapshot of every seat, after expired bookings have been reconciled.
    pub async fn list_seats(&self) -> Vec<Seat> {
        self.reconcile_expired().await;
        self.registry.list()
    }

    pub async fn get_seat(&self, seat_id: &str) -> CoreResult<Seat> {
        self.reconcile_expired().await;
        self.registry
            .get(seat_id)
            .ok_or_else(|| CoreError::NotFound(format!("Seat {} does not exist", seat_id)))
    }

    /// The user's own active booking.
    pub async fn current_booking(&self, user_id: &str) -> CoreResult<Booking> {
        self.reconcile_expired().await;
        self.active_booking_of(user_id)
            .ok_or_else(|| CoreError::NotFound("No active booking found".to_string()))
    }

    /// Every active booking, oldest first.
    pub async fn active_bookings(&self) -> Vec<Booking> {
        self.reconcile_expired().await;
        let mut bookings: Vec<Booking> = self
            .active
            .iter()
            .flat_map(|shard| shard.lock().values().cloned().collect::<Vec<_>>())
            .collect();
        bookings.sort_by_key(|b| b.start_time);
        bookings
    }

    /// Cancels every active booking. Returns how many seats were released.
    pub async fn reset_all(&self) -> CoreResult<usize> {
        let mut released = 0;
        let mut failures = 0;

        for (user_id, booking_id, seat_id) in self.active_ids(|_| true) {
            let _user = self.gate(&user_id).lock().await;
            let _seat = self.lock_seat(&seat_id).await;

            let Some(cancelled) = self.close(&user_id, booking_id, BookingStatus::Cancelled, None) else {
                continue;
            };
            if let Err(e) = self.persist_release(&cancelled).await {
                error!("Failed to persist reset of booking {}: {}", cancelled.id, e);
                self.undo_close(&cancelled);
                failures += 1;
                continue;
            }
            self.emit(&cancelled.seat_id, SeatStatus::Available);
            released += 1;
        }

        info!("Reset released {} seats", released);
        if failures > 0 {
            return Err(CoreError::Internal(format!(
                "{} bookings could not be reset",
                failures
            )));
        }
        Ok(released)
    }

    /// Moves every active booking whose end time has passed to `Expired` and
    /// frees its seat. Shared by the sweeper and every lazy read path.
    ///
    /// The transition is guarded on the booking still being the user's active
    /// one, so overlapping sweeps and racing cancels each settle a booking once.
    pub async fn reconcile_expired(&self) -> usize {
        let now = self.clock.now();
        let mut expired = 0;

        for (user_id, booking_id, seat_id) in self.active_ids(|b| b.is_due(now)) {
            let _user = self.gate(&user_id).lock().await;
            let _seat = self.lock_seat(&seat_id).await;

            let Some(booking) = self.close(&user_id, booking_id, BookingStatus::Expired, Some(now)) else {
                continue;
            };
            // Time alone decides expiry, so a failed write does not undo it;
            // the record is rewritten the next time this booking is saved.
            if let Err(e) = self.persist_release(&booking).await {
                error!("Failed to persist expiry of booking {}: {}", booking.id, e);
            }
            info!("Booking {} expired, seat {} released", booking.id, booking.seat_id);
            self.emit(&booking.seat_id, SeatStatus::Available);
            expired += 1;
        }

        expired
    }

    // ------------------------------------------------------------------
    // In-memory transitions. None of these await.
    // ------------------------------------------------------------------

    fn shard(&self, user_id: &str) -> &Mutex<HashMap<String, Booking>> {
        &self.active[slot(user_id, SHARDS)]
    }

    fn gate(&self, user_id: &str) -> &tokio::sync::Mutex<()> {
        &self.user_gates[slot(user_id, USER_GATES)]
    }

    async fn lock_seat(&self, seat_id: &str) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match self.seat_gates.get(seat_id) {
            Some(gate) => Some(gate.lock().await),
            None => None,
        }
    }

    fn active_booking_of(&self, user_id: &str) -> Option<Booking> {
        self.shard(user_id).lock().get(user_id).cloned()
    }

    fn active_ids(&self, predicate: impl Fn(&Booking) -> bool) -> Vec<(String, Uuid, String)> {
        self.active
            .iter()
            .flat_map(|shard| {
                shard
                    .lock()
                    .values()
                    .filter(|b| predicate(b))
                    .map(|b| (b.user_id.clone(), b.id, b.seat_id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn claim(
        &self,
        user_id: &str,
        seat_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Booking> {
        let mut shard = self.shard(user_id).lock();
        if shard.contains_key(user_id) {
            return Err(CoreError::Conflict(ConflictKind::AlreadyBooked));
        }
        if !self.registry.try_set_booked(seat_id) {
            return Err(CoreError::Conflict(ConflictKind::SeatUnavailable));
        }
        let booking = Booking::new(user_id, seat_id, start, end);
        shard.insert(user_id.to_string(), booking.clone());
        Ok(booking)
    }

    /// Active -> `status` for the given booking, only if it is still the
    /// user's active booking (and, when `due_at` is set, has ended by then).
    fn close(
        &self,
        user_id: &str,
        booking_id: Uuid,
        status: BookingStatus,
        due_at: Option<DateTime<Utc>>,
    ) -> Option<Booking> {
        let mut shard = self.shard(user_id).lock();
        let current = shard.get(user_id)?;
        if current.id != booking_id || due_at.is_some_and(|now| !current.is_due(now)) {
            return None;
        }
        let mut booking = shard.remove(user_id)?;
        booking.status = status;
        self.registry.set_available(&booking.seat_id);
        Some(booking)
    }

    fn adopt(&self, booking: Booking) -> Result<(), Booking> {
        let mut shard = self.shard(&booking.user_id).lock();
        if shard.contains_key(&booking.user_id) || !self.registry.try_set_booked(&booking.seat_id) {
            return Err(booking);
        }
        shard.insert(booking.user_id.clone(), booking);
        Ok(())
    }

    fn undo_claim(&self, booking: &Booking) {
        let mut shard = self.shard(&booking.user_id).lock();
        if shard.get(&booking.user_id).map(|b| b.id) == Some(booking.id) {
            shard.remove(&booking.user_id);
            self.registry.set_available(&booking.seat_id);
        }
    }

    fn undo_close(&self, closed: &Booking) {
        let mut shard = self.shard(&closed.user_id).lock();
        if shard.contains_key(&closed.user_id) || !self.registry.try_set_booked(&closed.seat_id) {
            warn!(
                "Could not restore booking {} after failed write; seat {} was taken",
                closed.id, closed.seat_id
            );
            return;
        }
        let mut restored = closed.clone();
        restored.status = BookingStatus::Active;
        shard.insert(restored.user_id.clone(), restored);
    }

    async fn persist_release(&self, booking: &Booking) -> Result<(), StoreError> {
        let change = LedgerChange::new()
            .seat(seat_record(&self.registry, &booking.seat_id, SeatStatus::Available))
            .booking(booking.clone());
        self.store.persist(&change).await
    }

    fn emit(&self, seat_id: &str, status: SeatStatus) {
        let event = LedgerEvent {
            delta: SeatDelta { seat_id: seat_id.to_string(), status },
            occupancy: self.occupancy(),
        };
        if self.events.send(event).is_err() {
            debug!("No event relay attached, dropping delta for seat {}", seat_id);
        }
    }
}

/// Validates a requested duration and converts it to a `chrono::Duration`.
pub fn booking_duration(hours: f64) -> CoreResult<Duration> {
    if !hours.is_finite() || hours <= 0.0 || hours > MAX_BOOKING_HOURS {
        return Err(CoreError::Validation(format!(
            "duration must be greater than 0 and at most {} hours",
            MAX_BOOKING_HOURS
        )));
    }
    let millis = (hours * 3_600_000.0).round() as i64;
    if millis == 0 {
        return Err(CoreError::Validation("duration is too short".to_string()));
    }
    Ok(Duration::milliseconds(millis))
}

fn seat_record(registry: &SeatRegistry, seat_id: &str, status: SeatStatus) -> Seat {
    let mut seat = registry
        .get(seat_id)
        .unwrap_or_else(|| Seat::new(seat_id, 0, 0));
    seat.status = status;
    seat
}

fn slot(key: &str, slots: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish() as usize % slots
}

fn store_failure(e: StoreError) -> CoreError {
    CoreError::Internal(e.to_string())
}
