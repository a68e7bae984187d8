use async_trait::async_trait;
use findmyseat_core::{LedgerChange, LedgerStore, StoreError};
use findmyseat_shared::{Booking, Seat};
use redis::{AsyncCommands, RedisResult};
use tracing::{debug, warn};

const SEAT_INDEX: &str = "seats";
const ACTIVE_INDEX: &str = "bookings:active";

fn seat_key(seat_id: &str) -> String {
    format!("seat:{}", seat_id)
}

fn booking_key(booking_id: &str) -> String {
    format!("booking:{}", booking_id)
}

/// Redis-backed ledger.
///
/// Layout: `seat:{id}` and `booking:{uuid}` hold JSON records, `seats` is the
/// set of seat ids and `bookings:active` the set of active booking ids.
/// Each `persist` runs as one MULTI/EXEC transaction.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn load_records<T: serde::de::DeserializeOwned>(
        &self,
        index: &str,
        key: fn(&str) -> String,
    ) -> Result<Vec<T>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ids: Vec<String> = conn.smembers(index).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = ids.iter().map(|id| key(id)).collect();
        let raw: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut records = Vec::with_capacity(raw.len());
        for (id, value) in ids.iter().zip(raw) {
            match value {
                Some(json) => records.push(serde_json::from_str(&json)?),
                None => warn!("Index {} references missing record {}", index, id),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl LedgerStore for RedisStore {
    async fn load_seats(&self) -> Result<Vec<Seat>, StoreError> {
        let mut seats: Vec<Seat> = self.load_records(SEAT_INDEX, seat_key).await?;
        seats.sort_by_key(|s| s.position);
        Ok(seats)
    }

    async fn load_active_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let bookings: Vec<Booking> = self.load_records(ACTIVE_INDEX, booking_key).await?;
        Ok(bookings.into_iter().filter(|b| b.is_active()).collect())
    }

    async fn persist(&self, change: &LedgerChange) -> Result<(), StoreError> {
        if change.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();

        for seat in &change.seats {
            pipe.set(seat_key(&seat.seat_id), serde_json::to_string(seat)?)
                .ignore()
                .sadd(SEAT_INDEX, &seat.seat_id)
                .ignore();
        }
        for booking in &change.bookings {
            let id = booking.id.to_string();
            pipe.set(booking_key(&id), serde_json::to_string(booking)?).ignore();
            if booking.is_active() {
                pipe.sadd(ACTIVE_INDEX, &id).ignore();
            } else {
                pipe.srem(ACTIVE_INDEX, &id).ignore();
            }
        }

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        pipe.query_async::<()>(&mut conn).await?;
        debug!(
            "Persisted {} seats and {} bookings",
            change.seats.len(),
            change.bookings.len()
        );
        Ok(())
    }
}
