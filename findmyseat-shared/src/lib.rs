pub mod models;

pub use models::booking::{Booking, BookingStatus};
pub use models::events::{Occupancy, SeatDelta, WireEvent};
pub use models::seat::{Seat, SeatPosition, SeatStatus};
