//! roomly Database Layer
//!
//! Postgres models and queries for bookings, rooms and the activity log.
//! Model structs carry static async methods over `&PgPool`; enums map to
//! Postgres enum types via `sqlx::Type`. Schema lives in `migrations/`.

pub mod models;

pub use models::activity::{BookingAction, BookingActivity, NewActivity};
pub use models::booking::{
    Booking, BookingChanges, BookingFilter, BookingSource, BookingStatus, NewBooking,
    RecurrenceRule,
};
pub use models::room::{NewRoom, Room};
