//! Persistence seams.
//!
//! The engine talks to storage through these traits, held behind
//! `Arc<dyn …>`. The Postgres implementations delegate to `roomly-db`;
//! the in-memory implementations back the test suites.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roomly_core::{BookingId, ResourceId, Result};
use roomly_db::{Booking, BookingChanges, BookingFilter, NewActivity, NewBooking, Room};

pub use memory::{InMemoryActivityLog, InMemoryBookingStore, InMemoryRoomStore};
pub use pg::{PgActivityLog, PgBookingStore, PgRoomStore};

/// Store for booking rows.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Point lookup by id.
    async fn get(&self, id: BookingId) -> Result<Option<Booking>>;

    /// Resolve the local counterpart of an external event by the
    /// composite calendar-id + event-id key.
    async fn find_by_event(&self, calendar_id: &str, event_id: &str) -> Result<Option<Booking>>;

    /// Lookup by single-use action token.
    async fn find_by_action_token(&self, token: &str) -> Result<Option<Booking>>;

    /// Filtered range query.
    async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>>;

    /// Insert one booking.
    async fn insert(&self, new: NewBooking) -> Result<Booking>;

    /// Insert several bookings atomically; either all land or none do.
    async fn insert_many(&self, bookings: Vec<NewBooking>) -> Result<Vec<Booking>>;

    /// Apply a partial update, returning the updated row.
    ///
    /// # Errors
    ///
    /// `NotFound` when the booking does not exist.
    async fn update(&self, id: BookingId, changes: BookingChanges) -> Result<Booking>;

    /// Cancel every listed booking still `scheduled` or `in_progress`.
    /// Returns how many rows were actually cancelled.
    async fn cancel_many(&self, ids: &[BookingId]) -> Result<u64>;

    /// All occurrences referencing a series parent, ordered by start.
    async fn series_members(&self, parent_id: BookingId) -> Result<Vec<Booking>>;

    /// Scheduled, never-checked-in bookings with `start_time <= cutoff`.
    async fn no_show_candidates(
        &self,
        cutoff: DateTime<Utc>,
        resource_id: Option<ResourceId>,
        limit: i64,
    ) -> Result<Vec<Booking>>;

    /// Scheduled, unreminded bookings with `start_time <= cutoff`.
    async fn reminder_candidates(&self, cutoff: DateTime<Utc>, limit: i64)
        -> Result<Vec<Booking>>;

    /// One reconciliation pass: bulk update of matched rows plus bulk
    /// insert of brand-new ones. Returns `(updated, created)`.
    async fn sync_upsert(
        &self,
        updates: Vec<(BookingId, BookingChanges)>,
        inserts: Vec<NewBooking>,
    ) -> Result<(usize, usize)>;

    /// Delete a booking, tombstoning its external event id so sync
    /// cannot resurrect it.
    async fn delete(&self, id: BookingId) -> Result<()>;

    /// Check whether an external event id belongs to a deleted booking.
    async fn is_event_tombstoned(&self, calendar_id: &str, event_id: &str) -> Result<bool>;
}

/// Read access to rooms.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Point lookup by id.
    async fn get(&self, id: ResourceId) -> Result<Option<Room>>;
}

/// Append-only activity sink.
#[async_trait]
pub trait ActivityLog: Send + Sync {
    /// Append one record.
    async fn append(&self, activity: NewActivity) -> Result<()>;
}
