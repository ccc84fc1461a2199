//! Postgres store implementations.
//!
//! Thin adapters from the store traits onto the `roomly-db` model
//! queries, translating `sqlx::Error` into the engine's error type at
//! the boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roomly_core::{BookingError, BookingId, ResourceId, Result};
use roomly_db::{
    Booking, BookingActivity, BookingChanges, BookingFilter, NewActivity, NewBooking, Room,
};
use sqlx::PgPool;

use super::{ActivityLog, BookingStore, RoomStore};

fn db_err(e: sqlx::Error) -> BookingError {
    BookingError::database(e.to_string())
}

/// [`BookingStore`] over a Postgres pool.
pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        Booking::find_by_id(&self.pool, id).await.map_err(db_err)
    }

    async fn find_by_event(&self, calendar_id: &str, event_id: &str) -> Result<Option<Booking>> {
        Booking::find_by_event(&self.pool, calendar_id, event_id)
            .await
            .map_err(db_err)
    }

    async fn find_by_action_token(&self, token: &str) -> Result<Option<Booking>> {
        Booking::find_by_action_token(&self.pool, token)
            .await
            .map_err(db_err)
    }

    async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        Booking::list(&self.pool, filter).await.map_err(db_err)
    }

    async fn insert(&self, new: NewBooking) -> Result<Booking> {
        Booking::insert(&self.pool, &new).await.map_err(db_err)
    }

    async fn insert_many(&self, bookings: Vec<NewBooking>) -> Result<Vec<Booking>> {
        Booking::insert_many(&self.pool, &bookings)
            .await
            .map_err(db_err)
    }

    async fn update(&self, id: BookingId, changes: BookingChanges) -> Result<Booking> {
        Booking::update(&self.pool, id, &changes)
            .await
            .map_err(db_err)?
            .ok_or_else(|| BookingError::not_found("Booking", id.to_string()))
    }

    async fn cancel_many(&self, ids: &[BookingId]) -> Result<u64> {
        Booking::cancel_many(&self.pool, ids).await.map_err(db_err)
    }

    async fn series_members(&self, parent_id: BookingId) -> Result<Vec<Booking>> {
        Booking::series_members(&self.pool, parent_id)
            .await
            .map_err(db_err)
    }

    async fn no_show_candidates(
        &self,
        cutoff: DateTime<Utc>,
        resource_id: Option<ResourceId>,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        Booking::no_show_candidates(&self.pool, cutoff, resource_id, limit)
            .await
            .map_err(db_err)
    }

    async fn reminder_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        Booking::reminder_candidates(&self.pool, cutoff, limit)
            .await
            .map_err(db_err)
    }

    async fn sync_upsert(
        &self,
        updates: Vec<(BookingId, BookingChanges)>,
        inserts: Vec<NewBooking>,
    ) -> Result<(usize, usize)> {
        Booking::sync_upsert(&self.pool, &updates, &inserts)
            .await
            .map_err(db_err)
    }

    async fn delete(&self, id: BookingId) -> Result<()> {
        Booking::delete(&self.pool, id).await.map_err(db_err)
    }

    async fn is_event_tombstoned(&self, calendar_id: &str, event_id: &str) -> Result<bool> {
        Booking::is_event_tombstoned(&self.pool, calendar_id, event_id)
            .await
            .map_err(db_err)
    }
}

/// [`RoomStore`] over a Postgres pool.
pub struct PgRoomStore {
    pool: PgPool,
}

impl PgRoomStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn get(&self, id: ResourceId) -> Result<Option<Room>> {
        Room::find_by_id(&self.pool, id).await.map_err(db_err)
    }
}

/// [`ActivityLog`] over a Postgres pool.
pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLog for PgActivityLog {
    async fn append(&self, activity: NewActivity) -> Result<()> {
        BookingActivity::record(&self.pool, &activity)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
