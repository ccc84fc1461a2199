//! Room model.
//!
//! The engine only needs a narrow slice of the room entity: its external
//! calendar identifier, the maximum-duration override and the walk-up
//! permission flag. Admin CRUD over rooms lives elsewhere.

use chrono::{DateTime, Utc};
use roomly_core::ResourceId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A bookable room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier.
    pub id: ResourceId,
    /// Display name.
    pub name: String,
    /// External calendar address, or `None` when the room is not managed
    /// by the external calendar (purely local scheduling).
    pub calendar_id: Option<String>,
    /// Maximum booking duration override in minutes; falls back to the
    /// global default when absent.
    pub max_booking_minutes: Option<i32>,
    /// Whether walk-up (tablet) bookings are allowed.
    pub allow_walk_up: bool,
    /// Whether the room is bookable at all.
    pub active: bool,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

/// Request to insert a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRoom {
    pub id: ResourceId,
    pub name: String,
    pub calendar_id: Option<String>,
    pub max_booking_minutes: Option<i32>,
    pub allow_walk_up: bool,
}

/// Row from database query.
#[derive(Debug, FromRow)]
struct RoomRow {
    id: Uuid,
    name: String,
    calendar_id: Option<String>,
    max_booking_minutes: Option<i32>,
    allow_walk_up: bool,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_room(self) -> Room {
        Room {
            id: ResourceId::from_uuid(self.id),
            name: self.name,
            calendar_id: self.calendar_id,
            max_booking_minutes: self.max_booking_minutes,
            allow_walk_up: self.allow_walk_up,
            active: self.active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Room {
    /// Find a room by ID.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        id: ResourceId,
    ) -> Result<Option<Self>, sqlx::Error> {
        let row: Option<RoomRow> = sqlx::query_as("SELECT * FROM rooms WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(pool)
            .await?;
        Ok(row.map(RoomRow::into_room))
    }

    /// List all active rooms, ordered by name.
    pub async fn list_active(pool: &sqlx::PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let rows: Vec<RoomRow> =
            sqlx::query_as("SELECT * FROM rooms WHERE active ORDER BY name")
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(RoomRow::into_room).collect())
    }

    /// Insert a room.
    pub async fn insert(pool: &sqlx::PgPool, new: &NewRoom) -> Result<Self, sqlx::Error> {
        let row: RoomRow = sqlx::query_as(
            r#"
            INSERT INTO rooms (id, name, calendar_id, max_booking_minutes, allow_walk_up)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new.id.as_uuid())
        .bind(&new.name)
        .bind(&new.calendar_id)
        .bind(new.max_booking_minutes)
        .bind(new.allow_walk_up)
        .fetch_one(pool)
        .await?;
        Ok(row.into_room())
    }
}
