//! Booking activity log.
//!
//! Append-only audit trail of lifecycle actions. One record per
//! transition, with a jsonb metadata column for action-specific detail
//! (grace window used, extension minutes, cancelled count).

use chrono::{DateTime, Utc};
use roomly_core::{BookingId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle action recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    /// Booking created.
    Created,
    /// Booking checked in.
    CheckedIn,
    /// Booking extended.
    Extended,
    /// Booking ended before its scheduled end.
    EndedEarly,
    /// Booking cancelled.
    Cancelled,
    /// Whole series cancelled from the parent.
    SeriesCancelled,
    /// Booking transitioned to no-show by the scanner.
    NoShow,
    /// Overdue reminder sent.
    ReminderSent,
    /// Booking created or refreshed from an external calendar event.
    SyncedFromCalendar,
}

/// An activity log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingActivity {
    /// Unique identifier.
    pub id: Uuid,
    /// The booking this record belongs to.
    pub booking_id: BookingId,
    /// What happened.
    pub action: BookingAction,
    /// Who performed the action, when known.
    pub performed_by: Option<UserId>,
    /// Action-specific detail.
    pub metadata: serde_json::Value,
    /// When the record was appended.
    pub created_at: DateTime<Utc>,
}

/// Request to append an activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub booking_id: BookingId,
    pub action: BookingAction,
    pub performed_by: Option<UserId>,
    pub metadata: serde_json::Value,
}

/// Row from database query.
#[derive(Debug, FromRow)]
struct ActivityRow {
    id: Uuid,
    booking_id: Uuid,
    action: BookingAction,
    performed_by: Option<Uuid>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl ActivityRow {
    fn into_activity(self) -> BookingActivity {
        BookingActivity {
            id: self.id,
            booking_id: BookingId::from_uuid(self.booking_id),
            action: self.action,
            performed_by: self.performed_by.map(UserId::from_uuid),
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

impl BookingActivity {
    /// Append an activity record.
    pub async fn record(pool: &sqlx::PgPool, new: &NewActivity) -> Result<Self, sqlx::Error> {
        let row: ActivityRow = sqlx::query_as(
            r#"
            INSERT INTO booking_activity (booking_id, action, performed_by, metadata)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(new.booking_id.as_uuid())
        .bind(new.action)
        .bind(new.performed_by.map(|u| *u.as_uuid()))
        .bind(&new.metadata)
        .fetch_one(pool)
        .await?;
        Ok(row.into_activity())
    }

    /// List records for one booking, newest first.
    pub async fn list_for_booking(
        pool: &sqlx::PgPool,
        booking_id: BookingId,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            r#"
            SELECT * FROM booking_activity
            WHERE booking_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(booking_id.as_uuid())
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(ActivityRow::into_activity).collect())
    }
}
