//! Booking model.
//!
//! The central entity of the engine: a single booking, or the parent or
//! one occurrence of a recurring series. Rows are read into [`BookingRow`]
//! and converted to the domain [`Booking`] with typed ids and a typed
//! recurrence rule.

use chrono::{DateTime, NaiveDate, Utc};
use roomly_core::{BookingError, BookingId, ResourceId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a booking.
///
/// `Ended`, `Cancelled` and `NoShow` are terminal: once a booking reaches
/// one of them through a local lifecycle action, no later operation or
/// sync pass may move it away (cancellation may still be adopted from an
/// external signal over `Scheduled`/`InProgress`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Booked, not yet started or checked in.
    Scheduled,
    /// Checked in and running.
    InProgress,
    /// Ended, either naturally or early.
    Ended,
    /// Cancelled locally or by an external cancellation signal.
    Cancelled,
    /// Never checked in within the grace window.
    NoShow,
}

impl BookingStatus {
    /// Database/string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
            Self::NoShow => "no_show",
        }
    }

    /// Check whether this status is terminal for user-initiated actions.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled | Self::NoShow)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Channel a booking request came in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingSource {
    /// Room tablet (walk-up).
    Tablet,
    /// Web UI.
    Web,
    /// Public API.
    Api,
    /// Admin console.
    Admin,
}

/// Recurrence rule carried by a series parent.
///
/// Only weekly-by-weekday and monthly-by-day-of-month patterns exist;
/// weekday numbers are 0=Sunday..6=Saturday, a day-of-month past the end
/// of a shorter month clips to that month's last day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecurrenceRule {
    /// Repeats on the given weekdays every week.
    Weekly {
        /// Weekday numbers, 0=Sunday..6=Saturday.
        weekdays: Vec<u8>,
    },
    /// Repeats on the given day of each month.
    MonthlyDay {
        /// Day of month, 1-31, clipped to shorter months.
        day: u8,
    },
}

impl RecurrenceRule {
    /// Validate the rule shape.
    pub fn validate(&self) -> Result<(), BookingError> {
        match self {
            Self::Weekly { weekdays } => {
                if weekdays.is_empty() {
                    return Err(BookingError::validation(
                        "recurrence",
                        "weekly rule requires at least one weekday",
                    ));
                }
                if weekdays.iter().any(|d| *d > 6) {
                    return Err(BookingError::validation(
                        "recurrence",
                        "weekday numbers must be 0 (Sunday) through 6 (Saturday)",
                    ));
                }
                Ok(())
            }
            Self::MonthlyDay { day } => {
                if !(1..=31).contains(day) {
                    return Err(BookingError::validation(
                        "recurrence",
                        "day of month must be between 1 and 31",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Render the rule in the external calendar's native RRULE syntax,
    /// bounded by the inclusive end date.
    #[must_use]
    pub fn to_rrule(&self, until: NaiveDate) -> String {
        let until = until.format("%Y%m%d").to_string();
        match self {
            Self::Weekly { weekdays } => {
                const BYDAY: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];
                let mut days: Vec<u8> = weekdays.clone();
                days.sort_unstable();
                days.dedup();
                let byday: Vec<&str> = days
                    .iter()
                    .filter(|d| **d <= 6)
                    .map(|d| BYDAY[*d as usize])
                    .collect();
                format!(
                    "RRULE:FREQ=WEEKLY;BYDAY={};UNTIL={}T235959Z",
                    byday.join(","),
                    until
                )
            }
            Self::MonthlyDay { day } => {
                format!("RRULE:FREQ=MONTHLY;BYMONTHDAY={day};UNTIL={until}T235959Z")
            }
        }
    }
}

/// A booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Unique identifier.
    pub id: BookingId,
    /// Room this booking occupies.
    pub resource_id: ResourceId,
    /// Title (event summary).
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Start instant.
    pub start_time: DateTime<Utc>,
    /// End instant; always strictly after `start_time`.
    pub end_time: DateTime<Utc>,
    /// Lifecycle status.
    pub status: BookingStatus,
    /// Channel the booking came in through.
    pub source: BookingSource,
    /// Host user; absent for walk-up/anonymous bookings.
    pub host_user_id: Option<UserId>,
    /// Organizer email fallback when no host user is linked.
    pub organizer_email: Option<String>,
    /// Attendee emails, deduplicated, organizer excluded.
    pub attendees: Vec<String>,
    /// External calendar the mirrored event lives on.
    pub calendar_id: Option<String>,
    /// External event id of the mirrored event.
    pub calendar_event_id: Option<String>,
    /// True when the booking was created directly in the external
    /// calendar UI and adopted by reconciliation.
    pub external_origin: bool,
    /// True on the parent of a recurring series.
    pub is_recurring: bool,
    /// Recurrence rule (series parents only).
    pub recurrence: Option<RecurrenceRule>,
    /// Inclusive end date of the series (series parents only).
    pub recurrence_end_date: Option<NaiveDate>,
    /// Back-reference from an occurrence to its series parent. Grouping
    /// only, not ownership.
    pub recurring_parent_id: Option<BookingId>,
    /// When the booking was checked in; null until check-in.
    pub checked_in_at: Option<DateTime<Utc>>,
    /// Number of successful extensions.
    pub extension_count: i32,
    /// Last reconciliation pass that touched this row.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Single-use token for out-of-band action links.
    pub action_token: Option<String>,
    /// When the overdue reminder was sent; null until sent.
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Check whether this booking's status is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Booked duration in whole minutes.
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Materialize a booking from an insert request.
    ///
    /// Used by the in-memory store; the Postgres path lets the database
    /// fill the timestamps via `RETURNING *`.
    #[must_use]
    pub fn from_new(new: NewBooking, now: DateTime<Utc>) -> Self {
        Self {
            id: new.id,
            resource_id: new.resource_id,
            title: new.title,
            description: new.description,
            start_time: new.start_time,
            end_time: new.end_time,
            status: new.status,
            source: new.source,
            host_user_id: new.host_user_id,
            organizer_email: new.organizer_email,
            attendees: new.attendees,
            calendar_id: new.calendar_id,
            calendar_event_id: new.calendar_event_id,
            external_origin: new.external_origin,
            is_recurring: new.is_recurring,
            recurrence: new.recurrence,
            recurrence_end_date: new.recurrence_end_date,
            recurring_parent_id: new.recurring_parent_id,
            checked_in_at: new.checked_in_at,
            extension_count: 0,
            last_synced_at: new.last_synced_at,
            action_token: new.action_token,
            reminder_sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to insert a new booking. The id is generated by the caller so
/// the engine can reference the row (private properties, series parents)
/// before the insert lands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBooking {
    pub id: BookingId,
    pub resource_id: ResourceId,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub source: BookingSource,
    pub host_user_id: Option<UserId>,
    pub organizer_email: Option<String>,
    pub attendees: Vec<String>,
    pub calendar_id: Option<String>,
    pub calendar_event_id: Option<String>,
    pub external_origin: bool,
    pub is_recurring: bool,
    pub recurrence: Option<RecurrenceRule>,
    pub recurrence_end_date: Option<NaiveDate>,
    pub recurring_parent_id: Option<BookingId>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub action_token: Option<String>,
}

/// Partial update to a booking. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingChanges {
    pub status: Option<BookingStatus>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub extension_count: Option<i32>,
    pub attendees: Option<Vec<String>>,
    pub organizer_email: Option<String>,
    pub calendar_id: Option<String>,
    pub calendar_event_id: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
}

impl BookingChanges {
    /// Check whether the update carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.checked_in_at.is_none()
            && self.extension_count.is_none()
            && self.attendees.is_none()
            && self.organizer_email.is_none()
            && self.calendar_id.is_none()
            && self.calendar_event_id.is_none()
            && self.last_synced_at.is_none()
            && self.reminder_sent_at.is_none()
    }
}

/// Filter options for listing bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    /// Restrict to one room.
    pub resource_id: Option<ResourceId>,
    /// Restrict to these statuses (empty = all).
    pub statuses: Vec<BookingStatus>,
    /// Only bookings overlapping the window: `start_time < before`.
    pub starts_before: Option<DateTime<Utc>>,
    /// Only bookings overlapping the window: `end_time > after`.
    pub ends_after: Option<DateTime<Utc>>,
    /// Restrict to occurrences of one series.
    pub recurring_parent_id: Option<BookingId>,
    /// Row cap.
    pub limit: Option<i64>,
}

/// Row from database query.
#[derive(Debug, FromRow)]
struct BookingRow {
    id: Uuid,
    resource_id: Uuid,
    title: Option<String>,
    description: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: BookingStatus,
    source: BookingSource,
    host_user_id: Option<Uuid>,
    organizer_email: Option<String>,
    attendees: Vec<String>,
    calendar_id: Option<String>,
    calendar_event_id: Option<String>,
    external_origin: bool,
    is_recurring: bool,
    recurrence: Option<serde_json::Value>,
    recurrence_end_date: Option<NaiveDate>,
    recurring_parent_id: Option<Uuid>,
    checked_in_at: Option<DateTime<Utc>>,
    extension_count: i32,
    last_synced_at: Option<DateTime<Utc>>,
    action_token: Option<String>,
    reminder_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Booking {
        Booking {
            id: BookingId::from_uuid(self.id),
            resource_id: ResourceId::from_uuid(self.resource_id),
            title: self.title,
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            source: self.source,
            host_user_id: self.host_user_id.map(UserId::from_uuid),
            organizer_email: self.organizer_email,
            attendees: self.attendees,
            calendar_id: self.calendar_id,
            calendar_event_id: self.calendar_event_id,
            external_origin: self.external_origin,
            is_recurring: self.is_recurring,
            recurrence: self.recurrence.and_then(|v| serde_json::from_value(v).ok()),
            recurrence_end_date: self.recurrence_end_date,
            recurring_parent_id: self.recurring_parent_id.map(BookingId::from_uuid),
            checked_in_at: self.checked_in_at,
            extension_count: self.extension_count,
            last_synced_at: self.last_synced_at,
            action_token: self.action_token,
            reminder_sent_at: self.reminder_sent_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl Booking {
    /// Find a booking by ID.
    pub async fn find_by_id(
        pool: &sqlx::PgPool,
        id: BookingId,
    ) -> Result<Option<Self>, sqlx::Error> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT * FROM bookings WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(pool)
        .await?;
        Ok(row.map(BookingRow::into_booking))
    }

    /// Find the local counterpart of an external event.
    pub async fn find_by_event(
        pool: &sqlx::PgPool,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT * FROM bookings
            WHERE calendar_id = $1 AND calendar_event_id = $2
            LIMIT 1
            "#,
        )
        .bind(calendar_id)
        .bind(event_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(BookingRow::into_booking))
    }

    /// Find a booking by its single-use action token.
    pub async fn find_by_action_token(
        pool: &sqlx::PgPool,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let row: Option<BookingRow> = sqlx::query_as(
            r#"
            SELECT * FROM bookings WHERE action_token = $1 LIMIT 1
            "#,
        )
        .bind(token)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(BookingRow::into_booking))
    }

    /// List bookings matching a filter.
    pub async fn list(
        pool: &sqlx::PgPool,
        filter: &BookingFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from("SELECT * FROM bookings WHERE TRUE");
        let mut param_count = 0;

        if filter.resource_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND resource_id = ${param_count}"));
        }
        if !filter.statuses.is_empty() {
            param_count += 1;
            query.push_str(&format!(" AND status = ANY(${param_count})"));
        }
        if filter.starts_before.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND start_time < ${param_count}"));
        }
        if filter.ends_after.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND end_time > ${param_count}"));
        }
        if filter.recurring_parent_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND recurring_parent_id = ${param_count}"));
        }
        query.push_str(" ORDER BY start_time");
        if filter.limit.is_some() {
            param_count += 1;
            query.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut q = sqlx::query_as::<_, BookingRow>(&query);
        if let Some(resource_id) = filter.resource_id {
            q = q.bind(*resource_id.as_uuid());
        }
        if !filter.statuses.is_empty() {
            q = q.bind(filter.statuses.clone());
        }
        if let Some(before) = filter.starts_before {
            q = q.bind(before);
        }
        if let Some(after) = filter.ends_after {
            q = q.bind(after);
        }
        if let Some(parent) = filter.recurring_parent_id {
            q = q.bind(*parent.as_uuid());
        }
        if let Some(limit) = filter.limit {
            q = q.bind(limit);
        }

        let rows = q.fetch_all(pool).await?;
        Ok(rows.into_iter().map(BookingRow::into_booking).collect())
    }

    /// Insert a new booking.
    pub async fn insert(pool: &sqlx::PgPool, new: &NewBooking) -> Result<Self, sqlx::Error> {
        Self::insert_with(pool, new).await
    }

    async fn insert_with<'e, E>(executor: E, new: &NewBooking) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let recurrence = new
            .recurrence
            .as_ref()
            .map(|r| serde_json::to_value(r).unwrap_or(serde_json::Value::Null));
        let row: BookingRow = sqlx::query_as(
            r#"
            INSERT INTO bookings (
                id, resource_id, title, description, start_time, end_time,
                status, source, host_user_id, organizer_email, attendees,
                calendar_id, calendar_event_id, external_origin, is_recurring,
                recurrence, recurrence_end_date, recurring_parent_id,
                checked_in_at, last_synced_at, action_token
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING *
            "#,
        )
        .bind(new.id.as_uuid())
        .bind(new.resource_id.as_uuid())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(new.status)
        .bind(new.source)
        .bind(new.host_user_id.map(|u| *u.as_uuid()))
        .bind(&new.organizer_email)
        .bind(&new.attendees)
        .bind(&new.calendar_id)
        .bind(&new.calendar_event_id)
        .bind(new.external_origin)
        .bind(new.is_recurring)
        .bind(recurrence)
        .bind(new.recurrence_end_date)
        .bind(new.recurring_parent_id.map(|p| *p.as_uuid()))
        .bind(new.checked_in_at)
        .bind(new.last_synced_at)
        .bind(&new.action_token)
        .fetch_one(executor)
        .await?;
        Ok(row.into_booking())
    }

    /// Insert several bookings atomically (series occurrences).
    pub async fn insert_many(
        pool: &sqlx::PgPool,
        bookings: &[NewBooking],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut inserted = Vec::with_capacity(bookings.len());
        for new in bookings {
            inserted.push(Self::insert_with(&mut *tx, new).await?);
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Apply a partial update, returning the updated row.
    pub async fn update(
        pool: &sqlx::PgPool,
        id: BookingId,
        changes: &BookingChanges,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::update_with(pool, id, changes).await
    }

    async fn update_with<'e, E>(
        executor: E,
        id: BookingId,
        changes: &BookingChanges,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let mut sets: Vec<String> = Vec::new();
        let mut param_count = 1;

        macro_rules! set_if {
            ($field:expr, $column:literal) => {
                if $field.is_some() {
                    param_count += 1;
                    sets.push(format!(concat!($column, " = ${}"), param_count));
                }
            };
        }

        set_if!(changes.status, "status");
        set_if!(changes.title, "title");
        set_if!(changes.description, "description");
        set_if!(changes.start_time, "start_time");
        set_if!(changes.end_time, "end_time");
        set_if!(changes.checked_in_at, "checked_in_at");
        set_if!(changes.extension_count, "extension_count");
        set_if!(changes.attendees, "attendees");
        set_if!(changes.organizer_email, "organizer_email");
        set_if!(changes.calendar_id, "calendar_id");
        set_if!(changes.calendar_event_id, "calendar_event_id");
        set_if!(changes.last_synced_at, "last_synced_at");
        set_if!(changes.reminder_sent_at, "reminder_sent_at");

        if sets.is_empty() {
            // Nothing to set; treat as a touch-free read.
            let row: Option<BookingRow> = sqlx::query_as("SELECT * FROM bookings WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(executor)
                .await?;
            return Ok(row.map(BookingRow::into_booking));
        }

        let query = format!(
            "UPDATE bookings SET {}, updated_at = NOW() WHERE id = $1 RETURNING *",
            sets.join(", ")
        );

        let mut q = sqlx::query_as::<_, BookingRow>(&query).bind(id.as_uuid());
        if let Some(status) = changes.status {
            q = q.bind(status);
        }
        if let Some(ref title) = changes.title {
            q = q.bind(title);
        }
        if let Some(ref description) = changes.description {
            q = q.bind(description);
        }
        if let Some(start_time) = changes.start_time {
            q = q.bind(start_time);
        }
        if let Some(end_time) = changes.end_time {
            q = q.bind(end_time);
        }
        if let Some(checked_in_at) = changes.checked_in_at {
            q = q.bind(checked_in_at);
        }
        if let Some(extension_count) = changes.extension_count {
            q = q.bind(extension_count);
        }
        if let Some(ref attendees) = changes.attendees {
            q = q.bind(attendees);
        }
        if let Some(ref organizer_email) = changes.organizer_email {
            q = q.bind(organizer_email);
        }
        if let Some(ref calendar_id) = changes.calendar_id {
            q = q.bind(calendar_id);
        }
        if let Some(ref calendar_event_id) = changes.calendar_event_id {
            q = q.bind(calendar_event_id);
        }
        if let Some(last_synced_at) = changes.last_synced_at {
            q = q.bind(last_synced_at);
        }
        if let Some(reminder_sent_at) = changes.reminder_sent_at {
            q = q.bind(reminder_sent_at);
        }

        let row = q.fetch_optional(executor).await?;
        Ok(row.map(BookingRow::into_booking))
    }

    /// Cancel every listed booking still in a cancellable status.
    /// Returns the number of rows actually cancelled.
    pub async fn cancel_many(
        pool: &sqlx::PgPool,
        ids: &[BookingId],
    ) -> Result<u64, sqlx::Error> {
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'cancelled', updated_at = NOW()
            WHERE id = ANY($1) AND status IN ('scheduled', 'in_progress')
            "#,
        )
        .bind(&uuids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// All occurrences referencing a series parent, ordered by start.
    pub async fn series_members(
        pool: &sqlx::PgPool,
        parent_id: BookingId,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT * FROM bookings
            WHERE recurring_parent_id = $1
            ORDER BY start_time
            "#,
        )
        .bind(parent_id.as_uuid())
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(BookingRow::into_booking).collect())
    }

    /// Scheduled, never-checked-in bookings whose start time passed the
    /// given cutoff. Optionally scoped to one room.
    pub async fn no_show_candidates(
        pool: &sqlx::PgPool,
        cutoff: DateTime<Utc>,
        resource_id: Option<ResourceId>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = String::from(
            r#"
            SELECT * FROM bookings
            WHERE status = 'scheduled' AND checked_in_at IS NULL AND start_time <= $1
            "#,
        );
        let mut param_count = 1;
        if resource_id.is_some() {
            param_count += 1;
            query.push_str(&format!(" AND resource_id = ${param_count}"));
        }
        query.push_str(&format!(" ORDER BY start_time LIMIT ${}", param_count + 1));

        let mut q = sqlx::query_as::<_, BookingRow>(&query).bind(cutoff);
        if let Some(resource_id) = resource_id {
            q = q.bind(*resource_id.as_uuid());
        }
        let rows = q.bind(limit).fetch_all(pool).await?;
        Ok(rows.into_iter().map(BookingRow::into_booking).collect())
    }

    /// Scheduled, never-checked-in, never-reminded bookings past the
    /// reminder cutoff.
    pub async fn reminder_candidates(
        pool: &sqlx::PgPool,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            r#"
            SELECT * FROM bookings
            WHERE status = 'scheduled'
              AND checked_in_at IS NULL
              AND reminder_sent_at IS NULL
              AND start_time <= $1
            ORDER BY start_time
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(BookingRow::into_booking).collect())
    }

    /// Apply one reconciliation pass atomically: per-row updates for
    /// matched bookings plus inserts for brand-new external events.
    pub async fn sync_upsert(
        pool: &sqlx::PgPool,
        updates: &[(BookingId, BookingChanges)],
        inserts: &[NewBooking],
    ) -> Result<(usize, usize), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut updated = 0;
        for (id, changes) in updates {
            if Self::update_with(&mut *tx, *id, changes).await?.is_some() {
                updated += 1;
            }
        }
        let mut created = 0;
        for new in inserts {
            Self::insert_with(&mut *tx, new).await?;
            created += 1;
        }
        tx.commit().await?;
        Ok((updated, created))
    }

    /// Delete a booking, tombstoning its external event id so a later
    /// sync pass cannot resurrect it.
    pub async fn delete(pool: &sqlx::PgPool, id: BookingId) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO calendar_event_tombstones (calendar_id, event_id)
            SELECT calendar_id, calendar_event_id FROM bookings
            WHERE id = $1 AND calendar_id IS NOT NULL AND calendar_event_id IS NOT NULL
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(id.as_uuid())
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Check whether an external event id was tombstoned by a delete.
    pub async fn is_event_tombstoned(
        pool: &sqlx::PgPool,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM calendar_event_tombstones
            WHERE calendar_id = $1 AND event_id = $2
            "#,
        )
        .bind(calendar_id)
        .bind(event_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_terminal() {
        assert!(!BookingStatus::Scheduled.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
        assert!(BookingStatus::Ended.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::NoShow.is_terminal());
    }

    #[test]
    fn test_status_display_matches_db_representation() {
        assert_eq!(BookingStatus::InProgress.to_string(), "in_progress");
        assert_eq!(BookingStatus::NoShow.to_string(), "no_show");
    }

    #[test]
    fn test_weekly_rule_validation() {
        assert!(RecurrenceRule::Weekly {
            weekdays: vec![1, 3, 5]
        }
        .validate()
        .is_ok());
        assert!(RecurrenceRule::Weekly { weekdays: vec![] }.validate().is_err());
        assert!(RecurrenceRule::Weekly { weekdays: vec![7] }.validate().is_err());
    }

    #[test]
    fn test_monthly_rule_validation() {
        assert!(RecurrenceRule::MonthlyDay { day: 31 }.validate().is_ok());
        assert!(RecurrenceRule::MonthlyDay { day: 0 }.validate().is_err());
        assert!(RecurrenceRule::MonthlyDay { day: 32 }.validate().is_err());
    }

    #[test]
    fn test_weekly_rrule_rendering() {
        let rule = RecurrenceRule::Weekly {
            weekdays: vec![5, 1, 3],
        };
        let until = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
        assert_eq!(
            rule.to_rrule(until),
            "RRULE:FREQ=WEEKLY;BYDAY=MO,WE,FR;UNTIL=20260316T235959Z"
        );
    }

    #[test]
    fn test_monthly_rrule_rendering() {
        let rule = RecurrenceRule::MonthlyDay { day: 15 };
        let until = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert_eq!(
            rule.to_rrule(until),
            "RRULE:FREQ=MONTHLY;BYMONTHDAY=15;UNTIL=20261231T235959Z"
        );
    }

    #[test]
    fn test_rule_serde_roundtrip() {
        let rule = RecurrenceRule::Weekly {
            weekdays: vec![1, 3],
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "weekly");
        let back: RecurrenceRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_changes_is_empty() {
        assert!(BookingChanges::default().is_empty());
        let changes = BookingChanges {
            status: Some(BookingStatus::Cancelled),
            ..BookingChanges::default()
        };
        assert!(!changes.is_empty());
    }
}
