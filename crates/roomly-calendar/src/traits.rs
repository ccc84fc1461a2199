//! Provider trait definitions.
//!
//! The booking engine holds these behind `Arc<dyn …>`. Implementations
//! own the wire protocol; the engine only sees the value types in
//! [`crate::types`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roomly_core::UserId;
use std::collections::HashMap;

use crate::error::CalendarResult;
use crate::types::{
    CalendarEvent, CreatedAsUser, DirectoryUserStatus, EventData, EventPatch, FreeBusyCalendar,
};

/// Client for the external calendar system.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Create an event directly on a calendar.
    ///
    /// Used for walk-up bookings with no host to impersonate; the event
    /// lands on the resource calendar itself.
    async fn create_event(
        &self,
        calendar_id: &str,
        data: &EventData,
        private_properties: Option<&HashMap<String, String>>,
    ) -> CalendarResult<CalendarEvent>;

    /// Create an event acting as the given user.
    ///
    /// The user becomes the organizer so they can manage the event from
    /// their own calendar. Returns the identity actually used, which may
    /// differ if the implementation substitutes a fallback.
    ///
    /// # Errors
    ///
    /// Returns [`CalendarError::Impersonation`](crate::CalendarError::Impersonation)
    /// when acting as the user is refused; callers decide on a fallback.
    async fn create_event_as_user(
        &self,
        user_email: &str,
        data: &EventData,
        private_properties: Option<&HashMap<String, String>>,
    ) -> CalendarResult<CreatedAsUser>;

    /// Create a recurring event acting as the given user.
    ///
    /// `data.recurrence` must carry the native recurrence rule; the
    /// provider expands occurrences on its side.
    async fn create_recurring_event_as_user(
        &self,
        user_email: &str,
        data: &EventData,
        private_properties: Option<&HashMap<String, String>>,
    ) -> CalendarResult<CreatedAsUser>;

    /// Apply a partial update to an existing event.
    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> CalendarResult<CalendarEvent>;

    /// Delete an event. Deleting a recurring parent removes all of its
    /// expansions on the external side.
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> CalendarResult<()>;

    /// Fetch a single event.
    async fn get_event(&self, calendar_id: &str, event_id: &str) -> CalendarResult<CalendarEvent>;

    /// List events on a calendar overlapping the given window.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>>;

    /// Query free-busy information for a set of calendars.
    async fn check_free_busy(
        &self,
        calendar_ids: &[String],
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> CalendarResult<HashMap<String, FreeBusyCalendar>>;
}

/// Client for the user directory.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Resolve a host user by id.
    async fn resolve_user(&self, user_id: UserId) -> CalendarResult<DirectoryUserStatus>;
}
