//! Calendar provider value types.
//!
//! These are the shapes exchanged with the external calendar, kept
//! provider-agnostic: whatever wire protocol sits behind the
//! [`CalendarClient`](crate::traits::CalendarClient) trait maps into these.

use chrono::{DateTime, Utc};
use roomly_core::UserId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An attendee on a calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAttendee {
    /// Attendee email address.
    pub email: String,
    /// Display name, if the provider knows one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// True for non-human attendees (the room itself).
    #[serde(default)]
    pub is_resource: bool,
}

impl EventAttendee {
    /// Create a human attendee.
    #[must_use]
    pub fn person(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
            is_resource: false,
        }
    }

    /// Create a resource (room) attendee.
    #[must_use]
    pub fn resource(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: None,
            is_resource: true,
        }
    }
}

/// Status of an external calendar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Event is confirmed.
    Confirmed,
    /// Event is tentatively scheduled.
    Tentative,
    /// Event was cancelled on the external side.
    Cancelled,
}

impl EventStatus {
    /// Check whether the event still occupies its time slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// An event as reported by the external calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider-assigned event id.
    pub id: String,
    /// Calendar the event was read from.
    pub calendar_id: String,
    /// Event title (summary).
    pub title: Option<String>,
    /// Event description.
    pub description: Option<String>,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
    /// Event status.
    pub status: EventStatus,
    /// Organizer email, if known.
    pub organizer_email: Option<String>,
    /// All attendees, humans and resources.
    pub attendees: Vec<EventAttendee>,
    /// Native recurrence rule (RRULE syntax), set on recurring parents.
    pub recurrence: Option<String>,
    /// Private extended properties attached by this system.
    #[serde(default)]
    pub private_properties: HashMap<String, String>,
}

impl CalendarEvent {
    /// Human attendee emails, resources excluded.
    #[must_use]
    pub fn human_attendee_emails(&self) -> Vec<String> {
        self.attendees
            .iter()
            .filter(|a| !a.is_resource)
            .map(|a| a.email.clone())
            .collect()
    }
}

/// Data for creating a new event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// Event title.
    pub title: String,
    /// Event description.
    pub description: Option<String>,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
    /// Attendees to invite, including the room as a resource attendee.
    pub attendees: Vec<EventAttendee>,
    /// Native recurrence rule for recurring events.
    pub recurrence: Option<String>,
}

/// Partial update to an existing event. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    /// New title.
    pub title: Option<String>,
    /// New start instant.
    pub start: Option<DateTime<Utc>>,
    /// New end instant.
    pub end: Option<DateTime<Utc>>,
}

impl EventPatch {
    /// Patch that only moves the end time.
    #[must_use]
    pub fn end_time(end: DateTime<Utc>) -> Self {
        Self {
            end: Some(end),
            ..Self::default()
        }
    }
}

/// Result of creating an event while impersonating a user.
#[derive(Debug, Clone)]
pub struct CreatedAsUser {
    /// The created event.
    pub event: CalendarEvent,
    /// The organizer identity actually used.
    ///
    /// Differs from the requested user when the provider fell back to the
    /// service identity.
    pub organizer_used: String,
}

/// A busy interval from a free-busy query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    /// Start of the busy interval.
    pub start: DateTime<Utc>,
    /// End of the busy interval.
    pub end: DateTime<Utc>,
}

impl BusyInterval {
    /// Check whether the given instant falls inside this interval.
    #[must_use]
    pub fn covers(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Free-busy answer for one calendar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FreeBusyCalendar {
    /// Busy intervals within the queried window.
    pub busy: Vec<BusyInterval>,
}

/// A user as reported by the directory provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    /// Local user id.
    pub id: UserId,
    /// Primary email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
}

/// Result of resolving a host user against the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryUserStatus {
    /// User exists and is active.
    Active(DirectoryUser),
    /// User exists but is suspended or deactivated.
    Inactive,
    /// User does not exist in the directory.
    NotFound,
}
