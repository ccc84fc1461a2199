//! Request/response contracts for the lifecycle operations.
//!
//! This is the produced interface of the engine: the UI/API layer builds
//! these requests and renders the returned booking or typed error.

use chrono::{DateTime, NaiveDate, Utc};
use roomly_core::{BookingId, ResourceId, UserId};
use roomly_calendar::{BusyInterval, DirectoryUser};
use roomly_db::{BookingSource, RecurrenceRule};
use serde::{Deserialize, Serialize};

/// Resolved host identity for a booking.
///
/// A tagged variant instead of nullable chains: every consumer handles
/// the directory-backed host, the organizer-email fallback and the
/// anonymous walk-up case explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRef {
    /// Directory-backed host user.
    Host(DirectoryUser),
    /// No host user, but an organizer email is known.
    OrganizerEmail(String),
    /// Walk-up booking with no identity at all.
    Anonymous,
}

impl HostRef {
    /// The email to act as when mirroring, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Host(user) => Some(&user.email),
            Self::OrganizerEmail(email) => Some(email),
            Self::Anonymous => None,
        }
    }

    /// The linked user id, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Host(user) => Some(user.id),
            _ => None,
        }
    }
}

/// Request to create a single scheduled booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBooking {
    /// Room to book.
    pub resource_id: ResourceId,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Start instant.
    pub start_time: DateTime<Utc>,
    /// End instant; must be strictly after `start_time`.
    pub end_time: DateTime<Utc>,
    /// Channel the request came through.
    pub source: BookingSource,
    /// Host user; must exist and be active when supplied.
    #[serde(default)]
    pub host_user_id: Option<UserId>,
    /// Organizer email fallback when no host user is linked.
    #[serde(default)]
    pub organizer_email: Option<String>,
    /// Attendee emails (the organizer is excluded automatically).
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Who performed the action, for the activity log.
    #[serde(default)]
    pub performed_by: Option<UserId>,
}

/// Request for a quick walk-up booking starting now.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickBook {
    /// Room to book; must allow walk-up booking.
    pub resource_id: ResourceId,
    /// Title.
    pub title: String,
    /// Requested duration in minutes; the end may be clipped to the
    /// start of the next meeting.
    pub duration_minutes: i64,
    /// Organizer email, when the tablet knows one.
    #[serde(default)]
    pub organizer_email: Option<String>,
    /// Attendee emails.
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Who performed the action, for the activity log.
    #[serde(default)]
    pub performed_by: Option<UserId>,
}

/// Request to create a recurring series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringBooking {
    /// Room to book.
    pub resource_id: ResourceId,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Start of the first occurrence; later occurrences inherit its
    /// time of day.
    pub first_start: DateTime<Utc>,
    /// End of the first occurrence.
    pub first_end: DateTime<Utc>,
    /// Recurrence pattern.
    pub rule: RecurrenceRule,
    /// Inclusive end date of the series.
    pub recurrence_end_date: NaiveDate,
    /// Channel the request came through.
    pub source: BookingSource,
    /// Host user; must exist and be active when supplied.
    #[serde(default)]
    pub host_user_id: Option<UserId>,
    /// Organizer email fallback.
    #[serde(default)]
    pub organizer_email: Option<String>,
    /// Attendee emails.
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Who performed the action, for the activity log.
    #[serde(default)]
    pub performed_by: Option<UserId>,
}

/// Answer to an extension pre-check.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionCheck {
    /// Whether the extension would succeed right now.
    pub can_extend: bool,
    /// The earliest conflicting interval in the delta window, if any.
    pub conflict: Option<BusyInterval>,
    /// Title of the conflicting local booking, when resolvable.
    pub conflicting_title: Option<String>,
    /// Organizer of the conflicting local booking, when resolvable.
    pub conflicting_organizer: Option<String>,
}

/// Result of cancelling a recurring series.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesCancellation {
    /// The series parent.
    pub parent_id: BookingId,
    /// How many bookings were actually cancelled (already-terminal
    /// occurrences are left untouched).
    pub cancelled_count: u64,
}

/// Deduplicate attendee emails and drop the organizer.
#[must_use]
pub fn normalize_attendees(attendees: &[String], organizer: Option<&str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    attendees
        .iter()
        .map(|a| a.trim().to_ascii_lowercase())
        .filter(|a| !a.is_empty())
        .filter(|a| organizer.map_or(true, |o| !a.eq_ignore_ascii_case(o)))
        .filter(|a| seen.insert(a.clone()))
        .collect()
}
