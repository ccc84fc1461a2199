//! Calendar provider error types.

use thiserror::Error;

/// Errors that can occur talking to the external calendar or directory.
#[derive(Debug, Error)]
pub enum CalendarError {
    /// Provider API call failed (transport, quota, 5xx).
    #[error("calendar API error: {message}")]
    Api { message: String },

    /// Authentication against the provider failed.
    #[error("calendar authentication failed: {message}")]
    Auth { message: String },

    /// Event does not exist on the given calendar.
    #[error("event not found on calendar {calendar_id}: {event_id}")]
    EventNotFound {
        calendar_id: String,
        event_id: String,
    },

    /// Acting on behalf of a user was refused.
    ///
    /// The lifecycle engine falls back to the service identity when this
    /// is returned from a create-as-user call.
    #[error("cannot impersonate {user_email}: {message}")]
    Impersonation { user_email: String, message: String },

    /// Request was malformed (bad calendar id, invalid time range).
    #[error("invalid calendar request: {message}")]
    InvalidRequest { message: String },
}

impl CalendarError {
    /// Create an API error.
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an event-not-found error.
    pub fn event_not_found(calendar_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self::EventNotFound {
            calendar_id: calendar_id.into(),
            event_id: event_id.into(),
        }
    }

    /// Create an impersonation error.
    pub fn impersonation(user_email: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Impersonation {
            user_email: user_email.into(),
            message: message.into(),
        }
    }

    /// Create an invalid-request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Check if this error means the event is already gone.
    ///
    /// Best-effort deletes treat this as success.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EventNotFound { .. })
    }

    /// Check if this error is an impersonation refusal.
    #[must_use]
    pub fn is_impersonation(&self) -> bool {
        matches!(self, Self::Impersonation { .. })
    }
}

/// Result type for calendar provider operations.
pub type CalendarResult<T> = Result<T, CalendarError>;
