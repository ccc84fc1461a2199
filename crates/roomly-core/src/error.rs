//! Error Types
//!
//! Standardized error taxonomy for the booking engine. Every lifecycle
//! operation, scanner and sync pass reports failures through
//! [`BookingError`] so callers can render a specific message per variant.
//!
//! # Example
//!
//! ```
//! use roomly_core::{BookingError, Result};
//!
//! fn find_room(id: &str) -> Result<String> {
//!     if id.is_empty() {
//!         return Err(BookingError::not_found("Room", id));
//!     }
//!     Ok(format!("Room {}", id))
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// A conflicting busy interval reported alongside availability rejections.
///
/// Carried on [`BookingError::NotAvailable`] so the caller can render a
/// message naming the conflicting time rather than a bare generic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConflictWindow {
    /// Start of the conflicting interval.
    pub start: DateTime<Utc>,
    /// End of the conflicting interval.
    pub end: DateTime<Utc>,
}

/// Standardized error type for booking operations.
///
/// # Variants
///
/// - `NotFound` - room, booking or host user missing
/// - `InvalidState` - illegal transition on a terminal booking
/// - `NotAvailable` - conflict reported by the availability check
/// - `Validation` - bad duration, end before start, malformed recurrence
/// - `ExternalSync` - external-calendar mirroring failure
/// - `Database` - persistence failure, including silent no-op writes
///   caught by read-back verification
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BookingError {
    /// Requested entity was not found.
    #[error("{resource} not found{}", id.as_ref().map(|i| format!(": {i}")).unwrap_or_default())]
    NotFound {
        /// The type of entity that was not found (e.g., "Room", "Booking")
        resource: String,
        /// Optional identifier of the entity
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Illegal lifecycle transition.
    ///
    /// Raised when an operation is attempted against a booking whose
    /// current status does not permit it (terminal statuses are monotonic).
    #[error("Cannot {action}: booking is {status}")]
    InvalidState {
        /// Current status of the booking, as stored
        status: String,
        /// The operation that was rejected
        action: String,
    },

    /// The requested window conflicts with existing calendar events.
    #[error("Not available: {message}")]
    NotAvailable {
        /// Human-readable description of the conflict
        message: String,
        /// The conflicting intervals, sorted by start time
        conflicts: Vec<ConflictWindow>,
    },

    /// Input validation failure.
    #[error("Validation error on '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },

    /// External-calendar call failed.
    ///
    /// Pre-commit failures (availability checks) abort the operation;
    /// post-commit mirroring failures are logged and swallowed by the
    /// engine, so this variant only surfaces to callers for the former.
    #[error("External calendar error: {message}")]
    ExternalSync {
        /// Description of the external failure
        message: String,
    },

    /// Persistence failure.
    #[error("Database error: {message}")]
    Database {
        /// Description of the database failure
        message: String,
    },
}

impl BookingError {
    /// Create a not-found error.
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create an invalid-state error.
    pub fn invalid_state(status: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidState {
            status: status.into(),
            action: action.into(),
        }
    }

    /// Create a not-available error carrying the conflicting intervals.
    pub fn not_available(message: impl Into<String>, conflicts: Vec<ConflictWindow>) -> Self {
        Self::NotAvailable {
            message: message.into(),
            conflicts,
        }
    }

    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an external-sync error.
    pub fn external_sync(message: impl Into<String>) -> Self {
        Self::ExternalSync {
            message: message.into(),
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Check if this error is an availability conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::NotAvailable { .. })
    }

    /// Check if this error was a pre-commit rejection (no local write happened).
    #[must_use]
    pub fn is_pre_commit(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::InvalidState { .. }
                | Self::NotAvailable { .. }
                | Self::Validation { .. }
        )
    }
}

/// Type alias for Results using [`BookingError`].
///
/// ```
/// use roomly_core::{Result, BookingError};
///
/// fn example() -> Result<String> {
///     Ok("success".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, BookingError>;
