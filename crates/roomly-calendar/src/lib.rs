//! roomly Calendar Provider Interface
//!
//! Narrow interface over the external calendar and user directory. The
//! booking engine consumes these traits; the wire protocol behind them is
//! a collaborator concern. An in-memory simulated provider is shipped for
//! the engine's test suites.
//!
//! # Modules
//!
//! - [`types`] - Event, attendee, free-busy and patch value types
//! - [`traits`] - `CalendarClient` and `UserDirectory` provider seams
//! - [`error`] - Provider error type (`CalendarError`)
//! - [`memory`] - In-process provider implementations for tests

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{CalendarError, CalendarResult};
pub use memory::{InMemoryCalendar, InMemoryDirectory};
pub use traits::{CalendarClient, UserDirectory};
pub use types::{
    BusyInterval, CalendarEvent, CreatedAsUser, DirectoryUser, DirectoryUserStatus, EventAttendee,
    EventData, EventPatch, EventStatus, FreeBusyCalendar,
};

/// Private extended property key carrying the local booking id on events
/// created by this system. Reconciliation uses it to resolve the local
/// counterpart of an external event before falling back to the composite
/// calendar-id + event-id key.
pub const BOOKING_ID_PROPERTY: &str = "roomly_booking_id";
