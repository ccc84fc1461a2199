//! roomly Core Library
//!
//! Shared types for the roomly booking engine.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (BookingId, ResourceId, UserId)
//! - [`error`] - Standardized error taxonomy (BookingError)
//! - [`clock`] - Injectable time source for testable scheduling logic
//!
//! # Example
//!
//! ```
//! use roomly_core::{BookingId, BookingError, Result};
//!
//! let booking_id = BookingId::new();
//!
//! fn example(id: BookingId) -> Result<()> {
//!     Err(BookingError::not_found("Booking", id.to_string()))
//! }
//! ```

pub mod clock;
pub mod error;
pub mod ids;

// Re-export main types for convenient access
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{BookingError, ConflictWindow, Result};
pub use ids::{BookingId, ResourceId, UserId};
