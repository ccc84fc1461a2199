//! roomly Booking Engine
//!
//! The booking lifecycle and external-calendar reconciliation engine.
//! Local state owns the lifecycle; the external calendar is authoritative
//! for time conflicts. The two are kept consistent by best-effort
//! mirroring after each local commit and a continuous reconciliation
//! sweep that merges external events back in without ever undoing a
//! terminal local decision.
//!
//! # Modules
//!
//! - [`config`] - Engine and sync configuration with serde defaults
//! - [`types`] - Request/response contracts and host resolution
//! - [`store`] - Persistence seams (`BookingStore`, `RoomStore`, `ActivityLog`)
//! - [`availability`] - Free-busy conflict checking
//! - [`recurrence`] - Recurring-series expansion
//! - [`outbox`] - Best-effort external-calendar effect execution
//! - [`lifecycle`] - The `BookingEngine` state machine
//! - [`noshow`] - No-show scanner
//! - [`reminder`] - Overdue-reminder scanner
//! - [`sync`] - External-calendar reconciliation

pub mod availability;
pub mod config;
pub mod lifecycle;
pub mod noshow;
pub mod outbox;
pub mod recurrence;
pub mod reminder;
pub mod store;
pub mod sync;
pub mod types;

pub use availability::{Availability, AvailabilityChecker};
pub use config::{BookingConfig, SyncConfig};
pub use lifecycle::BookingEngine;
pub use noshow::{NoShowScanner, NoShowSweep};
pub use outbox::{CalendarEffect, OutboxExecutor};
pub use reminder::{ReminderScanner, ReminderSweep};
pub use store::{ActivityLog, BookingStore, RoomStore};
pub use sync::{ReconciliationSync, SyncSummary};
pub use types::{
    CreateBooking, ExtensionCheck, HostRef, QuickBook, RecurringBooking, SeriesCancellation,
};
