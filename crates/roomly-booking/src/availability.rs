//! Free-busy conflict checking.
//!
//! The external calendar is authoritative for time conflicts, so every
//! availability question goes through the provider's free-busy endpoint
//! rather than the local bookings table. A room without an external
//! calendar has no conflict source and is always considered free.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use roomly_calendar::{BusyInterval, CalendarClient};
use roomly_core::{BookingError, ConflictWindow, Result};
use roomly_db::Room;

/// Outcome of one availability check.
#[derive(Debug, Clone)]
pub struct Availability {
    /// Busy intervals overlapping the requested window, ordered by start.
    pub conflicts: Vec<BusyInterval>,
}

impl Availability {
    /// Whether the window is free.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// The conflicts as error payload windows.
    #[must_use]
    pub fn conflict_windows(&self) -> Vec<ConflictWindow> {
        self.conflicts
            .iter()
            .map(|b| ConflictWindow {
                start: b.start,
                end: b.end,
            })
            .collect()
    }
}

/// Checks room availability against the external calendar.
pub struct AvailabilityChecker {
    calendar: Arc<dyn CalendarClient>,
}

impl AvailabilityChecker {
    #[must_use]
    pub fn new(calendar: Arc<dyn CalendarClient>) -> Self {
        Self { calendar }
    }

    /// Busy intervals on the room's calendar overlapping `[start, end)`.
    ///
    /// # Errors
    ///
    /// `ExternalSync` when the free-busy query fails; the caller must not
    /// book blind.
    pub async fn check(
        &self,
        room: &Room,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Availability> {
        let Some(calendar_id) = room.calendar_id.as_deref() else {
            return Ok(Availability {
                conflicts: Vec::new(),
            });
        };

        let ids = vec![calendar_id.to_string()];
        let free_busy = self
            .calendar
            .check_free_busy(&ids, start, end)
            .await
            .map_err(|e| {
                BookingError::external_sync(format!("free-busy query failed: {e}"))
            })?;

        let mut conflicts: Vec<BusyInterval> = free_busy
            .get(calendar_id)
            .map(|c| c.busy.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|b| b.start < end && b.end > start)
            .collect();
        conflicts.sort_by_key(|b| b.start);

        Ok(Availability { conflicts })
    }

    /// Like [`check`](Self::check), but turns any conflict into a
    /// `NotAvailable` error carrying the conflicting windows.
    pub async fn ensure_free(
        &self,
        room: &Room,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let availability = self.check(room, start, end).await?;
        if availability.is_available() {
            return Ok(());
        }
        Err(BookingError::not_available(
            format!("{} is busy during the requested time", room.name),
            availability.conflict_windows(),
        ))
    }
}
