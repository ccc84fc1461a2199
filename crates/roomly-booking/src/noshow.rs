//! No-show scanner.
//!
//! Periodic sweep releasing rooms nobody claimed: scheduled bookings
//! whose start passed the grace window without a check-in transition to
//! `NoShow` and their mirrored events are removed so the slot frees up
//! externally too. The host invokes [`NoShowScanner::scan`] on a cadence;
//! there is no in-process scheduler.

use std::sync::Arc;

use chrono::Duration;
use roomly_calendar::CalendarClient;
use roomly_core::{BookingId, Clock, ResourceId, Result};
use roomly_db::{BookingAction, BookingChanges, BookingStatus, NewActivity};
use serde_json::json;
use tracing::{info, warn};

use crate::config::BookingConfig;
use crate::store::{ActivityLog, BookingStore};

/// Result of one no-show sweep.
#[derive(Debug, Default)]
pub struct NoShowSweep {
    /// Bookings transitioned to `NoShow` this pass.
    pub transitioned: Vec<BookingId>,
    /// External event deletes that failed (left for reconciliation).
    pub delete_failures: usize,
}

/// Scans for scheduled bookings that were never claimed.
pub struct NoShowScanner {
    store: Arc<dyn BookingStore>,
    activity: Arc<dyn ActivityLog>,
    calendar: Arc<dyn CalendarClient>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
}

impl NoShowScanner {
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        activity: Arc<dyn ActivityLog>,
        calendar: Arc<dyn CalendarClient>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            store,
            activity,
            calendar,
            clock,
            config,
        }
    }

    /// One sweep, optionally scoped to a single room.
    ///
    /// Each candidate is handled independently; a failure on one row is
    /// logged and the sweep continues.
    pub async fn scan(&self, resource_id: Option<ResourceId>) -> Result<NoShowSweep> {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(self.config.no_show_grace_minutes);
        let candidates = self
            .store
            .no_show_candidates(cutoff, resource_id, self.config.no_show_scan_limit)
            .await?;

        let mut sweep = NoShowSweep::default();
        for booking in candidates {
            let updated = self
                .store
                .update(
                    booking.id,
                    BookingChanges {
                        status: Some(BookingStatus::NoShow),
                        ..BookingChanges::default()
                    },
                )
                .await;
            if let Err(e) = updated {
                warn!(booking_id = %booking.id, error = %e, "no-show transition failed");
                continue;
            }
            sweep.transitioned.push(booking.id);

            let record = self
                .activity
                .append(NewActivity {
                    booking_id: booking.id,
                    action: BookingAction::NoShow,
                    performed_by: None,
                    metadata: json!({ "grace_minutes": self.config.no_show_grace_minutes }),
                })
                .await;
            if let Err(e) = record {
                warn!(booking_id = %booking.id, error = %e, "failed to append activity record");
            }

            if let (Some(calendar_id), Some(event_id)) =
                (booking.calendar_id.as_deref(), booking.calendar_event_id.as_deref())
            {
                match self.calendar.delete_event(calendar_id, event_id).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {}
                    Err(e) => {
                        warn!(
                            booking_id = %booking.id,
                            event_id = %event_id,
                            error = %e,
                            "no-show event delete failed"
                        );
                        sweep.delete_failures += 1;
                    }
                }
            }
        }

        if !sweep.transitioned.is_empty() {
            info!(
                transitioned = sweep.transitioned.len(),
                delete_failures = sweep.delete_failures,
                "no-show sweep complete"
            );
        }
        Ok(sweep)
    }
}
