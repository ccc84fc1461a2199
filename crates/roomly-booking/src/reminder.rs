//! Overdue-release reminder scanner.
//!
//! A second, longer window behind the no-show grace: bookings still
//! scheduled and unclaimed well past their start get a one-time reminder
//! carrying the booking's single-use action token, so the host can
//! release or claim the room from the notification. `reminder_sent_at`
//! guards against repeats.

use std::sync::Arc;

use chrono::Duration;
use roomly_core::{BookingId, Clock, Result};
use roomly_db::{BookingAction, BookingChanges, NewActivity};
use serde_json::json;
use tracing::{info, warn};

use crate::config::BookingConfig;
use crate::store::{ActivityLog, BookingStore};

/// Result of one reminder sweep.
#[derive(Debug, Default)]
pub struct ReminderSweep {
    /// Bookings a reminder was recorded for this pass.
    pub reminded: Vec<BookingId>,
}

/// Scans for long-unclaimed bookings that deserve a reminder.
pub struct ReminderScanner {
    store: Arc<dyn BookingStore>,
    activity: Arc<dyn ActivityLog>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
}

impl ReminderScanner {
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        activity: Arc<dyn ActivityLog>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            store,
            activity,
            clock,
            config,
        }
    }

    /// One sweep. Each booking is reminded at most once, ever.
    pub async fn scan(&self) -> Result<ReminderSweep> {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(self.config.reminder_grace_minutes);
        let candidates = self
            .store
            .reminder_candidates(cutoff, self.config.no_show_scan_limit)
            .await?;

        let mut sweep = ReminderSweep::default();
        for booking in candidates {
            let updated = self
                .store
                .update(
                    booking.id,
                    BookingChanges {
                        reminder_sent_at: Some(now),
                        ..BookingChanges::default()
                    },
                )
                .await;
            if let Err(e) = updated {
                warn!(booking_id = %booking.id, error = %e, "reminder mark failed");
                continue;
            }
            sweep.reminded.push(booking.id);

            let record = self
                .activity
                .append(NewActivity {
                    booking_id: booking.id,
                    action: BookingAction::ReminderSent,
                    performed_by: None,
                    metadata: json!({
                        "grace_minutes": self.config.reminder_grace_minutes,
                        "action_token": booking.action_token,
                    }),
                })
                .await;
            if let Err(e) = record {
                warn!(booking_id = %booking.id, error = %e, "failed to append activity record");
            }
        }

        if !sweep.reminded.is_empty() {
            info!(reminded = sweep.reminded.len(), "reminder sweep complete");
        }
        Ok(sweep)
    }
}
