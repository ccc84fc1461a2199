//! External-calendar reconciliation.
//!
//! The continuous sweep that keeps local bookings and the external
//! calendar converging. Events in a rolling window are listed per
//! resource, matched to local rows (private-property booking id first,
//! composite calendar + event key second), their fields refreshed and
//! their statuses merged through the [`merge::merge_status`] decision
//! table. Unmatched live events are adopted as new bookings, flagged
//! `external_origin` unless they carry the booking-id property;
//! tombstoned event ids are never resurrected.

pub mod merge;

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use roomly_calendar::{
    CalendarClient, CalendarEvent, EventStatus, BOOKING_ID_PROPERTY,
};
use roomly_core::{BookingError, BookingId, Clock, ResourceId, Result};
use roomly_db::{
    Booking, BookingAction, BookingChanges, BookingSource, BookingStatus, NewActivity, NewBooking,
    Room,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::store::{ActivityLog, BookingStore};
use crate::types::normalize_attendees;

/// Result of one reconciliation pass for a resource.
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    /// External events inspected.
    pub events_seen: usize,
    /// Matched bookings refreshed.
    pub updated: usize,
    /// New bookings adopted from unmatched events.
    pub created: usize,
    /// True when the pass did not run (rate-limited or unconfigured
    /// calendar).
    pub skipped: bool,
}

/// Reconciles local bookings with the external calendar.
pub struct ReconciliationSync {
    store: Arc<dyn BookingStore>,
    activity: Arc<dyn ActivityLog>,
    calendar: Arc<dyn CalendarClient>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    // Last completed pass per resource; the only cross-call shared state.
    last_pass: tokio::sync::RwLock<HashMap<ResourceId, DateTime<Utc>>>,
}

impl ReconciliationSync {
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        activity: Arc<dyn ActivityLog>,
        calendar: Arc<dyn CalendarClient>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self {
            store,
            activity,
            calendar,
            clock,
            config,
            last_pass: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Run one reconciliation pass for a room.
    ///
    /// Passes for the same resource are rate-limited to the configured
    /// minimum interval; a rate-limited call is a successful no-op.
    pub async fn sync_resource(&self, room: &Room) -> Result<SyncSummary> {
        let now = self.clock.now();
        {
            let last_pass = self.last_pass.read().await;
            if let Some(last) = last_pass.get(&room.id) {
                if (now - *last).num_seconds() < self.config.min_sync_interval_secs {
                    debug!(resource_id = %room.id, "sync rate-limited, skipping");
                    return Ok(SyncSummary {
                        skipped: true,
                        ..SyncSummary::default()
                    });
                }
            }
        }

        let Some(calendar_id) = room.calendar_id.as_deref() else {
            self.mark_completed(room.id, now).await;
            return Ok(SyncSummary {
                skipped: true,
                ..SyncSummary::default()
            });
        };
        // A bare-numeric id is a placeholder from an unfinished room
        // setup, not a routable calendar address.
        if !calendar_id.is_empty() && calendar_id.chars().all(|c| c.is_ascii_digit()) {
            warn!(resource_id = %room.id, calendar_id = %calendar_id, "calendar id looks unconfigured, skipping sync");
            self.mark_completed(room.id, now).await;
            return Ok(SyncSummary {
                skipped: true,
                ..SyncSummary::default()
            });
        }

        let time_min = now - Duration::hours(self.config.window_past_hours);
        let time_max = now + Duration::days(self.config.window_future_days);
        let events = self
            .calendar
            .list_events(calendar_id, time_min, time_max)
            .await
            .map_err(|e| BookingError::external_sync(format!("event list failed: {e}")))?;

        let mut updates: Vec<(BookingId, BookingChanges)> = Vec::new();
        let mut inserts: Vec<NewBooking> = Vec::new();
        let mut adopted_cancellations: Vec<(BookingId, BookingStatus)> = Vec::new();
        let events_seen = events.len();

        for event in &events {
            match self.resolve_local(calendar_id, event).await? {
                Some(local) => {
                    let merged = merge::merge_status(local.status, event.status);
                    if merged != local.status {
                        adopted_cancellations.push((local.id, merged));
                    }
                    updates.push((local.id, refresh_changes(&local, event, merged, now)));
                }
                None => {
                    // A tombstoned event id belongs to a deleted
                    // booking. Never re-adopt those.
                    if self
                        .store
                        .is_event_tombstoned(calendar_id, &event.id)
                        .await?
                    {
                        continue;
                    }
                    if event.status == EventStatus::Cancelled {
                        continue;
                    }
                    if event.end <= event.start {
                        warn!(event_id = %event.id, "skipping external event with inverted times");
                        continue;
                    }
                    inserts.push(adopt_event(room, calendar_id, event, now));
                }
            }
        }

        let insert_ids: Vec<BookingId> = inserts.iter().map(|n| n.id).collect();
        let (updated, created) = self.store.sync_upsert(updates, inserts).await?;

        for id in insert_ids {
            self.record_sync(id, json!({ "adopted": true })).await;
        }
        for (id, status) in adopted_cancellations {
            self.record_sync(id, json!({ "status": status })).await;
        }

        self.mark_completed(room.id, now).await;
        info!(
            resource_id = %room.id,
            events = events_seen,
            updated,
            created,
            "reconciliation pass complete"
        );
        Ok(SyncSummary {
            events_seen,
            updated,
            created,
            skipped: false,
        })
    }

    /// Resolve the local booking for an external event: the private
    /// booking-id property first, the composite key second.
    async fn resolve_local(
        &self,
        calendar_id: &str,
        event: &CalendarEvent,
    ) -> Result<Option<Booking>> {
        if let Some(raw) = event.private_properties.get(BOOKING_ID_PROPERTY) {
            if let Ok(id) = BookingId::from_str(raw) {
                if let Some(booking) = self.store.get(id).await? {
                    return Ok(Some(booking));
                }
            }
            return Ok(None);
        }
        self.store.find_by_event(calendar_id, &event.id).await
    }

    async fn mark_completed(&self, resource_id: ResourceId, now: DateTime<Utc>) {
        self.last_pass.write().await.insert(resource_id, now);
    }

    async fn record_sync(&self, booking_id: BookingId, metadata: serde_json::Value) {
        let result = self
            .activity
            .append(NewActivity {
                booking_id,
                action: BookingAction::SyncedFromCalendar,
                performed_by: None,
                metadata,
            })
            .await;
        if let Err(e) = result {
            warn!(booking_id = %booking_id, error = %e, "failed to append activity record");
        }
    }
}

/// Field refresh applied to every matched booking, regardless of the
/// status precedence outcome. An inverted external window never reaches
/// the store; the local times stand.
fn refresh_changes(
    local: &Booking,
    event: &CalendarEvent,
    merged: BookingStatus,
    now: DateTime<Utc>,
) -> BookingChanges {
    let times_valid = event.end > event.start;
    if !times_valid {
        warn!(event_id = %event.id, "ignoring inverted times on external event");
    }
    BookingChanges {
        status: (merged != local.status).then_some(merged),
        title: event.title.clone(),
        description: event.description.clone(),
        start_time: times_valid.then_some(event.start),
        end_time: times_valid.then_some(event.end),
        attendees: Some(normalize_attendees(
            &event.human_attendee_emails(),
            event.organizer_email.as_deref(),
        )),
        organizer_email: event.organizer_email.clone(),
        last_synced_at: Some(now),
        ..BookingChanges::default()
    }
}

fn adopt_event(
    room: &Room,
    calendar_id: &str,
    event: &CalendarEvent,
    now: DateTime<Utc>,
) -> NewBooking {
    NewBooking {
        id: BookingId::new(),
        resource_id: room.id,
        title: event.title.clone(),
        description: event.description.clone(),
        start_time: event.start,
        end_time: event.end,
        status: BookingStatus::Scheduled,
        source: BookingSource::Api,
        host_user_id: None,
        organizer_email: event.organizer_email.clone(),
        attendees: normalize_attendees(
            &event.human_attendee_emails(),
            event.organizer_email.as_deref(),
        ),
        calendar_id: Some(calendar_id.to_string()),
        calendar_event_id: Some(event.id.clone()),
        // An event carrying the booking-id property was minted by this
        // system, even when the local row is gone.
        external_origin: !event.private_properties.contains_key(BOOKING_ID_PROPERTY),
        is_recurring: event.recurrence.is_some(),
        recurrence: None,
        recurrence_end_date: None,
        recurring_parent_id: None,
        checked_in_at: None,
        last_synced_at: Some(now),
        action_token: None,
    }
}
