//! Booking lifecycle engine.
//!
//! Owner of the booking state machine. Every operation validates against
//! local state and the external calendar's free-busy answer, commits
//! locally, appends one activity record, and then mirrors the change to
//! the external calendar through the outbox. Mirroring is best-effort:
//! once the local commit lands the operation has succeeded, and any
//! external drift is healed by the reconciliation sweep.
//!
//! Terminal statuses are monotonic. `Ended`, `Cancelled` and `NoShow`
//! bookings reject every lifecycle action with `InvalidState`.

use std::sync::Arc;

use chrono::Duration;
use roomly_calendar::{
    CalendarClient, DirectoryUserStatus, EventAttendee, EventData, EventPatch, UserDirectory,
};
use roomly_core::{BookingError, BookingId, Clock, ResourceId, Result, UserId};
use roomly_db::{
    Booking, BookingAction, BookingChanges, BookingFilter, BookingSource, BookingStatus,
    NewActivity, NewBooking, Room,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::availability::AvailabilityChecker;
use crate::config::BookingConfig;
use crate::outbox::{CalendarEffect, OutboxExecutor};
use crate::recurrence;
use crate::store::{ActivityLog, BookingStore, RoomStore};
use crate::types::{
    normalize_attendees, CreateBooking, ExtensionCheck, HostRef, QuickBook, RecurringBooking,
    SeriesCancellation,
};

/// The booking lifecycle engine.
pub struct BookingEngine {
    store: Arc<dyn BookingStore>,
    rooms: Arc<dyn RoomStore>,
    activity: Arc<dyn ActivityLog>,
    directory: Arc<dyn UserDirectory>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
    availability: AvailabilityChecker,
    outbox: OutboxExecutor,
}

impl BookingEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        rooms: Arc<dyn RoomStore>,
        activity: Arc<dyn ActivityLog>,
        calendar: Arc<dyn CalendarClient>,
        directory: Arc<dyn UserDirectory>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        let availability = AvailabilityChecker::new(calendar.clone());
        let outbox = OutboxExecutor::new(
            store.clone(),
            calendar,
            config.service_account_email.clone(),
        );
        Self {
            store,
            rooms,
            activity,
            directory,
            clock,
            config,
            availability,
            outbox,
        }
    }

    /// Create a single scheduled booking.
    ///
    /// Tablet bookings starting within the auto-check-in window are
    /// created already checked in; the person is standing at the door.
    pub async fn create(&self, req: CreateBooking) -> Result<Booking> {
        let now = self.clock.now();
        if req.end_time <= req.start_time {
            return Err(BookingError::validation(
                "end_time",
                "end time must be after start time",
            ));
        }
        let room = self.active_room(req.resource_id).await?;
        let duration = (req.end_time - req.start_time).num_minutes();
        self.check_duration(&room, duration)?;
        let host = self
            .resolve_host(req.host_user_id, req.organizer_email.as_deref())
            .await?;
        self.availability
            .ensure_free(&room, req.start_time, req.end_time)
            .await?;

        let auto_check_in = req.source == BookingSource::Tablet
            && (req.start_time - now).num_seconds() <= self.config.auto_check_in_window_secs;
        let (status, checked_in_at) = if auto_check_in {
            (BookingStatus::InProgress, Some(now))
        } else {
            (BookingStatus::Scheduled, None)
        };

        let attendees = normalize_attendees(&req.attendees, host.email());
        let booking = self
            .store
            .insert(NewBooking {
                id: BookingId::new(),
                resource_id: room.id,
                title: Some(req.title.clone()),
                description: req.description.clone(),
                start_time: req.start_time,
                end_time: req.end_time,
                status,
                source: req.source,
                host_user_id: host.user_id(),
                organizer_email: host.email().map(str::to_string),
                attendees: attendees.clone(),
                calendar_id: None,
                calendar_event_id: None,
                external_origin: false,
                is_recurring: false,
                recurrence: None,
                recurrence_end_date: None,
                recurring_parent_id: None,
                checked_in_at,
                last_synced_at: None,
                action_token: Some(new_action_token()),
            })
            .await?;
        info!(booking_id = %booking.id, room = %room.name, "booking created");

        self.record(
            booking.id,
            BookingAction::Created,
            req.performed_by,
            json!({ "source": req.source, "auto_checked_in": auto_check_in }),
        )
        .await;

        if let Some(calendar_id) = room.calendar_id.clone() {
            self.outbox
                .execute(CalendarEffect::Create {
                    booking_id: booking.id,
                    calendar_id: calendar_id.clone(),
                    host,
                    data: event_data(&booking, &calendar_id, None),
                })
                .await;
        }
        self.refreshed(booking).await
    }

    /// Quick walk-up booking starting now.
    ///
    /// The requested duration is clipped to the start of the next meeting
    /// on the room's calendar; a meeting already occupying the room
    /// rejects the request outright.
    pub async fn quick_book(&self, req: QuickBook) -> Result<Booking> {
        let now = self.clock.now();
        let room = self.active_room(req.resource_id).await?;
        if !room.allow_walk_up {
            return Err(BookingError::validation(
                "resource_id",
                "room does not allow walk-up booking",
            ));
        }
        self.check_duration(&room, req.duration_minutes)?;

        let requested_end = now + Duration::minutes(req.duration_minutes);
        let availability = self.availability.check(&room, now, requested_end).await?;
        let mut end = requested_end;
        if let Some(first) = availability.conflicts.first() {
            if first.covers(now) {
                return Err(BookingError::not_available(
                    format!("{} is occupied until {}", room.name, first.end.format("%H:%M")),
                    availability.conflict_windows(),
                ));
            }
            end = first.start;
        }

        let host = match req.organizer_email.as_deref() {
            Some(email) => HostRef::OrganizerEmail(email.trim().to_ascii_lowercase()),
            None => HostRef::Anonymous,
        };
        let attendees = normalize_attendees(&req.attendees, host.email());
        let booking = self
            .store
            .insert(NewBooking {
                id: BookingId::new(),
                resource_id: room.id,
                title: Some(req.title.clone()),
                description: None,
                start_time: now,
                end_time: end,
                status: BookingStatus::InProgress,
                source: BookingSource::Tablet,
                host_user_id: None,
                organizer_email: host.email().map(str::to_string),
                attendees: attendees.clone(),
                calendar_id: None,
                calendar_event_id: None,
                external_origin: false,
                is_recurring: false,
                recurrence: None,
                recurrence_end_date: None,
                recurring_parent_id: None,
                checked_in_at: Some(now),
                last_synced_at: None,
                action_token: Some(new_action_token()),
            })
            .await?;
        info!(booking_id = %booking.id, room = %room.name, clipped = end != requested_end, "walk-up booking created");

        self.record(
            booking.id,
            BookingAction::Created,
            req.performed_by,
            json!({ "walk_up": true, "clipped": end != requested_end }),
        )
        .await;

        if let Some(calendar_id) = room.calendar_id.clone() {
            self.outbox
                .execute(CalendarEffect::Create {
                    booking_id: booking.id,
                    calendar_id: calendar_id.clone(),
                    host,
                    data: event_data(&booking, &calendar_id, None),
                })
                .await;
        }
        self.refreshed(booking).await
    }

    /// Create a recurring series. Returns the series parent.
    ///
    /// Every occurrence must be free or the whole series is rejected,
    /// reporting the conflicting dates. The parent row is the first
    /// occurrence and carries the rule; children reference it for
    /// grouping only.
    pub async fn create_recurring(&self, req: RecurringBooking) -> Result<Booking> {
        if req.first_end <= req.first_start {
            return Err(BookingError::validation(
                "first_end",
                "end time must be after start time",
            ));
        }
        let room = self.active_room(req.resource_id).await?;
        let duration = req.first_end - req.first_start;
        self.check_duration(&room, duration.num_minutes())?;
        req.rule.validate()?;

        let starts = recurrence::expand(&req.rule, req.first_start, req.recurrence_end_date);
        if starts.is_empty() {
            return Err(BookingError::validation(
                "recurrence",
                "rule produces no occurrences before the series end date",
            ));
        }

        let mut conflicts = Vec::new();
        let mut conflict_dates = Vec::new();
        for start in &starts {
            let availability = self
                .availability
                .check(&room, *start, *start + duration)
                .await?;
            if !availability.is_available() {
                conflict_dates.push(start.date_naive());
                conflicts.extend(availability.conflict_windows());
            }
        }
        if !conflict_dates.is_empty() {
            let shown: Vec<String> = conflict_dates
                .iter()
                .take(5)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            let mut message = format!(
                "{} is busy on {}",
                room.name,
                shown.join(", ")
            );
            if conflict_dates.len() > 5 {
                message.push_str(&format!(" +{} more", conflict_dates.len() - 5));
            }
            return Err(BookingError::not_available(message, conflicts));
        }

        let host = self
            .resolve_host(req.host_user_id, req.organizer_email.as_deref())
            .await?;
        let attendees = normalize_attendees(&req.attendees, host.email());
        let parent_id = BookingId::new();
        let template = |id: BookingId, start, is_parent: bool| NewBooking {
            id,
            resource_id: room.id,
            title: Some(req.title.clone()),
            description: req.description.clone(),
            start_time: start,
            end_time: start + duration,
            status: BookingStatus::Scheduled,
            source: req.source,
            host_user_id: host.user_id(),
            organizer_email: host.email().map(str::to_string),
            attendees: attendees.clone(),
            calendar_id: None,
            calendar_event_id: None,
            external_origin: false,
            is_recurring: is_parent,
            recurrence: is_parent.then(|| req.rule.clone()),
            recurrence_end_date: is_parent.then_some(req.recurrence_end_date),
            recurring_parent_id: (!is_parent).then_some(parent_id),
            checked_in_at: None,
            last_synced_at: None,
            action_token: Some(new_action_token()),
        };

        let parent = self
            .store
            .insert(template(parent_id, starts[0], true))
            .await?;
        let children: Vec<NewBooking> = starts[1..]
            .iter()
            .map(|start| template(BookingId::new(), *start, false))
            .collect();
        if !children.is_empty() {
            if let Err(e) = self.store.insert_many(children).await {
                // Partial series must not survive; compensate by removing
                // the parent before reporting the failure.
                if let Err(del) = self.store.delete(parent_id).await {
                    warn!(booking_id = %parent_id, error = %del, "compensating parent delete failed");
                }
                return Err(e);
            }
        }
        info!(booking_id = %parent.id, occurrences = starts.len(), "recurring series created");

        self.record(
            parent.id,
            BookingAction::Created,
            req.performed_by,
            json!({ "recurring": true, "occurrences": starts.len() }),
        )
        .await;

        if let Some(calendar_id) = room.calendar_id.clone() {
            let rrule = req.rule.to_rrule(req.recurrence_end_date);
            self.outbox
                .execute(CalendarEffect::CreateRecurring {
                    booking_id: parent.id,
                    calendar_id: calendar_id.clone(),
                    host,
                    data: event_data(&parent, &calendar_id, Some(rrule)),
                })
                .await;
        }
        self.refreshed(parent).await
    }

    /// Check in a scheduled booking.
    pub async fn check_in(&self, id: BookingId, performed_by: Option<UserId>) -> Result<Booking> {
        let now = self.clock.now();
        let booking = self.booking(id).await?;
        if booking.status != BookingStatus::Scheduled {
            return Err(BookingError::invalid_state(
                booking.status.to_string(),
                "check in",
            ));
        }
        let updated = self
            .store
            .update(
                id,
                BookingChanges {
                    status: Some(BookingStatus::InProgress),
                    checked_in_at: Some(now),
                    ..BookingChanges::default()
                },
            )
            .await?;
        self.record(id, BookingAction::CheckedIn, performed_by, json!({}))
            .await;
        Ok(updated)
    }

    /// Extend a booking by the given number of minutes.
    ///
    /// Only the delta window `[old end, new end)` is availability-checked;
    /// the booking already owns its current slot.
    pub async fn extend(
        &self,
        id: BookingId,
        additional_minutes: i64,
        performed_by: Option<UserId>,
    ) -> Result<Booking> {
        if additional_minutes <= 0 {
            return Err(BookingError::validation(
                "additional_minutes",
                "extension must be a positive number of minutes",
            ));
        }
        let booking = self.booking(id).await?;
        if booking.is_terminal() {
            return Err(BookingError::invalid_state(
                booking.status.to_string(),
                "extend",
            ));
        }
        let room = self.active_room(booking.resource_id).await?;
        let new_end = booking.end_time + Duration::minutes(additional_minutes);
        self.availability
            .ensure_free(&room, booking.end_time, new_end)
            .await?;

        let updated = self
            .store
            .update(
                id,
                BookingChanges {
                    end_time: Some(new_end),
                    extension_count: Some(booking.extension_count + 1),
                    ..BookingChanges::default()
                },
            )
            .await?;
        self.record(
            id,
            BookingAction::Extended,
            performed_by,
            json!({
                "additional_minutes": additional_minutes,
                "extension_count": updated.extension_count,
            }),
        )
        .await;

        if let (Some(calendar_id), Some(event_id)) =
            (booking.calendar_id.clone(), booking.calendar_event_id.clone())
        {
            self.outbox
                .execute(CalendarEffect::PatchTime {
                    booking_id: id,
                    calendar_id,
                    event_id,
                    patch: EventPatch::end_time(new_end),
                    fallback_delete: false,
                })
                .await;
        }
        Ok(updated)
    }

    /// Pre-check whether an extension would succeed, naming the blocking
    /// meeting when one can be resolved locally.
    pub async fn check_extension(
        &self,
        id: BookingId,
        additional_minutes: i64,
    ) -> Result<ExtensionCheck> {
        let booking = self.booking(id).await?;
        if booking.is_terminal() {
            return Err(BookingError::invalid_state(
                booking.status.to_string(),
                "extend",
            ));
        }
        let room = self.active_room(booking.resource_id).await?;
        let new_end = booking.end_time + Duration::minutes(additional_minutes);
        let availability = self
            .availability
            .check(&room, booking.end_time, new_end)
            .await?;

        let Some(conflict) = availability.conflicts.first().copied() else {
            return Ok(ExtensionCheck {
                can_extend: true,
                conflict: None,
                conflicting_title: None,
                conflicting_organizer: None,
            });
        };

        // Best effort: the conflicting event usually has a local
        // counterpart whose title and organizer we can show.
        let local = self
            .store
            .list(&BookingFilter {
                resource_id: Some(booking.resource_id),
                statuses: vec![BookingStatus::Scheduled, BookingStatus::InProgress],
                starts_before: Some(conflict.end),
                ends_after: Some(conflict.start),
                ..BookingFilter::default()
            })
            .await?
            .into_iter()
            .find(|b| b.id != booking.id);

        Ok(ExtensionCheck {
            can_extend: false,
            conflict: Some(conflict),
            conflicting_title: local.as_ref().and_then(|b| b.title.clone()),
            conflicting_organizer: local.and_then(|b| b.organizer_email),
        })
    }

    /// End a booking before its scheduled end, releasing the slot.
    pub async fn end_early(&self, id: BookingId, performed_by: Option<UserId>) -> Result<Booking> {
        let now = self.clock.now();
        let booking = self.booking(id).await?;
        if booking.is_terminal() {
            return Err(BookingError::invalid_state(
                booking.status.to_string(),
                "end",
            ));
        }
        // Keep the row well-formed even when ending a meeting that has
        // not started yet.
        let new_end = now.max(booking.start_time + Duration::minutes(1));
        self.store
            .update(
                id,
                BookingChanges {
                    status: Some(BookingStatus::Ended),
                    end_time: Some(new_end),
                    ..BookingChanges::default()
                },
            )
            .await?;
        let verified = self.verify_status(id, BookingStatus::Ended, "end").await?;
        self.record(
            id,
            BookingAction::EndedEarly,
            performed_by,
            json!({ "ended_at": new_end }),
        )
        .await;

        if let (Some(calendar_id), Some(event_id)) =
            (booking.calendar_id.clone(), booking.calendar_event_id.clone())
        {
            self.outbox
                .execute(CalendarEffect::PatchTime {
                    booking_id: id,
                    calendar_id,
                    event_id,
                    patch: EventPatch::end_time(new_end),
                    fallback_delete: true,
                })
                .await;
        }
        Ok(verified)
    }

    /// Cancel a booking.
    pub async fn cancel(&self, id: BookingId, performed_by: Option<UserId>) -> Result<Booking> {
        let booking = self.booking(id).await?;
        if booking.is_terminal() {
            return Err(BookingError::invalid_state(
                booking.status.to_string(),
                "cancel",
            ));
        }
        self.store
            .update(
                id,
                BookingChanges {
                    status: Some(BookingStatus::Cancelled),
                    ..BookingChanges::default()
                },
            )
            .await?;
        let verified = self
            .verify_status(id, BookingStatus::Cancelled, "cancel")
            .await?;
        self.record(id, BookingAction::Cancelled, performed_by, json!({}))
            .await;

        if let (Some(calendar_id), Some(event_id)) =
            (booking.calendar_id.clone(), booking.calendar_event_id.clone())
        {
            self.outbox
                .execute(CalendarEffect::Delete {
                    booking_id: id,
                    calendar_id,
                    event_id,
                })
                .await;
        }
        Ok(verified)
    }

    /// Cancel a whole recurring series from its parent.
    ///
    /// Already-terminal occurrences are left untouched; the count of rows
    /// actually cancelled is returned.
    pub async fn cancel_series(
        &self,
        parent_id: BookingId,
        performed_by: Option<UserId>,
    ) -> Result<SeriesCancellation> {
        let parent = self.booking(parent_id).await?;
        if !parent.is_recurring {
            return Err(BookingError::validation(
                "booking_id",
                "booking is not a recurring series parent",
            ));
        }
        let members = self.store.series_members(parent_id).await?;
        let mut ids: Vec<BookingId> = vec![parent_id];
        ids.extend(members.iter().map(|b| b.id));
        let cancelled_count = self.store.cancel_many(&ids).await?;
        info!(booking_id = %parent_id, cancelled = cancelled_count, "series cancelled");

        self.record(
            parent_id,
            BookingAction::SeriesCancelled,
            performed_by,
            json!({ "cancelled_count": cancelled_count }),
        )
        .await;

        // One external event covers the whole series; deleting it removes
        // every expansion on the provider side.
        if let (Some(calendar_id), Some(event_id)) =
            (parent.calendar_id.clone(), parent.calendar_event_id.clone())
        {
            self.outbox
                .execute(CalendarEffect::Delete {
                    booking_id: parent_id,
                    calendar_id,
                    event_id,
                })
                .await;
        }
        Ok(SeriesCancellation {
            parent_id,
            cancelled_count,
        })
    }

    async fn booking(&self, id: BookingId) -> Result<Booking> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| BookingError::not_found("Booking", id.to_string()))
    }

    async fn active_room(&self, id: ResourceId) -> Result<Room> {
        let room = self
            .rooms
            .get(id)
            .await?
            .ok_or_else(|| BookingError::not_found("Room", id.to_string()))?;
        if !room.active {
            return Err(BookingError::validation("resource_id", "room is not active"));
        }
        Ok(room)
    }

    fn check_duration(&self, room: &Room, minutes: i64) -> Result<()> {
        if minutes <= 0 {
            return Err(BookingError::validation(
                "duration",
                "duration must be positive",
            ));
        }
        let max = room
            .max_booking_minutes
            .map_or(self.config.default_max_duration_minutes, i64::from);
        if minutes > max {
            return Err(BookingError::validation(
                "duration",
                format!("exceeds maximum of {max} minutes"),
            ));
        }
        Ok(())
    }

    async fn resolve_host(
        &self,
        host_user_id: Option<UserId>,
        organizer_email: Option<&str>,
    ) -> Result<HostRef> {
        let Some(user_id) = host_user_id else {
            return Ok(match organizer_email {
                Some(email) => HostRef::OrganizerEmail(email.trim().to_ascii_lowercase()),
                None => HostRef::Anonymous,
            });
        };
        let status = self
            .directory
            .resolve_user(user_id)
            .await
            .map_err(|e| BookingError::external_sync(format!("directory lookup failed: {e}")))?;
        match status {
            DirectoryUserStatus::Active(user) => Ok(HostRef::Host(user)),
            DirectoryUserStatus::Inactive => Err(BookingError::validation(
                "host_user_id",
                "host user is inactive",
            )),
            DirectoryUserStatus::NotFound => {
                Err(BookingError::not_found("Host user", user_id.to_string()))
            }
        }
    }

    /// Read-back verification for terminal transitions: a write that the
    /// store silently dropped must surface as a hard failure before any
    /// external side effect runs.
    async fn verify_status(
        &self,
        id: BookingId,
        expected: BookingStatus,
        action: &str,
    ) -> Result<Booking> {
        let stored = self.booking(id).await?;
        if stored.status != expected {
            return Err(BookingError::database(format!(
                "{action} write did not persist: booking {id} is still {}",
                stored.status
            )));
        }
        Ok(stored)
    }

    /// Latest state after the outbox possibly wrote back event ids.
    async fn refreshed(&self, booking: Booking) -> Result<Booking> {
        Ok(self.store.get(booking.id).await?.unwrap_or(booking))
    }

    async fn record(
        &self,
        booking_id: BookingId,
        action: BookingAction,
        performed_by: Option<UserId>,
        metadata: serde_json::Value,
    ) {
        let result = self
            .activity
            .append(NewActivity {
                booking_id,
                action,
                performed_by,
                metadata,
            })
            .await;
        if let Err(e) = result {
            warn!(booking_id = %booking_id, error = %e, "failed to append activity record");
        }
    }
}

fn new_action_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn event_data(booking: &Booking, calendar_id: &str, recurrence: Option<String>) -> EventData {
    let mut attendees: Vec<EventAttendee> = booking
        .attendees
        .iter()
        .map(|email| EventAttendee::person(email.as_str()))
        .collect();
    attendees.push(EventAttendee::resource(calendar_id));
    EventData {
        title: booking
            .title
            .clone()
            .unwrap_or_else(|| "Reserved".to_string()),
        description: booking.description.clone(),
        start: booking.start_time,
        end: booking.end_time,
        attendees,
        recurrence,
    }
}
