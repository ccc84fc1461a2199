//! Best-effort external-calendar mirroring.
//!
//! Lifecycle operations commit locally first, then describe the mirror
//! work as a [`CalendarEffect`] and hand it to the [`OutboxExecutor`].
//! Effect failures are logged and swallowed: the local commit is never
//! rolled back for a mirroring problem, and the reconciliation sweep
//! heals whatever drift is left behind.

use std::collections::HashMap;
use std::sync::Arc;

use roomly_calendar::{
    CalendarClient, CalendarError, CalendarEvent, EventData, EventPatch, BOOKING_ID_PROPERTY,
};
use roomly_core::BookingId;
use roomly_db::BookingChanges;
use tracing::warn;

use crate::store::BookingStore;
use crate::types::HostRef;

/// One unit of external-calendar work derived from a local commit.
#[derive(Debug, Clone)]
pub enum CalendarEffect {
    /// Mirror a new booking as an event, organized by the host when one
    /// is known.
    Create {
        booking_id: BookingId,
        /// Resource calendar the event is attached to.
        calendar_id: String,
        host: HostRef,
        data: EventData,
    },
    /// Mirror a new recurring series; `data.recurrence` carries the
    /// native rule and the provider expands occurrences on its side.
    CreateRecurring {
        booking_id: BookingId,
        calendar_id: String,
        host: HostRef,
        data: EventData,
    },
    /// Move the mirrored event's times.
    PatchTime {
        booking_id: BookingId,
        calendar_id: String,
        event_id: String,
        patch: EventPatch,
        /// When the patch fails, delete the event instead so the slot is
        /// at least released.
        fallback_delete: bool,
    },
    /// Remove the mirrored event.
    Delete {
        booking_id: BookingId,
        calendar_id: String,
        event_id: String,
    },
}

/// Executes calendar effects against the provider, writing event ids
/// back onto the booking after successful creates.
pub struct OutboxExecutor {
    store: Arc<dyn BookingStore>,
    calendar: Arc<dyn CalendarClient>,
    service_account_email: String,
}

impl OutboxExecutor {
    #[must_use]
    pub fn new(
        store: Arc<dyn BookingStore>,
        calendar: Arc<dyn CalendarClient>,
        service_account_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            calendar,
            service_account_email: service_account_email.into(),
        }
    }

    /// Execute one effect. Never fails; problems are logged and left for
    /// reconciliation.
    pub async fn execute(&self, effect: CalendarEffect) {
        match effect {
            CalendarEffect::Create {
                booking_id,
                calendar_id,
                host,
                data,
            } => {
                self.create(booking_id, &calendar_id, &host, &data, false)
                    .await;
            }
            CalendarEffect::CreateRecurring {
                booking_id,
                calendar_id,
                host,
                data,
            } => {
                self.create(booking_id, &calendar_id, &host, &data, true)
                    .await;
            }
            CalendarEffect::PatchTime {
                booking_id,
                calendar_id,
                event_id,
                patch,
                fallback_delete,
            } => {
                if let Err(e) = self
                    .calendar
                    .update_event(&calendar_id, &event_id, &patch)
                    .await
                {
                    warn!(
                        booking_id = %booking_id,
                        event_id = %event_id,
                        error = %e,
                        "calendar event patch failed"
                    );
                    if fallback_delete {
                        if let Err(e) = self.calendar.delete_event(&calendar_id, &event_id).await {
                            warn!(
                                booking_id = %booking_id,
                                event_id = %event_id,
                                error = %e,
                                "fallback delete failed"
                            );
                        }
                    }
                }
            }
            CalendarEffect::Delete {
                booking_id,
                calendar_id,
                event_id,
            } => {
                match self.calendar.delete_event(&calendar_id, &event_id).await {
                    Ok(()) => {}
                    // Already gone externally; nothing left to mirror.
                    Err(e) if e.is_not_found() => {}
                    Err(e) => {
                        warn!(
                            booking_id = %booking_id,
                            event_id = %event_id,
                            error = %e,
                            "calendar event delete failed"
                        );
                    }
                }
            }
        }
    }

    async fn create(
        &self,
        booking_id: BookingId,
        calendar_id: &str,
        host: &HostRef,
        data: &EventData,
        recurring: bool,
    ) {
        let mut properties = HashMap::new();
        properties.insert(
            BOOKING_ID_PROPERTY.to_string(),
            booking_id.as_uuid().to_string(),
        );

        let event = match host.email() {
            Some(email) => {
                match self
                    .create_as(email, data, &properties, recurring)
                    .await
                {
                    Ok(event) => Some(event),
                    Err(CalendarError::Impersonation { .. }) => {
                        // The host cannot be impersonated; fall back to
                        // the service identity so the slot is still held.
                        match self
                            .create_as(&self.service_account_email, data, &properties, recurring)
                            .await
                        {
                            Ok(event) => Some(event),
                            Err(e) => {
                                warn!(
                                    booking_id = %booking_id,
                                    error = %e,
                                    "calendar event create failed as service account"
                                );
                                None
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            booking_id = %booking_id,
                            host = %email,
                            error = %e,
                            "calendar event create failed"
                        );
                        None
                    }
                }
            }
            None => {
                // Anonymous walk-up: the event lives directly on the
                // resource calendar.
                match self
                    .calendar
                    .create_event(calendar_id, data, Some(&properties))
                    .await
                {
                    Ok(event) => Some(event),
                    Err(e) => {
                        warn!(
                            booking_id = %booking_id,
                            calendar_id = %calendar_id,
                            error = %e,
                            "calendar event create failed"
                        );
                        None
                    }
                }
            }
        };

        let Some(event) = event else { return };
        // The booking records the resource calendar, not the organizer's
        // personal one, so later patches and deletes address the room.
        let changes = BookingChanges {
            calendar_id: Some(calendar_id.to_string()),
            calendar_event_id: Some(event.id.clone()),
            ..BookingChanges::default()
        };
        if let Err(e) = self.store.update(booking_id, changes).await {
            warn!(
                booking_id = %booking_id,
                event_id = %event.id,
                error = %e,
                "failed to record mirrored event id"
            );
        }
    }

    async fn create_as(
        &self,
        email: &str,
        data: &EventData,
        properties: &HashMap<String, String>,
        recurring: bool,
    ) -> Result<CalendarEvent, CalendarError> {
        let created = if recurring {
            self.calendar
                .create_recurring_event_as_user(email, data, Some(properties))
                .await?
        } else {
            self.calendar
                .create_event_as_user(email, data, Some(properties))
                .await?
        };
        Ok(created.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use roomly_calendar::{EventAttendee, InMemoryCalendar};
    use roomly_core::ResourceId;
    use roomly_db::{BookingSource, BookingStatus, NewBooking};

    use crate::store::InMemoryBookingStore;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn event_data() -> EventData {
        EventData {
            title: "Planning".to_string(),
            description: None,
            start: at("2026-03-02T10:00:00Z"),
            end: at("2026-03-02T11:00:00Z"),
            attendees: vec![EventAttendee::resource("room-a@corp")],
            recurrence: None,
        }
    }

    async fn seeded_booking(store: &InMemoryBookingStore) -> BookingId {
        let id = BookingId::new();
        store
            .insert(NewBooking {
                id,
                resource_id: ResourceId::new(),
                title: Some("Planning".to_string()),
                description: None,
                start_time: at("2026-03-02T10:00:00Z"),
                end_time: at("2026-03-02T11:00:00Z"),
                status: BookingStatus::Scheduled,
                source: BookingSource::Web,
                host_user_id: None,
                organizer_email: None,
                attendees: Vec::new(),
                calendar_id: None,
                calendar_event_id: None,
                external_origin: false,
                is_recurring: false,
                recurrence: None,
                recurrence_end_date: None,
                recurring_parent_id: None,
                checked_in_at: None,
                last_synced_at: None,
                action_token: None,
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_create_writes_back_event_id() {
        let store = Arc::new(InMemoryBookingStore::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        let executor = OutboxExecutor::new(store.clone(), calendar.clone(), "rooms@corp");
        let booking_id = seeded_booking(&store).await;

        executor
            .execute(CalendarEffect::Create {
                booking_id,
                calendar_id: "room-a@corp".to_string(),
                host: HostRef::OrganizerEmail("alice@corp".to_string()),
                data: event_data(),
            })
            .await;

        let booking = store.get(booking_id).await.unwrap().unwrap();
        assert_eq!(booking.calendar_id.as_deref(), Some("room-a@corp"));
        let event_id = booking.calendar_event_id.unwrap();
        let event = calendar.find(&event_id).unwrap();
        assert_eq!(event.organizer_email.as_deref(), Some("alice@corp"));
        assert_eq!(
            event.private_properties.get(BOOKING_ID_PROPERTY),
            Some(&booking_id.as_uuid().to_string())
        );
    }

    #[tokio::test]
    async fn test_impersonation_denial_falls_back_to_service_account() {
        let store = Arc::new(InMemoryBookingStore::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        calendar.deny_impersonation("bob@corp");
        let executor = OutboxExecutor::new(store.clone(), calendar.clone(), "rooms@corp");
        let booking_id = seeded_booking(&store).await;

        executor
            .execute(CalendarEffect::Create {
                booking_id,
                calendar_id: "room-a@corp".to_string(),
                host: HostRef::OrganizerEmail("bob@corp".to_string()),
                data: event_data(),
            })
            .await;

        let booking = store.get(booking_id).await.unwrap().unwrap();
        let event = calendar.find(&booking.calendar_event_id.unwrap()).unwrap();
        assert_eq!(event.organizer_email.as_deref(), Some("rooms@corp"));
    }

    #[tokio::test]
    async fn test_anonymous_create_lands_on_resource_calendar() {
        let store = Arc::new(InMemoryBookingStore::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        let executor = OutboxExecutor::new(store.clone(), calendar.clone(), "rooms@corp");
        let booking_id = seeded_booking(&store).await;

        executor
            .execute(CalendarEffect::Create {
                booking_id,
                calendar_id: "room-a@corp".to_string(),
                host: HostRef::Anonymous,
                data: event_data(),
            })
            .await;

        let booking = store.get(booking_id).await.unwrap().unwrap();
        let event = calendar.find(&booking.calendar_event_id.unwrap()).unwrap();
        assert_eq!(event.calendar_id, "room-a@corp");
        assert!(event.organizer_email.is_none());
    }

    #[tokio::test]
    async fn test_create_failure_leaves_booking_unlinked() {
        let store = Arc::new(InMemoryBookingStore::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        calendar.set_fail_creates(true);
        let executor = OutboxExecutor::new(store.clone(), calendar.clone(), "rooms@corp");
        let booking_id = seeded_booking(&store).await;

        executor
            .execute(CalendarEffect::Create {
                booking_id,
                calendar_id: "room-a@corp".to_string(),
                host: HostRef::Anonymous,
                data: event_data(),
            })
            .await;

        let booking = store.get(booking_id).await.unwrap().unwrap();
        assert!(booking.calendar_event_id.is_none());
        assert_eq!(booking.status, BookingStatus::Scheduled);
    }

    #[tokio::test]
    async fn test_patch_failure_falls_back_to_delete() {
        let store = Arc::new(InMemoryBookingStore::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        let executor = OutboxExecutor::new(store.clone(), calendar.clone(), "rooms@corp");
        let booking_id = seeded_booking(&store).await;

        let event = calendar
            .create_event("room-a@corp", &event_data(), None)
            .await
            .unwrap();
        calendar.set_fail_updates(true);

        executor
            .execute(CalendarEffect::PatchTime {
                booking_id,
                calendar_id: "room-a@corp".to_string(),
                event_id: event.id.clone(),
                patch: EventPatch::end_time(at("2026-03-02T10:30:00Z")),
                fallback_delete: true,
            })
            .await;

        assert!(calendar.find(&event.id).is_none());
    }

    #[tokio::test]
    async fn test_delete_of_missing_event_is_quiet() {
        let store = Arc::new(InMemoryBookingStore::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        let executor = OutboxExecutor::new(store.clone(), calendar, "rooms@corp");
        let booking_id = seeded_booking(&store).await;

        executor
            .execute(CalendarEffect::Delete {
                booking_id,
                calendar_id: "room-a@corp".to_string(),
                event_id: "already-gone".to_string(),
            })
            .await;
    }
}
