//! Reconciliation scenarios: precedence, adoption, tombstones, rate
//! limiting.

mod common;

use std::collections::HashMap;

use chrono::Duration;
use common::*;
use roomly_booking::{BookingStore, SyncConfig};
use roomly_calendar::{
    CalendarClient, CalendarEvent, EventAttendee, EventStatus, BOOKING_ID_PROPERTY,
};
use roomly_db::{BookingAction, BookingStatus};
use uuid::Uuid;

#[tokio::test]
async fn test_external_cancellation_is_adopted() {
    let h = Harness::new();
    let room = h.room_a();
    let booking = h
        .engine
        .create(create_request(
            &room,
            at("2026-03-02T10:00:00Z"),
            at("2026-03-02T11:00:00Z"),
        ))
        .await
        .unwrap();
    let event_id = booking.calendar_event_id.clone().unwrap();
    h.calendar.set_event_status(&event_id, EventStatus::Cancelled);

    let summary = h.sync().sync_resource(&room).await.unwrap();
    assert!(!summary.skipped);
    assert_eq!(summary.updated, 1);

    let stored = h.store.get(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);
    assert!(stored.last_synced_at.is_some());
    let log = h.activity.for_booking(booking.id);
    assert!(log.iter().any(|a| a.action == BookingAction::SyncedFromCalendar));
}

#[tokio::test]
async fn test_local_terminal_decisions_survive_sync() {
    let h = Harness::new();
    let room = h.room_a();
    let booking = h
        .engine
        .create(create_request(
            &room,
            at("2026-03-02T10:00:00Z"),
            at("2026-03-02T11:00:00Z"),
        ))
        .await
        .unwrap();
    h.clock.set(at("2026-03-02T10:30:00Z"));
    h.engine.end_early(booking.id, None).await.unwrap();

    // The mirrored event is still confirmed externally; sync must not
    // revive the booking.
    let summary = h.sync().sync_resource(&room).await.unwrap();
    assert_eq!(summary.updated, 1);
    let stored = h.store.get(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Ended);
}

#[tokio::test]
async fn test_field_refresh_follows_the_external_event() {
    let h = Harness::new();
    let room = h.room_a();
    let booking = h
        .engine
        .create(create_request(
            &room,
            at("2026-03-02T10:00:00Z"),
            at("2026-03-02T11:00:00Z"),
        ))
        .await
        .unwrap();
    let event_id = booking.calendar_event_id.clone().unwrap();
    // The organizer drags the meeting in the calendar UI.
    h.calendar
        .update_event(
            ROOM_A_CALENDAR,
            &event_id,
            &roomly_calendar::EventPatch {
                title: Some("Planning (moved)".to_string()),
                start: Some(at("2026-03-02T13:00:00Z")),
                end: Some(at("2026-03-02T14:00:00Z")),
            },
        )
        .await
        .unwrap();

    h.sync().sync_resource(&room).await.unwrap();
    let stored = h.store.get(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.title.as_deref(), Some("Planning (moved)"));
    assert_eq!(stored.start_time, at("2026-03-02T13:00:00Z"));
    assert_eq!(stored.end_time, at("2026-03-02T14:00:00Z"));
    assert_eq!(stored.status, BookingStatus::Scheduled);
}

#[tokio::test]
async fn test_unmatched_external_event_is_adopted() {
    let h = Harness::new();
    let room = h.room_a();
    h.seed_external_event(
        "walk-in",
        at("2026-03-02T15:00:00Z"),
        at("2026-03-02T16:00:00Z"),
    );

    let summary = h.sync().sync_resource(&room).await.unwrap();
    assert_eq!(summary.created, 1);

    let adopted = &h.store.all()[0];
    assert!(adopted.external_origin);
    assert_eq!(adopted.status, BookingStatus::Scheduled);
    assert_eq!(adopted.title.as_deref(), Some("External meeting"));
    assert_eq!(adopted.organizer_email.as_deref(), Some("carol@corp.example"));
    // Organizer and the room resource are excluded from attendees.
    assert!(adopted.attendees.is_empty());
    assert_eq!(adopted.calendar_event_id.as_deref(), Some("walk-in"));
    let log = h.activity.for_booking(adopted.id);
    assert!(log.iter().any(|a| a.action == BookingAction::SyncedFromCalendar));
}

#[tokio::test]
async fn test_linked_event_without_a_row_is_adopted_as_system_originated() {
    let h = Harness::new();
    let room = h.room_a();
    // A mirrored event whose local row was lost: the booking-id
    // property is present but resolves to nothing.
    let mut properties = HashMap::new();
    properties.insert(BOOKING_ID_PROPERTY.to_string(), Uuid::new_v4().to_string());
    h.calendar.seed_event(CalendarEvent {
        id: "lost-row".to_string(),
        calendar_id: ROOM_A_CALENDAR.to_string(),
        title: Some("Standup".to_string()),
        description: None,
        start: at("2026-03-02T15:00:00Z"),
        end: at("2026-03-02T16:00:00Z"),
        status: EventStatus::Confirmed,
        organizer_email: Some("carol@corp.example".to_string()),
        attendees: vec![
            EventAttendee::person("carol@corp.example"),
            EventAttendee::resource(ROOM_A_CALENDAR),
        ],
        recurrence: None,
        private_properties: properties,
    });

    let summary = h.sync().sync_resource(&room).await.unwrap();
    assert_eq!(summary.created, 1);

    let adopted = &h.store.all()[0];
    assert!(!adopted.external_origin);
    assert_eq!(adopted.calendar_event_id.as_deref(), Some("lost-row"));
    assert_eq!(adopted.status, BookingStatus::Scheduled);
}

#[tokio::test]
async fn test_cancelled_external_events_are_not_adopted() {
    let h = Harness::new();
    let room = h.room_a();
    h.seed_external_event(
        "dead",
        at("2026-03-02T15:00:00Z"),
        at("2026-03-02T16:00:00Z"),
    );
    h.calendar.set_event_status("dead", EventStatus::Cancelled);

    let summary = h.sync().sync_resource(&room).await.unwrap();
    assert_eq!(summary.created, 0);
    assert!(h.store.all().is_empty());
}

#[tokio::test]
async fn test_tombstoned_event_is_never_resurrected() {
    let h = Harness::new();
    let room = h.room_a();
    h.seed_external_event(
        "orphan",
        at("2026-03-02T15:00:00Z"),
        at("2026-03-02T16:00:00Z"),
    );

    let sync = h.sync();
    let summary = sync.sync_resource(&room).await.unwrap();
    assert_eq!(summary.created, 1);

    // Admin delete tombstones the event id.
    let adopted = h.store.all()[0].id;
    h.store.delete(adopted).await.unwrap();

    h.clock.advance(Duration::seconds(61));
    let summary = sync.sync_resource(&room).await.unwrap();
    assert_eq!(summary.created, 0);
    assert!(h.store.all().is_empty());
}

#[tokio::test]
async fn test_inverted_external_times_never_reach_a_matched_booking() {
    let h = Harness::new();
    let room = h.room_a();
    let booking = h
        .engine
        .create(create_request(
            &room,
            at("2026-03-02T10:00:00Z"),
            at("2026-03-02T11:00:00Z"),
        ))
        .await
        .unwrap();
    let event_id = booking.calendar_event_id.clone().unwrap();
    // A malformed edit leaves the external event ending before it starts.
    h.calendar
        .update_event(
            ROOM_A_CALENDAR,
            &event_id,
            &roomly_calendar::EventPatch {
                title: Some("Mangled".to_string()),
                start: Some(at("2026-03-02T14:00:00Z")),
                end: Some(at("2026-03-02T13:00:00Z")),
            },
        )
        .await
        .unwrap();

    h.sync().sync_resource(&room).await.unwrap();
    let stored = h.store.get(booking.id).await.unwrap().unwrap();
    // The rest of the refresh still lands; the time window does not move.
    assert_eq!(stored.title.as_deref(), Some("Mangled"));
    assert_eq!(stored.start_time, at("2026-03-02T10:00:00Z"));
    assert_eq!(stored.end_time, at("2026-03-02T11:00:00Z"));
}

#[tokio::test]
async fn test_sync_is_rate_limited_per_resource() {
    let h = Harness::new();
    let room_a = h.room_a();
    let room_b = h.add_room(RoomSpec {
        calendar_id: Some("room-b@corp.example".to_string()),
        ..RoomSpec::default()
    });
    let sync = h.sync();

    assert!(!sync.sync_resource(&room_a).await.unwrap().skipped);
    // Immediately again: skipped as a no-op.
    assert!(sync.sync_resource(&room_a).await.unwrap().skipped);
    // A different resource is not affected by room A's timestamp.
    assert!(!sync.sync_resource(&room_b).await.unwrap().skipped);

    h.clock.advance(Duration::seconds(61));
    assert!(!sync.sync_resource(&room_a).await.unwrap().skipped);
}

#[tokio::test]
async fn test_unconfigured_calendar_ids_are_skipped() {
    let h = Harness::new();
    let bare_numeric = h.add_room(RoomSpec {
        calendar_id: Some("12345".to_string()),
        ..RoomSpec::default()
    });
    let no_calendar = h.add_room(RoomSpec::default());
    let sync = h.sync();

    assert!(sync.sync_resource(&bare_numeric).await.unwrap().skipped);
    assert!(sync.sync_resource(&no_calendar).await.unwrap().skipped);
}

#[tokio::test]
async fn test_sync_window_excludes_distant_events() {
    let h = Harness::new();
    let room = h.room_a();
    h.seed_external_event(
        "next-quarter",
        at("2026-06-01T10:00:00Z"),
        at("2026-06-01T11:00:00Z"),
    );

    let summary = h
        .sync_with(SyncConfig::default())
        .sync_resource(&room)
        .await
        .unwrap();
    assert_eq!(summary.events_seen, 0);
    assert_eq!(summary.created, 0);
}
