//! Walk-up quick-book scenarios: clipping and occupancy rejection.

mod common;

use common::*;
use roomly_core::BookingError;
use roomly_db::{BookingSource, BookingStatus};

#[tokio::test]
async fn test_quick_book_starts_now_checked_in() {
    let h = Harness::new();
    let room = h.room_a();

    let booking = h.engine.quick_book(quick_request(&room, 30)).await.unwrap();
    assert_eq!(booking.status, BookingStatus::InProgress);
    assert_eq!(booking.source, BookingSource::Tablet);
    assert_eq!(booking.start_time, t0());
    assert_eq!(booking.end_time, at("2026-03-02T09:30:00Z"));
    assert_eq!(booking.checked_in_at, Some(t0()));
    // Anonymous walk-up: the mirrored event lives on the room calendar.
    let event = h.calendar.find(&booking.calendar_event_id.clone().unwrap()).unwrap();
    assert_eq!(event.calendar_id, ROOM_A_CALENDAR);
}

#[tokio::test]
async fn test_quick_book_clips_to_next_meeting() {
    let h = Harness::new();
    let room = h.room_a();
    h.seed_external_event(
        "next",
        at("2026-03-02T09:30:00Z"),
        at("2026-03-02T10:00:00Z"),
    );

    let booking = h.engine.quick_book(quick_request(&room, 60)).await.unwrap();
    assert_eq!(booking.end_time, at("2026-03-02T09:30:00Z"));
    assert_eq!(booking.duration_minutes(), 30);
}

#[tokio::test]
async fn test_quick_book_clips_to_earliest_of_several_meetings() {
    let h = Harness::new();
    let room = h.room_a();
    // Seeded out of order; clipping must use the earliest start.
    h.seed_external_event(
        "later",
        at("2026-03-02T09:45:00Z"),
        at("2026-03-02T10:00:00Z"),
    );
    h.seed_external_event(
        "sooner",
        at("2026-03-02T09:20:00Z"),
        at("2026-03-02T09:40:00Z"),
    );

    let booking = h.engine.quick_book(quick_request(&room, 60)).await.unwrap();
    assert_eq!(booking.end_time, at("2026-03-02T09:20:00Z"));
}

#[tokio::test]
async fn test_quick_book_rejected_when_room_occupied() {
    let h = Harness::new();
    let room = h.room_a();
    h.seed_external_event(
        "running",
        at("2026-03-02T08:45:00Z"),
        at("2026-03-02T09:15:00Z"),
    );

    let err = h.engine.quick_book(quick_request(&room, 30)).await.unwrap_err();
    match err {
        BookingError::NotAvailable { message, conflicts } => {
            assert!(message.contains("occupied until 09:15"), "message: {message}");
            assert_eq!(conflicts.len(), 1);
        }
        other => panic!("expected NotAvailable, got {other:?}"),
    }
    assert!(h.store.all().is_empty());
}

#[tokio::test]
async fn test_quick_book_requires_walk_up_permission() {
    let h = Harness::new();
    let room = h.add_room(RoomSpec {
        allow_walk_up: false,
        ..RoomSpec::default()
    });

    let err = h.engine.quick_book(quick_request(&room, 30)).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation { .. }));
}

#[tokio::test]
async fn test_quick_book_honors_room_duration_cap() {
    let h = Harness::new();
    let room = h.add_room(RoomSpec {
        max_booking_minutes: Some(45),
        ..RoomSpec::default()
    });

    let err = h.engine.quick_book(quick_request(&room, 60)).await.unwrap_err();
    assert!(matches!(err, BookingError::Validation { .. }));
}
