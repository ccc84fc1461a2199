//! Shared fixtures for the engine integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use roomly_booking::store::{InMemoryActivityLog, InMemoryBookingStore, InMemoryRoomStore};
use roomly_booking::types::{CreateBooking, QuickBook, RecurringBooking};
use roomly_booking::{
    BookingConfig, BookingEngine, NoShowScanner, ReconciliationSync, ReminderScanner, SyncConfig,
};
use roomly_calendar::{CalendarEvent, EventAttendee, EventStatus, InMemoryCalendar, InMemoryDirectory};
use roomly_core::{Clock, FixedClock, ResourceId, UserId};
use roomly_db::{BookingSource, RecurrenceRule, Room};
use uuid::Uuid;

pub const ALICE_ID: Uuid = Uuid::from_u128(0x1111_1111_1111_1111_1111_1111_1111_1111);
pub const BOB_ID: Uuid = Uuid::from_u128(0x2222_2222_2222_2222_2222_2222_2222_2222);
pub const ROOM_A_ID: Uuid = Uuid::from_u128(0xaaaa_aaaa_aaaa_aaaa_aaaa_aaaa_aaaa_aaaa);
pub const ROOM_A_CALENDAR: &str = "room-a@corp.example";

/// Monday 2026-03-02, 09:00 UTC.
pub fn t0() -> DateTime<Utc> {
    at("2026-03-02T09:00:00Z")
}

pub fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

pub fn alice() -> UserId {
    UserId::from_uuid(ALICE_ID)
}

pub fn bob() -> UserId {
    UserId::from_uuid(BOB_ID)
}

/// Everything a scenario needs, wired over the in-memory store and the
/// simulated calendar provider, with the clock pinned at [`t0`].
pub struct Harness {
    pub store: Arc<InMemoryBookingStore>,
    pub rooms: Arc<InMemoryRoomStore>,
    pub activity: Arc<InMemoryActivityLog>,
    pub calendar: Arc<InMemoryCalendar>,
    pub directory: Arc<InMemoryDirectory>,
    pub clock: Arc<FixedClock>,
    pub config: BookingConfig,
    pub engine: BookingEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BookingConfig::default())
    }

    pub fn with_config(config: BookingConfig) -> Self {
        let store = Arc::new(InMemoryBookingStore::new());
        let rooms = Arc::new(InMemoryRoomStore::new());
        let activity = Arc::new(InMemoryActivityLog::new());
        let calendar = Arc::new(InMemoryCalendar::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(FixedClock::new(t0()));
        directory.add_active(alice(), "alice@corp.example", "Alice");

        let engine = BookingEngine::new(
            store.clone(),
            rooms.clone(),
            activity.clone(),
            calendar.clone(),
            directory.clone(),
            clock.clone(),
            config.clone(),
        );
        Self {
            store,
            rooms,
            activity,
            calendar,
            directory,
            clock,
            config,
            engine,
        }
    }

    /// Register the default test room, backed by an external calendar
    /// and open to walk-ups.
    pub fn room_a(&self) -> Room {
        self.add_room(RoomSpec {
            id: ResourceId::from_uuid(ROOM_A_ID),
            name: "Aurora".to_string(),
            calendar_id: Some(ROOM_A_CALENDAR.to_string()),
            max_booking_minutes: None,
            allow_walk_up: true,
        })
    }

    pub fn add_room(&self, spec: RoomSpec) -> Room {
        let now = self.clock.now();
        let room = Room {
            id: spec.id,
            name: spec.name,
            calendar_id: spec.calendar_id,
            max_booking_minutes: spec.max_booking_minutes,
            allow_walk_up: spec.allow_walk_up,
            active: true,
            created_at: now,
            updated_at: now,
        };
        self.rooms.add(room.clone());
        room
    }

    pub fn no_show_scanner(&self) -> NoShowScanner {
        NoShowScanner::new(
            self.store.clone(),
            self.activity.clone(),
            self.calendar.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    pub fn reminder_scanner(&self) -> ReminderScanner {
        ReminderScanner::new(
            self.store.clone(),
            self.activity.clone(),
            self.clock.clone(),
            self.config.clone(),
        )
    }

    pub fn sync(&self) -> ReconciliationSync {
        self.sync_with(SyncConfig::default())
    }

    pub fn sync_with(&self, config: SyncConfig) -> ReconciliationSync {
        ReconciliationSync::new(
            self.store.clone(),
            self.activity.clone(),
            self.calendar.clone(),
            self.clock.clone(),
            config,
        )
    }

    /// Seed an external event on the room calendar, as if a user created
    /// it directly in the calendar UI.
    pub fn seed_external_event(&self, id: &str, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.calendar.seed_event(CalendarEvent {
            id: id.to_string(),
            calendar_id: ROOM_A_CALENDAR.to_string(),
            title: Some("External meeting".to_string()),
            description: None,
            start,
            end,
            status: EventStatus::Confirmed,
            organizer_email: Some("carol@corp.example".to_string()),
            attendees: vec![
                EventAttendee::person("carol@corp.example"),
                EventAttendee::resource(ROOM_A_CALENDAR),
            ],
            recurrence: None,
            private_properties: Default::default(),
        });
    }
}

pub struct RoomSpec {
    pub id: ResourceId,
    pub name: String,
    pub calendar_id: Option<String>,
    pub max_booking_minutes: Option<i32>,
    pub allow_walk_up: bool,
}

impl Default for RoomSpec {
    fn default() -> Self {
        Self {
            id: ResourceId::new(),
            name: "Borealis".to_string(),
            calendar_id: None,
            max_booking_minutes: None,
            allow_walk_up: true,
        }
    }
}

pub fn create_request(room: &Room, start: DateTime<Utc>, end: DateTime<Utc>) -> CreateBooking {
    CreateBooking {
        resource_id: room.id,
        title: "Planning".to_string(),
        description: None,
        start_time: start,
        end_time: end,
        source: BookingSource::Web,
        host_user_id: None,
        organizer_email: Some("alice@corp.example".to_string()),
        attendees: vec!["bob@corp.example".to_string()],
        performed_by: Some(alice()),
    }
}

pub fn quick_request(room: &Room, duration_minutes: i64) -> QuickBook {
    QuickBook {
        resource_id: room.id,
        title: "Walk-up".to_string(),
        duration_minutes,
        organizer_email: None,
        attendees: Vec::new(),
        performed_by: None,
    }
}

pub fn recurring_request(
    room: &Room,
    first_start: DateTime<Utc>,
    first_end: DateTime<Utc>,
    rule: RecurrenceRule,
    end_date: NaiveDate,
) -> RecurringBooking {
    RecurringBooking {
        resource_id: room.id,
        title: "Weekly sync".to_string(),
        description: None,
        first_start,
        first_end,
        rule,
        recurrence_end_date: end_date,
        source: BookingSource::Web,
        host_user_id: Some(alice()),
        organizer_email: None,
        attendees: Vec::new(),
        performed_by: Some(alice()),
    }
}
