//! In-memory store implementations for tests.

use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roomly_core::{BookingError, BookingId, ResourceId, Result};
use roomly_db::{
    Booking, BookingActivity, BookingChanges, BookingFilter, BookingStatus, NewActivity,
    NewBooking, Room,
};
use uuid::Uuid;

use super::{ActivityLog, BookingStore, RoomStore};

/// In-memory [`BookingStore`] mirroring the Postgres semantics,
/// including the `end_time > start_time` check constraint and event-id
/// tombstones.
#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: RwLock<Vec<Booking>>,
    tombstones: RwLock<HashSet<(String, String)>>,
    // Test knob: updates report success without persisting anything,
    // simulating a lost write that read-back verification must catch.
    silent_writes: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryBookingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `update` return the changed row without storing it.
    pub fn set_silent_writes(&self, silent: bool) {
        self.silent_writes.store(silent, Ordering::SeqCst);
    }

    /// Make every write fail with a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of every stored booking, ordered by start time.
    pub fn all(&self) -> Vec<Booking> {
        let mut bookings = self
            .bookings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        bookings.sort_by_key(|b| b.start_time);
        bookings
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BookingError::database("injected write failure"));
        }
        Ok(())
    }

    fn check_time_order(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
        if end <= start {
            return Err(BookingError::database(
                "bookings_time_order check constraint violated",
            ));
        }
        Ok(())
    }

    fn insert_locked(bookings: &mut Vec<Booking>, new: NewBooking) -> Result<Booking> {
        Self::check_time_order(new.start_time, new.end_time)?;
        let booking = Booking::from_new(new, Utc::now());
        bookings.push(booking.clone());
        Ok(booking)
    }

    fn apply_changes(booking: &mut Booking, changes: BookingChanges) {
        if let Some(status) = changes.status {
            booking.status = status;
        }
        if let Some(title) = changes.title {
            booking.title = Some(title);
        }
        if let Some(description) = changes.description {
            booking.description = Some(description);
        }
        if let Some(start_time) = changes.start_time {
            booking.start_time = start_time;
        }
        if let Some(end_time) = changes.end_time {
            booking.end_time = end_time;
        }
        if let Some(checked_in_at) = changes.checked_in_at {
            booking.checked_in_at = Some(checked_in_at);
        }
        if let Some(extension_count) = changes.extension_count {
            booking.extension_count = extension_count;
        }
        if let Some(attendees) = changes.attendees {
            booking.attendees = attendees;
        }
        if let Some(organizer_email) = changes.organizer_email {
            booking.organizer_email = Some(organizer_email);
        }
        if let Some(calendar_id) = changes.calendar_id {
            booking.calendar_id = Some(calendar_id);
        }
        if let Some(calendar_event_id) = changes.calendar_event_id {
            booking.calendar_event_id = Some(calendar_event_id);
        }
        if let Some(last_synced_at) = changes.last_synced_at {
            booking.last_synced_at = Some(last_synced_at);
        }
        if let Some(reminder_sent_at) = changes.reminder_sent_at {
            booking.reminder_sent_at = Some(reminder_sent_at);
        }
        booking.updated_at = Utc::now();
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn get(&self, id: BookingId) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().unwrap_or_else(|e| e.into_inner());
        Ok(bookings.iter().find(|b| b.id == id).cloned())
    }

    async fn find_by_event(&self, calendar_id: &str, event_id: &str) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().unwrap_or_else(|e| e.into_inner());
        Ok(bookings
            .iter()
            .find(|b| {
                b.calendar_id.as_deref() == Some(calendar_id)
                    && b.calendar_event_id.as_deref() == Some(event_id)
            })
            .cloned())
    }

    async fn find_by_action_token(&self, token: &str) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().unwrap_or_else(|e| e.into_inner());
        Ok(bookings
            .iter()
            .find(|b| b.action_token.as_deref() == Some(token))
            .cloned())
    }

    async fn list(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<Booking> = bookings
            .iter()
            .filter(|b| filter.resource_id.map_or(true, |r| b.resource_id == r))
            .filter(|b| filter.statuses.is_empty() || filter.statuses.contains(&b.status))
            .filter(|b| filter.starts_before.map_or(true, |t| b.start_time < t))
            .filter(|b| filter.ends_after.map_or(true, |t| b.end_time > t))
            .filter(|b| {
                filter
                    .recurring_parent_id
                    .map_or(true, |p| b.recurring_parent_id == Some(p))
            })
            .cloned()
            .collect();
        matched.sort_by_key(|b| b.start_time);
        if let Some(limit) = filter.limit {
            matched.truncate(limit.max(0) as usize);
        }
        Ok(matched)
    }

    async fn insert(&self, new: NewBooking) -> Result<Booking> {
        self.check_writes()?;
        let mut bookings = self.bookings.write().unwrap_or_else(|e| e.into_inner());
        Self::insert_locked(&mut bookings, new)
    }

    async fn insert_many(&self, news: Vec<NewBooking>) -> Result<Vec<Booking>> {
        self.check_writes()?;
        // All-or-nothing, matching the Postgres transaction.
        for new in &news {
            Self::check_time_order(new.start_time, new.end_time)?;
        }
        let mut bookings = self.bookings.write().unwrap_or_else(|e| e.into_inner());
        let mut inserted = Vec::with_capacity(news.len());
        for new in news {
            inserted.push(Self::insert_locked(&mut bookings, new)?);
        }
        Ok(inserted)
    }

    async fn update(&self, id: BookingId, changes: BookingChanges) -> Result<Booking> {
        self.check_writes()?;
        let mut bookings = self.bookings.write().unwrap_or_else(|e| e.into_inner());
        let booking = bookings
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| BookingError::not_found("Booking", id.to_string()))?;
        let start = changes.start_time.unwrap_or(booking.start_time);
        let end = changes.end_time.unwrap_or(booking.end_time);
        Self::check_time_order(start, end)?;
        if self.silent_writes.load(Ordering::SeqCst) {
            let mut detached = booking.clone();
            Self::apply_changes(&mut detached, changes);
            return Ok(detached);
        }
        Self::apply_changes(booking, changes);
        Ok(booking.clone())
    }

    async fn cancel_many(&self, ids: &[BookingId]) -> Result<u64> {
        self.check_writes()?;
        let mut bookings = self.bookings.write().unwrap_or_else(|e| e.into_inner());
        let mut cancelled = 0;
        for booking in bookings.iter_mut() {
            if ids.contains(&booking.id)
                && matches!(
                    booking.status,
                    BookingStatus::Scheduled | BookingStatus::InProgress
                )
            {
                booking.status = BookingStatus::Cancelled;
                booking.updated_at = Utc::now();
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    async fn series_members(&self, parent_id: BookingId) -> Result<Vec<Booking>> {
        self.list(&BookingFilter {
            recurring_parent_id: Some(parent_id),
            ..BookingFilter::default()
        })
        .await
    }

    async fn no_show_candidates(
        &self,
        cutoff: DateTime<Utc>,
        resource_id: Option<ResourceId>,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<Booking> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Scheduled)
            .filter(|b| b.checked_in_at.is_none())
            .filter(|b| b.start_time <= cutoff)
            .filter(|b| resource_id.map_or(true, |r| b.resource_id == r))
            .cloned()
            .collect();
        matched.sort_by_key(|b| b.start_time);
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn reminder_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<Booking> = bookings
            .iter()
            .filter(|b| b.status == BookingStatus::Scheduled)
            .filter(|b| b.checked_in_at.is_none())
            .filter(|b| b.reminder_sent_at.is_none())
            .filter(|b| b.start_time <= cutoff)
            .cloned()
            .collect();
        matched.sort_by_key(|b| b.start_time);
        matched.truncate(limit.max(0) as usize);
        Ok(matched)
    }

    async fn sync_upsert(
        &self,
        updates: Vec<(BookingId, BookingChanges)>,
        inserts: Vec<NewBooking>,
    ) -> Result<(usize, usize)> {
        self.check_writes()?;
        let mut bookings = self.bookings.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = 0;
        for (id, changes) in updates {
            if let Some(booking) = bookings.iter_mut().find(|b| b.id == id) {
                Self::apply_changes(booking, changes);
                updated += 1;
            }
        }
        let mut created = 0;
        for new in inserts {
            Self::insert_locked(&mut bookings, new)?;
            created += 1;
        }
        Ok((updated, created))
    }

    async fn delete(&self, id: BookingId) -> Result<()> {
        self.check_writes()?;
        let mut bookings = self.bookings.write().unwrap_or_else(|e| e.into_inner());
        if let Some(pos) = bookings.iter().position(|b| b.id == id) {
            let booking = bookings.remove(pos);
            if let (Some(calendar_id), Some(event_id)) =
                (booking.calendar_id, booking.calendar_event_id)
            {
                self.tombstones
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert((calendar_id, event_id));
            }
        }
        Ok(())
    }

    async fn is_event_tombstoned(&self, calendar_id: &str, event_id: &str) -> Result<bool> {
        let tombstones = self.tombstones.read().unwrap_or_else(|e| e.into_inner());
        Ok(tombstones.contains(&(calendar_id.to_string(), event_id.to_string())))
    }
}

/// In-memory [`RoomStore`].
#[derive(Default)]
pub struct InMemoryRoomStore {
    rooms: RwLock<Vec<Room>>,
}

impl InMemoryRoomStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, room: Room) {
        self.rooms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(room);
    }
}

#[async_trait]
impl RoomStore for InMemoryRoomStore {
    async fn get(&self, id: ResourceId) -> Result<Option<Room>> {
        let rooms = self.rooms.read().unwrap_or_else(|e| e.into_inner());
        Ok(rooms.iter().find(|r| r.id == id).cloned())
    }
}

/// In-memory [`ActivityLog`].
#[derive(Default)]
pub struct InMemoryActivityLog {
    entries: RwLock<Vec<BookingActivity>>,
}

impl InMemoryActivityLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded entry, in append order.
    pub fn entries(&self) -> Vec<BookingActivity> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Entries for one booking, in append order.
    pub fn for_booking(&self, booking_id: BookingId) -> Vec<BookingActivity> {
        self.entries()
            .into_iter()
            .filter(|a| a.booking_id == booking_id)
            .collect()
    }
}

#[async_trait]
impl ActivityLog for InMemoryActivityLog {
    async fn append(&self, activity: NewActivity) -> Result<()> {
        let entry = BookingActivity {
            id: Uuid::new_v4(),
            booking_id: activity.booking_id,
            action: activity.action,
            performed_by: activity.performed_by,
            metadata: activity.metadata,
            created_at: Utc::now(),
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use roomly_db::BookingSource;

    fn new_booking(start_h: u32, end_h: u32) -> NewBooking {
        let day = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        NewBooking {
            id: BookingId::new(),
            resource_id: ResourceId::new(),
            title: Some("standup".to_string()),
            description: None,
            start_time: day + chrono::Duration::hours(i64::from(start_h)),
            end_time: day + chrono::Duration::hours(i64::from(end_h)),
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
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_inverted_times() {
        let store = InMemoryBookingStore::new();
        let result = store.insert(new_booking(10, 9)).await;
        assert!(matches!(result, Err(BookingError::Database { .. })));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryBookingStore::new();
        let result = store
            .update(BookingId::new(), BookingChanges::default())
            .await;
        assert!(matches!(result, Err(BookingError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancel_many_skips_terminal_rows() {
        let store = InMemoryBookingStore::new();
        let a = store.insert(new_booking(9, 10)).await.unwrap();
        let b = store.insert(new_booking(11, 12)).await.unwrap();
        store
            .update(
                b.id,
                BookingChanges {
                    status: Some(BookingStatus::Ended),
                    ..BookingChanges::default()
                },
            )
            .await
            .unwrap();

        let cancelled = store.cancel_many(&[a.id, b.id]).await.unwrap();
        assert_eq!(cancelled, 1);
        let b = store.get(b.id).await.unwrap().unwrap();
        assert_eq!(b.status, BookingStatus::Ended);
    }

    #[tokio::test]
    async fn test_delete_tombstones_event_id() {
        let store = InMemoryBookingStore::new();
        let mut new = new_booking(9, 10);
        new.calendar_id = Some("room-a@corp".to_string());
        new.calendar_event_id = Some("evt-1".to_string());
        let booking = store.insert(new).await.unwrap();

        store.delete(booking.id).await.unwrap();
        assert!(store.get(booking.id).await.unwrap().is_none());
        assert!(store
            .is_event_tombstoned("room-a@corp", "evt-1")
            .await
            .unwrap());
        assert!(!store
            .is_event_tombstoned("room-a@corp", "evt-2")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_silent_writes_do_not_persist() {
        let store = InMemoryBookingStore::new();
        let booking = store.insert(new_booking(9, 10)).await.unwrap();
        store.set_silent_writes(true);

        let returned = store
            .update(
                booking.id,
                BookingChanges {
                    status: Some(BookingStatus::Cancelled),
                    ..BookingChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(returned.status, BookingStatus::Cancelled);

        let stored = store.get(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Scheduled);
    }
}
