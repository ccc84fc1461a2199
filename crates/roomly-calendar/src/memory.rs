//! In-memory provider implementations.
//!
//! A functioning simulated calendar and directory used by the booking
//! engine's test suites. Events created while impersonating a user live
//! on that user's calendar; free-busy and event listing also see them on
//! any resource calendar attached as an attendee, matching how resource
//! calendars mirror invitations in real providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use roomly_core::UserId;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::{CalendarError, CalendarResult};
use crate::traits::{CalendarClient, UserDirectory};
use crate::types::{
    BusyInterval, CalendarEvent, CreatedAsUser, DirectoryUser, DirectoryUserStatus, EventData,
    EventPatch, EventStatus, FreeBusyCalendar,
};

/// In-memory implementation of [`CalendarClient`].
#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    events: RwLock<Vec<CalendarEvent>>,
    deny_impersonation: RwLock<HashSet<String>>,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
    fail_free_busy: AtomicBool,
}

impl InMemoryCalendar {
    /// Create an empty simulated calendar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an event directly, as if it had been created in the external
    /// calendar UI.
    pub fn seed_event(&self, event: CalendarEvent) {
        self.events
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    /// Change the status of a stored event (simulate an external cancel).
    pub fn set_event_status(&self, event_id: &str, status: EventStatus) {
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        if let Some(event) = events.iter_mut().find(|e| e.id == event_id) {
            event.status = status;
        }
    }

    /// Refuse impersonation for the given user from now on.
    pub fn deny_impersonation(&self, user_email: impl Into<String>) {
        self.deny_impersonation
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_email.into());
    }

    /// Make all create calls fail.
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Make all update calls fail.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Make all delete calls fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make free-busy queries fail.
    pub fn set_fail_free_busy(&self, fail: bool) {
        self.fail_free_busy.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of all stored events (for assertions).
    pub fn events(&self) -> Vec<CalendarEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Look up a stored event by id regardless of calendar.
    pub fn find(&self, event_id: &str) -> Option<CalendarEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
    }

    /// An event is visible on its own calendar and on every resource
    /// calendar invited as an attendee.
    fn belongs_to(event: &CalendarEvent, calendar_id: &str) -> bool {
        event.calendar_id == calendar_id
            || event
                .attendees
                .iter()
                .any(|a| a.is_resource && a.email == calendar_id)
    }

    fn build_event(
        calendar_id: &str,
        organizer_email: Option<String>,
        data: &EventData,
        private_properties: Option<&HashMap<String, String>>,
    ) -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4().simple().to_string(),
            calendar_id: calendar_id.to_string(),
            title: Some(data.title.clone()),
            description: data.description.clone(),
            start: data.start,
            end: data.end,
            status: EventStatus::Confirmed,
            organizer_email,
            attendees: data.attendees.clone(),
            recurrence: data.recurrence.clone(),
            private_properties: private_properties.cloned().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl CalendarClient for InMemoryCalendar {
    async fn create_event(
        &self,
        calendar_id: &str,
        data: &EventData,
        private_properties: Option<&HashMap<String, String>>,
    ) -> CalendarResult<CalendarEvent> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(CalendarError::api("create_event failed (simulated)"));
        }
        let event = Self::build_event(calendar_id, None, data, private_properties);
        self.seed_event(event.clone());
        Ok(event)
    }

    async fn create_event_as_user(
        &self,
        user_email: &str,
        data: &EventData,
        private_properties: Option<&HashMap<String, String>>,
    ) -> CalendarResult<CreatedAsUser> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(CalendarError::api("create_event_as_user failed (simulated)"));
        }
        if self
            .deny_impersonation
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(user_email)
        {
            return Err(CalendarError::impersonation(user_email, "denied (simulated)"));
        }
        let event = Self::build_event(
            user_email,
            Some(user_email.to_string()),
            data,
            private_properties,
        );
        self.seed_event(event.clone());
        Ok(CreatedAsUser {
            event,
            organizer_used: user_email.to_string(),
        })
    }

    async fn create_recurring_event_as_user(
        &self,
        user_email: &str,
        data: &EventData,
        private_properties: Option<&HashMap<String, String>>,
    ) -> CalendarResult<CreatedAsUser> {
        if data.recurrence.is_none() {
            return Err(CalendarError::invalid_request(
                "recurring event requires a recurrence rule",
            ));
        }
        self.create_event_as_user(user_email, data, private_properties)
            .await
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> CalendarResult<CalendarEvent> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(CalendarError::api("update_event failed (simulated)"));
        }
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id && Self::belongs_to(e, calendar_id))
            .ok_or_else(|| CalendarError::event_not_found(calendar_id, event_id))?;
        if let Some(ref title) = patch.title {
            event.title = Some(title.clone());
        }
        if let Some(start) = patch.start {
            event.start = start;
        }
        if let Some(end) = patch.end {
            event.end = end;
        }
        Ok(event.clone())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> CalendarResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CalendarError::api("delete_event failed (simulated)"));
        }
        let mut events = self.events.write().unwrap_or_else(|e| e.into_inner());
        let before = events.len();
        events.retain(|e| !(e.id == event_id && Self::belongs_to(e, calendar_id)));
        if events.len() == before {
            return Err(CalendarError::event_not_found(calendar_id, event_id));
        }
        Ok(())
    }

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> CalendarResult<CalendarEvent> {
        self.events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.id == event_id && Self::belongs_to(e, calendar_id))
            .cloned()
            .ok_or_else(|| CalendarError::event_not_found(calendar_id, event_id))
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> CalendarResult<Vec<CalendarEvent>> {
        let mut events: Vec<CalendarEvent> = self
            .events
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| Self::belongs_to(e, calendar_id) && e.start < time_max && e.end > time_min)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.start);
        Ok(events)
    }

    async fn check_free_busy(
        &self,
        calendar_ids: &[String],
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> CalendarResult<HashMap<String, FreeBusyCalendar>> {
        if self.fail_free_busy.load(Ordering::SeqCst) {
            return Err(CalendarError::api("free-busy query failed (simulated)"));
        }
        let events = self.events.read().unwrap_or_else(|e| e.into_inner());
        let mut result = HashMap::new();
        for calendar_id in calendar_ids {
            let mut busy: Vec<BusyInterval> = events
                .iter()
                .filter(|e| {
                    Self::belongs_to(e, calendar_id)
                        && e.status.is_active()
                        && e.start < time_max
                        && e.end > time_min
                })
                .map(|e| BusyInterval {
                    start: e.start,
                    end: e.end,
                })
                .collect();
            busy.sort_by_key(|b| b.start);
            result.insert(calendar_id.clone(), FreeBusyCalendar { busy });
        }
        Ok(result)
    }
}

/// In-memory implementation of [`UserDirectory`].
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: RwLock<HashMap<UserId, DirectoryUserStatus>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active user.
    pub fn add_active(&self, id: UserId, email: impl Into<String>, name: impl Into<String>) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id,
                DirectoryUserStatus::Active(DirectoryUser {
                    id,
                    email: email.into(),
                    display_name: name.into(),
                }),
            );
    }

    /// Register a deactivated user.
    pub fn add_inactive(&self, id: UserId) {
        self.users
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, DirectoryUserStatus::Inactive);
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn resolve_user(&self, user_id: UserId) -> CalendarResult<DirectoryUserStatus> {
        Ok(self
            .users
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user_id)
            .cloned()
            .unwrap_or(DirectoryUserStatus::NotFound))
    }
}
