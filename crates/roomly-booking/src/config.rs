//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the booking lifecycle engine and scanners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Global maximum booking duration in minutes, used when a room has
    /// no override.
    #[serde(default = "default_max_duration_minutes")]
    pub default_max_duration_minutes: i64,
    /// Tablet bookings starting within this many seconds of now are
    /// created checked-in (the person is physically present). Inclusive
    /// at the boundary.
    #[serde(default = "default_auto_check_in_secs")]
    pub auto_check_in_window_secs: i64,
    /// Minutes past the start time before a never-checked-in booking is
    /// marked no-show.
    #[serde(default = "default_no_show_grace_minutes")]
    pub no_show_grace_minutes: i64,
    /// Minutes past the start time before the overdue-release reminder
    /// goes out. Independent of (and longer than) the no-show grace.
    #[serde(default = "default_reminder_grace_minutes")]
    pub reminder_grace_minutes: i64,
    /// Row cap per unscoped no-show scan pass.
    #[serde(default = "default_no_show_scan_limit")]
    pub no_show_scan_limit: i64,
    /// Service identity used for calendar mirroring when impersonating
    /// the host fails or there is no host.
    #[serde(default = "default_service_account_email")]
    pub service_account_email: String,
}

fn default_max_duration_minutes() -> i64 {
    240
}

fn default_auto_check_in_secs() -> i64 {
    60
}

fn default_no_show_grace_minutes() -> i64 {
    10
}

fn default_reminder_grace_minutes() -> i64 {
    30
}

fn default_no_show_scan_limit() -> i64 {
    500
}

fn default_service_account_email() -> String {
    "rooms@localhost".to_string()
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            default_max_duration_minutes: default_max_duration_minutes(),
            auto_check_in_window_secs: default_auto_check_in_secs(),
            no_show_grace_minutes: default_no_show_grace_minutes(),
            reminder_grace_minutes: default_reminder_grace_minutes(),
            no_show_scan_limit: default_no_show_scan_limit(),
            service_account_email: default_service_account_email(),
        }
    }
}

/// Configuration for the reconciliation sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minimum seconds between sync passes for the same resource.
    #[serde(default = "default_min_sync_interval_secs")]
    pub min_sync_interval_secs: i64,
    /// Rolling window: hours of past events to list.
    #[serde(default = "default_window_past_hours")]
    pub window_past_hours: i64,
    /// Rolling window: days of future events to list.
    #[serde(default = "default_window_future_days")]
    pub window_future_days: i64,
}

fn default_min_sync_interval_secs() -> i64 {
    60
}

fn default_window_past_hours() -> i64 {
    24
}

fn default_window_future_days() -> i64 {
    30
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_sync_interval_secs: default_min_sync_interval_secs(),
            window_past_hours: default_window_past_hours(),
            window_future_days: default_window_future_days(),
        }
    }
}
