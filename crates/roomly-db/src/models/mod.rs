//! Database models.

pub mod activity;
pub mod booking;
pub mod room;
