//! Status merge decision table.
//!
//! Local terminal decisions win; an external cancellation is the one
//! signal allowed to move a live booking, and cancellation is sticky in
//! both directions.

use roomly_calendar::EventStatus;
use roomly_db::BookingStatus;

/// Merge the stored status with the external event's status.
///
/// - `Ended` and `NoShow` are never overwritten.
/// - `Cancelled` stays cancelled, and an external cancellation is
///   adopted over `Scheduled` or `InProgress`.
/// - Otherwise the local status stands; external confirmation carries no
///   new information.
#[must_use]
pub fn merge_status(local: BookingStatus, external: EventStatus) -> BookingStatus {
    match (local, external) {
        (BookingStatus::Ended, _) => BookingStatus::Ended,
        (BookingStatus::NoShow, _) => BookingStatus::NoShow,
        (BookingStatus::Cancelled, _) => BookingStatus::Cancelled,
        (_, EventStatus::Cancelled) => BookingStatus::Cancelled,
        (local, _) => local,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_decision_table() {
        use BookingStatus::*;
        use EventStatus as E;

        let table = [
            (Scheduled, E::Confirmed, Scheduled),
            (Scheduled, E::Tentative, Scheduled),
            (Scheduled, E::Cancelled, Cancelled),
            (InProgress, E::Confirmed, InProgress),
            (InProgress, E::Tentative, InProgress),
            (InProgress, E::Cancelled, Cancelled),
            (Ended, E::Confirmed, Ended),
            (Ended, E::Tentative, Ended),
            (Ended, E::Cancelled, Ended),
            (Cancelled, E::Confirmed, Cancelled),
            (Cancelled, E::Tentative, Cancelled),
            (Cancelled, E::Cancelled, Cancelled),
            (NoShow, E::Confirmed, NoShow),
            (NoShow, E::Tentative, NoShow),
            (NoShow, E::Cancelled, NoShow),
        ];
        for (local, external, expected) in table {
            assert_eq!(
                merge_status(local, external),
                expected,
                "merge_status({local:?}, {external:?})"
            );
        }
    }

    #[test]
    fn test_terminal_statuses_are_monotonic() {
        for local in [BookingStatus::Ended, BookingStatus::NoShow, BookingStatus::Cancelled] {
            for external in [
                EventStatus::Confirmed,
                EventStatus::Tentative,
                EventStatus::Cancelled,
            ] {
                assert_eq!(merge_status(local, external), local);
            }
        }
    }
}
