/// Daily attendance state machine
///
/// Per user and calendar day a record moves NoRecord -> CheckedIn ->
/// CheckedOut, and never backwards; a new day starts fresh. This module
/// holds the DTOs and the pure date/time policy; the database-backed
/// transitions live in the ledger.

mod ledger;

pub use ledger::AttendanceLedger;

use crate::{
    db::models::AttendanceRecord,
    validation::Location,
};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Body of check-in and check-out requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub location: Location,
    pub notes: Option<String>,
}

/// Check-in result: the created record and an on-time/late message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInOutcome {
    pub record: AttendanceRecord,
    pub message: String,
}

/// Check-out result: the updated record and the computed hours
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutOutcome {
    pub record: AttendanceRecord,
    pub total_hours: f64,
}

/// Today's record summary for the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodayStatus {
    pub checked_in: bool,
    pub checked_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttendanceRecord>,
}

/// Per-status record counts accompanying a history page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub checked_in: i64,
    pub checked_out: i64,
}

/// One page of attendance history
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub records: Vec<AttendanceRecord>,
    pub status_counts: StatusCounts,
    pub pagination: crate::validation::Pagination,
}

/// Derive the caller's local date and time-of-day from a UTC instant
/// using the configured offset
pub fn local_now(now_utc: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDateTime {
    now_utc.naive_utc() + Duration::minutes(utc_offset_minutes as i64)
}

/// Lateness is decided at minute precision: strictly after the boundary
/// is late, the boundary minute itself is not (09:00:59 is on time,
/// 09:01:00 is late)
pub fn is_late(check_in: NaiveTime, late_after: NaiveTime) -> bool {
    let arrived = check_in.hour() * 60 + check_in.minute();
    let boundary = late_after.hour() * 60 + late_after.minute();
    arrived > boundary
}

/// Wall-clock hours between check-in and check-out, rounded to two
/// decimals. Both times fall on the same calendar day by construction;
/// overnight shifts are out of scope.
pub fn total_hours(check_in: NaiveTime, check_out: NaiveTime) -> f64 {
    let seconds = (check_out - check_in).num_seconds() as f64;
    (seconds / 3600.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn lateness_boundary_is_exclusive() {
        assert!(!is_late(t(8, 59), t(9, 0)));
        assert!(!is_late(t(9, 0), t(9, 0)));
        assert!(is_late(t(9, 1), t(9, 0)));
    }

    #[test]
    fn boundary_minute_ignores_seconds() {
        let within_minute = NaiveTime::from_hms_opt(9, 0, 59).unwrap();
        assert!(!is_late(within_minute, t(9, 0)));
    }

    #[test]
    fn full_day_total_hours() {
        assert_eq!(total_hours(t(9, 0), t(17, 30)), 8.5);
    }

    #[test]
    fn total_hours_rounds_to_two_decimals() {
        // 9:00:00 to 9:10:00 is 1/6 of an hour
        assert_eq!(total_hours(t(9, 0), t(9, 10)), 0.17);
    }

    #[test]
    fn local_now_applies_offset() {
        let utc = Utc.with_ymd_and_hms(2025, 3, 14, 23, 30, 0).unwrap();

        // +120 minutes crosses into the next calendar day
        let shifted = local_now(utc, 120);
        assert_eq!(shifted.date(), NaiveDate::from_ymd_opt(2025, 3, 15).unwrap());
        assert_eq!(shifted.time(), t(1, 30));

        // Negative offsets pull the day back
        let shifted = local_now(utc, -60);
        assert_eq!(shifted.date(), NaiveDate::from_ymd_opt(2025, 3, 14).unwrap());
        assert_eq!(shifted.time(), t(22, 30));
    }
}
