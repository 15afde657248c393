/// Reporting and aggregation
///
/// Computes per-student and organization-wide summaries over a date range
/// and serializes attendance exports to CSV or JSON. Per-student counts
/// come from a single grouped query against the attendance table.
use crate::{
    config::AttendanceConfig,
    db::models::AttendanceStatus,
    error::{ApiError, ApiResult},
    validation::{PageParams, Pagination},
};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;

/// Requested export serialization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

/// Resolved reporting period
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Per-student attendance summary
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub checked_in_days: i64,
    pub completed_days: i64,
    pub late_days: i64,
    /// checked-in days over working days, as an integer percentage
    pub attendance_rate: i64,
    /// completed days over checked-in days
    pub completion_rate: i64,
    /// late days over checked-in days
    pub late_rate: i64,
}

/// Organization-wide aggregate statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_students: i64,
    pub working_days: i64,
    pub total_possible_attendance: i64,
    pub total_checked_in_days: i64,
    pub overall_attendance_rate: i64,
    pub average_completion_rate: i64,
    pub average_late_rate: i64,
}

/// Full summary report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub students: Vec<StudentSummary>,
    pub overall: OverallStats,
    pub period: Period,
}

/// One exportable attendance row, joined with the owning student
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub date: NaiveDate,
    pub student_name: String,
    pub email: String,
    pub check_in_time: NaiveTime,
    pub check_out_time: Option<NaiveTime>,
    pub check_in_lat: f64,
    pub check_in_lng: f64,
    pub check_out_lat: Option<f64>,
    pub check_out_lng: Option<f64>,
    pub status: AttendanceStatus,
    pub total_hours: Option<f64>,
    pub notes: Option<String>,
}

/// JSON export envelope with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonExport {
    pub period: Period,
    pub record_count: usize,
    pub exported_at: DateTime<Utc>,
    pub records: Vec<ExportRow>,
}

/// Today's aggregate figures for the admin dashboard
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub date: NaiveDate,
    pub total_students: i64,
    pub checked_in: i64,
    pub checked_out: i64,
    pub late: i64,
    pub recent_activity: Vec<ExportRow>,
}

#[derive(Debug, FromRow)]
struct GroupedCounts {
    user_id: String,
    checked_in_days: i64,
    completed_days: i64,
    late_days: i64,
}

/// Reporting service
pub struct ReportingService {
    db: SqlitePool,
    policy: AttendanceConfig,
}

impl ReportingService {
    pub fn new(db: SqlitePool, policy: AttendanceConfig) -> Self {
        Self { db, policy }
    }

    /// Today in the configured local timezone
    pub fn local_today(&self, now_utc: DateTime<Utc>) -> NaiveDate {
        crate::attendance::local_now(now_utc, self.policy.utc_offset_minutes).date()
    }

    /// Resolve the requested period, defaulting to first-of-month..today
    pub fn resolve_period(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        now_utc: DateTime<Utc>,
    ) -> Period {
        let today = self.local_today(now_utc);
        let first_of_month = today.with_day(1).unwrap_or(today);

        Period {
            start_date: start.unwrap_or(first_of_month),
            end_date: end.unwrap_or(today),
        }
    }

    /// Compute the per-student and overall attendance summary
    pub async fn attendance_summary(&self, period: Period) -> ApiResult<SummaryReport> {
        let students: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT id, name, email FROM users
             WHERE role = 'student' AND active = TRUE
             ORDER BY name",
        )
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let grouped: Vec<GroupedCounts> = sqlx::query_as(
            "SELECT user_id,
                    COUNT(*) AS checked_in_days,
                    SUM(CASE WHEN status = 'checked-out' THEN 1 ELSE 0 END) AS completed_days,
                    SUM(CASE WHEN is_late THEN 1 ELSE 0 END) AS late_days
             FROM attendance_records
             WHERE date >= ?1 AND date <= ?2
             GROUP BY user_id",
        )
        .bind(period.start_date)
        .bind(period.end_date)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let counts_by_user: HashMap<String, GroupedCounts> = grouped
            .into_iter()
            .map(|counts| (counts.user_id.clone(), counts))
            .collect();

        let working = working_days(period.start_date, period.end_date);

        let mut summaries = Vec::with_capacity(students.len());
        let mut total_checked_in = 0;
        for (id, name, email) in students {
            let (checked_in, completed, late) = counts_by_user
                .get(&id)
                .map(|c| (c.checked_in_days, c.completed_days, c.late_days))
                .unwrap_or((0, 0, 0));

            total_checked_in += checked_in;

            summaries.push(StudentSummary {
                user_id: id,
                name,
                email,
                checked_in_days: checked_in,
                completed_days: completed,
                late_days: late,
                attendance_rate: percentage(checked_in, working),
                completion_rate: percentage(completed, checked_in),
                late_rate: percentage(late, checked_in),
            });
        }

        let total_students = summaries.len() as i64;
        let total_possible = total_students * working;
        let overall = OverallStats {
            total_students,
            working_days: working,
            total_possible_attendance: total_possible,
            total_checked_in_days: total_checked_in,
            overall_attendance_rate: percentage(total_checked_in, total_possible),
            average_completion_rate: mean(summaries.iter().map(|s| s.completion_rate)),
            average_late_rate: mean(summaries.iter().map(|s| s.late_rate)),
        };

        Ok(SummaryReport {
            students: summaries,
            overall,
            period,
        })
    }

    /// Load export rows for the period, newest first
    pub async fn export_rows(&self, period: Period) -> ApiResult<Vec<ExportRow>> {
        sqlx::query_as::<_, ExportRow>(
            "SELECT r.date, u.name AS student_name, u.email, r.check_in_time, r.check_out_time,
                    r.check_in_lat, r.check_in_lng, r.check_out_lat, r.check_out_lng,
                    r.status, r.total_hours, r.notes
             FROM attendance_records r
             JOIN users u ON u.id = r.user_id
             WHERE r.date >= ?1 AND r.date <= ?2
             ORDER BY r.date DESC, r.created_at DESC",
        )
        .bind(period.start_date)
        .bind(period.end_date)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)
    }

    /// Paginated attendance listing across all students for admins
    pub async fn list_attendance(
        &self,
        params: PageParams,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> ApiResult<(Vec<ExportRow>, Pagination)> {
        let (start, end) = match range {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        let rows = sqlx::query_as::<_, ExportRow>(
            "SELECT r.date, u.name AS student_name, u.email, r.check_in_time, r.check_out_time,
                    r.check_in_lat, r.check_in_lng, r.check_out_lat, r.check_out_lng,
                    r.status, r.total_hours, r.notes
             FROM attendance_records r
             JOIN users u ON u.id = r.user_id
             WHERE (?1 IS NULL OR r.date >= ?1)
               AND (?2 IS NULL OR r.date <= ?2)
             ORDER BY r.date DESC, r.created_at DESC
             LIMIT ?3 OFFSET ?4",
        )
        .bind(start)
        .bind(end)
        .bind(params.limit)
        .bind(params.offset())
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_records
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok((rows, Pagination::new(params, total)))
    }

    /// Today's figures plus the most recent check-ins for the dashboard
    pub async fn dashboard(&self, now_utc: DateTime<Utc>) -> ApiResult<DashboardStats> {
        let today = self.local_today(now_utc);

        let total_students: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'student' AND active = TRUE",
        )
        .fetch_one(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let (checked_in, checked_out, late): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    SUM(CASE WHEN status = 'checked-out' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN is_late THEN 1 ELSE 0 END)
             FROM attendance_records WHERE date = ?1",
        )
        .bind(today)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?
        .map(|(a, b, c): (i64, Option<i64>, Option<i64>)| (a, b.unwrap_or(0), c.unwrap_or(0)))
        .unwrap_or((0, 0, 0));

        let recent_activity = sqlx::query_as::<_, ExportRow>(
            "SELECT r.date, u.name AS student_name, u.email, r.check_in_time, r.check_out_time,
                    r.check_in_lat, r.check_in_lng, r.check_out_lat, r.check_out_lng,
                    r.status, r.total_hours, r.notes
             FROM attendance_records r
             JOIN users u ON u.id = r.user_id
             WHERE r.date = ?1
             ORDER BY r.created_at DESC
             LIMIT 10",
        )
        .bind(today)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        Ok(DashboardStats {
            date: today,
            total_students,
            checked_in,
            checked_out,
            late,
            recent_activity,
        })
    }
}

/// Count Monday-Friday days in an inclusive date range
pub fn working_days(start: NaiveDate, end: NaiveDate) -> i64 {
    if end < start {
        return 0;
    }

    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .count() as i64
}

/// Integer percentage, 0 when the denominator is 0
pub fn percentage(numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    ((numerator as f64 / denominator as f64) * 100.0).round() as i64
}

fn mean(values: impl Iterator<Item = i64>) -> i64 {
    let collected: Vec<i64> = values.collect();
    if collected.is_empty() {
        return 0;
    }
    let sum: i64 = collected.iter().sum();
    ((sum as f64) / (collected.len() as f64)).round() as i64
}

/// Render export rows as CSV with a fixed header
///
/// `csv::Writer` handles RFC 4180 quoting, so `lat,lng` location pairs
/// come out quoted and embedded quotes in notes come out doubled.
pub fn render_csv(rows: &[ExportRow]) -> ApiResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer
        .write_record([
            "Date",
            "Student Name",
            "Email",
            "Check-In Time",
            "Check-Out Time",
            "Status",
            "Total Hours",
            "Check-In Location",
            "Check-Out Location",
            "Notes",
        ])
        .map_err(|e| ApiError::Internal(format!("CSV serialization failed: {}", e)))?;

    for row in rows {
        let status = match row.status {
            AttendanceStatus::CheckedIn => "checked-in",
            AttendanceStatus::CheckedOut => "checked-out",
        };
        let check_out = row
            .check_out_time
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default();
        let hours = row
            .total_hours
            .map(|h| format!("{:.2}", h))
            .unwrap_or_default();
        let out_location = match (row.check_out_lat, row.check_out_lng) {
            (Some(lat), Some(lng)) => format!("{},{}", lat, lng),
            _ => String::new(),
        };

        writer
            .write_record([
                row.date.to_string(),
                row.student_name.clone(),
                row.email.clone(),
                row.check_in_time.format("%H:%M:%S").to_string(),
                check_out,
                status.to_string(),
                hours,
                format!("{},{}", row.check_in_lat, row.check_in_lng),
                out_location,
                row.notes.clone().unwrap_or_default(),
            ])
            .map_err(|e| ApiError::Internal(format!("CSV serialization failed: {}", e)))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ApiError::Internal(format!("CSV serialization failed: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| ApiError::Internal(format!("CSV output was not valid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn working_days_excludes_weekends() {
        // 2025-03-03 is a Monday
        assert_eq!(working_days(date(2025, 3, 3), date(2025, 3, 7)), 5);
        // Full week spanning one weekend
        assert_eq!(working_days(date(2025, 3, 3), date(2025, 3, 9)), 5);
        // Weekend-only range
        assert_eq!(working_days(date(2025, 3, 8), date(2025, 3, 9)), 0);
        // Inverted range
        assert_eq!(working_days(date(2025, 3, 7), date(2025, 3, 3)), 0);
    }

    #[test]
    fn percentage_handles_zero_denominator() {
        assert_eq!(percentage(5, 0), 0);
        assert_eq!(percentage(0, 10), 0);
        assert_eq!(percentage(8, 10), 80);
        assert_eq!(percentage(6, 8), 75);
        assert_eq!(percentage(2, 8), 25);
    }

    #[test]
    fn summary_rates_example() {
        // 10 working days, 8 checked in, 6 completed, 2 late
        assert_eq!(percentage(8, 10), 80);
        assert_eq!(percentage(6, 8), 75);
        assert_eq!(percentage(2, 8), 25);
    }

    fn sample_row(notes: Option<&str>) -> ExportRow {
        ExportRow {
            date: date(2025, 3, 14),
            student_name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            check_in_time: NaiveTime::from_hms_opt(8, 45, 0).unwrap(),
            check_out_time: Some(NaiveTime::from_hms_opt(17, 15, 0).unwrap()),
            check_in_lat: 51.5,
            check_in_lng: -0.12,
            check_out_lat: Some(51.5),
            check_out_lng: Some(-0.12),
            status: AttendanceStatus::CheckedOut,
            total_hours: Some(8.5),
            notes: notes.map(|s| s.to_string()),
        }
    }

    #[test]
    fn csv_has_header_plus_one_line_per_record() {
        let rows = vec![sample_row(None), sample_row(Some("left early"))];
        let csv = render_csv(&rows).unwrap();
        assert_eq!(csv.trim_end().lines().count(), 3);
        assert!(csv.starts_with("Date,Student Name,Email,"));
    }

    #[test]
    fn csv_locations_render_as_quoted_pairs() {
        let csv = render_csv(&[sample_row(None)]).unwrap();
        assert!(csv.contains("\"51.5,-0.12\""));
    }

    #[test]
    fn csv_doubles_internal_quotes_in_notes() {
        let csv = render_csv(&[sample_row(Some("said \"present\" twice"))]).unwrap();
        assert!(csv.contains("\"said \"\"present\"\" twice\""));
    }

    #[test]
    fn csv_quotes_names_containing_commas() {
        let mut row = sample_row(None);
        row.student_name = "Lovelace, Ada".to_string();
        let csv = render_csv(&[row]).unwrap();
        assert!(csv.contains("\"Lovelace, Ada\""));
    }

    #[test]
    fn mean_of_rates() {
        assert_eq!(mean([80, 60].into_iter()), 70);
        assert_eq!(mean(std::iter::empty()), 0);
        assert_eq!(mean([75, 50].into_iter()), 63); // 62.5 rounds up
    }
}
