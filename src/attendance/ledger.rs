/// Database-backed attendance transitions
use super::{
    is_late, local_now, total_hours, CheckInOutcome, CheckOutOutcome, HistoryPage, StatusCounts,
    TodayStatus,
};
use crate::{
    config::AttendanceConfig,
    db::models::{AttendanceRecord, AttendanceStatus},
    error::{ApiError, ApiResult},
    validation::{Location, PageParams, Pagination},
};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const RECORD_COLUMNS: &str = "id, user_id, date, check_in_time, check_in_lat, check_in_lng, \
     check_out_time, check_out_lat, check_out_lng, status, is_late, notes, total_hours, \
     created_at, updated_at";

/// Attendance ledger service
pub struct AttendanceLedger {
    db: SqlitePool,
    policy: AttendanceConfig,
}

impl AttendanceLedger {
    /// Create a new ledger
    pub fn new(db: SqlitePool, policy: AttendanceConfig) -> Self {
        Self { db, policy }
    }

    /// Record a check-in for the caller's current calendar day
    ///
    /// Duplicate check-ins are rejected without mutation. The detailed
    /// record and the presence marker commit in a single transaction so
    /// a crash cannot leave one without the other.
    pub async fn check_in(
        &self,
        user_id: &str,
        location: Location,
        notes: Option<String>,
        now_utc: DateTime<Utc>,
    ) -> ApiResult<CheckInOutcome> {
        let local = local_now(now_utc, self.policy.utc_offset_minutes);
        let today = local.date();
        let time = local.time();

        if let Some(existing) = self.record_for(user_id, today).await? {
            return Err(ApiError::Conflict(format!(
                "Already checked in today at {}",
                existing.check_in_time.format("%H:%M")
            )));
        }

        // Lateness is fixed at check-in time and never recomputed
        let late = is_late(time, self.policy.late_after);

        let record = AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            date: today,
            check_in_time: time,
            check_in_lat: location.lat,
            check_in_lng: location.lng,
            check_out_time: None,
            check_out_lat: None,
            check_out_lng: None,
            status: AttendanceStatus::CheckedIn,
            is_late: late,
            notes,
            total_hours: None,
            created_at: now_utc,
            updated_at: now_utc,
        };

        let mut tx = self.db.begin().await.map_err(ApiError::Database)?;

        sqlx::query(
            "INSERT INTO attendance_records (id, user_id, date, check_in_time, check_in_lat, \
             check_in_lng, status, is_late, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.date)
        .bind(record.check_in_time)
        .bind(record.check_in_lat)
        .bind(record.check_in_lng)
        .bind(record.status)
        .bind(record.is_late)
        .bind(&record.notes)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            // Two concurrent check-ins can both pass the existence check;
            // the unique index on (user_id, date) decides the winner
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("Already checked in today".to_string())
            }
            other => ApiError::Database(other),
        })?;

        sqlx::query(
            "INSERT INTO daily_presence (user_id, date, present, marked_at)
             VALUES (?1, ?2, TRUE, ?3)
             ON CONFLICT (user_id, date) DO UPDATE SET present = TRUE, marked_at = ?3",
        )
        .bind(user_id)
        .bind(today)
        .bind(now_utc)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::Database)?;

        tx.commit().await.map_err(ApiError::Database)?;

        let message = if late {
            format!("Checked in late at {}", time.format("%H:%M"))
        } else {
            format!("Checked in on time at {}", time.format("%H:%M"))
        };

        tracing::info!(
            "User {} checked in on {} at {} (late: {})",
            user_id,
            today,
            time.format("%H:%M:%S"),
            late
        );

        Ok(CheckInOutcome { record, message })
    }

    /// Record a check-out for the caller's current calendar day
    ///
    /// Requires an open check-in for today; checked-out is terminal, so a
    /// repeat call is rejected without touching the record.
    pub async fn check_out(
        &self,
        user_id: &str,
        location: Location,
        notes: Option<String>,
        now_utc: DateTime<Utc>,
    ) -> ApiResult<CheckOutOutcome> {
        let local = local_now(now_utc, self.policy.utc_offset_minutes);
        let today = local.date();
        let time = local.time();

        let record = self
            .record_for(user_id, today)
            .await?
            .ok_or_else(|| ApiError::NotFound("No check-in found for today".to_string()))?;

        if record.status == AttendanceStatus::CheckedOut {
            return Err(ApiError::Conflict("Already checked out today".to_string()));
        }

        let hours = total_hours(record.check_in_time, time);

        let merged_notes = match (record.notes.as_deref(), notes.as_deref()) {
            (Some(existing), Some(new)) => Some(format!("{}\nCheck-out: {}", existing, new)),
            (None, Some(new)) => Some(format!("Check-out: {}", new)),
            (existing, None) => existing.map(|s| s.to_string()),
        };

        sqlx::query(
            "UPDATE attendance_records
             SET check_out_time = ?1, check_out_lat = ?2, check_out_lng = ?3,
                 status = ?4, notes = ?5, total_hours = ?6, updated_at = ?7
             WHERE id = ?8",
        )
        .bind(time)
        .bind(location.lat)
        .bind(location.lng)
        .bind(AttendanceStatus::CheckedOut)
        .bind(&merged_notes)
        .bind(hours)
        .bind(now_utc)
        .bind(&record.id)
        .execute(&self.db)
        .await
        .map_err(ApiError::Database)?;

        tracing::info!(
            "User {} checked out on {} at {} ({} hours)",
            user_id,
            today,
            time.format("%H:%M:%S"),
            hours
        );

        Ok(CheckOutOutcome {
            record: AttendanceRecord {
                check_out_time: Some(time),
                check_out_lat: Some(location.lat),
                check_out_lng: Some(location.lng),
                status: AttendanceStatus::CheckedOut,
                notes: merged_notes,
                total_hours: Some(hours),
                updated_at: now_utc,
                ..record
            },
            total_hours: hours,
        })
    }

    /// Summarize today's record for the caller. Pure read.
    pub async fn today_status(
        &self,
        user_id: &str,
        now_utc: DateTime<Utc>,
    ) -> ApiResult<TodayStatus> {
        let today = local_now(now_utc, self.policy.utc_offset_minutes).date();
        let record = self.record_for(user_id, today).await?;

        Ok(match record {
            Some(record) => TodayStatus {
                checked_in: true,
                checked_out: record.status == AttendanceStatus::CheckedOut,
                total_hours: record.total_hours,
                record: Some(record),
            },
            None => TodayStatus {
                checked_in: false,
                checked_out: false,
                total_hours: None,
                record: None,
            },
        })
    }

    /// Paginated attendance history for a user, newest date first,
    /// optionally bounded by an inclusive date range
    pub async fn history(
        &self,
        user_id: &str,
        params: PageParams,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> ApiResult<HistoryPage> {
        let (range_start, range_end) = match range {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        let records = sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records
             WHERE user_id = ?1
               AND (?2 IS NULL OR date >= ?2)
               AND (?3 IS NULL OR date <= ?3)
             ORDER BY date DESC
             LIMIT ?4 OFFSET ?5"
        ))
        .bind(user_id)
        .bind(range_start)
        .bind(range_end)
        .bind(params.limit)
        .bind(params.offset())
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        // One grouped pass yields the total and the per-status breakdown
        let counts: Vec<(AttendanceStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM attendance_records
             WHERE user_id = ?1
               AND (?2 IS NULL OR date >= ?2)
               AND (?3 IS NULL OR date <= ?3)
             GROUP BY status",
        )
        .bind(user_id)
        .bind(range_start)
        .bind(range_end)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let mut status_counts = StatusCounts::default();
        let mut total = 0;
        for (status, count) in counts {
            total += count;
            match status {
                AttendanceStatus::CheckedIn => status_counts.checked_in = count,
                AttendanceStatus::CheckedOut => status_counts.checked_out = count,
            }
        }

        Ok(HistoryPage {
            records,
            status_counts,
            pagination: Pagination::new(params, total),
        })
    }

    /// Load the record for a (user, date) pair, if any
    async fn record_for(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> ApiResult<Option<AttendanceRecord>> {
        sqlx::query_as::<_, AttendanceRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records WHERE user_id = ?1 AND date = ?2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)
    }
}
