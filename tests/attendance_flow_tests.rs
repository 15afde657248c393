/// End-to-end tests for the attendance lifecycle against a real
/// SQLite database in a temp directory.
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rollcall::{
    account::AccountManager,
    admin::{BulkAction, StudentDirectory, StudentUpdate},
    attendance::AttendanceLedger,
    config::AttendanceConfig,
    db,
    error::ApiError,
    reporting::{Period, ReportingService},
    validation::{Location, PageParams},
};
use sqlx::SqlitePool;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    pool: SqlitePool,
    accounts: AccountManager,
    ledger: AttendanceLedger,
    reports: ReportingService,
    directory: StudentDirectory,
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::create_pool(&dir.path().join("test.sqlite"), db::DatabaseOptions::default())
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();

    let policy = AttendanceConfig {
        late_after: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        utc_offset_minutes: 0,
    };

    Harness {
        _dir: dir,
        accounts: AccountManager::new(pool.clone()),
        ledger: AttendanceLedger::new(pool.clone(), policy.clone()),
        reports: ReportingService::new(pool.clone(), policy),
        directory: StudentDirectory::new(pool.clone()),
        pool,
    }
}

async fn new_student(h: &Harness, name: &str, email: &str) -> String {
    h.accounts
        .register(name, email, "a strong password")
        .await
        .unwrap()
        .id
}

fn here() -> Location {
    Location { lat: 51.5, lng: -0.12 }
}

// 2025-03-10 is a Monday
fn monday_at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
}

#[tokio::test]
async fn duplicate_check_in_is_rejected_without_mutation() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    let first = h
        .ledger
        .check_in(&id, here(), Some("first".to_string()), monday_at(8, 30))
        .await
        .unwrap();
    assert!(!first.record.is_late);

    let err = h
        .ledger
        .check_in(&id, here(), None, monday_at(10, 0))
        .await
        .unwrap_err();
    match err {
        // The rejection names the check-in it collided with
        ApiError::Conflict(message) => assert!(message.contains("08:30"), "{}", message),
        other => panic!("expected conflict, got {:?}", other),
    }

    // Exactly one record, unmodified by the rejected call
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    let status = h.ledger.today_status(&id, monday_at(11, 0)).await.unwrap();
    let record = status.record.unwrap();
    assert_eq!(record.id, first.record.id);
    assert!(!record.is_late);
    assert_eq!(record.notes.as_deref(), Some("first"));
}

#[tokio::test]
async fn check_out_requires_check_in() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    let err = h
        .ledger
        .check_out(&id, here(), None, monday_at(17, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn check_out_is_terminal() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    h.ledger
        .check_in(&id, here(), None, monday_at(9, 0))
        .await
        .unwrap();
    let first = h
        .ledger
        .check_out(&id, here(), Some("done".to_string()), monday_at(17, 30))
        .await
        .unwrap();
    assert_eq!(first.total_hours, 8.5);

    let err = h
        .ledger
        .check_out(&id, here(), None, monday_at(18, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    // First-set values survive the rejected second call
    let status = h.ledger.today_status(&id, monday_at(19, 0)).await.unwrap();
    let record = status.record.unwrap();
    assert_eq!(
        record.check_out_time,
        Some(NaiveTime::from_hms_opt(17, 30, 0).unwrap())
    );
    assert_eq!(record.total_hours, Some(8.5));
    assert_eq!(record.notes.as_deref(), Some("Check-out: done"));
}

#[tokio::test]
async fn lateness_is_decided_by_the_configured_boundary() {
    let h = setup().await;

    let on_time = new_student(&h, "Early", "early@example.com").await;
    let outcome = h
        .ledger
        .check_in(&on_time, here(), None, monday_at(9, 0))
        .await
        .unwrap();
    assert!(!outcome.record.is_late);
    assert!(outcome.message.contains("on time"));

    let late = new_student(&h, "Late", "late@example.com").await;
    let outcome = h
        .ledger
        .check_in(&late, here(), None, monday_at(9, 1))
        .await
        .unwrap();
    assert!(outcome.record.is_late);
    assert!(outcome.message.contains("late"));
}

#[tokio::test]
async fn check_in_writes_the_presence_marker() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    h.ledger
        .check_in(&id, here(), None, monday_at(8, 45))
        .await
        .unwrap();

    let (present, date): (bool, NaiveDate) =
        sqlx::query_as("SELECT present, date FROM daily_presence WHERE user_id = ?1")
            .bind(&id)
            .fetch_one(&h.pool)
            .await
            .unwrap();
    assert!(present);
    assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
}

#[tokio::test]
async fn history_is_paginated_newest_first() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    for day in 10..13 {
        let now = Utc.with_ymd_and_hms(2025, 3, day, 8, 30, 0).unwrap();
        h.ledger.check_in(&id, here(), None, now).await.unwrap();
        if day != 12 {
            let out = Utc.with_ymd_and_hms(2025, 3, day, 17, 0, 0).unwrap();
            h.ledger.check_out(&id, here(), None, out).await.unwrap();
        }
    }

    let page = h
        .ledger
        .history(&id, PageParams { page: 1, limit: 2 }, None)
        .await
        .unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(
        page.records[0].date,
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    );
    assert!(page.records[0].date > page.records[1].date);
    assert_eq!(page.pagination.total, 3);
    assert_eq!(page.pagination.pages, 2);
    assert_eq!(page.status_counts.checked_out, 2);
    assert_eq!(page.status_counts.checked_in, 1);
}

#[tokio::test]
async fn permanent_delete_cascades_attendance() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    h.ledger
        .check_in(&id, here(), None, monday_at(8, 30))
        .await
        .unwrap();

    h.directory.delete(&id, true).await.unwrap();

    let records: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance_records")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(records, 0);

    let markers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM daily_presence")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(markers, 0);

    let page = h
        .ledger
        .history(&id, PageParams { page: 1, limit: 10 }, None)
        .await
        .unwrap();
    assert!(page.records.is_empty());
    assert_eq!(page.pagination.total, 0);
}

#[tokio::test]
async fn soft_delete_only_deactivates() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    h.directory.delete(&id, false).await.unwrap();

    let active: bool = sqlx::query_scalar("SELECT active FROM users WHERE id = ?1")
        .bind(&id)
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert!(!active);
}

#[tokio::test]
async fn update_rejects_colliding_email() {
    let h = setup().await;
    let _a = new_student(&h, "Ada", "ada@example.com").await;
    let b = new_student(&h, "Grace", "grace@example.com").await;

    let err = h
        .directory
        .update(
            &b,
            StudentUpdate {
                email: Some("ada@example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn bulk_actions_apply_to_every_id() {
    let h = setup().await;
    let a = new_student(&h, "Ada", "ada@example.com").await;
    let b = new_student(&h, "Grace", "grace@example.com").await;

    let affected = h
        .directory
        .bulk(BulkAction::Deactivate, &[a.clone(), b.clone()])
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let active: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE active = TRUE")
        .fetch_one(&h.pool)
        .await
        .unwrap();
    assert_eq!(active, 0);

    let affected = h.directory.bulk(BulkAction::Delete, &[a, b]).await.unwrap();
    assert_eq!(affected, 2);
}

#[tokio::test]
async fn summary_counts_a_seeded_week() {
    let h = setup().await;
    let ada = new_student(&h, "Ada", "ada@example.com").await;
    let _grace = new_student(&h, "Grace", "grace@example.com").await;

    // Ada attends Mon-Thu of the 2025-03-10 week, late on Tuesday,
    // and forgets to check out on Thursday
    for (day, hour, minute) in [(10, 8, 30), (11, 9, 30), (12, 8, 45), (13, 8, 50)] {
        let now = Utc.with_ymd_and_hms(2025, 3, day, hour, minute, 0).unwrap();
        h.ledger.check_in(&ada, here(), None, now).await.unwrap();
        if day != 13 {
            let out = Utc.with_ymd_and_hms(2025, 3, day, 17, 0, 0).unwrap();
            h.ledger.check_out(&ada, here(), None, out).await.unwrap();
        }
    }

    let period = Period {
        start_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
    };
    let report = h.reports.attendance_summary(period).await.unwrap();

    assert_eq!(report.overall.working_days, 5);
    assert_eq!(report.overall.total_students, 2);
    assert_eq!(report.overall.total_possible_attendance, 10);
    assert_eq!(report.overall.total_checked_in_days, 4);
    assert_eq!(report.overall.overall_attendance_rate, 40);

    let ada_summary = report
        .students
        .iter()
        .find(|s| s.user_id == ada)
        .unwrap();
    assert_eq!(ada_summary.checked_in_days, 4);
    assert_eq!(ada_summary.completed_days, 3);
    assert_eq!(ada_summary.late_days, 1);
    assert_eq!(ada_summary.attendance_rate, 80);
    assert_eq!(ada_summary.completion_rate, 75);
    assert_eq!(ada_summary.late_rate, 25);

    let grace_summary = report
        .students
        .iter()
        .find(|s| s.user_id != ada)
        .unwrap();
    assert_eq!(grace_summary.checked_in_days, 0);
    assert_eq!(grace_summary.attendance_rate, 0);
    assert_eq!(grace_summary.completion_rate, 0);
}

#[tokio::test]
async fn export_rows_join_student_details() {
    let h = setup().await;
    let id = new_student(&h, "Ada Lovelace", "ada@example.com").await;

    h.ledger
        .check_in(&id, here(), Some("note with \"quotes\"".to_string()), monday_at(8, 30))
        .await
        .unwrap();
    h.ledger
        .check_out(&id, here(), None, monday_at(17, 0))
        .await
        .unwrap();

    let period = Period {
        start_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
    };
    let rows = h.reports.export_rows(period).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].student_name, "Ada Lovelace");

    let csv = rollcall::reporting::render_csv(&rows).unwrap();
    assert_eq!(csv.trim_end().lines().count(), 2);
    assert!(csv.contains("\"51.5,-0.12\""));
    assert!(csv.contains("\"\"quotes\"\""));
}

#[tokio::test]
async fn registration_enforces_unique_email() {
    let h = setup().await;
    new_student(&h, "Ada", "ada@example.com").await;

    let err = h
        .accounts
        .register("Imposter", "ADA@example.com", "another password")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn deactivated_account_cannot_log_in() {
    let h = setup().await;
    let id = new_student(&h, "Ada", "ada@example.com").await;

    h.accounts
        .login("ada@example.com", "a strong password")
        .await
        .unwrap();

    h.directory.delete(&id, false).await.unwrap();

    let err = h
        .accounts
        .login("ada@example.com", "a strong password")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Authentication(_)));
}
