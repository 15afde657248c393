/// /api/admin/* endpoints
use crate::{
    admin::{BulkActionRequest, StudentListing, StudentUpdate},
    api::{success, Success},
    auth::AdminUser,
    context::AppContext,
    error::{ApiError, ApiResult},
    reporting::{render_csv, DashboardStats, ExportFormat, ExportRow, JsonExport, SummaryReport},
    validation::{self, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Build admin routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/dashboard", get(dashboard))
        .route("/api/admin/attendance", get(list_attendance))
        .route("/api/admin/attendance/export", get(export_attendance))
        .route("/api/admin/students", get(list_students))
        .route(
            "/api/admin/students/:id",
            put(update_student).delete(delete_student),
        )
        .route("/api/admin/students/bulk-action", post(bulk_action))
        .route("/api/admin/reports/attendance-summary", get(attendance_summary))
}

/// Today's aggregate stats plus recent activity
async fn dashboard(
    State(ctx): State<AppContext>,
    _auth: AdminUser,
) -> ApiResult<Json<Success<DashboardStats>>> {
    let stats = ctx.reports.dashboard(Utc::now()).await?;

    Ok(success(stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceListResponse {
    records: Vec<ExportRow>,
    pagination: Pagination,
}

/// Filtered, paginated attendance listing across all students
async fn list_attendance(
    State(ctx): State<AppContext>,
    _auth: AdminUser,
    Query(query): Query<AttendanceListQuery>,
) -> ApiResult<Json<Success<AttendanceListResponse>>> {
    let params = validation::validate_pagination(query.page, query.limit)?;

    let start = validation::parse_optional_date("startDate", query.start_date.as_deref())?;
    let end = validation::parse_optional_date("endDate", query.end_date.as_deref())?;
    let range = validation::validate_optional_range(start, end)?;

    let (records, pagination) = ctx.reports.list_attendance(params, range).await?;

    Ok(success(AttendanceListResponse {
        records,
        pagination,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportQuery {
    start_date: String,
    end_date: String,
    format: Option<ExportFormat>,
}

/// Export attendance as CSV (default) or JSON for a required date range
async fn export_attendance(
    State(ctx): State<AppContext>,
    _auth: AdminUser,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let start = validation::parse_date("startDate", &query.start_date)?;
    let end = validation::parse_date("endDate", &query.end_date)?;
    validation::validate_date_range(start, end)?;

    let period = crate::reporting::Period {
        start_date: start,
        end_date: end,
    };
    let rows = ctx.reports.export_rows(period).await?;

    tracing::info!(
        "Exporting {} attendance records for {}..{}",
        rows.len(),
        start,
        end
    );

    match query.format.unwrap_or_default() {
        ExportFormat::Json => Ok(success(JsonExport {
            period,
            record_count: rows.len(),
            exported_at: Utc::now(),
            records: rows,
        })
        .into_response()),
        ExportFormat::Csv => {
            let csv = render_csv(&rows)?;
            let filename = format!("attendance_{}_{}.csv", start, end);

            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename={}", filename),
                    ),
                ],
                csv,
            )
                .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
struct StudentListQuery {
    page: Option<i64>,
    limit: Option<i64>,
    active: Option<bool>,
    search: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentListResponse {
    students: Vec<StudentListing>,
    pagination: Pagination,
}

/// Paginated student listing with recent attendance counts
async fn list_students(
    State(ctx): State<AppContext>,
    _auth: AdminUser,
    Query(query): Query<StudentListQuery>,
) -> ApiResult<Json<Success<StudentListResponse>>> {
    let params = validation::validate_pagination(query.page, query.limit)?;
    let today = ctx.reports.local_today(Utc::now());

    let (students, pagination) = ctx
        .directory
        .list(params, query.active, query.search.as_deref(), today)
        .await?;

    Ok(success(StudentListResponse {
        students,
        pagination,
    }))
}

/// Partial update of a student's name/email/active flag
async fn update_student(
    State(ctx): State<AppContext>,
    _auth: AdminUser,
    Path(id): Path<String>,
    Json(update): Json<StudentUpdate>,
) -> ApiResult<Json<Success<crate::account::UserProfile>>> {
    let profile = ctx.directory.update(&id, update).await?;

    Ok(success(profile))
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    permanent: bool,
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    message: String,
}

/// Soft delete by default; permanent delete cascades attendance records
async fn delete_student(
    State(ctx): State<AppContext>,
    auth: AdminUser,
    Path(id): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> ApiResult<Json<Success<DeleteResponse>>> {
    if query.permanent {
        tracing::warn!("Admin {} requested permanent delete of {}", auth.0.id, id);
    }

    ctx.directory.delete(&id, query.permanent).await?;

    let message = if query.permanent {
        "Student and attendance history permanently deleted".to_string()
    } else {
        "Student deactivated".to_string()
    };

    Ok(success(DeleteResponse { message }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BulkActionResponse {
    affected: u64,
}

/// Apply one bulk action to a set of students
async fn bulk_action(
    State(ctx): State<AppContext>,
    auth: AdminUser,
    Json(req): Json<BulkActionRequest>,
) -> ApiResult<Json<Success<BulkActionResponse>>> {
    tracing::info!(
        "Admin {} running bulk {:?} on {} students",
        auth.0.id,
        req.action,
        req.student_ids.len()
    );

    let affected = ctx.directory.bulk(req.action, &req.student_ids).await?;

    Ok(success(BulkActionResponse { affected }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Per-student and organization-wide summary for a period
async fn attendance_summary(
    State(ctx): State<AppContext>,
    _auth: AdminUser,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<Success<SummaryReport>>> {
    let start = validation::parse_optional_date("startDate", query.start_date.as_deref())?;
    let end = validation::parse_optional_date("endDate", query.end_date.as_deref())?;

    let period = ctx.reports.resolve_period(start, end, Utc::now());
    if period.end_date < period.start_date {
        return Err(ApiError::invalid(
            "endDate",
            "End date must not be before start date",
        ));
    }

    let report = ctx.reports.attendance_summary(period).await?;

    Ok(success(report))
}
