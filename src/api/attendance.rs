/// /api/attendance/* endpoints
use crate::{
    api::{success, Success},
    attendance::{CheckInOutcome, CheckOutOutcome, CheckRequest, HistoryPage, TodayStatus},
    auth::StudentUser,
    context::AppContext,
    error::ApiResult,
    validation,
};
use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

/// Build attendance routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/attendance/check-in", post(check_in))
        .route("/api/attendance/check-out", put(check_out))
        .route("/api/attendance/status", get(status))
        .route("/api/attendance/history", get(history))
}

/// Check in for today
async fn check_in(
    State(ctx): State<AppContext>,
    StudentUser(user): StudentUser,
    Json(req): Json<CheckRequest>,
) -> ApiResult<Json<Success<CheckInOutcome>>> {
    validation::validate_check_payload(&req.location, req.notes.as_deref())?;

    let outcome = ctx
        .ledger
        .check_in(&user.id, req.location, req.notes, Utc::now())
        .await?;

    Ok(success(outcome))
}

/// Check out for today
async fn check_out(
    State(ctx): State<AppContext>,
    StudentUser(user): StudentUser,
    Json(req): Json<CheckRequest>,
) -> ApiResult<Json<Success<CheckOutOutcome>>> {
    validation::validate_check_payload(&req.location, req.notes.as_deref())?;

    let outcome = ctx
        .ledger
        .check_out(&user.id, req.location, req.notes, Utc::now())
        .await?;

    Ok(success(outcome))
}

/// Today's record summary
async fn status(
    State(ctx): State<AppContext>,
    StudentUser(user): StudentUser,
) -> ApiResult<Json<Success<TodayStatus>>> {
    let status = ctx.ledger.today_status(&user.id, Utc::now()).await?;

    Ok(success(status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    page: Option<i64>,
    limit: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
}

/// Paginated attendance history, newest first
async fn history(
    State(ctx): State<AppContext>,
    StudentUser(user): StudentUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Success<HistoryPage>>> {
    let params = validation::validate_pagination(query.page, query.limit)?;

    let start = validation::parse_optional_date("startDate", query.start_date.as_deref())?;
    let end = validation::parse_optional_date("endDate", query.end_date.as_deref())?;
    let range = validation::validate_optional_range(start, end)?;

    let page = ctx.ledger.history(&user.id, params, range).await?;

    Ok(success(page))
}
