/// API routes and handlers
pub mod admin;
pub mod attendance;
pub mod auth;

use crate::context::AppContext;
use axum::{Json, Router};
use serde::Serialize;

/// Success envelope: `{success:true, data:{...}}`
#[derive(Debug, Serialize)]
pub struct Success<T> {
    pub success: bool,
    pub data: T,
}

/// Wrap response data in the success envelope
pub fn success<T: Serialize>(data: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        data,
    })
}

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(attendance::routes())
        .merge(admin::routes())
}
