/// /api/auth/* endpoints
use crate::{
    account::{AuthResponse, LoginRequest, RegisterRequest, UserProfile},
    api::{success, Success},
    auth::{issue_token, AuthUser},
    context::AppContext,
    error::ApiResult,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

/// Register a new student account and return a signed token
async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<Success<AuthResponse>>> {
    let user = ctx
        .accounts
        .register(&req.name, &req.email, &req.password)
        .await?;

    let token = issue_token(
        &user,
        &ctx.config.auth.jwt_secret,
        ctx.config.auth.token_ttl_hours,
    )?;

    Ok(success(AuthResponse {
        user: user.into(),
        token,
    }))
}

/// Verify credentials and return a signed token
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<Success<AuthResponse>>> {
    let user = ctx.accounts.login(&req.email, &req.password).await?;

    let token = issue_token(
        &user,
        &ctx.config.auth.jwt_secret,
        ctx.config.auth.token_ttl_hours,
    )?;

    Ok(success(AuthResponse {
        user: user.into(),
        token,
    }))
}

/// Return the caller's profile
async fn me(AuthUser(user): AuthUser) -> ApiResult<Json<Success<UserProfile>>> {
    Ok(success(user.into()))
}
