/// Authentication extractors and JWT utilities
use crate::{
    context::AppContext,
    db::models::{Role, User},
    error::{ApiError, ApiResult},
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims carried by every bearer token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Sign a bearer token for a user
pub fn issue_token(user: &User, jwt_secret: &str, ttl_hours: i64) -> ApiResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.clone(),
        role: user.role,
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("Token signing failed: {}", e)))
}

/// Verify a bearer token and return its claims
///
/// This performs:
/// 1. JWT signature verification
/// 2. Expiration checking
/// 3. Claims deserialization
pub fn verify_token(token: &str, jwt_secret: &str) -> ApiResult<Claims> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    // Allow some clock skew (5 minutes)
    validation.leeway = 300;

    decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("JWT verification failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Authentication("Token has expired".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                    ApiError::Authentication("Invalid token signature".to_string())
                }
                _ => ApiError::Authentication(format!("Invalid token: {}", e)),
            }
        })
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").map(|t| t.to_string()))
}

async fn resolve_user(parts: &Parts, state: &AppContext) -> ApiResult<User> {
    let token = extract_bearer_token(&parts.headers)
        .ok_or_else(|| ApiError::Authentication("Missing authorization header".to_string()))?;

    let claims = verify_token(&token, &state.config.auth.jwt_secret)?;

    let user = state
        .accounts
        .get_user(&claims.sub)
        .await
        .map_err(|_| ApiError::Authentication("Unknown user".to_string()))?;

    if !user.active {
        return Err(ApiError::Authentication(
            "Account has been deactivated".to_string(),
        ));
    }

    Ok(user)
}

/// Authenticated caller of any role
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        resolve_user(parts, state).await.map(AuthUser)
    }
}

/// Authenticated caller with the student role
#[derive(Debug, Clone)]
pub struct StudentUser(pub User);

#[async_trait]
impl FromRequestParts<AppContext> for StudentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_user(parts, state).await?;

        if user.role != Role::Student {
            return Err(ApiError::Authorization(
                "Student role required".to_string(),
            ));
        }

        Ok(StudentUser(user))
    }
}

/// Authenticated caller with the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppContext> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let user = resolve_user(parts, state).await?;

        if user.role != Role::Admin {
            tracing::warn!("User {} attempted an admin endpoint", user.id);
            return Err(ApiError::Authorization("Admin role required".to_string()));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        User {
            id: "u-1".to_string(),
            name: "Test Student".to_string(),
            email: "student@example.com".to_string(),
            password_hash: String::new(),
            role: Role::Student,
            active: true,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn issued_token_round_trips() {
        let token = issue_token(&sample_user(), SECRET, 24).unwrap();
        let claims = verify_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, "u-1");
        assert_eq!(claims.role, Role::Student);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token(&sample_user(), SECRET, 24).unwrap();
        assert!(verify_token(&token, "another-secret-another-secret-xx").is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert("authorization", "Bearer abc123token".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), Some("abc123token".to_string()));

        let mut headers = axum::http::HeaderMap::new();
        headers.insert("authorization", "abc123token".parse().unwrap());
        assert_eq!(extract_bearer_token(&headers), None);
    }
}
