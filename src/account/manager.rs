/// Account manager implementation using runtime queries
use crate::{
    db::models::{Role, User},
    error::{ApiError, ApiResult, FieldError},
    validation,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 8;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register a new student account
    pub async fn register(&self, name: &str, email: &str, password: &str) -> ApiResult<User> {
        let mut errors = Vec::new();
        if name.trim().is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }
        errors.extend(validation::validate_email(email));
        if password.chars().count() < MIN_PASSWORD_LEN {
            errors.push(FieldError::new(
                "password",
                format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
            ));
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        if self.email_exists(email).await? {
            return Err(ApiError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.to_lowercase(),
            password_hash,
            role: Role::Student,
            active: true,
            last_login_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, active, last_login_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.active)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            // The unique index backs up the pre-check under concurrent registration
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("Email already registered".to_string())
            }
            other => ApiError::Database(other),
        })?;

        tracing::info!("Registered new account {} ({})", user.id, user.email);

        Ok(user)
    }

    /// Verify credentials, stamp last login, and return the user
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<User> {
        let user = self
            .get_user_by_email(email)
            .await
            .map_err(|_| ApiError::Authentication("Invalid credentials".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(ApiError::Authentication("Invalid credentials".to_string()));
        }

        if !user.active {
            return Err(ApiError::Authentication(
                "Account has been deactivated".to_string(),
            ));
        }

        let now = Utc::now();
        sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(&user.id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        tracing::info!("User {} logged in", user.id);

        Ok(User {
            last_login_at: Some(now),
            ..user
        })
    }

    /// Get user by id
    pub async fn get_user(&self, id: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, active, last_login_at, created_at
             FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Get user by email (case-insensitive)
    pub async fn get_user_by_email(&self, email: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, active, last_login_at, created_at
             FROM users WHERE email = ?1 COLLATE NOCASE",
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Check whether an email is taken (case-insensitive)
    pub async fn email_exists(&self, email: &str) -> ApiResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE")
                .bind(email)
                .fetch_one(&self.db)
                .await
                .map_err(ApiError::Database)?;

        Ok(count > 0)
    }
}

/// Hash a password with Argon2id and a fresh random salt
fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored Argon2 hash
fn verify_password(password: &str, stored_hash: &str) -> ApiResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| ApiError::Internal(format!("Corrupt password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(verify_password("correct horse battery", &hash).unwrap());
        assert!(!verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("same password").unwrap();
        let b = hash_password("same password").unwrap();
        assert_ne!(a, b);
    }
}
