/// Administrative management of student records
///
/// Listing, partial update, soft/permanent delete, and bulk actions,
/// restricted at the API layer to admin callers. Listing enrichment uses
/// one grouped query over the trailing 30 days instead of a per-student
/// subquery.
use crate::{
    account::UserProfile,
    db::models::User,
    error::{ApiError, ApiResult, FieldError},
    validation::{self, PageParams, Pagination},
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashMap;

/// A closed set of bulk operations, dispatched exhaustively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Activate,
    Deactivate,
    Delete,
}

/// Partial student update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub active: Option<bool>,
}

/// Bulk action request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    pub action: BulkAction,
    pub student_ids: Vec<String>,
}

/// Student profile enriched with trailing-30-day attendance counts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentListing {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub recent_attendance_days: i64,
    pub recent_completed_days: i64,
}

/// Student directory service
pub struct StudentDirectory {
    db: SqlitePool,
}

impl StudentDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Paginated student listing with optional active filter and
    /// case-insensitive name/email search
    pub async fn list(
        &self,
        params: PageParams,
        active: Option<bool>,
        search: Option<&str>,
        today: NaiveDate,
    ) -> ApiResult<(Vec<StudentListing>, Pagination)> {
        let pattern = search.map(|s| format!("%{}%", s.to_lowercase()));

        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, active, last_login_at, created_at
             FROM users
             WHERE role = 'student'
               AND (?1 IS NULL OR active = ?1)
               AND (?2 IS NULL OR LOWER(name) LIKE ?2 OR LOWER(email) LIKE ?2)
             ORDER BY name
             LIMIT ?3 OFFSET ?4",
        )
        .bind(active)
        .bind(&pattern)
        .bind(params.limit)
        .bind(params.offset())
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
             WHERE role = 'student'
               AND (?1 IS NULL OR active = ?1)
               AND (?2 IS NULL OR LOWER(name) LIKE ?2 OR LOWER(email) LIKE ?2)",
        )
        .bind(active)
        .bind(&pattern)
        .fetch_one(&self.db)
        .await
        .map_err(ApiError::Database)?;

        // Trailing-30-day counts for the whole page in one grouped query
        let window_start = today - Duration::days(30);
        let counts: Vec<(String, i64, i64)> = sqlx::query_as(
            "SELECT user_id, COUNT(*),
                    SUM(CASE WHEN status = 'checked-out' THEN 1 ELSE 0 END)
             FROM attendance_records
             WHERE date >= ?1 AND date <= ?2
             GROUP BY user_id",
        )
        .bind(window_start)
        .bind(today)
        .fetch_all(&self.db)
        .await
        .map_err(ApiError::Database)?;

        let counts_by_user: HashMap<String, (i64, i64)> = counts
            .into_iter()
            .map(|(id, attended, completed)| (id, (attended, completed)))
            .collect();

        let listings = users
            .into_iter()
            .map(|user| {
                let (attended, completed) =
                    counts_by_user.get(&user.id).copied().unwrap_or((0, 0));
                StudentListing {
                    profile: user.into(),
                    recent_attendance_days: attended,
                    recent_completed_days: completed,
                }
            })
            .collect();

        Ok((listings, Pagination::new(params, total)))
    }

    /// Partial update of name/email/active
    pub async fn update(&self, id: &str, update: StudentUpdate) -> ApiResult<UserProfile> {
        let user = self.get_student(id).await?;

        let mut errors = Vec::new();
        if let Some(ref name) = update.name {
            if name.trim().is_empty() {
                errors.push(FieldError::new("name", "Name cannot be empty"));
            }
        }
        if let Some(ref email) = update.email {
            errors.extend(validation::validate_email(email));
        }
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        if let Some(ref email) = update.email {
            let taken: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE AND id != ?2",
            )
            .bind(email)
            .bind(id)
            .fetch_one(&self.db)
            .await
            .map_err(ApiError::Database)?;

            if taken > 0 {
                return Err(ApiError::Conflict(
                    "Email already in use by another user".to_string(),
                ));
            }
        }

        let name = update
            .name
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|| user.name.clone());
        let email = update
            .email
            .map(|e| e.to_lowercase())
            .unwrap_or_else(|| user.email.clone());
        let active = update.active.unwrap_or(user.active);

        sqlx::query("UPDATE users SET name = ?1, email = ?2, active = ?3 WHERE id = ?4")
            .bind(&name)
            .bind(&email)
            .bind(active)
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(ApiError::Database)?;

        tracing::info!("Updated student {}", id);

        Ok(UserProfile {
            name,
            email,
            active,
            ..UserProfile::from(user)
        })
    }

    /// Soft delete deactivates; permanent delete removes the user and,
    /// via foreign keys, every attendance record and presence marker
    pub async fn delete(&self, id: &str, permanent: bool) -> ApiResult<()> {
        self.get_student(id).await?;

        if permanent {
            sqlx::query("DELETE FROM users WHERE id = ?1")
                .bind(id)
                .execute(&self.db)
                .await
                .map_err(ApiError::Database)?;
            tracing::warn!("Permanently deleted student {} and their attendance", id);
        } else {
            sqlx::query("UPDATE users SET active = FALSE WHERE id = ?1")
                .bind(id)
                .execute(&self.db)
                .await
                .map_err(ApiError::Database)?;
            tracing::info!("Deactivated student {}", id);
        }

        Ok(())
    }

    /// Apply one bulk action to a set of student ids; returns the number
    /// of affected rows
    pub async fn bulk(&self, action: BulkAction, ids: &[String]) -> ApiResult<u64> {
        if ids.is_empty() {
            return Err(ApiError::invalid(
                "studentIds",
                "At least one student id is required",
            ));
        }

        let mut affected = 0;
        for id in ids {
            let result = match action {
                BulkAction::Activate => {
                    sqlx::query("UPDATE users SET active = TRUE WHERE id = ?1 AND role = 'student'")
                        .bind(id)
                        .execute(&self.db)
                        .await
                }
                BulkAction::Deactivate => {
                    sqlx::query(
                        "UPDATE users SET active = FALSE WHERE id = ?1 AND role = 'student'",
                    )
                    .bind(id)
                    .execute(&self.db)
                    .await
                }
                BulkAction::Delete => {
                    sqlx::query("DELETE FROM users WHERE id = ?1 AND role = 'student'")
                        .bind(id)
                        .execute(&self.db)
                        .await
                }
            }
            .map_err(ApiError::Database)?;

            affected += result.rows_affected();
        }

        tracing::info!("Bulk {:?} affected {} students", action, affected);

        Ok(affected)
    }

    async fn get_student(&self, id: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, role, active, last_login_at, created_at
             FROM users WHERE id = ?1 AND role = 'student'",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(ApiError::Database)?
        .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))
    }
}
