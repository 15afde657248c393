/// Application context and dependency injection
use crate::{
    account::AccountManager,
    admin::StudentDirectory,
    attendance::AttendanceLedger,
    config::ServerConfig,
    db,
    error::ApiResult,
    reporting::ReportingService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
///
/// The pool is created once here and shared by every request handler;
/// nothing else in the process holds mutable state.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub accounts: Arc<AccountManager>,
    pub ledger: Arc<AttendanceLedger>,
    pub reports: Arc<ReportingService>,
    pub directory: Arc<StudentDirectory>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let pool = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&pool).await?;
        db::test_connection(&pool).await?;

        Ok(Self::from_parts(config, pool))
    }

    /// Assemble the context around an already-migrated pool
    pub fn from_parts(config: ServerConfig, pool: SqlitePool) -> Self {
        let accounts = Arc::new(AccountManager::new(pool.clone()));
        let ledger = Arc::new(AttendanceLedger::new(
            pool.clone(),
            config.attendance.clone(),
        ));
        let reports = Arc::new(ReportingService::new(
            pool.clone(),
            config.attendance.clone(),
        ));
        let directory = Arc::new(StudentDirectory::new(pool.clone()));

        Self {
            config: Arc::new(config),
            db: pool,
            accounts,
            ledger,
            reports,
            directory,
        }
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
