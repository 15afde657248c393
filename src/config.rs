/// Configuration management for the Rollcall server
use crate::error::{ApiError, ApiResult};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub attendance: AttendanceConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in hours
    pub token_ttl_hours: i64,
}

/// Attendance policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceConfig {
    /// Check-ins strictly after this time-of-day are flagged late
    pub late_after: NaiveTime,
    /// Offset applied to UTC to derive the local calendar day and
    /// time-of-day; makes "today" explicit instead of trusting the
    /// server wall clock
    pub utc_offset_minutes: i32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("ROLLCALL_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("ROLLCALL_PORT")
            .unwrap_or_else(|_| "8480".to_string())
            .parse()
            .map_err(|_| ApiError::invalid("port", "Invalid port number"))?;
        let version = env::var("ROLLCALL_VERSION").unwrap_or_else(|_| "0.1.0".to_string());

        let data_directory: PathBuf = env::var("ROLLCALL_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("ROLLCALL_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("rollcall.sqlite"));

        let jwt_secret = env::var("ROLLCALL_JWT_SECRET")
            .map_err(|_| ApiError::invalid("jwt_secret", "JWT secret required"))?;
        let token_ttl_hours = env::var("ROLLCALL_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24);

        let late_after_raw = env::var("ROLLCALL_LATE_AFTER").unwrap_or_else(|_| "09:00".to_string());
        let late_after = NaiveTime::parse_from_str(&late_after_raw, "%H:%M")
            .map_err(|_| ApiError::invalid("late_after", "Expected HH:MM time-of-day"))?;
        let utc_offset_minutes = env::var("ROLLCALL_UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours,
            },
            attendance: AttendanceConfig {
                late_after,
                utc_offset_minutes,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::invalid("hostname", "Hostname cannot be empty"));
        }

        if self.auth.jwt_secret.len() < 32 {
            return Err(ApiError::invalid(
                "jwt_secret",
                "JWT secret must be at least 32 characters",
            ));
        }

        if self.attendance.utc_offset_minutes.abs() > 14 * 60 {
            return Err(ApiError::invalid(
                "utc_offset_minutes",
                "UTC offset must be within +/-14 hours",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8480,
                version: "0.1.0".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                database: "./data/rollcall.sqlite".into(),
            },
            auth: AuthConfig {
                jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
                token_ttl_hours: 24,
            },
            attendance: AttendanceConfig {
                late_after: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                utc_offset_minutes: 0,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn validate_accepts_sane_config() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_short_jwt_secret() {
        let mut config = test_config();
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_absurd_utc_offset() {
        let mut config = test_config();
        config.attendance.utc_offset_minutes = 15 * 60;
        assert!(config.validate().is_err());
    }
}
