//! Unified error type for data layer
//!
//! Wraps errors from both storage backends (ClickHouse for telemetry,
//! PostgreSQL for inventory, tenants and usage) while preserving which
//! backend produced them.

use thiserror::Error;

/// Unified error type for data layer operations
#[derive(Error, Debug)]
pub enum DataError {
    /// PostgreSQL database error (inventory/tenant store)
    #[error("PostgreSQL error: {0}")]
    Postgres(sqlx::Error),

    /// ClickHouse database error (telemetry store)
    #[error("ClickHouse error: {0}")]
    Clickhouse(#[from] clickhouse::error::Error),

    /// Migration failed
    #[error("Migration {version} ({name}) failed on {backend}: {error}")]
    MigrationFailed {
        backend: &'static str,
        version: i32,
        name: String,
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query timeout
    #[error("Query timeout after {timeout_secs}s on {backend}")]
    Timeout {
        backend: &'static str,
        timeout_secs: u64,
    },

    /// Backend not available
    #[error("Backend {backend} is not available: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Conflict error (e.g. duplicate entry)
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl DataError {
    /// Create a migration failed error
    pub fn migration_failed(backend: &'static str, version: i32, name: &str, error: &str) -> Self {
        Self::MigrationFailed {
            backend,
            version,
            name: name.to_string(),
            error: error.to_string(),
        }
    }

    /// Create a timeout error
    pub fn timeout(backend: &'static str, timeout_secs: u64) -> Self {
        Self::Timeout {
            backend,
            timeout_secs,
        }
    }

    /// Create a backend unavailable error
    pub fn backend_unavailable(backend: &'static str, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend,
            reason: reason.into(),
        }
    }

    /// Check if this is a connection-related error that might be transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::BackendUnavailable { .. } => true,
            Self::Postgres(e) => {
                matches!(
                    e,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            Self::Clickhouse(e) => {
                let msg = e.to_string();
                msg.contains("connection") || msg.contains("timeout") || msg.contains("network")
            }
            _ => false,
        }
    }

    /// Get the backend name that generated this error
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Clickhouse(_) => "clickhouse",
            Self::MigrationFailed { backend, .. } => backend,
            Self::Timeout { backend, .. } => backend,
            Self::BackendUnavailable { backend, .. } => backend,
            Self::Config(_) | Self::Conflict(_) => "unknown",
        }
    }
}

impl From<crate::data::postgres::PostgresError> for DataError {
    fn from(e: crate::data::postgres::PostgresError) -> Self {
        use crate::data::postgres::PostgresError;
        match e {
            PostgresError::Database(e) => Self::Postgres(e),
            PostgresError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "postgres",
                version,
                name,
                error,
            },
            PostgresError::Config(msg) => Self::Config(msg),
            PostgresError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

impl From<crate::data::clickhouse::ClickhouseError> for DataError {
    fn from(e: crate::data::clickhouse::ClickhouseError) -> Self {
        use crate::data::clickhouse::ClickhouseError;
        match e {
            ClickhouseError::Database(e) => Self::Clickhouse(e),
            ClickhouseError::MigrationFailed {
                version,
                name,
                error,
            } => Self::MigrationFailed {
                backend: "clickhouse",
                version,
                name,
                error,
            },
            ClickhouseError::Connection(msg) => Self::BackendUnavailable {
                backend: "clickhouse",
                reason: msg,
            },
            ClickhouseError::Timeout { timeout_secs } => Self::Timeout {
                backend: "clickhouse",
                timeout_secs,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_failed_error_display() {
        let err = DataError::migration_failed("postgres", 2, "add_usage_table", "syntax error");
        assert_eq!(
            err.to_string(),
            "Migration 2 (add_usage_table) failed on postgres: syntax error"
        );
    }

    #[test]
    fn test_timeout_error_display() {
        let err = DataError::timeout("clickhouse", 10);
        assert_eq!(err.to_string(), "Query timeout after 10s on clickhouse");
    }

    #[test]
    fn test_backend_unavailable_error_display() {
        let err = DataError::backend_unavailable("clickhouse", "connection refused");
        assert_eq!(
            err.to_string(),
            "Backend clickhouse is not available: connection refused"
        );
    }

    #[test]
    fn test_backend_method() {
        assert_eq!(DataError::timeout("clickhouse", 30).backend(), "clickhouse");
        assert_eq!(
            DataError::migration_failed("postgres", 1, "test", "error").backend(),
            "postgres"
        );
        assert_eq!(DataError::Conflict("dup".into()).backend(), "unknown");
    }

    #[test]
    fn test_is_transient() {
        assert!(DataError::timeout("clickhouse", 30).is_transient());
        assert!(DataError::Postgres(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!DataError::Postgres(sqlx::Error::RowNotFound).is_transient());
        assert!(!DataError::Config("bad config".into()).is_transient());
    }

    #[test]
    fn test_from_clickhouse_connection() {
        let err: DataError =
            crate::data::clickhouse::ClickhouseError::Connection("refused".into()).into();
        assert_eq!(err.backend(), "clickhouse");
        assert!(err.is_transient());
    }
}
