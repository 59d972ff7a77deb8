//! ClickHouse telemetry service
//!
//! Stores spans and GPU metric points. Uses the async HTTP client with
//! LZ4 compression; the client pools connections through HTTP keep-alive.

pub mod error;
pub mod repositories;
mod repository_impl;
pub mod schema;

pub use error::ClickhouseError;

use async_trait::async_trait;
use clickhouse::Client;

use crate::core::Drain;
use crate::core::config::ClickhouseConfig;

/// ClickHouse telemetry service
///
/// Owns the client and applies schema migrations on startup.
pub struct ClickhouseService {
    client: Client,
}

impl ClickhouseService {
    /// Connect and run migrations
    pub async fn init(config: &ClickhouseConfig) -> Result<Self, ClickhouseError> {
        let mut client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_compression(clickhouse::Compression::Lz4)
            .with_option("max_execution_time", config.timeout_secs.to_string());

        if let Some(ref password) = config.password {
            client = client.with_password(password);
        }

        let service = Self { client };
        service.run_migrations().await?;

        tracing::debug!(
            url = %config.url,
            database = %config.database,
            "ClickhouseService initialized"
        );

        Ok(service)
    }

    /// Get the ClickHouse client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Health check - verify connection to ClickHouse
    pub async fn health_check(&self) -> Result<(), ClickhouseError> {
        self.client
            .query("SELECT 1")
            .execute()
            .await
            .map_err(ClickhouseError::from)
    }

    async fn run_migrations(&self) -> Result<(), ClickhouseError> {
        let table_exists: bool = self
            .client
            .query(
                "SELECT count() > 0 FROM system.tables WHERE database = currentDatabase() AND name = 'schema_version'",
            )
            .fetch_one()
            .await
            .map_err(|e| {
                ClickhouseError::Connection(format!(
                    "Failed to check schema_version table: {}. Verify ClickHouse is running and accessible.",
                    e
                ))
            })?;

        let current_version: Option<i32> = if table_exists {
            self.client
                .query("SELECT version FROM schema_version FINAL WHERE id = 1")
                .fetch_optional()
                .await?
        } else {
            None
        };

        match current_version {
            None => {
                tracing::debug!(
                    "Applying initial ClickHouse schema v{}",
                    schema::SCHEMA_VERSION
                );
                self.apply_initial_schema().await?;
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(ClickhouseError::MigrationFailed {
                    version: v,
                    name: "version_check".to_string(),
                    error: format!(
                        "Database schema version {} is newer than application version {}. Upgrade the application.",
                        v,
                        schema::SCHEMA_VERSION
                    ),
                });
            }
            Some(v) if v < schema::SCHEMA_VERSION => {
                tracing::debug!(
                    "Migrating ClickHouse schema from v{} to v{}",
                    v,
                    schema::SCHEMA_VERSION
                );
                for version in (v + 1)..=schema::SCHEMA_VERSION {
                    self.apply_versioned_migration(version).await?;
                }
            }
            Some(_) => {
                tracing::debug!(
                    "ClickHouse schema is up to date (v{})",
                    schema::SCHEMA_VERSION
                );
            }
        }

        Ok(())
    }

    async fn apply_initial_schema(&self) -> Result<(), ClickhouseError> {
        for table_sql in schema::generate_schema() {
            self.client.query(table_sql).execute().await?;
        }
        self.record_version(schema::SCHEMA_VERSION, "Initial schema")
            .await?;

        tracing::debug!(
            version = schema::SCHEMA_VERSION,
            "ClickHouse schema applied successfully"
        );
        Ok(())
    }

    async fn apply_versioned_migration(&self, version: i32) -> Result<(), ClickhouseError> {
        let migrations = schema_migrations();
        let Some((_, name, sql)) = migrations.iter().find(|(v, _, _)| *v == version) else {
            return Err(ClickhouseError::MigrationFailed {
                version,
                name: "unknown".to_string(),
                error: format!("No migration defined for version {}", version),
            });
        };

        self.client
            .query(sql)
            .execute()
            .await
            .map_err(|e| ClickhouseError::MigrationFailed {
                version,
                name: name.to_string(),
                error: e.to_string(),
            })?;
        self.record_version(version, name).await?;

        tracing::debug!("ClickHouse migration v{} ({}) applied", version, name);
        Ok(())
    }

    /// ReplacingMergeTree keeps the latest row per id
    async fn record_version(&self, version: i32, description: &str) -> Result<(), ClickhouseError> {
        self.client
            .query(
                "INSERT INTO schema_version (id, version, applied_at, description) VALUES (?, ?, ?, ?)",
            )
            .bind(1u8)
            .bind(version)
            .bind(chrono::Utc::now().timestamp())
            .bind(description)
            .execute()
            .await?;
        Ok(())
    }

    /// Close the connection gracefully (no-op for ClickHouse HTTP client)
    pub async fn close(&self) {
        tracing::debug!("ClickHouse connection closed");
    }
}

#[async_trait]
impl Drain for ClickhouseService {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    async fn drain(&self) {
        self.close().await;
    }
}

/// Versioned migrations applied after the initial schema: (version, name, sql)
fn schema_migrations() -> Vec<(i32, &'static str, &'static str)> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_pending_migrations_beyond_schema_version() {
        for (version, _, _) in schema_migrations() {
            assert!(version > 1 && version <= schema::SCHEMA_VERSION);
        }
    }
}
