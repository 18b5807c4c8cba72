//! Database connectivity - PostgreSQL pool construction

use std::time::Duration;

use sqlstep_core::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::error::{MigrateError, MigrateResult};

/// Connect a pool to the configured database.
///
/// The pool connects eagerly so a bad URL or unreachable host fails here,
/// before any migration work starts.
pub async fn connect(config: &DatabaseConfig) -> MigrateResult<PgPool> {
    let url = config.url()?;
    tracing::debug!(url = %config.masked_url(), "Connecting to database");

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout))
        .connect(url.as_str())
        .await
        .map_err(|e| MigrateError::Connection(format!("unable to create connection: {}", e)))
}
