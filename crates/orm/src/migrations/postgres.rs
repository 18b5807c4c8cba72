//! PostgreSQL version store
//!
//! State lives in a single-row table (`schema_migrations` by default). An
//! empty table means nothing has been applied; version `-1` records a dirty
//! store that has no version. Runs are serialized with a
//! session-level advisory lock, so the store keeps one pooled connection for
//! its whole lifetime.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, Executor, PgConnection, PgPool, Postgres};

use super::definitions::{MigrationVersion, VersionState};
use super::store::VersionStore;
use crate::error::{MigrateError, MigrateResult};

const NIL_VERSION: i64 = -1;

pub struct PgVersionStore {
    conn: PoolConnection<Postgres>,
    table: String,
    lock_key: String,
}

impl PgVersionStore {
    /// Acquire a connection from `pool` and make sure the version table exists.
    ///
    /// `table` must already be a validated plain identifier; `lock_scope`
    /// (usually the database name) keys the advisory lock.
    pub async fn open(pool: &PgPool, table: &str, lock_scope: &str) -> MigrateResult<Self> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| MigrateError::Connection(format!("Failed to acquire connection: {}", e)))?;

        let mut store = Self {
            conn,
            table: table.to_string(),
            lock_key: format!("{}:{}", lock_scope, table),
        };

        store.lock().await?;
        let created = store.ensure_table().await;
        let unlocked = store.unlock().await;
        created?;
        unlocked?;

        Ok(store)
    }

    async fn ensure_table(&mut self) -> MigrateResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} \
             (version BIGINT NOT NULL PRIMARY KEY, dirty BOOLEAN NOT NULL)",
            self.table
        );
        (&mut *self.conn).execute(sql.as_str()).await.map_err(|e| {
            MigrateError::Connection(format!("Failed to create {} table: {}", self.table, e))
        })?;
        Ok(())
    }

    /// Replace the single state row. A clean `None` leaves the table empty.
    async fn write_state(
        conn: &mut PgConnection,
        table: &str,
        version: Option<MigrationVersion>,
        dirty: bool,
    ) -> MigrateResult<()> {
        sqlx::query(&format!("TRUNCATE {}", table))
            .execute(&mut *conn)
            .await?;

        if version.is_some() || dirty {
            let version = match version {
                Some(version) => {
                    i64::try_from(version).map_err(|_| MigrateError::VersionOutOfRange(version))?
                }
                None => NIL_VERSION,
            };
            sqlx::query(&format!(
                "INSERT INTO {} (version, dirty) VALUES ($1, $2)",
                table
            ))
            .bind(version)
            .bind(dirty)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl VersionStore for PgVersionStore {
    async fn lock(&mut self) -> MigrateResult<()> {
        sqlx::query("SELECT pg_advisory_lock(hashtext($1))")
            .bind(&self.lock_key)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| MigrateError::Lock(format!("Failed to take advisory lock: {}", e)))?;
        tracing::debug!(key = %self.lock_key, "Advisory lock taken");
        Ok(())
    }

    async fn unlock(&mut self) -> MigrateResult<()> {
        sqlx::query("SELECT pg_advisory_unlock(hashtext($1))")
            .bind(&self.lock_key)
            .execute(&mut *self.conn)
            .await
            .map_err(|e| MigrateError::Lock(format!("Failed to release advisory lock: {}", e)))?;
        tracing::debug!(key = %self.lock_key, "Advisory lock released");
        Ok(())
    }

    async fn version(&mut self) -> MigrateResult<VersionState> {
        let row: Option<(i64, bool)> =
            sqlx::query_as(&format!("SELECT version, dirty FROM {} LIMIT 1", self.table))
                .fetch_optional(&mut *self.conn)
                .await?;

        match row {
            None => Ok(VersionState::default()),
            Some((NIL_VERSION, dirty)) => Ok(VersionState {
                version: None,
                dirty,
            }),
            Some((version, dirty)) => {
                let version = MigrationVersion::try_from(version).map_err(|_| {
                    MigrateError::Connection(format!(
                        "{} holds a negative version {}",
                        self.table, version
                    ))
                })?;
                Ok(VersionState {
                    version: Some(version),
                    dirty,
                })
            }
        }
    }

    async fn set_version(
        &mut self,
        version: Option<MigrationVersion>,
        dirty: bool,
    ) -> MigrateResult<()> {
        let mut tx = self.conn.begin().await?;
        Self::write_state(&mut tx, &self.table, version, dirty).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn apply(&mut self, body: &str, target: Option<MigrationVersion>) -> MigrateResult<()> {
        let mut tx = self.conn.begin().await?;

        // Simple query protocol: the body may hold several statements
        (&mut *tx).execute(body).await?;
        Self::write_state(&mut tx, &self.table, target, false).await?;

        tx.commit().await?;
        Ok(())
    }
}
