//! Migration Runner - binds the applicator to a PostgreSQL database
//!
//! Owns the pool of one invocation. Each operation opens a
//! [`PgVersionStore`] on a single pooled connection and returns it to the
//! pool when done.

use sqlstep_core::DatabaseConfig;
use sqlx::PgPool;

use super::applicator::{force_version, no_change, read_version, StepApplicator};
use super::catalog::MigrationSource;
use super::definitions::{MigrationConfig, RunOutcome, StepCount, VersionState};
use super::postgres::PgVersionStore;
use crate::database;
use crate::error::MigrateResult;

/// Migration runner that executes migrations against a database
pub struct MigrationRunner {
    config: MigrationConfig,
    pool: PgPool,
}

impl MigrationRunner {
    /// Create a new migration runner
    pub fn new(config: MigrationConfig, pool: PgPool) -> Self {
        Self { config, pool }
    }

    /// Create a new migration runner with its own pool
    pub async fn connect(
        config: MigrationConfig,
        database: &DatabaseConfig,
    ) -> MigrateResult<Self> {
        let pool = database::connect(database).await?;
        Ok(Self::new(config, pool))
    }

    async fn open_store(&self) -> MigrateResult<PgVersionStore> {
        PgVersionStore::open(
            &self.pool,
            &self.config.migrations_table,
            &self.config.lock_scope,
        )
        .await
    }

    /// Walk `steps` through `source` against the recorded version
    pub async fn run_steps<S>(&self, source: &mut S, steps: StepCount) -> MigrateResult<RunOutcome>
    where
        S: MigrationSource,
    {
        let mut store = self.open_store().await?;

        source.open()?;
        let result = StepApplicator::new(&*source, &mut store).run(steps).await;
        let closed = source.close();

        let outcome = result?;
        closed?;
        Ok(outcome)
    }

    /// Outcome of a run with nothing to apply; still refused when dirty
    pub async fn no_change(&self) -> MigrateResult<RunOutcome> {
        let mut store = self.open_store().await?;
        no_change(&mut store).await
    }

    /// Recorded version and dirty flag
    pub async fn version(&self) -> MigrateResult<VersionState> {
        let mut store = self.open_store().await?;
        read_version(&mut store).await
    }

    /// Overwrite the recorded version without running migrations
    pub async fn force(&self, version: i64) -> MigrateResult<VersionState> {
        let mut store = self.open_store().await?;
        force_version(&mut store, version).await
    }

    /// Close the pool, waiting for connections to be returned
    pub async fn close(self) {
        self.pool.close().await;
    }
}
