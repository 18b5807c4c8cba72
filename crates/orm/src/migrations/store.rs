//! Version Store - durable `{version, dirty}` state of the target database
//!
//! The step runner talks to the database only through [`VersionStore`]:
//! a run-scoped lock, a state read, an unconditional state write, and a
//! transactional "execute body and record version" primitive.

use async_trait::async_trait;

use super::definitions::{MigrationVersion, VersionState};
use crate::error::{MigrateError, MigrateResult};

#[async_trait]
pub trait VersionStore: Send {
    /// Take the exclusive migration lock, waiting for other runs to finish.
    async fn lock(&mut self) -> MigrateResult<()>;

    /// Release the lock taken by [`VersionStore::lock`].
    async fn unlock(&mut self) -> MigrateResult<()>;

    /// Current recorded state; a fresh store reports `VersionState::default()`.
    async fn version(&mut self) -> MigrateResult<VersionState>;

    /// Overwrite the recorded state without executing any migration.
    async fn set_version(
        &mut self,
        version: Option<MigrationVersion>,
        dirty: bool,
    ) -> MigrateResult<()>;

    /// Execute `body` and record `target` as the clean current version, in
    /// one transaction. Nothing is recorded when this fails.
    async fn apply(&mut self, body: &str, target: Option<MigrationVersion>) -> MigrateResult<()>;
}

/// In-process store. Executes nothing; it records every body it was asked
/// to apply and can be told to fail on a body containing a marker.
#[derive(Debug, Default, Clone)]
pub struct MemoryVersionStore {
    state: VersionState,
    locked: bool,
    executed: Vec<String>,
    fail_marker: Option<String>,
    lock_count: usize,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: VersionState) -> Self {
        Self {
            state,
            ..Self::default()
        }
    }

    /// Make `apply` fail for every body containing `marker`.
    pub fn fail_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    pub fn state(&self) -> VersionState {
        self.state
    }

    /// Bodies applied successfully, in execution order
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of times the lock was taken
    pub fn lock_count(&self) -> usize {
        self.lock_count
    }
}

#[async_trait]
impl VersionStore for MemoryVersionStore {
    async fn lock(&mut self) -> MigrateResult<()> {
        if self.locked {
            return Err(MigrateError::Lock("already locked".to_string()));
        }
        self.locked = true;
        self.lock_count += 1;
        Ok(())
    }

    async fn unlock(&mut self) -> MigrateResult<()> {
        if !self.locked {
            return Err(MigrateError::Lock("not locked".to_string()));
        }
        self.locked = false;
        Ok(())
    }

    async fn version(&mut self) -> MigrateResult<VersionState> {
        Ok(self.state)
    }

    async fn set_version(
        &mut self,
        version: Option<MigrationVersion>,
        dirty: bool,
    ) -> MigrateResult<()> {
        self.state = VersionState { version, dirty };
        Ok(())
    }

    async fn apply(&mut self, body: &str, target: Option<MigrationVersion>) -> MigrateResult<()> {
        if let Some(marker) = &self.fail_marker {
            if body.contains(marker.as_str()) {
                return Err(MigrateError::Connection(format!(
                    "simulated failure executing '{}'",
                    body
                )));
            }
        }

        self.executed.push(body.to_string());
        self.state = VersionState::clean(target);
        Ok(())
    }
}
