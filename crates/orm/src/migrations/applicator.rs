//! Step Applicator - walks a catalog against the recorded version
//!
//! A run plans its steps from the catalog and the stored state before any
//! SQL executes, then applies them one transaction at a time. The first
//! failure marks the store dirty and ends the run; steps committed before it
//! stay committed.

use std::time::Instant;

use super::catalog::MigrationSource;
use super::definitions::{
    Direction, MigrationEntry, MigrationVersion, RunOutcome, RunState, StepCount, VersionState,
};
use super::store::VersionStore;
use crate::error::{MigrateError, MigrateResult};

/// One planned step: the script to execute and the version recorded after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedStep<'a> {
    pub entry: &'a MigrationEntry,
    pub target: Option<MigrationVersion>,
}

/// Compute the steps of a run starting at `current`.
///
/// Up: the first target is `first()` when nothing is applied, otherwise
/// `next(current)`. Down: `current` is reverted with its own script and the
/// position moves to `prev(current)`, or to no version at all. Reaching an
/// end of the catalog stops the plan short.
pub fn plan<'a, S>(
    source: &'a S,
    current: Option<MigrationVersion>,
    steps: StepCount,
) -> MigrateResult<Vec<PlannedStep<'a>>>
where
    S: MigrationSource + ?Sized,
{
    let direction = steps.direction();
    if direction != source.direction() {
        return Err(MigrateError::DirectionMismatch {
            requested: direction,
            catalog: source.direction(),
        });
    }

    let mut planned = Vec::new();
    let mut position = current;

    while (planned.len() as u64) < steps.magnitude() {
        let (script, target) = match direction {
            Direction::Up => {
                let next = match position {
                    None => source.first(),
                    Some(version) => source.next(version),
                };
                match next {
                    Some(next) => (next, Some(next)),
                    None => break,
                }
            }
            Direction::Down => match position {
                Some(version) => (version, source.prev(version)),
                None => break,
            },
        };

        let entry = source
            .read(script)
            .ok_or(MigrateError::MissingMigration {
                version: script,
                direction,
            })?;

        planned.push(PlannedStep { entry, target });
        position = target;
    }

    Ok(planned)
}

/// Runs a signed number of steps from one catalog against one store
pub struct StepApplicator<'a, S: ?Sized, V: ?Sized> {
    source: &'a S,
    store: &'a mut V,
    state: RunState,
}

impl<'a, S, V> StepApplicator<'a, S, V>
where
    S: MigrationSource + ?Sized,
    V: VersionStore + ?Sized,
{
    pub fn new(source: &'a S, store: &'a mut V) -> Self {
        Self {
            source,
            store,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Apply (`steps > 0`) or revert (`steps < 0`) up to `|steps|` migrations.
    ///
    /// The store lock is held for the whole run and released on every path.
    pub async fn run(&mut self, steps: StepCount) -> MigrateResult<RunOutcome> {
        self.store.lock().await?;
        let result = self.run_locked(steps).await;
        let unlocked = self.store.unlock().await;

        let result = match (result, unlocked) {
            (Err(e), Err(unlock_err)) => {
                tracing::error!("Failed to release migration lock: {}", unlock_err);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(_), Err(unlock_err)) => Err(unlock_err),
            (Ok(outcome), Ok(())) => Ok(outcome),
        };

        self.state = match result {
            Ok(_) => RunState::Completed,
            Err(_) => RunState::Failed,
        };
        result
    }

    async fn run_locked(&mut self, steps: StepCount) -> MigrateResult<RunOutcome> {
        let VersionState { version, dirty } = self.store.version().await?;
        if dirty {
            return Err(MigrateError::Dirty { version });
        }

        let planned = plan(self.source, version, steps)?;
        if planned.is_empty() {
            tracing::info!("no migrations applied. no change");
            return Ok(RunOutcome::NoChange);
        }

        if (planned.len() as u64) < steps.magnitude() {
            tracing::info!(
                "{} of {} requested steps available",
                planned.len(),
                steps.magnitude()
            );
        }

        self.state = RunState::Running;
        let direction = steps.direction();
        let total = planned.len();
        let mut recorded = version;

        for (index, step) in planned.iter().enumerate() {
            let number = index + 1;
            let started = Instant::now();
            tracing::info!(
                version = step.entry.version,
                identifier = %step.entry.identifier,
                "{} migration {}/{}",
                direction.verb(),
                number,
                total
            );

            if let Err(source) = self.store.apply(&step.entry.body, step.target).await {
                tracing::error!(
                    version = step.entry.version,
                    step = number,
                    identifier = %step.entry.identifier,
                    "Migration failed: {}",
                    source
                );
                if let Err(mark_err) = self.store.set_version(recorded, true).await {
                    tracing::error!("Failed to mark version store dirty: {}", mark_err);
                }
                return Err(MigrateError::StepFailed {
                    version: step.entry.version,
                    step: number,
                    identifier: step.entry.identifier.clone(),
                    source: Box::new(source),
                });
            }

            tracing::debug!(
                version = step.entry.version,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Migration committed"
            );
            recorded = step.target;
        }

        Ok(RunOutcome::Applied {
            steps: total,
            version: recorded,
        })
    }
}

/// Read the recorded state without taking the lock.
pub async fn read_version<V>(store: &mut V) -> MigrateResult<VersionState>
where
    V: VersionStore + ?Sized,
{
    store.version().await
}

/// Outcome when no step was requested. A dirty store is still reported.
pub async fn no_change<V>(store: &mut V) -> MigrateResult<RunOutcome>
where
    V: VersionStore + ?Sized,
{
    let VersionState { version, dirty } = store.version().await?;
    if dirty {
        return Err(MigrateError::Dirty { version });
    }
    tracing::info!("no migrations applied. no change");
    Ok(RunOutcome::NoChange)
}

/// Overwrite the recorded version with `{version, dirty: false}` without
/// running any migration. `-1` clears the version.
pub async fn force_version<V>(store: &mut V, version: i64) -> MigrateResult<VersionState>
where
    V: VersionStore + ?Sized,
{
    let version = match version {
        -1 => None,
        v if v < -1 => return Err(MigrateError::InvalidForceVersion(v)),
        v => Some(v as MigrationVersion),
    };

    store.lock().await?;
    let written = store.set_version(version, false).await;
    let unlocked = store.unlock().await;
    written?;
    unlocked?;

    tracing::info!(?version, "Forced migration version");
    Ok(VersionState::clean(version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::catalog::Catalog;
    use crate::migrations::store::MemoryVersionStore;

    fn catalog(direction: Direction, versions: &[MigrationVersion]) -> Catalog {
        let mut catalog = Catalog::new(direction);
        for version in versions {
            catalog
                .insert(MigrationEntry::new(
                    *version,
                    direction,
                    format!("{}_m.{}.sql", version, direction),
                    format!("{} {}", direction, version),
                ))
                .unwrap();
        }
        catalog
    }

    fn steps(n: i64) -> StepCount {
        StepCount::new(n).unwrap()
    }

    fn scripts(planned: &[PlannedStep<'_>]) -> Vec<MigrationVersion> {
        planned.iter().map(|s| s.entry.version).collect()
    }

    fn targets(planned: &[PlannedStep<'_>]) -> Vec<Option<MigrationVersion>> {
        planned.iter().map(|s| s.target).collect()
    }

    #[test]
    fn test_plan_up_from_fresh_starts_at_first() {
        let ups = catalog(Direction::Up, &[1, 2, 3]);

        let planned = plan(&ups, None, steps(2)).unwrap();
        assert_eq!(scripts(&planned), vec![1, 2]);
        assert_eq!(targets(&planned), vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_plan_up_continues_after_current() {
        let ups = catalog(Direction::Up, &[10, 20, 30]);

        let planned = plan(&ups, Some(10), steps(5)).unwrap();
        assert_eq!(scripts(&planned), vec![20, 30]);
    }

    #[test]
    fn test_plan_up_at_last_version_is_empty() {
        let ups = catalog(Direction::Up, &[1, 2, 3]);
        assert!(plan(&ups, Some(3), steps(1)).unwrap().is_empty());
    }

    #[test]
    fn test_plan_down_reverts_current_then_moves_to_prev() {
        let downs = catalog(Direction::Down, &[1, 2, 3]);

        let planned = plan(&downs, Some(3), steps(-2)).unwrap();
        assert_eq!(scripts(&planned), vec![3, 2]);
        assert_eq!(targets(&planned), vec![Some(2), Some(1)]);
    }

    #[test]
    fn test_plan_down_past_first_clears_version() {
        let downs = catalog(Direction::Down, &[1, 2]);

        let planned = plan(&downs, Some(2), steps(-10)).unwrap();
        assert_eq!(scripts(&planned), vec![2, 1]);
        assert_eq!(targets(&planned), vec![Some(1), None]);
    }

    #[test]
    fn test_plan_down_from_fresh_is_empty() {
        let downs = catalog(Direction::Down, &[1, 2]);
        assert!(plan(&downs, None, steps(-1)).unwrap().is_empty());
    }

    #[test]
    fn test_plan_down_without_script_for_current_fails() {
        let downs = catalog(Direction::Down, &[1, 3]);

        let err = plan(&downs, Some(2), steps(-1)).unwrap_err();
        assert!(matches!(
            err,
            MigrateError::MissingMigration {
                version: 2,
                direction: Direction::Down
            }
        ));
    }

    #[test]
    fn test_plan_rejects_direction_mismatch() {
        let ups = catalog(Direction::Up, &[1]);
        let err = plan(&ups, Some(1), steps(-1)).unwrap_err();
        assert!(matches!(err, MigrateError::DirectionMismatch { .. }));
    }

    #[tokio::test]
    async fn test_run_applies_and_records_each_step() {
        let ups = catalog(Direction::Up, &[1, 2, 3]);
        let mut store = MemoryVersionStore::new();

        let mut applicator = StepApplicator::new(&ups, &mut store);
        assert_eq!(applicator.state(), RunState::Idle);

        let outcome = applicator.run(steps(2)).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Applied {
                steps: 2,
                version: Some(2)
            }
        );
        assert_eq!(applicator.state(), RunState::Completed);

        assert_eq!(store.state(), VersionState::clean(Some(2)));
        assert_eq!(store.executed(), ["up 1", "up 2"]);
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn test_run_reports_no_change() {
        let ups = catalog(Direction::Up, &[1, 2]);
        let mut store = MemoryVersionStore::with_state(VersionState::clean(Some(2)));

        let outcome = StepApplicator::new(&ups, &mut store)
            .run(steps(2))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::NoChange);
        assert_eq!(store.state(), VersionState::clean(Some(2)));
        assert!(store.executed().is_empty());
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn test_dirty_store_is_rejected_before_any_sql() {
        let ups = catalog(Direction::Up, &[1, 2]);
        let dirty = VersionState {
            version: Some(1),
            dirty: true,
        };
        let mut store = MemoryVersionStore::with_state(dirty);

        let mut applicator = StepApplicator::new(&ups, &mut store);
        let err = applicator.run(steps(1)).await.unwrap_err();
        assert!(matches!(err, MigrateError::Dirty { version: Some(1) }));
        assert_eq!(applicator.state(), RunState::Failed);

        assert_eq!(store.state(), dirty);
        assert!(store.executed().is_empty());
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn test_failure_marks_dirty_at_last_committed_version() {
        let ups = catalog(Direction::Up, &[1, 2, 3, 4]);
        let mut store = MemoryVersionStore::new().fail_on("up 3");

        let mut applicator = StepApplicator::new(&ups, &mut store);
        let err = applicator.run(steps(4)).await.unwrap_err();
        assert_eq!(applicator.state(), RunState::Failed);

        match err {
            MigrateError::StepFailed {
                version,
                step,
                identifier,
                ..
            } => {
                assert_eq!(version, 3);
                assert_eq!(step, 3);
                assert_eq!(identifier, "3_m.up.sql");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(store.executed(), ["up 1", "up 2"]);
        assert_eq!(
            store.state(),
            VersionState {
                version: Some(2),
                dirty: true
            }
        );
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn test_first_step_failure_on_fresh_store() {
        let ups = catalog(Direction::Up, &[1, 2]);
        let mut store = MemoryVersionStore::new().fail_on("up 1");

        let err = StepApplicator::new(&ups, &mut store)
            .run(steps(1))
            .await
            .unwrap_err();

        assert!(err.is_dirty());
        assert_eq!(
            store.state(),
            VersionState {
                version: None,
                dirty: true
            }
        );
    }

    #[tokio::test]
    async fn test_down_failure_marks_dirty_at_last_reverted_target() {
        let downs = catalog(Direction::Down, &[1, 2, 3]);
        let mut store =
            MemoryVersionStore::with_state(VersionState::clean(Some(3))).fail_on("down 2");

        let err = StepApplicator::new(&downs, &mut store)
            .run(steps(-3))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MigrateError::StepFailed {
                version: 2,
                step: 2,
                ..
            }
        ));
        assert_eq!(store.executed(), ["down 3"]);
        assert_eq!(
            store.state(),
            VersionState {
                version: Some(2),
                dirty: true
            }
        );
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn test_first_revert_failure_keeps_current_version_dirty() {
        let downs = catalog(Direction::Down, &[1]);
        let mut store =
            MemoryVersionStore::with_state(VersionState::clean(Some(1))).fail_on("down 1");

        let err = StepApplicator::new(&downs, &mut store)
            .run(steps(-1))
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::StepFailed { version: 1, step: 1, .. }));
        assert!(store.executed().is_empty());
        assert_eq!(
            store.state(),
            VersionState {
                version: Some(1),
                dirty: true
            }
        );
    }

    #[tokio::test]
    async fn test_revert_failure_after_commit_records_prev_target() {
        let downs = catalog(Direction::Down, &[1, 2]);
        let mut store =
            MemoryVersionStore::with_state(VersionState::clean(Some(2))).fail_on("down 1");

        StepApplicator::new(&downs, &mut store)
            .run(steps(-2))
            .await
            .unwrap_err();

        assert_eq!(store.executed(), ["down 2"]);
        assert_eq!(
            store.state(),
            VersionState {
                version: Some(1),
                dirty: true
            }
        );
    }

    #[tokio::test]
    async fn test_no_change_still_reports_dirty_store() {
        let mut clean = MemoryVersionStore::with_state(VersionState::clean(Some(4)));
        assert_eq!(no_change(&mut clean).await.unwrap(), RunOutcome::NoChange);

        let mut dirty = MemoryVersionStore::with_state(VersionState {
            version: None,
            dirty: true,
        });
        let err = no_change(&mut dirty).await.unwrap_err();
        assert!(matches!(err, MigrateError::Dirty { version: None }));
        assert!(dirty.executed().is_empty());
    }

    #[tokio::test]
    async fn test_force_sets_clean_version_without_sql() {
        let mut store = MemoryVersionStore::with_state(VersionState {
            version: Some(2),
            dirty: true,
        });

        let state = force_version(&mut store, 1).await.unwrap();
        assert_eq!(state, VersionState::clean(Some(1)));
        assert_eq!(store.state(), VersionState::clean(Some(1)));
        assert!(store.executed().is_empty());
        assert_eq!(store.lock_count(), 1);
        assert!(!store.is_locked());
    }

    #[tokio::test]
    async fn test_force_minus_one_clears_version() {
        let mut store = MemoryVersionStore::with_state(VersionState::clean(Some(5)));

        force_version(&mut store, -1).await.unwrap();
        assert!(read_version(&mut store).await.unwrap().is_fresh());
    }

    #[tokio::test]
    async fn test_force_rejects_other_negatives() {
        let mut store = MemoryVersionStore::new();

        let err = force_version(&mut store, -2).await.unwrap_err();
        assert!(matches!(err, MigrateError::InvalidForceVersion(-2)));
        assert_eq!(store.lock_count(), 0);
    }
}
