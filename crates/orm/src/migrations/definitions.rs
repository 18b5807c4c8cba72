//! Migration Definitions - Core types shared by discovery, catalog and runner
//!
//! Defines versions, directions, discovered entries, the persisted version
//! state and the immutable command a single invocation carries out.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use sqlstep_core::MigrateConfig;

/// Numeric migration identity, parsed from the leading filename token
/// (typically a `%Y%m%d%H%M%S` timestamp).
pub type MigrationVersion = u64;

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Apply the migration (run UP scripts)
    Up,
    /// Revert the migration (run DOWN scripts)
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }

    /// Filename suffix that marks a script of this direction
    pub fn suffix(&self) -> String {
        format!(".{}.sql", self.as_str())
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Direction::Up => "Applying",
            Direction::Down => "Reverting",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Configuration for the migration system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Directory scanned (recursively) for migration scripts
    pub migrations_dir: PathBuf,
    /// Table holding the `{version, dirty}` row
    pub migrations_table: String,
    /// Scope of the advisory lock, usually the database name
    pub lock_scope: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from("migrations"),
            migrations_table: "schema_migrations".to_string(),
            lock_scope: "sqlstep".to_string(),
        }
    }
}

impl From<&MigrateConfig> for MigrationConfig {
    fn from(config: &MigrateConfig) -> Self {
        Self {
            migrations_dir: config.migrations_dir.clone(),
            migrations_table: config.migrations_table.clone(),
            lock_scope: config.database.name.clone(),
        }
    }
}

/// One discovered migration script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    pub version: MigrationVersion,
    pub direction: Direction,
    /// Source path, used in diagnostics
    pub identifier: String,
    /// Raw SQL, executed verbatim
    pub body: String,
}

impl MigrationEntry {
    pub fn new(
        version: MigrationVersion,
        direction: Direction,
        identifier: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            version,
            direction,
            identifier: identifier.into(),
            body: body.into(),
        }
    }
}

/// Persisted `{version, dirty}` state of the target database.
///
/// `version == None` means nothing is applied. `dirty` means the last step
/// failed and the schema may not match `version`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionState {
    pub version: Option<MigrationVersion>,
    pub dirty: bool,
}

impl VersionState {
    pub fn clean(version: Option<MigrationVersion>) -> Self {
        Self {
            version,
            dirty: false,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.version.is_none() && !self.dirty
    }
}

/// A non-zero signed step count: positive applies, negative reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepCount(i64);

impl StepCount {
    /// `None` for zero; zero must be resolved with [`StepRequest::resolve`].
    pub fn new(steps: i64) -> Option<Self> {
        if steps == 0 {
            None
        } else {
            Some(Self(steps))
        }
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    pub fn direction(&self) -> Direction {
        if self.0 > 0 {
            Direction::Up
        } else {
            Direction::Down
        }
    }

    pub fn magnitude(&self) -> u64 {
        self.0.unsigned_abs()
    }
}

/// Step request as given by an operator: a direction and a count where `0`
/// means every discovered migration of that direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepRequest {
    pub direction: Direction,
    pub steps: u32,
}

impl StepRequest {
    pub fn up(steps: u32) -> Self {
        Self {
            direction: Direction::Up,
            steps,
        }
    }

    pub fn down(steps: u32) -> Self {
        Self {
            direction: Direction::Down,
            steps,
        }
    }

    /// Signed step count, with `0` translated to the discovered entry count.
    ///
    /// Returns `None` when there is nothing to walk (zero requested and
    /// nothing discovered).
    pub fn resolve(&self, discovered: usize) -> Option<StepCount> {
        let magnitude = if self.steps == 0 {
            i64::try_from(discovered).unwrap_or(i64::MAX)
        } else {
            i64::from(self.steps)
        };

        match self.direction {
            Direction::Up => StepCount::new(magnitude),
            Direction::Down => StepCount::new(-magnitude),
        }
    }
}

/// The single action of one invocation. Built once from parsed arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrateCommand {
    /// Apply up to `n` up migrations (`0` = all discovered)
    Up(u32),
    /// Revert up to `n` migrations (`0` = all discovered)
    Down(u32),
    /// Report the recorded version and dirty flag
    Version,
    /// Overwrite the recorded version without running SQL (`-1` clears it)
    Force(i64),
    /// Scaffold an empty up/down pair
    Create(String),
}

impl MigrateCommand {
    /// Step request for `Up`/`Down`, `None` for the other commands
    pub fn step_request(&self) -> Option<StepRequest> {
        match self {
            MigrateCommand::Up(n) => Some(StepRequest::up(*n)),
            MigrateCommand::Down(n) => Some(StepRequest::down(*n)),
            _ => None,
        }
    }
}

/// Outcome of a step run that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// At least one step ran; `version` is the recorded version afterwards
    Applied {
        steps: usize,
        version: Option<MigrationVersion>,
    },
    /// No eligible migration existed in the requested direction
    NoChange,
}

/// Lifecycle of a step run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}
