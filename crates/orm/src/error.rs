//! Error types for the migration system
//!
//! Discovery errors are raised before the database is touched. Execution
//! errors carry the version and step at which the run stopped so an operator
//! can inspect the schema and `force` the recorded version.

use std::path::PathBuf;

use crate::migrations::definitions::{Direction, MigrationVersion};

/// Migration result type alias
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Error types for migration operations
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to walk migrations directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Migrations directory {} does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Malformed migration version '{token}' in {}", path.display())]
    MalformedVersion { path: PathBuf, token: String },

    #[error("Duplicate {direction} migration for version {version}: {first} and {second}")]
    DuplicateVersion {
        version: MigrationVersion,
        direction: Direction,
        first: String,
        second: String,
    },

    #[error("Failed to read migration file {}: {source}", path.display())]
    UnreadableMigration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No {direction} migration found for version {version}")]
    MissingMigration {
        version: MigrationVersion,
        direction: Direction,
    },

    #[error("Cannot run {requested} steps against a catalog of {catalog} migrations")]
    DirectionMismatch {
        requested: Direction,
        catalog: Direction,
    },

    #[error(
        "Database is dirty at version {}; fix the schema and force a version",
        display_version(.version)
    )]
    Dirty { version: Option<MigrationVersion> },

    #[error("Migration {version} ({identifier}) failed at step {step}: {source}")]
    StepFailed {
        version: MigrationVersion,
        step: usize,
        identifier: String,
        #[source]
        source: Box<MigrateError>,
    },

    #[error("Version {0} does not fit the version table")]
    VersionOutOfRange(MigrationVersion),

    #[error("Invalid force version {0}; expected a non-negative version or -1")]
    InvalidForceVersion(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Scaffold error: {0}")]
    Scaffold(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] sqlstep_core::ConfigError),
}

fn display_version(version: &Option<MigrationVersion>) -> String {
    match version {
        Some(version) => version.to_string(),
        None => "<none>".to_string(),
    }
}

impl MigrateError {
    /// Whether the error left the version store marked dirty
    pub fn is_dirty(&self) -> bool {
        matches!(self, MigrateError::StepFailed { .. } | MigrateError::Dirty { .. })
    }
}
