use sqlstep_core::ConfigError;
use sqlstep_orm::MigrateError;

/// Errors surfaced by the CLI; every variant ends the process with exit code 1
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Migrate(#[from] MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
