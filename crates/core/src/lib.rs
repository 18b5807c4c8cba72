//! # sqlstep-core
//!
//! Configuration and logging shared by the sqlstep crates. Configuration is
//! read from the process environment after the project's `.env.<ENV>` file
//! has been loaded.

pub mod config;
pub mod logging;

pub use config::{
    load_env_file, AppConfigTrait, ConfigError, ConfigSource, DatabaseConfig, LogFormat,
    LoggingConfig, MigrateConfig,
};
pub use logging::init_logging;
