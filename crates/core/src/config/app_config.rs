use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use url::Url;

use super::sources::{
    get_env_optional, get_env_or_default, get_env_parsed, get_env_required, ConfigSource,
};
use super::validation::{is_plain_identifier, ConfigError};

pub const DEFAULT_ENV: &str = "prod";
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";
pub const DEFAULT_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Configuration trait for application configuration
pub trait AppConfigTrait: Sized {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self, ConfigError>;

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError>;

    /// Get configuration source information for debugging
    fn config_sources(&self) -> HashMap<String, ConfigSource>;
}

/// Project root: `PROJECT_ROOT`, or the current directory.
pub fn project_root() -> Result<PathBuf, ConfigError> {
    match get_env_optional("PROJECT_ROOT") {
        Some(root) => Ok(PathBuf::from(root)),
        None => Ok(env::current_dir()?),
    }
}

/// Path of the env file for the active environment: `<root>/.env.<ENV>`.
pub fn env_file_path(root: &Path) -> PathBuf {
    let environment = get_env_optional("ENV").unwrap_or_else(|| DEFAULT_ENV.to_string());
    root.join(format!(".env.{}", environment))
}

/// Load `<PROJECT_ROOT>/.env.<ENV>` into the process environment.
///
/// Variables already present in the environment win over the file.
pub fn load_env_file() -> Result<PathBuf, ConfigError> {
    let path = env_file_path(&project_root()?);
    dotenvy::from_path(&path).map_err(|e| ConfigError::EnvFile {
        path: path.clone(),
        message: e.to_string(),
    })?;
    Ok(path)
}

/// Top-level configuration of the migrate tool
#[derive(Debug, Clone)]
pub struct MigrateConfig {
    pub project_root: PathBuf,
    pub database: DatabaseConfig,
    pub migrations_dir: PathBuf,
    pub migrations_table: String,
    pub logging: LoggingConfig,
}

/// Connection parameters for the target database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub sslmode: String,
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection
    pub acquire_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::invalid_value(
                "LOG_FORMAT",
                s,
                "compact, pretty, or json",
            )),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl DatabaseConfig {
    /// Connection URL with percent-encoded credentials.
    pub fn url(&self) -> Result<Url, ConfigError> {
        let base = format!("postgresql://{}:{}/{}", self.host, self.port, self.name);
        let mut url = Url::parse(&base)
            .map_err(|e| ConfigError::invalid_value("DB_HOST", &self.host, e.to_string()))?;

        url.set_username(&self.user)
            .map_err(|_| ConfigError::invalid_value("DB_USER", &self.user, "a valid user name"))?;
        url.set_password(Some(&self.password))
            .map_err(|_| ConfigError::invalid_value("DB_PASS", "***", "a valid password"))?;
        url.query_pairs_mut().append_pair("sslmode", &self.sslmode);

        Ok(url)
    }

    /// Connection URL safe for logs
    pub fn masked_url(&self) -> String {
        match self.url() {
            Ok(mut url) => {
                let _ = url.set_password(Some("***"));
                url.to_string()
            }
            Err(_) => format!(
                "postgresql://{}@{}:{}/{}",
                self.user, self.host, self.port, self.name
            ),
        }
    }
}

impl AppConfigTrait for MigrateConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let project_root = project_root()?;
        let database = DatabaseConfig::from_env()?;
        let migrations_dir =
            PathBuf::from(get_env_or_default("MIGRATIONS_DIR", DEFAULT_MIGRATIONS_DIR));
        let migrations_table = get_env_or_default("MIGRATIONS_TABLE", DEFAULT_MIGRATIONS_TABLE);
        let logging = LoggingConfig::from_env()?;

        let config = MigrateConfig {
            project_root,
            database,
            migrations_dir,
            migrations_table,
            logging,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.migrations_dir.as_os_str().is_empty() {
            return Err(ConfigError::validation_failed(
                "MIGRATIONS_DIR",
                "Migrations directory cannot be empty",
            ));
        }

        if !is_plain_identifier(&self.migrations_table) {
            return Err(ConfigError::invalid_value(
                "MIGRATIONS_TABLE",
                &self.migrations_table,
                "a plain SQL identifier",
            ));
        }

        self.database.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert(
            "project_root".to_string(),
            ConfigSource::of("PROJECT_ROOT", "current directory"),
        );
        sources.insert("database".to_string(), ConfigSource::Nested);
        sources.insert(
            "migrations_dir".to_string(),
            ConfigSource::of("MIGRATIONS_DIR", DEFAULT_MIGRATIONS_DIR),
        );
        sources.insert(
            "migrations_table".to_string(),
            ConfigSource::of("MIGRATIONS_TABLE", DEFAULT_MIGRATIONS_TABLE),
        );
        sources.insert("logging".to_string(), ConfigSource::Nested);
        sources
    }
}

impl AppConfigTrait for DatabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(DatabaseConfig {
            user: get_env_required("DB_USER")?,
            password: get_env_required("DB_PASS")?,
            name: get_env_required("DB_NAME")?,
            host: get_env_or_default("DB_HOST", "localhost"),
            port: get_env_parsed("DB_PORT", None, "an integer port (1-65535)")?,
            sslmode: get_env_or_default("DB_SSLMODE", "disable"),
            max_connections: get_env_parsed(
                "DB_MAX_CONNECTIONS",
                Some("2"),
                "a positive integer",
            )?,
            acquire_timeout: get_env_parsed(
                "DB_ACQUIRE_TIMEOUT",
                Some("30"),
                "seconds as an integer",
            )?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation_failed("DB_PORT", "Port cannot be 0"));
        }

        let valid_modes = ["disable", "allow", "prefer", "require", "verify-ca", "verify-full"];
        if !valid_modes.contains(&self.sslmode.as_str()) {
            return Err(ConfigError::invalid_value(
                "DB_SSLMODE",
                &self.sslmode,
                "disable, allow, prefer, require, verify-ca, or verify-full",
            ));
        }

        // A run holds one connection for its advisory lock
        if self.max_connections == 0 {
            return Err(ConfigError::validation_failed(
                "DB_MAX_CONNECTIONS",
                "At least one connection is required",
            ));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        let required = [
            ("user", "DB_USER"),
            ("password", "DB_PASS"),
            ("name", "DB_NAME"),
            ("port", "DB_PORT"),
        ];
        for (field, var) in required {
            sources.insert(field.to_string(), ConfigSource::EnvVar(var.to_string()));
        }
        sources.insert("host".to_string(), ConfigSource::of("DB_HOST", "localhost"));
        sources.insert("sslmode".to_string(), ConfigSource::of("DB_SSLMODE", "disable"));
        sources.insert(
            "max_connections".to_string(),
            ConfigSource::of("DB_MAX_CONNECTIONS", "2"),
        );
        sources.insert(
            "acquire_timeout".to_string(),
            ConfigSource::of("DB_ACQUIRE_TIMEOUT", "30"),
        );
        sources
    }
}

impl AppConfigTrait for LoggingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let level = get_env_optional("LOG_LEVEL").unwrap_or_else(|| "info".to_string());
        let format = match get_env_optional("LOG_FORMAT") {
            Some(format) => format.parse()?,
            None => LogFormat::Compact,
        };

        Ok(LoggingConfig { level, format })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::invalid_value(
                "LOG_LEVEL",
                &self.level,
                "trace, debug, info, warn, or error",
            ));
        }

        Ok(())
    }

    fn config_sources(&self) -> HashMap<String, ConfigSource> {
        let mut sources = HashMap::new();
        sources.insert("level".to_string(), ConfigSource::of("LOG_LEVEL", "info"));
        sources.insert("format".to_string(), ConfigSource::of("LOG_FORMAT", "compact"));
        sources
    }
}
