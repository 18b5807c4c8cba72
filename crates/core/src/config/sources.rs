use std::env;

use super::validation::ConfigError;

/// Configuration source information for debugging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Value loaded from environment variable
    EnvVar(String),
    /// Default value used
    Default(String),
    /// Value loaded from nested configuration
    Nested,
}

impl ConfigSource {
    /// Check if source is environment variable
    pub fn is_env_var(&self) -> bool {
        matches!(self, ConfigSource::EnvVar(_))
    }

    /// Check if source is default value
    pub fn is_default(&self) -> bool {
        matches!(self, ConfigSource::Default(_))
    }

    /// Get source description
    pub fn description(&self) -> String {
        match self {
            ConfigSource::EnvVar(var) => format!("Environment variable: {}", var),
            ConfigSource::Default(value) => format!("Default value: {}", value),
            ConfigSource::Nested => "Nested configuration".to_string(),
        }
    }

    /// Source of a variable read with [`get_env_or_default`]
    pub fn of(key: &str, default: &str) -> Self {
        match get_env_optional(key) {
            Some(_) => ConfigSource::EnvVar(key.to_string()),
            None => ConfigSource::Default(default.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// Helper functions for environment variable handling. Empty values count as unset.

pub(crate) fn get_env_required(key: &str) -> Result<String, ConfigError> {
    get_env_optional(key).ok_or_else(|| ConfigError::MissingEnvVar {
        var: key.to_string(),
    })
}

pub(crate) fn get_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

pub(crate) fn get_env_or_default(key: &str, default: &str) -> String {
    match get_env_optional(key) {
        Some(value) => value,
        None => {
            tracing::info!("{} not set. Using default '{}'", key, default);
            default.to_string()
        }
    }
}

pub(crate) fn get_env_parsed<T: std::str::FromStr>(
    key: &str,
    default: Option<&str>,
    expected: &str,
) -> Result<T, ConfigError> {
    let raw = match default {
        Some(default) => get_env_or_default(key, default),
        None => get_env_required(key)?,
    };
    raw.parse::<T>()
        .map_err(|_| ConfigError::invalid_value(key, raw, expected))
}
