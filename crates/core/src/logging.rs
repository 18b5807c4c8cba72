//! Structured logging setup shared by the sqlstep binaries.

use std::io;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{ConfigError, LogFormat, LoggingConfig};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr so
/// command output on stdout stays machine readable.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::Logging {
            message: e.to_string(),
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(Layer::new().with_writer(io::stderr).json())
            .try_init(),
        LogFormat::Pretty => registry
            .with(Layer::new().with_writer(io::stderr).pretty())
            .try_init(),
        LogFormat::Compact => registry
            .with(Layer::new().with_writer(io::stderr).compact())
            .try_init(),
    };

    result.map_err(|e| ConfigError::Logging {
        message: e.to_string(),
    })?;

    tracing::debug!(
        target: "sqlstep::logging",
        "Logging initialized (level: {}, format: {:?})",
        config.level,
        config.format
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        let config = LoggingConfig::default();
        let first = init_logging(&config);
        let second = init_logging(&config);

        // Another test in this binary may already own the global subscriber
        assert!(first.is_ok() || second.is_err());
        assert!(matches!(second, Err(ConfigError::Logging { .. })));
    }
}
