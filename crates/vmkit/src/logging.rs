//! Logging initialisation.
//!
//! The library itself only emits `tracing` events. Binaries and tests that
//! want to see them call [`init`] once; `RUST_LOG` takes precedence over the
//! configured level.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Result, VmkitError};

/// Build the filter: `RUST_LOG` if set and valid, otherwise `config.level`.
pub fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| VmkitError::config(format!("invalid log level '{}': {e}", config.level)))
}

/// Install the global tracing subscriber, writing to stderr.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.map_err(|e| VmkitError::config(format!("installing log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_a_config_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig::new().level("vmkit=loudest");
        assert!(matches!(filter(&config), Err(VmkitError::Config { .. })));
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let config = LoggingConfig::new().level("warn");
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
