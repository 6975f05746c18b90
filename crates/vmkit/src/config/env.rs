//! Environment-based configuration.
//!
//! Variables are read as `<PREFIX>_<NAME>`, e.g. `VMKIT_WINDOW`. Values
//! that are present but unparseable are reported as configuration errors.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::{ConsoleConfig, Durability, LogFormat, SinkConfig};
use crate::error::{Result, VmkitError};

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "VMKIT";

/// Recognised variable names (without prefix).
pub mod vars {
    /// Watcher window in bytes.
    pub const WINDOW: &str = "WINDOW";
    /// Read chunk size in bytes.
    pub const CHUNK_SIZE: &str = "CHUNK_SIZE";
    /// Transcript file path.
    pub const OUTPUT: &str = "OUTPUT";
    /// Transcript durability (`flush` or `sync`).
    pub const OUTPUT_DURABILITY: &str = "OUTPUT_DURABILITY";
    /// Readiness timeout in milliseconds.
    pub const READINESS_TIMEOUT_MS: &str = "READINESS_TIMEOUT_MS";
    /// Readiness retry interval in milliseconds.
    pub const READINESS_INTERVAL_MS: &str = "READINESS_INTERVAL_MS";
    /// Log filter directive.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    /// Log format (`compact`, `pretty`, `json`).
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
    /// Line ending for `send_line` (`lf`, `crlf`, `cr`).
    pub const LINE_ENDING: &str = "LINE_ENDING";
}

/// Where variable values come from.
#[derive(Debug, Clone)]
enum Source {
    Process,
    Fixed(HashMap<String, String>),
}

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Prefix for environment variables.
    prefix: String,
    source: Source,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Read from the process environment with the given prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            source: Source::Process,
        }
    }

    /// Read from a fixed set of variables instead of the process environment.
    ///
    /// Keys are full variable names, prefix included.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            source: Source::Fixed(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        match &self.source {
            Source::Process => std::env::var(&var_name).ok(),
            Source::Fixed(vars) => vars.get(&var_name).cloned(),
        }
    }

    /// Get a parsed value, failing if it is present but malformed.
    pub fn parse<T>(&self, name: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(name)
            .map(|raw| {
                raw.trim().parse().map_err(|e| {
                    VmkitError::config(format!("{}={raw:?}: {e}", self.var_name(name)))
                })
            })
            .transpose()
    }

    /// Get a duration in milliseconds.
    pub fn duration_millis(&self, name: &str) -> Result<Option<Duration>> {
        Ok(self.parse::<u64>(name)?.map(Duration::from_millis))
    }

    /// Check if a variable is set.
    #[must_use]
    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Apply every recognised variable to `config`.
pub(super) fn apply(config: &mut ConsoleConfig, env: &EnvConfig) -> Result<()> {
    if let Some(window) = env.parse(vars::WINDOW)? {
        config.watcher.window = window;
    }
    if let Some(chunk_size) = env.parse(vars::CHUNK_SIZE)? {
        config.process.chunk_size = chunk_size;
    }
    if let Some(path) = env.get(vars::OUTPUT) {
        let durability = config.sink.as_ref().map(|s| s.durability).unwrap_or_default();
        config.sink = Some(SinkConfig::new(PathBuf::from(path)).durability(durability));
    }
    if let Some(durability) = env.parse::<Durability>(vars::OUTPUT_DURABILITY)? {
        match config.sink.as_mut() {
            Some(sink) => sink.durability = durability,
            None => {
                return Err(VmkitError::config(format!(
                    "{} is set but no output path is configured",
                    env.var_name(vars::OUTPUT_DURABILITY)
                )));
            }
        }
    }
    if let Some(timeout) = env.duration_millis(vars::READINESS_TIMEOUT_MS)? {
        config.readiness.timeout = timeout;
    }
    if let Some(interval) = env.duration_millis(vars::READINESS_INTERVAL_MS)? {
        config.readiness.interval = interval;
    }
    if let Some(level) = env.get(vars::LOG_LEVEL) {
        config.logging.level = level;
    }
    if let Some(format) = env.parse::<LogFormat>(vars::LOG_FORMAT)? {
        config.logging.format = format;
    }
    if let Some(line_ending) = env.parse(vars::LINE_ENDING)? {
        config.line_ending = line_ending;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;

    #[test]
    fn env_config_prefix() {
        let config = EnvConfig::new("TEST");
        assert_eq!(config.var_name("foo"), "TEST_FOO");
        assert_eq!(config.var_name("bar_baz"), "TEST_BAR_BAZ");
    }

    #[test]
    fn env_config_no_prefix() {
        let config = EnvConfig::new("");
        assert_eq!(config.var_name("foo"), "FOO");
    }

    #[test]
    fn fixed_vars_are_read() {
        let env = EnvConfig::from_vars("VMKIT", [("VMKIT_WINDOW", "2048")]);
        assert_eq!(env.parse::<usize>(vars::WINDOW).unwrap(), Some(2048));
        assert!(env.is_set(vars::WINDOW));
        assert!(!env.is_set(vars::CHUNK_SIZE));
    }

    #[test]
    fn malformed_value_is_an_error() {
        let env = EnvConfig::from_vars("VMKIT", [("VMKIT_WINDOW", "big")]);
        let err = env.parse::<usize>(vars::WINDOW).unwrap_err();
        assert!(err.to_string().contains("VMKIT_WINDOW"));
    }

    #[test]
    fn apply_overrides_config() {
        let env = EnvConfig::from_vars(
            "VMKIT",
            [
                ("VMKIT_WINDOW", "4096"),
                ("VMKIT_CHUNK_SIZE", "512"),
                ("VMKIT_OUTPUT", "/var/log/vm.log"),
                ("VMKIT_OUTPUT_DURABILITY", "sync"),
                ("VMKIT_READINESS_TIMEOUT_MS", "1500"),
                ("VMKIT_READINESS_INTERVAL_MS", "100"),
                ("VMKIT_LOG_LEVEL", "vmkit=debug"),
                ("VMKIT_LOG_FORMAT", "json"),
                ("VMKIT_LINE_ENDING", "cr"),
            ],
        );
        let mut config = ConsoleConfig::new("qemu-system-x86_64");
        config.apply_env(&env).unwrap();

        assert_eq!(config.watcher.window, 4096);
        assert_eq!(config.process.chunk_size, 512);
        let sink = config.sink.unwrap();
        assert_eq!(sink.path, PathBuf::from("/var/log/vm.log"));
        assert_eq!(sink.durability, Durability::Sync);
        assert_eq!(config.readiness.timeout, Duration::from_millis(1500));
        assert_eq!(config.readiness.interval, Duration::from_millis(100));
        assert_eq!(config.logging.level, "vmkit=debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.line_ending, LineEnding::Cr);
    }

    #[test]
    fn durability_without_output_is_rejected() {
        let env = EnvConfig::from_vars("VMKIT", [("VMKIT_OUTPUT_DURABILITY", "sync")]);
        let mut config = ConsoleConfig::new("sh");
        assert!(config.apply_env(&env).is_err());
    }

    #[test]
    fn empty_environment_changes_nothing() {
        let env = EnvConfig::from_vars("VMKIT", Vec::<(String, String)>::new());
        let mut config = ConsoleConfig::new("sh");
        config.apply_env(&env).unwrap();
        assert_eq!(config.watcher.window, crate::config::DEFAULT_WINDOW);
        assert!(config.sink.is_none());
    }
}
