//! Configuration types for vmkit.
//!
//! A [`ConsoleConfig`] aggregates everything a [`Console`](crate::Console)
//! needs: the process to spawn, the watcher window, an optional transcript
//! sink, readiness polling and logging. It can be built in code, loaded
//! from a TOML file ([`file`]) and overridden from the environment
//! ([`env`]).

pub mod env;
pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use vmkit_process::ProcessConfig;

use crate::error::{Result, VmkitError};

pub use env::EnvConfig;

/// Default retained window for the stream watcher (bytes).
pub const DEFAULT_WINDOW: usize = 1024;

/// Default backoff between readiness connection attempts.
pub const DEFAULT_READINESS_INTERVAL: Duration = Duration::from_millis(300);

/// Default overall readiness timeout.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(10);

/// Default log filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for a console session.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// The process to spawn.
    pub process: ProcessConfig,

    /// Stream watcher configuration.
    pub watcher: WatcherConfig,

    /// Transcript sink, if output should be persisted.
    pub sink: Option<SinkConfig>,

    /// Readiness polling configuration.
    pub readiness: ReadinessConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Line ending appended by `send_line`.
    pub line_ending: LineEnding,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            process: ProcessConfig::default().pipe_input(true).pipe_output(true),
            watcher: WatcherConfig::default(),
            sink: None,
            readiness: ReadinessConfig::default(),
            logging: LoggingConfig::default(),
            line_ending: LineEnding::default(),
        }
    }
}

impl ConsoleConfig {
    /// Create a configuration that runs `program` with both streams piped.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.process.program = program.into();
        config
    }

    /// Set the program arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process = self.process.args(args);
        self
    }

    /// Replace the process configuration.
    #[must_use]
    pub fn process(mut self, process: ProcessConfig) -> Self {
        self.process = process;
        self
    }

    /// Set the watcher window.
    #[must_use]
    pub const fn window(mut self, window: usize) -> Self {
        self.watcher.window = window;
        self
    }

    /// Persist output to `path`.
    #[must_use]
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.sink = Some(SinkConfig::new(path));
        self
    }

    /// Set the transcript sink configuration.
    #[must_use]
    pub fn sink(mut self, sink: SinkConfig) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Set the readiness configuration.
    #[must_use]
    pub const fn readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    /// Set the logging configuration.
    #[must_use]
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Set the line ending used by `send_line`.
    #[must_use]
    pub const fn line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.process.program.trim().is_empty() {
            return Err(VmkitError::config("process program must not be empty"));
        }
        if self.process.chunk_size == 0 {
            return Err(VmkitError::config("process chunk size must be at least 1 byte"));
        }
        if self.watcher.window == 0 {
            return Err(VmkitError::config("watcher window must be at least 1 byte"));
        }
        if self.readiness.interval.is_zero() {
            return Err(VmkitError::config("readiness interval must be non-zero"));
        }
        Ok(())
    }

    /// Apply overrides from the environment.
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<()> {
        env::apply(self, env)
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        file::parse(content)
    }

    /// Load a TOML configuration file.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self> {
        file::load(path.as_ref())
    }
}

/// Configuration for the stream watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    /// Maximum number of unconsumed bytes carried across chunks.
    pub window: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

/// How hard the output sink pushes each chunk to storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Flush the file after every chunk.
    #[default]
    Flush,
    /// Flush and `fdatasync` after every chunk.
    Sync,
}

impl FromStr for Durability {
    type Err = VmkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "flush" => Ok(Self::Flush),
            "sync" => Ok(Self::Sync),
            other => Err(VmkitError::config(format!("unknown durability '{other}'"))),
        }
    }
}

/// Configuration for the transcript sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// File the raw output is appended to.
    pub path: PathBuf,
    /// Durability per chunk.
    pub durability: Durability,
}

impl SinkConfig {
    /// Append to `path`, flushing every chunk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            durability: Durability::default(),
        }
    }

    /// Set the durability.
    #[must_use]
    pub const fn durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }
}

/// Configuration for readiness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessConfig {
    /// Backoff between connection attempts.
    pub interval: Duration,
    /// Overall deadline.
    pub timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_READINESS_INTERVAL,
            timeout: DEFAULT_READINESS_TIMEOUT,
        }
    }
}

impl ReadinessConfig {
    /// Create a readiness configuration with the given timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Set the retry interval.
    #[must_use]
    pub const fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Configuration for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Create a new logging configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter directive.
    #[must_use]
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the log format.
    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Log format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// Multi-line human readable output.
    Pretty,
    /// Newline-delimited JSON.
    Json,
}

impl FromStr for LogFormat {
    type Err = VmkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" | "ndjson" => Ok(Self::Json),
            other => Err(VmkitError::config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Line ending styles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Unix-style line ending (LF).
    #[default]
    Lf,

    /// Windows-style line ending (CRLF).
    CrLf,

    /// Carriage return only, as typed on a serial console.
    Cr,
}

impl LineEnding {
    /// The line ending as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::CrLf => "\r\n",
            Self::Cr => "\r",
        }
    }
}

impl fmt::Display for LineEnding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lf => "lf",
            Self::CrLf => "crlf",
            Self::Cr => "cr",
        };
        f.write_str(name)
    }
}

impl FromStr for LineEnding {
    type Err = VmkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lf" => Ok(Self::Lf),
            "crlf" => Ok(Self::CrLf),
            "cr" => Ok(Self::Cr),
            other => Err(VmkitError::config(format!("unknown line ending '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pipes_both_streams() {
        let config = ConsoleConfig::new("qemu-system-x86_64");
        assert!(config.process.pipe_input);
        assert!(config.process.pipe_output);
        assert_eq!(config.watcher.window, DEFAULT_WINDOW);
        assert_eq!(config.readiness.interval, Duration::from_millis(300));
        assert!(config.sink.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unusable_values() {
        assert!(ConsoleConfig::default().validate().is_err());
        assert!(ConsoleConfig::new("sh").window(0).validate().is_err());

        let mut config = ConsoleConfig::new("sh");
        config.process.chunk_size = 0;
        assert!(config.validate().is_err());

        let config = ConsoleConfig::new("sh")
            .readiness(ReadinessConfig::new(Duration::from_secs(1)).interval(Duration::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_sets_sink() {
        let config = ConsoleConfig::new("sh")
            .sink(SinkConfig::new("/tmp/console.log").durability(Durability::Sync));
        let sink = config.sink.unwrap();
        assert_eq!(sink.path, PathBuf::from("/tmp/console.log"));
        assert_eq!(sink.durability, Durability::Sync);
    }

    #[test]
    fn line_endings() {
        assert_eq!(LineEnding::Lf.as_str(), "\n");
        assert_eq!(LineEnding::CrLf.as_str(), "\r\n");
        assert_eq!("CR".parse::<LineEnding>().unwrap(), LineEnding::Cr);
        assert_eq!(LineEnding::CrLf.to_string(), "crlf");
        assert!("vt100".parse::<LineEnding>().is_err());
    }

    #[test]
    fn parse_enums() {
        assert_eq!("ndjson".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("sync".parse::<Durability>().unwrap(), Durability::Sync);
        assert!("loud".parse::<LogFormat>().is_err());
    }
}
