//! File-based configuration loading.
//!
//! Configuration files are TOML. Every section and key is optional; missing
//! values keep their defaults. Durations are given in milliseconds.
//!
//! ```toml
//! [process]
//! program = "qemu-system-x86_64"
//! args = ["-nographic", "-m", "256"]
//! chunk_size = 1024
//! line_ending = "cr"
//!
//! [watcher]
//! window = 1024
//!
//! [sink]
//! path = "console.log"
//! durability = "sync"
//!
//! [readiness]
//! interval_ms = 300
//! timeout_ms = 10000
//!
//! [logging]
//! level = "vmkit=debug"
//! format = "json"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::{ConsoleConfig, Durability, LineEnding, LogFormat, SinkConfig};
use crate::error::{Result, VmkitError};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct FileConfig {
    process: ProcessSection,
    watcher: WatcherSection,
    sink: Option<SinkSection>,
    readiness: ReadinessSection,
    logging: LoggingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct ProcessSection {
    program: Option<String>,
    args: Option<Vec<String>>,
    pipe_input: Option<bool>,
    pipe_output: Option<bool>,
    chunk_size: Option<usize>,
    env: HashMap<String, String>,
    working_dir: Option<PathBuf>,
    drain_timeout_ms: Option<u64>,
    line_ending: Option<LineEnding>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct WatcherSection {
    window: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SinkSection {
    path: PathBuf,
    #[serde(default)]
    durability: Durability,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct ReadinessSection {
    interval_ms: Option<u64>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct LoggingSection {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl FileConfig {
    fn into_config(self) -> ConsoleConfig {
        let mut config = ConsoleConfig::default();

        let process = self.process;
        if let Some(program) = process.program {
            config.process.program = program;
        }
        if let Some(args) = process.args {
            config.process.args = args;
        }
        if let Some(pipe_input) = process.pipe_input {
            config.process.pipe_input = pipe_input;
        }
        if let Some(pipe_output) = process.pipe_output {
            config.process.pipe_output = pipe_output;
        }
        if let Some(chunk_size) = process.chunk_size {
            config.process.chunk_size = chunk_size;
        }
        config.process.env.extend(
            process
                .env
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        if process.working_dir.is_some() {
            config.process.working_dir = process.working_dir;
        }
        if let Some(ms) = process.drain_timeout_ms {
            config.process.drain_timeout = Duration::from_millis(ms);
        }
        if let Some(line_ending) = process.line_ending {
            config.line_ending = line_ending;
        }

        if let Some(window) = self.watcher.window {
            config.watcher.window = window;
        }

        config.sink = self
            .sink
            .map(|sink| SinkConfig::new(sink.path).durability(sink.durability));

        if let Some(ms) = self.readiness.interval_ms {
            config.readiness.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.readiness.timeout_ms {
            config.readiness.timeout = Duration::from_millis(ms);
        }

        if let Some(level) = self.logging.level {
            config.logging.level = level;
        }
        if let Some(format) = self.logging.format {
            config.logging.format = format;
        }

        config
    }
}

/// Parse a TOML document into a configuration.
pub(super) fn parse(content: &str) -> Result<ConsoleConfig> {
    let file: FileConfig =
        toml::from_str(content).map_err(|e| VmkitError::config(e.to_string()))?;
    Ok(file.into_config())
}

/// Read and parse a TOML configuration file.
pub(super) fn load(path: &Path) -> Result<ConsoleConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| VmkitError::io_context(format!("reading {}", path.display()), e))?;
    tracing::debug!(path = %path.display(), "loaded configuration file");
    parse(&content)
}
