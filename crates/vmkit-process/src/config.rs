//! Configuration for spawning a supervised process.
//!
//! [`ProcessConfig`] carries the argument vector and the piping choices.
//! Arguments are passed through verbatim: no shell quoting, no expansion.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

/// Default read size for the output reader.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default time `wait` lets the reader drain output after the process exits.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for a supervised process.
///
/// # Example
///
/// ```
/// use vmkit_process::ProcessConfig;
///
/// let config = ProcessConfig::new("qemu-system-x86_64")
///     .args(["-nographic", "-m", "256"])
///     .pipe_input(true)
///     .pipe_output(true);
///
/// assert_eq!(config.args.len(), 3);
/// assert!(config.pipe_input);
/// ```
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable to run.
    pub program: String,

    /// Arguments, passed verbatim.
    pub args: Vec<String>,

    /// Whether the child's stdin is a pipe owned by the supervisor.
    /// When false the child inherits the caller's stdin.
    pub pipe_input: bool,

    /// Whether the child's stdout is a pipe read by the supervisor.
    /// When false the child inherits the caller's stdout.
    pub pipe_output: bool,

    /// Maximum number of bytes per read from the child's stdout.
    pub chunk_size: usize,

    /// Additional environment variables, merged over the inherited ones.
    pub env: HashMap<OsString, OsString>,

    /// Working directory for the child process.
    pub working_dir: Option<PathBuf>,

    /// How long `wait` gives the reader to deliver buffered output once
    /// the process has exited.
    pub drain_timeout: Duration,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            pipe_input: false,
            pipe_output: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
            env: HashMap::new(),
            working_dir: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ProcessConfig {
    /// Create a configuration for the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Set the arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set whether stdin is piped.
    #[must_use]
    pub const fn pipe_input(mut self, pipe: bool) -> Self {
        self.pipe_input = pipe;
        self
    }

    /// Set whether stdout is piped.
    #[must_use]
    pub const fn pipe_output(mut self, pipe: bool) -> Self {
        self.pipe_output = pipe;
        self
    }

    /// Set the read chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Set the output drain timeout.
    #[must_use]
    pub const fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// The full argument vector, program first.
    #[must_use]
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_inherit_both_streams() {
        let config = ProcessConfig::new("/bin/true");
        assert!(!config.pipe_input);
        assert!(!config.pipe_output);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.drain_timeout, DEFAULT_DRAIN_TIMEOUT);
    }

    #[test]
    fn builder_accumulates_args() {
        let config = ProcessConfig::new("qemu-system-x86_64")
            .arg("-nographic")
            .arg("-no-reboot")
            .env("LANG", "C")
            .chunk_size(512);

        assert_eq!(config.argv(), vec!["qemu-system-x86_64", "-nographic", "-no-reboot"]);
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.env.get(&OsString::from("LANG")), Some(&OsString::from("C")));
    }

    #[test]
    fn args_replaces_previous() {
        let config = ProcessConfig::new("sh").arg("-x").args(["-c", "true"]);
        assert_eq!(config.args, vec!["-c", "true"]);
    }
}
