//! Raw transcript persistence.
//!
//! An [`OutputSink`] appends every chunk it observes to a file, byte for
//! byte, with no framing. Each chunk is flushed before the observer call
//! returns, so the file is complete up to the last delivered chunk even if
//! the process is killed.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use vmkit_process::{ObserveResult, OutputObserver, ProcessSupervisor};

use crate::config::{Durability, SinkConfig};
use crate::error::{Result, VmkitError};

/// Append-only transcript of process output.
#[derive(Debug)]
pub struct OutputSink {
    path: PathBuf,
    file: Mutex<File>,
    durability: Durability,
    bytes_written: AtomicU64,
}

impl OutputSink {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| VmkitError::io_context(format!("opening transcript {}", path.display()), e))?;
        tracing::debug!(path = %path.display(), "transcript opened");
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            durability: Durability::default(),
            bytes_written: AtomicU64::new(0),
        })
    }

    /// Set the per-chunk durability.
    #[must_use]
    pub const fn with_durability(mut self, durability: Durability) -> Self {
        self.durability = durability;
        self
    }

    /// Open the configured file and register the sink on `supervisor`.
    pub fn attach(supervisor: &ProcessSupervisor, config: &SinkConfig) -> Result<Arc<Self>> {
        let sink = Arc::new(Self::open(&config.path)?.with_durability(config.durability));
        supervisor.register_observer(Arc::clone(&sink) as Arc<dyn OutputObserver>);
        Ok(sink)
    }

    /// The transcript path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The per-chunk durability.
    #[must_use]
    pub const fn durability(&self) -> Durability {
        self.durability
    }

    /// Bytes appended by this sink.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Acquire)
    }

    /// Append one chunk.
    pub fn write_chunk(&self, chunk: &[u8]) -> std::io::Result<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(chunk)?;
        file.flush()?;
        if self.durability == Durability::Sync {
            file.sync_data()?;
        }
        self.bytes_written.fetch_add(chunk.len() as u64, Ordering::AcqRel);
        Ok(())
    }
}

impl OutputObserver for OutputSink {
    fn observe(&self, chunk: &[u8]) -> ObserveResult {
        self.write_chunk(chunk).map_err(|e| {
            VmkitError::io_context(format!("appending to {}", self.path.display()), e).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("console.log");
        std::fs::write(&path, b"previous run\n").unwrap();

        let sink = OutputSink::open(&path).unwrap();
        sink.write_chunk(b"boot\n").unwrap();
        sink.write_chunk(b"\x1b[0mlogin: ").unwrap();

        assert_eq!(
            std::fs::read(&path).unwrap(),
            b"previous run\nboot\n\x1b[0mlogin: "
        );
        assert_eq!(sink.bytes_written(), 16);
    }

    #[test]
    fn sync_durability_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.log");
        let sink = OutputSink::open(&path)
            .unwrap()
            .with_durability(Durability::Sync);
        assert_eq!(sink.durability(), Durability::Sync);
        sink.observe(b"chunk").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"chunk");
    }

    #[test]
    fn open_in_missing_directory_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = OutputSink::open(dir.path().join("missing/console.log")).unwrap_err();
        assert!(matches!(err, VmkitError::IoWithContext { .. }));
        assert!(err.to_string().contains("opening transcript"));
    }
}
