//! Transcript sink tests.

#![cfg(unix)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use vmkit::{Durability, OutputSink, ProcessSupervisor, SinkConfig};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn transcript_is_byte_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("console.log");

    let supervisor = ProcessSupervisor::new();
    let sink = OutputSink::attach(&supervisor, &SinkConfig::new(&path)).unwrap();
    supervisor
        .start_with(
            "/bin/sh",
            ["-c", "printf 'SeaBIOS\\r\\n\\033[2J\\377boot: '"],
            false,
            true,
        )
        .unwrap();
    tokio::time::timeout(TEST_TIMEOUT, supervisor.wait())
        .await
        .unwrap()
        .unwrap();

    let expected = b"SeaBIOS\r\n\x1b[2J\xffboot: ";
    assert_eq!(std::fs::read(&path).unwrap(), expected);
    assert_eq!(sink.bytes_written(), expected.len() as u64);
}

#[tokio::test]
async fn sink_runs_before_later_observers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ordered.log");

    let supervisor = ProcessSupervisor::new();
    OutputSink::attach(&supervisor, &SinkConfig::new(&path).durability(Durability::Sync)).unwrap();

    // Every chunk must already be on disk when the next observer sees it.
    let mismatches = Arc::new(Mutex::new(0usize));
    let seen = Arc::new(Mutex::new(0usize));
    let (check_path, mismatch_log, seen_log) =
        (path.clone(), Arc::clone(&mismatches), Arc::clone(&seen));
    supervisor.register_observer(Arc::new(move |chunk: &[u8]| {
        let mut seen = seen_log.lock().unwrap();
        *seen += chunk.len();
        let on_disk = std::fs::metadata(&check_path).map(|m| m.len()).unwrap_or(0);
        if on_disk as usize != *seen {
            *mismatch_log.lock().unwrap() += 1;
        }
    }));

    let config = vmkit::ProcessConfig::new("/bin/sh")
        .args(["-c", "for i in 1 2 3 4 5; do echo line $i; done"])
        .pipe_output(true)
        .chunk_size(4);
    supervisor.start(&config).unwrap();
    tokio::time::timeout(TEST_TIMEOUT, supervisor.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), 35);
    assert_eq!(*mismatches.lock().unwrap(), 0);
}

#[tokio::test]
async fn transcript_survives_kill() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("killed.log");

    let supervisor = ProcessSupervisor::new();
    let sink = OutputSink::attach(&supervisor, &SinkConfig::new(&path)).unwrap();
    supervisor
        .start_with("/bin/sh", ["-c", "echo 'last words'; exec sleep 30"], false, true)
        .unwrap();

    tokio::time::timeout(TEST_TIMEOUT, async {
        while sink.bytes_written() < 11 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    supervisor.kill().await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"last words\n");
}
