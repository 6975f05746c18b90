//! Stream watcher tests against real processes.

#![cfg(unix)]

use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use vmkit::{InputHandle, ProcessSupervisor, StreamWatcher, WatchMatch};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn prompts_are_answered_in_order() {
    let supervisor = ProcessSupervisor::new();
    let watcher = StreamWatcher::attach(&supervisor, 1024);

    // Expectations go in before start so no prompt can slip past them.
    let input: Arc<OnceLock<InputHandle>> = Arc::new(OnceLock::new());
    for (prompt, answer) in [("login: ", &b"admin\n"[..]), ("password: ", &b"secret\n"[..])] {
        let input = Arc::clone(&input);
        watcher.expect(prompt, move |_: &WatchMatch| {
            input.get().unwrap().queue(answer.to_vec()).unwrap();
        });
    }
    let greeting = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&greeting);
    watcher
        .expect_regex(r"welcome (\w+)/(\w+)", move |m: &WatchMatch| {
            *slot.lock().unwrap() = Some((m.group(1).unwrap().to_vec(), m.group(2).unwrap().to_vec()));
        })
        .unwrap();

    supervisor
        .start_with(
            "/bin/sh",
            [
                "-c",
                "printf 'login: '; read user; printf 'password: '; read pass; echo \"welcome $user/$pass\"",
            ],
            true,
            true,
        )
        .unwrap();
    input.set(supervisor.input_handle().unwrap()).unwrap();

    tokio::time::timeout(TEST_TIMEOUT, supervisor.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        greeting.lock().unwrap().clone(),
        Some((b"admin".to_vec(), b"secret".to_vec()))
    );
    assert_eq!(watcher.pending(), 0);
    assert_eq!(watcher.matches_fired(), 3);
}

#[tokio::test]
async fn callback_can_kill_the_process() {
    let supervisor = ProcessSupervisor::new();
    let watcher = StreamWatcher::attach(&supervisor, 256);
    let kill = supervisor.kill_switch();
    watcher.expect("Kernel panic", move |_: &WatchMatch| kill.kill());

    supervisor
        .start_with(
            "/bin/sh",
            ["-c", "echo booting; echo 'Kernel panic - not syncing'; exec sleep 30"],
            false,
            true,
        )
        .unwrap();

    let status = tokio::time::timeout(TEST_TIMEOUT, supervisor.wait())
        .await
        .expect("callback kill did not stop the process")
        .unwrap();
    assert!(!status.success());
}

#[tokio::test]
async fn small_reads_still_match_across_boundaries() {
    let supervisor = ProcessSupervisor::new();
    let watcher = StreamWatcher::attach(&supervisor, 32);
    let fired = Arc::new(Mutex::new(Vec::new()));
    for prompt in ["Partition disks", "Installation complete"] {
        let fired = Arc::clone(&fired);
        watcher.expect(prompt, move |m: &WatchMatch| {
            fired.lock().unwrap().push(m.as_str_lossy());
        });
    }

    let config = vmkit::ProcessConfig::new("/bin/sh")
        .args([
            "-c",
            "echo 'Detecting hardware... Partition disks ... Installing ... Installation complete'",
        ])
        .pipe_output(true)
        .chunk_size(3);
    supervisor.start(&config).unwrap();
    tokio::time::timeout(TEST_TIMEOUT, supervisor.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        *fired.lock().unwrap(),
        ["Partition disks", "Installation complete"]
    );
}

#[tokio::test]
async fn unmatched_expectation_stays_parked() {
    let supervisor = ProcessSupervisor::new();
    let watcher = StreamWatcher::attach(&supervisor, 64);
    watcher.expect("never printed", |_: &WatchMatch| {});
    supervisor
        .start_with("/bin/sh", ["-c", "echo something else"], false, true)
        .unwrap();
    tokio::time::timeout(TEST_TIMEOUT, supervisor.wait())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(watcher.pending(), 1);
    assert_eq!(watcher.matches_fired(), 0);
    assert!(watcher.retained_len() <= 64);
}
