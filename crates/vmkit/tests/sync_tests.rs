//! Blocking console tests.

#![cfg(unix)]

use std::time::Duration;

use vmkit::{ConsoleConfig, SyncConsole};

#[test]
fn blocking_round_trip() {
    let console = SyncConsole::launch(ConsoleConfig::new("cat")).unwrap();
    let echoed = console.console().wait_for("from sync");
    console.send_line("hello from sync").unwrap();
    let m = console.wait_pending(echoed, Duration::from_secs(10)).unwrap();
    assert_eq!(m.offset, 6);
    console.kill().unwrap();
    assert!(!console.console().is_alive());
}

#[test]
fn output_is_matched_between_calls() {
    let console = SyncConsole::launch(
        ConsoleConfig::new("/bin/sh").args(["-c", "echo first; sleep 0.2; echo second"]),
    )
    .unwrap();

    // Give the process time to finish while no call is blocking.
    std::thread::sleep(Duration::from_millis(600));
    assert!(console.console().watcher().retained_len() > 0);
    console.wait().unwrap();
}

#[test]
fn wait_for_within_times_out_and_kills() {
    let console =
        SyncConsole::launch(ConsoleConfig::new("/bin/sh").args(["-c", "exec sleep 30"])).unwrap();
    let err = console
        .wait_for_within("login:", Duration::from_millis(300))
        .unwrap_err();
    assert!(err.is_timeout());
    assert!(!console.console().is_alive());
}
