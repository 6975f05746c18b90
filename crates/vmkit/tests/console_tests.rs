//! Console session tests.

#![cfg(unix)]

use std::time::Duration;

use vmkit::{Console, ConsoleConfig, LineEnding, VmkitError, WatchMatch};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn shell(script: &str) -> ConsoleConfig {
    ConsoleConfig::new("/bin/sh").args(["-c", script])
}

#[tokio::test]
async fn scripted_login() {
    let console = Console::launch(shell(
        "printf 'login: '; read user; printf 'Password: '; read pass; \
         echo \"Welcome, $user\"; printf '# '; read cmd; echo \"ran $cmd\"",
    ))
    .unwrap();

    let greeting = console
        .with_deadline(TEST_TIMEOUT, async {
            console.wait_for("login: ").await?;

            // Queue each expectation before sending the input that provokes it.
            let password = console.wait_for("Password: ");
            console.send_line("root").await?;
            password.await?;

            let welcome = console.wait_for_regex(r"Welcome, (\w+)")?;
            let prompt = console.wait_for("# ");
            console.send_line("hunter2").await?;
            let greeting = welcome.await?;
            prompt.await?;

            let ran = console.wait_for("ran poweroff");
            console.send_line("poweroff").await?;
            ran.await?;
            Ok::<_, VmkitError>(greeting)
        })
        .await
        .unwrap();

    assert_eq!(greeting.group(1), Some(&b"root"[..]));
    let status = console.wait().await.unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn callbacks_type_responses() {
    let console = Console::launch(shell("printf 'continue? [y/N] '; read answer; echo \"answer=$answer\""))
        .unwrap();
    let input = console.input_handle().unwrap();
    console.expect("[y/N] ", move |_: &WatchMatch| {
        let _ = input.queue(b"y\n".to_vec());
    });

    let m = console
        .with_deadline(TEST_TIMEOUT, console.wait_for("answer=y"))
        .await
        .unwrap();
    assert_eq!(m.as_str_lossy(), "answer=y");
}

#[tokio::test]
async fn line_ending_is_configurable() {
    let config = ConsoleConfig::new("cat").line_ending(LineEnding::CrLf);
    let console = Console::launch(config).unwrap();

    let echoed = console.wait_for("ls\r\n");
    console.send_line("ls").await.unwrap();
    let m = console.with_deadline(TEST_TIMEOUT, echoed).await.unwrap();
    assert_eq!(m.offset, 0);
    console.kill().await.unwrap();
}

#[tokio::test]
async fn transcript_is_written_when_configured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.log");
    let console = Console::launch(shell("echo 'Debian GNU/Linux'").output(&path)).unwrap();

    console
        .with_deadline(TEST_TIMEOUT, console.wait_for("GNU/Linux"))
        .await
        .unwrap();
    console.wait().await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"Debian GNU/Linux\n");
    assert_eq!(console.sink().unwrap().bytes_written(), 17);
}

#[tokio::test]
async fn cleared_expectation_reports_closed() {
    let console = Console::launch(ConsoleConfig::new("cat")).unwrap();
    let (result, ()) = tokio::join!(console.wait_for("never"), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        console.watcher().clear();
    });
    assert!(matches!(result, Err(VmkitError::WatchClosed)));
    console.kill().await.unwrap();
}

#[tokio::test]
async fn kill_twice_is_harmless() {
    let console = Console::launch(shell("exec sleep 30")).unwrap();
    let first = console.kill().await.unwrap();
    let second = console.kill().await.unwrap();
    assert_eq!(first, second);
    assert!(!console.is_alive());
}

#[tokio::test]
async fn send_after_exit_is_an_error() {
    let console = Console::launch(shell("exit 0")).unwrap();
    console.wait().await.unwrap();
    assert!(matches!(
        console.send(b"late\n").await,
        Err(VmkitError::Process(_))
    ));
}
