//! Readiness polling tests.

#![cfg(unix)]

use std::net::TcpListener;
use std::time::{Duration, Instant};

use vmkit::{ProcessSupervisor, ReadinessProbe};

/// A loopback port with nothing listening on it.
fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn timeout_fires_on_time_and_kills_the_process() {
    let supervisor = ProcessSupervisor::new();
    supervisor
        .start_with("/bin/sh", ["-c", "exec sleep 30"], false, false)
        .unwrap();

    let probe = ReadinessProbe::new(closed_port(), Duration::from_secs(1));
    let started = Instant::now();
    let err = probe.wait(&supervisor).await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(err.is_timeout());
    assert_eq!(err.timeout_duration(), Some(Duration::from_secs(1)));
    assert!(elapsed >= Duration::from_secs(1), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1800), "returned late: {elapsed:?}");
    assert!(!supervisor.is_alive());
    assert!(supervisor.exit_status().is_some());
}

#[tokio::test]
async fn listening_port_is_ready_immediately() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let probe = ReadinessProbe::new(addr.to_string(), Duration::from_secs(5));
    let elapsed = probe.poll().await.unwrap();
    assert!(elapsed < Duration::from_secs(1));
}

#[tokio::test]
async fn port_that_opens_later_is_detected() {
    let std_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    drop(std_listener);

    let opener = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        drop(listener);
    });

    let probe = ReadinessProbe::new(addr.to_string(), Duration::from_secs(5))
        .interval(Duration::from_millis(50));
    let elapsed = probe.poll().await.unwrap();
    assert!(elapsed >= Duration::from_millis(400));
    opener.abort();
}
