#![cfg(unix)]

mod common;

use common::{assert_quiet, crash, init_tracing, next_event, script, spec};
use grhost::{EventBus, HostEvent, ProcessSupervisor, create_process_manager};
use std::time::Duration;

fn supervisor() -> ProcessSupervisor {
    init_tracing();
    ProcessSupervisor::new(
        create_process_manager(),
        EventBus::default(),
        "GameRenderHost",
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn test_crash_raises_exactly_one_unexpected_exit() {
    let dir = tempfile::tempdir().unwrap();
    let host = script(dir.path(), "crash.sh", "exit 3");
    let supervisor = supervisor();
    let mut events = supervisor.events().subscribe();

    let pid = supervisor.start_process(&spec(&host)).await.unwrap();

    assert_eq!(
        next_event(&mut events).await,
        HostEvent::ProcessExited {
            pid,
            unexpected: true
        }
    );
    assert!(!supervisor.is_tracked(pid));

    // Late re-delivery of the same exit is ignored
    supervisor.on_process_exited(pid);
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_missing_binary_yields_no_process_and_no_event() {
    let dir = tempfile::tempdir().unwrap();
    let supervisor = supervisor();
    let mut events = supervisor.events().subscribe();

    let started = supervisor
        .start_process(&spec(&dir.path().join("absent")))
        .await;

    assert!(started.is_none());
    assert!(supervisor.tracked_processes().is_empty());
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_silent_end_waits_for_exit_without_event() {
    let dir = tempfile::tempdir().unwrap();
    let host = script(dir.path(), "sleeper.sh", "exec sleep 30");
    let supervisor = supervisor();
    let mut events = supervisor.events().subscribe();

    let pid = supervisor.start_process(&spec(&host)).await.unwrap();
    assert!(supervisor.is_tracked(pid));

    supervisor.end_process(pid, false, true).await;

    assert!(!supervisor.is_tracked(pid));
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_notified_end_reports_expected_exit() {
    let dir = tempfile::tempdir().unwrap();
    let host = script(dir.path(), "sleeper.sh", "exec sleep 30");
    let supervisor = supervisor();
    let mut events = supervisor.events().subscribe();

    let pid = supervisor.start_process(&spec(&host)).await.unwrap();
    supervisor.end_process(pid, true, true).await;

    assert_eq!(
        next_event(&mut events).await,
        HostEvent::ProcessExited {
            pid,
            unexpected: false
        }
    );
    assert_quiet(&mut events).await;
}

#[tokio::test]
async fn test_announced_exit_is_expected() {
    let dir = tempfile::tempdir().unwrap();
    let host = script(dir.path(), "sleeper.sh", "exec sleep 30");
    let supervisor = supervisor();
    let mut events = supervisor.events().subscribe();

    let pid = supervisor.start_process(&spec(&host)).await.unwrap();
    supervisor.exiting();
    crash(pid.0);

    assert_eq!(
        next_event(&mut events).await,
        HostEvent::ProcessExited {
            pid,
            unexpected: false
        }
    );
}

#[tokio::test]
async fn test_external_kill_is_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let host = script(dir.path(), "sleeper.sh", "exec sleep 30");
    let supervisor = supervisor();
    let mut events = supervisor.events().subscribe();

    let pid = supervisor.start_process(&spec(&host)).await.unwrap();
    crash(pid.0);

    assert_eq!(
        next_event(&mut events).await,
        HostEvent::ProcessExited {
            pid,
            unexpected: true
        }
    );
}
