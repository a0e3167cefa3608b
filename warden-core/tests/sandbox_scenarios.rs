//! End-to-end behaviour of the sandbox facade against a real shell.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sysinfo::System;
use tempfile::TempDir;
use tokio::task::JoinSet;
use warden_config::{BackendConfig, LocalBackendConfig, WorkspaceConfig};
use warden_core::{ErrorCode, Sandbox, SandboxError, WorkspaceManager};

fn manager(temp: &TempDir) -> Arc<WorkspaceManager> {
    Arc::new(WorkspaceManager::new(WorkspaceConfig::with_root(temp.path())).expect("manager"))
}

fn sandbox_with(manager: Arc<WorkspaceManager>, config: LocalBackendConfig) -> Sandbox {
    Sandbox::new(BackendConfig::Local(config), manager).expect("sandbox")
}

fn sandbox_for(temp: &TempDir, user_id: &str) -> Sandbox {
    sandbox_with(manager(temp), LocalBackendConfig::for_user(user_id))
}

#[tokio::test]
async fn echo_returns_trimmed_stdout() {
    let temp = TempDir::new().expect("tempdir");
    let sandbox = sandbox_for(&temp, "alice");

    assert_eq!(sandbox.exec("echo hello").await.expect("exec"), "hello");
}

#[tokio::test]
async fn destructive_command_is_blocked_before_running() {
    let temp = TempDir::new().expect("tempdir");
    let sandbox = sandbox_for(&temp, "alice");

    let err = sandbox.exec("rm -rf /").await.expect_err("must be blocked");
    assert_eq!(err.code(), ErrorCode::DangerousOperation);
    match &err {
        SandboxError::SafetyViolation { reason, command } => {
            assert!(reason.contains(r"rm\s+-rf\s+/"), "{reason}");
            assert_eq!(command, "rm -rf /");
        }
        other => panic!("unexpected error: {other}"),
    }

    let log = sandbox.audit_log().await;
    assert_eq!(log.len(), 1);
    assert!(!log[0].allowed);
}

#[tokio::test]
async fn files_round_trip_and_cannot_escape() {
    let temp = TempDir::new().expect("tempdir");
    let sandbox = sandbox_for(&temp, "alice");

    sandbox.write("a.txt", "payload").await.expect("write");
    assert_eq!(sandbox.read("a.txt").await.expect("read"), "payload");
    assert_eq!(sandbox.exec("cat a.txt").await.expect("exec"), "payload");

    let err = sandbox
        .write("../b.txt", "escape")
        .await
        .expect_err("escape must fail");
    assert!(matches!(err, SandboxError::PathViolation { .. }));
    assert!(!temp.path().join("users/b.txt").exists());
}

#[tokio::test]
async fn timeout_kills_the_command_promptly() {
    let temp = TempDir::new().expect("tempdir");
    let mut config = LocalBackendConfig::for_user("alice");
    config.execution.timeout_seconds = 1.0;
    let sandbox = sandbox_with(manager(&temp), config);

    let started = Instant::now();
    let err = sandbox
        .exec("sleep 4.321")
        .await
        .expect_err("must time out");
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(err.code(), ErrorCode::ExecTimeout);

    let mut system = System::new();
    system.refresh_processes();
    let survivor = system
        .processes()
        .values()
        .any(|process| process.cmd().iter().any(|arg| arg == "4.321"));
    assert!(!survivor, "timed out command left a process behind");
}

#[tokio::test]
async fn writes_through_chained_dangling_links_are_refused() {
    let temp = TempDir::new().expect("tempdir");
    let sandbox = sandbox_for(&temp, "alice");

    sandbox.exec("ln -s .. up").await.expect("link parent");
    sandbox
        .exec("ln -s up/planted.txt dl")
        .await
        .expect("link through parent");

    let err = sandbox
        .write("dl", "planted")
        .await
        .expect_err("write must not leave the workspace");
    assert_eq!(err.code(), ErrorCode::PathEscapeAttempt);
    assert!(!temp.path().join("users/planted.txt").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_capped_per_sandbox() {
    let temp = TempDir::new().expect("tempdir");
    let mut config = LocalBackendConfig::for_user("alice");
    config.execution.max_concurrent_commands = 2;
    let sandbox = Arc::new(sandbox_with(manager(&temp), config));

    let started = Instant::now();
    let mut tasks = JoinSet::new();
    for _ in 0..7 {
        let sandbox = Arc::clone(&sandbox);
        tasks.spawn(async move { sandbox.exec("sleep 1").await });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.expect("join").expect("exec");
    }

    // Seven one-second commands on two slots need four waves.
    assert!(
        started.elapsed() >= Duration::from_millis(3_950),
        "finished in {:?}",
        started.elapsed()
    );
    assert_eq!(sandbox.executor().available_slots(), 2);
}

#[tokio::test]
async fn users_get_disjoint_workspaces() {
    let temp = TempDir::new().expect("tempdir");
    let manager = manager(&temp);
    let alice = sandbox_with(Arc::clone(&manager), LocalBackendConfig::for_user("alice"));
    let bob = sandbox_with(Arc::clone(&manager), LocalBackendConfig::for_user("bob"));

    alice.write("note.txt", "from alice").await.expect("write");
    bob.write("note.txt", "from bob").await.expect("write");

    assert_eq!(alice.read("note.txt").await.expect("read"), "from alice");
    assert_eq!(bob.read("note.txt").await.expect("read"), "from bob");

    let alice_ws = alice.workspace().expect("workspace");
    let bob_ws = bob.workspace().expect("workspace");
    assert_ne!(alice_ws, bob_ws);
    assert!(!alice_ws.starts_with(&bob_ws));
    assert!(!bob_ws.starts_with(&alice_ws));
    assert_eq!(manager.list_workspaces().len(), 2);
}

#[tokio::test]
async fn soft_blocked_commands_return_empty_output() {
    let temp = TempDir::new().expect("tempdir");
    let sandbox = sandbox_for(&temp, "alice").with_handler(Arc::new(warden_core::NoopHandler));

    assert_eq!(sandbox.exec("rm -rf /").await.expect("soft block"), "");
    assert!(!sandbox.audit_log().await[0].allowed);
}

#[tokio::test]
async fn resource_limits_stop_runaway_commands() {
    let temp = TempDir::new().expect("tempdir");
    let mut config = LocalBackendConfig::for_user("alice");
    config.resource_limits.max_processes = 1;
    config.execution.timeout_seconds = 10.0;
    let sandbox = sandbox_with(manager(&temp), config);

    let started = Instant::now();
    let err = sandbox
        .exec("sleep 3 & sleep 3 & wait")
        .await
        .expect_err("process limit must trip");
    assert_eq!(err.code(), ErrorCode::ResourceLimitExceeded);
    assert!(err.to_string().contains("process limit"), "{err}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn cpu_bound_work_finishes_under_default_limits() {
    let temp = TempDir::new().expect("tempdir");
    let sandbox = sandbox_for(&temp, "alice");

    let output = sandbox
        .exec("i=0; while [ $i -lt 600000 ]; do i=$((i+1)); done; echo $i")
        .await
        .expect("busy loop must not be killed");
    assert_eq!(output, "600000");
}
