//! Query runner tests against fake usql scripts.

#![cfg(unix)]

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

use usql_gate::error::GateError;
use usql_gate::query::QueryRunner;

use super::common::{write_script, ECHO_ARGS};

fn runner() -> QueryRunner {
    QueryRunner::new(Duration::from_secs(10))
}

#[tokio::test]
async fn test_passes_connection_query_and_json_flag() {
    let temp = TempDir::new().unwrap();
    let usql = write_script(temp.path(), "usql", ECHO_ARGS);

    let value = runner()
        .execute(&usql, "pg://localhost/app", "SELECT 1")
        .await
        .unwrap();

    assert_eq!(value, json!(["pg://localhost/app", "-c", "SELECT 1", "-J"]));
}

#[tokio::test]
async fn test_returns_decoded_json() {
    let temp = TempDir::new().unwrap();
    let usql = write_script(
        temp.path(),
        "usql",
        r#"printf '[{"id":1,"name":"ada"},{"id":2,"name":null}]'"#,
    );

    let value = runner().execute(&usql, "pg://x", "SELECT * FROM users").await.unwrap();

    assert_eq!(
        value,
        json!([{"id": 1, "name": "ada"}, {"id": 2, "name": null}])
    );
}

#[tokio::test]
async fn test_nonzero_exit_carries_stderr() {
    let temp = TempDir::new().unwrap();
    let usql = write_script(
        temp.path(),
        "usql",
        "echo 'error: pq: relation \"t\" does not exist' >&2\nexit 3\n",
    );

    let err = runner().execute(&usql, "pg://x", "SELECT * FROM t").await.unwrap_err();

    match err {
        GateError::ProcessExit { code, stderr } => {
            assert_eq!(code, 3);
            assert_eq!(stderr, "error: pq: relation \"t\" does not exist\n");
        }
        other => panic!("Expected ProcessExit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_output_keeps_raw_text() {
    let temp = TempDir::new().unwrap();
    let usql = write_script(temp.path(), "usql", "printf 'not json'\n");

    let err = runner().execute(&usql, "pg://x", "SELECT 1").await.unwrap_err();

    match err {
        GateError::ResponseParse { raw, detail } => {
            assert_eq!(raw, "not json");
            assert!(!detail.is_empty());
        }
        other => panic!("Expected ResponseParse, got {other:?}"),
    }
}

fn is_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[tokio::test]
async fn test_timeout_kills_child() {
    let temp = TempDir::new().unwrap();
    let pid_file = temp.path().join("pid");
    let usql = write_script(
        temp.path(),
        "usql",
        &format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display()),
    );

    // Long enough for the script to record its pid before the kill.
    let start = Instant::now();
    let err = QueryRunner::new(Duration::from_millis(1000))
        .execute(&usql, "pg://x", "SELECT pg_sleep(30)")
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::Timeout(1000)), "got {err:?}");
    assert!(start.elapsed() < Duration::from_secs(10));

    // The child is killed and reaped before the error is returned.
    let pid = std::fs::read_to_string(&pid_file).expect("usql never recorded its pid");
    let pid = pid.trim();
    assert!(!pid.is_empty());
    assert!(!is_alive(pid), "usql process {pid} still alive");
}

#[tokio::test]
async fn test_timeout_covers_output_held_open_by_grandchild() {
    let temp = TempDir::new().unwrap();
    // usql exits at once, but a background child keeps stdout open.
    let usql = write_script(temp.path(), "usql", "(sleep 5) &\nprintf '[]'\n");

    let start = Instant::now();
    let err = QueryRunner::new(Duration::from_millis(300))
        .execute(&usql, "pg://x", "SELECT 1")
        .await
        .unwrap_err();

    assert!(matches!(err, GateError::Timeout(300)), "got {err:?}");
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_large_output_does_not_block() {
    let temp = TempDir::new().unwrap();
    // Roughly 200 KiB, well past a pipe buffer.
    let usql = write_script(
        temp.path(),
        "usql",
        "printf '['\nyes '1,' | head -n 100000 | tr -d '\\n'\nprintf '1]'\n",
    );

    let value = runner().execute(&usql, "pg://x", "SELECT 1").await.unwrap();

    assert_eq!(value.as_array().map(Vec::len), Some(100_001));
}

#[tokio::test]
async fn test_concurrent_executions_are_independent() {
    let temp = TempDir::new().unwrap();
    let usql = write_script(temp.path(), "usql", ECHO_ARGS);
    let runner = runner();

    let (a, b) = tokio::join!(
        runner.execute(&usql, "pg://a", "SELECT 'a'"),
        runner.execute(&usql, "pg://b", "SELECT 'b'"),
    );

    assert_eq!(a.unwrap()[0], json!("pg://a"));
    assert_eq!(b.unwrap()[0], json!("pg://b"));
}

#[tokio::test]
async fn test_non_executable_binary_is_spawn_error() {
    let temp = TempDir::new().unwrap();
    let usql = temp.path().join("usql");
    std::fs::write(&usql, "#!/bin/sh\n").unwrap();

    let err = runner().execute(&usql, "pg://x", "SELECT 1").await.unwrap_err();
    assert!(matches!(err, GateError::Spawn(_)), "got {err:?}");
}
