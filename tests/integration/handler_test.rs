//! End-to-end tests of the run-query operation.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

use usql_gate::handler::QueryRequest;

use super::common::{handler_with, single_registry, was_invoked};

fn request(query: &str, number: i64) -> QueryRequest {
    QueryRequest {
        id: None,
        query: query.to_string(),
        connection_string_number: number,
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_select_runs_usql_with_expected_arguments() {
    use super::common::{fake_usql, ECHO_ARGS};

    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), fake_usql(temp.path(), ECHO_ARGS));

    let response = handler.handle(request("SELECT 1", 1)).await;

    assert!(!response.is_error, "{}", response.text());
    let args: Value = serde_json::from_str(&response.text()).unwrap();
    assert_eq!(
        args,
        json!(["pg://user:pass@localhost/app", "-c", "SELECT 1", "-J"])
    );
    assert!(handler.context().locator.cached().is_some());
}

#[cfg(unix)]
#[tokio::test]
async fn test_success_text_is_pretty_json() {
    use super::common::fake_usql;

    let temp = TempDir::new().unwrap();
    let handler = handler_with(
        single_registry(),
        fake_usql(temp.path(), r#"printf '[{"n":1}]'"#),
    );

    let response = handler.handle(request("SELECT 1 AS n", 1)).await;

    assert_eq!(response.text(), "[\n  {\n    \"n\": 1\n  }\n]");
}

#[cfg(unix)]
#[tokio::test]
async fn test_rejected_query_short_circuits() {
    use super::common::{fake_usql, ECHO_ARGS};

    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), fake_usql(temp.path(), ECHO_ARGS));

    let response = handler.handle(request("DROP TABLE t", 1)).await;

    assert!(response.is_error);
    assert_eq!(
        response.text(),
        "Error executing query: Only read-only queries are allowed (SELECT, WITH, EXPLAIN)"
    );
    assert!(handler.context().locator.cached().is_none());
    assert!(!was_invoked(temp.path()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unknown_connection_number() {
    use super::common::{fake_usql, ECHO_ARGS};

    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), fake_usql(temp.path(), ECHO_ARGS));

    let response = handler.handle(request("SELECT 1", 99)).await;

    assert!(response.is_error);
    assert_eq!(
        response.text(),
        "Error executing query: Connection string not found for number: 99"
    );
    assert!(handler.context().locator.cached().is_none());
    assert!(!was_invoked(temp.path()));
}

#[tokio::test]
async fn test_connection_number_must_be_positive() {
    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), temp.path().join("usql"));

    let response = handler.handle(request("SELECT 1", 0)).await;

    assert!(response.is_error);
    assert!(response.text().contains("must be at least 1"));
}

#[tokio::test]
async fn test_forbidden_keyword_after_select() {
    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), temp.path().join("usql"));

    let response = handler
        .handle(request("SELECT * FROM t WHERE 1=1 UNION ALL DELETE FROM t", 1))
        .await;

    assert!(response.is_error);
    assert_eq!(
        response.text(),
        "Error executing query: DDL/DML queries are not allowed"
    );
}

#[tokio::test]
async fn test_missing_binary_is_reported_and_not_cached() {
    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), temp.path().join("usql"));

    let response = handler.handle(request("SELECT 1", 1)).await;

    assert!(response.is_error);
    assert!(response.text().contains("usql binary not found at path"));
    assert!(response.text().contains("UNSAFE_USQL_BINARY=true"));
    assert!(handler.context().locator.cached().is_none());
}

#[cfg(unix)]
#[tokio::test]
async fn test_binary_installed_after_failure_is_picked_up() {
    use super::common::{fake_usql, ECHO_ARGS};

    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), temp.path().join("usql"));

    assert!(handler.handle(request("SELECT 1", 1)).await.is_error);

    fake_usql(temp.path(), ECHO_ARGS);
    let response = handler.handle(request("SELECT 1", 1)).await;
    assert!(!response.is_error, "{}", response.text());
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_failure_surfaces_stderr() {
    use super::common::fake_usql;

    let temp = TempDir::new().unwrap();
    let handler = handler_with(
        single_registry(),
        fake_usql(temp.path(), "echo 'pq: password authentication failed' >&2\nexit 1\n"),
    );

    let response = handler.handle(request("SELECT 1", 1)).await;

    assert!(response.is_error);
    assert!(response.text().contains("usql exited with code 1"));
    assert!(response.text().contains("pq: password authentication failed"));
}

#[tokio::test]
async fn test_malformed_json_request() {
    let temp = TempDir::new().unwrap();
    let handler = handler_with(single_registry(), temp.path().join("usql"));

    let response = handler
        .handle_json(r#"{"id": "a1", "query": "SELECT 1"}"#)
        .await;

    assert!(response.is_error);
    assert_eq!(response.id, Some(json!("a1")));
    assert!(response.text().contains("Invalid input"));
    assert!(response.text().contains("connectionStringNumber"));
}
