//! The `run-query` operation.
//!
//! Composes the read-only gate, the connection registry, the binary locator
//! and the query runner. Every failure is turned into an error envelope; the
//! operation never fails past this boundary.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Settings;
use crate::connection::ConnectionRegistry;
use crate::error::{GateError, Result};
use crate::install::{BinaryLocator, ReleaseFetcher};
use crate::query::QueryRunner;
use crate::safety;

/// Name of the operation exposed to callers.
pub const OPERATION_NAME: &str = "run-query";

/// Input of the `run-query` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Optional caller-chosen id, echoed back in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub query: String,
    pub connection_string_number: i64,
}

/// One content block of a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text { text: String },
}

/// Output envelope of the `run-query` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub content: Vec<Content>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    /// Creates a success envelope with the given text.
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            id: None,
            content: vec![Content::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Creates a failure envelope describing `error`.
    pub fn failure(error: &GateError) -> Self {
        Self {
            id: None,
            content: vec![Content::Text {
                text: format!("Error executing query: {error}"),
            }],
            is_error: true,
        }
    }

    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }

    /// Concatenated text of all content blocks.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|Content::Text { text }| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Process-lifetime state shared by every request.
pub struct AppContext {
    pub registry: ConnectionRegistry,
    pub locator: BinaryLocator,
    pub runner: QueryRunner,
}

impl AppContext {
    /// Builds the context from loaded settings.
    pub fn new(
        registry: ConnectionRegistry,
        settings: &Settings,
        fetcher: Arc<dyn ReleaseFetcher>,
    ) -> Self {
        Self {
            registry,
            locator: BinaryLocator::new(settings.locator_config(), fetcher),
            runner: QueryRunner::new(settings.timeout()),
        }
    }
}

/// Handles `run-query` requests against an [`AppContext`].
pub struct QueryHandler {
    ctx: AppContext,
}

impl QueryHandler {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Runs one request and wraps the outcome in an envelope.
    pub async fn handle(&self, request: QueryRequest) -> ToolResponse {
        let id = request.id.clone();
        let response = match self.run(&request).await {
            Ok(value) => ToolResponse::success(
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()),
            ),
            Err(e) => {
                warn!("{}: {}", e.category(), e);
                ToolResponse::failure(&e)
            }
        };
        response.with_id(id)
    }

    /// Parses a JSON request and handles it; malformed input yields an error envelope.
    pub async fn handle_json(&self, line: &str) -> ToolResponse {
        match serde_json::from_str::<QueryRequest>(line) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                let id = serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|v| v.get("id").cloned());
                ToolResponse::failure(&GateError::invalid_input(e.to_string())).with_id(id)
            }
        }
    }

    /// validate -> resolve connection -> resolve binary -> execute.
    async fn run(&self, request: &QueryRequest) -> Result<Value> {
        let number = connection_number(request.connection_string_number)?;
        let query = safety::validate(&request.query).into_result()?;
        let connection = self.ctx.registry.resolve(number)?;
        let binary = self.ctx.locator.resolve().await?;

        info!("Running query on connection {}", number);
        self.ctx
            .runner
            .execute(&binary.path, connection, query)
            .await
    }
}

fn connection_number(raw: i64) -> Result<u32> {
    if raw < 1 {
        return Err(GateError::invalid_input(
            "Connection string number must be at least 1",
        ));
    }
    u32::try_from(raw).map_err(|_| {
        GateError::invalid_input(format!("Connection string number out of range: {raw}"))
    })
}
