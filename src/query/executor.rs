//! Running usql as a child process.
//!
//! Each call spawns a fresh process; nothing is shared between concurrent
//! executions.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::connection::redact;
use crate::error::{GateError, Result};

/// Default execution timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Builds the usql argument vector: `<connection> -c <query> -J`.
///
/// `-J` asks usql for JSON output.
pub fn build_args(connection_string: &str, query: &str) -> Vec<OsString> {
    vec![
        connection_string.into(),
        "-c".into(),
        query.into(),
        "-J".into(),
    ]
}

/// Executes queries through the usql command-line tool.
#[derive(Debug, Clone, Copy)]
pub struct QueryRunner {
    timeout: Duration,
}

impl Default for QueryRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl QueryRunner {
    /// Creates a runner that kills usql after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `query` against `connection_string` and decodes usql's JSON output.
    pub async fn execute(&self, binary: &Path, connection_string: &str, query: &str) -> Result<Value> {
        debug!(
            "Running {} {} -c {:?} -J",
            binary.display(),
            redact(connection_string),
            query
        );

        let mut child = Command::new(binary)
            .args(build_args(connection_string, query))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GateError::Spawn(e.to_string()))?;

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
        let mut stdout = drain(child.stdout.take());
        let mut stderr = drain(child.stderr.take());

        // One deadline covers the wait and the drain: a grandchild holding
        // the pipes open must not outlive the timeout either.
        let start = Instant::now();
        let deadline = tokio::time::Instant::from_std(start + self.timeout);
        let timeout_ms = self.timeout.as_millis() as u64;

        let waited = tokio::time::timeout_at(deadline, child.wait()).await;
        let status = match waited {
            Ok(status) => status.map_err(|e| GateError::Spawn(e.to_string()))?,
            Err(_) => {
                warn!("usql exceeded {}ms, killing it", timeout_ms);
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill usql: {}", e);
                }
                stdout.abort();
                stderr.abort();
                return Err(GateError::Timeout(timeout_ms));
            }
        };
        debug!("usql exited with {} after {:?}", status, start.elapsed());

        let collected = tokio::time::timeout_at(deadline, async {
            (collect(&mut stdout).await, collect(&mut stderr).await)
        })
        .await;
        let (stdout, stderr) = match collected {
            Ok(output) => output,
            Err(_) => {
                warn!("usql output still open after {}ms, giving up", timeout_ms);
                stdout.abort();
                stderr.abort();
                return Err(GateError::Timeout(timeout_ms));
            }
        };

        if !status.success() {
            return Err(GateError::ProcessExit {
                code: status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            });
        }

        serde_json::from_slice(&stdout).map_err(|e| GateError::ResponseParse {
            raw: String::from_utf8_lossy(&stdout).into_owned(),
            detail: e.to_string(),
        })
    }
}

fn drain<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            if let Err(e) = pipe.read_to_end(&mut buf).await {
                warn!("Failed to read usql output: {}", e);
            }
        }
        buf
    })
}

async fn collect(handle: &mut JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.await.unwrap_or_default()
}
