//! Line-delimited JSON serving loop.
//!
//! Each input line is one `run-query` request; each output line is one
//! response envelope. Requests run concurrently, so responses may be written
//! out of order; callers match them up by `id`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{GateError, Result};
use crate::handler::{QueryHandler, ToolResponse};

/// Serves requests from `reader` until it reaches end of input or the
/// response writer fails.
///
/// In-flight requests are allowed to finish before returning.
pub async fn serve<R, W>(handler: Arc<QueryHandler>, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<ToolResponse>(64);
    let writer_task = tokio::spawn(write_responses(rx, writer));

    let mut lines = BufReader::new(reader).lines();
    let requests = TaskTracker::new();

    loop {
        let next = tokio::select! {
            next = lines.next_line() => {
                next.map_err(|e| GateError::io(format!("Failed to read request: {e}")))?
            }
            _ = tx.closed() => {
                warn!("Response writer stopped, no longer reading requests");
                break;
            }
        };
        let Some(line) = next else { break };

        if line.trim().is_empty() {
            continue;
        }
        debug!("Received request ({} bytes)", line.len());

        let handler = Arc::clone(&handler);
        let tx = tx.clone();
        requests.spawn(async move {
            let response = handler.handle_json(&line).await;
            if tx.send(response).await.is_err() {
                debug!("Dropping response, writer is gone");
            }
        });
    }

    requests.close();
    requests.wait().await;
    drop(tx);

    match writer_task.await {
        Ok(result) => result,
        Err(e) => Err(GateError::io(format!("Response writer failed: {e}"))),
    }
}

async fn write_responses<W>(mut rx: mpsc::Receiver<ToolResponse>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)
            .map_err(|e| GateError::io(format!("Failed to encode response: {e}")))?;
        line.push('\n');

        if let Err(e) = writer.write_all(line.as_bytes()).await {
            error!("Failed to write response: {}", e);
            return Err(GateError::io(format!("Failed to write response: {e}")));
        }
        writer
            .flush()
            .await
            .map_err(|e| GateError::io(format!("Failed to flush response: {e}")))?;
    }

    info!("Input closed, shutting down");
    Ok(())
}
