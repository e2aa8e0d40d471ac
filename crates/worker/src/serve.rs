// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker request loop

use crate::registry::TransformRegistry;
use crate::transform::{Reporter, TransformInput};
use kiln_wire::{
    read_message, write_message, Message, ProtocolError, TransformRequest, TransformResult,
    MAX_RESULT_DATA,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::Instrument;

/// Serve transform requests until the orchestrator sends `Shutdown` or
/// closes the channel.
///
/// Requests are handled one at a time. Progress and log lines are written
/// as the transform produces them, followed by exactly one result.
pub async fn serve<R, W>(
    mut reader: R,
    mut writer: W,
    registry: Arc<TransformRegistry>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = match read_message(&mut reader).await {
            Ok(msg) => msg,
            Err(ProtocolError::ConnectionClosed) => {
                tracing::debug!("channel closed, exiting");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match msg {
            Message::TransformRequest(req) => {
                let span =
                    tracing::info_span!("transform", path = %req.path, operation = %req.operation);
                let result = run_request(req, &registry, &mut writer)
                    .instrument(span)
                    .await?;
                write_message(&mut writer, &Message::TransformResult(result)).await?;
            }
            Message::Shutdown => {
                tracing::debug!("shutdown requested");
                return Ok(());
            }
            other => {
                tracing::warn!(kind = ?other.kind(), "ignoring unexpected frame");
            }
        }
    }
}

async fn run_request<W>(
    req: TransformRequest,
    registry: &TransformRegistry,
    writer: &mut W,
) -> Result<TransformResult, ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let Some(transform) = registry.get(&req.operation) else {
        tracing::warn!("unknown operation");
        return Ok(TransformResult::failed(format!(
            "unknown operation: {}",
            req.operation
        )));
    };

    tracing::info!("running");

    let (reporter, mut updates) = Reporter::channel();
    let input = TransformInput::from(req);
    let mut task = tokio::task::spawn_blocking(move || transform.run(&input, &reporter));

    let joined = loop {
        tokio::select! {
            Some(update) = updates.recv() => write_message(writer, &update).await?,
            joined = &mut task => break joined,
        }
    };
    // The reporter is dropped with the task; flush what it left behind
    while let Ok(update) = updates.try_recv() {
        write_message(writer, &update).await?;
    }

    let result = match joined {
        Ok(Ok(output)) if output.data.len() > MAX_RESULT_DATA => {
            tracing::warn!(size = output.data.len(), "result data too large");
            TransformResult::failed(format!(
                "result data too large: {} bytes (max {MAX_RESULT_DATA})",
                output.data.len()
            ))
        }
        Ok(Ok(output)) => {
            tracing::info!(output = %output.output_hash.short(12), "succeeded");
            TransformResult::success(output.output_hash).with_data(output.data)
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed");
            TransformResult::failed(e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "transform panicked");
            TransformResult::failed(format!("transform panicked: {e}"))
        }
    };
    Ok(result)
}

#[cfg(test)]
#[path = "serve_tests.rs"]
mod tests;
