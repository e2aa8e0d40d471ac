// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Frame encoding/decoding for the worker protocol.

use crate::message::{Message, MessageKind};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Unknown message kind: {0}")]
    UnknownKind(u8),

    #[error("Result data too large: {size} bytes (max {max})")]
    ResultDataTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Maximum frame size (16 MiB), counting the kind byte and payload
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Maximum size of the opaque data carried by a transform result
pub const MAX_RESULT_DATA: usize = 8 * 1024;

/// Encode a message to kind byte + JSON payload (without length prefix)
///
/// Use with `write_message()` which handles the length-prefix wire format.
pub fn encode(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let mut body = vec![msg.kind() as u8];
    match msg {
        Message::TransformRequest(req) => serde_json::to_writer(&mut body, req)?,
        Message::ProgressUpdate(update) => serde_json::to_writer(&mut body, update)?,
        Message::LogLine(line) => serde_json::to_writer(&mut body, line)?,
        Message::TransformResult(result) => {
            check_result_data(result.data.len())?;
            serde_json::to_writer(&mut body, result)?
        }
        Message::Shutdown => {}
    }

    if body.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    Ok(body)
}

/// Decode a message from kind byte + JSON payload
pub fn decode(body: &[u8]) -> Result<Message, ProtocolError> {
    let (&kind, payload) = body.split_first().ok_or(ProtocolError::EmptyFrame)?;
    let kind = MessageKind::from_byte(kind).ok_or(ProtocolError::UnknownKind(kind))?;
    let msg = match kind {
        MessageKind::TransformRequest => Message::TransformRequest(serde_json::from_slice(payload)?),
        MessageKind::ProgressUpdate => Message::ProgressUpdate(serde_json::from_slice(payload)?),
        MessageKind::LogLine => Message::LogLine(serde_json::from_slice(payload)?),
        MessageKind::TransformResult => {
            let result: crate::message::TransformResult = serde_json::from_slice(payload)?;
            check_result_data(result.data.len())?;
            Message::TransformResult(result)
        }
        MessageKind::Shutdown => Message::Shutdown,
    };
    Ok(msg)
}

fn check_result_data(size: usize) -> Result<(), ProtocolError> {
    if size > MAX_RESULT_DATA {
        return Err(ProtocolError::ResultDataTooLarge {
            size,
            max: MAX_RESULT_DATA,
        });
    }
    Ok(())
}

/// Read one framed message from an async reader.
///
/// A clean EOF before the length prefix is `ConnectionClosed`; EOF inside
/// a frame is an I/O error.
pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Message, ProtocolError> {
    // Read length prefix
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    if len == 0 {
        return Err(ProtocolError::EmptyFrame);
    }
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    // Read kind + payload
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    decode(&buf)
}

/// Write one framed message to an async writer
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &Message,
) -> Result<(), ProtocolError> {
    let body = encode(msg)?;
    writer.write_all(&(body.len() as u32).to_le_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
