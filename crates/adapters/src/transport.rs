// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport channel between a slot and its worker process.
//!
//! A [`Launcher`] starts a worker and returns a [`Channel`]: framed
//! send/receive over the worker's pipes plus a handle on the process
//! itself. Any I/O error, EOF or undecodable frame surfaces as
//! [`ChannelError::Broken`]; nothing is dropped silently.

use async_trait::async_trait;
use kiln_core::SlotId;
use kiln_wire::{Message, ProtocolError};
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// Errors from starting a worker process
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("worker executable not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to spawn {}: {source}", program.display())]
    Io {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("spawn refused: {0}")]
    Refused(String),
}

/// Errors from a running channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel broken: {0}")]
    Broken(String),
}

impl From<ProtocolError> for ChannelError {
    fn from(e: ProtocolError) -> Self {
        ChannelError::Broken(e.to_string())
    }
}

/// How to start one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    /// Extra arguments placed before the worker flags
    pub args: Vec<String>,
    pub slot: SlotId,
    /// Operations the worker should register
    pub operations: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl LaunchSpec {
    pub fn new(program: impl Into<PathBuf>, slot: SlotId) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            slot,
            operations: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Full argument list:
    /// `<args...> --kiln-worker --slot <slot> --operations <op,...>`
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--kiln-worker".to_string());
        args.push("--slot".to_string());
        args.push(self.slot.to_string());
        if !self.operations.is_empty() {
            args.push("--operations".to_string());
            args.push(self.operations.join(","));
        }
        args
    }
}

pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Handle on a running worker process.
#[async_trait]
pub trait WorkerProcess: Send {
    /// OS process id, if there is one
    fn id(&self) -> Option<u32>;

    /// Whether the process has not exited yet
    fn is_alive(&mut self) -> bool;

    /// Kill the process and wait for it to exit. Killing an exited
    /// process is not an error.
    async fn kill(&mut self) -> Result<(), ChannelError>;
}

/// Inbound half of a channel
pub struct ChannelReader {
    inner: BoxReader,
}

impl ChannelReader {
    pub fn new(inner: BoxReader) -> Self {
        Self { inner }
    }

    /// Wait for the next complete frame.
    pub async fn recv(&mut self) -> Result<Message, ChannelError> {
        Ok(kiln_wire::read_message(&mut self.inner).await?)
    }
}

/// Outbound half of a channel
pub struct ChannelWriter {
    inner: BoxWriter,
}

impl ChannelWriter {
    pub fn new(inner: BoxWriter) -> Self {
        Self { inner }
    }

    pub async fn send(&mut self, msg: &Message) -> Result<(), ChannelError> {
        Ok(kiln_wire::write_message(&mut self.inner, msg).await?)
    }
}

/// Framed, bidirectional connection to one worker process.
pub struct Channel {
    reader: ChannelReader,
    writer: ChannelWriter,
    process: Box<dyn WorkerProcess>,
}

impl Channel {
    pub fn new(reader: BoxReader, writer: BoxWriter, process: Box<dyn WorkerProcess>) -> Self {
        Self {
            reader: ChannelReader::new(reader),
            writer: ChannelWriter::new(writer),
            process,
        }
    }

    pub async fn send(&mut self, msg: &Message) -> Result<(), ChannelError> {
        self.writer.send(msg).await
    }

    pub async fn recv(&mut self) -> Result<Message, ChannelError> {
        self.reader.recv().await
    }

    pub fn is_alive(&mut self) -> bool {
        self.process.is_alive()
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.id()
    }

    pub async fn kill(&mut self) -> Result<(), ChannelError> {
        self.process.kill().await
    }

    /// Separate the reader (for a dedicated reader task) from the writer
    /// and process handle.
    pub fn split(self) -> (ChannelReader, ChannelWriter, Box<dyn WorkerProcess>) {
        (self.reader, self.writer, self.process)
    }
}

/// Starts worker processes.
#[async_trait]
pub trait Launcher: Clone + Send + Sync + 'static {
    async fn spawn(&self, spec: &LaunchSpec) -> Result<Channel, SpawnError>;
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
