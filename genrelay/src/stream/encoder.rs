// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Frame encoder
//
// Pulls text deltas from a generation source and writes framed bytes to
// a bounded channel that backs the HTTP body. The producer task owns the
// sender, so the transport closes exactly once, when the task ends.

use super::types::Frame;
use bytes::Bytes;
use std::fmt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};

/// Default number of frames buffered between producer and transport.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// How the producer side of a stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeOutcome {
    /// Source exhausted; `done` frame written.
    Completed,
    /// Source failed; error frame written with this message.
    Failed(String),
    /// The transport stopped accepting writes (consumer went away).
    Abandoned,
}

/// Summary reported by the producer task when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSummary {
    pub outcome: EncodeOutcome,
    /// Content frames written (terminal frame excluded).
    pub frames: usize,
    /// Characters of content written.
    pub chars: usize,
}

/// Encodes a delta stream into the framed wire format.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    capacity: usize,
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl FrameEncoder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    /// Spawn the producer task and return the byte stream it writes to,
    /// plus a handle that resolves to the producer's summary.
    pub fn encode<S, E>(&self, deltas: S) -> (ReceiverStream<Bytes>, JoinHandle<EncodeSummary>)
    where
        S: Stream<Item = Result<String, E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Bytes>(self.capacity);
        let handle = tokio::spawn(write_frames(deltas, tx));
        (ReceiverStream::new(rx), handle)
    }
}

/// Drive `deltas` to completion, writing one frame per non-empty delta and
/// exactly one terminal frame. The sender is dropped on return.
pub async fn write_frames<S, E>(deltas: S, tx: mpsc::Sender<Bytes>) -> EncodeSummary
where
    S: Stream<Item = Result<String, E>>,
    E: fmt::Display,
{
    tokio::pin!(deltas);
    let mut frames = 0usize;
    let mut chars = 0usize;

    let outcome = loop {
        match deltas.next().await {
            Some(Ok(delta)) => {
                if delta.is_empty() {
                    continue;
                }
                let len = delta.chars().count();
                if send_frame(&tx, &Frame::content(delta)).await.is_err() {
                    break EncodeOutcome::Abandoned;
                }
                frames += 1;
                chars += len;
            }
            Some(Err(e)) => {
                let message = e.to_string();
                if send_frame(&tx, &Frame::error(message.as_str())).await.is_err() {
                    break EncodeOutcome::Abandoned;
                }
                break EncodeOutcome::Failed(message);
            }
            None => {
                if send_frame(&tx, &Frame::done()).await.is_err() {
                    break EncodeOutcome::Abandoned;
                }
                break EncodeOutcome::Completed;
            }
        }
    };

    if outcome == EncodeOutcome::Abandoned {
        tracing::debug!(frames, "transport closed by consumer; producer stopped");
    }

    EncodeSummary {
        outcome,
        frames,
        chars,
    }
}

/// Write one frame. `Err` means the frame could not be delivered.
async fn send_frame(tx: &mpsc::Sender<Bytes>, frame: &Frame) -> Result<(), ()> {
    let bytes = frame.encode().map_err(|e| {
        tracing::error!(error = %e, "failed to serialize frame");
    })?;
    tx.send(bytes).await.map_err(|_| ())
}
