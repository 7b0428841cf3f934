// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// The wire frame, the per-stream state machine, decoder steps, and the
// errors a decode operation can end with.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire frame
// ---------------------------------------------------------------------------

/// One unit of the wire protocol, serialized as `data: <json>\n\n`.
///
/// Field order matters for the encoded bytes: `content`, then `error`,
/// then `done`. Absent fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl Frame {
    /// A non-terminal content frame: `{"content": delta, "done": false}`.
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            content: Some(delta.into()),
            error: None,
            done: Some(false),
        }
    }

    /// The successful terminal frame: `{"content": "", "done": true}`.
    pub fn done() -> Self {
        Self {
            content: Some(String::new()),
            error: None,
            done: Some(true),
        }
    }

    /// The failed terminal frame: `{"error": message, "done": true}`.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: None,
            error: Some(message.into()),
            done: Some(true),
        }
    }

    /// True for frames that end a stream (`done` or `error`).
    pub fn is_terminal(&self) -> bool {
        self.error.is_some() || self.done == Some(true)
    }

    /// Serialize into the exact wire bytes, including the blank delimiter line.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Bytes::from(format!("data: {json}\n\n")))
    }
}

// ---------------------------------------------------------------------------
// Stream state machine
// ---------------------------------------------------------------------------

/// Lifecycle of a single stream: `Idle -> Streaming -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed)
    }

    /// Move to `next` if the transition is legal. Returns whether it happened.
    ///
    /// `Idle` may also fail directly (the transport was never readable).
    /// Nothing leaves `Completed` or `Failed`.
    pub fn transition(&mut self, next: StreamState) -> bool {
        let legal = matches!(
            (*self, next),
            (StreamState::Idle, StreamState::Streaming)
                | (StreamState::Idle, StreamState::Failed)
                | (StreamState::Streaming, StreamState::Completed)
                | (StreamState::Streaming, StreamState::Failed)
        );
        if legal {
            *self = next;
        }
        legal
    }
}

// ---------------------------------------------------------------------------
// Decoder output
// ---------------------------------------------------------------------------

/// What the decoder tells its driver after consuming input.
///
/// A `Complete` or `Failed` step is always the last one a decoder produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeStep {
    /// A non-empty content delta, already appended to the accumulator.
    Chunk(String),
    /// Terminal success, carrying the full accumulated text.
    Complete(String),
    /// Terminal failure: an `error` frame, or a line over the size limit.
    Failed(StreamError),
}

/// Result of a successful decode operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOutcome {
    /// Full accumulated text.
    pub text: String,
    /// False when the transport closed before a `done` frame arrived.
    pub terminated_cleanly: bool,
    /// Number of frames parsed.
    pub frames: usize,
    /// Number of `data:` lines skipped because they were not valid frames.
    pub skipped_lines: usize,
}

/// Events pushed by [`super::ChannelCallbacks`] for a dedicated consumer loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(String),
    Complete(String),
    Error(StreamError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk(_))
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Ways a decode operation can fail. Malformed lines are not among them:
/// they are skipped and counted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The body was unavailable, or a read failed mid-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The producer sent an `error` frame. Displays as the bare message.
    #[error("{0}")]
    Upstream(String),

    /// A single line outgrew the decode buffer before its terminator.
    #[error("frame line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The consumer cancelled the stream.
    #[error("stream cancelled")]
    Cancelled,
}
