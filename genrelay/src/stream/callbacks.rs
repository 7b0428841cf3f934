// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

use super::types::{StreamError, StreamEvent};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Trait: StreamCallbacks
// ---------------------------------------------------------------------------

/// Receives the decoded stream.
///
/// The decoder calls `on_chunk` zero or more times, then exactly one of
/// `on_complete` or `on_error`.
pub trait StreamCallbacks: Send {
    fn on_chunk(&mut self, delta: &str);
    fn on_complete(&mut self, full_text: &str);
    fn on_error(&mut self, error: &StreamError);
}

/// Callbacks for consumers that only want the returned text.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl StreamCallbacks for NoopCallbacks {
    fn on_chunk(&mut self, _delta: &str) {}
    fn on_complete(&mut self, _full_text: &str) {}
    fn on_error(&mut self, _error: &StreamError) {}
}

// ---------------------------------------------------------------------------
// Channel adapter
// ---------------------------------------------------------------------------

/// Pushes every callback onto a channel as a [`StreamEvent`], so a separate
/// loop can drain them.
///
/// Sends never block the decoder. If the receiver is gone, events are dropped.
pub struct ChannelCallbacks {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChannelCallbacks {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StreamCallbacks for ChannelCallbacks {
    fn on_chunk(&mut self, delta: &str) {
        let _ = self.tx.send(StreamEvent::Chunk(delta.to_owned()));
    }

    fn on_complete(&mut self, full_text: &str) {
        let _ = self.tx.send(StreamEvent::Complete(full_text.to_owned()));
    }

    fn on_error(&mut self, error: &StreamError) {
        let _ = self.tx.send(StreamEvent::Error(error.clone()));
    }
}
