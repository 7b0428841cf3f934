// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Stream consumers
//
// Two shapes over the same decode contract:
// - collect_text: server-to-server relay that only wants the final text
// - Transcript: interactive display state, fed either directly through
//   ReplyWriter callbacks or from a ChannelCallbacks event loop

use crate::stream::{decode_stream, NoopCallbacks, StreamCallbacks, StreamError, StreamEvent};
use bytes::Bytes;
use futures_util::Stream;
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Prefix shown in place of a reply that failed.
pub const FAILURE_MARKER: &str = "[generation failed]";

/// Decode a framed body and return only the accumulated text.
pub async fn collect_text<S, E>(reader: S, cancel: &CancellationToken) -> Result<String, StreamError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
{
    decode_stream(reader, &mut NoopCallbacks, cancel).await
}

// ---------------------------------------------------------------------------
// Interactive transcript
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    /// Reply still receiving chunks.
    Streaming,
    Complete,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub status: MessageStatus,
}

impl ChatMessage {
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}

/// Ordered conversation as a display would show it.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::User,
            text: text.into(),
            status: MessageStatus::Complete,
        });
    }

    /// Open an empty assistant message and return the callbacks that fill it.
    pub fn begin_reply(&mut self) -> ReplyWriter<'_> {
        let index = self.open_reply();
        ReplyWriter {
            transcript: self,
            index,
        }
    }

    /// Open an empty assistant message for a channel-driven reply and return
    /// its index for [`Transcript::apply`].
    pub fn open_reply(&mut self) -> usize {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            text: String::new(),
            status: MessageStatus::Streaming,
        });
        self.messages.len() - 1
    }

    /// Apply one stream event to the reply at `index`. Events arriving after
    /// the reply reached a terminal status are ignored.
    pub fn apply(&mut self, index: usize, event: &StreamEvent) {
        match event {
            StreamEvent::Chunk(delta) => self.append(index, delta),
            StreamEvent::Complete(full_text) => self.complete(index, full_text),
            StreamEvent::Error(err) => self.fail(index, &err.to_string()),
        }
    }

    /// Drain every queued event into the reply at `index`. Returns `true`
    /// once the reply has reached a terminal status.
    pub fn poll_events(
        &mut self,
        index: usize,
        rx: &mut mpsc::UnboundedReceiver<StreamEvent>,
    ) -> bool {
        while let Ok(event) = rx.try_recv() {
            self.apply(index, &event);
        }
        !self.is_streaming(index)
    }

    fn is_streaming(&self, index: usize) -> bool {
        self.messages
            .get(index)
            .is_some_and(ChatMessage::is_streaming)
    }

    fn streaming_mut(&mut self, index: usize) -> Option<&mut ChatMessage> {
        self.messages
            .get_mut(index)
            .filter(|message| message.is_streaming())
    }

    fn append(&mut self, index: usize, delta: &str) {
        if let Some(message) = self.streaming_mut(index) {
            message.text.push_str(delta);
        }
    }

    fn complete(&mut self, index: usize, full_text: &str) {
        if let Some(message) = self.streaming_mut(index) {
            message.text = full_text.to_owned();
            message.status = MessageStatus::Complete;
        }
    }

    fn fail(&mut self, index: usize, reason: &str) {
        if let Some(message) = self.streaming_mut(index) {
            message.text = format!("{FAILURE_MARKER} {reason}");
            message.status = MessageStatus::Failed {
                reason: reason.to_owned(),
            };
        }
    }
}

/// Callbacks that write one assistant reply into a [`Transcript`].
///
/// Dropping the writer before a terminal callback marks the reply failed,
/// so a message is never left streaming.
pub struct ReplyWriter<'a> {
    transcript: &'a mut Transcript,
    index: usize,
}

impl ReplyWriter<'_> {
    pub fn text(&self) -> &str {
        &self.transcript.messages[self.index].text
    }
}

impl StreamCallbacks for ReplyWriter<'_> {
    fn on_chunk(&mut self, delta: &str) {
        self.transcript.append(self.index, delta);
    }

    fn on_complete(&mut self, full_text: &str) {
        self.transcript.complete(self.index, full_text);
    }

    fn on_error(&mut self, error: &StreamError) {
        self.transcript.fail(self.index, &error.to_string());
    }
}

impl Drop for ReplyWriter<'_> {
    fn drop(&mut self) {
        self.transcript.fail(self.index, "reply interrupted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ChannelCallbacks, Frame};
    use futures_util::stream;
    use std::convert::Infallible;

    fn wire(frames: &[Frame]) -> Vec<Result<Bytes, Infallible>> {
        frames.iter().map(|f| Ok(f.encode().unwrap())).collect()
    }

    #[tokio::test]
    async fn collect_text_returns_accumulated_text() {
        let body = wire(&[Frame::content("Hello"), Frame::content(" world"), Frame::done()]);
        let text = collect_text(stream::iter(body), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn collect_text_rejects_on_error_frame() {
        let body = wire(&[Frame::content("partial"), Frame::error("boom")]);
        let err = collect_text(stream::iter(body), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, StreamError::Upstream("boom".into()));
    }

    #[tokio::test]
    async fn reply_writer_fills_and_finalizes_message() {
        let mut transcript = Transcript::new();
        transcript.push_user("hi");

        let body = wire(&[Frame::content("Hel"), Frame::content("lo"), Frame::done()]);
        {
            let mut writer = transcript.begin_reply();
            decode_stream(stream::iter(body), &mut writer, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(writer.text(), "Hello");
        }

        let reply = transcript.last().unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "Hello");
        assert_eq!(reply.status, MessageStatus::Complete);
        assert_eq!(transcript.messages().len(), 2);
    }

    #[tokio::test]
    async fn error_replaces_partial_reply_with_marker() {
        let mut transcript = Transcript::new();
        let body = wire(&[Frame::content("partial"), Frame::error("boom")]);
        {
            let mut writer = transcript.begin_reply();
            let _ = decode_stream(stream::iter(body), &mut writer, &CancellationToken::new()).await;
        }

        let reply = transcript.last().unwrap();
        assert_eq!(reply.text, format!("{FAILURE_MARKER} boom"));
        assert_eq!(
            reply.status,
            MessageStatus::Failed {
                reason: "boom".into()
            }
        );
    }

    #[test]
    fn dropped_writer_never_leaves_reply_streaming() {
        let mut transcript = Transcript::new();
        {
            let mut writer = transcript.begin_reply();
            writer.on_chunk("half");
        }
        let reply = transcript.last().unwrap();
        assert!(!reply.is_streaming());
        assert!(matches!(reply.status, MessageStatus::Failed { .. }));
    }

    #[test]
    fn completed_reply_ignores_later_events() {
        let mut transcript = Transcript::new();
        let index = transcript.open_reply();
        transcript.apply(index, &StreamEvent::Complete("done".into()));
        transcript.apply(index, &StreamEvent::Chunk("late".into()));
        transcript.apply(index, &StreamEvent::Error(StreamError::Cancelled));

        let reply = transcript.last().unwrap();
        assert_eq!(reply.text, "done");
        assert_eq!(reply.status, MessageStatus::Complete);
    }

    #[tokio::test]
    async fn channel_events_drive_transcript() {
        let (mut callbacks, mut rx) = ChannelCallbacks::new();
        let body = wire(&[Frame::content("a"), Frame::content("b"), Frame::done()]);
        decode_stream(stream::iter(body), &mut callbacks, &CancellationToken::new())
            .await
            .unwrap();

        let mut transcript = Transcript::new();
        let index = transcript.open_reply();
        assert!(transcript.poll_events(index, &mut rx));
        assert_eq!(transcript.messages()[index].text, "ab");
        assert_eq!(transcript.messages()[index].status, MessageStatus::Complete);
    }

    #[test]
    fn poll_events_reports_in_progress_reply() {
        let (mut callbacks, mut rx) = ChannelCallbacks::new();
        callbacks.on_chunk("partial");

        let mut transcript = Transcript::new();
        let index = transcript.open_reply();
        assert!(!transcript.poll_events(index, &mut rx));
        assert_eq!(transcript.messages()[index].text, "partial");
    }
}
