// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Frame decoder
//
// Turns an arbitrarily chunked byte stream back into ordered frames:
// - UTF-8 decoding that carries split multi-byte sequences across reads
// - Line reassembly from a partial-line buffer
// - Frame parsing with malformed lines skipped
// - Dispatch to StreamCallbacks with a single terminal outcome

use super::callbacks::StreamCallbacks;
use super::types::{DecodeOutcome, DecodeStep, Frame, StreamError, StreamState};
use bytes::Bytes;
use std::fmt;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Stateful UTF-8 decoding
// ---------------------------------------------------------------------------

/// UTF-8 decoder that keeps an incomplete trailing sequence between calls.
///
/// Bytes that can never form a valid character are replaced with U+FFFD,
/// the same as `String::from_utf8_lossy`. A sequence that is merely cut
/// short is held back until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, prefixed by any bytes held back last time.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest: &[u8] = &bytes;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    if let Ok(valid) = std::str::from_utf8(valid) {
                        out.push_str(valid);
                    }
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            // Cut-off sequence at the end of input.
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush at end of input. A sequence that never completed becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }

    /// Number of bytes currently held back.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Line reassembly
// ---------------------------------------------------------------------------

/// Longest line the decoders will buffer, in bytes.
pub const MAX_LINE_BYTES: usize = 4 * 1_048_576; // 4 MB

/// A line grew past the buffer limit before its terminator arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("line exceeds {limit} bytes without a terminator")]
pub struct LineTooLong {
    pub limit: usize,
}

/// Holds the incomplete tail of decoded text until a newline completes it.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: String,
    limit: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: String::new(),
            limit,
        }
    }

    /// Append text and return every line it completed, without terminators.
    /// A `\r` before the `\n` is stripped as well.
    ///
    /// Only `text` is scanned for the terminator. A line longer than the
    /// limit empties the buffer and fails.
    pub fn push(&mut self, text: &str) -> Result<Vec<String>, LineTooLong> {
        let offset = self.buffer.len();
        self.buffer.push_str(text);

        let Some(newline) = text.rfind('\n') else {
            return self.check_len(self.buffer.len()).map(|()| Vec::new());
        };
        let tail = self.buffer.split_off(offset + newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);

        let lines: Vec<String> = complete.lines().map(str::to_owned).collect();
        let longest = lines.iter().map(String::len).max().unwrap_or(0);
        self.check_len(longest.max(self.buffer.len()))?;
        Ok(lines)
    }

    fn check_len(&mut self, len: usize) -> Result<(), LineTooLong> {
        if len > self.limit {
            self.buffer = String::new();
            return Err(LineTooLong { limit: self.limit });
        }
        Ok(())
    }

    /// Take whatever is left without a terminator.
    pub fn take_remainder(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    pub fn remainder(&self) -> &str {
        &self.buffer
    }
}

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// Payload of an SSE `data:` line, or `None` for any other line
/// (blank delimiters, `:` comments, `event:` and `id:` fields).
pub fn data_payload(line: &str) -> Option<&str> {
    let payload = line.strip_prefix("data:")?;
    Some(payload.strip_prefix(' ').unwrap_or(payload))
}

/// Parse one complete line. `None` means the line is not a framed event.
pub fn parse_frame_line(line: &str) -> Option<Result<Frame, serde_json::Error>> {
    data_payload(line).map(serde_json::from_str)
}

// ---------------------------------------------------------------------------
// FrameDecoder
// ---------------------------------------------------------------------------

/// Synchronous decode core. Owns the decode buffer and the accumulator for
/// exactly one stream.
///
/// Once a terminal step has been produced, further input is ignored.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    lines: LineBuffer,
    accumulator: String,
    state: StreamState,
    frames: usize,
    skipped_lines: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that fails once a single line exceeds `max_line_bytes`.
    pub fn with_max_line(max_line_bytes: usize) -> Self {
        Self {
            lines: LineBuffer::with_limit(max_line_bytes),
            ..Self::default()
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Mark the first read. Idempotent.
    pub fn begin(&mut self) {
        if self.state == StreamState::Idle {
            self.state.transition(StreamState::Streaming);
        }
    }

    /// Feed one chunk of raw bytes and return the steps it produced, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodeStep> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        self.begin();

        let text = self.utf8.decode(chunk);
        let lines = match self.lines.push(&text) {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(limit = e.limit, "frame line too long; failing stream");
                self.state.transition(StreamState::Failed);
                return vec![DecodeStep::Failed(StreamError::LineTooLong { limit: e.limit })];
            }
        };
        let mut steps = Vec::new();
        for line in lines {
            if self.apply_line(&line, &mut steps) {
                break;
            }
        }
        steps
    }

    /// End of data without a terminal frame: complete with what accumulated.
    ///
    /// A trailing partial line is discarded, never parsed. Returns `None`
    /// if the stream had already terminated.
    pub fn finish(&mut self) -> Option<DecodeStep> {
        if self.state.is_terminal() {
            return None;
        }
        self.begin();

        let _ = self.utf8.finish();
        let leftover = self.lines.take_remainder();
        if !leftover.is_empty() {
            tracing::debug!(bytes = leftover.len(), "discarding unterminated trailing line");
        }
        self.state.transition(StreamState::Completed);
        Some(DecodeStep::Complete(self.accumulator.clone()))
    }

    /// Fail the stream from outside (transport error, cancellation).
    pub fn fail(&mut self) {
        self.state.transition(StreamState::Failed);
    }

    /// Apply one complete line. Returns true when it was terminal.
    fn apply_line(&mut self, line: &str, steps: &mut Vec<DecodeStep>) -> bool {
        let frame = match parse_frame_line(line) {
            None => return false,
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                self.skipped_lines += 1;
                tracing::debug!(error = %e, "skipping malformed frame line");
                return false;
            }
        };
        self.frames += 1;
        let terminal = frame.is_terminal();

        if let Some(message) = frame.error {
            self.state.transition(StreamState::Failed);
            steps.push(DecodeStep::Failed(StreamError::Upstream(message)));
            return true;
        }

        if let Some(delta) = frame.content.filter(|c| !c.is_empty()) {
            self.accumulator.push_str(&delta);
            steps.push(DecodeStep::Chunk(delta));
        }

        if terminal {
            self.state.transition(StreamState::Completed);
            steps.push(DecodeStep::Complete(self.accumulator.clone()));
            return true;
        }

        false
    }

    fn outcome(&self, text: String, terminated_cleanly: bool) -> DecodeOutcome {
        DecodeOutcome {
            text,
            terminated_cleanly,
            frames: self.frames,
            skipped_lines: self.skipped_lines,
        }
    }
}

// ---------------------------------------------------------------------------
// Async driver
// ---------------------------------------------------------------------------

/// Decode a framed byte stream, dispatching to `callbacks`, and return the
/// accumulated text.
///
/// The reader is consumed and dropped on every exit path.
pub async fn decode_stream<S, E>(
    reader: S,
    callbacks: &mut dyn StreamCallbacks,
    cancel: &CancellationToken,
) -> Result<String, StreamError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
{
    decode_stream_detailed(reader, callbacks, cancel)
        .await
        .map(|outcome| outcome.text)
}

/// Same as [`decode_stream`], but reports whether the stream ended with a
/// `done` frame and how many lines were skipped.
pub async fn decode_stream_detailed<S, E>(
    reader: S,
    callbacks: &mut dyn StreamCallbacks,
    cancel: &CancellationToken,
) -> Result<DecodeOutcome, StreamError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
{
    tokio::pin!(reader);
    let mut decoder = FrameDecoder::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                decoder.fail();
                let err = StreamError::Cancelled;
                callbacks.on_error(&err);
                return Err(err);
            }
            next = reader.next() => next,
        };
        decoder.begin();

        match next {
            Some(Ok(bytes)) => {
                for step in decoder.push(&bytes) {
                    match step {
                        DecodeStep::Chunk(delta) => callbacks.on_chunk(&delta),
                        DecodeStep::Complete(text) => {
                            callbacks.on_complete(&text);
                            return Ok(decoder.outcome(text, true));
                        }
                        DecodeStep::Failed(err) => {
                            callbacks.on_error(&err);
                            return Err(err);
                        }
                    }
                }
            }
            Some(Err(e)) => {
                decoder.fail();
                let err = StreamError::Transport(e.to_string());
                callbacks.on_error(&err);
                return Err(err);
            }
            None => {
                tracing::warn!(
                    frames = decoder.frames(),
                    chars = decoder.accumulated().chars().count(),
                    "transport closed without a terminal frame; treating as complete"
                );
                return match decoder.finish() {
                    Some(DecodeStep::Complete(text)) => {
                        callbacks.on_complete(&text);
                        Ok(decoder.outcome(text, false))
                    }
                    _ => Ok(decoder.outcome(decoder.accumulated().to_owned(), false)),
                };
            }
        }
    }
}
