// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Streaming relay core
//
// Responsibilities:
// - Encode text deltas as `data: <json>\n\n` frames onto a byte transport
// - Always finish a stream with exactly one terminal frame
// - Decode arbitrarily chunked bytes back into ordered deltas
// - Carry split UTF-8 sequences and partial lines across reads
// - Bound the partial-line buffer
// - Skip malformed lines without aborting the stream
// - Dispatch to StreamCallbacks, or to a channel for a separate consumer loop

mod callbacks;
mod decoder;
mod encoder;
mod types;

pub use callbacks::{ChannelCallbacks, NoopCallbacks, StreamCallbacks};
pub use decoder::{
    data_payload, decode_stream, decode_stream_detailed, parse_frame_line, FrameDecoder,
    LineBuffer, LineTooLong, Utf8Decoder, MAX_LINE_BYTES,
};
pub use encoder::{
    write_frames, EncodeOutcome, EncodeSummary, FrameEncoder, DEFAULT_CHANNEL_CAPACITY,
};
pub use types::{DecodeOutcome, DecodeStep, Frame, StreamError, StreamEvent, StreamState};
