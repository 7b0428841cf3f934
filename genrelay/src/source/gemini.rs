// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Gemini backend
//
// Calls `streamGenerateContent?alt=sse` and turns the upstream SSE body
// into ResponseUnits. The upstream body gets the same treatment as our own
// wire format: stateful UTF-8 decoding, then line reassembly, then one
// JSON unit per `data:` line.

use super::{GenerateRequest, GenerationSource, ResponseUnit, SourceError, UnitStream};
use crate::stream::{data_payload, LineBuffer, Utf8Decoder};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Streaming client for the Gemini `generateContent` API.
pub struct GeminiSource {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    /// Bound on the time to receive response headers. The body itself is
    /// not time-limited.
    timeout: Option<Duration>,
}

impl GeminiSource {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
        }
    }

    fn endpoint(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/v1beta/models/{model}:streamGenerateContent?alt=sse")
    }
}

#[async_trait]
impl GenerationSource for GeminiSource {
    async fn generate(&self, request: &GenerateRequest) -> Result<UnitStream, SourceError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": request.prompt } ] }
            ]
        });

        let send = self
            .client
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send();

        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, send)
                .await
                .map_err(|_| SourceError::Timeout(format!("no response within {limit:?}")))?,
            None => send.await,
        }
        .map_err(|e| {
            if e.is_timeout() {
                SourceError::Timeout(e.to_string())
            } else {
                SourceError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<error body unreadable: {e}>"));
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(parse_sse_units(response.bytes_stream()))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Upstream SSE parsing
// ---------------------------------------------------------------------------

struct ParseState {
    input: Pin<Box<dyn Stream<Item = Result<Bytes, String>> + Send>>,
    utf8: Utf8Decoder,
    lines: LineBuffer,
    pending: VecDeque<Result<ResponseUnit, SourceError>>,
    finished: bool,
}

impl ParseState {
    fn queue_line(&mut self, line: &str) {
        let Some(payload) = data_payload(line) else {
            return;
        };
        if payload.trim().is_empty() {
            return;
        }
        let item = match serde_json::from_str::<ResponseUnit>(payload) {
            Ok(unit) => match &unit.error {
                Some(err) => Err(SourceError::Backend(err.message.clone())),
                None => Ok(unit),
            },
            Err(e) => Err(SourceError::Decode(e.to_string())),
        };
        self.pending.push_back(item);
    }
}

/// Parse an upstream SSE byte stream into response units.
///
/// The stream ends after the first error it yields.
pub fn parse_sse_units<S, E>(input: S) -> UnitStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: fmt::Display + 'static,
{
    let state = ParseState {
        input: Box::pin(input.map(|item| item.map_err(|e| e.to_string()))),
        utf8: Utf8Decoder::new(),
        lines: LineBuffer::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    let units = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.pending.clear();
                    state.finished = true;
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.input.next().await {
                Some(Ok(bytes)) => {
                    let text = state.utf8.decode(&bytes);
                    match state.lines.push(&text) {
                        Ok(lines) => {
                            for line in lines {
                                state.queue_line(&line);
                            }
                        }
                        Err(e) => state.pending.push_back(Err(SourceError::Decode(e.to_string()))),
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(SourceError::Transport(e)));
                }
                None => {
                    state.finished = true;
                    let tail = state.utf8.finish();
                    let mut rest = state.lines.take_remainder();
                    rest.push_str(&tail);
                    let rest = rest.trim_end().to_owned();
                    state.queue_line(&rest);
                }
            }
        }
    });

    Box::pin(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        let owned: Vec<Result<Bytes, Infallible>> = parts
            .iter()
            .map(|p| Ok(Bytes::from(p.to_string())))
            .collect();
        stream::iter(owned)
    }

    async fn texts(units: UnitStream) -> Vec<Result<Option<String>, SourceError>> {
        units
            .map(|u| u.map(|unit| unit.text_delta().map(str::to_owned)))
            .collect()
            .await
    }

    #[tokio::test]
    async fn parses_units_split_across_chunks() {
        let body = chunks(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}]}}]}\r\n\r\ndata: {\"cand",
            "idates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]}}]}\r\n\r\n",
        ]);
        let out = texts(parse_sse_units(body)).await;
        assert_eq!(
            out,
            vec![Ok(Some("Hel".to_string())), Ok(Some("lo".to_string()))]
        );
    }

    #[tokio::test]
    async fn final_unit_without_trailing_newline_is_kept() {
        let body = chunks(&["data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"end\"}]}}]}"]);
        let out = texts(parse_sse_units(body)).await;
        assert_eq!(out, vec![Ok(Some("end".to_string()))]);
    }

    #[tokio::test]
    async fn unreadable_unit_ends_stream_with_decode_error() {
        let body = chunks(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]}}]}\n\n",
            "data: {truncated\n\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"never\"}]}}]}\n\n",
        ]);
        let out = texts(parse_sse_units(body)).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok(Some("ok".to_string())));
        assert!(matches!(out[1], Err(SourceError::Decode(_))));
    }

    #[tokio::test]
    async fn in_band_error_becomes_backend_error() {
        let body = chunks(&["data: {\"error\":{\"code\":503,\"message\":\"overloaded\"}}\n\n"]);
        let out = texts(parse_sse_units(body)).await;
        assert_eq!(out, vec![Err(SourceError::Backend("overloaded".to_string()))]);
    }

    #[tokio::test]
    async fn transport_error_is_yielded_then_stream_ends() {
        let items: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from_static(
                b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"a\"}]}}]}\n\n",
            )),
            Err("connection reset".to_string()),
        ];
        let out = texts(parse_sse_units(stream::iter(items))).await;
        assert_eq!(
            out,
            vec![
                Ok(Some("a".to_string())),
                Err(SourceError::Transport("connection reset".to_string()))
            ]
        );
    }

    #[tokio::test]
    async fn oversized_upstream_line_ends_stream_with_decode_error() {
        let mut line = String::from("data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"");
        line.push_str(&"q".repeat(crate::stream::MAX_LINE_BYTES));
        let body = chunks(&[
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]}}]}\n\n",
            line.as_str(),
            "\"}]}}]}\n\n",
        ]);
        let out = texts(parse_sse_units(body)).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], Ok(Some("ok".to_string())));
        assert!(matches!(out[1], Err(SourceError::Decode(ref m)) if m.contains("exceeds")));
    }

    #[tokio::test]
    async fn error_status_keeps_upstream_body() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&upstream)
            .await;

        let source = GeminiSource::new(
            reqwest::Client::new(),
            upstream.uri(),
            "gemini-1.5-flash",
            "key",
            None,
        );
        let err = match source.generate(&GenerateRequest::new("hi")).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error status"),
        };
        assert_eq!(
            err,
            SourceError::Status {
                status: 429,
                body: "quota exceeded".into()
            }
        );
    }

    #[test]
    fn endpoint_uses_model_and_trims_base() {
        let source = GeminiSource::new(
            reqwest::Client::new(),
            "https://example.test/",
            "gemini-1.5-flash",
            "key",
            None,
        );
        assert_eq!(
            source.endpoint("gemini-1.5-flash"),
            "https://example.test/v1beta/models/gemini-1.5-flash:streamGenerateContent?alt=sse"
        );
    }
}
