// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

use crate::source::GenerateRequest;
use crate::stream::{decode_stream, NoopCallbacks, StreamCallbacks, StreamError};
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Relay client
// ---------------------------------------------------------------------------

/// HTTP client for a relay server's `POST /v1/generate`.
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/generate", self.base_url.trim_end_matches('/'))
    }

    /// Non-interactive shape: wait for the whole reply.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, StreamError> {
        self.stream(prompt, &mut NoopCallbacks, &CancellationToken::new())
            .await
    }

    /// Interactive shape: deliver chunks to `callbacks` as they arrive.
    pub async fn stream(
        &self,
        prompt: &str,
        callbacks: &mut dyn StreamCallbacks,
        cancel: &CancellationToken,
    ) -> Result<String, StreamError> {
        self.stream_request(&GenerateRequest::new(prompt), callbacks, cancel)
            .await
    }

    /// Like [`RelayClient::stream`], with full control over the request.
    ///
    /// Failing to obtain a readable body is a transport error, reported
    /// through `on_error` before any frame is processed.
    pub async fn stream_request(
        &self,
        request: &GenerateRequest,
        callbacks: &mut dyn StreamCallbacks,
        cancel: &CancellationToken,
    ) -> Result<String, StreamError> {
        let send = self.client.post(self.endpoint()).json(request).send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StreamError::Cancelled),
            sent = send => sent.map_err(|e| StreamError::Transport(e.to_string())),
        };

        let response = match response {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                let status = resp.status();
                let err = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => StreamError::Cancelled,
                    body = resp.text() => match body {
                        Ok(body) => StreamError::Transport(format!("relay returned {status}: {body}")),
                        Err(e) => StreamError::Transport(format!(
                            "relay returned {status}; body unreadable: {e}"
                        )),
                    },
                };
                callbacks.on_error(&err);
                return Err(err);
            }
            Err(err) => {
                callbacks.on_error(&err);
                return Err(err);
            }
        };

        decode_stream(response.bytes_stream(), callbacks, cancel).await
    }
}
