// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Relay HTTP server
//
// Responsibilities:
// - Validate generate requests (non-empty JSON body, non-empty prompt)
// - Open the backend stream via the injected GenerationSource
// - Map failures before the first frame to 502/504
// - Stream framed bytes as a chunked body with streaming headers
// - Log stream start/end and hand usage to a background task
// - Heartbeat endpoint

use crate::config::{Config, ContentType};
use crate::source::{build_source, text_deltas, GenerateRequest, GenerationSource, SourceError};
use crate::stream::{EncodeOutcome, FrameEncoder};
use crate::usage::{spawn_usage_update, LogUsageRecorder, UsageRecord, UsageRecorder};
use axum::body::Body;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::StreamExt;

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// The relay always binds to localhost, never 0.0.0.0.
pub const BIND_HOST: [u8; 4] = [127, 0, 0, 1];

pub fn bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from((BIND_HOST, port))
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported with a status code, before any frame is written.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("request body is empty")]
    EmptyBody,

    #[error("request body is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("upstream request failed: {0}")]
    UpstreamFailure(String),

    #[error("upstream request timed out: {0}")]
    UpstreamTimeout(String),
}

impl From<SourceError> for RelayError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Timeout(_) => RelayError::UpstreamTimeout(err.to_string()),
            other => RelayError::UpstreamFailure(other.to_string()),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            RelayError::EmptyBody => (StatusCode::BAD_REQUEST, "request body is empty"),
            RelayError::MalformedJson(_) => {
                (StatusCode::BAD_REQUEST, "request body is not valid JSON")
            }
            RelayError::EmptyPrompt => (StatusCode::BAD_REQUEST, "prompt is empty"),
            RelayError::UpstreamFailure(_) => (StatusCode::BAD_GATEWAY, "upstream request failed"),
            RelayError::UpstreamTimeout(_) => {
                (StatusCode::GATEWAY_TIMEOUT, "upstream request timed out")
            }
        };
        (status, public_message).into_response()
    }
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state injected into axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn GenerationSource>,
    pub encoder: FrameEncoder,
    pub content_type: ContentType,
    /// `None` disables usage tracking.
    pub usage: Option<Arc<dyn UsageRecorder>>,
}

impl AppState {
    pub fn new(source: Arc<dyn GenerationSource>) -> Self {
        Self {
            source,
            encoder: FrameEncoder::default(),
            content_type: ContentType::default(),
            usage: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let usage: Option<Arc<dyn UsageRecorder>> = if config.usage.enabled {
            Some(Arc::new(LogUsageRecorder))
        } else {
            None
        };
        Self {
            source: build_source(&config.backend),
            encoder: FrameEncoder::new(config.stream.channel_capacity),
            content_type: config.stream.content_type,
            usage,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Heartbeat endpoint: GET /v1/heartbeat -> 200 OK
pub async fn heartbeat() -> StatusCode {
    StatusCode::OK
}

/// Parse and validate a generate request body.
pub fn parse_generate_request(body: &[u8]) -> Result<GenerateRequest, RelayError> {
    if body.is_empty() {
        return Err(RelayError::EmptyBody);
    }
    let request: GenerateRequest =
        serde_json::from_slice(body).map_err(|e| RelayError::MalformedJson(e.to_string()))?;
    if request.prompt.trim().is_empty() {
        return Err(RelayError::EmptyPrompt);
    }
    Ok(request)
}

/// Stream handler: POST /v1/generate
pub async fn generate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let request = parse_generate_request(&body)?;
    let request_id = uuid::Uuid::new_v4().to_string();
    let backend = state.source.name();
    let model = request
        .model
        .clone()
        .unwrap_or_else(|| state.source.default_model().to_string());
    let prompt_chars = request.prompt.chars().count();

    let units = match state.source.generate(&request).await {
        Ok(units) => units,
        Err(e) => {
            tracing::warn!(%request_id, backend, %model, error = %e, "backend rejected request");
            return Err(e.into());
        }
    };

    tracing::info!(%request_id, backend, %model, prompt_chars, "stream started");

    let (frames, producer) = state.encoder.encode(text_deltas(units));

    let usage = state.usage.clone();
    tokio::spawn(async move {
        let summary = match producer.await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(%request_id, error = %e, "stream producer task failed");
                return;
            }
        };
        match &summary.outcome {
            EncodeOutcome::Failed(message) => tracing::warn!(
                %request_id,
                frames = summary.frames,
                chars = summary.chars,
                error = %message,
                "stream ended with error frame"
            ),
            outcome => tracing::info!(
                %request_id,
                frames = summary.frames,
                chars = summary.chars,
                outcome = ?outcome,
                "stream finished"
            ),
        }
        if let Some(recorder) = usage {
            let record =
                UsageRecord::from_summary(request_id, backend, model, prompt_chars, &summary);
            spawn_usage_update(recorder, record);
        }
    });

    let body = Body::from_stream(frames.map(Ok::<Bytes, Infallible>));
    Ok((
        [
            (CONTENT_TYPE, state.content_type.header_value()),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Router construction
// ---------------------------------------------------------------------------

/// Build the axum router with the generate and heartbeat endpoints.
///
/// The generation source is injected through `state`.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/heartbeat", get(heartbeat))
        .route("/v1/generate", post(generate_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Resolve when `signal` fires. If the signal handler could not be
/// installed, log it and never resolve, so the server keeps running.
pub async fn shutdown_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::error!(error = %e, "failed to install shutdown signal handler");
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
