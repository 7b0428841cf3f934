// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Generation sources
//
// Responsibilities:
// - Model the backend-native response unit (candidates -> content -> parts)
// - Reduce a unit stream to a plain stream of text deltas
// - Define the GenerationSource seam that backends implement
// - Build the configured backend

mod echo;
mod gemini;

pub use echo::EchoSource;
pub use gemini::{parse_sse_units, GeminiSource};

use crate::config::{BackendConfig, BackendKind};
use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Backend-native response unit
// ---------------------------------------------------------------------------

/// One partial response from a generation backend.
///
/// Shaped after `GenerateContentResponse`. Every level is optional and
/// unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseUnit {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// In-band error object some backends send instead of a candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BackendErrorBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}

impl ResponseUnit {
    /// A unit carrying a single text part. Used by local backends and tests.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![Part {
                        text: Some(text.into()),
                    }],
                    role: Some("model".to_string()),
                }),
                finish_reason: None,
            }],
            error: None,
        }
    }

    /// Text of the first candidate's first part, if there is one.
    pub fn text_delta(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while opening or pulling from a generation source.
///
/// The `Display` text is what ends up in the terminal error frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("backend request failed: {0}")]
    Transport(String),

    #[error("backend request timed out: {0}")]
    Timeout(String),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("backend sent an unreadable response unit: {0}")]
    Decode(String),

    #[error("backend error: {0}")]
    Backend(String),
}

// ---------------------------------------------------------------------------
// Trait: GenerationSource
// ---------------------------------------------------------------------------

/// Request accepted by the relay and handed to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
        }
    }
}

/// Asynchronous sequence of backend-native units. Exhaustion is success.
pub type UnitStream = Pin<Box<dyn Stream<Item = Result<ResponseUnit, SourceError>> + Send>>;

/// A backend that produces partial responses for a prompt.
///
/// `generate` resolves once the backend has accepted the request. Failures
/// before that point are returned directly; failures after it are yielded
/// from the stream.
#[async_trait]
pub trait GenerationSource: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<UnitStream, SourceError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Model used when the request does not name one.
    fn default_model(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Delta adapter
// ---------------------------------------------------------------------------

/// Reduce a unit stream to text deltas.
///
/// Units without text are skipped, as are empty deltas. Errors pass through
/// unchanged so the encoder can turn them into a terminal frame.
pub fn text_deltas<S>(units: S) -> impl Stream<Item = Result<String, SourceError>> + Send
where
    S: Stream<Item = Result<ResponseUnit, SourceError>> + Send,
{
    units.filter_map(|item| {
        future::ready(match item {
            Ok(unit) => unit
                .text_delta()
                .filter(|text| !text.is_empty())
                .map(|text| Ok(text.to_owned())),
            Err(e) => Some(Err(e)),
        })
    })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Build the backend described by `config`.
pub fn build_source(config: &BackendConfig) -> Arc<dyn GenerationSource> {
    match config.kind {
        BackendKind::Echo => Arc::new(EchoSource::new(
            config.model.clone(),
            Duration::from_millis(config.echo_delay_ms),
        )),
        BackendKind::Gemini => Arc::new(GeminiSource::new(
            reqwest::Client::new(),
            config.base_url.clone(),
            config.model.clone(),
            config.api_key.clone().unwrap_or_default(),
            config.timeout_ms.map(Duration::from_millis),
        )),
    }
}
