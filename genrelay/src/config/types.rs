// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

use crate::stream::DEFAULT_CHANNEL_CAPACITY;

pub const DEFAULT_PORT: u16 = 9810;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_ECHO_MODEL: &str = "echo";
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level parsed and validated genrelay config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub stream: StreamConfig,
    pub usage: UsageConfig,
    /// Environment label (e.g. "dev", "production").
    pub environment: String,
    /// SHA256 of the raw YAML: "sha256:{hex}".
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// HTTP listener settings. The bind address is always localhost.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

/// Which generation backend to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Streams the prompt back; no credentials needed.
    #[default]
    Echo,
    /// Google Gemini `streamGenerateContent`.
    Gemini,
}

/// Generation backend settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Default model when a request does not name one.
    pub model: String,
    /// Required for `gemini`; never logged.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Time allowed for the backend to start responding.
    pub timeout_ms: Option<u64>,
    /// Pause between echo units, for exercising slow streams locally.
    pub echo_delay_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Echo,
            model: DEFAULT_ECHO_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout_ms: Some(DEFAULT_TIMEOUT_MS),
            echo_delay_ms: 0,
        }
    }
}

/// Content type advertised on streamed responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    #[default]
    EventStream,
    Plain,
}

impl ContentType {
    pub fn header_value(self) -> &'static str {
        match self {
            ContentType::EventStream => "text/event-stream",
            ContentType::Plain => "text/plain; charset=utf-8",
        }
    }
}

/// Framing and transport settings.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub content_type: ContentType,
    /// Frames buffered between the producer task and the HTTP body.
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            content_type: ContentType::EventStream,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Background usage tracking.
#[derive(Debug, Clone)]
pub struct UsageConfig {
    pub enabled: bool,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
