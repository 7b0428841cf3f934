// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

use sha2::{Digest, Sha256};

use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a genrelay config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash
/// 3. Parse YAML into raw deserialization types
/// 4. Validate version and enumerated values
/// 5. Resolve variable interpolation in string fields
/// 6. Apply defaults and build the typed Config
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.genrelay != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.genrelay
        )));
    }

    let server = ServerConfig {
        port: raw
            .server
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT),
    };
    let backend = build_backend_config(raw.backend)?;
    let stream = build_stream_config(raw.stream)?;
    let usage = UsageConfig {
        enabled: raw.usage.map(|u| u.enabled).unwrap_or(true),
    };
    let environment = match raw.environment {
        Some(env) => resolve_variables(&env)?,
        None => "dev".to_string(),
    };

    Ok(Config {
        server,
        backend,
        stream,
        usage,
        environment,
        config_hash,
    })
}

fn compute_hash(raw_yaml: &str) -> String {
    let digest = Sha256::digest(raw_yaml.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

fn build_backend_config(raw: Option<raw::RawBackendConfig>) -> Result<BackendConfig, ConfigError> {
    let Some(raw) = raw else {
        return Ok(BackendConfig::default());
    };

    let kind = match raw.kind.as_deref() {
        None | Some("echo") => BackendKind::Echo,
        Some("gemini") => BackendKind::Gemini,
        Some(other) => {
            return Err(ConfigError::Validation(format!(
                "unknown backend kind \"{other}\", expected \"echo\" or \"gemini\""
            )))
        }
    };

    let default_model = match kind {
        BackendKind::Echo => DEFAULT_ECHO_MODEL,
        BackendKind::Gemini => DEFAULT_GEMINI_MODEL,
    };
    let model = match raw.model {
        Some(m) => resolve_variables(&m)?,
        None => default_model.to_string(),
    };
    let api_key = raw
        .api_key
        .map(|k| resolve_variables(&k))
        .transpose()?
        .filter(|k| !k.is_empty());
    let base_url = match raw.base_url {
        Some(url) => resolve_variables(&url)?,
        None => DEFAULT_GEMINI_BASE_URL.to_string(),
    };

    if kind == BackendKind::Gemini && api_key.is_none() {
        return Err(ConfigError::Validation(
            "backend.api_key is required when backend.kind is \"gemini\"".to_string(),
        ));
    }
    if model.trim().is_empty() {
        return Err(ConfigError::Validation("backend.model must not be empty".to_string()));
    }

    Ok(BackendConfig {
        kind,
        model,
        api_key,
        base_url,
        timeout_ms: Some(raw.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)).filter(|ms| *ms > 0),
        echo_delay_ms: raw.echo_delay_ms.unwrap_or(0),
    })
}

fn build_stream_config(raw: Option<raw::RawStreamConfig>) -> Result<StreamConfig, ConfigError> {
    let Some(raw) = raw else {
        return Ok(StreamConfig::default());
    };

    let content_type = match raw.content_type.as_deref() {
        None | Some("event-stream") => ContentType::EventStream,
        Some("plain") => ContentType::Plain,
        Some(other) => {
            return Err(ConfigError::Validation(format!(
                "unknown stream.content_type \"{other}\", expected \"event-stream\" or \"plain\""
            )))
        }
    };

    let channel_capacity = raw
        .channel_capacity
        .unwrap_or(crate::stream::DEFAULT_CHANNEL_CAPACITY);
    if channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "stream.channel_capacity must be greater than 0".to_string(),
        ));
    }

    Ok(StreamConfig {
        content_type,
        channel_capacity,
    })
}
