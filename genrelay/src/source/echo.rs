// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

use super::{GenerateRequest, GenerationSource, ResponseUnit, SourceError, UnitStream};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use std::time::Duration;

/// Local backend that streams the prompt back one word at a time.
///
/// Needs no credentials. Whitespace is kept with the preceding word, so the
/// concatenated deltas equal the prompt exactly.
pub struct EchoSource {
    model: String,
    delay: Duration,
}

impl EchoSource {
    pub fn new(model: impl Into<String>, delay: Duration) -> Self {
        Self {
            model: model.into(),
            delay,
        }
    }
}

#[async_trait]
impl GenerationSource for EchoSource {
    async fn generate(&self, request: &GenerateRequest) -> Result<UnitStream, SourceError> {
        let units: Vec<Result<ResponseUnit, SourceError>> = request
            .prompt
            .split_inclusive(char::is_whitespace)
            .map(|word| Ok(ResponseUnit::from_text(word)))
            .collect();

        let delay = self.delay;
        let stream = stream::iter(units).then(move |unit| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            unit
        });
        Ok(Box::pin(stream))
    }

    fn name(&self) -> &'static str {
        "echo"
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
