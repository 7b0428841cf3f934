// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Background usage tracking
//
// After a stream ends, the relay hands a UsageRecord to a detached task.
// Recording runs off the request path: a failure is logged and dropped,
// never surfaced to the consumer.

use crate::stream::{EncodeOutcome, EncodeSummary};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What one finished stream consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecord {
    pub request_id: String,
    pub backend: String,
    pub model: String,
    pub prompt_chars: usize,
    pub frames: usize,
    pub output_chars: usize,
    pub outcome: UsageOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageOutcome {
    Completed,
    Failed,
    Abandoned,
}

impl From<&EncodeOutcome> for UsageOutcome {
    fn from(outcome: &EncodeOutcome) -> Self {
        match outcome {
            EncodeOutcome::Completed => UsageOutcome::Completed,
            EncodeOutcome::Failed(_) => UsageOutcome::Failed,
            EncodeOutcome::Abandoned => UsageOutcome::Abandoned,
        }
    }
}

impl UsageRecord {
    pub fn from_summary(
        request_id: impl Into<String>,
        backend: impl Into<String>,
        model: impl Into<String>,
        prompt_chars: usize,
        summary: &EncodeSummary,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            backend: backend.into(),
            model: model.into(),
            prompt_chars,
            frames: summary.frames,
            output_chars: summary.chars,
            outcome: UsageOutcome::from(&summary.outcome),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("usage store unavailable: {0}")]
    Unavailable(String),
}

/// Sink for usage records.
#[async_trait]
pub trait UsageRecorder: Send + Sync {
    async fn record(&self, record: UsageRecord) -> Result<(), UsageError>;
}

/// Writes usage records to the log at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUsageRecorder;

#[async_trait]
impl UsageRecorder for LogUsageRecorder {
    async fn record(&self, record: UsageRecord) -> Result<(), UsageError> {
        tracing::info!(
            request_id = %record.request_id,
            backend = %record.backend,
            model = %record.model,
            prompt_chars = record.prompt_chars,
            frames = record.frames,
            chars = record.output_chars,
            outcome = ?record.outcome,
            "usage recorded"
        );
        Ok(())
    }
}

/// Record usage on a detached task. The returned handle may be dropped.
pub fn spawn_usage_update(recorder: Arc<dyn UsageRecorder>, record: UsageRecord) -> JoinHandle<()> {
    tokio::spawn(async move {
        let request_id = record.request_id.clone();
        if let Err(e) = recorder.record(record).await {
            tracing::warn!(%request_id, error = %e, "usage update failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct CapturingRecorder {
        records: Mutex<Vec<UsageRecord>>,
    }

    #[async_trait]
    impl UsageRecorder for CapturingRecorder {
        async fn record(&self, record: UsageRecord) -> Result<(), UsageError> {
            self.records.lock().await.push(record);
            Ok(())
        }
    }

    struct FailingRecorder;

    #[async_trait]
    impl UsageRecorder for FailingRecorder {
        async fn record(&self, _record: UsageRecord) -> Result<(), UsageError> {
            Err(UsageError::Unavailable("database down".into()))
        }
    }

    fn summary(outcome: EncodeOutcome) -> EncodeSummary {
        EncodeSummary {
            outcome,
            frames: 3,
            chars: 11,
        }
    }

    #[test]
    fn record_from_summary_maps_outcome() {
        let record = UsageRecord::from_summary(
            "req-1",
            "echo",
            "echo",
            5,
            &summary(EncodeOutcome::Failed("boom".into())),
        );
        assert_eq!(record.frames, 3);
        assert_eq!(record.output_chars, 11);
        assert_eq!(record.outcome, UsageOutcome::Failed);
    }

    #[tokio::test]
    async fn spawned_update_reaches_recorder() {
        let recorder = Arc::new(CapturingRecorder {
            records: Mutex::new(Vec::new()),
        });
        let record = UsageRecord::from_summary(
            "req-2",
            "echo",
            "echo",
            5,
            &summary(EncodeOutcome::Completed),
        );

        spawn_usage_update(recorder.clone(), record.clone())
            .await
            .unwrap();

        assert_eq!(*recorder.records.lock().await, vec![record]);
    }

    #[tokio::test]
    async fn failed_update_is_contained() {
        let record = UsageRecord::from_summary(
            "req-3",
            "echo",
            "echo",
            5,
            &summary(EncodeOutcome::Completed),
        );
        let handle = spawn_usage_update(Arc::new(FailingRecorder), record);
        assert!(handle.await.is_ok(), "task must not panic on recorder failure");
    }

    #[tokio::test]
    async fn log_recorder_accepts_records() {
        let record = UsageRecord::from_summary(
            "req-4",
            "gemini",
            "gemini-1.5-flash",
            5,
            &summary(EncodeOutcome::Abandoned),
        );
        assert!(LogUsageRecorder.record(record).await.is_ok());
    }
}
