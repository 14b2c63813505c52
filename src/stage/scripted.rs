//! In-memory [`StageClient`] for tests: deterministic payloads, injectable
//! failures, per-stage call counts and an in-flight high-water mark.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::client::StageClient;
use super::error::StageError;
use super::types::Stage;
use crate::state_machine::JobId;

#[derive(Debug, Default)]
pub(crate) struct ScriptedStageClient {
    fail_generate_at: Option<usize>,
    fail_upload_at: Option<usize>,
    fail_archive_at: Option<usize>,
    approval_fails: bool,
    delay: Duration,
    calls: [AtomicUsize; 5],
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn index_of(payload: &str) -> Option<usize> {
    payload.rsplit('-').next()?.parse().ok()
}

fn rejected(stage: Stage, payload: &str) -> StageError {
    StageError::Rejected {
        stage,
        status: 500,
        message: format!("scripted failure for {payload}"),
    }
}

impl ScriptedStageClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_generate_at(mut self, index: usize) -> Self {
        self.fail_generate_at = Some(index);
        self
    }

    pub(crate) fn failing_upload_at(mut self, index: usize) -> Self {
        self.fail_upload_at = Some(index);
        self
    }

    pub(crate) fn failing_archive_at(mut self, index: usize) -> Self {
        self.fail_archive_at = Some(index);
        self
    }

    pub(crate) fn failing_approval(mut self) -> Self {
        self.approval_fails = true;
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self, stage: Stage) -> usize {
        self.calls[stage as usize].load(Ordering::SeqCst)
    }

    pub(crate) fn total_calls(&self) -> usize {
        Stage::ALL.iter().map(|stage| self.calls(*stage)).sum()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, stage: Stage) -> InFlight<'_> {
        self.calls[stage as usize].fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        guard
    }
}

impl StageClient for ScriptedStageClient {
    async fn fetch_metadata(&self, index: usize) -> Result<String, StageError> {
        let _guard = self.enter(Stage::Metadata).await;
        Ok(format!("metadata-{index}"))
    }

    async fn generate_document(&self, metadata: &str) -> Result<String, StageError> {
        let _guard = self.enter(Stage::Generate).await;
        if self.fail_generate_at.is_some() && index_of(metadata) == self.fail_generate_at {
            return Err(rejected(Stage::Generate, metadata));
        }
        Ok(metadata.replace("metadata", "document"))
    }

    async fn upload_to_cloud(&self, document: &str) -> Result<String, StageError> {
        let _guard = self.enter(Stage::Upload).await;
        if self.fail_upload_at.is_some() && index_of(document) == self.fail_upload_at {
            return Err(rejected(Stage::Upload, document));
        }
        Ok(format!("cloud://{document}"))
    }

    async fn archive_document(&self, document: &str) -> Result<String, StageError> {
        let _guard = self.enter(Stage::Archive).await;
        if self.fail_archive_at.is_some() && index_of(document) == self.fail_archive_at {
            return Err(rejected(Stage::Archive, document));
        }
        Ok(format!("archived:{document}"))
    }

    async fn request_approval(&self, job_id: JobId) -> Result<(), StageError> {
        let _guard = self.enter(Stage::Approval).await;
        if self.approval_fails {
            return Err(rejected(Stage::Approval, &job_id.to_string()));
        }
        Ok(())
    }
}
