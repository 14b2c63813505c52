mod fan_out;

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::stage::{StageClient, StageError};
use crate::state_machine::{Job, JobId, JobStatus};

pub use fan_out::{fan_out, FanOutPolicy};

/// Concurrency settings for both pipeline kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub full_fan_out: usize,
    pub archive_fan_out: usize,
    pub abort_siblings_on_failure: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            full_fan_out: 10,
            archive_fan_out: 20,
            abort_siblings_on_failure: false,
        }
    }
}

impl From<&BatchConfig> for PipelineSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            full_fan_out: config.full_fan_out,
            archive_fan_out: config.archive_fan_out,
            abort_siblings_on_failure: config.abort_siblings_on_failure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Full,
    Archive,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Full => write!(f, "full"),
            PipelineKind::Archive => write!(f, "archive"),
        }
    }
}

/// Outcome of one pipeline invocation. The failure text is for logs only
/// and is not kept on the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub job_id: JobId,
    pub kind: PipelineKind,
    pub status: JobStatus,
    pub chains_completed: usize,
    /// `Some(delivered)` when an approval request was issued.
    pub approval_requested: Option<bool>,
    pub failure: Option<String>,
}

/// Drives jobs through the full and archive pipelines and performs every
/// status transition those pipelines cause.
pub struct PipelineOrchestrator<C> {
    client: Arc<C>,
    settings: PipelineSettings,
}

impl<C: StageClient> PipelineOrchestrator<C> {
    pub fn new(client: Arc<C>, settings: PipelineSettings) -> Self {
        Self { client, settings }
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    /// Run metadata → generate → upload → (stage | archive) for every document.
    ///
    /// The job must be IN_PROGRESS. Ends in COMPLETED, PENDING_APPROVAL or FAILED.
    pub async fn run_full(
        &self,
        job: &Arc<Job>,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport, BatchError> {
        job.ensure_status(JobStatus::InProgress)?;
        info!(
            job_id = %job.id(),
            documents = job.number_of_documents(),
            needs_approval = job.needs_approval(),
            "processing job"
        );

        let policy = FanOutPolicy {
            limit: self.settings.full_fan_out,
            abort_siblings_on_failure: self.settings.abort_siblings_on_failure,
        };
        let indices: Vec<usize> = (0..job.number_of_documents()).collect();
        let outcome = fan_out(indices, policy, cancel, |index| {
            let client = Arc::clone(&self.client);
            let job = Arc::clone(job);
            async move { process_document(client.as_ref(), &job, index).await }
        })
        .await;

        let mut report = PipelineReport {
            job_id: job.id(),
            kind: PipelineKind::Full,
            status: JobStatus::Failed,
            chains_completed: 0,
            approval_requested: None,
            failure: None,
        };

        match outcome {
            Ok(completed) if job.needs_approval() => {
                report.chains_completed = completed;
                job.transition(JobStatus::PendingApproval)?;
                info!(job_id = %job.id(), staged = completed, "job pending approval");
                report.approval_requested = Some(self.request_approval(job.id()).await);
            }
            Ok(completed) => {
                report.chains_completed = completed;
                job.transition(JobStatus::Completed)?;
                info!(job_id = %job.id(), finished = job.finished_documents(), "job completed");
            }
            Err(err) => {
                job.transition(JobStatus::Failed)?;
                error!(job_id = %job.id(), error = %err, "job failed");
                report.failure = Some(err.to_string());
            }
        }

        report.status = job.status();
        Ok(report)
    }

    /// Archive every staged document. The job must be ARCHIVING.
    /// Ends in COMPLETED or FAILED.
    pub async fn run_archive(
        &self,
        job: &Arc<Job>,
        cancel: &CancellationToken,
    ) -> Result<PipelineReport, BatchError> {
        job.ensure_status(JobStatus::Archiving)?;
        let documents = job.staged_documents();
        info!(job_id = %job.id(), documents = documents.len(), "archiving job");

        let policy = FanOutPolicy {
            limit: self.settings.archive_fan_out,
            abort_siblings_on_failure: self.settings.abort_siblings_on_failure,
        };
        let outcome = fan_out(documents, policy, cancel, |document| {
            let client = Arc::clone(&self.client);
            let job = Arc::clone(job);
            async move {
                client.archive_document(&document).await?;
                job.record_finished();
                Ok::<(), StageError>(())
            }
        })
        .await;

        let mut report = PipelineReport {
            job_id: job.id(),
            kind: PipelineKind::Archive,
            status: JobStatus::Failed,
            chains_completed: 0,
            approval_requested: None,
            failure: None,
        };

        match outcome {
            Ok(completed) => {
                report.chains_completed = completed;
                job.transition(JobStatus::Completed)?;
                info!(job_id = %job.id(), finished = job.finished_documents(), "job completed");
            }
            Err(err) => {
                job.transition(JobStatus::Failed)?;
                error!(job_id = %job.id(), error = %err, "archiving failed");
                report.failure = Some(err.to_string());
            }
        }

        report.status = job.status();
        Ok(report)
    }

    // A failed approval request is logged and leaves the job PENDING_APPROVAL.
    async fn request_approval(&self, job_id: JobId) -> bool {
        match self.client.request_approval(job_id).await {
            Ok(()) => {
                info!(%job_id, "approval request sent");
                true
            }
            Err(err) => {
                warn!(%job_id, error = %err, "approval request failed");
                false
            }
        }
    }
}

async fn process_document<C: StageClient>(
    client: &C,
    job: &Job,
    index: usize,
) -> Result<(), StageError> {
    let metadata = client.fetch_metadata(index).await?;
    debug!(job_id = %job.id(), index, "metadata received");

    let document = client.generate_document(&metadata).await?;
    debug!(job_id = %job.id(), index, "document generated");

    client.upload_to_cloud(&document).await?;
    debug!(job_id = %job.id(), index, "document uploaded");

    if job.needs_approval() {
        job.stage_document(document);
    } else {
        client.archive_document(&document).await?;
        job.record_finished();
    }
    Ok(())
}
