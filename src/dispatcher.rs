//! Hands jobs to the worker pool.
//!
//! The dispatcher owns the statuses that mark a job as scheduled
//! (IN_PROGRESS, ARCHIVING) plus REJECTED. A slot in the pool is always
//! reserved before the status moves, so a saturated pool never strands a job
//! in a running status with nothing driving it.

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::BatchError;
use crate::orchestrator::{PipelineOrchestrator, PipelineReport};
use crate::pool::{PoolError, TaskSlot, WorkerPool};
use crate::registry::JobRegistry;
use crate::service::BatchRequest;
use crate::stage::StageClient;
use crate::state_machine::{Job, JobId, JobStatus};

/// What an approval decision led to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalOutcome {
    Rejected,
    ArchivingScheduled,
}

pub struct JobDispatcher<C> {
    registry: Arc<JobRegistry>,
    orchestrator: Arc<PipelineOrchestrator<C>>,
    pool: WorkerPool,
    // Parent of every scheduled pipeline's token. Replaced on each cancel_all.
    cancel: Mutex<CancellationToken>,
}

impl<C: StageClient> JobDispatcher<C> {
    pub fn new(
        registry: Arc<JobRegistry>,
        orchestrator: Arc<PipelineOrchestrator<C>>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            registry,
            orchestrator,
            pool,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Register a PENDING job for `request`.
    pub fn create_job(&self, request: &BatchRequest) -> Result<Arc<Job>, BatchError> {
        if request.number_of_documents == 0 {
            return Err(BatchError::InvalidRequest(
                "numberOfDocuments must be greater than 0".into(),
            ));
        }
        let job = self
            .registry
            .create(request.number_of_documents, request.needs_approval);
        info!(
            job_id = %job.id(),
            documents = job.number_of_documents(),
            needs_approval = job.needs_approval(),
            "job created"
        );
        Ok(job)
    }

    /// Schedule the full pipeline for a PENDING job.
    pub fn submit_full_job(&self, job: Arc<Job>) -> Result<(), BatchError> {
        job.ensure_status(JobStatus::Pending)?;
        let slot = self.reserve(job.id())?;
        job.transition(JobStatus::InProgress)?;

        let orchestrator = Arc::clone(&self.orchestrator);
        let cancel = self.child_token();
        slot.submit(async move {
            let outcome = orchestrator.run_full(&job, &cancel).await;
            log_outcome(job.id(), outcome);
        });
        Ok(())
    }

    /// Apply an approval decision to a PENDING_APPROVAL job.
    ///
    /// A rejection is applied immediately without remote calls. An approval
    /// schedules the archive pipeline.
    pub fn submit_archive_job(
        &self,
        job: Arc<Job>,
        approved: bool,
    ) -> Result<ApprovalOutcome, BatchError> {
        if !approved {
            job.transition(JobStatus::Rejected)?;
            info!(job_id = %job.id(), "job rejected");
            return Ok(ApprovalOutcome::Rejected);
        }

        let current = job.status();
        if !current.can_transition_to(JobStatus::Archiving) {
            return Err(BatchError::InvalidTransition {
                job_id: job.id(),
                from: current,
                to: JobStatus::Archiving,
            });
        }
        let slot = self.reserve(job.id())?;
        // A racing decision may have won since the check; the slot is released on error.
        job.transition(JobStatus::Archiving)?;
        info!(job_id = %job.id(), "job approved");

        let orchestrator = Arc::clone(&self.orchestrator);
        let cancel = self.child_token();
        slot.submit(async move {
            let outcome = orchestrator.run_archive(&job, &cancel).await;
            log_outcome(job.id(), outcome);
        });
        Ok(ApprovalOutcome::ArchivingScheduled)
    }

    /// Cancel every pipeline already scheduled, running or queued. The
    /// affected jobs end FAILED. Jobs submitted afterwards run normally.
    pub fn cancel_all(&self) {
        warn!("cancelling all scheduled pipelines");
        let previous = {
            let mut root = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
            mem::replace(&mut *root, CancellationToken::new())
        };
        previous.cancel();
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Stop accepting work and wait for queued pipelines to finish.
    pub async fn shutdown(self) {
        self.pool.shutdown().await;
    }

    fn child_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .child_token()
    }

    fn reserve(&self, job_id: JobId) -> Result<TaskSlot<'_>, BatchError> {
        self.pool.try_reserve().map_err(|err| match err {
            PoolError::Saturated => {
                warn!(%job_id, queue_capacity = self.pool.queue_capacity(), "worker pool saturated");
                BatchError::Overloaded {
                    job_id,
                    queue_capacity: self.pool.queue_capacity(),
                }
            }
            PoolError::Closed => BatchError::PoolClosed,
        })
    }
}

fn log_outcome(job_id: JobId, outcome: Result<PipelineReport, BatchError>) {
    match outcome {
        Ok(report) => info!(
            %job_id,
            kind = %report.kind,
            status = %report.status,
            chains_completed = report.chains_completed,
            "pipeline finished"
        ),
        Err(err) => error!(%job_id, error = %err, "pipeline did not run"),
    }
}
