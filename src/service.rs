//! Boundary operations: submit a batch, list jobs, decide on approvals and
//! render the results listing.

use std::fmt::Write as _;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::BatchConfig;
use crate::dispatcher::{ApprovalOutcome, JobDispatcher};
use crate::error::BatchError;
use crate::orchestrator::{PipelineOrchestrator, PipelineSettings};
use crate::pool::WorkerPool;
use crate::registry::JobRegistry;
use crate::stage::StageClient;
use crate::state_machine::{Job, JobId, JobSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub number_of_documents: usize,
    #[serde(default)]
    pub needs_approval: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub job_id: JobId,
    pub approved: bool,
}

pub struct BatchService<C> {
    dispatcher: JobDispatcher<C>,
}

impl<C: StageClient> BatchService<C> {
    /// Wire registry, orchestrator and worker pool together.
    ///
    /// Must be called from within a tokio runtime; the pool spawns its workers
    /// immediately.
    pub fn new(client: C, config: &BatchConfig) -> Self {
        let orchestrator = Arc::new(PipelineOrchestrator::new(
            Arc::new(client),
            PipelineSettings::from(config),
        ));
        let pool = WorkerPool::new(config.workers, config.queue_capacity);
        Self {
            dispatcher: JobDispatcher::new(Arc::new(JobRegistry::new()), orchestrator, pool),
        }
    }

    /// Register a job and schedule its full pipeline.
    ///
    /// On [`BatchError::Overloaded`] the job stays registered as PENDING.
    pub fn submit_batch(&self, request: &BatchRequest) -> Result<Arc<Job>, BatchError> {
        let job = self.dispatcher.create_job(request)?;
        self.dispatcher.submit_full_job(Arc::clone(&job))?;
        Ok(job)
    }

    pub fn list_jobs(&self) -> Vec<JobSnapshot> {
        self.registry().snapshots()
    }

    pub fn job(&self, id: JobId) -> Option<Arc<Job>> {
        self.registry().get(id)
    }

    pub fn submit_approval(&self, request: &ApprovalRequest) -> Result<ApprovalOutcome, BatchError> {
        let job = self
            .job(request.job_id)
            .ok_or(BatchError::JobNotFound(request.job_id))?;
        self.dispatcher.submit_archive_job(job, request.approved)
    }

    /// Plain-text listing of every job, in creation order.
    pub fn results_report(&self) -> String {
        let mut report = String::new();
        for job in self.list_jobs() {
            let _ = write!(
                report,
                "Job ID: {}\nStatus: {}\nFinished documents: {}\n\n",
                job.id, job.status, job.finished_documents
            );
        }
        report
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.dispatcher.registry()
    }

    pub fn cancel_all(&self) {
        self.dispatcher.cancel_all();
    }

    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::scripted::ScriptedStageClient;
    use crate::state_machine::JobStatus;
    use std::time::Duration;

    fn service(client: ScriptedStageClient) -> BatchService<ScriptedStageClient> {
        BatchService::new(client, &BatchConfig::default())
    }

    async fn settle(job: &Job) -> JobStatus {
        tokio::time::timeout(Duration::from_secs(5), job.wait_until(JobStatus::is_settled))
            .await
            .expect("job never settled")
    }

    #[test]
    fn requests_use_camel_case_fields() {
        let batch: BatchRequest =
            serde_json::from_str(r#"{"numberOfDocuments": 3, "needsApproval": true}"#).unwrap();
        assert_eq!(batch.number_of_documents, 3);
        assert!(batch.needs_approval);

        let batch: BatchRequest = serde_json::from_str(r#"{"numberOfDocuments": 1}"#).unwrap();
        assert!(!batch.needs_approval);

        let approval: ApprovalRequest =
            serde_json::from_str(r#"{"jobId": 99, "approved": false}"#).unwrap();
        assert_eq!(approval.job_id, JobId::from(99));
        assert!(!approval.approved);
    }

    #[tokio::test]
    async fn batch_without_approval_completes() {
        let service = service(ScriptedStageClient::new());
        let job = service
            .submit_batch(&BatchRequest {
                number_of_documents: 3,
                needs_approval: false,
            })
            .unwrap();

        assert_eq!(settle(&job).await, JobStatus::Completed);
        let jobs = service.list_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].finished_documents, 3);
    }

    #[tokio::test]
    async fn approved_batch_is_archived() {
        let service = service(ScriptedStageClient::new());
        let job = service
            .submit_batch(&BatchRequest {
                number_of_documents: 2,
                needs_approval: true,
            })
            .unwrap();
        assert_eq!(settle(&job).await, JobStatus::PendingApproval);
        assert_eq!(job.finished_documents(), 0);

        let outcome = service
            .submit_approval(&ApprovalRequest {
                job_id: job.id(),
                approved: true,
            })
            .unwrap();

        assert_eq!(outcome, ApprovalOutcome::ArchivingScheduled);
        assert_eq!(settle(&job).await, JobStatus::Completed);
        assert_eq!(job.finished_documents(), 2);
    }

    #[tokio::test]
    async fn unknown_job_id_is_not_found() {
        let service = service(ScriptedStageClient::new());
        let err = service
            .submit_approval(&ApprovalRequest {
                job_id: JobId::from(12345),
                approved: true,
            })
            .unwrap_err();
        assert!(matches!(err, BatchError::JobNotFound(id) if id == JobId::from(12345)));
        assert!(service.list_jobs().is_empty());
    }

    #[tokio::test]
    async fn failing_document_fails_job_and_report_shows_it() {
        let client = ScriptedStageClient::new().failing_generate_at(3);
        let service = service(client);
        let job = service
            .submit_batch(&BatchRequest {
                number_of_documents: 10,
                needs_approval: false,
            })
            .unwrap();

        assert_eq!(settle(&job).await, JobStatus::Failed);
        let report = service.results_report();
        assert!(report.starts_with(&format!("Job ID: {}\nStatus: FAILED\n", job.id())));
    }

    #[tokio::test]
    async fn results_report_lists_jobs_in_order() {
        let service = service(ScriptedStageClient::new());
        let first = service
            .submit_batch(&BatchRequest {
                number_of_documents: 1,
                needs_approval: false,
            })
            .unwrap();
        let second = service
            .submit_batch(&BatchRequest {
                number_of_documents: 2,
                needs_approval: true,
            })
            .unwrap();
        settle(&first).await;
        settle(&second).await;

        let expected = format!(
            "Job ID: {}\nStatus: COMPLETED\nFinished documents: 1\n\n\
             Job ID: {}\nStatus: PENDING_APPROVAL\nFinished documents: 0\n\n",
            first.id(),
            second.id()
        );
        assert_eq!(service.results_report(), expected);
    }

    #[tokio::test]
    async fn rejected_batch_skips_archive() {
        let service = service(ScriptedStageClient::new());
        let job = service
            .submit_batch(&BatchRequest {
                number_of_documents: 2,
                needs_approval: true,
            })
            .unwrap();
        settle(&job).await;

        let outcome = service
            .submit_approval(&ApprovalRequest {
                job_id: job.id(),
                approved: false,
            })
            .unwrap();

        assert_eq!(outcome, ApprovalOutcome::Rejected);
        assert_eq!(job.status(), JobStatus::Rejected);
        assert_eq!(job.finished_documents(), 0);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn archive_failure_after_approval_fails_job() {
        let service = service(ScriptedStageClient::new().failing_archive_at(0));
        let job = service
            .submit_batch(&BatchRequest {
                number_of_documents: 3,
                needs_approval: true,
            })
            .unwrap();
        settle(&job).await;
        service
            .submit_approval(&ApprovalRequest {
                job_id: job.id(),
                approved: true,
            })
            .unwrap();

        assert_eq!(settle(&job).await, JobStatus::Failed);
        assert!(job.finished_documents() < 3);
    }
}
