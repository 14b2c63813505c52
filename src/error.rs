use thiserror::Error;

use crate::stage::StageError;
use crate::state_machine::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {job_id} is {actual}, expected {expected}")]
    UnexpectedStatus {
        job_id: JobId,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("Worker pool saturated ({queue_capacity} tasks queued), job {job_id} was not scheduled")]
    Overloaded { job_id: JobId, queue_capacity: usize },

    #[error("Worker pool is shut down")]
    PoolClosed,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why a pipeline invocation failed. Always fatal to the job.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("pipeline cancelled")]
    Cancelled,

    #[error("document chain panicked: {0}")]
    ChainPanicked(String),
}
