use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::warn;
use uuid::Uuid;

use super::state::JobStatus;
use crate::error::BatchError;

/// Process-unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// High half of a random v4 UUID, kept within the non-negative `i64` range.
    pub fn random() -> Self {
        let high = (Uuid::new_v4().as_u128() >> 64) as u64;
        Self(high & i64::MAX as u64)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
struct StatusLog {
    history: Vec<JobStatus>,
    updated_at: DateTime<Utc>,
}

/// One batch job of N documents.
///
/// Shared as `Arc<Job>` between the registry, the dispatcher and the pipeline
/// currently driving it. Status changes go through [`Job::transition`], which
/// enforces the state machine atomically.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    number_of_documents: usize,
    needs_approval: bool,
    created_at: DateTime<Utc>,
    status: watch::Sender<JobStatus>,
    log: Mutex<StatusLog>,
    documents: Mutex<Vec<String>>,
    finished_documents: AtomicUsize,
}

impl Job {
    pub fn new(id: JobId, number_of_documents: usize, needs_approval: bool) -> Self {
        let now = Utc::now();
        let (status, _) = watch::channel(JobStatus::Pending);
        Self {
            id,
            number_of_documents,
            needs_approval,
            created_at: now,
            status,
            log: Mutex::new(StatusLog {
                history: vec![JobStatus::Pending],
                updated_at: now,
            }),
            documents: Mutex::new(Vec::new()),
            finished_documents: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn number_of_documents(&self) -> usize {
        self.number_of_documents
    }

    pub fn needs_approval(&self) -> bool {
        self.needs_approval
    }

    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    pub fn finished_documents(&self) -> usize {
        self.finished_documents.load(Ordering::SeqCst)
    }

    /// Move the job to `next`, returning the status it left.
    ///
    /// The check and the update happen under the same lock, so two racing
    /// callers cannot both leave the same status.
    pub fn transition(&self, next: JobStatus) -> Result<JobStatus, BatchError> {
        let mut outcome = Err(JobStatus::Pending);
        self.status.send_if_modified(|current| {
            if !current.can_transition_to(next) {
                outcome = Err(*current);
                return false;
            }
            outcome = Ok(*current);
            *current = next;
            let mut log = lock(&self.log);
            log.history.push(next);
            log.updated_at = Utc::now();
            true
        });

        outcome.map_err(|from| BatchError::InvalidTransition {
            job_id: self.id,
            from,
            to: next,
        })
    }

    /// Fails with [`BatchError::UnexpectedStatus`] unless the job is in `expected`.
    pub fn ensure_status(&self, expected: JobStatus) -> Result<(), BatchError> {
        let actual = self.status();
        if actual == expected {
            Ok(())
        } else {
            Err(BatchError::UnexpectedStatus {
                job_id: self.id,
                expected,
                actual,
            })
        }
    }

    /// Resolves once the status satisfies `predicate`.
    pub async fn wait_until(&self, predicate: impl Fn(JobStatus) -> bool) -> JobStatus {
        let mut receiver = self.status.subscribe();
        match receiver.wait_for(|status| predicate(*status)).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    /// Subscribe to status changes.
    pub fn watch(&self) -> watch::Receiver<JobStatus> {
        self.status.subscribe()
    }

    /// Append an uploaded document awaiting archival. Safe under concurrent writers.
    pub(crate) fn stage_document(&self, document: String) {
        lock(&self.documents).push(document);
    }

    /// Copy of the documents staged for archival.
    pub fn staged_documents(&self) -> Vec<String> {
        lock(&self.documents).clone()
    }

    /// Count one more archived document, never exceeding `number_of_documents`.
    pub(crate) fn record_finished(&self) -> usize {
        let limit = self.number_of_documents;
        match self
            .finished_documents
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            }) {
            Ok(previous) => previous + 1,
            Err(current) => {
                warn!(job_id = %self.id, finished = current, "finished counter already at document count");
                current
            }
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let status = self.status();
        let (status_history, updated_at) = {
            let log = lock(&self.log);
            (log.history.clone(), log.updated_at)
        };
        JobSnapshot {
            id: self.id,
            status,
            number_of_documents: self.number_of_documents,
            needs_approval: self.needs_approval,
            finished_documents: self.finished_documents(),
            staged_documents: lock(&self.documents).len(),
            status_history,
            created_at: self.created_at,
            updated_at,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only view of a job at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    pub number_of_documents: usize,
    pub needs_approval: bool,
    pub finished_documents: usize,
    pub staged_documents: usize,
    pub status_history: Vec<JobStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
