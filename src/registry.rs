//! Append-only, in-memory registry of every job created by this process.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::state_machine::{Job, JobId, JobSnapshot};

#[derive(Debug, Default)]
struct Entries {
    ordered: Vec<Arc<Job>>,
    by_id: HashMap<JobId, Arc<Job>>,
}

/// Owns all jobs for the life of the process. Jobs are never removed.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: RwLock<Entries>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new PENDING job under a fresh id.
    pub fn create(&self, number_of_documents: usize, needs_approval: bool) -> Arc<Job> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut id = JobId::random();
        while entries.by_id.contains_key(&id) {
            id = JobId::random();
        }

        let job = Arc::new(Job::new(id, number_of_documents, needs_approval));
        entries.ordered.push(Arc::clone(&job));
        entries.by_id.insert(id, Arc::clone(&job));
        job
    }

    pub fn get(&self, id: JobId) -> Option<Arc<Job>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_id
            .get(&id)
            .cloned()
    }

    /// Snapshots of every job, in creation order.
    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        self.jobs().iter().map(|job| job.snapshot()).collect()
    }

    /// Handles to every job, in creation order.
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
