//! Fixed-size pool of async workers fed by a bounded queue.
//!
//! Submission never waits: a slot is reserved with [`WorkerPool::try_reserve`]
//! and fails immediately when the queue is full. Callers can therefore reserve
//! first and only commit side effects once capacity is guaranteed.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("worker pool queue is full")]
    Saturated,
    #[error("worker pool is shut down")]
    Closed,
}

pub struct WorkerPool {
    sender: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

/// A reserved queue slot. Dropping it releases the slot unused.
pub struct TaskSlot<'a> {
    permit: mpsc::Permit<'a, Task>,
}

impl TaskSlot<'_> {
    pub fn submit<F>(self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.permit.send(Box::pin(task));
    }
}

impl WorkerPool {
    /// Spawn `worker_count` workers on the current tokio runtime.
    ///
    /// # Panics
    /// Panics if `worker_count` or `queue_capacity` is 0, or if called outside
    /// a tokio runtime.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        assert!(queue_capacity > 0, "queue_capacity must be > 0");

        let (sender, receiver) = mpsc::channel::<Task>(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..worker_count)
            .map(|worker_id| tokio::spawn(run_worker(worker_id, Arc::clone(&receiver))))
            .collect();

        info!(workers = worker_count, queue_capacity, "worker pool started");

        Self {
            sender,
            workers,
            queue_capacity,
        }
    }

    pub fn try_reserve(&self) -> Result<TaskSlot<'_>, PoolError> {
        match self.sender.try_reserve() {
            Ok(permit) => Ok(TaskSlot { permit }),
            Err(mpsc::error::TrySendError::Full(())) => Err(PoolError::Saturated),
            Err(mpsc::error::TrySendError::Closed(())) => Err(PoolError::Closed),
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Stop accepting work and wait for every queued task to finish.
    pub async fn shutdown(self) {
        info!("shutting down worker pool");
        drop(self.sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!(worker = i, error = %e, "worker terminated abnormally");
            }
        }

        info!("all workers have stopped");
    }
}

async fn run_worker(worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<Task>>>) {
    debug!(worker = worker_id, "worker started");

    loop {
        let task = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(task) = task else {
            break;
        };

        // Run each task on its own tokio task so a panic is contained.
        if let Err(e) = tokio::spawn(task).await {
            error!(worker = worker_id, error = %e, "task panicked");
        }
    }

    debug!(worker = worker_id, "worker stopped");
}
