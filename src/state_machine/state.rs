use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a batch job.
///
/// ```text
/// PENDING → IN_PROGRESS → COMPLETED
///                       → FAILED
///                       → PENDING_APPROVAL → REJECTED
///                                          → ARCHIVING → COMPLETED
///                                                      → FAILED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    PendingApproval,
    Archiving,
    Completed,
    Failed,
    Rejected,
}

impl JobStatus {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (InProgress, Completed)
                | (InProgress, PendingApproval)
                | (InProgress, Failed)
                | (PendingApproval, Archiving)
                | (PendingApproval, Rejected)
                | (Archiving, Completed)
                | (Archiving, Failed)
        )
    }

    /// No outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Rejected
        )
    }

    /// No pipeline is running for a job in this status.
    pub fn is_settled(self) -> bool {
        self.is_terminal() || self == JobStatus::PendingApproval
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::InProgress => write!(f, "IN_PROGRESS"),
            JobStatus::PendingApproval => write!(f, "PENDING_APPROVAL"),
            JobStatus::Archiving => write!(f, "ARCHIVING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
            JobStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}
