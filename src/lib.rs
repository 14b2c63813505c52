//! Orquestrador de jobs de documentos em lote com etapa de aprovação.
//!
//! Um job processa N documentos por um pipeline remoto
//! (`metadata → generate → upload → archive`). Jobs que exigem aprovação
//! param em `PENDING_APPROVAL` e só arquivam após a decisão.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod pool;
pub mod registry;
pub mod service;
pub mod stage;
pub mod state_machine;
pub mod ui;

pub use config::BatchConfig;
pub use dispatcher::{ApprovalOutcome, JobDispatcher};
pub use error::{BatchError, PipelineError};
pub use service::{ApprovalRequest, BatchRequest, BatchService};
pub use stage::{HttpStageClient, StageClient, StageError};
pub use state_machine::{Job, JobId, JobSnapshot, JobStatus};
