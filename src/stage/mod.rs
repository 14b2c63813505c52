pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod scripted;
pub mod types;

pub use client::{HttpStageClient, StageClient};
pub use error::StageError;
pub use types::Stage;
