use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use super::error::StageError;
use super::types::Stage;
use crate::config::BatchConfig;
use crate::error::BatchError;
use crate::state_machine::JobId;

/// One asynchronous call per remote stage. Implementations never retry.
pub trait StageClient: Send + Sync + 'static {
    fn fetch_metadata(&self, index: usize) -> impl Future<Output = Result<String, StageError>> + Send;

    fn generate_document(
        &self,
        metadata: &str,
    ) -> impl Future<Output = Result<String, StageError>> + Send;

    fn upload_to_cloud(
        &self,
        document: &str,
    ) -> impl Future<Output = Result<String, StageError>> + Send;

    fn archive_document(
        &self,
        document: &str,
    ) -> impl Future<Output = Result<String, StageError>> + Send;

    fn request_approval(&self, job_id: JobId) -> impl Future<Output = Result<(), StageError>> + Send;
}

/// [`StageClient`] over HTTP. Every stage is a `POST` to `{base_url}{stage.path()}`.
pub struct HttpStageClient {
    client: Client,
    base_url: String,
}

impl HttpStageClient {
    pub fn new(config: &BatchConfig) -> Result<Self, BatchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client pointing at a custom base URL with default timeouts.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, BatchError> {
        let config = BatchConfig {
            base_url: base_url.into(),
            ..BatchConfig::default()
        };
        Self::new(&config)
    }

    fn url(&self, stage: Stage) -> String {
        format!("{}{}", self.base_url, stage.path())
    }

    fn post_text(&self, stage: Stage, body: &str) -> RequestBuilder {
        self.client
            .post(self.url(stage))
            .header(CONTENT_TYPE, "text/plain")
            .body(body.to_owned())
    }

    async fn send(&self, stage: Stage, request: RequestBuilder) -> Result<String, StageError> {
        let response = request
            .send()
            .await
            .map_err(|source| StageError::Network { stage, source })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StageError::Rejected {
                stage,
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| StageError::Network { stage, source })?;
        debug!(%stage, bytes = body.len(), "stage call succeeded");
        Ok(body)
    }
}

impl StageClient for HttpStageClient {
    async fn fetch_metadata(&self, index: usize) -> Result<String, StageError> {
        let request = self.client.post(self.url(Stage::Metadata)).json(&index);
        self.send(Stage::Metadata, request).await
    }

    async fn generate_document(&self, metadata: &str) -> Result<String, StageError> {
        self.send(Stage::Generate, self.post_text(Stage::Generate, metadata))
            .await
    }

    async fn upload_to_cloud(&self, document: &str) -> Result<String, StageError> {
        self.send(Stage::Upload, self.post_text(Stage::Upload, document))
            .await
    }

    async fn archive_document(&self, document: &str) -> Result<String, StageError> {
        self.send(Stage::Archive, self.post_text(Stage::Archive, document))
            .await
    }

    async fn request_approval(&self, job_id: JobId) -> Result<(), StageError> {
        let request = self.client.post(self.url(Stage::Approval)).json(&job_id);
        self.send(Stage::Approval, request).await.map(|_| ())
    }
}
