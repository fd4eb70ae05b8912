//! Client for the Genomics v2alpha1 pipelines API.
//!
//! `PipelinesApi` is the seam the orchestrator drives; `GenomicsClient`
//! is the HTTP implementation. Submission is not idempotent: every
//! `run_pipeline` call starts a new billable remote execution.

use async_trait::async_trait;
use serde::Deserialize;

use crate::gcp::types::{Operation, OperationHandle, RunPipelineRequest};
use crate::gcp::ApiError;

const DEFAULT_BASE_URL: &str = "https://genomics.googleapis.com";

#[async_trait]
pub trait PipelinesApi: Send + Sync {
    /// Starts a new pipeline run and returns its operation handle.
    async fn run_pipeline(&self, request: &RunPipelineRequest)
        -> Result<OperationHandle, ApiError>;

    /// Reads the current state of a running operation.
    async fn get_operation(&self, handle: &OperationHandle) -> Result<Operation, ApiError>;
}

pub struct GenomicsClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

/// `pipelines:run` responds with the bare operation envelope; only the
/// name matters at submission time.
#[derive(Debug, Deserialize)]
struct SubmittedOperation {
    name: String,
}

impl GenomicsClient {
    pub fn new(http: reqwest::Client, token: String) -> Self {
        Self::with_base_url(http, token, DEFAULT_BASE_URL.to_string())
    }

    /// Overrides the API endpoint, for tests and private service connect.
    pub fn with_base_url(http: reqwest::Client, token: String, base_url: String) -> Self {
        Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PipelinesApi for GenomicsClient {
    async fn run_pipeline(
        &self,
        request: &RunPipelineRequest,
    ) -> Result<OperationHandle, ApiError> {
        let url = format!("{}/v2alpha1/pipelines:run", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        let submitted: SubmittedOperation = response.json().await?;
        log::info!("Submitted pipeline run {}", submitted.name);
        Ok(OperationHandle(submitted.name))
    }

    async fn get_operation(&self, handle: &OperationHandle) -> Result<Operation, ApiError> {
        let url = format!("{}/v2alpha1/{}", self.base_url, handle.0);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        Ok(response.json().await?)
    }
}
