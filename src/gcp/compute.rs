//! Client for the Compute Engine zone-operations listing, used to confirm
//! whether a specific instance was preempted.

use async_trait::async_trait;

use crate::gcp::types::{ZoneOperation, ZoneOperationList};
use crate::gcp::ApiError;

const DEFAULT_BASE_URL: &str = "https://compute.googleapis.com";

#[async_trait]
pub trait ZoneOperationsApi: Send + Sync {
    /// Lists infrastructure operations in `project`/`zone` matching the
    /// given filter expression. An empty vec means no match.
    async fn list_operations(
        &self,
        project: &str,
        zone: &str,
        filter: &str,
    ) -> Result<Vec<ZoneOperation>, ApiError>;
}

pub struct ComputeClient {
    http: reqwest::Client,
    token: String,
    base_url: String,
}

impl ComputeClient {
    pub fn new(http: reqwest::Client, token: String) -> Self {
        Self::with_base_url(http, token, DEFAULT_BASE_URL.to_string())
    }

    /// Overrides the API endpoint, for tests.
    pub fn with_base_url(http: reqwest::Client, token: String, base_url: String) -> Self {
        Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ZoneOperationsApi for ComputeClient {
    async fn list_operations(
        &self,
        project: &str,
        zone: &str,
        filter: &str,
    ) -> Result<Vec<ZoneOperation>, ApiError> {
        let url = format!(
            "{}/compute/v1/projects/{project}/zones/{zone}/operations",
            self.base_url
        );
        let response = self
            .http
            .get(&url)
            .query(&[("filter", filter)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(response).await);
        }

        let list: ZoneOperationList = response.json().await?;
        Ok(list.items.unwrap_or_default())
    }
}
