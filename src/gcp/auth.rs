//! Bearer-token acquisition for the GCP HTTP clients.
//!
//! The runner does not manage credentials. It takes a ready-made access
//! token from `GOOGLE_OAUTH_ACCESS_TOKEN` when set, and otherwise asks
//! the GCE metadata server for the default service account's token.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

const TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const METADATA_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Resolves an OAuth2 access token for the cloud-platform scope.
pub async fn access_token(http: &reqwest::Client) -> Result<String> {
    if let Ok(token) = std::env::var(TOKEN_ENV_VAR) {
        if !token.trim().is_empty() {
            log::debug!("Using access token from {TOKEN_ENV_VAR}");
            return Ok(token.trim().to_string());
        }
    }

    let response = http
        .get(METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .timeout(METADATA_TIMEOUT)
        .send()
        .await
        .context("Failed to reach the GCE metadata server")?;

    if !response.status().is_success() {
        anyhow::bail!(
            "Metadata server returned {} for the token request",
            response.status()
        );
    }

    let token: MetadataToken = response
        .json()
        .await
        .context("Failed to decode metadata token response")?;

    Ok(token.access_token)
}
