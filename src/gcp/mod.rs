pub mod auth;
pub mod compute;
pub mod genomics;
pub mod types;

use thiserror::Error;

// Re-export commonly used items
pub use compute::{ComputeClient, ZoneOperationsApi};
pub use genomics::{GenomicsClient, PipelinesApi};
pub use types::{Operation, OperationHandle, ZoneOperation};

/// Errors surfaced by the HTTP clients.
///
/// `Transport` covers connection, TLS and timeout failures; `Http` is a
/// well-formed response with a non-success status; `Decode` means the
/// response body did not match the expected wire format.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

impl ApiError {
    /// Converts a non-success response into `Http`, preserving as much of
    /// the body as the server sent.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        ApiError::Http { status, body }
    }
}
