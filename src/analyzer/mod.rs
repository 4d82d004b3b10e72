//! Analysis back-ends.
//!
//! An [`Analyzer`] turns a validated upload into an [`AnalysisResult`].
//! The remote analyzer posts the image to the prediction service; the
//! mock analyzer returns canned results for demos without a server.

pub mod mock;
pub mod remote;

pub use mock::MockAnalyzer;
pub use remote::{RemoteAnalyzer, RemoteConfig};

use crate::config::ClientConfig;
use crate::models::AnalysisResult;
use crate::upload::UploadedFile;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Message shown for any failure the service did not describe itself.
pub const FAILURE_MESSAGE: &str = "Analysis failed. Please try again.";

/// Message shown when the service answered with an unexpected body.
pub const MALFORMED_MESSAGE: &str =
    "Analysis failed: the service returned an unexpected response. Please try again or use another image.";

/// Why an analysis did not produce a result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// The request never completed (connection refused, timeout, ...).
    #[error("Failed to reach prediction service: {0}")]
    Transport(String),

    /// Non-success status without a structured error body.
    #[error("Prediction service returned HTTP {status}")]
    Status { status: u16 },

    /// The service reported an error message of its own.
    #[error("{0}")]
    Server(String),

    /// Success status, but the body is not a result.
    #[error("Malformed prediction response: {0}")]
    MalformedResponse(String),
}

impl AnalysisError {
    /// Text for the dismissible error banner. Server-supplied messages are
    /// surfaced verbatim; everything else gets a fixed message.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Server(message) => message.clone(),
            AnalysisError::MalformedResponse(_) => MALFORMED_MESSAGE.to_string(),
            AnalysisError::Transport(_) | AnalysisError::Status { .. } => {
                FAILURE_MESSAGE.to_string()
            }
        }
    }
}

/// Something that can classify an uploaded image.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Short name for logs and status output.
    fn name(&self) -> &str;

    /// Classify one image. Exactly one request per call; no retries.
    async fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalysisError>;
}

/// Pick the mock generator or the remote client from the client settings.
///
/// `mock_index` pins the mock record and is ignored for the remote client.
pub fn build_analyzer(
    config: &ClientConfig,
    mock_index: Option<usize>,
) -> Result<Box<dyn Analyzer>> {
    if config.mock {
        let mock = match mock_index {
            Some(index) => MockAnalyzer::fixed(index),
            None => MockAnalyzer::new(),
        };
        return Ok(Box::new(mock));
    }

    if mock_index.is_some() {
        warn!("--mock-index has no effect without the mock analyzer");
    }

    let remote = RemoteAnalyzer::new(RemoteConfig {
        endpoint: config.endpoint.clone(),
        timeout_seconds: config.timeout_seconds,
    })?;
    Ok(Box::new(remote))
}
