//! Client for the remote prediction service.
//!
//! The contract is a single `POST` of a multipart form with one `file`
//! field. The service answers with a result object, or with an object
//! carrying an `error` field.

use super::{AnalysisError, Analyzer};
use crate::models::AnalysisResult;
use crate::upload::UploadedFile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/predict";

/// Configuration for the remote analyzer.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Full URL of the prediction endpoint.
    pub endpoint: String,
    /// Optional request timeout. `None` waits indefinitely.
    pub timeout_seconds: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_seconds: None,
        }
    }
}

/// Analyzer backed by the HTTP prediction service.
pub struct RemoteAnalyzer {
    config: RemoteConfig,
    http_client: reqwest::Client,
}

impl RemoteAnalyzer {
    /// Create an analyzer for the configured endpoint.
    pub fn new(config: RemoteConfig) -> Result<Self> {
        info!("Using prediction endpoint {}", config.endpoint);

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl Analyzer for RemoteAnalyzer {
    fn name(&self) -> &str {
        "remote"
    }

    async fn analyze(&self, file: &UploadedFile) -> Result<AnalysisResult, AnalysisError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| AnalysisError::Transport(format!("Invalid MIME type: {}", e)))?;
        let form = Form::new().part("file", part);

        debug!(
            "POST {} with {} ({} bytes)",
            self.config.endpoint,
            file.name,
            file.size()
        );

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AnalysisError::Transport(format!(
                        "Request timed out after {}s",
                        self.config.timeout_seconds.unwrap_or_default()
                    ))
                } else if e.is_connect() {
                    AnalysisError::Transport(format!(
                        "Cannot connect to prediction service at {}",
                        self.config.endpoint
                    ))
                } else {
                    AnalysisError::Transport(format!("Failed to send request: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(format!("Failed to read response: {}", e)))?;

        debug!("Prediction service answered {} ({} bytes)", status, body.len());
        interpret_response(status.as_u16(), &body)
    }
}

/// Turn a status code and raw body into a result or an error.
pub fn interpret_response(status: u16, body: &str) -> Result<AnalysisResult, AnalysisError> {
    let success = (200..300).contains(&status);

    let json: Value = match serde_json::from_str(body) {
        Ok(json) => json,
        Err(e) if success => return Err(AnalysisError::MalformedResponse(e.to_string())),
        Err(_) => return Err(AnalysisError::Status { status }),
    };

    if let Some(message) = structured_error(&json) {
        warn!("Prediction service reported an error: {}", message);
        return Err(AnalysisError::Server(message));
    }

    if !success {
        return Err(AnalysisError::Status { status });
    }

    let result: AnalysisResult = serde_json::from_value(json)
        .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

    if result.top3.len() != 3 {
        warn!(
            "Result {} carries {} top predictions instead of 3",
            result.id,
            result.top3.len()
        );
    }

    Ok(result)
}

/// Extract the `error` field when it is truthy.
fn structured_error(json: &Value) -> Option<String> {
    let error = json.get("error")?;
    if !is_truthy(error) {
        return None;
    }

    Some(match error {
        Value::String(message) => message.clone(),
        other => other.to_string(),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
