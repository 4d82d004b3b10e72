//! Image selection and client-side upload validation.
//!
//! This module holds the selected file model and the policy that decides
//! whether a file may be sent for analysis. Validation runs at selection
//! time, before the view state changes.

pub mod preview;

pub use preview::PreviewHandle;

use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// MIME types accepted for analysis.
pub const ACCEPTED_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Maximum upload size in bytes (10 MiB).
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// A selected image, as the user's file picker would hand it over.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name without directories.
    pub name: String,
    /// Declared MIME type.
    pub mime_type: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Creates a file from in-memory bytes.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads a file from disk. The declared type is guessed from the
    /// extension, the way a browser fills in `File.type`.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image: {}", path.display()))?;

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();

        let mime_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();

        debug!(
            "Loaded {} ({} bytes, declared as {})",
            name,
            bytes.len(),
            mime_type
        );

        Ok(Self::new(name, mime_type, bytes))
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Size formatted in MiB with two decimals.
    pub fn size_label(&self) -> String {
        format!("{:.2} MiB", self.size() as f64 / BYTES_PER_MIB)
    }

    /// Extension matching the declared type, used for the preview copy.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "bin",
        }
    }
}

impl fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Reason a selected file was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unsupported format ({mime_type}). Please use a {accepted} image.")]
    UnsupportedType { mime_type: String, accepted: String },

    #[error(
        "File too large ({:.1} MiB). The maximum size is {} MiB.",
        mib(.size),
        mib(.max)
    )]
    TooLarge { size: u64, max: u64 },
}

fn mib(bytes: &u64) -> f64 {
    *bytes as f64 / BYTES_PER_MIB
}

/// Short display name for a MIME type ("JPG" for `image/jpeg`).
fn format_name(mime_type: &str) -> String {
    match mime_type {
        "image/jpeg" => "JPG".to_string(),
        "image/png" => "PNG".to_string(),
        "image/webp" => "WebP".to_string(),
        other => other
            .strip_prefix("image/")
            .unwrap_or(other)
            .to_uppercase(),
    }
}

/// "JPG, PNG or WebP" for the given list.
fn describe_types(types: &[String]) -> String {
    let names: Vec<String> = types.iter().map(|t| format_name(t)).collect();
    match names.split_last() {
        None => "supported".to_string(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
    }
}

/// Selection-time checks applied to every file.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    /// Accepted MIME types.
    pub accepted_types: Vec<String>,
    /// Maximum size in bytes (inclusive).
    pub max_file_size: u64,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            accepted_types: ACCEPTED_TYPES.iter().map(|t| t.to_string()).collect(),
            max_file_size: MAX_FILE_SIZE,
        }
    }
}

impl From<&crate::config::UploadConfig> for UploadPolicy {
    fn from(config: &crate::config::UploadConfig) -> Self {
        Self {
            accepted_types: config.accepted_types.clone(),
            max_file_size: config.max_file_size,
        }
    }
}

impl UploadPolicy {
    /// Check a file against the type allow-list and the size ceiling.
    pub fn validate(&self, file: &UploadedFile) -> Result<(), ValidationError> {
        if !self.accepted_types.iter().any(|t| t == &file.mime_type) {
            return Err(ValidationError::UnsupportedType {
                mime_type: file.mime_type.clone(),
                accepted: describe_types(&self.accepted_types),
            });
        }

        if file.size() > self.max_file_size {
            return Err(ValidationError::TooLarge {
                size: file.size(),
                max: self.max_file_size,
            });
        }

        Ok(())
    }
}
