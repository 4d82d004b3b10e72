//! Transient on-disk preview of the selected image.
//!
//! The preview is a temporary copy the user can open in an image viewer.
//! It lives exactly as long as the handle; dropping or releasing the
//! handle deletes the copy.

use super::UploadedFile;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Owned preview copy of an uploaded file.
#[derive(Debug)]
pub struct PreviewHandle {
    file: NamedTempFile,
}

impl PreviewHandle {
    /// Write a preview copy of `upload` to the temp directory.
    pub fn create(upload: &UploadedFile) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("jrscan-preview-")
            .suffix(&format!(".{}", upload.extension()))
            .tempfile()
            .context("Failed to create preview file")?;

        file.write_all(&upload.bytes)
            .context("Failed to write preview file")?;
        file.flush().context("Failed to flush preview file")?;

        debug!("Preview for {} at {}", upload.name, file.path().display());
        Ok(Self { file })
    }

    /// Location of the preview copy.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the preview copy now, logging instead of failing.
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Released preview {}", path.display()),
            Err(e) => warn!("Failed to remove preview {}: {}", path.display(), e),
        }
    }
}
