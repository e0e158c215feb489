use std::path::{Path, PathBuf};

use crate::error::ProcessError;

/// A rasterised page written to the scratch directory. The file is removed
/// when the guard drops, on every exit path of the page loop.
#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
}

impl TempImage {
    pub fn write(dir: &Path, png: &[u8]) -> Result<Self, ProcessError> {
        let path = dir.join(format!("taxocr_page_{}.png", uuid::Uuid::new_v4()));
        std::fs::write(&path, png).map_err(|e| ProcessError::ReadDocument {
            path: path.clone(),
            source: e,
        })?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>, ProcessError> {
        std::fs::read(&self.path).map_err(|e| ProcessError::ReadDocument {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::trace!(path = %self.path.display(), "Removed page image"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove page image"
            ),
        }
    }
}
