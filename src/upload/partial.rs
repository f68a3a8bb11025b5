//! Destination file guard
//!
//! The output file is created through [`PartialFile`] and removed again on
//! every exit path except [`PartialFile::commit`]. This covers the
//! size-exceeded path as well as I/O errors and client disconnects in the
//! middle of a copy.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// An output file that is deleted unless committed
#[derive(Debug)]
pub struct PartialFile {
    path: PathBuf,
    file: File,
    armed: bool,
}

impl PartialFile {
    /// Create (or truncate) the file at `path`
    pub async fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = File::create(&path).await?;

        Ok(Self {
            path,
            file,
            armed: true,
        })
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writable handle
    pub fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }

    /// Flush and keep the file
    pub async fn commit(mut self) -> io::Result<PathBuf> {
        self.file.flush().await?;
        self.armed = false;
        Ok(std::mem::take(&mut self.path))
    }

    /// Close and delete the file now
    pub async fn discard(mut self) -> io::Result<()> {
        self.armed = false;
        let path = std::mem::take(&mut self.path);
        drop(self);
        tokio::fs::remove_file(&path).await
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // Fallback for cancelled uploads and failed commits. Drop cannot
        // await, so this unlink blocks.
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed partial upload"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to clean up partial upload"
            ),
        }
    }
}
