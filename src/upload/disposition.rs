//! Part metadata from `Content-Disposition`
//!
//! `name` is the device identifier and `filename` the stored file's base
//! name. Both become path segments, so anything that could escape the
//! device directory is refused here, before the filesystem is touched.

use super::UploadError;
use multer::Field;
use std::path::{Path, PathBuf};

/// Device identifier and filename of the uploaded part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartMetadata {
    pub device_id: String,
    pub filename: String,
}

impl PartMetadata {
    /// Extract metadata from a multipart field
    pub fn from_field(field: &Field<'_>) -> Result<Self, UploadError> {
        if field
            .headers()
            .get(hyper::header::CONTENT_DISPOSITION)
            .is_none()
        {
            return Err(UploadError::Disposition(
                "part has no Content-Disposition header".into(),
            ));
        }

        Self::from_parts(field.name(), field.file_name())
    }

    /// Build metadata from the parsed disposition parameters
    pub fn from_parts(name: Option<&str>, filename: Option<&str>) -> Result<Self, UploadError> {
        let device_id = name
            .ok_or_else(|| UploadError::Disposition("missing 'name' parameter".into()))?;
        let filename = filename
            .ok_or_else(|| UploadError::Disposition("missing 'filename' parameter".into()))?;

        check_segment("device id", device_id)?;
        check_segment("filename", filename)?;

        Ok(Self {
            device_id: device_id.to_string(),
            filename: filename.to_string(),
        })
    }

    /// Directory holding this device's uploads
    pub fn device_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.device_id)
    }

    /// `<root>/<device id>/<filename>`
    pub fn destination(&self, root: &Path) -> PathBuf {
        self.device_dir(root).join(&self.filename)
    }
}

/// A segment must stay a single, relative path component
fn check_segment(what: &str, value: &str) -> Result<(), UploadError> {
    if value.is_empty() {
        return Err(UploadError::InvalidFileName(format!("{} is empty", what)));
    }

    if value == "." || value == ".." {
        return Err(UploadError::InvalidFileName(format!(
            "{} '{}' is not a file name",
            what, value
        )));
    }

    if value.contains(&['/', '\\', '\0'][..]) {
        return Err(UploadError::InvalidFileName(format!(
            "{} '{}' contains a path separator",
            what,
            value.escape_default()
        )));
    }

    Ok(())
}
