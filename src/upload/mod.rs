//! Upload module
//!
//! Receives a single-part multipart body, sniffs its content type and streams
//! it to `<upload root>/<device id>/<filename>` under a hard size ceiling.

use hyper::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

pub mod disposition;
pub mod handler;
pub mod limit;
pub mod partial;
pub mod sniff;
pub mod validate;

pub use disposition::PartMetadata;
pub use handler::UploadHandler;
pub use validate::{AllowList, TypeValidator};

/// Stable machine-readable codes for client errors
pub mod codes {
    pub const MALFORMED_REQUEST: &str = "MALFORMED_REQUEST";
    pub const INVALID_FILE_NAME: &str = "INVALID_FILE_NAME";
    pub const INVALID_FILE_TYPE: &str = "INVALID_FILE_TYPE";
    pub const FILE_SIZE_EXCEEDED: &str = "FILE_SIZE_EXCEEDED";
}

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Malformed multipart request: {0}")]
    MalformedRequest(String),

    #[error("Failed to read multipart stream: {0}")]
    StreamRead(String),

    #[error("Request contains no file part")]
    MissingPart,

    #[error("Invalid Content-Disposition: {0}")]
    Disposition(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Content type {0} is not allowed")]
    InvalidFileType(String),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create file {path}: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write upload: {0}")]
    Copy(#[source] std::io::Error),

    #[error("Upload exceeds the maximum size of {limit} bytes")]
    SizeExceeded { limit: u64 },
}

impl UploadError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedRequest(_)
            | Self::InvalidFileName(_)
            | Self::InvalidFileType(_)
            | Self::SizeExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::StreamRead(_)
            | Self::MissingPart
            | Self::Disposition(_)
            | Self::CreateDirectory { .. }
            | Self::CreateFile { .. }
            | Self::Copy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing code; server-side failures carry none
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::MalformedRequest(_) => Some(codes::MALFORMED_REQUEST),
            Self::InvalidFileName(_) => Some(codes::INVALID_FILE_NAME),
            Self::InvalidFileType(_) => Some(codes::INVALID_FILE_TYPE),
            Self::SizeExceeded { .. } => Some(codes::FILE_SIZE_EXCEEDED),
            _ => None,
        }
    }

    /// Whether the caller caused this failure
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Label used for the error metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedRequest(_) => "malformed_request",
            Self::StreamRead(_) => "stream_read",
            Self::MissingPart => "missing_part",
            Self::Disposition(_) => "disposition",
            Self::InvalidFileName(_) => "invalid_file_name",
            Self::InvalidFileType(_) => "invalid_file_type",
            Self::CreateDirectory { .. } => "create_directory",
            Self::CreateFile { .. } => "create_file",
            Self::Copy(_) => "copy",
            Self::SizeExceeded { .. } => "size_exceeded",
        }
    }
}

/// A successfully stored upload
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub device_id: String,
    pub filename: String,
    pub path: PathBuf,
    pub content_type: String,
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_carry_codes() {
        let err = UploadError::InvalidFileType("application/x-msdownload".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), Some("INVALID_FILE_TYPE"));

        let err = UploadError::SizeExceeded { limit: 10 };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), Some("FILE_SIZE_EXCEEDED"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_server_errors_have_no_code() {
        let err = UploadError::Copy(std::io::Error::other("disk full"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), None);

        assert_eq!(
            UploadError::MissingPart.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            UploadError::Disposition("no name".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_malformed_request_is_bad_request() {
        let err = UploadError::MalformedRequest("no boundary".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "malformed_request");
    }
}
