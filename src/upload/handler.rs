//! Streaming upload handler
//!
//! Pipeline for one request:
//!
//! 1. cap the request body at `max_file_size + 1` (plus framing allowance)
//! 2. open the multipart stream and take the first part
//! 3. read `name` (device id) and `filename` from its disposition
//! 4. peek up to 512 bytes and sniff the content type
//! 5. check the type against the allow-list, before any disk I/O
//! 6. create `<root>/<device id>/` and the destination file
//! 7. copy prefix + remainder (bounded) into the file
//! 8. over the limit: delete the file and fail with `FILE_SIZE_EXCEEDED`
//!
//! Every step returns early on failure; no step is retried.
//!
//! # Example
//!
//! ```no_run
//! use devsync_uploadr::config::UploadConfig;
//! use devsync_uploadr::upload::UploadHandler;
//!
//! let mut config = UploadConfig::new("/var/lib/devsync/uploads");
//! config.max_file_size = 64 * 1024 * 1024;
//! let handler = UploadHandler::new(config)
//!     .with_validator(|mime: &str| mime.starts_with("image/"));
//! ```

use super::disposition::PartMetadata;
use super::limit::{self, BoxError, CappedBody, LimitTripwire};
use super::partial::PartialFile;
use super::sniff::Sniffed;
use super::validate::{AllowList, TypeValidator};
use super::{StoredFile, UploadError};
use crate::config::UploadConfig;
use crate::metrics;
use crate::server::response::{self, ResponseBody};
use futures::TryStreamExt;
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response, StatusCode};
use multer::Multipart;
use std::fmt::Display;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::io::StreamReader;
use tracing::field::Empty;
use tracing::{Instrument, Span};

/// Receives multipart uploads and stores them per device
#[derive(Clone)]
pub struct UploadHandler {
    config: UploadConfig,
    validator: Arc<dyn TypeValidator>,
}

impl UploadHandler {
    /// Create a handler that validates against `config.allowed_types`
    pub fn new(config: UploadConfig) -> Self {
        let validator = Arc::new(AllowList::new(&config.allowed_types));
        Self { config, validator }
    }

    /// Replace the content-type predicate
    pub fn with_validator(mut self, validator: impl TypeValidator + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Limits and storage root in use
    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Handle one upload request and render the outcome.
    ///
    /// Success is an empty 200; failures go through
    /// [`response::error_response`].
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let span = tracing::info_span!(
            "upload",
            request_id = %uuid::Uuid::new_v4(),
            upload.device = Empty,
            upload.filename = Empty,
            upload.content_type = Empty,
            upload.bytes_written = Empty,
        );

        async move {
            let start_time = Instant::now();
            let result = self.store(req).await;
            let duration = start_time.elapsed();
            metrics::record_upload_duration(duration.as_secs_f64());

            match result {
                Ok(stored) => {
                    metrics::record_upload_success(stored.bytes_written);
                    tracing::info!(
                        path = %stored.path.display(),
                        bytes_written = stored.bytes_written,
                        duration_ms = duration.as_millis(),
                        "Upload stored"
                    );
                    response::empty(StatusCode::OK)
                }
                Err(e) => {
                    metrics::record_upload_failure(e.kind(), e.is_client_error());
                    if e.is_client_error() {
                        tracing::warn!(error = %e, "Upload rejected");
                    } else {
                        tracing::error!(error = %e, "Upload failed");
                    }
                    response::error_response(&e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run the pipeline and return what was stored
    pub async fn store<B>(&self, req: Request<B>) -> Result<StoredFile, UploadError>
    where
        B: Body + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let max_size = self.config.max_file_size;
        let ceiling = self.config.body_ceiling();

        if let Some(declared) = limit::declared_length_exceeds(req.headers(), ceiling) {
            tracing::debug!(declared, ceiling, "Declared Content-Length over ceiling");
            return Err(UploadError::SizeExceeded { limit: max_size });
        }

        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| UploadError::MalformedRequest("missing Content-Type header".into()))?;
        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| UploadError::MalformedRequest(e.to_string()))?;

        let body = CappedBody::new(req.into_body(), ceiling);
        let tripwire = body.tripwire();
        let mut multipart = Multipart::new(body, boundary);

        let field = multipart
            .next_field()
            .await
            .map_err(|e| read_error(&tripwire, max_size, e))?
            .ok_or(UploadError::MissingPart)?;

        let meta = PartMetadata::from_field(&field)?;
        let span = Span::current();
        span.record("upload.device", meta.device_id.as_str());
        span.record("upload.filename", meta.filename.as_str());

        let reader = StreamReader::new(Box::pin(field.map_err(io::Error::other)));
        let sniffed = Sniffed::peek(reader)
            .await
            .map_err(|e| read_error(&tripwire, max_size, e))?;

        let content_type = sniffed.content_type();
        span.record("upload.content_type", content_type.as_str());
        if !self.validator.is_allowed(&content_type) {
            return Err(UploadError::InvalidFileType(content_type));
        }

        let dir = meta.device_dir(&self.config.directory);
        create_device_dir(&dir)
            .await
            .map_err(|source| UploadError::CreateDirectory {
                path: dir.clone(),
                source,
            })?;

        let path = meta.destination(&self.config.directory);
        let mut output = PartialFile::create(&path)
            .await
            .map_err(|source| UploadError::CreateFile {
                path: path.clone(),
                source,
            })?;

        let mut source = sniffed.into_source(max_size);
        let bytes_written = match tokio::io::copy(&mut source, output.file_mut()).await {
            Ok(n) if n <= max_size => n,
            Ok(n) => {
                span.record("upload.bytes_written", n);
                discard_partial(output).await;
                return Err(UploadError::SizeExceeded { limit: max_size });
            }
            Err(e) => {
                discard_partial(output).await;
                return Err(if tripwire.tripped() {
                    UploadError::SizeExceeded { limit: max_size }
                } else {
                    UploadError::Copy(e)
                });
            }
        };
        span.record("upload.bytes_written", bytes_written);

        let path = output.commit().await.map_err(UploadError::Copy)?;

        Ok(StoredFile {
            device_id: meta.device_id,
            filename: meta.filename,
            path,
            content_type,
            bytes_written,
        })
    }
}

/// A read failure is a size violation if the body ceiling caused it
fn read_error(tripwire: &LimitTripwire, max_size: u64, err: impl Display) -> UploadError {
    if tripwire.tripped() {
        UploadError::SizeExceeded { limit: max_size }
    } else {
        UploadError::StreamRead(err.to_string())
    }
}

async fn discard_partial(output: PartialFile) {
    let path = output.path().to_path_buf();
    match output.discard().await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial upload"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload"),
    }
}

/// `mkdir -p` with world-writable mode (before umask)
async fn create_device_dir(dir: &Path) -> io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o777);
    builder.create(dir).await
}
