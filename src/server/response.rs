//! Response helpers
//!
//! Every handler answers with a fully buffered body; uploads succeed with an
//! empty 200 and fail with a small JSON document.

use crate::upload::UploadError;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub type ResponseBody = Full<Bytes>;

/// Code reported for server-side failures
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// JSON error document
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Status-only response
pub fn empty(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Plain text response
pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<ResponseBody> {
    with_body(status, "text/plain; charset=utf-8", body.into())
}

/// JSON response
pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(value) {
        Ok(body) => with_body(status, "application/json", Bytes::from(body)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response body");
            empty(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Render an upload failure.
///
/// Client errors expose their code and message; server errors only say
/// `INTERNAL_ERROR` so paths and I/O details stay in the logs.
pub fn error_response(err: &UploadError) -> Response<ResponseBody> {
    let body = match err.code() {
        Some(code) => ErrorBody {
            error: code,
            message: Some(err.to_string()),
        },
        None => ErrorBody {
            error: INTERNAL_ERROR,
            message: None,
        },
    };
    json(err.status(), &body)
}
