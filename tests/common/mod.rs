//! Shared test infrastructure
//!
//! - Multipart body construction
//! - Handler and config factories over a temporary upload root
//! - Sample file contents

#![allow(dead_code)]

use bytes::Bytes;
use devsync_uploadr::config::{Config, MetricsConfig, ServerConfig, UploadConfig};
use devsync_uploadr::upload::UploadHandler;
use futures::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::CONTENT_TYPE;
use hyper::{Request, Response};
use std::io;
use std::path::Path;
use std::time::Duration;

pub const BOUNDARY: &str = "----devsync-boundary-7MA4YWxkTrZu0gW";

/// Build a single-part multipart body
pub fn multipart_body(device: &str, filename: &str, content: &[u8]) -> Bytes {
    let disposition = format!(
        "form-data; name=\"{}\"; filename=\"{}\"",
        device, filename
    );
    raw_part(&disposition, content)
}

/// Single part with an arbitrary Content-Disposition value
pub fn raw_part(disposition: &str, content: &[u8]) -> Bytes {
    let mut body = Vec::with_capacity(content.len() + 256);
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    Bytes::from(body)
}

/// POST request carrying `body` as multipart/form-data
pub fn upload_request(body: Bytes) -> Request<Full<Bytes>> {
    Request::post("/upload")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Full::new(body))
        .unwrap()
}

/// POST request whose body trickles in as `chunk`-sized frames.
///
/// Each frame is delayed so the multipart parser sees `Pending` between
/// them and the copy to disk is already running when later frames arrive.
/// With `fail_after`, only that many bytes are sent before the body yields a
/// connection reset.
pub fn trickled_request(
    body: Bytes,
    chunk: usize,
    fail_after: Option<usize>,
) -> Request<UnsyncBoxBody<Bytes, io::Error>> {
    let sent = fail_after.unwrap_or(body.len()).min(body.len());
    let mut frames: Vec<Result<Frame<Bytes>, io::Error>> = body
        .slice(..sent)
        .chunks(chunk)
        .map(|c| Ok(Frame::data(Bytes::copy_from_slice(c))))
        .collect();
    if fail_after.is_some() {
        frames.push(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "client went away",
        )));
    }

    let stream = futures::stream::iter(frames).then(|frame| async move {
        tokio::time::sleep(Duration::from_millis(2)).await;
        frame
    });

    Request::post("/upload")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(StreamBody::new(stream).boxed_unsync())
        .unwrap()
}

/// Upload config rooted at `root` with the given cap
pub fn upload_config(root: &Path, max_file_size: u64) -> UploadConfig {
    let mut config = UploadConfig::new(root);
    config.max_file_size = max_file_size;
    config
}

pub fn handler(root: &Path, max_file_size: u64) -> UploadHandler {
    UploadHandler::new(upload_config(root, max_file_size))
}

/// Full server config on an OS-assigned port
pub fn server_config(root: &Path, max_file_size: u64) -> Config {
    Config {
        server: ServerConfig {
            address: "127.0.0.1:0".into(),
            upload_path: "/upload".into(),
        },
        upload: upload_config(root, max_file_size),
        metrics: MetricsConfig::default(),
    }
}

/// A minimal PDF padded to `len` bytes
pub fn pdf_bytes(len: usize) -> Vec<u8> {
    let mut data = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n1 0 obj\n<< /Type /Catalog >>\nendobj\n".to_vec();
    let mut i = 0u32;
    while data.len() < len {
        data.push(b'0' + (i % 10) as u8);
        i += 1;
    }
    data.truncate(len);
    data
}

/// A PNG signature followed by varied binary filler
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let mut state: u32 = 0x2545_F491;
    while data.len() < len {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        data.push(state as u8);
    }
    data.truncate(len);
    data
}

/// Windows PE header
pub fn exe_bytes(len: usize) -> Vec<u8> {
    let mut data = b"MZ\x90\x00\x03\x00\x00\x00\x04\x00\x00\x00\xFF\xFF\x00\x00".to_vec();
    data.resize(len.max(data.len()), 0);
    data
}

/// Collect a response body as JSON
pub async fn json_body<B>(response: Response<B>) -> serde_json::Value
where
    B: hyper::body::Body,
    B::Error: std::fmt::Debug,
{
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
