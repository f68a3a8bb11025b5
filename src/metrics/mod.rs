//! Metrics module
//!
//! Provides Prometheus metrics for the upload pipeline.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Histogram,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "devsync_uploads_total",
        "Total number of uploads",
        &["status"]
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: Counter = register_counter!(
        "devsync_upload_bytes_total",
        "Total bytes stored"
    ).unwrap();

    pub static ref UPLOAD_DURATION: Histogram = register_histogram!(
        "devsync_upload_duration_seconds",
        "Upload duration in seconds",
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    ).unwrap();

    // Client-side rejections, by code
    pub static ref UPLOAD_REJECTIONS: CounterVec = register_counter_vec!(
        "devsync_upload_rejections_total",
        "Uploads rejected because of client input",
        &["reason"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "devsync_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record a stored upload
pub fn record_upload_success(bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&["success"]).inc();
    UPLOAD_BYTES_TOTAL.inc_by(bytes as f64);
}

/// Record a failed upload
///
/// Client errors count as rejections, everything else as a server error.
pub fn record_upload_failure(kind: &str, client_error: bool) {
    UPLOADS_TOTAL.with_label_values(&["failure"]).inc();
    if client_error {
        UPLOAD_REJECTIONS.with_label_values(&[kind]).inc();
    } else {
        record_error(kind);
    }
}

/// Record upload duration
pub fn record_upload_duration(duration_secs: f64) {
    UPLOAD_DURATION.observe(duration_secs);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
