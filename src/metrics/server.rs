//! Prometheus Metrics HTTP Server
//!
//! Serves `/metrics` (text exposition format) and `/health` on a port of its
//! own so scrapes never compete with uploads.
//!
//! # Example
//!
//! ```no_run
//! use devsync_uploadr::metrics::server::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MetricsServer::bind("127.0.0.1:9090").await?;
//! println!("Metrics on {}", server.local_addr());
//! let handle = server.spawn();
//! // ...
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::server::response::{self, ResponseBody};
use bytes::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{Encoder, TextEncoder};
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Metrics server error
#[derive(Debug, thiserror::Error)]
pub enum MetricsServerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Bound, not yet running, metrics server
pub struct MetricsServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

/// Handle to a running metrics server
pub struct MetricsHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl MetricsServer {
    /// Bind to `address` (e.g. "0.0.0.0:9090"; port 0 picks a free port)
    pub async fn bind(address: &str) -> Result<Self, MetricsServerError> {
        let listener = TcpListener::bind(address).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Actual bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve in a background task
    pub fn spawn(self) -> MetricsHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(run_server(self.listener, shutdown_rx));
        tracing::info!("Metrics server listening on {}", self.local_addr);

        MetricsHandle { shutdown_tx, task }
    }
}

impl MetricsHandle {
    /// Stop accepting scrapes and wait for the accept loop to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.task.await;
    }
}

async fn run_server(listener: TcpListener, mut shutdown_rx: oneshot::Receiver<()>) {
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let io = TokioIo::new(stream);
                        tokio::spawn(async move {
                            let _ = http1::Builder::new()
                                .serve_connection(io, service_fn(handle_request))
                                .await;
                        });
                    }
                    Err(e) => tracing::debug!("Metrics accept failed: {}", e),
                }
            }
        }
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
) -> Result<Response<ResponseBody>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => metrics_response(),
        (&Method::GET, "/health") => {
            response::json(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
        }
        _ => response::text(StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(response)
}

/// Encode the default registry
fn metrics_response() -> Response<ResponseBody> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return response::text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = response::empty(StatusCode::OK);
    *response.body_mut() = ResponseBody::new(Bytes::from(buffer));
    if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    response
}
