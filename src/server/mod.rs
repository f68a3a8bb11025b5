//! HTTP server module
//!
//! Accepts connections with `hyper` on `tokio`, one task per connection, and
//! dispatches requests through the [`Router`].
//!
//! # Example
//!
//! ```no_run
//! use devsync_uploadr::config::{Config, MetricsConfig, ServerConfig, UploadConfig};
//! use devsync_uploadr::server::Server;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config {
//!     server: ServerConfig {
//!         address: "127.0.0.1:0".to_string(),
//!         upload_path: "/upload".to_string(),
//!     },
//!     upload: UploadConfig::new("/var/lib/devsync/uploads"),
//!     metrics: MetricsConfig::default(),
//! };
//! let server = Server::new(config).await?;
//! println!("Listening on {}", server.local_addr());
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod response;

use crate::config::Config;
use crate::router::{Route, Router};
use crate::upload::limit::BoxError;
use crate::upload::UploadHandler;
use hyper::body::Body;
use hyper::header::{HeaderValue, ALLOW};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use response::ResponseBody;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// How long in-flight uploads may take to finish after shutdown starts
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(String),

    #[error("Server error: {0}")]
    RuntimeError(String),
}

/// Shared per-connection state
struct App {
    router: Router,
    uploads: UploadHandler,
}

/// HTTP Server
pub struct Server {
    app: Arc<App>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the configured address.
    ///
    /// Port 0 lets the OS choose; see [`Server::local_addr`].
    pub async fn new(config: Config) -> Result<Self, ServerError> {
        let uploads = UploadHandler::new(config.upload.clone());
        Self::with_handler(config, uploads).await
    }

    /// Bind with a preconfigured upload handler
    pub async fn with_handler(config: Config, uploads: UploadHandler) -> Result<Self, ServerError> {
        let addr: SocketAddr = config
            .server
            .address
            .parse()
            .map_err(|e| ServerError::BindError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::BindError(format!("Failed to get local address: {}", e)))?;

        info!("Server bound to {}", local_addr);

        Ok(Self {
            app: Arc::new(App {
                router: Router::new(&config.server.upload_path),
                uploads,
            }),
            listener,
            local_addr,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until ctrl-c
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves, then let open connections finish
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Accepting uploads on {} (upload root {})",
            self.local_addr,
            self.app.uploads.config().directory.display()
        );

        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    break;
                }
                accepted = self.listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            continue;
                        }
                    };

                    let app = Arc::clone(&self.app);
                    let service = service_fn(move |req| {
                        let app = Arc::clone(&app);
                        async move { Ok::<_, Infallible>(app.dispatch(req).await) }
                    });

                    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                    let conn = graceful.watch(conn);

                    tokio::spawn(async move {
                        if let Err(e) = conn.await {
                            debug!("Error serving connection from {}: {}", peer_addr, e);
                        }
                    });
                }
            }
        }

        // Stop accepting before draining
        drop(self.listener);

        if tokio::time::timeout(SHUTDOWN_GRACE, graceful.shutdown())
            .await
            .is_err()
        {
            warn!(
                "Connections still open after {}s, exiting anyway",
                SHUTDOWN_GRACE.as_secs()
            );
        }

        Ok(())
    }
}

impl App {
    async fn dispatch<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let route = self.router.route(req.method(), req.uri().path());
        debug!(method = %req.method(), path = %req.uri().path(), ?route, "Routing request");

        match route {
            Route::Health => {
                response::json(StatusCode::OK, &serde_json::json!({ "status": "ok" }))
            }
            Route::Upload => self.uploads.handle(req).await,
            Route::MethodNotAllowed { allow } => {
                let mut response = response::text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
                response
                    .headers_mut()
                    .insert(ALLOW, HeaderValue::from_static(allow));
                response
            }
            Route::NotFound => response::text(StatusCode::NOT_FOUND, "Not Found"),
        }
    }
}
