//! DevSync Uploadr Library
//!
//! Streaming multipart upload server that stores each device's files on
//! local disk.
//!
//! # Features
//!
//! - **Streaming**: Parts are copied to disk as they arrive, never buffered whole
//! - **Content Sniffing**: File type is detected from magic bytes, not headers
//! - **Hard Size Ceiling**: Oversized uploads are cut off and removed
//! - **Per-Device Layout**: `<root>/<device id>/<filename>`
//!
//! # Example
//!
//! ```no_run
//! use devsync_uploadr::{config::Config, server::Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod metrics;
pub mod router;
pub mod server;
pub mod telemetry;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use server::Server;
pub use upload::{UploadError, UploadHandler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
