//! DevSync Uploadr - streaming per-device upload server

use clap::Parser;
use devsync_uploadr::metrics::server::MetricsServer;
use devsync_uploadr::telemetry::{self, LogFormat};
use devsync_uploadr::{config::Config, server::Server};
use std::path::PathBuf;
use tracing::info;

/// DevSync Uploadr - receives multipart uploads and stores them per device
#[derive(Parser, Debug)]
#[command(name = "devsync-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    telemetry::init_subscriber(&args.log_level, format)?;

    info!("Starting DevSync Uploadr v{}", devsync_uploadr::VERSION);

    // Load configuration
    let config = Config::load(&args.config)?;
    info!("Loaded configuration from {:?}", args.config);

    let metrics = if config.metrics.enabled {
        let address = format!("0.0.0.0:{}", config.metrics.port);
        Some(MetricsServer::bind(&address).await?.spawn())
    } else {
        None
    };

    // Start server
    let server = Server::new(config).await?;
    server.run().await?;

    if let Some(metrics) = metrics {
        metrics.shutdown().await;
    }

    Ok(())
}
