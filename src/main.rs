use clap::Parser;
use pdf_artifact_server::{run_server_with_config, McpTransport, ServerConfig, StorageConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// PDF tools for AI agents, with results served as expiring download links
#[derive(Debug, Parser)]
#[command(name = "pdf-artifact-server", version, about)]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "PORT", default_value_t = 8001)]
    port: u16,

    /// Externally visible URL prefix of download links
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8001/files")]
    public_base_url: String,

    /// Path prefix under which downloads are routed on this server
    #[arg(long, env = "FILES_ROUTE", default_value = "/files")]
    files_route: String,

    /// Store artifacts as files under this directory instead of in memory
    #[arg(long, env = "FILES_DIR")]
    files_dir: Option<PathBuf>,

    /// Memory budget for in-memory storage, in MiB
    #[arg(long, env = "MAX_MEMORY_MB", default_value_t = 1024)]
    max_memory_mb: usize,

    /// How long artifacts stay downloadable, in hours
    #[arg(long, env = "RETENTION_HOURS", default_value_t = 24)]
    retention_hours: u64,

    /// Interval between retention sweeps, in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 3600)]
    sweep_interval_secs: u64,

    /// Maximum request body size, in MiB
    #[arg(long, env = "MAX_REQUEST_MB", default_value_t = 128)]
    max_request_mb: usize,

    /// MCP transport
    #[arg(long, env = "MCP_TRANSPORT", value_enum, default_value_t = McpTransport::Stdio)]
    transport: McpTransport,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<ServerConfig> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid host {:?}: {}", self.host, e))?;
        let bind_addr = SocketAddr::new(ip, self.port);

        let storage = match self.files_dir {
            Some(dir) => StorageConfig::Disk { dir },
            None => StorageConfig::Memory {
                max_bytes: self.max_memory_mb * 1024 * 1024,
            },
        };

        Ok(ServerConfig {
            bind_addr,
            public_base_url: self.public_base_url,
            files_route: self.files_route,
            storage,
            retention: Duration::from_secs(self.retention_hours * 60 * 60),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_request_bytes: self.max_request_mb * 1024 * 1024,
            transport: self.transport,
            ..ServerConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the MCP stdio transport
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_artifact_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Cli::parse().into_config()?;
    run_server_with_config(config).await
}
