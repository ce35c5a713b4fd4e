//! Server configuration

use crate::error::{Error, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Where artifact content is kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// In process memory with a byte budget
    Memory {
        /// Maximum total bytes of live artifacts (default: 1GiB)
        max_bytes: usize,
    },
    /// One file per artifact under `dir`
    Disk { dir: PathBuf },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory {
            max_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// How MCP clients reach the tool server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum McpTransport {
    /// MCP over stdin/stdout; the HTTP server only serves files and REST tools
    #[default]
    Stdio,
    /// MCP streamable HTTP mounted at `/mcp` on the HTTP server
    Http,
}

/// Resource and routing configuration for the artifact server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to (default: 0.0.0.0:8001)
    pub bind_addr: SocketAddr,
    /// Externally visible prefix for download links, as seen through the
    /// reverse proxy (default: http://localhost:8001/files)
    pub public_base_url: String,
    /// Path prefix under which this server routes file downloads after the
    /// proxy has rewritten the request (default: /files)
    pub files_route: String,
    /// Artifact content storage (default: memory, 1GiB)
    pub storage: StorageConfig,
    /// How long an artifact stays fetchable (default: 24h)
    pub retention: Duration,
    /// How often expired artifacts are reclaimed (default: 1h)
    pub sweep_interval: Duration,
    /// DPI used when a rasterize request does not specify one (default: 150)
    pub default_dpi: u32,
    /// Lowest accepted DPI (default: 36)
    pub min_dpi: u32,
    /// Highest accepted DPI (default: 600)
    pub max_dpi: u32,
    /// Maximum number of pages a single rasterize call may render (default: 200)
    pub max_render_pages: u32,
    /// Maximum HTTP request body size in bytes (default: 128MiB)
    pub max_request_bytes: usize,
    /// MCP transport (default: stdio)
    pub transport: McpTransport,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            public_base_url: "http://localhost:8001/files".to_string(),
            files_route: "/files".to_string(),
            storage: StorageConfig::default(),
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            default_dpi: 150,
            min_dpi: 36,
            max_dpi: 600,
            max_render_pages: 200,
            max_request_bytes: 128 * 1024 * 1024,
            transport: McpTransport::default(),
        }
    }
}

impl ServerConfig {
    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retention.is_zero() {
            return Err(Error::invalid_input("retention must be greater than zero"));
        }
        if self.sweep_interval.is_zero() {
            return Err(Error::invalid_input(
                "sweep interval must be greater than zero",
            ));
        }
        if self.min_dpi == 0 || self.min_dpi > self.max_dpi {
            return Err(Error::invalid_input(format!(
                "dpi bounds must satisfy 0 < min_dpi <= max_dpi (got {}..={})",
                self.min_dpi, self.max_dpi
            )));
        }
        if !(self.min_dpi..=self.max_dpi).contains(&self.default_dpi) {
            return Err(Error::invalid_input(format!(
                "default dpi {} is outside {}..={}",
                self.default_dpi, self.min_dpi, self.max_dpi
            )));
        }
        if self.max_render_pages == 0 {
            return Err(Error::invalid_input(
                "max_render_pages must be greater than zero",
            ));
        }
        if !self.files_route.starts_with('/') || self.files_route.len() < 2 {
            return Err(Error::invalid_input(format!(
                "files route must start with '/' and name a segment (got {:?})",
                self.files_route
            )));
        }
        let url = url::Url::parse(&self.public_base_url).map_err(|e| {
            Error::invalid_input(format!(
                "public base url {:?} is invalid: {}",
                self.public_base_url, e
            ))
        })?;
        if url.cannot_be_a_base() {
            return Err(Error::invalid_input(format!(
                "public base url {:?} cannot carry a path",
                self.public_base_url
            )));
        }
        Ok(())
    }
}
