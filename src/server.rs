//! MCP tool server and process wiring

use crate::config::{McpTransport, ServerConfig};
use crate::link::LinkResolver;
use crate::pdf::PdfEngine;
use crate::store::ArtifactStore;
use crate::sweeper::Sweeper;
use crate::tools::{
    CreateTextPdfParams, MergePdfsParams, PdfToImagesParams, SplitPdfParams, ToolLimits,
    ToolResponse, ToolService, UploadFileParams,
};
use anyhow::Result;
use rmcp::{
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
    transport::streamable_http_server::{
        session::local::LocalSessionManager, StreamableHttpServerConfig, StreamableHttpService,
    },
    ServerHandler, ServiceExt,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// MCP front end for the tool operation layer
#[derive(Clone)]
pub struct ArtifactServer {
    tool_router: ToolRouter<Self>,
    tools: ToolService,
}

#[tool_router]
impl ArtifactServer {
    pub fn new(tools: ToolService) -> Self {
        Self {
            tool_router: Self::tool_router(),
            tools,
        }
    }

    /// Merge multiple PDFs into one
    #[tool(
        description = "Merge multiple PDF files into a single PDF, in the order given. Returns a time-limited download link instead of the file content.

Each element of pdf_files is {\"filename\": \"a.pdf\", \"content\": \"<base64>\"}."
    )]
    async fn merge_pdfs(&self, Parameters(params): Parameters<MergePdfsParams>) -> String {
        let result = self.tools.merge_pdfs(params).await;
        ToolResponse::from_result("merge_pdfs", &result).to_json()
    }

    /// Extract pages from a PDF
    #[tool(
        description = "Extract pages from a PDF into a new PDF. Returns a time-limited download link.

Page range syntax:
- \"3\" (single page), \"7-9\" (range), \"1-3,5\" (combined)
- \"z\" (last page), \"r2\" (second to last), \"9-7\" (reversed)
- \"1-z:odd\", \"1-z:even\" (odd or even pages)

Every referenced page must exist in the document."
    )]
    async fn split_pdf(&self, Parameters(params): Parameters<SplitPdfParams>) -> String {
        let result = self.tools.split_pdf(params).await;
        ToolResponse::from_result("split_pdf", &result).to_json()
    }

    /// Render PDF pages to PNG images
    #[tool(
        description = "Render every page of a PDF as a PNG image. Returns one download link per page, in page order.

dpi defaults to 150 and must be between 36 and 600."
    )]
    async fn pdf_to_images(&self, Parameters(params): Parameters<PdfToImagesParams>) -> String {
        let result = self.tools.pdf_to_images(params).await;
        ToolResponse::from_result("pdf_to_images", &result).to_json()
    }

    /// Typeset plain text as a PDF
    #[tool(
        description = "Create an A4 PDF from plain text. Blank lines separate paragraphs; long lines are wrapped. Returns a time-limited download link."
    )]
    async fn create_text_pdf(
        &self,
        Parameters(params): Parameters<CreateTextPdfParams>,
    ) -> String {
        let result = self.tools.create_text_pdf(params).await;
        ToolResponse::from_result("create_text_pdf", &result).to_json()
    }

    /// Store arbitrary bytes for download
    #[tool(
        description = "Store a base64-encoded file unchanged and return a time-limited download link. mime_type defaults to application/octet-stream."
    )]
    async fn upload_file(&self, Parameters(params): Parameters<UploadFileParams>) -> String {
        let result = self.tools.upload_file(params).await;
        ToolResponse::from_result("upload_file", &result).to_json()
    }
}

#[tool_handler]
impl ServerHandler for ArtifactServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF artifact server: merges, splits, rasterizes and typesets PDFs. \
                 Results are returned as download links that expire after the retention window."
                    .into(),
            ),
        }
    }
}

/// Streamable HTTP transport, to be mounted on the HTTP server
pub fn streamable_http_service(
    server: ArtifactServer,
) -> StreamableHttpService<ArtifactServer, LocalSessionManager> {
    StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    )
}

/// Serve MCP over stdin/stdout until the client disconnects or `shutdown` fires
pub async fn run_stdio(server: ArtifactServer, shutdown: CancellationToken) -> Result<()> {
    tracing::info!("MCP stdio transport ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    tokio::select! {
        quit = service.waiting() => {
            let reason = quit?;
            tracing::info!(?reason, "MCP stdio session ended");
        }
        _ = shutdown.cancelled() => {}
    }

    Ok(())
}

/// Cancel `shutdown` on Ctrl-C
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

/// Run the artifact server: HTTP surface, retention sweeper and the
/// configured MCP transport, until shutdown
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    config.validate()?;

    let store = Arc::new(ArtifactStore::from_config(
        &config.storage,
        config.retention,
    )?);
    let links = LinkResolver::from_config(&config)?;
    let tools = ToolService::new(
        store.clone(),
        links,
        Arc::new(PdfEngine),
        ToolLimits::from_config(&config),
    );
    let server = ArtifactServer::new(tools.clone());

    tracing::info!(
        bind = %config.bind_addr,
        public_base_url = %config.public_base_url,
        storage = ?config.storage,
        retention_secs = config.retention.as_secs(),
        transport = ?config.transport,
        "PDF artifact server starting"
    );

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    let sweeper = Sweeper::new(store, config.sweep_interval).spawn(shutdown.clone());

    let mcp_http = (config.transport == McpTransport::Http).then(|| server.clone());
    let app = crate::http::build_app(tools, &config, mcp_http);
    let mut http = tokio::spawn(crate::http::serve(app, config.bind_addr, shutdown.clone()));

    let http_result = match config.transport {
        McpTransport::Http => http.await?,
        McpTransport::Stdio => tokio::select! {
            result = &mut http => result?,
            result = run_stdio(server, shutdown.clone()) => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "MCP stdio transport failed");
                }
                shutdown.cancel();
                http.await?
            }
        },
    };

    shutdown.cancel();
    sweeper.await?;
    http_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::numbered_pdf;
    use crate::store::MemoryBackend;
    use crate::tools::PdfFile;
    use base64::Engine;
    use std::time::Duration;

    fn server() -> (ArtifactServer, Arc<ArtifactStore>) {
        let store = Arc::new(ArtifactStore::new(
            Box::new(MemoryBackend::new(16 * 1024 * 1024)),
            Duration::from_secs(3600),
        ));
        let links = LinkResolver::new("http://localhost:8001/files", "/files").unwrap();
        let tools = ToolService::new(
            store.clone(),
            links,
            Arc::new(PdfEngine),
            ToolLimits::default(),
        );
        (ArtifactServer::new(tools), store)
    }

    fn parse(response: String) -> serde_json::Value {
        serde_json::from_str(&response).unwrap()
    }

    #[test]
    fn test_get_info() {
        let (server, _) = server();
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.is_some());
    }

    #[test]
    fn test_tool_list() {
        let (server, _) = server();
        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "create_text_pdf",
                "merge_pdfs",
                "pdf_to_images",
                "split_pdf",
                "upload_file"
            ]
        );
    }

    #[tokio::test]
    async fn test_merge_tool_returns_link() {
        let (server, store) = server();
        let content = base64::engine::general_purpose::STANDARD.encode(numbered_pdf(2, 0));
        let params = MergePdfsParams {
            pdf_files: vec![
                PdfFile {
                    filename: None,
                    content: content.clone(),
                },
                PdfFile {
                    filename: None,
                    content,
                },
            ],
        };

        let response = parse(server.merge_pdfs(Parameters(params)).await);
        assert_eq!(response["success"], true);
        assert_eq!(response["page_count"], 4);
        let url = response["files"][0]["url"].as_str().unwrap();
        assert!(url.starts_with("http://localhost:8001/files/"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_tool_error_is_structured() {
        let (server, store) = server();
        let response = parse(
            server
                .merge_pdfs(Parameters(MergePdfsParams { pdf_files: vec![] }))
                .await,
        );
        assert_eq!(response["success"], false);
        assert_eq!(response["error"]["code"], "invalid_input");
        assert!(response.get("files").is_none());
        assert!(store.is_empty());
    }
}
