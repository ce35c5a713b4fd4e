//! HTTP surface
//!
//! - GET  /                   service info
//! - GET  /health             liveness probe
//! - GET  /openapi.json       OpenAPI description of the tool endpoints
//! - POST /merge_pdfs, /split_pdf, /pdf_to_images, /create_text_pdf, /upload_file
//! - GET|HEAD {files_route}/{id}/{filename}   artifact download
//! - /mcp                     MCP streamable HTTP (when enabled)

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::server::{streamable_http_service, ArtifactServer};
use crate::store::ArtifactId;
use crate::tools::{
    CreateTextPdfParams, MergePdfsParams, PdfToImagesParams, SplitPdfParams, ToolOutput,
    ToolResponse, ToolService, UploadFileParams,
};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const TOOL_ENDPOINTS: [&str; 5] = [
    "/merge_pdfs",
    "/split_pdf",
    "/pdf_to_images",
    "/create_text_pdf",
    "/upload_file",
];

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub tools: ToolService,
    files_route: String,
    mcp_enabled: bool,
}

/// Build the complete HTTP application.
///
/// When `mcp` is given, the MCP streamable HTTP transport is mounted at `/mcp`.
pub fn build_app(tools: ToolService, config: &ServerConfig, mcp: Option<ArtifactServer>) -> Router {
    let files_route = config.files_route.trim_end_matches('/').to_string();
    let state = AppState {
        tools,
        files_route: files_route.clone(),
        mcp_enabled: mcp.is_some(),
    };

    let mut app = Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/openapi.json", get(openapi))
        .route("/merge_pdfs", post(merge_pdfs))
        .route("/split_pdf", post(split_pdf))
        .route("/pdf_to_images", post(pdf_to_images))
        .route("/create_text_pdf", post(create_text_pdf))
        .route("/upload_file", post(upload_file))
        .route(&files_route, get(download))
        .route(&format!("{}/", files_route), get(download))
        .route(&format!("{}/*path", files_route), get(download))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(config.max_request_bytes))
        .with_state(state);

    if let Some(server) = mcp {
        app = app.nest_service("/mcp", streamable_http_service(server));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve `app` on `addr` until `shutdown` is cancelled
pub async fn serve(
    app: Router,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

// =============================================================================
// Root handlers
// =============================================================================

async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    let mut endpoints = json!({
        "tools": TOOL_ENDPOINTS,
        "files": [format!("{}/{{id}}/{{filename}}", state.files_route)],
        "openapi": "/openapi.json",
    });
    if state.mcp_enabled {
        endpoints["mcp"] = json!("/mcp");
    }

    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

/// Liveness only; never touches the store
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
}

// =============================================================================
// Tool endpoints
// =============================================================================

fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput { .. } | Error::Base64Decode(_) | Error::MalformedPath { .. } => {
            StatusCode::BAD_REQUEST
        }
        Error::OperationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::StorageExhausted { .. } => StatusCode::INSUFFICIENT_STORAGE,
        Error::NotFound => StatusCode::NOT_FOUND,
        Error::Io(_) | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn tool_reply(tool: &str, result: Result<ToolOutput>) -> Response {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e),
    };
    (status, Json(ToolResponse::from_result(tool, &result))).into_response()
}

async fn run_tool<P, F, Fut>(
    tool: &str,
    payload: std::result::Result<Json<P>, JsonRejection>,
    call: F,
) -> Response
where
    F: FnOnce(P) -> Fut,
    Fut: Future<Output = Result<ToolOutput>>,
{
    match payload {
        Ok(Json(params)) => tool_reply(tool, call(params).await),
        Err(rejection) => {
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            let err = Error::invalid_input(rejection.body_text());
            tracing::debug!(tool, error = %err, "Rejected request body");
            (status, Json(ToolResponse::failure(&err))).into_response()
        }
    }
}

async fn merge_pdfs(
    State(state): State<AppState>,
    payload: std::result::Result<Json<MergePdfsParams>, JsonRejection>,
) -> Response {
    run_tool("merge_pdfs", payload, |p| async move {
        state.tools.merge_pdfs(p).await
    })
    .await
}

async fn split_pdf(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SplitPdfParams>, JsonRejection>,
) -> Response {
    run_tool("split_pdf", payload, |p| async move {
        state.tools.split_pdf(p).await
    })
    .await
}

async fn pdf_to_images(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PdfToImagesParams>, JsonRejection>,
) -> Response {
    run_tool("pdf_to_images", payload, |p| async move {
        state.tools.pdf_to_images(p).await
    })
    .await
}

async fn create_text_pdf(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateTextPdfParams>, JsonRejection>,
) -> Response {
    run_tool("create_text_pdf", payload, |p| async move {
        state.tools.create_text_pdf(p).await
    })
    .await
}

async fn upload_file(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UploadFileParams>, JsonRejection>,
) -> Response {
    run_tool("upload_file", payload, |p| async move {
        state.tools.upload_file(p).await
    })
    .await
}

// =============================================================================
// OpenAPI
// =============================================================================

fn request_schema<T: JsonSchema>() -> serde_json::Value {
    let generator = SchemaSettings::draft2020_12()
        .with(|s| {
            s.inline_subschemas = true;
            s.meta_schema = None;
        })
        .into_generator();
    serde_json::to_value(generator.into_root_schema_for::<T>()).unwrap_or_default()
}

fn tool_operation(
    operation_id: &str,
    summary: &str,
    schema: serde_json::Value,
) -> serde_json::Value {
    json!({
        "post": {
            "operationId": operation_id,
            "summary": summary,
            "requestBody": {
                "required": true,
                "content": { "application/json": { "schema": schema } }
            },
            "responses": {
                "200": { "description": "Download links for the stored results" },
                "400": { "description": "Invalid input" },
                "422": { "description": "The document could not be processed" },
                "507": { "description": "Storage exhausted, retry later" }
            }
        }
    })
}

async fn openapi(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "openapi": "3.1.0",
        "info": {
            "title": env!("CARGO_PKG_NAME"),
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": {
            "/merge_pdfs": tool_operation(
                "merge_pdfs",
                "Merge PDFs in order",
                request_schema::<MergePdfsParams>(),
            ),
            "/split_pdf": tool_operation(
                "split_pdf",
                "Extract pages from a PDF",
                request_schema::<SplitPdfParams>(),
            ),
            "/pdf_to_images": tool_operation(
                "pdf_to_images",
                "Render PDF pages as PNG images",
                request_schema::<PdfToImagesParams>(),
            ),
            "/create_text_pdf": tool_operation(
                "create_text_pdf",
                "Create a PDF from plain text",
                request_schema::<CreateTextPdfParams>(),
            ),
            "/upload_file": tool_operation(
                "upload_file",
                "Store a file for download",
                request_schema::<UploadFileParams>(),
            ),
            (format!("{}/{{id}}/{{filename}}", state.files_route)): {
                "get": {
                    "operationId": "download_file",
                    "summary": "Download a stored artifact",
                    "responses": {
                        "200": { "description": "Artifact content" },
                        "400": { "description": "Malformed artifact path" },
                        "404": { "description": "Not found" }
                    }
                }
            }
        }
    }))
}

// =============================================================================
// Downloads
// =============================================================================

/// RFC 5987 `attr-char`
fn is_attr_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b)
}

/// `attachment` disposition with an ASCII fallback and a UTF-8 `filename*`
fn content_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let encoded: String = filename
        .bytes()
        .map(|b| {
            if is_attr_char(b) {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect();

    HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

async fn download(State(state): State<AppState>, uri: Uri) -> Response {
    let id: ArtifactId = match state.tools.links().resolve(uri.path()) {
        Ok(id) => id,
        Err(e) => {
            tracing::debug!(path = %uri.path(), error = %e, "Rejected download path");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "malformed path" })),
            )
                .into_response();
        }
    };

    let store = state.tools.store().clone();
    let fetched = tokio::task::spawn_blocking(move || store.get(id)).await;

    let artifact = match fetched {
        Ok(Ok(artifact)) => artifact,
        Ok(Err(Error::NotFound)) => return not_found().await,
        Ok(Err(e)) => {
            tracing::error!(id = %id, error = %e, "Failed to read artifact");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response();
        }
        Err(e) => {
            tracing::error!(id = %id, error = %e, "Download task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response();
        }
    };

    tracing::debug!(id = %id, size = artifact.meta.size, "Serving artifact");

    let content_type = HeaderValue::from_str(&artifact.meta.media_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                content_disposition(&artifact.meta.filename),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(artifact.content.len())),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("private, no-store"),
            ),
        ],
        Body::from(artifact.content),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkResolver;
    use crate::pdf::fixtures::numbered_pdf;
    use crate::pdf::PdfEngine;
    use crate::store::{ArtifactStore, ManualClock, MemoryBackend};
    use crate::tools::ToolLimits;
    use axum::http::{Method, Request};
    use base64::Engine;
    use bytes::Bytes;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    struct TestApp {
        app: Router,
        store: Arc<ArtifactStore>,
        clock: Arc<ManualClock>,
    }

    fn make_app_with_budget(max_bytes: usize) -> TestApp {
        let config = ServerConfig::default();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(ArtifactStore::with_clock(
            Box::new(MemoryBackend::new(max_bytes)),
            config.retention,
            clock.clone(),
        ));
        let links = LinkResolver::from_config(&config).unwrap();
        let tools = ToolService::new(
            store.clone(),
            links,
            Arc::new(PdfEngine),
            ToolLimits::from_config(&config),
        );
        TestApp {
            app: build_app(tools, &config, None),
            store,
            clock,
        }
    }

    fn make_app() -> TestApp {
        make_app_with_budget(16 * 1024 * 1024)
    }

    async fn body_bytes(response: Response) -> Bytes {
        axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response {
        app.clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn get(app: &Router, uri: &str) -> Response {
        app.clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn link_path(response: &serde_json::Value, index: usize) -> String {
        let url = response["files"][index]["url"].as_str().unwrap();
        url::Url::parse(url).unwrap().path().to_string()
    }

    fn b64(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    #[tokio::test]
    async fn test_health() {
        let test = make_app();
        let resp = get(&test.app, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
    }

    #[tokio::test]
    async fn test_service_info_lists_tools() {
        let test = make_app();
        let json = body_json(get(&test.app, "/").await).await;
        assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(json["endpoints"]["tools"].as_array().unwrap().len(), 5);
        assert_eq!(json["endpoints"]["files"][0], "/files/{id}/{filename}");
        assert!(json["endpoints"].get("mcp").is_none());
    }

    #[tokio::test]
    async fn test_openapi_describes_tools() {
        let test = make_app();
        let json = body_json(get(&test.app, "/openapi.json").await).await;
        assert_eq!(json["openapi"], "3.1.0");
        let merge = &json["paths"]["/merge_pdfs"]["post"];
        assert_eq!(merge["operationId"], "merge_pdfs");
        let schema = &merge["requestBody"]["content"]["application/json"]["schema"];
        assert!(schema["properties"]["pdf_files"].is_object());
        assert!(json["paths"]["/files/{id}/{filename}"]["get"].is_object());
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let test = make_app();
        let resp = post_json(
            &test.app,
            "/upload_file",
            json!({
                "content_base64": b64(b"hello artifact"),
                "filename": "Grüße \"final\".txt",
                "mime_type": "text/plain",
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["files"][0]["size"], 14);

        let resp = get(&test.app, &link_path(&json, 0)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = resp.headers().clone();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers[header::CONTENT_LENGTH], "14");
        assert_eq!(headers[header::CACHE_CONTROL], "private, no-store");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"Gr__e final.txt\"; filename*=UTF-8''Gr%C3%BC%C3%9Fe%20final.txt"
        );
        assert_eq!(&body_bytes(resp).await[..], b"hello artifact");
    }

    #[tokio::test]
    async fn test_head_download() {
        let test = make_app();
        let meta = test
            .store
            .put(Bytes::from_static(b"%PDF-1.7 ..."), "a.pdf", "application/pdf")
            .unwrap();

        let resp = test
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::HEAD)
                    .uri(format!("/files/{}/a.pdf", meta.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "12");
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_filename_segment_is_cosmetic() {
        let test = make_app();
        let meta = test
            .store
            .put(Bytes::from_static(b"data"), "real.bin", "application/octet-stream")
            .unwrap();

        for path in [
            format!("/files/{}/other.pdf", meta.id),
            format!("/files/{}", meta.id),
        ] {
            let resp = get(&test.app, &path).await;
            assert_eq!(resp.status(), StatusCode::OK, "{}", path);
            assert_eq!(&body_bytes(resp).await[..], b"data");
        }
    }

    #[tokio::test]
    async fn test_never_existed_and_expired_are_indistinguishable() {
        let test = make_app();
        let meta = test
            .store
            .put(Bytes::from_static(b"secret"), "x.pdf", "application/pdf")
            .unwrap();
        test.clock.advance(chrono::Duration::hours(25));

        let expired = get(&test.app, &format!("/files/{}/x.pdf", meta.id)).await;
        let unknown = get(
            &test.app,
            &format!("/files/{}/x.pdf", ArtifactId::generate()),
        )
        .await;

        assert_eq!(expired.status(), StatusCode::NOT_FOUND);
        assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            expired.headers().get(header::CONTENT_TYPE),
            unknown.headers().get(header::CONTENT_TYPE)
        );
        let expired = body_bytes(expired).await;
        let unknown = body_bytes(unknown).await;
        assert_eq!(expired, unknown);
        assert_eq!(&expired[..], br#"{"error":"not found"}"#);
    }

    #[tokio::test]
    async fn test_malformed_path() {
        let test = make_app();
        for path in [
            "/files/not-an-id/x.pdf",
            "/files/1234/x.pdf",
            "/files",
            "/files/",
            "/files//x.pdf",
        ] {
            let resp = get(&test.app, path).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{}", path);
            let json = body_json(resp).await;
            assert_eq!(json["error"], "malformed path");
        }
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let test = make_app();
        let resp = get(&test.app, "/nope").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_merge_endpoint() {
        let test = make_app();
        let resp = post_json(
            &test.app,
            "/merge_pdfs",
            json!({
                "pdf_files": [
                    { "filename": "a.pdf", "content": b64(&numbered_pdf(2, 0)) },
                    { "content": b64(&numbered_pdf(3, 0)) },
                ]
            }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["page_count"], 5);

        let resp = get(&test.app, &link_path(&json, 0)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/pdf");
    }

    #[tokio::test]
    async fn test_tool_error_statuses() {
        let test = make_app();

        let resp = post_json(&test.app, "/merge_pdfs", json!({ "pdf_files": [] })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "invalid_input");

        let resp = post_json(
            &test.app,
            "/split_pdf",
            json!({ "pdf_base64": b64(b"%PDF-1.4 broken"), "pages": "1" }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(resp).await["error"]["code"], "operation_failed");

        let resp = post_json(&test.app, "/split_pdf", json!({ "pages": "1" })).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        assert!(test.store.is_empty());
    }

    #[tokio::test]
    async fn test_storage_exhausted_status() {
        let test = make_app_with_budget(4);
        let resp = post_json(
            &test.app,
            "/upload_file",
            json!({ "content_base64": b64(b"too large"), "filename": "x.bin" }),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(body_json(resp).await["error"]["code"], "storage_exhausted");
        assert!(test.store.is_empty());
    }

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let test = make_app();
        let resp = test
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "https://chat.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }
}
