//! Workspace HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check |
//! | `POST` | `/api/workspace/init` | Ensure a workspace exists |
//! | `POST` | `/api/chat` | Run the assistant inside a workspace |
//! | `GET`  | `/api/workspace/{userId}/files` | List workspace files |
//! | `GET`  | `/api/workspace/{userId}/file?path=` | Read one file |
//! | `POST` | `/api/workspace/upload` | Multipart upload into `uploads/` |
//! | `GET`  | `/api/workspace/{userId}/search?query=&tags=` | Tag + text search over indexed markdown |
//! | `GET`  | `/` and other paths | Frontend from `[server].static_dir`, when set |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "access_denied", "message": "access denied: ../../etc/passwd" } }
//! ```
//!
//! Error codes: `bad_request` (400), `access_denied` (403), `not_found` (404),
//! `config_error` (500), `internal` (500), `unavailable` (503), `timeout` (504).
//! Internal error details are logged, never returned.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! frontends served from another port.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::path::{Path as FsPath, PathBuf};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::assistant::{Assistant, ChatRequest, ClaudeCli};
use crate::config::Config;
use crate::error::WorkspaceError;
use crate::models::{FileEntry, IndexedFile, UploadedFile};
use crate::workspace::WorkspaceManager;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub workspaces: WorkspaceManager,
    pub assistant: Arc<dyn Assistant>,
}

impl AppState {
    pub fn new(config: Config, workspaces: WorkspaceManager, assistant: Arc<dyn Assistant>) -> Self {
        Self {
            config: Arc::new(config),
            workspaces,
            assistant,
        }
    }

    /// Opens the index, prepares the workspaces root and wires the `claude`
    /// CLI as the assistant.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let workspaces = WorkspaceManager::from_config(config).await?;
        let assistant = Arc::new(ClaudeCli::from_config(&config.assistant));
        Ok(Self::new(config.clone(), workspaces, assistant))
    }
}

/// Builds the router with all routes, CORS, request tracing and the upload
/// body limit. When `[server].static_dir` is set the frontend is served
/// from it as well.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.server.max_upload_bytes;
    let static_dir = state.config.server.static_dir.clone();

    let mut app = Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/workspace/init", post(handle_init))
        .route("/api/chat", post(handle_chat))
        .route("/api/workspace/{user_id}/files", get(handle_files))
        .route("/api/workspace/{user_id}/file", get(handle_file))
        .route("/api/workspace/upload", post(handle_upload))
        .route("/api/workspace/{user_id}/search", get(handle_search));

    if let Some(dir) = static_dir {
        let index = frontend_index(&dir);
        app = app
            .route_service("/", ServeFile::new(index))
            .fallback_service(ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `index.html` if the frontend directory has one, else `frontend.html`.
fn frontend_index(dir: &FsPath) -> PathBuf {
    let index = dir.join("index.html");
    if index.is_file() {
        index
    } else {
        dir.join("frontend.html")
    }
}

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
///
/// The index is shut down after the server stops accepting connections.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let indexer = state.workspaces.indexer().cloned();

    if state.config.assistant.api_key.is_none() {
        tracing::warn!("ANTHROPIC_API_KEY not set; /api/chat will fail until it is configured");
    }

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    if let Some(dir) = &state.config.server.static_dir {
        tracing::info!(dir = %dir.display(), "serving frontend");
    }
    tracing::info!(
        addr = %listener.local_addr()?,
        workspaces = %state.workspaces.root().display(),
        index = indexer.as_ref().map(|i| i.backend()).unwrap_or("disabled"),
        "devspace listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(indexer) = indexer {
        indexer.shutdown().await;
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<WorkspaceError> for AppError {
    fn from(err: WorkspaceError) -> Self {
        if let WorkspaceError::Internal(inner) = &err {
            tracing::error!(error = ?inner, "request failed");
        }
        AppError {
            status: err.status(),
            code: err.code().to_string(),
            message: err.public_message(),
        }
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| bad_request(format!("{} is required", field)))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    message: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "devspace is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/workspace/init ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitRequest {
    user_id: Option<String>,
}

#[derive(Serialize)]
struct InitResponse {
    success: bool,
    workspace: String,
    message: String,
}

async fn handle_init(
    State(state): State<AppState>,
    body: Result<Json<InitRequest>, JsonRejection>,
) -> Result<Json<InitResponse>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let user_id = required(req.user_id, "userId")?;

    let ws = state.workspaces.ensure(&user_id).await?;
    Ok(Json(InitResponse {
        success: true,
        workspace: ws.root.display().to_string(),
        message: "Workspace initialized".to_string(),
    }))
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    user_id: Option<String>,
    message: Option<String>,
    session_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    success: bool,
    result: serde_json::Value,
    session_id: Option<String>,
    workspace_path: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let user_id = required(req.user_id, "userId")?;
    let message = required(req.message, "message")?;
    state.assistant.ready()?;

    let ws = state.workspaces.ensure(&user_id).await?;
    tracing::info!(
        user_id = %user_id,
        chars = message.chars().count(),
        resume = req.session_id.is_some(),
        "processing chat"
    );

    let outcome = state
        .assistant
        .chat(ChatRequest {
            cwd: ws.root.clone(),
            message,
            session_id: req.session_id,
        })
        .await?;

    Ok(Json(ChatResponse {
        success: true,
        result: outcome.result,
        session_id: outcome.session_id,
        workspace_path: ws.root.display().to_string(),
    }))
}

// ============ GET /api/workspace/{userId}/files ============

#[derive(Serialize)]
struct FilesResponse {
    success: bool,
    files: Vec<FileEntry>,
    workspace: String,
}

async fn handle_files(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<FilesResponse>, AppError> {
    let ws = state.workspaces.ensure(&user_id).await?;
    let files = state.workspaces.list_files(&user_id).await?;
    Ok(Json(FilesResponse {
        success: true,
        files,
        workspace: ws.root.display().to_string(),
    }))
}

// ============ GET /api/workspace/{userId}/file ============

#[derive(Deserialize)]
struct FileParams {
    path: Option<String>,
}

#[derive(Serialize)]
struct FileResponse {
    success: bool,
    content: String,
    path: String,
}

async fn handle_file(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<FileParams>,
) -> Result<Json<FileResponse>, AppError> {
    let path = required(params.path, "path")?;
    let content = state.workspaces.read_file(&user_id, &path).await?;
    Ok(Json(FileResponse {
        success: true,
        content,
        path,
    }))
}

// ============ POST /api/workspace/upload ============

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    file: UploadedFile,
}

async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| bad_request(e.body_text()))?;
    let mut user_id: Option<String> = None;
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("userId") => {
                user_id = Some(field.text().await.map_err(|e| bad_request(e.body_text()))?);
            }
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
                upload = Some((name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (original_name, bytes) = upload.ok_or_else(|| bad_request("No file uploaded"))?;
    let user_id = user_id
        .filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| "anonymous".to_string());

    let file = state
        .workspaces
        .store_upload(&user_id, &original_name, &bytes)
        .await?;
    tracing::info!(user_id = %user_id, filename = %file.filename, size = file.size, "stored upload");

    Ok(Json(UploadResponse {
        success: true,
        file,
    }))
}

// ============ GET /api/workspace/{userId}/search ============

#[derive(Deserialize)]
struct SearchParams {
    query: Option<String>,
    tags: Option<String>,
}

#[derive(Serialize)]
struct SearchResponse {
    success: bool,
    results: Vec<IndexedFile>,
    query: Option<String>,
    tags: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let tags = parse_tags(params.tags.as_deref());

    state.workspaces.ensure(&user_id).await?;
    let results = state
        .workspaces
        .search(&user_id, params.query.as_deref(), &tags)
        .await?;

    Ok(Json(SearchResponse {
        success: true,
        results,
        query: params.query,
        tags: params.tags,
    }))
}

/// Splits a comma-separated tag list, dropping blanks.
pub fn parse_tags(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    })
    .unwrap_or_default()
}
