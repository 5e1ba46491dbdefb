use std::convert::Infallible;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use readguide_engine::{
    available_profiles, BatchOrchestrator, FileExtractor, FileGuideStore, GenerationError,
    GenerationParams, JobRunner, OpenAiGenerator, SourceDescriptor, BATCH_IMPORT_PATH,
    FILES_FIELD, MODEL_FIELD, PROFILE_FIELD,
};
use readguide_logging::{guide_debug, guide_info, guide_warn};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;

use crate::config::AppConfig;

pub const EXPERTS_PATH: &str = "/api/literature/experts";
const UPLOAD_PREFIX: &str = "readguide-upload-";

/// Shared by every request.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<BatchOrchestrator>,
    model_names: Arc<[String]>,
    prompts_dir: PathBuf,
    upload_dir: Option<PathBuf>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(orchestrator: BatchOrchestrator, config: &AppConfig) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            model_names: config.models.iter().map(|m| m.name.clone()).collect(),
            prompts_dir: config.prompts_dir.clone(),
            upload_dir: config.upload_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Wire the file-based collaborators described by `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, GenerationError> {
        let runner = JobRunner::new(
            Arc::new(FileExtractor::new(config.extract_settings())),
            Arc::new(OpenAiGenerator::new(config.generator_settings())?),
            Arc::new(FileGuideStore::new(config.output_dir.clone())),
        );
        let orchestrator = BatchOrchestrator::new(runner, config.batch_settings());
        Ok(Self::new(orchestrator, config))
    }

    fn upload_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(UPLOAD_PREFIX);
        match &self.upload_dir {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)
            }
            None => builder.tempdir(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    Upload { status: StatusCode, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Upload {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload { status, .. } => *status,
            ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            guide_warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/health", get(health))
        .route(EXPERTS_PATH, get(experts))
        .route(BATCH_IMPORT_PATH, post(batch_import).layer(body_limit))
        .with_state(state)
}

/// Serve until `shutdown` resolves. Open event streams are allowed to finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        guide_info!("Listening on {}", addr);
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            guide_warn!("Cannot listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                guide_warn!("Cannot listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => guide_info!("Received Ctrl-C, shutting down"),
        () = terminate => guide_info!("Received SIGTERM, shutting down"),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn experts(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let profiles = available_profiles(&state.prompts_dir).await?;
    Ok(Json(json!({ "experts": profiles })))
}

/// Reduce a client-supplied file name to its last path component.
fn upload_name(file_name: &str) -> Option<String> {
    let name = file_name.rsplit(['/', '\\']).next()?.trim();
    (!name.is_empty() && name != "." && name != "..").then(|| name.to_string())
}

/// Fields of a batch-import form. Files are already written to `uploads`.
struct BatchUpload {
    uploads: TempDir,
    sources: Vec<SourceDescriptor>,
    params: GenerationParams,
}

async fn read_upload(state: &AppState, mut multipart: Multipart) -> Result<BatchUpload, ApiError> {
    let uploads = state.upload_dir()?;
    let mut sources = Vec::new();
    let mut params = GenerationParams::default();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(FILES_FIELD) => {
                let name = field
                    .file_name()
                    .and_then(upload_name)
                    .ok_or_else(|| ApiError::BadRequest("file part without a file name".into()))?;
                let data = field.bytes().await?;
                let path = uploads.path().join(format!("{}-{name}", sources.len()));
                tokio::fs::write(&path, &data).await?;
                guide_debug!("Stored upload {} ({} bytes)", name, data.len());
                sources.push(SourceDescriptor::new(name, path));
            }
            Some(PROFILE_FIELD) => params.profile = field.text().await?.trim().to_string(),
            Some(MODEL_FIELD) => {
                let model = field.text().await?.trim().to_string();
                params.model = (!model.is_empty()).then_some(model);
            }
            other => guide_debug!("Ignoring form field {:?}", other),
        }
    }

    Ok(BatchUpload {
        uploads,
        sources,
        params,
    })
}

async fn batch_import(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let BatchUpload {
        uploads,
        sources,
        params,
    } = read_upload(&state, multipart).await?;

    if sources.is_empty() {
        return Err(ApiError::BadRequest("no files received".to_string()));
    }
    if let Some(model) = params.model.as_deref() {
        if !state.model_names.iter().any(|name| name == model) {
            return Err(ApiError::BadRequest(format!("unknown model `{model}`")));
        }
    }
    if !available_profiles(&state.prompts_dir)
        .await?
        .contains(&params.profile)
    {
        return Err(ApiError::BadRequest(format!(
            "unknown profile `{}`",
            params.profile
        )));
    }

    guide_info!(
        "Accepted batch of {} file(s) for profile {}",
        sources.len(),
        params.profile
    );
    let frames = Arc::clone(&state.orchestrator).spawn_stream(sources, params);
    // The uploaded files live as long as the response body.
    let body = Body::from_stream(frames.map(move |frame| {
        let _uploads = &uploads;
        Ok::<_, Infallible>(frame.to_sse())
    }));

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
