// src/server.rs - HTTP front end for video analysis
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisResult, VideoAnalyzer};
use crate::config::{ServerSettings, Settings};
use crate::error::{ApiError, ServerError};
use crate::exercise::ExerciseType;

const VIDEO_FIELDS: [&str; 2] = ["video", "videoFile"];
const EXERCISE_FIELDS: [&str; 2] = ["exercise_type", "exerciseType"];

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<VideoAnalyzer>,
    upload_dir: Arc<PathBuf>,
}

impl AppState {
    pub fn new(analyzer: VideoAnalyzer, upload_dir: PathBuf) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            upload_dir: Arc::new(upload_dir),
        }
    }
}

pub fn router(state: AppState, settings: &ServerSettings) -> Router {
    // Requests past the limit wait for a free slot.
    let analyze = post(analyze_upload)
        .layer(ConcurrencyLimitLayer::new(settings.max_concurrent_analyses.max(1)));

    Router::new()
        .route("/analyze", analyze)
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .with_state(state)
}

pub async fn serve(settings: Settings) -> Result<(), ServerError> {
    let upload_dir = settings.server.upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir)
        .await
        .map_err(|e| ServerError::UploadDir(e, upload_dir.display().to_string()))?;

    let analyzer = VideoAnalyzer::new(
        settings.analysis_config(),
        settings.video.clone(),
        Arc::new(settings.pose.clone()),
    );
    let app = router(AppState::new(analyzer, upload_dir), &settings.server);

    let addr = settings.server.bind_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind(e, addr.clone()))?;
    info!("Listening for analysis requests on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn analyze_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let mut video = None;
    let mut selector = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if VIDEO_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            video = Some((file_name, bytes));
        } else if EXERCISE_FIELDS.contains(&name.as_str()) {
            let text = field
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(e.body_text()))?;
            selector = Some(text);
        } else {
            debug!("Ignoring form field {:?}", name);
        }
    }

    let Some((file_name, bytes)) = video else {
        return Err(ApiError::BadRequest("a video file is required".to_string()));
    };
    let Some(selector) = selector else {
        return Err(ApiError::BadRequest("an exercise type is required".to_string()));
    };

    if ExerciseType::from_selector(&selector).is_none() {
        info!("Unknown exercise type {:?}, skipping analysis", selector);
        return Ok(Json(AnalysisResult::invalid_exercise()));
    }

    let upload = StagedUpload::write(&state.upload_dir, &file_name, &bytes)
        .await
        .map_err(ApiError::Staging)?;
    info!("Staged {} bytes at {}", bytes.len(), upload.path().display());

    let analyzer = Arc::clone(&state.analyzer);
    let result = tokio::task::spawn_blocking(move || {
        let result = analyzer.analyze(upload.path(), &selector);
        drop(upload);
        result
    })
    .await??;

    Ok(Json(result))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Analysis request failed: {}", self);
        } else {
            warn!("Rejected analysis request: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// An uploaded video on local disk, deleted when dropped.
struct StagedUpload {
    path: PathBuf,
}

impl StagedUpload {
    async fn write(dir: &Path, original_name: &str, bytes: &[u8]) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("{}_{}", Uuid::new_v4(), sanitize_file_name(original_name)));
        let upload = Self { path };
        tokio::fs::write(&upload.path, bytes).await?;
        Ok(upload)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged upload {}: {}", self.path.display(), e),
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .take(64)
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
