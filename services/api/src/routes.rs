//! API service routes

use std::io;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use futures::TryStreamExt;
use media::{UploadRequest, models::VideoRecord};
use serde_json::json;
use tokio_util::io::StreamReader;
use tracing::info;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::{AuthUser, auth_middleware},
    models::CreateVideoRequest,
};

/// Multipart field carrying the uploaded file
pub const VIDEO_FIELD: &str = "video";

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    // The pipeline enforces its own ceiling while staging
    let upload_routes = Router::new()
        .route("/api/video_upload/:id", post(upload_video))
        .layer(DefaultBodyLimit::disable());

    let protected_routes = Router::new()
        .route("/api/videos", post(create_video).get(list_videos))
        .route("/api/videos/:id", get(get_video))
        .merge(upload_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .merge(protected_routes)
        .with_state(state)
}

fn parse_video_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid video id {:?}", raw)))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "clipvault-api"
    }))
}

/// Create a video record owned by the caller
pub async fn create_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateVideoRequest>,
) -> ApiResult<impl IntoResponse> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title must not be empty".to_string()));
    }

    let video = VideoRecord::draft(user.id, title, payload.description);
    state.videos.create_video(&video).await?;
    info!(video_id = %video.id, user_id = %user.id, "Video created");

    Ok((StatusCode::CREATED, Json(video)))
}

/// List the caller's videos, newest first
pub async fn list_videos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<impl IntoResponse> {
    let videos = state.videos.list_videos(user.id).await?;
    let videos = state.playback.sign_all(videos).await?;

    Ok(Json(videos))
}

/// Get a video by ID with a freshly signed playback URL
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_video_id(&id)?;
    let video = state
        .videos
        .get_video(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Video {} not found", id)))?;

    Ok(Json(state.playback.sign(video).await?))
}

/// Upload the file for an existing video.
///
/// The `video` field is streamed straight into the pipeline; other fields are skipped.
pub async fn upload_video(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let video_id = parse_video_id(&id)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let body = StreamReader::new(field.map_err(|e| io::Error::other(e.to_string())));

        let video = state
            .uploads
            .upload_video(UploadRequest {
                video_id,
                user_id: user.id,
                content_type,
                body,
            })
            .await?;

        return Ok(Json(video));
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field `{}`",
        VIDEO_FIELD
    )))
}
