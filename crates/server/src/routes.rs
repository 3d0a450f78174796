use std::path::{Component, PathBuf};

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use cinevault_core::error::ApiError;
use cinevault_core::types::ImageKind;
use cinevault_scanner::catalog::{self, CatalogEntry, ScanOptions};
use cinevault_scanner::subtitles::{self, SubtitleFormat};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::state::{AppState, INGEST_DIR_NAMES};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .nest("/stream", stream_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/videos", get(list_videos))
        .route("/videos/{video}/metadata", get(get_video_metadata))
        .route("/videos/{video}/subtitles", get(get_video_subtitles))
        .route("/videos/{video}/images/{img_type}", get(get_video_image))
}

fn stream_router() -> Router<AppState> {
    Router::new()
        .route("/video/{video}", get(crate::streaming::stream_video_range))
        .route("/subtitles/{sub_path}", get(serve_subtitle))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    media_root: String,
    media_root_exists: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        media_root: state.media_root.display().to_string(),
        media_root_exists: state.media_root.is_dir(),
    })
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ListQuery {
    /// Restrict to one top-level library section, e.g. `films`.
    section: Option<String>,
    /// Also list videos still sitting in the ingest directories.
    include_ingest_dirs: Option<bool>,
}

async fn list_videos(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<CatalogEntry>>, AppError> {
    if !state.media_root.is_dir() {
        return Err(ApiError::NotFound("media root not found".into()).into());
    }

    let mut opts = ScanOptions {
        only_under_dir_name: query.section,
        ..Default::default()
    };
    if !query.include_ingest_dirs.unwrap_or(false) {
        opts.exclude_dir_names = INGEST_DIR_NAMES.iter().map(|s| s.to_string()).collect();
    }

    let entries = catalog::scan(&state.media_root, &opts, state.probe.as_deref()).await;
    Ok(Json(entries))
}

async fn get_video_metadata(
    State(state): State<AppState>,
    Path(video): Path<String>,
) -> Result<Json<CatalogEntry>, AppError> {
    let rel = decode_video_param(&video)?;
    let entry = catalog::describe_video(&state.media_root, &rel, state.probe.as_deref())
        .await
        .ok_or(ApiError::NotFound("video not found".into()))?;
    Ok(Json(entry))
}

// ---------------------------------------------------------------------------
// Subtitles
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubtitleInfo {
    file_name: String,
    language_tag: String,
    format: SubtitleFormat,
    /// URL that serves this file.
    source: String,
}

async fn get_video_subtitles(
    State(state): State<AppState>,
    Path(video): Path<String>,
) -> Result<Json<Vec<SubtitleInfo>>, AppError> {
    let rel = decode_video_param(&video)?;
    let abs = state.media_root.join(&rel);
    if !abs.is_file() {
        return Err(ApiError::NotFound("video not found".into()).into());
    }
    let movie_dir = abs
        .parent()
        .ok_or(ApiError::NotFound("video not found".into()))?;

    let infos = subtitles::scan_movie_subtitles(movie_dir)
        .into_iter()
        .map(|r| {
            // Subtitle paths are relative to the movie folder; the stream
            // URL wants them relative to the media root.
            let full_rel = match rel.parent().filter(|p| !p.as_os_str().is_empty()) {
                Some(dir) => format!("{}/{}", dir.to_string_lossy(), r.relative_path),
                None => r.relative_path.clone(),
            };
            SubtitleInfo {
                file_name: r.file_name,
                language_tag: r.language_tag,
                format: r.format,
                source: format!("/stream/subtitles/{}", hex_encode(&full_rel)),
            }
        })
        .collect();

    Ok(Json(infos))
}

async fn serve_subtitle(
    State(state): State<AppState>,
    Path(sub_path): Path<String>,
) -> Result<axum::response::Response, AppError> {
    use axum::body::Body;
    use axum::response::IntoResponse;

    let decoded =
        hex_decode(&sub_path).ok_or(ApiError::BadRequest("invalid subtitle path".into()))?;
    let path = state.media_root.join(&decoded);

    let canonical = path
        .canonicalize()
        .map_err(|_| ApiError::NotFound("subtitle file not found".into()))?;
    let root = state
        .media_root
        .canonicalize()
        .map_err(|e| ApiError::Internal(format!("canonicalize media root: {e}")))?;
    if !canonical.starts_with(&root) {
        return Err(ApiError::Forbidden("path not under media root".into()).into());
    }

    let ext = canonical.extension().and_then(|e| e.to_str()).unwrap_or("srt");
    let content_type = SubtitleFormat::from_extension(ext)
        .map(|f| f.mime_type())
        .unwrap_or("application/octet-stream");

    let data = tokio::fs::read(&canonical)
        .await
        .map_err(|e| ApiError::Internal(format!("read subtitle: {e}")))?;

    Ok((
        [(axum::http::header::CONTENT_TYPE, content_type)],
        Body::from(data),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

async fn get_video_image(
    State(state): State<AppState>,
    Path((video, img_type)): Path<(String, String)>,
) -> Result<axum::response::Response, AppError> {
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;

    let kind = ImageKind::parse(&img_type).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "invalid image type '{img_type}', must be poster or fanart"
        ))
    })?;

    let rel = decode_video_param(&video)?;
    let abs = state.media_root.join(&rel);
    if !abs.is_file() {
        return Err(ApiError::NotFound("video not found".into()).into());
    }
    let movie_dir = abs
        .parent()
        .ok_or(ApiError::NotFound("video not found".into()))?;
    let image_path = movie_dir.join(kind.file_name());

    let meta = tokio::fs::metadata(&image_path)
        .await
        .map_err(|_| ApiError::NotFound(format!("no {kind} image for video")))?;
    let data = tokio::fs::read(&image_path)
        .await
        .map_err(|e| ApiError::Internal(format!("read image: {e}")))?;

    // ETag from file size + modified time
    let etag = format!(
        "\"{:x}-{:x}\"",
        meta.len(),
        meta.modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH)
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    );

    let content_type = match image_path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::ETAG, etag),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        data,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Path encoding
// ---------------------------------------------------------------------------
//
// Video URLs carry the media-root-relative path hex-encoded, which keeps
// spaces and parentheses in movie folder names out of the URL path.

fn hex_encode(s: &str) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for b in s.bytes() {
        write!(&mut out, "{:02x}", b).unwrap();
    }
    out
}

fn hex_decode(s: &str) -> Option<String> {
    if s.len() % 2 != 0 {
        return None;
    }
    let bytes: Result<Vec<u8>, _> = (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
        .collect();
    bytes.ok().and_then(|b| String::from_utf8(b).ok())
}

/// Decode a hex video path parameter and confine it to the media root.
pub(crate) fn decode_video_param(param: &str) -> Result<PathBuf, AppError> {
    let decoded = hex_decode(param).ok_or(ApiError::BadRequest("invalid video path".into()))?;
    let rel = PathBuf::from(decoded);
    if rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(ApiError::Forbidden("path escapes media root".into()).into());
    }
    Ok(rel)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
