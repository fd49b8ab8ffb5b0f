//! HTTP front end: gallery page, the timelapse artifact, and stored frames.
//!
//! The router only reads from disk and from the scheduler's report channel;
//! everything it needs is injected through [`GalleryState`].

use std::{
    net::SocketAddr,
    path::{Path as FsPath, PathBuf},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use methu_store::list_image_files;
use methu_types::{config::ServerConfig, report::CycleReport, MethuError, Result};
use serde::Serialize;
use tokio::{net::TcpListener, sync::watch, task};
use tracing::{info, warn};

#[derive(Clone)]
pub struct GalleryState {
    images_dir: Arc<PathBuf>,
    artifact: Arc<PathBuf>,
    reports: watch::Receiver<Option<CycleReport>>,
}

impl GalleryState {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        artifact: impl Into<PathBuf>,
        reports: watch::Receiver<Option<CycleReport>>,
    ) -> Self {
        Self {
            images_dir: Arc::new(images_dir.into()),
            artifact: Arc::new(artifact.into()),
            reports,
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageListing {
    images: Vec<String>,
}

pub fn router(state: GalleryState) -> Router {
    Router::new()
        .route("/", get(gallery))
        .route("/gif", get(artifact))
        .route("/images/{name}", get(frame))
        .route("/api/images", get(api_images))
        .route("/update", get(last_cycle))
        .with_state(state)
}

/// Bind `config.address:config.port` and serve until the process exits.
pub async fn serve(config: &ServerConfig, state: GalleryState) -> Result<()> {
    let addr = format!("{}:{}", config.address, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|err| MethuError::Network(format!("failed to bind {addr}: {err}")))?;
    serve_on(listener, state).await
}

pub async fn serve_on(listener: TcpListener, state: GalleryState) -> Result<()> {
    let local: Option<SocketAddr> = listener.local_addr().ok();
    if let Some(addr) = local {
        info!("Gallery server listening on http://{}", addr);
    }
    axum::serve(listener, router(state))
        .await
        .map_err(|err| MethuError::Network(format!("http server error: {err}")))
}

async fn gallery(State(state): State<GalleryState>) -> Response {
    match image_names(state.images_dir.clone()).await {
        Ok(names) => Html(render_gallery(&names)).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn artifact(State(state): State<GalleryState>) -> Response {
    serve_file(&state.artifact).await
}

async fn frame(State(state): State<GalleryState>, Path(name): Path<String>) -> Response {
    if !is_safe_name(&name) {
        return (StatusCode::BAD_REQUEST, "invalid image name").into_response();
    }
    serve_file(&state.images_dir.join(name)).await
}

async fn api_images(State(state): State<GalleryState>) -> Response {
    match image_names(state.images_dir.clone()).await {
        Ok(images) => Json(ImageListing { images }).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn last_cycle(State(state): State<GalleryState>) -> Response {
    let report = state.reports.borrow().clone();
    Json(report).into_response()
}

async fn image_names(dir: Arc<PathBuf>) -> Result<Vec<String>> {
    let files = task::spawn_blocking(move || list_image_files(dir.as_path()))
        .await
        .map_err(|err| MethuError::Network(format!("listing task failed: {err}")))??;
    Ok(files
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect())
}

async fn serve_file(path: &FsPath) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, content_type(path))], bytes).into_response(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "not found").into_response()
        }
        Err(err) => {
            warn!("Failed to read {}: {}", path.display(), err);
            (StatusCode::INTERNAL_SERVER_ERROR, "read failed").into_response()
        }
    }
}

fn internal_error(err: MethuError) -> Response {
    warn!("Gallery request failed: {}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
}

fn content_type(path: &FsPath) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

fn render_gallery(names: &[String]) -> String {
    let mut items = String::new();
    for name in names {
        let escaped = escape_html(name);
        items.push_str(&format!(
            "      <li><a href=\"/images/{escaped}\">{escaped}</a></li>\n"
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html>\n  <head><meta charset=\"utf-8\"><title>Forecast timelapse</title></head>\n  <body>\n    <h1>Forecast timelapse</h1>\n    <img src=\"/gif\" alt=\"timelapse\">\n    <h2>{} stored frames</h2>\n    <ul>\n{items}    </ul>\n  </body>\n</html>\n",
        names.len()
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
