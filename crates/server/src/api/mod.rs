pub mod browse;
pub mod stream;

use axum::{response::IntoResponse, routing::get, Json, Router};
use tower_http::services::{ServeDir, ServeFile};

use crate::covers::COVERS_URL_PREFIX;
use crate::state::{AppState, HealthResponse};

pub const DEFAULT_COVER_FILE: &str = "default-cover.png";

pub fn app_router(state: AppState) -> Router {
    let public_root = state.public_root.as_ref().clone();
    let cover_dir = state.tracks.covers().cache().dir().to_path_buf();
    let covers = ServeDir::new(cover_dir)
        .fallback(ServeFile::new(public_root.join(DEFAULT_COVER_FILE)));

    Router::new()
        .route("/api/health", get(health))
        .route("/api/years", get(browse::list_years))
        .route("/api/seasons/:year", get(browse::list_seasons))
        .route("/api/files/:year/:season", get(browse::list_files))
        .route("/stream/:year/:season/:file", get(stream::stream_track))
        .nest_service(COVERS_URL_PREFIX, covers)
        .fallback_service(ServeDir::new(public_root))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
