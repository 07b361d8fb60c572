use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use catalog::Catalog;
use serde::Serialize;

use crate::listing::TrackPipeline;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub tracks: TrackPipeline,
    pub public_root: Arc<PathBuf>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;
