use std::path::PathBuf;

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    Json,
};
use catalog::CatalogError;
use common::{TrackDescriptor, TrackRef};
use tracing::warn;

use crate::state::{AppState, ErrorResponse, JsonResult};
use crate::utils::json_error;

pub async fn list_years(State(state): State<AppState>) -> JsonResult<Vec<String>> {
    let catalog = state.catalog.clone();
    let years = run_catalog(move || catalog.list_years()).await?;
    Ok(Json(years))
}

pub async fn list_seasons(
    State(state): State<AppState>,
    AxumPath(year): AxumPath<String>,
) -> JsonResult<Vec<String>> {
    let catalog = state.catalog.clone();
    let seasons = run_catalog(move || catalog.list_seasons(&year)).await?;
    Ok(Json(seasons))
}

pub async fn list_files(
    State(state): State<AppState>,
    AxumPath((year, season)): AxumPath<(String, String)>,
) -> JsonResult<Vec<TrackDescriptor>> {
    let catalog = state.catalog.clone();
    let tracks = run_catalog(move || {
        let mut out: Vec<(TrackRef, PathBuf)> = Vec::new();
        for track in catalog.list_tracks(&year, &season)? {
            let path = catalog.track_path(&track)?;
            out.push((track, path));
        }
        Ok(out)
    })
    .await?;

    Ok(Json(state.tracks.describe_all(tracks).await))
}

async fn run_catalog<T, F>(task: F) -> Result<T, (StatusCode, Json<ErrorResponse>)>
where
    F: FnOnce() -> Result<T, CatalogError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(catalog_error(err)),
        Err(err) => Err(json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("catalog task failed: {}", err),
        )),
    }
}

fn catalog_error(err: CatalogError) -> (StatusCode, Json<ErrorResponse>) {
    match err {
        CatalogError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "directory not found"),
        CatalogError::InvalidName(name) => json_error(
            StatusCode::BAD_REQUEST,
            format!("invalid name: {}", name),
        ),
        CatalogError::Io(err) => {
            warn!("Catalog read failed: {}", err);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
