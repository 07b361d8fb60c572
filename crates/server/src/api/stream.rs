use axum::{
    extract::{Path as AxumPath, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use common::{content_type_for, is_audio_file_name, TrackRef};
use tracing::{debug, warn};

use crate::range::parse_range;
use crate::state::AppState;
use crate::streaming::{range_not_satisfiable, StreamError, StreamSource};
use crate::utils::json_error_response;

pub async fn stream_track(
    State(state): State<AppState>,
    AxumPath((year, season, file)): AxumPath<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let track = TrackRef::new(&year, &season, &file);
    if !is_audio_file_name(&track.file_name) {
        return not_found();
    }
    let path = match state.catalog.track_path(&track) {
        Ok(path) => path,
        Err(err) => {
            debug!("Rejected stream path {:?}: {}", track, err);
            return not_found();
        }
    };

    let source = match StreamSource::open(&path).await {
        Ok(source) => source,
        Err(StreamError::NotFound) => return not_found(),
        Err(err) => {
            warn!("Failed to open {:?}: {}", path, err);
            return not_found();
        }
    };

    let range = headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or_default());
    let request = match parse_range(range, source.size()) {
        Ok(request) => request,
        Err(err) => {
            debug!("Rejected range {:?} for {:?}: {}", range, path, err);
            return range_not_satisfiable(source.size());
        }
    };

    match source
        .into_response(request, &content_type_for(&track.file_name))
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!("Failed to stream {:?}: {}", path, err);
            not_found()
        }
    }
}

fn not_found() -> Response {
    json_error_response(StatusCode::NOT_FOUND, "File not found")
}
