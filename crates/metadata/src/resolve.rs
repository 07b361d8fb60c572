use std::path::Path;

use common::strip_extension;
use tracing::debug;

use crate::TagReader;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
}

/// Artist and title for a track. Tags win; when no title is tagged the file
/// name is split on its first hyphen (`Artist - Title`), otherwise the bare
/// stem becomes the title. Never fails.
pub fn resolve_track_metadata(
    reader: &dyn TagReader,
    path: &Path,
    file_name: &str,
) -> TrackMetadata {
    let mut meta = match reader.read_tags(path) {
        Ok(info) => TrackMetadata {
            artist: info.artist.unwrap_or_default(),
            title: info.title.unwrap_or_default(),
        },
        Err(err) => {
            debug!("No readable tags in {:?}: {}", path, err);
            TrackMetadata::default()
        }
    };

    if meta.title.is_empty() {
        let from_name = metadata_from_file_name(file_name);
        if meta.artist.is_empty() {
            meta.artist = from_name.artist;
        }
        meta.title = from_name.title;
    }

    meta
}

pub fn metadata_from_file_name(file_name: &str) -> TrackMetadata {
    let stem = strip_extension(file_name);
    match split_artist_title(stem) {
        Some((artist, title)) => TrackMetadata {
            artist: artist.to_string(),
            title: title.to_string(),
        },
        None => TrackMetadata {
            artist: String::new(),
            title: stem.to_string(),
        },
    }
}

/// Splits `"<artist> - <title>"` on the first hyphen that has text on both
/// sides. Both halves come back trimmed and non-empty.
pub fn split_artist_title(stem: &str) -> Option<(&str, &str)> {
    let (pos, _) = stem
        .char_indices()
        .find(|(pos, ch)| *ch == '-' && *pos > 0 && *pos + 1 < stem.len())?;
    let artist = stem[..pos].trim();
    let title = stem[pos + 1..].trim();
    if artist.is_empty() || title.is_empty() {
        return None;
    }
    Some((artist, title))
}
