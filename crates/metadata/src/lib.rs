mod resolve;

use std::path::Path;

use lofty::error::LoftyError;
use lofty::prelude::{ItemKey, TaggedFileExt};
use lofty::tag::Tag;

pub use resolve::{
    metadata_from_file_name, resolve_track_metadata, split_artist_title, TrackMetadata,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub artist: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Tag parsing capability. Implementations block on file I/O, so async
/// callers run them on the blocking pool.
pub trait TagReader: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError>;

    /// Bytes of the first embedded picture, if the file carries any.
    fn read_picture(&self, path: &Path) -> Result<Option<Vec<u8>>, MetadataError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<TagInfo, MetadataError> {
        let tagged_file = lofty::read_from_path(path)?;
        let mut info = TagInfo::default();
        if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            info.title = non_empty(tag, &ItemKey::TrackTitle);
            info.artist = non_empty(tag, &ItemKey::TrackArtist)
                .or_else(|| non_empty(tag, &ItemKey::AlbumArtist));
        }
        Ok(info)
    }

    fn read_picture(&self, path: &Path) -> Result<Option<Vec<u8>>, MetadataError> {
        let tagged_file = lofty::read_from_path(path)?;
        let tag = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => tag,
            None => return Ok(None),
        };
        Ok(tag.pictures().first().map(|picture| picture.data().to_vec()))
    }
}

fn non_empty(tag: &Tag, key: &ItemKey) -> Option<String> {
    tag.get_string(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::{LoftyTagReader, MetadataError, TagReader};

    #[test]
    fn missing_file_is_an_error() {
        let dir = std::env::temp_dir().join("metadata-missing-file-test");
        let err = LoftyTagReader
            .read_tags(&dir.join("nope.mp3"))
            .unwrap_err();
        assert!(matches!(err, MetadataError::Io(_) | MetadataError::Lofty(_)));
    }
}
