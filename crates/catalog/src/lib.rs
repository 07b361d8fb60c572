use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use common::{is_audio_file_name, is_safe_component, sort_names, TrackRef};
use tracing::warn;
use walkdir::WalkDir;

/// Read-only view over `<root>/<year>/<season>/<track>`.
#[derive(Clone, Debug)]
pub struct Catalog {
    root: PathBuf,
}

#[derive(Debug)]
pub enum CatalogError {
    NotFound(PathBuf),
    InvalidName(String),
    Io(io::Error),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::NotFound(path) => write!(f, "not found: {}", path.display()),
            CatalogError::InvalidName(name) => write!(f, "invalid name: {:?}", name),
            CatalogError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for CatalogError {}

impl From<io::Error> for CatalogError {
    fn from(err: io::Error) -> Self {
        CatalogError::Io(err)
    }
}

impl From<walkdir::Error> for CatalogError {
    fn from(err: walkdir::Error) -> Self {
        CatalogError::Io(err.into())
    }
}

enum EntryKind {
    Dir,
    AudioFile,
}

impl Catalog {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn list_years(&self) -> Result<Vec<String>, CatalogError> {
        list_entries(&self.root, EntryKind::Dir)
    }

    pub fn list_seasons(&self, year: &str) -> Result<Vec<String>, CatalogError> {
        let dir = self.child(&self.root, year)?;
        list_entries(&dir, EntryKind::Dir)
    }

    pub fn list_files(&self, year: &str, season: &str) -> Result<Vec<String>, CatalogError> {
        list_entries(&self.season_dir(year, season)?, EntryKind::AudioFile)
    }

    pub fn list_tracks(&self, year: &str, season: &str) -> Result<Vec<TrackRef>, CatalogError> {
        Ok(self
            .list_files(year, season)?
            .iter()
            .map(|file_name| TrackRef::new(year, season, file_name))
            .collect())
    }

    pub fn season_dir(&self, year: &str, season: &str) -> Result<PathBuf, CatalogError> {
        let year_dir = self.child(&self.root, year)?;
        self.child(&year_dir, season)
    }

    /// On-disk path of a track. Only validates the name; the file itself may
    /// still be missing.
    pub fn track_path(&self, track: &TrackRef) -> Result<PathBuf, CatalogError> {
        let dir = self.season_dir(&track.year, &track.season)?;
        self.child(&dir, &track.file_name)
    }

    fn child(&self, parent: &Path, name: &str) -> Result<PathBuf, CatalogError> {
        if !is_safe_component(name) {
            return Err(CatalogError::InvalidName(name.to_string()));
        }
        Ok(parent.join(name))
    }
}

fn list_entries(dir: &Path, kind: EntryKind) -> Result<Vec<String>, CatalogError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(CatalogError::NotFound(dir.to_path_buf())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(CatalogError::NotFound(dir.to_path_buf()))
        }
        Err(err) => return Err(err.into()),
    }

    let mut names = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .min_depth(1)
        .max_depth(1)
    {
        let entry = entry?;
        let name = match entry.file_name().to_str() {
            Some(name) => name.to_string(),
            None => {
                warn!("Skipping non-UTF-8 entry {:?}", entry.path());
                continue;
            }
        };
        let keep = match kind {
            EntryKind::Dir => entry.file_type().is_dir(),
            EntryKind::AudioFile => !entry.file_type().is_dir() && is_audio_file_name(&name),
        };
        if keep {
            names.push(name);
        }
    }
    sort_names(&mut names);
    Ok(names)
}
