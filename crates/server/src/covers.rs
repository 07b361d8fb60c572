use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use common::url_escape;
use metadata::{MetadataError, TagReader};
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::thumbnail::{EncodeError, ImageEncoder};

pub const COVERS_URL_PREFIX: &str = "/covers";

/// On-disk store of generated covers, one `<key>.jpg` per cache key. Entries
/// only ever appear through an atomic rename, so a visible file is complete.
#[derive(Debug, Clone)]
pub struct CoverCache {
    dir: PathBuf,
}

impl CoverCache {
    pub fn init(dir: PathBuf) -> io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", key))
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}.jpg", COVERS_URL_PREFIX, url_escape(key))
    }

    pub async fn contains(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.entry_path(key))
            .await
            .unwrap_or(false)
    }

    pub async fn store(&self, key: &str, data: &[u8]) -> io::Result<()> {
        let target = self.entry_path(key);
        // Temp names stay short so any key whose entry name fits also fits here.
        let temp = self
            .dir
            .join(format!(".{}.part", Uuid::new_v4().simple()));
        if let Err(err) = tokio::fs::write(&temp, data).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(err);
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum CoverError {
    Tags(MetadataError),
    Encode(EncodeError),
    Io(io::Error),
    Timeout(Duration),
    Join(JoinError),
}

impl std::fmt::Display for CoverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoverError::Tags(err) => write!(f, "tag read failed: {}", err),
            CoverError::Encode(err) => write!(f, "encode failed: {}", err),
            CoverError::Io(err) => write!(f, "cache write failed: {}", err),
            CoverError::Timeout(limit) => write!(f, "timed out after {:?}", limit),
            CoverError::Join(err) => write!(f, "worker failed: {}", err),
        }
    }
}

impl std::error::Error for CoverError {}

impl From<MetadataError> for CoverError {
    fn from(err: MetadataError) -> Self {
        CoverError::Tags(err)
    }
}

impl From<EncodeError> for CoverError {
    fn from(err: EncodeError) -> Self {
        CoverError::Encode(err)
    }
}

impl From<io::Error> for CoverError {
    fn from(err: io::Error) -> Self {
        CoverError::Io(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverOutcome {
    Cached,
    Generated,
    NoArtwork,
}

#[derive(Clone)]
pub struct CoverResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    cache: CoverCache,
    tags: Arc<dyn TagReader>,
    encoder: Arc<dyn ImageEncoder>,
    fallback_url: String,
    timeout: Duration,
    in_flight: KeyedLocks,
}

impl CoverResolver {
    pub fn new(
        cache: CoverCache,
        tags: Arc<dyn TagReader>,
        encoder: Arc<dyn ImageEncoder>,
        fallback_url: String,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ResolverInner {
                cache,
                tags,
                encoder,
                fallback_url,
                timeout,
                in_flight: KeyedLocks::default(),
            }),
        }
    }

    pub fn cache(&self) -> &CoverCache {
        &self.inner.cache
    }

    pub fn fallback_url(&self) -> &str {
        &self.inner.fallback_url
    }

    /// URL of the cover for `path`, generating it on first use. Any failure
    /// yields the fallback URL and leaves the cache untouched.
    pub async fn resolve(&self, path: &Path, key: &str) -> String {
        match self.ensure(path, key).await {
            Ok(CoverOutcome::Cached) | Ok(CoverOutcome::Generated) => {
                self.inner.cache.url_for(key)
            }
            Ok(CoverOutcome::NoArtwork) => self.fallback_url().to_string(),
            Err(err) => {
                warn!("Cover generation error for {:?}: {}", path, err);
                self.fallback_url().to_string()
            }
        }
    }

    pub async fn ensure(&self, path: &Path, key: &str) -> Result<CoverOutcome, CoverError> {
        let cache = &self.inner.cache;
        if cache.contains(key).await {
            return Ok(CoverOutcome::Cached);
        }

        let _guard = self.inner.in_flight.lock(key).await;
        if cache.contains(key).await {
            return Ok(CoverOutcome::Cached);
        }

        let tags = Arc::clone(&self.inner.tags);
        let encoder = Arc::clone(&self.inner.encoder);
        let source = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, CoverError> {
            let raw = match tags.read_picture(&source)? {
                Some(raw) => raw,
                None => return Ok(None),
            };
            Ok(Some(encoder.encode_jpeg(&raw)?))
        });

        let jpeg = match tokio::time::timeout(self.inner.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(err)) => return Err(CoverError::Join(err)),
            Err(_) => return Err(CoverError::Timeout(self.inner.timeout)),
        };

        match jpeg {
            Some(data) => {
                cache.store(key, &data).await?;
                info!("Cached cover {:?} ({} bytes)", key, data.len());
                Ok(CoverOutcome::Generated)
            }
            None => {
                debug!("No embedded artwork in {:?}", path);
                Ok(CoverOutcome::NoArtwork)
            }
        }
    }
}

/// One async mutex per key, created on demand and dropped once nobody holds
/// or waits for it.
#[derive(Default)]
struct KeyedLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

struct KeyGuard<'a> {
    locks: &'a KeyedLocks,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyedLocks {
    async fn lock(&self, key: &str) -> KeyGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.to_string()).or_default())
        };
        let guard = Arc::clone(&slot).lock_owned().await;
        KeyGuard {
            locks: self,
            key: key.to_string(),
            slot,
            guard: Some(guard),
        }
    }
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.locks.slots.lock();
        self.guard.take();
        // Remaining handles: the map entry and `self.slot`.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
