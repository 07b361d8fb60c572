use std::path::PathBuf;
use std::sync::Arc;

use common::{TrackDescriptor, TrackRef};
use metadata::{metadata_from_file_name, resolve_track_metadata, TagReader, TrackMetadata};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::covers::CoverResolver;

/// Resolves metadata and covers for a season's tracks, several files at a
/// time, and hands them back in catalog order.
#[derive(Clone)]
pub struct TrackPipeline {
    tags: Arc<dyn TagReader>,
    covers: CoverResolver,
    concurrency: usize,
}

impl TrackPipeline {
    pub fn new(tags: Arc<dyn TagReader>, covers: CoverResolver, concurrency: usize) -> Self {
        Self {
            tags,
            covers,
            concurrency: concurrency.max(1),
        }
    }

    pub fn covers(&self) -> &CoverResolver {
        &self.covers
    }

    pub async fn describe_all(&self, tracks: Vec<(TrackRef, PathBuf)>) -> Vec<TrackDescriptor> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for (index, (track, path)) in tracks.iter().cloned().enumerate() {
            let pipeline = self.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                (index, pipeline.describe(&track, path).await)
            });
        }

        let mut slots: Vec<Option<TrackDescriptor>> = vec![None; tracks.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, descriptor)) => slots[index] = Some(descriptor),
                Err(err) => warn!("Track resolution task failed: {}", err),
            }
        }

        slots
            .into_iter()
            .zip(tracks)
            .map(|(slot, (track, _))| {
                slot.unwrap_or_else(|| {
                    self.descriptor(&track, metadata_from_file_name(&track.file_name), None)
                })
            })
            .collect()
    }

    pub async fn describe(&self, track: &TrackRef, path: PathBuf) -> TrackDescriptor {
        let tags = Arc::clone(&self.tags);
        let file_name = track.file_name.clone();
        let tag_path = path.clone();
        let metadata = tokio::task::spawn_blocking(move || {
            resolve_track_metadata(tags.as_ref(), &tag_path, &file_name)
        });
        let cache_key = track.cache_key();
        let cover = self.covers.resolve(&path, &cache_key);

        let (metadata, cover_url) = tokio::join!(metadata, cover);
        let metadata = match metadata {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!("Metadata task failed for {:?}: {}", path, err);
                metadata_from_file_name(&track.file_name)
            }
        };
        self.descriptor(track, metadata, Some(cover_url))
    }

    fn descriptor(
        &self,
        track: &TrackRef,
        metadata: TrackMetadata,
        cover_url: Option<String>,
    ) -> TrackDescriptor {
        TrackDescriptor {
            artist: metadata.artist,
            title: metadata.title,
            extension: track.extension.clone(),
            cover_url: cover_url.unwrap_or_else(|| self.covers.fallback_url().to_string()),
            stream_url: track.stream_url(),
        }
    }
}
