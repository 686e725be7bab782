mod http;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

pub use http::HttpCatalogResolver;

use crate::dto::track::Track;

#[derive(Clone, Debug, Error)]
pub enum ResolveError {
    #[error("track {0} does not exist in the catalog")]
    NotFound(String),
    #[error("catalog lookup failed: {0}")]
    Transient(String),
}

/// External lookup turning a track identifier into playable metadata.
/// Treated as best-effort: lookups are bounded by a timeout and retried
/// once before a request is refused.
#[async_trait]
pub trait CatalogResolver: Send + Sync {
    async fn resolve(&self, track_id: &str) -> Result<Track, ResolveError>;
}

#[derive(Clone, Debug)]
struct CachedTrack {
    track: Track,
    resolved_at: Instant,
}

/// Shared TTL cache over resolved tracks. This is the only mutable state
/// shared across bars, so it has to take concurrent reads and writes; the
/// scheduler also consults it synchronously when promoting an item to
/// `playing`, treating a missing or expired entry as unplayable.
#[derive(Debug)]
pub struct CatalogCache {
    entries: DashMap<String, CachedTrack>,
    ttl: Duration,
    capacity: usize,
}

impl CatalogCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity,
        }
    }

    pub fn get(&self, track_id: &str) -> Option<Track> {
        let expired = {
            let entry = self.entries.get(track_id)?;
            if entry.resolved_at.elapsed() > self.ttl {
                true
            } else {
                return Some(entry.track.clone());
            }
        };
        if expired {
            debug!("cache entry for track {track_id} expired");
            self.entries.remove(track_id);
        }
        None
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.get(track_id).is_some()
    }

    pub fn insert(&self, track: Track) {
        if self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        self.entries.insert(
            track.track_id.clone(),
            CachedTrack {
                track,
                resolved_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, track_id: &str) {
        self.entries.remove(track_id);
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().resolved_at)
            .map(|entry| entry.key().clone());
        if let Some(track_id) = oldest {
            debug!("evicting oldest cache entry {track_id}");
            self.entries.remove(&track_id);
        }
    }
}
