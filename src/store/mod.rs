//! Ephemeral artifact store
//!
//! Holds the finished outputs of tool calls under unguessable ids until their
//! retention window runs out. Content lives in a [`BlobBackend`]; the store
//! keeps an index from id to metadata and enforces expiry on every read, so
//! an expired artifact is never served even if no sweep has run yet.

mod backend;
mod clock;
mod id;

pub use backend::{BlobBackend, DiskBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use id::ArtifactId;

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Metadata of a stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub id: ArtifactId,
    /// Suggested display name, used for content-disposition only
    pub filename: String,
    /// MIME type served verbatim
    pub media_type: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A stored artifact: metadata plus immutable content
#[derive(Debug, Clone)]
pub struct Artifact {
    pub meta: Arc<ArtifactMeta>,
    pub content: Bytes,
}

/// Input for a single artifact in [`ArtifactStore::put_all`]
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub content: Bytes,
    pub filename: String,
    pub media_type: String,
}

enum Slot {
    /// Id reserved, content still being written; invisible to readers
    Pending,
    Ready(Arc<ArtifactMeta>),
}

/// Concurrent artifact store with read-time expiry
pub struct ArtifactStore {
    index: RwLock<HashMap<ArtifactId, Slot>>,
    backend: Box<dyn BlobBackend>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    sweep_guard: Mutex<()>,
    /// Ids already gone from the index whose content could not be deleted
    orphaned: Mutex<HashSet<ArtifactId>>,
}

impl ArtifactStore {
    /// Create a store over `backend` using the wall clock
    pub fn new(backend: Box<dyn BlobBackend>, retention: std::time::Duration) -> Self {
        Self::with_clock(backend, retention, Arc::new(SystemClock))
    }

    /// Create a store with an explicit time source
    pub fn with_clock(
        backend: Box<dyn BlobBackend>,
        retention: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            index: RwLock::new(HashMap::new()),
            backend,
            clock,
            retention: chrono::Duration::from_std(retention).unwrap_or(chrono::Duration::MAX),
            sweep_guard: Mutex::new(()),
            orphaned: Mutex::new(HashSet::new()),
        }
    }

    /// Build a store from storage configuration
    pub fn from_config(storage: &StorageConfig, retention: std::time::Duration) -> Result<Self> {
        let backend: Box<dyn BlobBackend> = match storage {
            StorageConfig::Memory { max_bytes } => Box::new(MemoryBackend::new(*max_bytes)),
            StorageConfig::Disk { dir } => Box::new(DiskBackend::open(dir)?),
        };
        Ok(Self::new(backend, retention))
    }

    /// Current time as seen by this store
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn retention(&self) -> chrono::Duration {
        self.retention
    }

    /// Store `content` and return its metadata.
    ///
    /// The artifact becomes visible to [`get`](Self::get) only once this
    /// returns `Ok`; on error nothing is stored.
    pub fn put(
        &self,
        content: Bytes,
        filename: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Result<Arc<ArtifactMeta>> {
        let id = self.reserve_id();

        if let Err(e) = self.backend.write(id, &content) {
            self.index.write().remove(&id);
            return Err(e);
        }

        let created_at = self.clock.now();
        let expires_at = created_at
            .checked_add_signed(self.retention)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let meta = Arc::new(ArtifactMeta {
            id,
            filename: filename.into(),
            media_type: media_type.into(),
            size: content.len() as u64,
            created_at,
            expires_at,
        });

        self.index.write().insert(id, Slot::Ready(meta.clone()));

        tracing::debug!(
            id = %id,
            media_type = %meta.media_type,
            size = meta.size,
            backend = self.backend.kind(),
            "Stored artifact"
        );

        Ok(meta)
    }

    /// Store several artifacts all-or-nothing: if any put fails, the ones
    /// already stored by this call are removed before the error is returned.
    pub fn put_all(&self, items: Vec<NewArtifact>) -> Result<Vec<Arc<ArtifactMeta>>> {
        let mut stored: Vec<Arc<ArtifactMeta>> = Vec::with_capacity(items.len());

        for item in items {
            match self.put(item.content, item.filename, item.media_type) {
                Ok(meta) => stored.push(meta),
                Err(e) => {
                    for meta in &stored {
                        self.remove(meta.id);
                    }
                    return Err(e);
                }
            }
        }

        Ok(stored)
    }

    /// Fetch an artifact.
    ///
    /// Unknown, expired and evicted ids all yield the same `NotFound`.
    pub fn get(&self, id: ArtifactId) -> Result<Artifact> {
        let meta = match self.index.read().get(&id) {
            Some(Slot::Ready(meta)) => meta.clone(),
            _ => return Err(Error::NotFound),
        };

        if self.clock.now() >= meta.expires_at {
            return Err(Error::NotFound);
        }

        let content = self.backend.read(id)?;
        Ok(Artifact { meta, content })
    }

    /// Explicitly delete an artifact. Returns whether it existed.
    pub fn remove(&self, id: ArtifactId) -> bool {
        let removed = match self.index.write().entry(id) {
            Entry::Occupied(slot) if matches!(slot.get(), Slot::Ready(_)) => {
                slot.remove();
                true
            }
            _ => false,
        };

        if removed {
            self.delete_content(id);
        }
        removed
    }

    /// Ids of published artifacts with `expires_at <= now`, as of this call
    pub fn expired_snapshot(&self, now: DateTime<Utc>) -> Vec<ArtifactId> {
        self.index
            .read()
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Ready(meta) if meta.expires_at <= now => Some(*id),
                _ => None,
            })
            .collect()
    }

    /// Evict the given ids if they are still present and expired at `now`.
    ///
    /// Each entry is removed under its own short write lock; content is
    /// deleted outside the index lock. Returns the number of entries removed.
    pub fn evict(&self, ids: &[ArtifactId], now: DateTime<Utc>) -> usize {
        let mut removed = 0;

        for &id in ids {
            let evicted = {
                let mut index = self.index.write();
                let expired = matches!(
                    index.get(&id),
                    Some(Slot::Ready(meta)) if meta.expires_at <= now
                );
                if expired {
                    index.remove(&id);
                }
                expired
            };

            if !evicted {
                continue;
            }
            removed += 1;
            self.delete_content(id);
        }

        removed
    }

    /// Delete the content of an id already dropped from the index. On
    /// failure the id is kept for [`retry_orphaned`](Self::retry_orphaned).
    fn delete_content(&self, id: ArtifactId) {
        if let Err(e) = self.backend.delete(id) {
            tracing::warn!(id = %id, error = %e, "Failed to delete artifact content, will retry");
            self.orphaned.lock().insert(id);
        }
    }

    /// Retry content deletions that failed earlier. Returns how many succeeded.
    pub fn retry_orphaned(&self) -> usize {
        let pending: Vec<ArtifactId> = self.orphaned.lock().drain().collect();
        let mut deleted = 0;

        for id in pending {
            match self.backend.delete(id) {
                Ok(()) => deleted += 1,
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Retried content deletion failed");
                    self.orphaned.lock().insert(id);
                }
            }
        }

        if deleted > 0 {
            tracing::info!(deleted, "Deleted content left behind by earlier sweeps");
        }
        deleted
    }

    /// Number of ids whose content still awaits deletion
    pub fn orphaned_len(&self) -> usize {
        self.orphaned.lock().len()
    }

    /// Remove every artifact that existed when the scan started and whose
    /// `expires_at <= now`. Artifacts stored during the scan are never touched.
    ///
    /// Content deletions that failed on earlier sweeps are retried first.
    pub fn delete_expired(&self, now: DateTime<Utc>) -> usize {
        self.retry_orphaned();

        let snapshot = self.expired_snapshot(now);
        if snapshot.is_empty() {
            return 0;
        }
        self.evict(&snapshot, now)
    }

    /// Like [`delete_expired`](Self::delete_expired), but returns `None`
    /// without doing anything if another sweep on this store is in progress.
    pub fn try_delete_expired(&self, now: DateTime<Utc>) -> Option<usize> {
        let _guard = self.sweep_guard.try_lock()?;
        Some(self.delete_expired(now))
    }

    /// Number of published artifacts (expired ones included until swept)
    pub fn len(&self) -> usize {
        self.index
            .read()
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve a fresh id that is not currently in the index
    fn reserve_id(&self) -> ArtifactId {
        let mut index = self.index.write();
        loop {
            let id = ArtifactId::generate();
            if self.orphaned.lock().contains(&id) {
                continue;
            }
            if let Entry::Vacant(slot) = index.entry(id) {
                slot.insert(Slot::Pending);
                return id;
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn sweep_guard(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.sweep_guard.lock()
    }
}
