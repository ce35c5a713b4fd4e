//! Blob backends holding artifact content
//!
//! A backend only stores bytes under an id. Visibility, metadata and expiry
//! live in the store's index, which publishes an id only after the backend
//! write has returned successfully.

use super::ArtifactId;
use crate::error::{Error, Result};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const PARTIAL_DIR: &str = ".partial";

/// Storage medium for artifact bytes
pub trait BlobBackend: Send + Sync {
    /// Persist `data` under `id`. Must leave nothing behind on failure.
    fn write(&self, id: ArtifactId, data: &Bytes) -> Result<()>;

    /// Read the bytes stored under `id`
    fn read(&self, id: ArtifactId) -> Result<Bytes>;

    /// Remove the bytes stored under `id`. Removing an absent id is not an error.
    fn delete(&self, id: ArtifactId) -> Result<()>;

    /// Short name used in logs
    fn kind(&self) -> &'static str;
}

struct MemoryInner {
    blobs: HashMap<ArtifactId, Bytes>,
    total_bytes: usize,
}

/// In-memory backend with a byte budget.
///
/// Unlike a cache, nothing is evicted to make room: a write that does not fit
/// is rejected with `StorageExhausted` and existing artifacts stay intact.
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
    max_bytes: usize,
}

impl MemoryBackend {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                blobs: HashMap::new(),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Total bytes currently held
    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}

impl BlobBackend for MemoryBackend {
    fn write(&self, id: ArtifactId, data: &Bytes) -> Result<()> {
        let mut inner = self.inner.lock();
        let needed = inner.total_bytes.saturating_add(data.len());
        if needed > self.max_bytes {
            return Err(Error::StorageExhausted {
                detail: format!(
                    "memory budget of {} bytes exceeded ({} in use, {} requested)",
                    self.max_bytes,
                    inner.total_bytes,
                    data.len()
                ),
            });
        }
        inner.total_bytes = needed;
        if let Some(old) = inner.blobs.insert(id, data.clone()) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.len());
        }
        Ok(())
    }

    fn read(&self, id: ArtifactId) -> Result<Bytes> {
        self.inner.lock().blobs.get(&id).cloned().ok_or(Error::NotFound)
    }

    fn delete(&self, id: ArtifactId) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(old) = inner.blobs.remove(&id) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.len());
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

/// Local filesystem backend: one file per artifact.
///
/// Writes land in `<root>/.partial/<id>` and are renamed into `<root>/<id>`
/// once fully flushed, so a blob file is either absent or complete.
pub struct DiskBackend {
    root: PathBuf,
}

impl DiskBackend {
    /// Open (creating if necessary) a backend rooted at `root`.
    ///
    /// Artifacts do not survive restarts, so leftovers from a previous run
    /// (partial writes and blobs named like artifact ids) are purged. Files
    /// with other names are left alone.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(PARTIAL_DIR))?;

        let backend = Self { root };
        let purged = backend.purge_leftovers()?;
        if purged > 0 {
            tracing::info!(
                dir = %backend.root.display(),
                purged,
                "Removed artifacts left over from a previous run"
            );
        }
        Ok(backend)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: ArtifactId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn partial_path(&self, id: ArtifactId) -> PathBuf {
        self.root.join(PARTIAL_DIR).join(id.to_string())
    }

    fn purge_leftovers(&self) -> Result<usize> {
        let mut purged = 0;

        for entry in fs::read_dir(self.root.join(PARTIAL_DIR))? {
            let entry = entry?;
            if entry.file_type()?.is_file() && fs::remove_file(entry.path()).is_ok() {
                purged += 1;
            }
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if ArtifactId::parse(name).is_some() && fs::remove_file(entry.path()).is_ok() {
                purged += 1;
            }
        }

        Ok(purged)
    }

    fn write_partial(&self, partial: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(partial)?;
        file.write_all(data)?;
        file.sync_all()
    }
}

/// Out-of-space conditions become `StorageExhausted`; everything else stays an I/O error
fn map_write_error(e: std::io::Error) -> Error {
    const ENOSPC: i32 = 28;
    if e.kind() == ErrorKind::StorageFull || e.raw_os_error() == Some(ENOSPC) {
        Error::StorageExhausted {
            detail: e.to_string(),
        }
    } else {
        Error::Io(e)
    }
}

impl BlobBackend for DiskBackend {
    fn write(&self, id: ArtifactId, data: &Bytes) -> Result<()> {
        let partial = self.partial_path(id);
        let dest = self.blob_path(id);

        let result = self
            .write_partial(&partial, data)
            .and_then(|()| fs::rename(&partial, &dest));

        if let Err(e) = result {
            let _ = fs::remove_file(&partial);
            return Err(map_write_error(e));
        }
        Ok(())
    }

    fn read(&self, id: ArtifactId) -> Result<Bytes> {
        match fs::read(self.blob_path(id)) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn delete(&self, id: ArtifactId) -> Result<()> {
        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn kind(&self) -> &'static str {
        "disk"
    }
}
