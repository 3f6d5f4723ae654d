//! Byte-addressable blob storage keyed by hierarchical relative paths.
//!
//! The ingestion pipeline is generic over this seam so tests can inject
//! failing stores; production uses the filesystem implementation.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};

pub trait BlobStore: Sync {
    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()>;
    fn read(&self, path: &str) -> io::Result<Vec<u8>>;
    fn delete(&self, path: &str) -> io::Result<()>;
    fn exists(&self, path: &str) -> bool;
}

/// Filesystem store rooted at a media directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl BlobStore for FsStore {
    fn write(&self, path: &str, bytes: &[u8]) -> io::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full, bytes)
    }

    fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path))
    }

    fn delete(&self, path: &str) -> io::Result<()> {
        std::fs::remove_file(self.resolve(path))
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).exists()
    }
}

const WRITE_ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_millis(50);

/// Write with bounded retry. Transient I/O faults get `WRITE_ATTEMPTS`
/// tries with linear backoff before surfacing as a fatal storage error.
pub fn write_with_retry<S: BlobStore + ?Sized>(store: &S, path: &str, bytes: &[u8]) -> Result<()> {
    let mut last_err = None;
    for attempt in 1..=WRITE_ATTEMPTS {
        match store.write(path, bytes) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(path, attempt, error = %e, "blob write failed");
                last_err = Some(e);
                if attempt < WRITE_ATTEMPTS {
                    std::thread::sleep(BACKOFF_STEP * attempt);
                }
            }
        }
    }
    Err(Error::Storage {
        path: path.to_string(),
        detail: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
    })
}

/// Best-effort removal of partially written blobs after a fatal error.
pub fn remove_blobs<S: BlobStore + ?Sized>(store: &S, paths: &[String]) {
    for path in paths {
        if store.exists(path) {
            if let Err(e) = store.delete(path) {
                warn!(path, error = %e, "failed to clean up blob");
            }
        }
    }
}
