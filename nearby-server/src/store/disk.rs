//! Disk-based cache store: one JSON file per key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::StoreError;
use super::{CacheEntry, CacheStore, file_safe};

/// File recording which payload format the entries were written in.
const VERSION_FILE: &str = "VERSION";

/// Extension of entry files.
const ENTRY_EXT: &str = "json";

/// An entry as written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    payload: String,
    written_at_secs: i64,
}

/// Cache store keeping each entry in its own file.
///
/// Writes go to a temporary file that is renamed over the entry, so a
/// reader never sees a half-written entry.
#[derive(Debug, Clone)]
pub struct DiskCacheStore {
    dir: PathBuf,
}

impl DiskCacheStore {
    /// Open the cache directory, upgrading it to `version` if needed.
    ///
    /// Run once at startup. If the directory was written with a different
    /// payload format version (or has no version file), all entries are
    /// removed and the new version is recorded.
    pub fn open(dir: impl Into<PathBuf>, version: u32) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| StoreError::io(format!("creating {}", dir.display()), e))?;

        let version_path = dir.join(VERSION_FILE);
        let current = std::fs::read_to_string(&version_path)
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok());

        if current != Some(version) {
            let removed = clear_entries(&dir)?;
            info!(
                dir = %dir.display(),
                from = ?current,
                to = version,
                removed,
                "Upgraded cache directory"
            );
            std::fs::write(&version_path, version.to_string())
                .map_err(|e| StoreError::io(format!("writing {}", version_path.display()), e))?;
        }

        Ok(Self { dir })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", file_safe(key), ENTRY_EXT))
    }
}

/// Remove every entry file in `dir`, returning how many were removed.
fn clear_entries(dir: &Path) -> Result<usize, StoreError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| StoreError::io(format!("listing {}", dir.display()), e))?;

    let mut removed = 0;
    for entry in entries {
        let path = entry
            .map_err(|e| StoreError::io(format!("listing {}", dir.display()), e))?
            .path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(ENTRY_EXT) {
            std::fs::remove_file(&path)
                .map_err(|e| StoreError::io(format!("removing {}", path.display()), e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

impl CacheStore for DiskCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        let path = self.entry_path(key);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(format!("reading {}", path.display()), e)),
        };

        let stored: StoredEntry = serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
            message: format!("{}: {}", path.display(), e),
        })?;

        Ok(Some(CacheEntry {
            key: stored.key,
            payload: stored.payload,
            written_at_secs: stored.written_at_secs,
        }))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(format!("removing {}", path.display()), e)),
        }
    }

    async fn put(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let path = self.entry_path(&entry.key);
        let tmp = path.with_extension("tmp");

        let stored = StoredEntry {
            key: entry.key,
            payload: entry.payload,
            written_at_secs: entry.written_at_secs,
        };
        let json = serde_json::to_string(&stored).map_err(|e| StoreError::Parse {
            message: format!("failed to serialize cache entry: {}", e),
        })?;

        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| StoreError::io(format!("writing {}", tmp.display()), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(format!("renaming to {}", path.display()), e))?;

        Ok(())
    }
}
