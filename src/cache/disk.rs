//! On-disk layout for persisted cache namespaces
//!
//! ```text
//! <dir>/
//!   index.json          { "keys": [...], "lastUpdated": <unix ms> }
//!   <sha256(key)>.json  { "key", "value", "createdAt", "ttlMs", "contextHash"? }
//! ```

use super::CacheEntry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Name of the index file
pub const INDEX_FILE: &str = "index.json";

/// Keys currently persisted in a namespace directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheIndex {
    /// Live keys
    pub keys: Vec<String>,
    /// When the index was last written (Unix ms)
    pub last_updated: i64,
}

/// File-per-key persistence for one cache namespace
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: PathBuf,
}

impl DiskStore {
    /// Persist under `dir` (created lazily on first write)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Namespace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entry for `key`. Keys are hashed because package
    /// names contain `/` and `@`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }

    /// Path of the index file
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Write one entry
    pub fn write_entry<T: Serialize>(&self, entry: &CacheEntry<T>) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let content = serde_json::to_vec(entry).map_err(io::Error::other)?;
        write_atomic(&self.entry_path(&entry.key), &content)
    }

    /// Remove one entry; a missing file is not an error
    pub fn remove_entry(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.entry_path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Rewrite the index
    pub fn write_index(&self, keys: &[String], now_millis: i64) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let index = CacheIndex {
            keys: keys.to_vec(),
            last_updated: now_millis,
        };
        let content = serde_json::to_vec_pretty(&index).map_err(io::Error::other)?;
        write_atomic(&self.index_path(), &content)
    }

    /// Read the index; a missing index means an empty namespace
    pub fn read_index(&self) -> io::Result<CacheIndex> {
        let content = match fs::read(self.index_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheIndex::default()),
            Err(e) => return Err(e),
        };
        serde_json::from_slice(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Load every entry listed in the index. Unreadable or corrupt entries
    /// are skipped.
    pub fn load<T: DeserializeOwned>(&self) -> io::Result<Vec<CacheEntry<T>>> {
        let index = self.read_index()?;
        let mut entries = Vec::with_capacity(index.keys.len());

        for key in index.keys {
            let path = self.entry_path(&key);
            let parsed = fs::read(&path).and_then(|content| {
                serde_json::from_slice::<CacheEntry<T>>(&content)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
            });
            match parsed {
                Ok(entry) if entry.key == key => entries.push(entry),
                Ok(_) => warn!(path = %path.display(), "cache entry key mismatch, skipping"),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable cache entry"),
            }
        }

        Ok(entries)
    }

    /// Remove every entry file and the index
    pub fn clear(&self) -> io::Result<()> {
        let dir_entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        for dir_entry in dir_entries {
            let path = dir_entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

/// Write via a temp file + rename so readers never see a torn file
fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}
