//! On-disk memoization of preprocessing stage outputs.
//!
//! Entries live at `<dir>/<stage>/<key>.bin`, where `key` is the SHA-256 of the
//! stage identity (name and concrete type), its parameters and the input
//! dataset fingerprint. Stages that read reference files put a
//! [`content_fingerprint`] of them into their parameters. The total size
//! of all entries is kept under a byte ceiling by evicting the least recently
//! used entries first.
//!
//! Writes go to a temporary file that is renamed into place, so two runs that
//! compute the same key at the same time both leave a complete entry behind.

use crate::dataset::Dataset;
use crate::error::Result;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Default size ceiling: 2 GiB.
pub const DEFAULT_BYTES_LIMIT: u64 = 2 * 1024 * 1024 * 1024;

const ENTRY_EXT: &str = "bin";

/// Derives the cache key for running `stage` with `params` on `dataset`.
pub fn cache_key(stage: &str, params: &serde_json::Value, dataset: &Dataset) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(stage.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(params)?);
    hasher.update([0u8]);
    hasher.update(dataset.fingerprint()?.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Content fingerprint of a reference input, for use in stage parameters.
///
/// A file hashes its bytes. A directory hashes the names and bytes of its
/// top-level files in name order. An absent path fingerprints as `"absent"`,
/// leaving the stage to report the missing input when it runs.
pub fn content_fingerprint(path: &Path) -> String {
    let mut hasher = Sha256::new();
    match hash_path(path, &mut hasher) {
        Ok(()) => format!("{:x}", hasher.finalize()),
        Err(e) if e.kind() == ErrorKind::NotFound => "absent".to_string(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot fingerprint reference input");
            // never matches a stored entry
            format!("unreadable:{:?}", SystemTime::now())
        }
    }
}

fn hash_path(path: &Path, hasher: &mut Sha256) -> std::io::Result<()> {
    if !path.is_dir() {
        hasher.update(fs::read(path)?);
        return Ok(());
    }
    let mut files = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    files.retain(|p| p.is_file());
    files.sort();
    for file in files {
        if let Some(name) = file.file_name() {
            hasher.update(name.to_string_lossy().as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(fs::read(&file)?);
        hasher.update([0u8]);
    }
    Ok(())
}

fn stage_dir_name(stage: &str) -> String {
    stage
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

#[derive(Clone, Debug)]
struct Entry {
    path: PathBuf,
    bytes: u64,
}

struct Index {
    entries: LruCache<String, Entry>,
    total_bytes: u64,
}

/// Hit/miss counters of a cache instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Bounded, content-addressed store of stage outputs.
pub struct PreprocessingCache {
    dir: PathBuf,
    bytes_limit: u64,
    index: Mutex<Index>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PreprocessingCache {
    /// Opens (creating if needed) a cache directory and indexes existing entries,
    /// oldest modification time first.
    pub fn open<P: AsRef<Path>>(dir: P, bytes_limit: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;

        let mut found: Vec<(SystemTime, String, Entry)> = Vec::new();
        for stage_dir in fs::read_dir(&dir)? {
            let stage_dir = stage_dir?.path();
            if !stage_dir.is_dir() {
                continue;
            }
            for file in fs::read_dir(&stage_dir)? {
                let path = file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                    continue;
                }
                let Some(key) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
                else {
                    continue;
                };
                let meta = fs::metadata(&path)?;
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                found.push((
                    modified,
                    key,
                    Entry {
                        path,
                        bytes: meta.len(),
                    },
                ));
            }
        }
        found.sort_by_key(|(modified, _, _)| *modified);

        let mut index = Index {
            entries: LruCache::unbounded(),
            total_bytes: 0,
        };
        for (_, key, entry) in found {
            index.total_bytes += entry.bytes;
            index.entries.push(key, entry);
        }

        let cache = Self {
            dir,
            bytes_limit,
            index: Mutex::new(index),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        };
        cache.enforce_limit(&mut cache.index.lock());
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bytes_limit(&self) -> u64 {
        self.bytes_limit
    }

    fn entry_path(&self, stage: &str, key: &str) -> PathBuf {
        self.dir
            .join(stage_dir_name(stage))
            .join(format!("{}.{}", key, ENTRY_EXT))
    }

    /// Returns the stored output for `key`, or `None` on a miss.
    ///
    /// Unreadable or undecodable entries count as misses and are removed.
    pub fn get(&self, stage: &str, key: &str) -> Option<Dataset> {
        let mut index = self.index.lock();
        let path = match index.entries.get(key) {
            Some(entry) => entry.path.clone(),
            None => self.entry_path(stage, key),
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(stage, key, error = %e, "cache entry unreadable");
                }
                self.forget(&mut index, key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match Dataset::from_bytes(&bytes) {
            Ok(dataset) => {
                if index.entries.get(key).is_none() {
                    // Written by another run since this cache was opened.
                    index.total_bytes += bytes.len() as u64;
                    index.entries.push(
                        key.to_string(),
                        Entry {
                            path: path.clone(),
                            bytes: bytes.len() as u64,
                        },
                    );
                }
                touch(&path);
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(stage, key, "cache hit");
                Some(dataset)
            }
            Err(e) => {
                warn!(stage, key, error = %e, "corrupt cache entry, discarding");
                self.forget(&mut index, key);
                let _ = fs::remove_file(&path);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Stores `dataset` as the output for `key`, then evicts down to the ceiling.
    pub fn put(&self, stage: &str, key: &str, dataset: &Dataset) -> Result<()> {
        let bytes = dataset.to_bytes()?;
        let path = self.entry_path(stage, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tmp = path.with_extension(format!("tmp-{}-{}", std::process::id(), nanos));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;

        let mut index = self.index.lock();
        self.forget(&mut index, key);
        index.total_bytes += bytes.len() as u64;
        index.entries.push(
            key.to_string(),
            Entry {
                path,
                bytes: bytes.len() as u64,
            },
        );
        debug!(stage, key, bytes = bytes.len(), "cache store");
        self.enforce_limit(&mut index);
        Ok(())
    }

    fn forget(&self, index: &mut Index, key: &str) {
        if let Some(old) = index.entries.pop(key) {
            index.total_bytes = index.total_bytes.saturating_sub(old.bytes);
        }
    }

    fn enforce_limit(&self, index: &mut Index) {
        while index.total_bytes > self.bytes_limit {
            let Some((key, entry)) = index.entries.pop_lru() else {
                break;
            };
            index.total_bytes = index.total_bytes.saturating_sub(entry.bytes);
            if let Err(e) = fs::remove_file(&entry.path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(key, error = %e, "failed to remove evicted cache entry");
                }
            }
            self.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key, bytes = entry.bytes, "cache eviction");
        }
    }

    /// Removes every entry.
    pub fn clear(&self) -> Result<()> {
        let mut index = self.index.lock();
        while let Some((_, entry)) = index.entries.pop_lru() {
            match fs::remove_file(&entry.path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        index.total_bytes = 0;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_bytes(&self) -> u64 {
        self.index.lock().total_bytes
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.lock().entries.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for PreprocessingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreprocessingCache")
            .field("dir", &self.dir)
            .field("bytes_limit", &self.bytes_limit)
            .finish()
    }
}

fn touch(path: &Path) {
    let _ = fs::File::options()
        .write(true)
        .open(path)
        .and_then(|f| f.set_modified(SystemTime::now()));
}
