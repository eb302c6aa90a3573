//! Idempotency cache for expensive stage output
//!
//! Entries are keyed by a BLAKE3 hash of the input bytes, so byte-identical
//! input maps to the same key in every process. Two tiers:
//! - a bounded in-process map (oldest insertion evicted on overflow)
//! - one JSON file per entry under the cache directory
//!
//! Expired entries are removed lazily on access. Persisted writes go through
//! [`write_json_atomic`](crate::atomic_write::write_json_atomic); concurrent
//! writers to one key are last-writer-wins and there is no cross-process lock.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use crate::atomic_write::write_json_atomic;

/// Default time-to-live for entries (24 hours)
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default cap on in-process entries
pub const DEFAULT_MAX_MEMORY_ENTRIES: usize = 100;

/// Snapshot of cache counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub writes: u64,
    pub evictions: u64,
    pub memory_entries: usize,
}

impl CacheStats {
    /// Calculate cache hit ratio
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// One cached value with its lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub hit_count: u64,
}

impl CacheEntry {
    fn new(key: &str, value: serde_json::Value, ttl: Duration) -> Self {
        let created_at = Utc::now();
        let delta = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expires_at = created_at
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            key: key.to_string(),
            value,
            created_at,
            expires_at,
            hit_count: 0,
        }
    }

    /// An entry is expired once `now` reaches `expires_at`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Default)]
struct MemoryTier {
    entries: HashMap<String, (u64, CacheEntry)>,
    next_seq: u64,
}

impl MemoryTier {
    /// Insert, returning how many entries were evicted to make room.
    fn insert(&mut self, entry: CacheEntry, cap: usize) -> u64 {
        let mut evicted = 0;
        if !self.entries.contains_key(&entry.key) {
            while self.entries.len() >= cap.max(1) {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, (seq, _))| *seq)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        self.entries.remove(&k);
                        evicted += 1;
                    }
                    None => break,
                }
            }
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(entry.key.clone(), (seq, entry));
        evicted
    }
}

/// Two-tier, content-hash-keyed cache shared across jobs.
#[derive(Debug)]
pub struct IdempotencyCache {
    /// Persisted tier; `None` keeps the cache in-process only
    dir: Option<Utf8PathBuf>,
    default_ttl: Duration,
    max_memory_entries: usize,
    memory: Mutex<MemoryTier>,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    evictions: AtomicU64,
}

impl IdempotencyCache {
    /// Create a cache persisting under `dir`.
    pub fn new(dir: Utf8PathBuf, default_ttl: Duration, max_memory_entries: usize) -> Result<Self> {
        crate::paths::ensure_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory: {dir}"))?;
        Ok(Self::build(Some(dir), default_ttl, max_memory_entries))
    }

    /// Create a cache without a persisted tier.
    #[must_use]
    pub fn in_memory(default_ttl: Duration, max_memory_entries: usize) -> Self {
        Self::build(None, default_ttl, max_memory_entries)
    }

    fn build(dir: Option<Utf8PathBuf>, default_ttl: Duration, max_memory_entries: usize) -> Self {
        Self {
            dir,
            default_ttl,
            max_memory_entries: max_memory_entries.max(1),
            memory: Mutex::new(MemoryTier::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Deterministic key for a byte string: lowercase BLAKE3 hex.
    #[must_use]
    pub fn key(content: &[u8]) -> String {
        blake3::hash(content).to_hex().to_string()
    }

    /// Key scoped to a namespace, e.g. `parse_<hash>`.
    #[must_use]
    pub fn namespaced_key(namespace: &str, content: &[u8]) -> String {
        format!("{namespace}_{}", Self::key(content))
    }

    /// Key for a serializable value, hashed over its canonical (JCS) JSON form
    /// so that field order never changes the key.
    pub fn canonical_key<T: Serialize>(namespace: &str, value: &T) -> Result<String> {
        let bytes = serde_json_canonicalizer::to_vec(value)
            .context("Failed to canonicalize cache key input")?;
        Ok(Self::namespaced_key(namespace, &bytes))
    }

    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> MutexGuard<'_, MemoryTier> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry_path(&self, key: &str) -> Option<Utf8PathBuf> {
        let dir = self.dir.as_ref()?;
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        Some(dir.join(format!("{safe}.json")))
    }

    /// Look a key up in memory, then on disk.
    ///
    /// A disk hit is promoted into memory. An expired or unreadable entry is
    /// removed and counts as a miss.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let now = Utc::now();

        {
            let mut tier = self.lock();
            if let Some((_, entry)) = tier.entries.get_mut(key) {
                if entry.is_expired_at(now) {
                    tier.entries.remove(key);
                    drop(tier);
                    self.remove_file(key);
                    debug!(key = %short(key), "Cache entry expired (memory)");
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                entry.hit_count += 1;
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %short(key), "Cache hit (memory)");
                return Some(entry.value.clone());
            }
        }

        if let Some(path) = self.entry_path(key)
            && let Some(mut entry) = self.load_entry(&path)
        {
            if entry.is_expired_at(now) {
                let _ = fs::remove_file(&path);
                debug!(key = %short(key), "Cache entry expired (disk)");
            } else {
                entry.hit_count += 1;
                let value = entry.value.clone();
                let evicted = self.lock().insert(entry, self.max_memory_entries);
                self.evictions.fetch_add(evicted, Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = %short(key), "Cache hit (disk)");
                return Some(value);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = %short(key), "Cache miss");
        None
    }

    /// Typed lookup; a value that no longer deserializes is treated as a miss.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key = %short(key), error = %e, "Cached value has unexpected shape, ignoring");
                None
            }
        }
    }

    /// Store a value in both tiers. `ttl` defaults to the cache's TTL.
    ///
    /// A failed persisted write is logged and swallowed; the in-process entry
    /// is authoritative for this process either way.
    pub fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>) {
        let entry = CacheEntry::new(key, value, ttl.unwrap_or(self.default_ttl));

        if let Some(path) = self.entry_path(key)
            && let Err(e) = write_json_atomic(&path, &entry)
        {
            warn!(key = %short(key), error = %e, "Failed to persist cache entry");
        }

        let evicted = self.lock().insert(entry, self.max_memory_entries);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Typed store.
    pub fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let json = serde_json::to_value(value).context("Failed to serialize cache value")?;
        self.set(key, json, ttl);
        Ok(())
    }

    /// Remove one entry from both tiers. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        let in_memory = self.lock().entries.remove(key).is_some();
        let on_disk = self.remove_file(key);
        in_memory || on_disk
    }

    /// Remove every entry from both tiers.
    pub fn clear(&self) -> Result<()> {
        self.lock().entries.clear();
        if let Some(dir) = &self.dir {
            for path in self.entry_files(dir)? {
                let _ = fs::remove_file(&path);
            }
        }
        Ok(())
    }

    /// Eagerly drop expired entries from both tiers, returning how many went.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;
        {
            let mut tier = self.lock();
            let before = tier.entries.len();
            tier.entries.retain(|_, (_, e)| !e.is_expired_at(now));
            removed += before - tier.entries.len();
        }
        if let Some(dir) = &self.dir {
            for path in self.entry_files(dir)? {
                match self.load_entry(&path) {
                    Some(e) if !e.is_expired_at(now) => {}
                    _ => {
                        if fs::remove_file(&path).is_ok() {
                            removed += 1;
                        }
                    }
                }
            }
        }
        Ok(removed)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            memory_entries: self.lock().entries.len(),
        }
    }

    fn entry_files(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for item in dir
            .read_dir_utf8()
            .with_context(|| format!("Failed to list cache directory: {dir}"))?
        {
            let item = item.with_context(|| format!("Failed to read entry in: {dir}"))?;
            if item.path().extension() == Some("json") {
                files.push(item.into_path());
            }
        }
        Ok(files)
    }

    fn load_entry(&self, path: &Utf8Path) -> Option<CacheEntry> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(_) => {
                // Corrupted cache file, remove it
                let _ = fs::remove_file(path);
                debug!(path = %path, "Cache file corrupted, removed");
                None
            }
        }
    }

    fn remove_file(&self, key: &str) -> bool {
        self.entry_path(key)
            .is_some_and(|path| fs::remove_file(path).is_ok())
    }
}

fn short(key: &str) -> &str {
    let end = key
        .char_indices()
        .nth(16)
        .map_or(key.len(), |(i, _)| i);
    &key[..end]
}
