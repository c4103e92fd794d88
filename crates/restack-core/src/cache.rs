//! Caching decorator
//!
//! [`CachingClient`] wraps any [`RestClient`] and memoizes GET results per
//! `(url, canonical headers)` key. Successful bodies and "not found"
//! outcomes (HTTP 400/404, stored as negative entries) are both cached;
//! any other failure evicts the key so a failed attempt never poisons the
//! cache. Writes (POST/PATCH) pass straight through.
//!
//! Storage is pluggable behind [`CacheStore`]; the active store can be
//! swapped at runtime with [`CachingClient::replace_cache`], which copies
//! the existing entries into the new store before use.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::client::{Headers, RestClient};
use crate::error::{Error, Result};
use crate::response::ResponseHolder;

/// A cached outcome: a response body, or an explicit "resolves to absence"
/// marker distinct from "not yet attempted".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Body(Bytes),
    Negative,
}

/// Storage backend for the caching decorator.
///
/// Implementations must make `get`/`put`/`remove` on a single key appear
/// atomic to concurrent callers; the decorator serializes access through
/// its own lock, so plain storage is sufficient.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CachedValue>>;
    fn put(&self, key: &str, value: CachedValue) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// All current entries, used for copy-through when the store is
    /// replaced.
    fn entries(&self) -> Result<Vec<(String, CachedValue)>>;
}

/// Deterministic cache key: the URL plus the canonical JSON rendering of
/// the header map. `Headers` is a sorted map, so header insertion order
/// never affects the key.
pub fn cache_key(url: &str, headers: &Headers) -> String {
    let canonical_headers =
        serde_json::to_string(headers).unwrap_or_else(|_| String::from("{}"));
    format!("{} {}", url, canonical_headers)
}

/// In-memory cache store.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, CachedValue>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: CachedValue) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, CachedValue)>> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    negative: bool,
    /// Base64 body; absent for negative entries.
    body: Option<String>,
}

/// Cache store persisting one JSON file per entry in a folder.
pub struct JsonFileCacheStore {
    directory: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileCacheStore {
    /// Store rooted at an explicit directory (created if missing).
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).map_err(|e| Error::Cache {
            message: format!("failed to create cache directory {}: {}", directory.display(), e),
            source: Some(anyhow::Error::new(e)),
        })?;
        Ok(Self {
            directory,
            lock: Mutex::new(()),
        })
    }

    /// Named store under the system temp directory.
    pub fn local(name: &str) -> Result<Self> {
        Self::open(std::env::temp_dir().join("restack-cache").join(name))
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        self.directory.join(format!("{:016x}.json", hasher.finish()))
    }

    fn read_entry(&self, path: &PathBuf) -> Result<Option<StoredEntry>> {
        match std::fs::read(path) {
            Ok(raw) => {
                let entry: StoredEntry =
                    serde_json::from_slice(&raw).map_err(|e| Error::Cache {
                        message: format!("corrupt cache entry {}: {}", path.display(), e),
                        source: Some(anyhow::Error::new(e)),
                    })?;
                Ok(Some(entry))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Cache {
                message: format!("failed to read cache entry {}: {}", path.display(), e),
                source: Some(anyhow::Error::new(e)),
            }),
        }
    }

    fn decode(entry: StoredEntry) -> Result<CachedValue> {
        if entry.negative {
            return Ok(CachedValue::Negative);
        }
        let encoded = entry.body.unwrap_or_default();
        let body = BASE64.decode(encoded).map_err(|e| Error::Cache {
            message: format!("corrupt cache body: {}", e),
            source: Some(anyhow::Error::new(e)),
        })?;
        Ok(CachedValue::Body(Bytes::from(body)))
    }
}

impl CacheStore for JsonFileCacheStore {
    fn get(&self, key: &str) -> Result<Option<CachedValue>> {
        let _guard = self.lock.lock();
        let path = self.entry_path(key);
        match self.read_entry(&path)? {
            // Hash collision: treat a mismatched key as absent.
            Some(entry) if entry.key == key => Self::decode(entry).map(Some),
            _ => Ok(None),
        }
    }

    fn put(&self, key: &str, value: CachedValue) -> Result<()> {
        let _guard = self.lock.lock();
        let entry = match value {
            CachedValue::Body(body) => StoredEntry {
                key: key.to_string(),
                negative: false,
                body: Some(BASE64.encode(&body)),
            },
            CachedValue::Negative => StoredEntry {
                key: key.to_string(),
                negative: true,
                body: None,
            },
        };
        let raw = serde_json::to_vec(&entry).map_err(|e| Error::Cache {
            message: format!("failed to encode cache entry: {}", e),
            source: Some(anyhow::Error::new(e)),
        })?;
        let path = self.entry_path(key);
        std::fs::write(&path, raw).map_err(|e| Error::Cache {
            message: format!("failed to write cache entry {}: {}", path.display(), e),
            source: Some(anyhow::Error::new(e)),
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock();
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Cache {
                message: format!("failed to remove cache entry {}: {}", path.display(), e),
                source: Some(anyhow::Error::new(e)),
            }),
        }
    }

    fn entries(&self) -> Result<Vec<(String, CachedValue)>> {
        let _guard = self.lock.lock();
        let mut collected = Vec::new();
        let dir = std::fs::read_dir(&self.directory).map_err(|e| Error::Cache {
            message: format!("failed to list cache directory {}: {}", self.directory.display(), e),
            source: Some(anyhow::Error::new(e)),
        })?;
        for dir_entry in dir {
            let dir_entry = dir_entry.map_err(|e| Error::Cache {
                message: format!("failed to list cache directory: {}", e),
                source: Some(anyhow::Error::new(e)),
            })?;
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(entry) = self.read_entry(&path)? {
                let key = entry.key.clone();
                collected.push((key, Self::decode(entry)?));
            }
        }
        Ok(collected)
    }
}

/// Single-flight marker: waiters block on the condvar until the fetching
/// caller settles the key.
struct Flight {
    done: Mutex<bool>,
    condvar: Condvar,
}

impl Flight {
    fn new() -> Self {
        Self {
            done: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.condvar.wait(&mut done);
        }
    }

    fn complete(&self) {
        *self.done.lock() = true;
        self.condvar.notify_all();
    }
}

struct CacheState {
    store: Box<dyn CacheStore>,
    in_flight: HashMap<String, Arc<Flight>>,
}

enum Lookup {
    Hit(CachedValue),
    Miss(Arc<Flight>),
}

/// Caching decorator over any [`RestClient`].
pub struct CachingClient<C> {
    inner: C,
    state: Mutex<CacheState>,
}

impl<C: RestClient> CachingClient<C> {
    /// Caching decorator with an in-memory store.
    pub fn new(inner: C) -> Self {
        Self::with_store(inner, InMemoryCacheStore::new())
    }

    /// Caching decorator over an explicit store.
    pub fn with_store<S: CacheStore + 'static>(inner: C, store: S) -> Self {
        Self {
            inner,
            state: Mutex::new(CacheState {
                store: Box::new(store),
                in_flight: HashMap::new(),
            }),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Swap the active store, copying every existing entry into the new
    /// store first so no cached result is lost.
    pub fn replace_cache<S: CacheStore + 'static>(&self, new_store: S) -> Result<()> {
        let mut state = self.state.lock();
        for (key, value) in state.store.entries()? {
            new_store.put(&key, value)?;
        }
        state.store = Box::new(new_store);
        Ok(())
    }

    /// Either return the cached value for `key` or register this caller as
    /// the single in-flight fetcher. Concurrent callers for the same key
    /// block until the fetcher settles, then re-check the store.
    fn lookup_or_begin(&self, key: &str) -> Result<Lookup> {
        loop {
            let waiter = {
                let mut state = self.state.lock();
                if let Some(value) = state.store.get(key)? {
                    return Ok(Lookup::Hit(value));
                }
                match state.in_flight.get(key) {
                    Some(flight) => flight.clone(),
                    None => {
                        let flight = Arc::new(Flight::new());
                        state.in_flight.insert(key.to_string(), flight.clone());
                        return Ok(Lookup::Miss(flight));
                    }
                }
            };
            waiter.wait();
            // The fetcher either stored a value or evicted the key; if it
            // failed, this caller takes over the fetch on the next pass.
        }
    }

    fn settle_put(&self, key: &str, flight: &Flight, value: CachedValue) -> Result<()> {
        let mut state = self.state.lock();
        let outcome = state.store.put(key, value);
        state.in_flight.remove(key);
        drop(state);
        flight.complete();
        outcome
    }

    fn settle_evict(&self, key: &str, flight: &Flight) {
        let mut state = self.state.lock();
        // Eviction on failure is best-effort; the error that caused it is
        // the one the caller must see.
        let _ = state.store.remove(key);
        state.in_flight.remove(key);
        drop(state);
        flight.complete();
    }
}

impl<C: RestClient> RestClient for CachingClient<C> {
    fn get(&self, url: &str, headers: &Headers) -> Result<Option<Bytes>> {
        let key = cache_key(url, headers);
        log::trace!("request to url: {}", url);

        match self.lookup_or_begin(&key)? {
            Lookup::Hit(CachedValue::Body(body)) => {
                log::trace!("cached");
                Ok(Some(body))
            }
            Lookup::Hit(CachedValue::Negative) => {
                log::trace!("cached (negative)");
                Ok(None)
            }
            Lookup::Miss(flight) => {
                log::trace!("executing raw request to {}", url);
                match self.inner.get(url, headers) {
                    Ok(Some(body)) => {
                        self.settle_put(&key, &flight, CachedValue::Body(body.clone()))?;
                        Ok(Some(body))
                    }
                    Ok(None) => {
                        self.settle_put(&key, &flight, CachedValue::Negative)?;
                        Ok(None)
                    }
                    Err(Error::Status { status, .. }) if status == 400 || status == 404 => {
                        self.settle_put(&key, &flight, CachedValue::Negative)?;
                        Ok(None)
                    }
                    Err(err) => {
                        self.settle_evict(&key, &flight);
                        Err(err)
                    }
                }
            }
        }
    }

    fn get_and(&self, url: &str, headers: &Headers) -> Result<ResponseHolder<Option<Bytes>>> {
        let key = cache_key(url, headers);
        log::trace!("request to url: {}", url);

        match self.lookup_or_begin(&key)? {
            // Cache hits are successful by construction: negatives were
            // normalized at write time, so a synthesized 200 is faithful.
            Lookup::Hit(CachedValue::Body(body)) => {
                log::trace!("cached");
                Ok(ResponseHolder::new(Some(body), 200))
            }
            Lookup::Hit(CachedValue::Negative) => {
                log::trace!("cached (negative)");
                Ok(ResponseHolder::new(None, 200))
            }
            Lookup::Miss(flight) => {
                log::trace!("executing raw request to {}", url);
                let mut holder = match self.inner.get_and(url, headers) {
                    Ok(holder) => holder,
                    Err(err) => {
                        self.settle_evict(&key, &flight);
                        return Err(err);
                    }
                };
                match holder.get() {
                    Ok(Some(body)) => {
                        self.settle_put(&key, &flight, CachedValue::Body(body))?;
                        Ok(holder)
                    }
                    Ok(None) => {
                        self.settle_put(&key, &flight, CachedValue::Negative)?;
                        Ok(holder)
                    }
                    Err(Error::Status { status, .. }) if status == 400 || status == 404 => {
                        self.settle_put(&key, &flight, CachedValue::Negative)?;
                        Ok(ResponseHolder::new(None, status))
                    }
                    Err(err) => {
                        self.settle_evict(&key, &flight);
                        Err(err)
                    }
                }
            }
        }
    }

    fn post(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        self.inner.post(url, body, headers)
    }

    fn patch(&self, url: &str, body: Bytes, headers: &Headers) -> Result<Bytes> {
        self.inner.patch(url, body, headers)
    }
}
