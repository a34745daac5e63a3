//! TTL cache that fronts list fetches.

use chrono::Duration;
use color_eyre::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::{CacheEntry, CacheKey, CacheResult, CacheSource, Clock, KvStore, SystemClock};

pub const DEFAULT_TTL_SECS: i64 = 300;

/// Options for [`TtlCache::read`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
  /// Skip the freshness check and always invoke the fetch function
  pub force: bool,
}

impl ReadOptions {
  pub fn forced() -> Self {
    Self { force: true }
  }
}

/// Resource-keyed cache of `{data, fetched_at}` entries with a fixed TTL.
///
/// The cache never retries and never stores failures: a failing fetch
/// leaves the existing entry as it was and the error goes to the caller.
pub struct TtlCache<S: KvStore> {
  store: Arc<S>,
  /// How long an entry stays fresh
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl<S: KvStore> TtlCache<S> {
  /// Create a new cache over the given store.
  pub fn new(store: S) -> Self {
    Self {
      store: Arc::new(store),
      ttl: Duration::seconds(DEFAULT_TTL_SECS),
      clock: Arc::new(SystemClock),
    }
  }

  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Load an entry regardless of age. Missing, unreadable and corrupt
  /// entries all come back as `None`.
  fn load<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
    let raw = match self.store.get(key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key, error = %e, "Cache store read failed, treating as miss");
        return None;
      }
    };

    match serde_json::from_str::<CacheEntry<T>>(&raw) {
      Ok(entry) if entry.key == key => Some(entry),
      Ok(entry) => {
        warn!(key, stored = %entry.key, "Cache entry key mismatch, treating as miss");
        None
      }
      Err(e) => {
        warn!(key, error = %e, "Malformed cache entry, treating as miss");
        None
      }
    }
  }

  fn fresh<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
    let entry = self.load::<T>(key)?;
    if entry.is_fresh(self.clock.now(), self.ttl) {
      Some(entry)
    } else {
      debug!(key, fetched_at = %entry.fetched_at, "Cache entry is stale");
      None
    }
  }

  /// The cached value, only if present and fresh. Stale data is never
  /// returned.
  pub fn get<T, K>(&self, key: &K) -> Option<T>
  where
    T: DeserializeOwned,
    K: CacheKey + ?Sized,
  {
    self.fresh(&key.cache_key()).map(|entry| entry.data)
  }

  /// Return the fresh cached value or fetch, store and return new data.
  pub async fn read<T, K, F, Fut>(&self, key: &K, fetch: F, options: ReadOptions) -> Result<T>
  where
    T: Serialize + DeserializeOwned,
    K: CacheKey + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    self
      .read_with_source(key, fetch, options)
      .await
      .map(|result| result.data)
  }

  /// Like [`TtlCache::read`], also reporting where the data came from.
  pub async fn read_with_source<T, K, F, Fut>(
    &self,
    key: &K,
    fetch: F,
    options: ReadOptions,
  ) -> Result<CacheResult<T>>
  where
    T: Serialize + DeserializeOwned,
    K: CacheKey + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
  {
    let storage_key = key.cache_key();

    if !options.force {
      if let Some(entry) = self.fresh::<T>(&storage_key) {
        debug!(key = %key.description(), "Cache hit");
        return Ok(CacheResult {
          data: entry.data,
          source: CacheSource::Cache,
          fetched_at: entry.fetched_at,
        });
      }
    }

    debug!(key = %key.description(), force = options.force, "Cache miss, fetching");
    let data = fetch().await?;
    let fetched_at = self.clock.now();

    let entry = CacheEntry {
      key: storage_key,
      data,
      fetched_at,
    };
    self.persist(&entry);

    Ok(CacheResult {
      data: entry.data,
      source: CacheSource::Fetch,
      fetched_at,
    })
  }

  /// Best-effort write; a failed write only costs a future refetch.
  fn persist<T: Serialize>(&self, entry: &CacheEntry<T>) {
    let raw = match serde_json::to_string(entry) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(key = %entry.key, error = %e, "Failed to serialize cache entry");
        return;
      }
    };
    if let Err(e) = self.store.set(&entry.key, &raw) {
      warn!(key = %entry.key, error = %e, "Failed to persist cache entry");
    }
  }

  /// Drop an entry so the next read fetches.
  pub fn invalidate<K: CacheKey + ?Sized>(&self, key: &K) {
    let storage_key = key.cache_key();
    debug!(key = %key.description(), "Invalidating cache entry");
    if let Err(e) = self.store.remove(&storage_key) {
      warn!(key = %storage_key, error = %e, "Failed to invalidate cache entry");
    }
  }

  /// Drop `resource` and every parameterized variant of it.
  pub fn invalidate_resource(&self, resource: &str) {
    self.invalidate(resource);
    match self.store.remove_prefix(&format!("{}:", resource)) {
      Ok(removed) => debug!(resource, removed, "Invalidated resource variants"),
      Err(e) => warn!(resource, error = %e, "Failed to invalidate resource variants"),
    }
  }

  /// Drop everything.
  pub fn reset(&self) -> Result<()> {
    self.store.clear()
  }
}

impl<S: KvStore> Clone for TtlCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      ttl: self.ttl,
      clock: Arc::clone(&self.clock),
    }
  }
}
