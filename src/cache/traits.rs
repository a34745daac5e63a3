//! Core traits and types for the caching system.

use chrono::{DateTime, Duration, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Mutex;

/// Persistent key-value store owned by the runtime environment.
///
/// Each `set` replaces the whole value for a key in one write.
pub trait KvStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;

  /// Remove every key starting with `prefix`, returning how many went.
  fn remove_prefix(&self, prefix: &str) -> Result<usize>;

  fn clear(&self) -> Result<()>;
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
  fn get(&self, key: &str) -> Result<Option<String>> {
    (**self).get(key)
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    (**self).set(key, value)
  }

  fn remove(&self, key: &str) -> Result<()> {
    (**self).remove(key)
  }

  fn remove_prefix(&self, prefix: &str) -> Result<usize> {
    (**self).remove_prefix(prefix)
  }

  fn clear(&self) -> Result<()> {
    (**self).clear()
  }
}

/// Anything that names a cached resource.
pub trait CacheKey {
  /// Stable storage key
  fn cache_key(&self) -> String;

  /// Human-readable description for logs
  fn description(&self) -> String {
    self.cache_key()
  }
}

impl CacheKey for str {
  fn cache_key(&self) -> String {
    self.to_string()
  }
}

impl CacheKey for String {
  fn cache_key(&self) -> String {
    self.clone()
  }
}

impl<K: CacheKey + ?Sized> CacheKey for &K {
  fn cache_key(&self) -> String {
    (**self).cache_key()
  }

  fn description(&self) -> String {
    (**self).description()
  }
}

/// A resource name plus the fetch parameters that shaped the result.
///
/// Without parameters the key is just the resource name. With parameters it
/// becomes `<resource>:<sha256 of the normalized parameters>`, so every
/// variant of a resource shares the `<resource>:` prefix and can be dropped
/// together after a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
  resource: String,
  params: Vec<(String, String)>,
}

impl ResourceKey {
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      params: Vec::new(),
    }
  }

  pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.push((name.into(), value.into()));
    self
  }

  pub fn resource(&self) -> &str {
    &self.resource
  }

  /// Prefix shared by every parameterized key of this resource.
  pub fn prefix(&self) -> String {
    format!("{}:", self.resource)
  }
}

impl CacheKey for ResourceKey {
  fn cache_key(&self) -> String {
    if self.params.is_empty() {
      return self.resource.clone();
    }

    // Parameter order must not change the key
    let mut params: Vec<String> = self
      .params
      .iter()
      .map(|(k, v)| format!("{}={}", k.trim().to_lowercase(), v.trim()))
      .collect();
    params.sort();

    let mut hasher = Sha256::new();
    hasher.update(params.join("&").as_bytes());
    format!("{}{}", self.prefix(), hex::encode(hasher.finalize()))
  }

  fn description(&self) -> String {
    if self.params.is_empty() {
      return self.resource.clone();
    }
    let params: Vec<String> = self
      .params
      .iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();
    format!("{} ({})", self.resource, params.join(", "))
  }
}

/// A stored cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub key: String,
  pub data: T,
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
  pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - self.fetched_at < ttl
  }
}

/// Result from a cache read, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// When the data was fetched from the collaborator
  pub fetched_at: DateTime<Utc>,
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh entry served from the store
  Cache,
  /// Fetch function was invoked
  Fetch,
}

/// Time source for freshness checks.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(now),
    }
  }

  pub fn advance(&self, by: Duration) {
    if let Ok(mut now) = self.now.lock() {
      *now += by;
    }
  }

  pub fn set(&self, at: DateTime<Utc>) {
    if let Ok(mut now) = self.now.lock() {
      *now = at;
    }
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    self
      .now
      .lock()
      .map(|now| *now)
      .unwrap_or_else(|poisoned| *poisoned.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_plain_resource_key() {
    assert_eq!(ResourceKey::new("quotations").cache_key(), "quotations");
    assert_eq!("invoices".cache_key(), "invoices");
  }

  #[test]
  fn test_param_order_does_not_matter() {
    let a = ResourceKey::new("sales")
      .param("status", "open")
      .param("branch", "north");
    let b = ResourceKey::new("sales")
      .param("branch", "north")
      .param("Status", " open ");
    assert_eq!(a.cache_key(), b.cache_key());
    assert!(a.cache_key().starts_with("sales:"));
    assert_eq!(a.cache_key().len(), "sales:".len() + 64);
  }

  #[test]
  fn test_different_params_differ() {
    let a = ResourceKey::new("sales").param("status", "open");
    let b = ResourceKey::new("sales").param("status", "closed");
    assert_ne!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn test_description() {
    let key = ResourceKey::new("sales").param("status", "open");
    assert_eq!(key.description(), "sales (status=open)");
  }

  #[test]
  fn test_entry_freshness_is_strict() {
    let fetched_at = Utc::now();
    let entry = CacheEntry {
      key: "k".to_string(),
      data: (),
      fetched_at,
    };
    let ttl = Duration::seconds(60);
    assert!(entry.is_fresh(fetched_at + Duration::seconds(59), ttl));
    assert!(!entry.is_fresh(fetched_at + Duration::seconds(60), ttl));
  }

  #[test]
  fn test_manual_clock() {
    let start = Utc::now();
    let clock = ManualClock::new(start);
    clock.advance(Duration::seconds(5));
    assert_eq!(clock.now(), start + Duration::seconds(5));
  }
}
