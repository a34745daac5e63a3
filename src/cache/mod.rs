//! Short-lived, resource-keyed cache for list fetches.
//!
//! The cache is an explicit instance over an injected key-value store:
//! - entries are `{key, data, fetched_at}` serialized as JSON, one whole
//!   value per key
//! - an entry is fresh while `now - fetched_at < ttl`; stale entries are
//!   superseded on the next fetch, never purged in the background
//! - `force` reads bypass freshness, and `invalidate` drops an entry after a
//!   mutation
//! - unreadable or corrupt entries are treated as misses

mod layer;
mod storage;
mod traits;

pub use layer::{ReadOptions, TtlCache, DEFAULT_TTL_SECS};
pub use storage::{MemoryStore, NoopStore, SqliteStore};
pub use traits::{
  CacheEntry, CacheKey, CacheResult, CacheSource, Clock, KvStore, ManualClock, ResourceKey,
  SystemClock,
};
