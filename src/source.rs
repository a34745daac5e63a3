//! Record sources for configured tables, fronted by the TTL cache.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use tabview::cache::{
  CacheSource, KvStore, NoopStore, ReadOptions, ResourceKey, SqliteStore, TtlCache,
};
use tabview::config::{CacheConfig, Record, SourceConfig, TableConfig};
use tabview::fetch::{Envelope, Fetched};

pub type Cache = TtlCache<Box<dyn KvStore>>;

/// Open the cache described by the config (a no-op store when disabled).
pub fn open_cache(config: &CacheConfig) -> Result<Cache> {
  let ttl = config.ttl()?;
  let store: Box<dyn KvStore> = if !config.enabled {
    info!("Cache disabled");
    Box::new(NoopStore)
  } else {
    match &config.path {
      Some(path) => Box::new(SqliteStore::open_at(path)?),
      None => Box::new(SqliteStore::open()?),
    }
  };
  Ok(TtlCache::new(store).with_ttl(ttl))
}

/// Loads one table's records from a file or an HTTP endpoint.
#[derive(Clone)]
pub struct TableSource {
  name: String,
  location: Location,
  cache: Cache,
}

#[derive(Clone)]
enum Location {
  File(PathBuf),
  Url { url: url::Url, http: reqwest::Client },
}

impl TableSource {
  pub fn new(table: &TableConfig, cache: Cache) -> Result<Self> {
    let location = match &table.source {
      SourceConfig::File(path) => Location::File(path.clone()),
      SourceConfig::Url(raw) => {
        let url = url::Url::parse(raw).map_err(|e| eyre!("Invalid url {}: {}", raw, e))?;
        let http = reqwest::Client::builder()
          .timeout(Duration::from_secs(30))
          .build()
          .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
        Location::Url { url, http }
      }
    };

    Ok(Self {
      name: table.name.clone(),
      location,
      cache,
    })
  }

  fn key(&self) -> ResourceKey {
    let origin = match &self.location {
      Location::File(path) => path.display().to_string(),
      Location::Url { url, .. } => url.to_string(),
    };
    ResourceKey::new(&self.name).param("source", origin)
  }

  /// Fresh cached records, or a fetch. `force` always fetches; the cached
  /// entry is replaced only when that fetch succeeds.
  pub async fn load(&self, force: bool) -> Result<Fetched<Record>> {
    let key = self.key();
    let options = ReadOptions { force };
    let result = self
      .cache
      .read_with_source(&key, || self.fetch(), options)
      .await?;

    if result.source == CacheSource::Cache {
      debug!(table = %self.name, fetched_at = %result.fetched_at, "Served from cache");
    }
    Ok(result.data.into())
  }

  async fn fetch(&self) -> Result<Envelope<Record>> {
    let bytes = match &self.location {
      Location::File(path) => tokio::fs::read(path)
        .await
        .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?,
      Location::Url { url, http } => {
        let response = http
          .get(url.clone())
          .header(reqwest::header::ACCEPT, "application/json")
          .send()
          .await
          .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?
          .error_for_status()
          .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?;
        response
          .bytes()
          .await
          .map_err(|e| eyre!("Failed to read response from {}: {}", url, e))?
          .to_vec()
      }
    };

    let fetched: Fetched<Record> = Fetched::from_json(&bytes)?;
    info!(table = %self.name, rows = fetched.rows.len(), "Fetched records");
    Ok(fetched.into())
  }
}
