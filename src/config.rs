use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_TTL_SECS;
use crate::column::{Column, SemanticType};
use crate::paginate::DEFAULT_PAGE_SIZE;
use crate::value::Value;

/// A record as delivered by a configured source.
pub type Record = serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Custom title for the header (defaults to the table name)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub view: ViewConfig,
  #[serde(default)]
  pub export: ExportConfig,
  pub tables: Vec<TableConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: i64,
  /// Database location (defaults to the data directory)
  pub path: Option<PathBuf>,
}

impl CacheConfig {
  /// Time-to-live for cached entries.
  pub fn ttl(&self) -> Result<chrono::Duration> {
    if self.ttl_secs < 0 {
      return Err(eyre!("cache.ttl_secs must not be negative"));
    }
    chrono::Duration::try_seconds(self.ttl_secs)
      .ok_or_else(|| eyre!("cache.ttl_secs is out of range: {}", self.ttl_secs))
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      ttl_secs: DEFAULT_TTL_SECS,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
  #[serde(default = "default_page_size")]
  pub page_size: usize,
}

impl Default for ViewConfig {
  fn default() -> Self {
    Self {
      page_size: DEFAULT_PAGE_SIZE,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
  /// Where CSV files land (defaults to the current directory)
  pub dir: Option<PathBuf>,
}

impl ExportConfig {
  pub fn dir(&self) -> PathBuf {
    self.dir.clone().unwrap_or_else(|| PathBuf::from("."))
  }
}

/// Where a table's records come from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceConfig {
  /// JSON file on disk
  File(PathBuf),
  /// JSON endpoint fetched with GET
  Url(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
  pub name: String,
  /// Column whose value keys each row
  pub key: Option<String>,
  /// Written as `{ file: ... }` or `{ url: ... }`
  #[serde(with = "serde_yaml::with::singleton_map")]
  pub source: SourceConfig,
  pub columns: Vec<ColumnConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnConfig {
  pub id: String,
  pub label: Option<String>,
  /// JSON pointer into the record (defaults to `/<id>`)
  pub path: Option<String>,
  #[serde(default, rename = "type")]
  pub semantic_type: SemanticType,
  #[serde(default = "default_true")]
  pub filterable: bool,
  #[serde(default = "default_true")]
  pub sortable: bool,
  #[serde(default = "default_true")]
  pub visible: bool,
  #[serde(default)]
  pub range: bool,
}

fn default_true() -> bool {
  true
}

fn default_ttl_secs() -> i64 {
  DEFAULT_TTL_SECS
}

fn default_page_size() -> usize {
  DEFAULT_PAGE_SIZE
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./tabview.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/tabview/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/tabview/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("tabview.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("tabview").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Invalid config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Failed to parse config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.tables.is_empty() {
      return Err(eyre!("At least one table must be configured"));
    }
    self.cache.ttl()?;

    for table in &self.tables {
      let mut seen = BTreeSet::new();
      for column in &table.columns {
        if !seen.insert(column.id.as_str()) {
          return Err(eyre!(
            "Duplicate column '{}' in table '{}'",
            column.id,
            table.name
          ));
        }
        if let Some(path) = &column.path {
          if !path.is_empty() && !path.starts_with('/') {
            return Err(eyre!(
              "Column '{}' path must be a JSON pointer starting with '/'",
              column.id
            ));
          }
        }
      }

      if let SourceConfig::Url(raw) = &table.source {
        url::Url::parse(raw).map_err(|e| eyre!("Invalid url for table '{}': {}", table.name, e))?;
      }
    }
    Ok(())
  }

  /// The named table, or the first one when no name is given.
  pub fn table(&self, name: Option<&str>) -> Result<&TableConfig> {
    match name {
      Some(name) => self
        .tables
        .iter()
        .find(|t| t.name == name)
        .ok_or_else(|| eyre!("Unknown table: {}", name)),
      None => self
        .tables
        .first()
        .ok_or_else(|| eyre!("No tables configured")),
    }
  }
}

impl ColumnConfig {
  pub fn pointer(&self) -> String {
    self
      .path
      .clone()
      .unwrap_or_else(|| format!("/{}", self.id))
  }

  /// Build a column whose accessor reads `pointer()` from each record.
  pub fn to_column(&self) -> Column<Record> {
    let pointer = self.pointer();
    let ty = self.semantic_type;
    let label = self.label.clone().unwrap_or_else(|| self.id.clone());

    let column = Column::new(self.id.clone(), label, move |record: &Record| {
      record
        .pointer(&pointer)
        .map(|node| Value::from_json(node, ty))
        .unwrap_or(Value::Null)
    })
    .with_type(ty)
    .filterable(self.filterable)
    .sortable(self.sortable)
    .visible(self.visible);

    if self.range {
      column.range_filter()
    } else {
      column
    }
  }
}

impl TableConfig {
  pub fn columns(&self) -> Vec<Column<Record>> {
    self.columns.iter().map(ColumnConfig::to_column).collect()
  }

  /// Where the records come from, for display.
  pub fn origin(&self) -> String {
    match &self.source {
      SourceConfig::File(path) => path.display().to_string(),
      SourceConfig::Url(url) => url.clone(),
    }
  }

  /// Pointer used to key rows, when a key column is configured.
  pub fn key_pointer(&self) -> Option<String> {
    let key = self.key.as_ref()?;
    Some(
      self
        .columns
        .iter()
        .find(|c| &c.id == key)
        .map(ColumnConfig::pointer)
        .unwrap_or_else(|| format!("/{}", key)),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  const SAMPLE: &str = r##"
cache:
  ttl_secs: 120
view:
  page_size: 10
tables:
  - name: quotations
    key: number
    source: { file: quotations.json }
    columns:
      - { id: number, label: "#", path: /id, type: number }
      - { id: customer, label: Customer, path: /customer/name }
      - { id: total, label: Total, type: number, range: true }
      - { id: paid, label: Paid, type: boolean, sortable: false }
  - name: sales
    source: { url: "https://erp.example.com/api/sales" }
    columns:
      - { id: id }
"##;

  #[test]
  fn test_parse_sample() {
    let config = Config::parse(SAMPLE).unwrap();
    assert!(config.cache.enabled);
    assert_eq!(config.cache.ttl_secs, 120);
    assert_eq!(config.view.page_size, 10);
    assert_eq!(config.export.dir(), PathBuf::from("."));
    assert_eq!(config.tables.len(), 2);
    assert_eq!(
      config.tables[0].source,
      SourceConfig::File(PathBuf::from("quotations.json"))
    );
    assert_eq!(
      config.tables[1].source,
      SourceConfig::Url("https://erp.example.com/api/sales".to_string())
    );
  }

  #[test]
  fn test_defaults() {
    let config = Config::parse("tables:\n  - { name: t, source: { file: t.json }, columns: [] }\n")
      .unwrap();
    assert!(config.cache.enabled);
    assert_eq!(config.cache.ttl_secs, DEFAULT_TTL_SECS);
    assert_eq!(config.view.page_size, DEFAULT_PAGE_SIZE);
  }

  #[test]
  fn test_column_defaults() {
    let config = Config::parse(SAMPLE).unwrap();
    let id = &config.tables[1].columns[0];
    assert_eq!(id.pointer(), "/id");
    assert_eq!(id.semantic_type, SemanticType::String);
    assert!(id.filterable && id.sortable && id.visible && !id.range);
  }

  #[test]
  fn test_columns_read_json_pointers() {
    let config = Config::parse(SAMPLE).unwrap();
    let columns = config.tables[0].columns();
    let record = json!({
      "id": "17",
      "customer": { "name": "Acme" },
      "total": 1250.5,
      "paid": false
    });

    assert_eq!(columns[0].value(&record), Value::Number(17.0));
    assert_eq!(columns[0].label, "#");
    assert_eq!(columns[1].value(&record), Value::from("Acme"));
    assert_eq!(columns[2].value(&record), Value::Number(1250.5));
    assert!(columns[2].is_range());
    assert_eq!(columns[3].value(&record), Value::Bool(false));
    assert!(!columns[3].sortable);
  }

  #[test]
  fn test_missing_field_is_null() {
    let config = Config::parse(SAMPLE).unwrap();
    let columns = config.tables[0].columns();
    assert_eq!(columns[1].value(&json!({"id": 1})), Value::Null);
  }

  #[test]
  fn test_key_pointer() {
    let config = Config::parse(SAMPLE).unwrap();
    assert_eq!(config.tables[0].key_pointer().as_deref(), Some("/id"));
    assert_eq!(config.tables[1].key_pointer(), None);
  }

  #[test]
  fn test_origin() {
    let config = Config::parse(SAMPLE).unwrap();
    assert_eq!(config.tables[0].origin(), "quotations.json");
    assert_eq!(config.tables[1].origin(), "https://erp.example.com/api/sales");
  }

  #[test]
  fn test_table_lookup() {
    let config = Config::parse(SAMPLE).unwrap();
    assert_eq!(config.table(None).unwrap().name, "quotations");
    assert_eq!(config.table(Some("sales")).unwrap().name, "sales");
    assert!(config.table(Some("stock")).is_err());
  }

  #[test]
  fn test_rejects_invalid_configs() {
    assert!(Config::parse("tables: []\n").is_err());
    assert!(Config::parse(
      "tables:\n  - { name: t, source: { url: 'not a url' }, columns: [] }\n"
    )
    .is_err());
    assert!(Config::parse(
      "tables:\n  - { name: t, source: { file: t.json }, columns: [{ id: a }, { id: a }] }\n"
    )
    .is_err());
    assert!(Config::parse(
      "tables:\n  - { name: t, source: { file: t.json }, columns: [{ id: a, path: a }] }\n"
    )
    .is_err());
  }

  #[test]
  fn test_sources_are_written_as_maps() {
    let config = Config::parse(
      "tables:\n  - { name: t, source: { file: t.json }, columns: [] }\n  - name: u\n    source:\n      url: https://example.com/rows\n    columns: []\n",
    )
    .unwrap();
    assert_eq!(
      config.tables[0].source,
      SourceConfig::File(PathBuf::from("t.json"))
    );
    assert_eq!(
      config.tables[1].source,
      SourceConfig::Url("https://example.com/rows".to_string())
    );
  }

  #[test]
  fn test_ttl_bounds() {
    let config = Config::parse("tables:\n  - { name: t, source: { file: t.json }, columns: [] }\n")
      .unwrap();
    assert_eq!(config.cache.ttl().unwrap(), chrono::Duration::seconds(300));

    let huge = CacheConfig {
      ttl_secs: i64::MAX / 10,
      ..CacheConfig::default()
    };
    assert!(huge.ttl().is_err());
    assert!(Config::parse(&format!(
      "cache: {{ ttl_secs: {} }}\ntables:\n  - {{ name: t, source: {{ file: t.json }}, columns: [] }}\n",
      i64::MAX / 10
    ))
    .is_err());
    assert!(Config::parse(
      "cache: { ttl_secs: -1 }\ntables:\n  - { name: t, source: { file: t.json }, columns: [] }\n"
    )
    .is_err());
  }

  #[test]
  fn test_load_missing_explicit_path() {
    let result = Config::load(Some(Path::new("/nonexistent/tabview.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, SAMPLE).unwrap();
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.tables[0].name, "quotations");
  }
}
