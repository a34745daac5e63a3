//! CSV export of the filtered, sorted (pre-pagination) rows.

use chrono::{DateTime, SecondsFormat, TimeZone};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::column::Column;
use crate::value::Value;

/// A serialized export ready for a download sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
  pub file_name: String,
  pub bytes: Vec<u8>,
  /// Number of data lines (excluding the header)
  pub row_count: usize,
}

/// Serialize rows over the given columns, in the given order.
///
/// The header holds the quoted labels. Numbers are written bare, dates as a
/// quoted `YYYY-MM-DD`, nulls as an empty field and everything else quoted
/// with embedded quotes doubled. Lines are joined by `\n`.
pub fn to_csv<'a, T: 'a>(rows: impl IntoIterator<Item = &'a T>, columns: &[&Column<T>]) -> Vec<u8> {
  let mut lines = Vec::new();
  lines.push(
    columns
      .iter()
      .map(|c| quote(&c.label))
      .collect::<Vec<_>>()
      .join(","),
  );

  for row in rows {
    let line = columns
      .iter()
      .map(|c| field(&c.export(row)))
      .collect::<Vec<_>>()
      .join(",");
    lines.push(line);
  }

  lines.join("\n").into_bytes()
}

/// Build an [`Export`] with a timestamped file name.
pub fn export<'a, T: 'a, Tz: TimeZone>(
  prefix: &str,
  rows: impl IntoIterator<Item = &'a T>,
  columns: &[&Column<T>],
  at: DateTime<Tz>,
) -> Export
where
  Tz::Offset: std::fmt::Display,
{
  let rows: Vec<&T> = rows.into_iter().collect();
  Export {
    file_name: file_name(prefix, at),
    row_count: rows.len(),
    bytes: to_csv(rows, columns),
  }
}

/// `<prefix>_<YYYYmmdd_HHMMSS>.csv`
pub fn file_name<Tz: TimeZone>(prefix: &str, at: DateTime<Tz>) -> String
where
  Tz::Offset: std::fmt::Display,
{
  let prefix = if prefix.is_empty() { "export" } else { prefix };
  format!("{}_{}.csv", prefix, at.format("%Y%m%d_%H%M%S"))
}

fn field(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::Number(n) => n.to_string(),
    Value::Date(d) => {
      let iso = d.to_rfc3339_opts(SecondsFormat::Millis, true);
      quote(&iso[..10])
    }
    Value::Bool(_) | Value::Text(_) => quote(&value.to_string()),
  }
}

fn quote(s: &str) -> String {
  format!("\"{}\"", s.replace('"', "\"\""))
}

/// Receives export bytes and saves them under a suggested file name.
pub trait DownloadSink {
  fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Sink that writes exports into a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
  dir: PathBuf,
}

impl FileSink {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }
}

impl DownloadSink for FileSink {
  fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    std::fs::create_dir_all(&self.dir).map_err(|e| {
      eyre!(
        "Failed to create export directory {}: {}",
        self.dir.display(),
        e
      )
    })?;

    let path = self.dir.join(file_name);
    std::fs::write(&path, bytes)
      .map_err(|e| eyre!("Failed to write export {}: {}", path.display(), e))?;

    info!(path = %path.display(), bytes = bytes.len(), "Export written");
    Ok(path)
  }
}
