//! Fetch collaborator boundary: list payloads as a bare array or a
//! `{data, count}` envelope.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Wire shape of a list fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
  Rows(Vec<T>),
  Counted {
    data: Vec<T>,
    #[serde(default)]
    count: Option<usize>,
  },
}

/// Normalized result of a list fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
  pub rows: Vec<T>,
  /// Total reported by the backend, when the envelope carries one
  pub count: Option<usize>,
}

impl<T> Fetched<T> {
  pub fn new(rows: Vec<T>) -> Self {
    Self { rows, count: None }
  }
}

impl<T: DeserializeOwned> Fetched<T> {
  /// Parse a JSON payload in either shape.
  pub fn from_json(bytes: &[u8]) -> Result<Self> {
    let envelope: Envelope<T> =
      serde_json::from_slice(bytes).map_err(|e| eyre!("Failed to parse list payload: {}", e))?;
    Ok(envelope.into())
  }
}

impl<T> From<Vec<T>> for Fetched<T> {
  fn from(rows: Vec<T>) -> Self {
    Self::new(rows)
  }
}

impl<T> From<Envelope<T>> for Fetched<T> {
  fn from(envelope: Envelope<T>) -> Self {
    match envelope {
      Envelope::Rows(rows) => Self { rows, count: None },
      Envelope::Counted { data, count } => Self { rows: data, count },
    }
  }
}

impl<T> From<Fetched<T>> for Envelope<T> {
  fn from(fetched: Fetched<T>) -> Self {
    Envelope::Counted {
      data: fetched.rows,
      count: fetched.count,
    }
  }
}
