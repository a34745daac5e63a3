//! Async fetch handle with last-response-wins delivery.
//!
//! A `Query<T>` owns a fetcher closure and spawns one task per request. Every
//! request is tagged with a monotonically increasing sequence number; when
//! results are polled, anything older than the most recently issued request
//! is dropped. Overlapping reloads therefore cannot let a slow earlier
//! response overwrite a newer one. In-flight requests are never aborted.
//!
//! # Example
//!
//! ```ignore
//! let mut query = Query::new(move || {
//!     let source = source.clone();
//!     async move { source.fetch().await.map_err(|e| e.to_string()) }
//! });
//!
//! query.refetch();
//!
//! // In event loop tick
//! if let Some(result) = query.poll() {
//!     // apply rows or show the error
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::debug;

/// Status of the most recently issued request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
  /// Nothing has been requested yet
  Idle,
  /// The latest request has not resolved
  Loading,
  /// The latest request succeeded
  Ready,
  /// The latest request failed with an error
  Failed(String),
}

impl QueryStatus {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryStatus::Loading)
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryStatus::Failed(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// A response tagged with the sequence number of its request
struct Response<T> {
  seq: u64,
  result: Result<T, String>,
}

pub struct Query<T> {
  status: QueryStatus,
  fetcher: FetcherFn<T>,
  tx: mpsc::UnboundedSender<Response<T>>,
  rx: mpsc::UnboundedReceiver<Response<T>>,
  /// Sequence number of the most recently issued request (0 = none)
  issued: u64,
}

impl<T> Query<T> {
  pub fn status(&self) -> &QueryStatus {
    &self.status
  }

  pub fn is_loading(&self) -> bool {
    self.status.is_loading()
  }

  pub fn error(&self) -> Option<&str> {
    self.status.error()
  }

  /// Sequence number of the latest request.
  pub fn issued(&self) -> u64 {
    self.issued
  }

  fn accept(&mut self, result: &Result<T, String>) {
    self.status = match result {
      Ok(_) => QueryStatus::Ready,
      Err(e) => QueryStatus::Failed(e.clone()),
    };
  }
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called once per `refetch()`.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      status: QueryStatus::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      tx,
      rx,
      issued: 0,
    }
  }

  /// Issue a new request even if one is outstanding; the older one's
  /// response will be discarded.
  pub fn refetch(&mut self) -> u64 {
    self.issued += 1;
    let seq = self.issued;
    self.status = QueryStatus::Loading;
    debug!(seq, "Issuing fetch");

    let future = (self.fetcher)();
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let result = future.await;
      // Receiver may have been dropped along with the query
      let _ = tx.send(Response { seq, result });
    });
    seq
  }

  /// Drain arrived responses and return the one for the latest request, if
  /// it has arrived. Older responses are discarded.
  pub fn poll(&mut self) -> Option<Result<T, String>> {
    let mut accepted = None;

    while let Ok(response) = self.rx.try_recv() {
      if response.seq < self.issued {
        debug!(
          seq = response.seq,
          latest = self.issued,
          "Discarding stale response"
        );
        continue;
      }
      accepted = Some(response.result);
    }

    let result = accepted?;
    self.accept(&result);
    Some(result)
  }

  /// Wait for the latest request to resolve, discarding older responses.
  ///
  /// Returns `None` when nothing is outstanding.
  pub async fn settle(&mut self) -> Option<Result<T, String>> {
    if !self.status.is_loading() {
      return None;
    }
    while let Some(response) = self.rx.recv().await {
      if response.seq < self.issued {
        debug!(seq = response.seq, "Discarding stale response");
        continue;
      }
      self.accept(&response.result);
      return Some(response.result);
    }
    None
  }
}

impl<T> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("status", &self.status)
      .field("issued", &self.issued)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });
    assert_eq!(query.status(), &QueryStatus::Idle);

    query.refetch();
    assert!(query.is_loading());

    assert_eq!(query.settle().await, Some(Ok(vec![1, 2, 3])));
    assert_eq!(query.status(), &QueryStatus::Ready);
    assert_eq!(query.poll(), None);
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.refetch();
    assert!(query.settle().await.is_some());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_refetch_numbers_requests() {
    let mut query = Query::new(|| async { Ok::<_, String>(42) });
    assert_eq!(query.refetch(), 1);
    assert_eq!(query.refetch(), 2);
    assert_eq!(query.issued(), 2);
  }

  #[tokio::test]
  async fn test_settle_without_request() {
    let mut query = Query::new(|| async { Ok::<_, String>(42) });
    assert_eq!(query.settle().await, None);
  }

  /// First call is slow, second is fast. Run with a paused clock so the
  /// order of completion is fixed.
  fn racing_query() -> Query<&'static str> {
    let calls = Arc::new(AtomicU32::new(0));
    Query::new(move || {
      let n = calls.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          tokio::time::sleep(Duration::from_millis(80)).await;
          Ok::<_, String>("A")
        } else {
          tokio::time::sleep(Duration::from_millis(5)).await;
          Ok("B")
        }
      }
    })
  }

  #[tokio::test(start_paused = true)]
  async fn test_late_older_response_is_discarded() {
    let mut query = racing_query();

    query.refetch();
    query.refetch();

    // B resolves first
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(query.poll(), Some(Ok("B")));

    // A arrives later and must not replace B
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(query.poll(), None);
    assert_eq!(query.status(), &QueryStatus::Ready);
  }

  #[tokio::test(start_paused = true)]
  async fn test_both_arrived_before_poll() {
    let mut query = racing_query();

    query.refetch();
    query.refetch();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(query.poll(), Some(Ok("B")));
  }

  #[tokio::test(start_paused = true)]
  async fn test_settle_waits_for_latest() {
    let mut query = racing_query();

    query.refetch();
    query.refetch();

    assert_eq!(query.settle().await, Some(Ok("B")));
    assert_eq!(query.settle().await, None);
  }
}
