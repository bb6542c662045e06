//! Paged discovery feed that tolerates partial remote failure.
//!
//! A bad item costs the page one entry, never the whole page.

use color_eyre::Result;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{CatalogClient, CatalogEntity};

/// One fetched page.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
  /// Successfully hydrated entities, in listing order
  pub entities: Vec<CatalogEntity>,
  /// Number of references the listing returned
  pub listed: usize,
  /// Lookups that failed and were left out
  pub dropped: usize,
}

pub struct ResilientFetcher<C> {
  client: Arc<C>,
}

impl<C: CatalogClient> ResilientFetcher<C> {
  pub fn new(client: Arc<C>) -> Self {
    Self { client }
  }

  /// Fetch one page of references and hydrate all of them in parallel.
  ///
  /// Only a failed listing is an error. Failed lookups are dropped and counted.
  pub async fn fetch_page(&self, page_size: usize, offset: usize) -> Result<FeedPage> {
    let references = self.client.list_page(page_size, offset).await?;
    let listed = references.len();

    let outcomes = join_all(
      references
        .iter()
        .map(|entry| self.client.get_by_reference(&entry.reference)),
    )
    .await;

    let mut entities = Vec::with_capacity(listed);
    for (entry, outcome) in references.iter().zip(outcomes) {
      match outcome {
        Ok(entity) => entities.push(entity),
        Err(e) => debug!(id = ?entry.id(), name = %entry.name, error = %e, "Dropping feed item"),
      }
    }

    let dropped = listed - entities.len();
    if dropped > 0 {
      warn!(dropped, offset, "Some feed items failed to load");
    }

    Ok(FeedPage {
      entities,
      listed,
      dropped,
    })
  }
}

/// Offset of the page after `pages_loaded` pages, or `None` once a page came back empty.
///
/// Assumes a fixed page size across the whole feed.
pub fn next_offset(pages_loaded: usize, page_size: usize, last_listed: usize) -> Option<usize> {
  if last_listed == 0 {
    None
  } else {
    Some(pages_loaded * page_size)
  }
}

/// Cursor over the discovery feed.
pub struct DiscoveryFeed<C> {
  fetcher: ResilientFetcher<C>,
  page_size: usize,
  pages_loaded: usize,
  next: Option<usize>,
  items: Vec<CatalogEntity>,
}

impl<C: CatalogClient> DiscoveryFeed<C> {
  pub fn new(client: Arc<C>, page_size: usize) -> Self {
    Self {
      fetcher: ResilientFetcher::new(client),
      page_size,
      pages_loaded: 0,
      next: Some(0),
      items: Vec::new(),
    }
  }

  /// Load the next page. Returns `None` once the feed is exhausted.
  pub async fn load_next(&mut self) -> Result<Option<FeedPage>> {
    let Some(offset) = self.next else {
      return Ok(None);
    };

    let page = self.fetcher.fetch_page(self.page_size, offset).await?;
    if page.listed > 0 {
      self.pages_loaded += 1;
    }
    self.next = next_offset(self.pages_loaded, self.page_size, page.listed);
    self.items.extend(page.entities.iter().cloned());

    Ok(Some(page))
  }

  pub fn has_more(&self) -> bool {
    self.next.is_some()
  }

  /// Everything loaded so far.
  pub fn items(&self) -> &[CatalogEntity] {
    &self.items
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::fake::{entity, FakeCatalog};
  use std::io;
  use std::sync::Mutex;

  /// Formatted log output collected in memory.
  #[derive(Clone, Default)]
  struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

  impl CapturedLogs {
    fn contents(&self) -> String {
      String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
  }

  impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.0.lock().unwrap().extend_from_slice(buf);
      Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
      Ok(())
    }
  }

  fn catalog(count: u32) -> FakeCatalog {
    FakeCatalog::new((1..=count).map(|id| entity(id, &format!("mon-{}", id))).collect())
  }

  #[tokio::test]
  async fn test_failed_lookups_are_dropped() {
    let fetcher = ResilientFetcher::new(Arc::new(catalog(5).failing(&[2, 4])));

    let page = fetcher.fetch_page(5, 0).await.unwrap();

    assert_eq!(page.listed, 5);
    assert_eq!(page.dropped, 2);
    let ids: Vec<_> = page.entities.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 3, 5]);
  }

  #[tokio::test]
  async fn test_dropped_items_are_reported_as_a_warning() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
      .with_writer(move || writer.clone())
      .with_ansi(false)
      .with_max_level(tracing::Level::WARN)
      .finish();
    let _guard = tracing::subscriber::set_default(subscriber);
    let fetcher = ResilientFetcher::new(Arc::new(catalog(5).failing(&[2, 4])));

    fetcher.fetch_page(5, 0).await.unwrap();

    let output = logs.contents();
    assert!(output.contains("WARN"));
    assert!(output.contains("dropped=2"));
  }

  #[tokio::test]
  async fn test_every_lookup_failing_still_returns_a_page() {
    let fetcher = ResilientFetcher::new(Arc::new(catalog(3).failing(&[1, 2, 3])));

    let page = fetcher.fetch_page(3, 0).await.unwrap();

    assert!(page.entities.is_empty());
    assert_eq!(page.dropped, 3);
  }

  #[tokio::test]
  async fn test_listing_failure_is_a_page_error() {
    let fetcher = ResilientFetcher::new(Arc::new(catalog(3).failing_listing()));

    assert!(fetcher.fetch_page(3, 0).await.is_err());
  }

  #[test]
  fn test_next_offset_rules() {
    assert_eq!(next_offset(1, 20, 20), Some(20));
    assert_eq!(next_offset(3, 20, 7), Some(60));
    assert_eq!(next_offset(3, 20, 0), None);
  }

  #[tokio::test]
  async fn test_feed_walks_pages_until_empty() {
    let mut feed = DiscoveryFeed::new(Arc::new(catalog(5)), 2);

    let mut sizes = Vec::new();
    while let Some(page) = feed.load_next().await.unwrap() {
      sizes.push(page.listed);
    }

    assert_eq!(sizes, vec![2, 2, 1, 0]);
    assert!(!feed.has_more());
    assert_eq!(feed.items().len(), 5);
    assert!(feed.load_next().await.unwrap().is_none());
  }
}
