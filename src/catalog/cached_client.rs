//! Catalog client with a session-scoped detail cache.

use async_trait::async_trait;
use chrono::Duration;
use color_eyre::Result;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheLayer, CacheResult, CacheSource};

use super::client::CatalogClient;
use super::types::{reference_id, CatalogEntity, EntityId, NameIndexEntry};

/// Wraps any catalog client so that the search index and the discovery feed
/// never issue duplicate detail lookups for the same entity within a session.
///
/// Listings pass straight through; they are cheap and the search index keeps
/// its own copy of the name index.
pub struct CachedCatalogClient<C> {
  inner: Arc<C>,
  cache: CacheLayer<CatalogEntity>,
}

impl<C: CatalogClient + 'static> CachedCatalogClient<C> {
  pub fn new(inner: C, stale_time: Duration) -> Self {
    Self {
      inner: Arc::new(inner),
      cache: CacheLayer::new(stale_time),
    }
  }

  #[cfg(test)]
  pub fn inner(&self) -> &C {
    &self.inner
  }
}

/// Both references and bare ids for the same entity share one cache slot.
fn cache_key(reference: &str) -> String {
  match reference_id(reference) {
    Some(id) => id_key(id),
    None => reference.to_string(),
  }
}

fn id_key(id: EntityId) -> String {
  format!("pokemon:{}", id)
}

fn log_source(key: &str, result: &CacheResult<CatalogEntity>) {
  if result.source != CacheSource::Network {
    debug!(key, source = ?result.source, cached_at = ?result.cached_at, "Served from detail cache");
  }
}

#[async_trait]
impl<C: CatalogClient + 'static> CatalogClient for CachedCatalogClient<C> {
  async fn list_page(&self, limit: usize, offset: usize) -> Result<Vec<NameIndexEntry>> {
    self.inner.list_page(limit, offset).await
  }

  async fn get_by_reference(&self, reference: &str) -> Result<CatalogEntity> {
    let key = cache_key(reference);
    let result = self
      .cache
      .fetch_one(&key, || {
        let inner = self.inner.clone();
        let reference = reference.to_string();
        async move { inner.get_by_reference(&reference).await }
      })
      .await?;

    log_source(&key, &result);
    Ok(result.data)
  }

  async fn get_by_id(&self, id: EntityId) -> Result<CatalogEntity> {
    let key = id_key(id);
    let result = self
      .cache
      .fetch_one(&key, || {
        let inner = self.inner.clone();
        async move { inner.get_by_id(id).await }
      })
      .await?;

    log_source(&key, &result);
    Ok(result.data)
  }
}
