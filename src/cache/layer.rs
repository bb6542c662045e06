//! Cache layer that orchestrates caching logic with network fetching.

use chrono::{Duration, Utc};
use color_eyre::{eyre::eyre, Report, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::storage::MemoryStorage;
use super::traits::CacheResult;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, Arc<Report>>>>;

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the application and the network client,
/// providing transparent caching with offline support. Clones share state.
pub struct CacheLayer<T> {
  storage: Arc<MemoryStorage<T>>,
  in_flight: Arc<Mutex<HashMap<String, SharedFetch<T>>>>,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<T: Clone + Send + Sync + 'static> CacheLayer<T> {
  /// Create a new cache layer with an empty session store.
  pub fn new(stale_time: Duration) -> Self {
    Self {
      storage: Arc::new(MemoryStorage::new()),
      in_flight: Arc::new(Mutex::new(HashMap::new())),
      stale_time,
    }
  }

  /// Check if cached data is stale based on cached_at timestamp.
  fn is_stale(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    Utc::now() - cached_at >= self.stale_time
  }

  /// Fetch a single entity with caching.
  ///
  /// 1. Check cache - if fresh, return immediately
  /// 2. If stale/missing, join an in-flight fetch for the same key or start one
  /// 3. On network failure, return the stale entry (offline mode)
  pub async fn fetch_one<F, Fut>(&self, key: &str, fetcher: F) -> Result<CacheResult<T>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let cached = self.storage.get_entity(key)?;
    if let Some(cached) = &cached {
      if !self.is_stale(cached.cached_at) {
        return Ok(CacheResult::from_cache(
          cached.entity.clone(),
          cached.cached_at,
        ));
      }
    }

    match self.join_or_start(key, fetcher).await {
      Ok(data) => Ok(CacheResult::from_network(data)),
      Err(e) => match cached {
        Some(cached) => {
          warn!(key, error = %e, "Serving stale entry after failed refetch");
          Ok(CacheResult::offline(cached.entity, cached.cached_at))
        }
        None => Err(eyre!("{:#}", e)),
      },
    }
  }

  async fn join_or_start<F, Fut>(&self, key: &str, fetcher: F) -> Result<T, Arc<Report>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let shared = {
      let mut in_flight = self
        .in_flight
        .lock()
        .map_err(|e| Arc::new(eyre!("Lock poisoned: {}", e)))?;

      match in_flight.get(key) {
        Some(existing) => {
          debug!(key, "Joining in-flight fetch");
          existing.clone()
        }
        None => {
          let future = fetcher();
          let shared = async move { future.await.map_err(Arc::new) }
            .boxed()
            .shared();
          in_flight.insert(key.to_string(), shared.clone());
          shared
        }
      }
    };

    let result = shared.clone().await;

    // Whoever finishes first retires the entry; a newer fetch for the key is left alone
    if let Ok(mut in_flight) = self.in_flight.lock() {
      if in_flight
        .get(key)
        .is_some_and(|current| current.ptr_eq(&shared))
      {
        in_flight.remove(key);
      }
    }

    if let Ok(data) = &result {
      self
        .storage
        .store_entity(key, data)
        .map_err(Arc::new)?;
    }

    result
  }
}

impl<T> Clone for CacheLayer<T> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      in_flight: Arc::clone(&self.in_flight),
      stale_time: self.stale_time,
    }
  }
}
