//! In-memory cache storage.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity<T> {
  /// The cached entity
  pub entity: T,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
}

/// Keyed entity storage that lives as long as the session.
pub struct MemoryStorage<T> {
  entries: Mutex<HashMap<String, CachedEntity<T>>>,
}

impl<T: Clone> MemoryStorage<T> {
  pub fn new() -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
    }
  }

  /// Get a single entity by key.
  pub fn get_entity(&self, key: &str) -> Result<Option<CachedEntity<T>>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  /// Store a single entity, replacing any previous entry.
  pub fn store_entity(&self, key: &str, entity: &T) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(
      key.to_string(),
      CachedEntity {
        entity: entity.clone(),
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }
}

impl<T: Clone> Default for MemoryStorage<T> {
  fn default() -> Self {
    Self::new()
  }
}
