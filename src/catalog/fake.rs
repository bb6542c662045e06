//! In-process catalog used by unit tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use super::client::{CatalogClient, FetchedImage, ImageSource};
use super::types::{reference_id, CatalogEntity, EntityId, NameIndexEntry, StatBlock};

pub fn entity(id: EntityId, name: &str) -> CatalogEntity {
  CatalogEntity {
    id,
    name: name.to_string(),
    types: vec!["normal".to_string()],
    height: 10,
    weight: 100,
    stats: StatBlock::default(),
    image: format!("fake://img/{}.png", id),
  }
}

#[derive(Default)]
pub struct FakeCatalog {
  entities: Vec<CatalogEntity>,
  failing: HashSet<EntityId>,
  gates: HashMap<EntityId, Arc<Notify>>,
  failing_listing: bool,
  list_calls: AtomicUsize,
  detail_calls: AtomicUsize,
}

impl FakeCatalog {
  pub fn new(mut entities: Vec<CatalogEntity>) -> Self {
    entities.sort_by_key(|e| e.id);
    Self {
      entities,
      ..Self::default()
    }
  }

  /// Detail lookups for these ids fail.
  pub fn failing(mut self, ids: &[EntityId]) -> Self {
    self.failing.extend(ids);
    self
  }

  /// Every listing call fails.
  pub fn failing_listing(mut self) -> Self {
    self.failing_listing = true;
    self
  }

  /// Detail lookups for `id` wait until the returned handle is notified.
  pub fn gated(mut self, id: EntityId) -> (Self, Arc<Notify>) {
    let gate = Arc::new(Notify::new());
    self.gates.insert(id, gate.clone());
    (self, gate)
  }

  pub fn reference(id: EntityId) -> String {
    format!("fake://pokemon/{}/", id)
  }

  pub fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub fn detail_calls(&self) -> usize {
    self.detail_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
  async fn list_page(&self, limit: usize, offset: usize) -> Result<Vec<NameIndexEntry>> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    if self.failing_listing {
      return Err(eyre!("listing unavailable"));
    }

    Ok(
      self
        .entities
        .iter()
        .skip(offset)
        .take(limit)
        .map(|e| NameIndexEntry {
          name: e.name.clone(),
          reference: Self::reference(e.id),
        })
        .collect(),
    )
  }

  async fn get_by_reference(&self, reference: &str) -> Result<CatalogEntity> {
    let id = reference_id(reference).ok_or_else(|| eyre!("bad reference {}", reference))?;
    self.get_by_id(id).await
  }

  async fn get_by_id(&self, id: EntityId) -> Result<CatalogEntity> {
    self.detail_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(gate) = self.gates.get(&id) {
      gate.notified().await;
    }
    if self.failing.contains(&id) {
      return Err(eyre!("lookup failed for {}", id));
    }

    self
      .entities
      .iter()
      .find(|e| e.id == id)
      .cloned()
      .ok_or_else(|| eyre!("no entity {}", id))
  }
}

#[async_trait]
impl ImageSource for FakeCatalog {
  async fn fetch_image(&self, uri: &str) -> Result<FetchedImage> {
    if uri.contains("broken") {
      return Err(eyre!("image unavailable"));
    }
    Ok(FetchedImage {
      bytes: b"img".to_vec(),
      content_type: Some("image/png".to_string()),
    })
  }
}
