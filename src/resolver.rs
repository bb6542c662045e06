//! Detail view resolution: fuses the remote entity and the local owned record
//! into what a single-entity view shows.
//!
//! The fusion is a pure function of three inputs (remote state, local state,
//! shared-view marker). `DetailView` drives the two lookups and recomputes the
//! resolution whenever either one changes.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::catalog::{CatalogClient, CatalogEntity, EntityId};
use crate::db::{OwnedRecord, OwnedStore};
use crate::query::{Query, QueryState};

/// Which of the three mutually exclusive view contexts applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewContext {
  /// Someone else's capture: canonical remote data only
  Shared,
  /// The viewer owns this entity: local record wins
  Owner,
  /// Not owned: remote data
  Discovery,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedEntity {
  Remote(CatalogEntity),
  Owned(OwnedRecord),
}

impl ResolvedEntity {
  pub fn entity(&self) -> &CatalogEntity {
    match self {
      ResolvedEntity::Remote(entity) => entity,
      ResolvedEntity::Owned(record) => &record.entity,
    }
  }

  pub fn name(&self) -> &str {
    &self.entity().name
  }

  pub fn image(&self) -> &str {
    &self.entity().image
  }

  pub fn note(&self) -> Option<&str> {
    match self {
      ResolvedEntity::Remote(_) => None,
      ResolvedEntity::Owned(record) => record.note.as_deref(),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
  pub context: ViewContext,
  pub entity: Option<ResolvedEntity>,
  /// Capture time to display: the marker in shared view, the record's in owner view
  pub captured_at: Option<DateTime<Utc>>,
  pub loading: bool,
  pub error: Option<String>,
}

/// Decide what a detail view shows.
///
/// Local success masks a remote failure outside shared view; the error state
/// only appears once the local lookup has settled without a record.
pub fn resolve(
  remote: &QueryState<CatalogEntity>,
  local: &QueryState<Option<OwnedRecord>>,
  shared_marker: Option<DateTime<Utc>>,
) -> Resolution {
  let local_record = local.data().and_then(Option::as_ref);

  let context = match (shared_marker, local_record) {
    (Some(_), _) => ViewContext::Shared,
    (None, Some(_)) => ViewContext::Owner,
    (None, None) => ViewContext::Discovery,
  };

  let (entity, captured_at) = match context {
    ViewContext::Shared => (
      remote.data().cloned().map(ResolvedEntity::Remote),
      shared_marker,
    ),
    ViewContext::Owner => (
      local_record.cloned().map(ResolvedEntity::Owned),
      local_record.map(|r| r.captured_at),
    ),
    ViewContext::Discovery => (remote.data().cloned().map(ResolvedEntity::Remote), None),
  };

  let loading = entity.is_none() && (remote.is_loading() || local.is_loading());

  let error = if remote.is_error()
    && local_record.is_none()
    && context != ViewContext::Shared
    && local.is_settled()
  {
    remote.error().map(String::from)
  } else {
    None
  };

  Resolution {
    context,
    entity,
    captured_at,
    loading,
    error,
  }
}

/// Drives the remote and local lookups for one identifier.
pub struct DetailView {
  id: EntityId,
  shared_marker: Option<DateTime<Utc>>,
  remote: Query<CatalogEntity>,
  local: Query<Option<OwnedRecord>>,
  resolution: Resolution,
}

impl DetailView {
  /// Start both lookups for `id`.
  pub fn open<C, S>(
    catalog: Arc<C>,
    store: Arc<S>,
    id: EntityId,
    shared_marker: Option<DateTime<Utc>>,
  ) -> Self
  where
    C: CatalogClient + 'static,
    S: OwnedStore + 'static,
  {
    let mut remote = Query::new(move || {
      let catalog = catalog.clone();
      async move { catalog.get_by_id(id).await.map_err(|e| format!("{:#}", e)) }
    });
    let mut local = Query::new(move || {
      let store = store.clone();
      async move { store.get(id).await.map_err(|e| format!("{:#}", e)) }
    });

    remote.fetch();
    local.fetch();

    let resolution = resolve(remote.state(), local.state(), shared_marker);
    Self {
      id,
      shared_marker,
      remote,
      local,
      resolution,
    }
  }

  pub fn id(&self) -> EntityId {
    self.id
  }

  pub fn resolution(&self) -> &Resolution {
    &self.resolution
  }

  fn recompute(&mut self) {
    self.resolution = resolve(self.remote.state(), self.local.state(), self.shared_marker);
  }

  /// Pick up finished lookups without blocking. Returns `true` if anything changed.
  pub fn poll(&mut self) -> bool {
    let remote_changed = self.remote.poll();
    let local_changed = self.local.poll();
    if remote_changed || local_changed {
      self.recompute();
    }
    remote_changed || local_changed
  }

  /// Wait for both lookups to settle, recomputing after each change.
  pub async fn settle(&mut self) -> &Resolution {
    while self.remote.is_loading() || self.local.is_loading() {
      let remote_loading = self.remote.is_loading();
      let local_loading = self.local.is_loading();
      tokio::select! {
        _ = self.remote.wait(), if remote_loading => {}
        _ = self.local.wait(), if local_loading => {}
      }
      self.poll();
      self.recompute();
    }
    &self.resolution
  }

  /// Refetch the remote entity if its lookup failed. Returns `true` if a retry started.
  pub fn retry(&mut self) -> bool {
    if !self.remote.state().is_error() {
      return false;
    }
    self.remote.refetch();
    self.recompute();
    true
  }
}
