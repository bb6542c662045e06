//! The owned collection: sole authority on "is entity X owned?" and the only
//! place ownership is mutated.
//!
//! Every membership change is applied to memory first and published, then
//! persisted. A failed write reverts only that mutation's own change, which
//! is the exact pre-mutation set whenever mutations do not overlap.

use chrono::Utc;
use color_eyre::Result;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::catalog::{CatalogEntity, EntityId};
use crate::db::{OwnedRecord, OwnedStore, RecordUpdate, NOTE_MAX_CHARS};
use crate::image::ImageEmbedder;

/// Identifiers currently believed to be owned. Copied on write, so held snapshots never change.
pub type MembershipSet = Arc<BTreeSet<EntityId>>;

/// What a mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
  /// Change is in memory and persisted
  Applied,
  /// Nothing to do (duplicate capture, empty release)
  Skipped,
  /// Persistence failed; this mutation's membership change was reverted
  RolledBack,
  /// Persistence failed; memory was never touched
  Failed,
}

pub struct CollectionCache<S, E> {
  store: Arc<S>,
  embedder: Arc<E>,
  members: watch::Sender<MembershipSet>,
  initialized: AtomicBool,
  init_lock: Mutex<()>,
}

impl<S: OwnedStore, E: ImageEmbedder> CollectionCache<S, E> {
  pub fn new(store: Arc<S>, embedder: Arc<E>) -> Self {
    let (members, _) = watch::channel(MembershipSet::default());
    Self {
      store,
      embedder,
      members,
      initialized: AtomicBool::new(false),
      init_lock: Mutex::new(()),
    }
  }

  /// Load the owned table once and derive the membership set from it.
  ///
  /// A no-op once initialized. On a read error the set stays empty, the cache
  /// stays uninitialized, and a later call may retry.
  pub async fn initialize(&self) {
    if self.is_initialized() {
      return;
    }

    let _guard = self.init_lock.lock().await;
    if self.is_initialized() {
      return;
    }

    match self.store.scan_all().await {
      Ok(records) => {
        let ids: BTreeSet<EntityId> = records.iter().map(OwnedRecord::id).collect();
        info!(count = ids.len(), "Loaded owned collection");
        self.members.send_modify(|members| Arc::make_mut(members).extend(ids));
        self.initialized.store(true, Ordering::SeqCst);
      }
      Err(e) => {
        error!(error = %e, "Failed to load owned collection, treating everything as unowned");
      }
    }
  }

  pub fn is_initialized(&self) -> bool {
    self.initialized.load(Ordering::SeqCst)
  }

  pub fn is_owned(&self, id: EntityId) -> bool {
    self.members.borrow().contains(&id)
  }

  /// Current membership snapshot.
  pub fn members(&self) -> MembershipSet {
    self.members.borrow().clone()
  }

  /// Observe every published membership change.
  #[cfg(test)]
  pub fn subscribe(&self) -> watch::Receiver<MembershipSet> {
    self.members.subscribe()
  }

  /// Add `candidate` to the collection.
  ///
  /// Duplicates are rejected before any I/O. The membership change is visible
  /// before the image is embedded or the record is written. A failed write
  /// undoes only this capture; other ids published meanwhile stay put.
  pub async fn capture(&self, candidate: &CatalogEntity) -> MutationOutcome {
    let id = candidate.id;
    let added = self
      .members
      .send_if_modified(|members| Arc::make_mut(members).insert(id));
    if !added {
      warn!(id, name = %candidate.name, "Already owned, ignoring capture");
      return MutationOutcome::Skipped;
    }

    let image = self.embedder.embed(&candidate.image).await;
    let record = OwnedRecord::capture(candidate, image, Utc::now());

    match self.store.insert(&record).await {
      Ok(()) => {
        info!(id, name = %candidate.name, "Captured");
        MutationOutcome::Applied
      }
      Err(e) => {
        self.members.send_modify(|members| {
          Arc::make_mut(members).remove(&id);
        });
        error!(id, error = %e, "Capture failed to persist, rolled back");
        MutationOutcome::RolledBack
      }
    }
  }

  /// Remove every id in `ids` from the collection.
  pub async fn release(&self, ids: &[EntityId]) -> MutationOutcome {
    if ids.is_empty() {
      return MutationOutcome::Skipped;
    }

    let mut removed = Vec::with_capacity(ids.len());
    self.members.send_if_modified(|members| {
      let members = Arc::make_mut(members);
      removed.extend(ids.iter().copied().filter(|id| members.remove(id)));
      !removed.is_empty()
    });

    match self.store.bulk_delete(ids).await {
      Ok(()) => {
        info!(count = ids.len(), ?ids, "Released");
        MutationOutcome::Applied
      }
      Err(e) => {
        // Only ids this call actually removed come back
        if !removed.is_empty() {
          self.members.send_modify(|members| {
            Arc::make_mut(members).extend(removed.iter().copied());
          });
        }
        error!(?ids, error = %e, "Release failed to persist, rolled back");
        MutationOutcome::RolledBack
      }
    }
  }

  /// Set the free-text annotation on an owned record.
  ///
  /// Input is trimmed and cut to `NOTE_MAX_CHARS` characters.
  pub async fn update_annotation(&self, id: EntityId, text: &str) -> MutationOutcome {
    let note = clamp_note(text);
    if note.chars().count() < text.trim().chars().count() {
      info!(id, limit = NOTE_MAX_CHARS, "Annotation truncated");
    }

    let update = RecordUpdate { note: Some(note) };
    match self.store.update_fields(id, &update).await {
      Ok(()) => MutationOutcome::Applied,
      Err(e) => {
        error!(id, error = %e, "Failed to save annotation");
        MutationOutcome::Failed
      }
    }
  }

  /// The owned record for `id`, if any.
  pub async fn record(&self, id: EntityId) -> Result<Option<OwnedRecord>> {
    self.store.get(id).await
  }

  /// Every owned record, oldest capture first.
  pub async fn records(&self) -> Result<Vec<OwnedRecord>> {
    self.store.scan_all().await
  }

  /// Owned records carrying the category tag `type_name`.
  pub async fn records_of_type(&self, type_name: &str) -> Result<Vec<OwnedRecord>> {
    self.store.scan_by_type(&type_name.to_ascii_lowercase()).await
  }
}

fn clamp_note(text: &str) -> String {
  text.trim().chars().take(NOTE_MAX_CHARS).collect()
}
