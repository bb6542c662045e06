//! Local durable store for the owned collection.

pub mod schema;
mod sqlite;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogEntity, EntityId};

pub use sqlite::SqliteStore;

/// Maximum annotation length in characters.
pub const NOTE_MAX_CHARS: usize = 200;

/// A locally owned entity, renderable without network access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedRecord {
  /// Entity snapshot; `entity.image` holds the embedded encoding
  pub entity: CatalogEntity,
  pub captured_at: DateTime<Utc>,
  pub note: Option<String>,
}

impl OwnedRecord {
  /// Build a fresh record for a capture, replacing the remote image with `image`.
  pub fn capture(candidate: &CatalogEntity, image: String, captured_at: DateTime<Utc>) -> Self {
    Self {
      entity: CatalogEntity {
        image,
        ..candidate.clone()
      },
      captured_at,
      note: None,
    }
  }

  pub fn id(&self) -> EntityId {
    self.entity.id
  }
}

/// Partial update of an owned record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
  /// New annotation; an empty string clears it
  pub note: Option<String>,
}

/// Keyed table of owned records.
///
/// Failures are always reported as errors, never swallowed.
#[async_trait]
pub trait OwnedStore: Send + Sync {
  /// Every owned record.
  async fn scan_all(&self) -> Result<Vec<OwnedRecord>>;

  /// Owned records carrying the given category tag.
  async fn scan_by_type(&self, type_name: &str) -> Result<Vec<OwnedRecord>>;

  /// A single record by identifier.
  async fn get(&self, id: EntityId) -> Result<Option<OwnedRecord>>;

  /// Insert a new record. Fails if the identifier already exists.
  async fn insert(&self, record: &OwnedRecord) -> Result<()>;

  /// Delete all listed records. Missing ids are ignored.
  async fn bulk_delete(&self, ids: &[EntityId]) -> Result<()>;

  /// Apply a partial update. Fails if the identifier does not exist.
  async fn update_fields(&self, id: EntityId, update: &RecordUpdate) -> Result<()>;
}
