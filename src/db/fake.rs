//! Store wrapper used by unit tests to count writes and inject failures.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::catalog::EntityId;

use super::{OwnedRecord, OwnedStore, RecordUpdate, SqliteStore};

pub struct FlakyStore {
  inner: SqliteStore,
  pub fail_scan: AtomicBool,
  pub fail_insert: AtomicBool,
  pub fail_delete: AtomicBool,
  pub fail_update: AtomicBool,
  writes: AtomicUsize,
}

impl FlakyStore {
  pub fn new() -> Self {
    Self {
      inner: SqliteStore::open_in_memory().expect("in-memory store"),
      fail_scan: AtomicBool::new(false),
      fail_insert: AtomicBool::new(false),
      fail_delete: AtomicBool::new(false),
      fail_update: AtomicBool::new(false),
      writes: AtomicUsize::new(0),
    }
  }

  /// Insert, delete and update calls received, successful or not.
  pub fn writes(&self) -> usize {
    self.writes.load(Ordering::SeqCst)
  }

  fn check(flag: &AtomicBool, what: &str) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
      Err(eyre!("injected {} failure", what))
    } else {
      Ok(())
    }
  }
}

#[async_trait]
impl OwnedStore for FlakyStore {
  async fn scan_all(&self) -> Result<Vec<OwnedRecord>> {
    Self::check(&self.fail_scan, "scan")?;
    self.inner.scan_all().await
  }

  async fn scan_by_type(&self, type_name: &str) -> Result<Vec<OwnedRecord>> {
    Self::check(&self.fail_scan, "scan")?;
    self.inner.scan_by_type(type_name).await
  }

  async fn get(&self, id: EntityId) -> Result<Option<OwnedRecord>> {
    Self::check(&self.fail_scan, "get")?;
    self.inner.get(id).await
  }

  async fn insert(&self, record: &OwnedRecord) -> Result<()> {
    self.writes.fetch_add(1, Ordering::SeqCst);
    Self::check(&self.fail_insert, "insert")?;
    self.inner.insert(record).await
  }

  async fn bulk_delete(&self, ids: &[EntityId]) -> Result<()> {
    self.writes.fetch_add(1, Ordering::SeqCst);
    Self::check(&self.fail_delete, "delete")?;
    self.inner.bulk_delete(ids).await
  }

  async fn update_fields(&self, id: EntityId, update: &RecordUpdate) -> Result<()> {
    self.writes.fetch_add(1, Ordering::SeqCst);
    Self::check(&self.fail_update, "update")?;
    self.inner.update_fields(id, update).await
  }
}
