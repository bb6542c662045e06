//! SQLite-backed owned collection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::catalog::{CatalogEntity, EntityId, StatBlock};

use super::schema::SCHEMA;
use super::{OwnedRecord, OwnedStore, RecordUpdate};

const RECORD_COLUMNS: &str = "id, name, height, weight, hp, attack, defense, special_attack, \
   special_defense, speed, image, captured_at, note";

/// Owned collection stored in a single SQLite database file.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open or create the collection database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Run database migrations
  fn run_migrations(&self) -> Result<()> {
    self
      .lock()?
      .execute_batch(SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Load records matching `filter` (a WHERE clause over `owned_records`) with their tags.
  fn load_records(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
  ) -> Result<Vec<OwnedRecord>> {
    let sql = format!(
      "SELECT {} FROM owned_records {} ORDER BY captured_at, id",
      RECORD_COLUMNS, filter
    );
    let mut stmt = conn
      .prepare(&sql)
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let mut records: Vec<OwnedRecord> = stmt
      .query_map(args, record_from_row)
      .map_err(|e| eyre!("Failed to query records: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read record: {}", e))?;

    let mut types = Self::load_types(conn)?;
    for record in &mut records {
      record.entity.types = types.remove(&record.entity.id).unwrap_or_default();
    }

    Ok(records)
  }

  fn load_types(conn: &Connection) -> Result<HashMap<EntityId, Vec<String>>> {
    let mut stmt = conn
      .prepare("SELECT id, type_name FROM owned_record_types ORDER BY id, position")
      .map_err(|e| eyre!("Failed to prepare type query: {}", e))?;

    let rows = stmt
      .query_map([], |row| Ok((row.get::<_, EntityId>(0)?, row.get::<_, String>(1)?)))
      .map_err(|e| eyre!("Failed to query types: {}", e))?;

    let mut types: HashMap<EntityId, Vec<String>> = HashMap::new();
    for row in rows {
      let (id, type_name) = row.map_err(|e| eyre!("Failed to read type row: {}", e))?;
      types.entry(id).or_default().push(type_name);
    }
    Ok(types)
  }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<OwnedRecord> {
  let captured_at: String = row.get(11)?;
  let captured_at = DateTime::parse_from_rfc3339(&captured_at)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| {
      rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
    })?;

  Ok(OwnedRecord {
    entity: CatalogEntity {
      id: row.get(0)?,
      name: row.get(1)?,
      types: Vec::new(),
      height: row.get(2)?,
      weight: row.get(3)?,
      stats: StatBlock {
        hp: row.get(4)?,
        attack: row.get(5)?,
        defense: row.get(6)?,
        special_attack: row.get(7)?,
        special_defense: row.get(8)?,
        speed: row.get(9)?,
      },
      image: row.get(10)?,
    },
    captured_at,
    note: row.get(12)?,
  })
}

#[async_trait]
impl OwnedStore for SqliteStore {
  async fn scan_all(&self) -> Result<Vec<OwnedRecord>> {
    let conn = self.lock()?;
    Self::load_records(&conn, "", &[])
  }

  async fn scan_by_type(&self, type_name: &str) -> Result<Vec<OwnedRecord>> {
    let conn = self.lock()?;
    Self::load_records(
      &conn,
      "WHERE id IN (SELECT id FROM owned_record_types WHERE type_name = ?)",
      &[&type_name],
    )
  }

  async fn get(&self, id: EntityId) -> Result<Option<OwnedRecord>> {
    let conn = self.lock()?;
    let sql = format!("SELECT {} FROM owned_records WHERE id = ?", RECORD_COLUMNS);

    let record = conn
      .query_row(&sql, params![id], record_from_row)
      .optional()
      .map_err(|e| eyre!("Failed to load record {}: {}", id, e))?;

    let Some(mut record) = record else {
      return Ok(None);
    };

    let mut stmt = conn
      .prepare("SELECT type_name FROM owned_record_types WHERE id = ? ORDER BY position")
      .map_err(|e| eyre!("Failed to prepare type query: {}", e))?;
    record.entity.types = stmt
      .query_map(params![id], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query types for {}: {}", id, e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read types for {}: {}", id, e))?;

    Ok(Some(record))
  }

  async fn insert(&self, record: &OwnedRecord) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let entity = &record.entity;
    let stats = &entity.stats;

    // Plain INSERT: an existing id is a constraint violation, never an overwrite
    tx.execute(
      &format!(
        "INSERT INTO owned_records ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        RECORD_COLUMNS
      ),
      params![
        entity.id,
        entity.name,
        entity.height,
        entity.weight,
        stats.hp,
        stats.attack,
        stats.defense,
        stats.special_attack,
        stats.special_defense,
        stats.speed,
        entity.image,
        record.captured_at.to_rfc3339(),
        record.note,
      ],
    )
    .map_err(|e| eyre!("Failed to insert record {}: {}", entity.id, e))?;

    for (position, type_name) in entity.types.iter().enumerate() {
      tx.execute(
        "INSERT INTO owned_record_types (id, position, type_name) VALUES (?, ?, ?)",
        params![entity.id, position, type_name],
      )
      .map_err(|e| eyre!("Failed to store types for {}: {}", entity.id, e))?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  async fn bulk_delete(&self, ids: &[EntityId]) -> Result<()> {
    if ids.is_empty() {
      return Ok(());
    }

    let conn = self.lock()?;
    let placeholders = vec!["?"; ids.len()].join(", ");
    conn
      .execute(
        &format!("DELETE FROM owned_records WHERE id IN ({})", placeholders),
        params_from_iter(ids.iter()),
      )
      .map_err(|e| eyre!("Failed to delete records: {}", e))?;

    Ok(())
  }

  async fn update_fields(&self, id: EntityId, update: &RecordUpdate) -> Result<()> {
    let conn = self.lock()?;

    if let Some(note) = &update.note {
      let note = Some(note.as_str()).filter(|n| !n.is_empty());
      let changed = conn
        .execute(
          "UPDATE owned_records SET note = ? WHERE id = ?",
          params![note, id],
        )
        .map_err(|e| eyre!("Failed to update record {}: {}", id, e))?;

      if changed == 0 {
        return Err(eyre!("No owned record with id {}", id));
      }
    }

    Ok(())
  }
}
