use serde::{Deserialize, Serialize};

/// Catalog identifier. Always positive.
pub type EntityId = u32;

/// The six base statistics of a catalog entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
  pub hp: u32,
  pub attack: u32,
  pub defense: u32,
  pub special_attack: u32,
  pub special_defense: u32,
  pub speed: u32,
}

/// Canonical remote record, produced only by the payload adapter in `api_types`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntity {
  pub id: EntityId,
  pub name: String,
  /// Category tags in slot order
  pub types: Vec<String>,
  pub height: u32,
  pub weight: u32,
  pub stats: StatBlock,
  /// Remote image URI
  pub image: String,
}

/// Lightweight listing entry: display name plus the reference used for hydration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameIndexEntry {
  pub name: String,
  pub reference: String,
}

impl NameIndexEntry {
  /// Identifier encoded as the last path segment of the reference.
  pub fn id(&self) -> Option<EntityId> {
    reference_id(&self.reference)
  }
}

/// Extract the identifier from a reference like `https://host/api/v2/pokemon/25/`.
pub fn reference_id(reference: &str) -> Option<EntityId> {
  reference
    .trim_end_matches('/')
    .rsplit('/')
    .next()
    .and_then(|segment| segment.parse::<EntityId>().ok())
    .filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reference_id_with_trailing_slash() {
    assert_eq!(
      reference_id("https://pokeapi.co/api/v2/pokemon/25/"),
      Some(25)
    );
  }

  #[test]
  fn test_reference_id_without_trailing_slash() {
    assert_eq!(reference_id("fake://pokemon/1"), Some(1));
  }

  #[test]
  fn test_reference_id_rejects_names_and_zero() {
    assert_eq!(reference_id("https://pokeapi.co/api/v2/pokemon/pikachu/"), None);
    assert_eq!(reference_id("fake://pokemon/0"), None);
  }
}
