//! Serde-deserializable types matching catalog API responses.
//!
//! Nothing outside this module sees the raw payload shape; `ApiPokemon::into_entity`
//! is the single translation point into `CatalogEntity`.

use serde::Deserialize;

use super::types::{CatalogEntity, NameIndexEntry, StatBlock};

// ============================================================================
// Listing endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiNamedResource {
  pub name: String,
  pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiListResponse {
  #[serde(default)]
  pub results: Vec<ApiNamedResource>,
}

// ============================================================================
// Detail endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiName {
  pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiTypeSlot {
  pub slot: u32,
  #[serde(rename = "type")]
  pub type_ref: ApiName,
}

#[derive(Debug, Deserialize)]
pub struct ApiStat {
  pub base_stat: u32,
  pub stat: ApiName,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiArtwork {
  pub front_default: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiOtherSprites {
  #[serde(rename = "official-artwork", default)]
  pub official_artwork: ApiArtwork,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiSprites {
  pub front_default: Option<String>,
  #[serde(default)]
  pub other: ApiOtherSprites,
}

#[derive(Debug, Deserialize)]
pub struct ApiPokemon {
  pub id: u32,
  pub name: String,
  #[serde(default)]
  pub height: u32,
  #[serde(default)]
  pub weight: u32,
  #[serde(default)]
  pub types: Vec<ApiTypeSlot>,
  #[serde(default)]
  pub stats: Vec<ApiStat>,
  #[serde(default)]
  pub sprites: ApiSprites,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiNamedResource> for NameIndexEntry {
  fn from(resource: ApiNamedResource) -> Self {
    NameIndexEntry {
      name: resource.name,
      reference: resource.url,
    }
  }
}

impl ApiPokemon {
  pub fn into_entity(self) -> CatalogEntity {
    let mut types = self.types;
    types.sort_by_key(|t| t.slot);

    let stats = self
      .stats
      .iter()
      .fold(StatBlock::default(), |mut block, stat| {
        match stat.stat.name.as_str() {
          "hp" => block.hp = stat.base_stat,
          "attack" => block.attack = stat.base_stat,
          "defense" => block.defense = stat.base_stat,
          "special-attack" => block.special_attack = stat.base_stat,
          "special-defense" => block.special_defense = stat.base_stat,
          "speed" => block.speed = stat.base_stat,
          _ => {}
        }
        block
      });

    let image = self
      .sprites
      .other
      .official_artwork
      .front_default
      .or(self.sprites.front_default)
      .unwrap_or_default();

    CatalogEntity {
      id: self.id,
      name: self.name,
      types: types.into_iter().map(|t| t.type_ref.name).collect(),
      height: self.height,
      weight: self.weight,
      stats,
      image,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PIKACHU: &str = r#"{
    "id": 25,
    "name": "pikachu",
    "height": 4,
    "weight": 60,
    "types": [{ "slot": 1, "type": { "name": "electric", "url": "x" } }],
    "stats": [
      { "base_stat": 35, "effort": 0, "stat": { "name": "hp" } },
      { "base_stat": 55, "effort": 0, "stat": { "name": "attack" } },
      { "base_stat": 40, "effort": 0, "stat": { "name": "defense" } },
      { "base_stat": 50, "effort": 0, "stat": { "name": "special-attack" } },
      { "base_stat": 50, "effort": 0, "stat": { "name": "special-defense" } },
      { "base_stat": 90, "effort": 2, "stat": { "name": "speed" } }
    ],
    "sprites": {
      "front_default": "https://img/sprite/25.png",
      "other": { "official-artwork": { "front_default": "https://img/art/25.png" } }
    }
  }"#;

  #[test]
  fn test_into_entity_maps_all_fields() {
    let raw: ApiPokemon = serde_json::from_str(PIKACHU).unwrap();
    let entity = raw.into_entity();

    assert_eq!(entity.id, 25);
    assert_eq!(entity.name, "pikachu");
    assert_eq!(entity.types, vec!["electric".to_string()]);
    assert_eq!((entity.height, entity.weight), (4, 60));
    assert_eq!(entity.stats.hp, 35);
    assert_eq!(entity.stats.special_attack, 50);
    assert_eq!(entity.stats.speed, 90);
    assert_eq!(entity.image, "https://img/art/25.png");
  }

  #[test]
  fn test_types_are_ordered_by_slot() {
    let raw: ApiPokemon = serde_json::from_str(
      r#"{ "id": 1, "name": "bulbasaur", "types": [
        { "slot": 2, "type": { "name": "poison" } },
        { "slot": 1, "type": { "name": "grass" } }
      ] }"#,
    )
    .unwrap();

    assert_eq!(raw.into_entity().types, vec!["grass", "poison"]);
  }

  #[test]
  fn test_image_falls_back_to_front_default() {
    let raw: ApiPokemon = serde_json::from_str(
      r#"{ "id": 7, "name": "squirtle", "sprites": { "front_default": "https://img/7.png", "other": {} } }"#,
    )
    .unwrap();

    let entity = raw.into_entity();
    assert_eq!(entity.image, "https://img/7.png");
    assert_eq!(entity.stats, StatBlock::default());
  }
}
