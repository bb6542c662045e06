pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod types;

#[cfg(test)]
pub mod fake;

pub use cached_client::CachedCatalogClient;
pub use client::{CatalogClient, FetchedImage, HttpCatalogClient, ImageSource};
pub use types::{CatalogEntity, EntityId, NameIndexEntry, StatBlock};
