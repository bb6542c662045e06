use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::CatalogConfig;

use super::api_types::{ApiListResponse, ApiPokemon};
use super::types::{CatalogEntity, EntityId, NameIndexEntry};

/// Read-only access to the remote catalog.
///
/// Every call may fail transiently; callers decide how much of a failure to tolerate.
#[async_trait]
pub trait CatalogClient: Send + Sync {
  /// One page of listing entries, in the catalog's natural order.
  async fn list_page(&self, limit: usize, offset: usize) -> Result<Vec<NameIndexEntry>>;

  /// Resolve a listing reference to a full entity.
  async fn get_by_reference(&self, reference: &str) -> Result<CatalogEntity>;

  /// Resolve an identifier to a full entity.
  async fn get_by_id(&self, id: EntityId) -> Result<CatalogEntity>;
}

/// A binary image payload as served by the remote.
#[derive(Debug, Clone)]
pub struct FetchedImage {
  pub bytes: Vec<u8>,
  pub content_type: Option<String>,
}

/// Source of raw image bytes for embedding.
#[async_trait]
pub trait ImageSource: Send + Sync {
  async fn fetch_image(&self, uri: &str) -> Result<FetchedImage>;
}

#[async_trait]
impl<T: CatalogClient + ?Sized> CatalogClient for Arc<T> {
  async fn list_page(&self, limit: usize, offset: usize) -> Result<Vec<NameIndexEntry>> {
    (**self).list_page(limit, offset).await
  }

  async fn get_by_reference(&self, reference: &str) -> Result<CatalogEntity> {
    (**self).get_by_reference(reference).await
  }

  async fn get_by_id(&self, id: EntityId) -> Result<CatalogEntity> {
    (**self).get_by_id(id).await
  }
}

/// HTTP catalog client speaking the PokeAPI JSON shape.
#[derive(Clone)]
pub struct HttpCatalogClient {
  http: reqwest::Client,
  base: Url,
}

impl HttpCatalogClient {
  pub fn new(config: &CatalogConfig) -> Result<Self> {
    let mut base =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid catalog URL {}: {}", config.url, e))?;

    // Url::join replaces the last segment unless the path ends with a slash
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  /// Canonical reference for an identifier, matching what listings return.
  pub fn reference_for(&self, id: EntityId) -> Result<Url> {
    self
      .base
      .join(&format!("pokemon/{}/", id))
      .map_err(|e| eyre!("Failed to build reference for {}: {}", id, e))
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", url, e))?
      .error_for_status()
      .map_err(|e| eyre!("Catalog request failed: {}", e))?;

    response
      .json::<T>()
      .await
      .map_err(|e| eyre!("Failed to parse response from {}: {}", url, e))
  }

  fn resolve(&self, reference: &str) -> Result<Url> {
    Url::parse(reference)
      .or_else(|_| self.base.join(reference))
      .map_err(|e| eyre!("Invalid catalog reference {}: {}", reference, e))
  }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
  async fn list_page(&self, limit: usize, offset: usize) -> Result<Vec<NameIndexEntry>> {
    let mut url = self
      .base
      .join("pokemon")
      .map_err(|e| eyre!("Failed to build listing URL: {}", e))?;
    url
      .query_pairs_mut()
      .append_pair("limit", &limit.to_string())
      .append_pair("offset", &offset.to_string());

    let response: ApiListResponse = self.get_json(url).await?;
    Ok(response.results.into_iter().map(NameIndexEntry::from).collect())
  }

  async fn get_by_reference(&self, reference: &str) -> Result<CatalogEntity> {
    let url = self.resolve(reference)?;
    let raw: ApiPokemon = self.get_json(url).await?;
    Ok(raw.into_entity())
  }

  async fn get_by_id(&self, id: EntityId) -> Result<CatalogEntity> {
    let url = self.reference_for(id)?;
    let raw: ApiPokemon = self.get_json(url).await?;
    Ok(raw.into_entity())
  }
}

#[async_trait]
impl ImageSource for HttpCatalogClient {
  async fn fetch_image(&self, uri: &str) -> Result<FetchedImage> {
    let url = self.resolve(uri)?;
    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch image {}: {}", url, e))?
      .error_for_status()
      .map_err(|e| eyre!("Image request failed: {}", e))?;

    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(String::from);

    let bytes = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read image body from {}: {}", url, e))?;

    Ok(FetchedImage {
      bytes: bytes.to_vec(),
      content_type,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use wiremock::matchers::{method, path, query_param};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client_for(server: &MockServer) -> HttpCatalogClient {
    let config = CatalogConfig {
      url: format!("{}/api/v2", server.uri()),
      ..CatalogConfig::default()
    };
    HttpCatalogClient::new(&config).unwrap()
  }

  #[tokio::test]
  async fn test_list_page_sends_limit_and_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v2/pokemon"))
      .and(query_param("limit", "2"))
      .and(query_param("offset", "40"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "count": 1302,
        "next": null,
        "previous": null,
        "results": [
          { "name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/" },
          { "name": "ivysaur", "url": "https://pokeapi.co/api/v2/pokemon/2/" }
        ]
      })))
      .mount(&server)
      .await;

    let page = client_for(&server).list_page(2, 40).await.unwrap();

    assert_eq!(page.len(), 2);
    assert_eq!(page[0].name, "bulbasaur");
    assert_eq!(page[1].id(), Some(2));
  }

  #[tokio::test]
  async fn test_get_by_id_uses_canonical_reference() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v2/pokemon/25/"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "id": 25,
        "name": "pikachu",
        "height": 4,
        "weight": 60,
        "types": [{ "slot": 1, "type": { "name": "electric" } }],
        "stats": [],
        "sprites": { "front_default": "https://img/25.png" }
      })))
      .mount(&server)
      .await;

    let entity = client_for(&server).get_by_id(25).await.unwrap();

    assert_eq!(entity.name, "pikachu");
    assert_eq!(entity.image, "https://img/25.png");
  }

  #[tokio::test]
  async fn test_server_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;

    let client = client_for(&server);
    let reference = format!("{}/api/v2/pokemon/4/", server.uri());

    assert!(client.get_by_reference(&reference).await.is_err());
  }

  #[tokio::test]
  async fn test_fetch_image_reports_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/img/25.png"))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("content-type", "image/png")
          .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
      )
      .mount(&server)
      .await;

    let image = client_for(&server)
      .fetch_image(&format!("{}/img/25.png", server.uri()))
      .await
      .unwrap();

    assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
    assert_eq!(image.content_type.as_deref(), Some("image/png"));
  }
}
