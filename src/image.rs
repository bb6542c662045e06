//! Converts remote image references into self-contained data URIs so owned
//! records render with no network access.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{FetchedImage, ImageSource};

/// Turns a remote image URI into something storable.
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
  /// Never fails: on any error the original URI comes back unchanged.
  async fn embed(&self, remote_uri: &str) -> String;
}

/// Embeds images as `data:<mime>;base64,<payload>` URIs.
pub struct DataUriEmbedder<S> {
  source: Arc<S>,
}

impl<S: ImageSource> DataUriEmbedder<S> {
  pub fn new(source: Arc<S>) -> Self {
    Self { source }
  }

  async fn try_embed(&self, remote_uri: &str) -> Result<String> {
    let FetchedImage {
      bytes,
      content_type,
    } = self.source.fetch_image(remote_uri).await?;

    if bytes.is_empty() {
      return Err(eyre!("Empty image body"));
    }

    let mime = content_type
      .as_deref()
      .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
      .filter(|ct| !ct.is_empty() && ct != "application/octet-stream")
      .or_else(|| mime_from_extension(remote_uri).map(String::from))
      .ok_or_else(|| eyre!("Unknown image type"))?;

    if !mime.starts_with("image/") {
      return Err(eyre!("Not an image: {}", mime));
    }

    Ok(format!("data:{};base64,{}", mime, STANDARD.encode(&bytes)))
  }
}

#[async_trait]
impl<S: ImageSource> ImageEmbedder for DataUriEmbedder<S> {
  async fn embed(&self, remote_uri: &str) -> String {
    if remote_uri.is_empty() || remote_uri.starts_with("data:") {
      return remote_uri.to_string();
    }

    match self.try_embed(remote_uri).await {
      Ok(embedded) => {
        debug!(uri = remote_uri, size = embedded.len(), "Embedded image");
        embedded
      }
      Err(e) => {
        warn!(uri = remote_uri, error = %e, "Image embedding failed, keeping remote URI");
        remote_uri.to_string()
      }
    }
  }
}

fn mime_from_extension(uri: &str) -> Option<&'static str> {
  let path = uri.split(['?', '#']).next().unwrap_or(uri);
  let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
  match extension.as_str() {
    "png" => Some("image/png"),
    "jpg" | "jpeg" => Some("image/jpeg"),
    "gif" => Some("image/gif"),
    "webp" => Some("image/webp"),
    "svg" => Some("image/svg+xml"),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::fake::FakeCatalog;
  use crate::catalog::HttpCatalogClient;
  use crate::config::CatalogConfig;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  #[tokio::test]
  async fn test_embed_produces_data_uri() {
    let embedder = DataUriEmbedder::new(Arc::new(FakeCatalog::default()));

    let embedded = embedder.embed("fake://img/25.png").await;

    assert_eq!(embedded, "data:image/png;base64,aW1n");
  }

  #[tokio::test]
  async fn test_failure_returns_original_uri() {
    let embedder = DataUriEmbedder::new(Arc::new(FakeCatalog::default()));

    let embedded = embedder.embed("fake://img/broken.png").await;

    assert_eq!(embedded, "fake://img/broken.png");
  }

  #[tokio::test]
  async fn test_existing_data_uri_is_untouched() {
    let embedder = DataUriEmbedder::new(Arc::new(FakeCatalog::default()));
    let uri = "data:image/png;base64,AAAA";

    assert_eq!(embedder.embed(uri).await, uri);
  }

  #[tokio::test]
  async fn test_extension_used_when_content_type_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/sprites/1.gif"))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GIF89a".to_vec()))
      .mount(&server)
      .await;
    let client = HttpCatalogClient::new(&CatalogConfig {
      url: server.uri(),
      ..CatalogConfig::default()
    })
    .unwrap();
    let embedder = DataUriEmbedder::new(Arc::new(client));

    let embedded = embedder
      .embed(&format!("{}/sprites/1.gif", server.uri()))
      .await;

    assert_eq!(embedded, "data:image/gif;base64,R0lGODlh");
  }

  #[tokio::test]
  async fn test_non_image_response_keeps_remote_uri() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
      .respond_with(
        ResponseTemplate::new(200)
          .insert_header("content-type", "text/html")
          .set_body_string("<html>blocked</html>"),
      )
      .mount(&server)
      .await;
    let client = HttpCatalogClient::new(&CatalogConfig {
      url: server.uri(),
      ..CatalogConfig::default()
    })
    .unwrap();
    let embedder = DataUriEmbedder::new(Arc::new(client));
    let uri = format!("{}/sprites/1.png", server.uri());

    assert_eq!(embedder.embed(&uri).await, uri);
  }
}
