use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use std::io::stdout;
use std::sync::Arc;

use crate::catalog::{
  CachedCatalogClient, CatalogClient, CatalogEntity, EntityId, HttpCatalogClient,
};
use crate::collection::{CollectionCache, MembershipSet, MutationOutcome};
use crate::config::Config;
use crate::db::{OwnedRecord, SqliteStore};
use crate::feed::DiscoveryFeed;
use crate::image::DataUriEmbedder;
use crate::resolver::{DetailView, ViewContext};
use crate::search::SearchIndex;
use crate::share::{self, Osc52Clipboard, SystemClipboard};

type Catalog = CachedCatalogClient<HttpCatalogClient>;
type Collection = CollectionCache<SqliteStore, DataUriEmbedder<HttpCatalogClient>>;

/// Main application state
pub struct App {
  /// Application configuration
  config: Config,

  /// Catalog client shared by search, feed and detail views
  catalog: Arc<Catalog>,

  /// Durable collection, read directly by detail views
  store: Arc<SqliteStore>,

  /// Owned collection
  collection: Collection,

  /// Session name index
  search: SearchIndex<Catalog>,
}

impl App {
  pub async fn new(config: Config) -> Result<Self> {
    let http = HttpCatalogClient::new(&config.catalog)?;
    let catalog = Arc::new(CachedCatalogClient::new(
      http.clone(),
      Duration::seconds(config.catalog.detail_cache_secs),
    ));

    let store = Arc::new(SqliteStore::open(&config.store_path()?)?);
    let embedder = Arc::new(DataUriEmbedder::new(Arc::new(http)));
    let collection = CollectionCache::new(store.clone(), embedder);
    collection.initialize().await;

    let search = SearchIndex::new(catalog.clone(), config.search.clone());

    Ok(Self {
      config,
      catalog,
      store,
      collection,
      search,
    })
  }

  /// Print up to `pages` pages of the discovery feed.
  pub async fn feed(&self, pages: usize) -> Result<()> {
    let mut feed = DiscoveryFeed::new(self.catalog.clone(), self.config.feed.page_size);

    for _ in 0..pages {
      let Some(page) = feed.load_next().await? else {
        break;
      };
      let owned = self.collection.members();
      for entity in &page.entities {
        println!("{}", entity_line(&owned, entity));
      }
      if page.dropped > 0 {
        println!("  ({} entries could not be loaded)", page.dropped);
      }
    }

    if !feed.has_more() {
      println!("-- end of catalog --");
    }
    println!("{} loaded", feed.items().len());
    Ok(())
  }

  /// Print matches for `query`, loading `pages` pages.
  pub async fn search(&self, query: &str, pages: usize) -> Result<()> {
    let mut view = self
      .search
      .search(query)
      .await
      .unwrap_or_else(|_| self.search.view());
    for _ in 1..pages {
      if view.error.is_some() || !self.search.load_more() {
        break;
      }
      view = self
        .search
        .refresh()
        .await
        .unwrap_or_else(|_| self.search.view());
    }

    if let Some(error) = &view.error {
      return Err(eyre!("Search failed: {}", error));
    }

    if !view.searching {
      println!(
        "Type at least {} characters to search.",
        self.config.search.min_query_len
      );
      return Ok(());
    }

    let owned = self.collection.members();
    for entity in &view.results {
      println!("{}", entity_line(&owned, entity));
    }
    println!(
      "showing {} of {} matches (page {})",
      view.results.len(),
      view.total,
      view.page
    );
    Ok(())
  }

  /// Print the detail view for `id`.
  pub async fn show(&self, id: EntityId, shared_at: Option<&str>) -> Result<()> {
    let marker = shared_at.map(share::parse_shared_marker).transpose()?;

    let mut view = DetailView::open(self.catalog.clone(), self.store.clone(), id, marker);
    view.settle().await;
    if view.retry() {
      view.settle().await;
    }

    let resolution = view.resolution();
    if let Some(error) = &resolution.error {
      return Err(eyre!("Could not load #{}: {}", view.id(), error));
    }
    let Some(shown) = &resolution.entity else {
      println!("#{} is not available right now.", view.id());
      return Ok(());
    };

    let entity = shown.entity();
    let stats = &entity.stats;
    println!("#{:03} {}", entity.id, shown.name());
    println!("types:   {}", entity.types.join(", "));
    println!("height:  {}  weight: {}", entity.height, entity.weight);
    println!(
      "stats:   hp {} / atk {} / def {} / sp.atk {} / sp.def {} / spd {}",
      stats.hp,
      stats.attack,
      stats.defense,
      stats.special_attack,
      stats.special_defense,
      stats.speed
    );
    println!("image:   {}", abbreviate(shown.image()));
    match resolution.context {
      ViewContext::Shared => println!("shared capture"),
      ViewContext::Owner => println!("in your collection"),
      ViewContext::Discovery => {}
    }
    if let Some(captured_at) = resolution.captured_at {
      println!("captured {}", captured_at.format("%Y-%m-%d %H:%M"));
    }
    if let Some(note) = shown.note() {
      println!("note:    {}", note);
    }
    Ok(())
  }

  pub async fn capture(&self, id: EntityId) -> Result<()> {
    if self.collection.is_owned(id) {
      println!("#{} is already in your collection.", id);
      return Ok(());
    }

    let entity = self.catalog.get_by_id(id).await?;
    let outcome = self.collection.capture(&entity).await;
    report(outcome, &format!("Captured {}", entity.name))
  }

  pub async fn release(&self, ids: &[EntityId]) -> Result<()> {
    let outcome = self.collection.release(ids).await;
    report(outcome, &format!("Released {} entries", ids.len()))
  }

  pub async fn note(&self, id: EntityId, text: &str) -> Result<()> {
    let outcome = self.collection.update_annotation(id, text).await;
    report(outcome, "Note saved")
  }

  /// Print the owned collection, optionally limited to one category.
  pub async fn collection(&self, type_filter: Option<&str>) -> Result<()> {
    if !self.collection.is_initialized() {
      return Err(eyre!("Collection could not be loaded; see the log for details"));
    }

    let records: Vec<OwnedRecord> = match type_filter {
      Some(type_name) => self.collection.records_of_type(type_name).await?,
      None => self.collection.records().await?,
    };

    let owned = self.collection.members();
    for record in &records {
      println!(
        "{}  {}{}",
        entity_line(&owned, &record.entity),
        record.captured_at.format("%Y-%m-%d"),
        record
          .note
          .as_deref()
          .map(|n| format!("  \"{}\"", n))
          .unwrap_or_default()
      );
    }
    println!("{} owned", records.len());
    Ok(())
  }

  /// Print (and optionally copy) a share link for `id`.
  pub async fn share(&self, id: EntityId, copy: bool) -> Result<()> {
    let captured_at = self.collection.record(id).await?.map(|r| r.captured_at);
    let link = share::share_link(&self.config.share.base_url, id, captured_at)?;
    println!("{}", link);

    if copy {
      let fallback = Osc52Clipboard::new(stdout());
      if share::copy_text(Some(&SystemClipboard), &fallback, link.as_str()) {
        println!("Copied to clipboard.");
      } else {
        println!("Could not copy to clipboard.");
      }
    }
    Ok(())
  }
}

fn report(outcome: MutationOutcome, success: &str) -> Result<()> {
  match outcome {
    MutationOutcome::Applied => println!("{}", success),
    MutationOutcome::Skipped => println!("Nothing to do."),
    MutationOutcome::RolledBack | MutationOutcome::Failed => {
      return Err(eyre!("Change was not saved; see the log for details"))
    }
  }
  Ok(())
}

/// Data URIs are long; show just their header.
fn abbreviate(image: &str) -> String {
  match image.split_once(',') {
    Some((header, payload)) if image.starts_with("data:") => {
      format!("{},… ({} bytes embedded)", header, payload.len())
    }
    _ => image.to_string(),
  }
}

fn entity_line(owned: &MembershipSet, entity: &CatalogEntity) -> String {
  let marker = if owned.contains(&entity.id) {
    "●"
  } else {
    " "
  };
  format!(
    "{} #{:03} {:<16} [{}]",
    marker,
    entity.id,
    entity.name,
    entity.types.join("/")
  )
}
