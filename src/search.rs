//! Two-phase name search over a catalog that has no search endpoint.
//!
//! The whole name index is pulled once per session, filtered in memory by
//! case-insensitive prefix, and only the visible page of matches is hydrated
//! into full entities.

use color_eyre::Result;
use futures::future::try_join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::catalog::{CatalogClient, CatalogEntity, NameIndexEntry};
use crate::config::SearchConfig;

/// What the search view currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchView {
  pub query: String,
  /// 1-based page count currently requested
  pub page: usize,
  /// False when the query is below the minimum length
  pub searching: bool,
  pub results: Vec<CatalogEntity>,
  /// Number of index entries matching the query
  pub total: usize,
  pub has_more: bool,
  pub error: Option<String>,
}

struct SearchState {
  /// Bumped on every query or page change; responses carry the value they started with
  generation: u64,
  view: SearchView,
}

pub struct SearchIndex<C> {
  client: Arc<C>,
  config: SearchConfig,
  index: OnceCell<Arc<Vec<NameIndexEntry>>>,
  state: Mutex<SearchState>,
}

impl<C: CatalogClient> SearchIndex<C> {
  pub fn new(client: Arc<C>, config: SearchConfig) -> Self {
    Self {
      client,
      config,
      index: OnceCell::new(),
      state: Mutex::new(SearchState {
        generation: 0,
        view: SearchView {
          page: 1,
          ..SearchView::default()
        },
      }),
    }
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, SearchState> {
    // State is only ever replaced wholesale, so a poisoned lock still holds a consistent value
    self
      .state
      .lock()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Current visible state.
  pub fn view(&self) -> SearchView {
    self.lock().view.clone()
  }

  /// Change the query. A different query resets paging to 1 and clears results
  /// so nothing from the previous query stays visible.
  pub fn set_query(&self, query: &str) {
    let mut state = self.lock();
    if state.view.query == query {
      return;
    }

    state.generation += 1;
    state.view = SearchView {
      query: query.to_string(),
      page: 1,
      searching: self.is_searchable(query),
      ..SearchView::default()
    };
  }

  /// Request one more page of matches. Returns `false` when there is nothing more.
  pub fn load_more(&self) -> bool {
    let mut state = self.lock();
    if !state.view.has_more {
      return false;
    }

    state.generation += 1;
    state.view.page += 1;
    true
  }

  fn is_searchable(&self, query: &str) -> bool {
    query.trim().chars().count() >= self.config.min_query_len
  }

  /// The session's name index, fetched on first use.
  async fn index(&self) -> Result<Arc<Vec<NameIndexEntry>>> {
    let index = self
      .index
      .get_or_try_init(|| async {
        let entries = self.client.list_page(self.config.index_limit, 0).await?;
        info!(count = entries.len(), "Loaded name index");
        Ok::<_, color_eyre::Report>(Arc::new(entries))
      })
      .await?;
    Ok(index.clone())
  }

  /// Run filter and hydration for the current query and page.
  ///
  /// The result is applied only if no newer query or page change happened
  /// meanwhile; a superseded run returns the current view untouched.
  pub async fn refresh(&self) -> Result<SearchView> {
    let (generation, query, page) = {
      let state = self.lock();
      (state.generation, state.view.query.clone(), state.view.page)
    };

    if !self.is_searchable(&query) {
      return Ok(self.view());
    }

    let outcome = self.run(&query, page).await;

    let mut state = self.lock();
    if state.generation != generation {
      debug!(query, page, "Discarding stale search response");
      return Ok(state.view.clone());
    }

    match outcome {
      Ok((results, total)) => {
        state.view.has_more = results.len() < total;
        state.view.results = results;
        state.view.total = total;
        state.view.error = None;
        Ok(state.view.clone())
      }
      Err(e) => {
        state.view.error = Some(format!("{:#}", e));
        Err(e)
      }
    }
  }

  /// Set the query and refresh in one step.
  pub async fn search(&self, query: &str) -> Result<SearchView> {
    self.set_query(query);
    self.refresh().await
  }

  async fn run(&self, query: &str, page: usize) -> Result<(Vec<CatalogEntity>, usize)> {
    let index = self.index().await?;
    let matches = filter_by_prefix(&index, query);
    let total = matches.len();

    let visible = matches.into_iter().take(self.config.page_size * page);
    let results = try_join_all(
      visible.map(|entry| self.client.get_by_reference(&entry.reference)),
    )
    .await?;

    Ok((results, total))
  }
}

/// Index entries whose name starts with `query`, ignoring case, in index order.
pub fn filter_by_prefix<'a>(index: &'a [NameIndexEntry], query: &str) -> Vec<&'a NameIndexEntry> {
  let needle = query.trim().to_lowercase();
  index
    .iter()
    .filter(|entry| entry.name.to_lowercase().starts_with(&needle))
    .collect()
}
