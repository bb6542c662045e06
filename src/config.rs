use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub catalog: CatalogConfig,
  #[serde(default)]
  pub store: StoreConfig,
  #[serde(default)]
  pub search: SearchConfig,
  #[serde(default)]
  pub feed: FeedConfig,
  #[serde(default)]
  pub share: ShareConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
  /// Base URL of the catalog API (e.g., "https://pokeapi.co/api/v2/")
  pub url: String,
  /// Per-request timeout
  pub timeout_secs: u64,
  /// How long a fetched entity is served from memory before refetching
  pub detail_cache_secs: i64,
}

impl Default for CatalogConfig {
  fn default() -> Self {
    Self {
      url: "https://pokeapi.co/api/v2/".to_string(),
      timeout_secs: 15,
      detail_cache_secs: 300,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
  /// Collection database path (default: $XDG_DATA_HOME/dexkeep/collection.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  pub page_size: usize,
  /// Queries shorter than this never touch the network
  pub min_query_len: usize,
  /// Listing limit used to pull the whole name index in one request
  pub index_limit: usize,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      page_size: 20,
      min_query_len: 2,
      index_limit: 100_000,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
  pub page_size: usize,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self { page_size: 20 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
  /// Public base URL that share links point at
  pub base_url: String,
}

impl Default for ShareConfig {
  fn default() -> Self {
    Self {
      base_url: "https://dexkeep.app/".to_string(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dexkeep.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dexkeep/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found. `DEXKEEP_CATALOG_URL`
  /// overrides the catalog URL in every case.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var("DEXKEEP_CATALOG_URL") {
      config.catalog.url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("dexkeep.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dexkeep").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.search.page_size == 0 {
      return Err(eyre!("search.page_size must be at least 1"));
    }
    if self.feed.page_size == 0 {
      return Err(eyre!("feed.page_size must be at least 1"));
    }
    Ok(())
  }

  /// Directory holding the collection database and log files.
  pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("dexkeep"))
  }

  /// Resolved collection database path.
  pub fn store_path(&self) -> Result<PathBuf> {
    match &self.store.path {
      Some(path) => Ok(path.clone()),
      None => Ok(Self::data_dir()?.join("collection.db")),
    }
  }
}
