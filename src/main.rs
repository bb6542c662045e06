mod app;
mod cache;
mod catalog;
mod collection;
mod config;
mod db;
mod feed;
mod image;
mod logging;
mod query;
mod resolver;
mod search;
mod share;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use catalog::EntityId;

#[derive(Parser, Debug)]
#[command(name = "dexkeep")]
#[command(about = "Keep a personal, offline-ready collection from a remote creature catalog")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/dexkeep/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Collection database path (overrides config)
  #[arg(long)]
  db: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Browse the catalog page by page
  Feed {
    /// Number of pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
  },
  /// Find entries whose name starts with QUERY
  Search {
    query: String,
    /// Number of result pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
  },
  /// Show one entry
  Show {
    id: EntityId,
    /// Capture timestamp from a shared link; shows the canonical entry
    #[arg(long)]
    shared_at: Option<String>,
  },
  /// Add an entry to your collection
  Capture { id: EntityId },
  /// Remove entries from your collection
  Release {
    #[arg(required = true)]
    ids: Vec<EntityId>,
  },
  /// Set the note on an owned entry (max 200 characters)
  Note { id: EntityId, text: String },
  /// List your collection
  Collection {
    /// Only entries with this type
    #[arg(short = 't', long = "type")]
    type_name: Option<String>,
  },
  /// Print a share link for an entry
  Share {
    id: EntityId,
    /// Also copy the link to the clipboard
    #[arg(long)]
    copy: bool,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override database path if specified on command line
  if let Some(db) = args.db {
    config.store.path = Some(db);
  }

  let _log_guard = logging::init(&config::Config::data_dir()?.join("logs"))?;

  let app = app::App::new(config).await?;

  match args.command {
    Command::Feed { pages } => app.feed(pages).await,
    Command::Search { query, pages } => app.search(&query, pages).await,
    Command::Show { id, shared_at } => app.show(id, shared_at.as_deref()).await,
    Command::Capture { id } => app.capture(id).await,
    Command::Release { ids } => app.release(&ids).await,
    Command::Note { id, text } => app.note(id, &text).await,
    Command::Collection { type_name } => app.collection(type_name.as_deref()).await,
    Command::Share { id, copy } => app.share(id, copy).await,
  }
}
