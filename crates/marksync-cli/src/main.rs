//! marksync CLI
//!
//! Thin wrapper around marksync-core for command-line usage.
//!
//! ## Usage
//!
//! ```bash
//! # Add a bookmark
//! marksync add --owner alice "Docs" https://docs.example
//!
//! # List bookmarks, newest first
//! marksync list --owner alice
//!
//! # Delete a bookmark
//! marksync delete --owner alice <bookmark_id>
//!
//! # Watch several tabs converge over an in-process bus
//! marksync simulate --owner alice --tabs 3 --no-echo
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marksync_core::{
    Bookmark, BookmarkId, BookmarkStore, BookmarkSync, BusConfig, EngineConfig, LocalBus,
    MemoryStore, OwnerId, RedbStore,
};

/// How long `simulate` waits for every tab to see a change
const CONVERGE_TIMEOUT: Duration = Duration::from_secs(5);

/// marksync - cross-tab bookmark sync
#[derive(Parser)]
#[command(name = "marksync")]
#[command(version = "0.1.0")]
#[command(about = "marksync - cross-tab bookmark sync")]
#[command(
    long_about = "Keeps every open session's bookmark list in step through a durable store and a per-user broadcast channel."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.marksync/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Keep bookmarks in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a bookmark
    Add {
        /// Owner (user) id
        #[arg(short, long)]
        owner: String,

        /// Bookmark title
        title: String,

        /// Bookmark URL
        url: String,
    },

    /// List bookmarks, newest first
    List {
        /// Owner (user) id
        #[arg(short, long)]
        owner: String,
    },

    /// Delete a bookmark
    Delete {
        /// Owner (user) id
        #[arg(short, long)]
        owner: String,

        /// Bookmark id (ULID)
        bookmark_id: String,
    },

    /// Run several tabs over one in-process bus and show them converge
    Simulate {
        /// Owner (user) id
        #[arg(short, long)]
        owner: String,

        /// Number of tabs
        #[arg(short, long, default_value = "2", value_parser = clap::value_parser!(u8).range(1..=16))]
        tabs: u8,

        /// Do not deliver a tab's own broadcasts back to it
        #[arg(long)]
        no_echo: bool,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Get the default data directory (~/.marksync/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".marksync")
        .join("data")
}

fn load_config(cli: &Cli, data_dir: &Path) -> Result<EngineConfig> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load_or_default(data_dir.join("config.json"))?,
    };
    Ok(config)
}

fn open_store(
    cli: &Cli,
    data_dir: &Path,
    config: &EngineConfig,
) -> Result<Arc<dyn BookmarkStore>> {
    if cli.ephemeral {
        return Ok(Arc::new(MemoryStore::new()));
    }
    let path = data_dir.join(&config.data_file);
    let store = RedbStore::open(&path)
        .with_context(|| format!("Failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}

fn parse_owner(s: &str) -> Result<OwnerId> {
    OwnerId::parse(s).map_err(|e| anyhow::anyhow!("Invalid owner: {}", e))
}

fn parse_bookmark_id(s: &str) -> Result<BookmarkId> {
    BookmarkId::from_string(s).map_err(|e| anyhow::anyhow!("Invalid bookmark ID '{}': {}", s, e))
}

fn format_created(bookmark: &Bookmark) -> String {
    chrono::DateTime::from_timestamp_millis(bookmark.created_at)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| bookmark.created_at.to_string())
}

/// Open one engine over the configured store and a private bus
async fn open_engine(
    store: Arc<dyn BookmarkStore>,
    config: &EngineConfig,
    owner: OwnerId,
) -> Result<BookmarkSync> {
    let bus = Arc::new(LocalBus::new(config.bus.clone()));
    let engine = BookmarkSync::with_config(store, bus, config);
    engine.initialize(owner).await?;
    Ok(engine)
}

fn print_views(tabs: &[BookmarkSync]) {
    for (n, tab) in tabs.iter().enumerate() {
        let titles: Vec<String> = tab.bookmarks().into_iter().map(|b| b.title).collect();
        println!("  Tab {} ({}): [{}]", n + 1, tab.session_id(), titles.join(", "));
    }
}

/// Wait until `condition` holds for every tab
async fn converge(tabs: &[BookmarkSync], condition: impl Fn(&BookmarkSync) -> bool) -> Result<()> {
    let deadline = tokio::time::Instant::now() + CONVERGE_TIMEOUT;
    while !tabs.iter().all(&condition) {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("Tabs did not converge within {:?}", CONVERGE_TIMEOUT);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config = load_config(&cli, &data_dir)?;
    let store = open_store(&cli, &data_dir, &config)?;
    tracing::debug!(data_dir = %data_dir.display(), ephemeral = cli.ephemeral, "Store ready");

    match &cli.command {
        Commands::Add { owner, title, url } => {
            let engine = open_engine(store, &config, parse_owner(owner)?).await?;
            let bookmark = engine.add_bookmark(title, url).await?;
            engine.shutdown().await;

            println!("Added bookmark: {}", bookmark.title);
            println!("  ID: {}", bookmark.id);
            println!("  URL: {}", bookmark.url);
        }

        Commands::List { owner } => {
            let engine = open_engine(store, &config, parse_owner(owner)?).await?;
            let bookmarks = engine.bookmarks();
            engine.shutdown().await;

            if bookmarks.is_empty() {
                println!("No bookmarks found.");
            } else {
                println!("Bookmarks ({}):", bookmarks.len());
                println!();
                for bookmark in bookmarks {
                    println!("  {} {}", bookmark.id, bookmark.title);
                    println!("      {}", bookmark.url);
                    println!("      Created: {}", format_created(&bookmark));
                }
            }
        }

        Commands::Delete { owner, bookmark_id } => {
            let id = parse_bookmark_id(bookmark_id)?;
            let engine = open_engine(store, &config, parse_owner(owner)?).await?;
            let was_visible = engine.contains(&id);
            engine.delete_bookmark(id).await?;
            engine.shutdown().await;

            if was_visible {
                println!("Deleted bookmark: {}", id);
            } else {
                println!("Bookmark not found (nothing to delete): {}", id);
            }
        }

        Commands::Simulate {
            owner,
            tabs,
            no_echo,
        } => {
            let owner = parse_owner(owner)?;
            let bus = Arc::new(LocalBus::new(BusConfig {
                echo_to_publisher: !no_echo,
                ..config.bus.clone()
            }));

            let mut views = Vec::with_capacity(*tabs as usize);
            for _ in 0..*tabs {
                let tab = BookmarkSync::with_config(store.clone(), bus.clone(), &config);
                tab.initialize(owner.clone()).await?;
                views.push(tab);
            }

            println!(
                "Simulating {} tab(s) for {} (echo: {})",
                views.len(),
                owner,
                if *no_echo { "off" } else { "on" }
            );
            println!();

            let docs = views[0].add_bookmark("Docs", "https://docs.example").await?;
            converge(&views, |tab| tab.contains(&docs.id)).await?;
            println!("After tab 1 adds \"{}\":", docs.title);
            print_views(&views);
            println!();

            let deleter = if views.len() > 1 { 1 } else { 0 };
            views[deleter].delete_bookmark(docs.id).await?;
            converge(&views, |tab| !tab.contains(&docs.id)).await?;
            println!("After tab {} deletes it:", deleter + 1);
            print_views(&views);

            for tab in &views {
                tab.shutdown().await;
            }
        }
    }

    Ok(())
}
