use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use feedsync::config::Config;
use feedsync::feed::HttpFetcher;
use feedsync::storage::{Database, Feed};
use feedsync::sync::{BatchUpdateOutcome, FeedSyncEngine, SyncProgress};

/// Get the config directory path (~/.config/feedsync/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedsync"))
}

#[derive(Parser, Debug)]
#[command(name = "feedsync", version, about = "Keep a local store of RSS/Atom feeds in sync")]
struct Args {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ~/.config/feedsync/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a feed and fetch its current articles
    Add { url: String },
    /// Refresh a single feed
    Update { feed_id: i64 },
    /// Refresh every feed in registration order
    UpdateAll,
    /// List subscribed feeds with article counts
    List,
    /// Unsubscribe from a feed and delete its articles
    Remove { feed_id: i64 },
}

#[derive(Serialize)]
struct FeedListing {
    #[serde(flatten)]
    feed: Feed,
    total: i64,
    unread: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let (config_dir, config_path) = match &args.config {
        Some(path) => (
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
            path.clone(),
        ),
        None => {
            let dir = get_config_dir()?;
            let path = dir.join("config.toml");
            (dir, path)
        }
    };

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.database_path(&config_dir);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create data directory {}", parent.display())
        })?;
    }
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = Database::open(db_path_str)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let fetcher =
        HttpFetcher::new(config.fetcher_config()).context("Failed to build HTTP client")?;
    let engine = FeedSyncEngine::new(db, fetcher);

    match args.command {
        Command::Add { url } => {
            let added = engine.add_feed(&url).await?;
            if args.json {
                print_json(&added)?;
            } else {
                println!(
                    "Added feed {} \"{}\" with {} articles",
                    added.feed.id, added.feed.title, added.articles_count
                );
            }
        }
        Command::Update { feed_id } => {
            let result = engine.update_feed(feed_id).await?;
            if args.json {
                print_json(&result)?;
            } else {
                println!(
                    "Feed {}: {} new, {} updated, {} in feed",
                    result.feed_id,
                    result.new_articles_count,
                    result.updated_articles_count,
                    result.total_articles_count
                );
            }
        }
        Command::UpdateAll => {
            let json = args.json;
            let reporter = move |p: &SyncProgress| {
                if !json {
                    println!("[{}/{}] {}", p.current_index, p.total_feeds, p.feed_title);
                }
            };
            let outcome = engine
                .update_all_feeds_cancellable(&reporter, CancellationToken::new())
                .await?;
            if json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
        }
        Command::List => {
            let db = engine.database();
            let feeds = db.list_feeds().await?;
            let counts = db.feed_article_counts().await?;
            let listings: Vec<FeedListing> = feeds
                .into_iter()
                .map(|feed| {
                    let c = counts.iter().find(|c| c.feed_id == feed.id);
                    FeedListing {
                        total: c.map_or(0, |c| c.total),
                        unread: c.map_or(0, |c| c.unread),
                        feed,
                    }
                })
                .collect();

            if args.json {
                print_json(&listings)?;
            } else if listings.is_empty() {
                println!("No feeds. Add one with: feedsync add <URL>");
            } else {
                for l in &listings {
                    let status = l.feed.error.as_deref().map_or(String::new(), |e| {
                        format!("  [error: {}]", e)
                    });
                    println!(
                        "{:>4}  {}  ({} unread / {}){}\n      {}",
                        l.feed.id, l.feed.title, l.unread, l.total, status, l.feed.url
                    );
                }
            }
        }
        Command::Remove { feed_id } => {
            let db = engine.database();
            let feed = db
                .find_feed_by_id(feed_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Feed {} not found", feed_id))?;
            let removed = db.delete_feed(feed_id).await?;
            if args.json {
                print_json(&serde_json::json!({
                    "feed_id": feed.id,
                    "url": feed.url,
                    "articles_removed": removed,
                }))?;
            } else {
                println!("Removed \"{}\" and {} articles", feed.title, removed);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(outcome: &BatchUpdateOutcome) {
    match outcome {
        BatchUpdateOutcome::Cancelled {
            processed_feeds,
            total_feeds,
        } => println!("Cancelled after {}/{} feeds", processed_feeds, total_feeds),
        BatchUpdateOutcome::Completed {
            summary,
            successful,
            failed,
        } => {
            let new: usize = successful.iter().map(|r| r.new_articles_count).sum();
            let updated: usize = successful.iter().map(|r| r.updated_articles_count).sum();
            println!(
                "Refreshed {}/{} feeds: {} new, {} updated articles",
                summary.success_count, summary.total_feeds, new, updated
            );
            for f in failed {
                eprintln!("  failed: {} ({}): {}", f.feed_id, f.feed_url, f.error);
            }
        }
    }
}
