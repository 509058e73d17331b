use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::error;

use theatre_scraper::constants;
use theatre_scraper::extract::Strategy;
use theatre_scraper::logging;
use theatre_scraper::pipeline;
use theatre_scraper::query::{self, FilterCriteria, SortMode};
use theatre_scraper::server::{start_server, AppState};
use theatre_scraper::storage::{FileStore, SnapshotStore};

#[derive(Parser)]
#[command(name = "theatre_scraper")]
#[command(about = "DFW regional theatre event listings aggregator")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the snapshot and sync endpoints over HTTP
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 8080)]
        port: u16,
        /// Directory holding the snapshot store
        #[arg(long)]
        data_dir: Option<String>,
        /// Extraction strategy for syncs triggered over HTTP
        #[arg(long, value_enum, default_value = "structured")]
        strategy: Strategy,
    },
    /// Fetch the listings page once and persist a fresh snapshot
    Sync {
        /// Directory holding the snapshot store
        #[arg(long)]
        data_dir: Option<String>,
        /// Extraction strategy for this run
        #[arg(long, value_enum, default_value = "structured")]
        strategy: Strategy,
    },
    /// Filter and sort the stored snapshot, the way the browser client does
    Query {
        /// Free-text search over title, venue, city, source, and category
        #[arg(long)]
        q: Option<String>,
        /// Inclusive range start (YYYY-MM-DD)
        #[arg(long)]
        start: Option<String>,
        /// Inclusive range end (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        city: Option<String>,
        #[arg(long, value_enum, default_value = "soonest")]
        sort: SortMode,
        /// Directory holding the snapshot store
        #[arg(long)]
        data_dir: Option<String>,
    },
}

fn upstream_url() -> String {
    std::env::var("THEATRE_UPSTREAM_URL")
        .unwrap_or_else(|_| constants::BROADWAY_WORLD_LISTINGS_URL.to_string())
}

fn data_dir_or_default(flag: Option<String>) -> String {
    flag.or_else(|| std::env::var("THEATRE_DATA_DIR").ok())
        .unwrap_or_else(|| "data".to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            data_dir,
            strategy,
        } => {
            let state = AppState {
                store: Arc::new(FileStore::new(data_dir_or_default(data_dir))),
                upstream_url: upstream_url(),
                strategy,
            };
            start_server(state, port).await?;
        }
        Commands::Sync { data_dir, strategy } => {
            println!("🔄 Syncing listings...");
            let store: Arc<dyn SnapshotStore> =
                Arc::new(FileStore::new(data_dir_or_default(data_dir)));
            match pipeline::run_sync(store, &upstream_url(), strategy).await {
                Ok(snapshot) => {
                    println!("✅ Synced {} events", snapshot.count);
                }
                Err(e) => {
                    error!("Sync failed: {}", e);
                    println!("❌ Sync failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::Query {
            q,
            start,
            end,
            source,
            category,
            city,
            sort,
            data_dir,
        } => {
            let store = FileStore::new(data_dir_or_default(data_dir));
            let snapshot = store.load().await?.unwrap_or_else(|| {
                println!("No snapshot stored yet; run `theatre_scraper sync` first.");
                theatre_scraper::types::Snapshot::empty()
            });

            let criteria = FilterCriteria {
                query: q,
                range_start: start,
                range_end: end,
                source,
                category,
                city,
                sort,
            };
            let visible = query::apply(&snapshot.events, &criteria);

            println!(
                "🎭 {} of {} events match",
                visible.len(),
                snapshot.count
            );
            for event in &visible {
                let dates = match (event.start_date.as_deref(), event.end_date.as_deref()) {
                    (Some(s), Some(e)) if s != e => format!("{s} – {e}"),
                    (Some(s), _) => s.to_string(),
                    (None, _) => "TBA".to_string(),
                };
                let place = [event.venue.as_deref(), event.city.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" • ");
                if place.is_empty() {
                    println!("   {} ({dates})", event.title);
                } else {
                    println!("   {} ({dates}) • {place}", event.title);
                }
            }
        }
    }
    Ok(())
}
