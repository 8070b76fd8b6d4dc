use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use criticizer::config::DEFAULT_CONFIG_PATH;
use criticizer::{server, AppState, Config, ReviewCache, RtClient, Store};

#[derive(Parser)]
#[command(name = "criticizer")]
#[command(about = "Movie search and review cache backed by a review-aggregation API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration file
    #[arg(long, env = "CRITICIZER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Database URL (overrides store.database_url)
    #[arg(long, env = "CRITICIZER_DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Print the raw search result for a title
    Search {
        title: String,
    },

    /// Cache a title's reviews unless already cached
    Fetch {
        title: String,
    },

    /// Show how many movies, critics and reviews are cached
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("criticizer=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(url) = cli.database_url {
        config.store.database_url = url;
    }

    let cache = build_cache(&config).await?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let listener = TcpListener::bind(&bind)
                .await
                .with_context(|| format!("Failed to bind {}", bind))?;

            server::serve(listener, AppState::new(cache))
                .await
                .context("HTTP server failed")?;
        }
        Commands::Search { title } => {
            let result = cache
                .client()
                .search(&title)
                .await
                .with_context(|| format!("Search failed for {}", title))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Fetch { title } => {
            match cache
                .ensure_cached(&title)
                .await
                .with_context(|| format!("Failed to cache {}", title))?
            {
                Some(summary) => println!(
                    "Cached {}: {} reviews, {} new critics",
                    title, summary.reviews, summary.critics_created
                ),
                None => println!("{} is already cached", title),
            }
        }
        Commands::Stats => {
            let stats = cache.store().stats().await?;
            println!("Movies:  {}", stats.movies);
            println!("Critics: {}", stats.critics);
            println!("Reviews: {}", stats.reviews);
        }
    }

    Ok(())
}

async fn build_cache(config: &Config) -> Result<ReviewCache> {
    let store = Store::connect(&config.store.database_url, config.store.max_connections)
        .await
        .with_context(|| format!("Failed to open store: {}", config.store.database_url))?;
    store.migrate().await.context("Failed to migrate store")?;

    let client = RtClient::from_config(&config.api_key, &config.remote);

    info!(base_url = %config.remote.base_url, "Review API client ready");

    Ok(ReviewCache::new(client, store))
}
