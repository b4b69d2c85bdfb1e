use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use catalog_relay::browser::{ChromiumBrowser, StaticBrowser};
use catalog_relay::chat::{server, ChatRouter};
use catalog_relay::config::Config;
use catalog_relay::crawler::fetcher::{Fetch, HttpFetcher};
use catalog_relay::crawler::models::Category;
use catalog_relay::crawler::parser::{DetailExtractor, DetailSelectors};
use catalog_relay::crawler::service::ScrapingService;
use catalog_relay::storage::{DetailStore, RecordStore};

#[derive(Parser, Debug)]
#[command(name = "catalog-relay", about = "Catalog crawler and chat retrieval service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Walk category listings and append product links.
    Crawl {
        /// Read listings as static HTML instead of driving Chromium.
        #[arg(long)]
        http_only: bool,
        /// Only this category (key, slug or chat word).
        #[arg(long)]
        category: Option<Category>,
    },
    /// Fetch every stored link and write the detail batches.
    Details {
        #[arg(long)]
        category: Option<Category>,
    },
    /// Answer chat webhooks.
    Serve {
        /// Overrides CATALOG_BIND.
        #[arg(long)]
        bind: Option<String>,
    },
}

fn categories(only: Option<Category>) -> Vec<Category> {
    only.map_or_else(|| Category::ALL.to_vec(), |c| vec![c])
}

fn extractor(cfg: &Config) -> anyhow::Result<DetailExtractor> {
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(cfg.fetch_timeout)?);
    DetailExtractor::new(fetcher, &DetailSelectors::default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("catalog_relay=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::from_env()?;

    match cli.command {
        Command::Crawl { http_only, category } => {
            let service = ScrapingService::new(&cfg);
            let categories = categories(category);
            if http_only {
                let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(cfg.fetch_timeout)?);
                let browser = StaticBrowser::new(fetcher);
                service.run_listings(&browser, &categories).await?;
            } else {
                let browser = ChromiumBrowser::launch(cfg.chrome_path.clone(), cfg.fetch_timeout).await?;
                let result = service.run_listings(&browser, &categories).await;
                browser.shutdown().await?;
                result?;
            }
        }
        Command::Details { category } => {
            let service = ScrapingService::new(&cfg);
            service
                .run_details(&extractor(&cfg)?, &categories(category))
                .await?;
        }
        Command::Serve { bind } => {
            let chat = ChatRouter::new(
                RecordStore::new(cfg.links_dir()),
                DetailStore::new(cfg.details_dir()),
                extractor(&cfg)?,
            );
            let bind = bind.unwrap_or_else(|| cfg.bind.clone());
            server::serve(&bind, Arc::new(chat))
                .await
                .context("webhook server stopped")?;
        }
    }

    Ok(())
}
