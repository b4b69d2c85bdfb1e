use tracing::{error, info, warn};

use crate::{
    browser::Browser,
    config::Config,
    crawler::{
        self,
        enrich::EnrichConfig,
        models::Category,
        parser::DetailExtractor,
        walker::{WalkError, WalkerConfig},
    },
    storage::{DetailStore, RecordStore},
};

pub struct ScrapingService {
    origin: String,
    walker: WalkerConfig,
    enrich: EnrichConfig,
    records: RecordStore,
    details: DetailStore,
}

impl ScrapingService {
    pub fn new(cfg: &Config) -> Self {
        Self {
            origin: cfg.origin.clone(),
            walker: cfg.walker(),
            enrich: EnrichConfig::default(),
            records: RecordStore::new(cfg.links_dir()),
            details: DetailStore::new(cfg.details_dir()),
        }
    }

    /// Crawls one category and appends its links. Returns rows written.
    pub async fn crawl_and_store(&self, browser: &dyn Browser, category: Category) -> anyhow::Result<usize> {
        let url = category.listing_url(&self.origin);
        let stubs = match crawler::crawl_category(browser, category, &url, &self.walker, &self.enrich).await {
            Ok(v) => v,
            Err(WalkError::NoProductCardsFound { url }) => {
                warn!(%category, url, "No product cards found");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let stored = self.records.append(category, &stubs)?;
        let named = stored.iter().filter(|s| s.has_name()).count();
        info!(%category, saved = stored.len(), named, "Category links saved");
        Ok(stored.len())
    }

    /// One category failing never stops the others.
    pub async fn run_listings(&self, browser: &dyn Browser, categories: &[Category]) -> anyhow::Result<usize> {
        let mut total_saved = 0usize;

        for &category in categories {
            info!(%category, "Processing category");
            match self.crawl_and_store(browser, category).await {
                Ok(saved) => {
                    total_saved += saved;
                    info!(%category, saved, total_saved, "Category done");
                }
                Err(e) => {
                    error!(%category, error = %e, "Failed to crawl category");
                }
            }
        }

        info!(total_saved, "DONE: all categories processed");
        Ok(total_saved)
    }

    /// Fetches details for every stored link and replaces each category's batch.
    pub async fn run_details(&self, extractor: &DetailExtractor, categories: &[Category]) -> anyhow::Result<usize> {
        let mut total = 0usize;

        for &category in categories {
            let stubs = match self.records.read_all(category) {
                Ok(v) if !v.is_empty() => v,
                Ok(_) => {
                    info!(%category, "No stored links");
                    continue;
                }
                Err(e) => {
                    error!(%category, error = %e, "Failed to read stored links");
                    continue;
                }
            };

            let batch = crawler::crawl_details(extractor, &stubs).await;
            let failed = batch.iter().filter(|r| r.detail.is_failure()).count();

            match self.details.save(category, &batch) {
                Ok(()) => {
                    total += batch.len();
                    info!(%category, records = batch.len(), failed, "Detail batch done");
                }
                Err(e) => {
                    error!(%category, error = %e, "Failed to save detail batch");
                }
            }
        }

        info!(total, "DONE: all detail batches written");
        Ok(total)
    }
}
