use chrono::Utc;
use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::crawler::enrich::EnrichConfig;
use crate::crawler::models::{Category, DetailRecord, ProductStub};
use crate::crawler::parser::DetailExtractor;
use crate::crawler::walker::{WalkError, WalkerConfig};

pub mod enrich;
pub mod fetcher;
pub mod models;
pub mod parser;
pub mod resolver;
pub mod service;
pub mod validity;
pub mod walker;

/// Walks a category page, drops repeated links and backfills missing names.
///
/// The walk uses its own tab, closed before enrichment opens its tabs.
pub async fn crawl_category(
    browser: &dyn Browser,
    category: Category,
    listing_url: &str,
    walker_cfg: &WalkerConfig,
    enrich_cfg: &EnrichConfig,
) -> Result<Vec<ProductStub>, WalkError> {
    let mut tab = browser.new_tab().await.map_err(|e| WalkError::Navigation {
        url: listing_url.to_string(),
        reason: e.to_string(),
    })?;
    let walked = walker::walk_category(tab.as_mut(), category, listing_url, walker_cfg).await;
    if let Err(e) = tab.close().await {
        debug!(error = %e, "failed to close listing tab");
    }

    let walked = walked?;
    let found = walked.len();
    let mut stubs = enrich::dedupe(walked);
    info!(%category, found, unique = stubs.len(), "listing walked");

    enrich::enrich(browser, &mut stubs, enrich_cfg).await;
    Ok(stubs)
}

/// Fetches the detail page of every stub in order. Failures stay in the
/// batch as error-tagged records.
pub async fn crawl_details(extractor: &DetailExtractor, stubs: &[ProductStub]) -> Vec<DetailRecord> {
    let mut results = Vec::with_capacity(stubs.len());

    for stub in stubs {
        info!(index = ?stub.index, url = %stub.url, "fetching detail page");
        let detail = extractor.fetch_detail(&stub.url).await;
        if detail.is_failure() {
            warn!(url = %stub.url, "detail kept as error record");
        }

        results.push(DetailRecord {
            source_name: stub.name.clone().unwrap_or_default(),
            url: stub.url.clone(),
            fetched_at: Utc::now(),
            detail,
        });
    }

    results
}
