use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::browser::{wait_for, Browser, Locator, NodeHandle, Tab};
use crate::crawler::models::ProductStub;

/// Stable first-seen-wins collapse keyed by canonical URL.
pub fn dedupe(stubs: Vec<ProductStub>) -> Vec<ProductStub> {
    let mut seen = HashSet::new();
    stubs
        .into_iter()
        .filter(|stub| seen.insert(stub.url.clone()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    pub heading: Locator,
    pub heading_wait: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            heading: Locator::css("h1.product-name"),
            heading_wait: Duration::from_secs(8),
        }
    }
}

async fn read_heading(tab: &mut dyn Tab, url: &str, cfg: &EnrichConfig) -> Result<Option<String>> {
    tab.goto(url).await?;
    if !wait_for(&*tab, &cfg.heading, cfg.heading_wait).await {
        return Ok(None);
    }
    let text = tab.text(&NodeHandle::first(&cfg.heading)).await?;
    Ok(text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()))
}

/// Opens `url` in its own tab and reads the title heading. The tab is closed
/// whether or not the read succeeded.
async fn heading_in_new_tab(browser: &dyn Browser, url: &str, cfg: &EnrichConfig) -> Result<Option<String>> {
    let mut tab = browser.new_tab().await?;
    let outcome = read_heading(tab.as_mut(), url, cfg).await;
    if let Err(e) = tab.close().await {
        warn!(url, error = %e, "failed to close enrichment tab");
    }
    outcome
}

/// Fills absent names from each product's own page. Stubs that already have
/// a name are never touched; a failed lookup leaves the name absent.
///
/// Returns how many names were filled.
pub async fn enrich(browser: &dyn Browser, stubs: &mut [ProductStub], cfg: &EnrichConfig) -> usize {
    let mut filled = 0;
    for stub in stubs.iter_mut().filter(|s| !s.has_name()) {
        match heading_in_new_tab(browser, &stub.url, cfg).await {
            Ok(Some(name)) => {
                debug!(url = %stub.url, %name, "name backfilled");
                stub.name = Some(name);
                filled += 1;
            }
            Ok(None) => debug!(url = %stub.url, "no title heading on product page"),
            Err(e) => warn!(url = %stub.url, error = %e, "enrichment failed"),
        }
    }
    if filled > 0 {
        info!(filled, "enrichment pass complete");
    }
    filled
}
