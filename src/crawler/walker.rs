use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::browser::{wait_for, Locator, NodeHandle, Tab};
use crate::crawler::fetcher::canonical_url;
use crate::crawler::models::{Category, ProductStub};
use crate::crawler::resolver::{self, FieldSpec, PRODUCT_LINK};
use crate::crawler::validity::NamePolicy;

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("no product cards found on {url}")]
    NoProductCardsFound { url: String },
    #[error("failed to open {url}: {reason}")]
    Navigation { url: String, reason: String },
}

/// Policy for one category page walk.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Site origin that relative hrefs are resolved against.
    pub origin: String,
    /// Tried in order; the first one present decides the page's cards.
    pub card_locators: Vec<Locator>,
    pub dismiss_locators: Vec<Locator>,
    pub title_warmup: Locator,
    pub card_wait: Duration,
    pub dismiss_wait: Duration,
    pub warmup_wait: Duration,
    pub scroll_pause: Duration,
    pub step_budget: Duration,
    /// Far-offscreen cards of the virtualized list are unreliable to read.
    pub card_cap: usize,
    pub name: FieldSpec,
    pub url: FieldSpec,
    pub name_policy: NamePolicy,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        let dismiss_phrases = ["Allow", "อนุญาต", "Accept", "ยอมรับ", "ตกลง"];
        let mut dismiss_locators: Vec<Locator> = dismiss_phrases
            .iter()
            .map(|phrase| Locator::xpath(format!("//button[contains(.,'{phrase}')]")))
            .collect();
        dismiss_locators.push(Locator::xpath("//*[@aria-label='close']"));
        dismiss_locators.push(Locator::xpath(
            "//*[contains(@class,'close') and (self::button or self::div)]",
        ));

        Self {
            origin: "https://www.bnn.in.th".to_string(),
            card_locators: vec![
                Locator::css("[data-testid*='product-card']"),
                Locator::css(format!("{PRODUCT_LINK}[class*='product']")),
                Locator::css(format!("li {PRODUCT_LINK}")),
            ],
            dismiss_locators,
            title_warmup: Locator::css("h3, [class*='title'], [data-testid*='title']"),
            card_wait: Duration::from_secs(15),
            dismiss_wait: Duration::from_secs(2),
            warmup_wait: Duration::from_secs(5),
            scroll_pause: Duration::from_millis(300),
            step_budget: Duration::from_secs(3),
            card_cap: 30,
            name: FieldSpec::product_name(),
            url: FieldSpec::product_url(),
            name_policy: NamePolicy::default(),
        }
    }
}

/// Clicks whatever popup or consent banner matches; absence is the norm.
pub async fn dismiss_overlays(tab: &dyn Tab, cfg: &WalkerConfig) {
    for locator in &cfg.dismiss_locators {
        if !wait_for(tab, locator, cfg.dismiss_wait).await {
            continue;
        }
        match tab.click(&NodeHandle::first(locator)).await {
            Ok(()) => {
                debug!(?locator, "dismissed overlay");
                sleep(Duration::from_millis(200)).await;
            }
            Err(e) => debug!(?locator, error = %e, "overlay not clickable"),
        }
    }
}

async fn find_card_locator(tab: &dyn Tab, cfg: &WalkerConfig) -> Option<Locator> {
    for locator in &cfg.card_locators {
        if wait_for(tab, locator, cfg.card_wait).await {
            return Some(locator.clone());
        }
        debug!(?locator, "card locator never matched");
    }
    None
}

/// Reads up to `card_cap` cards of a category page, in document order.
///
/// Cards without a resolvable link are dropped; a missing name is kept as
/// `None`. Duplicates are left for the caller.
pub async fn walk_category(
    tab: &mut dyn Tab,
    category: Category,
    url: &str,
    cfg: &WalkerConfig,
) -> Result<Vec<ProductStub>, WalkError> {
    tab.goto(url).await.map_err(|e| WalkError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let tab: &dyn Tab = tab;
    dismiss_overlays(tab, cfg).await;

    if !wait_for(tab, &cfg.title_warmup, cfg.warmup_wait).await {
        debug!(url, "no title nodes yet, reading cards anyway");
    }

    let locator = find_card_locator(tab, cfg)
        .await
        .ok_or_else(|| WalkError::NoProductCardsFound {
            url: url.to_string(),
        })?;

    dismiss_overlays(tab, cfg).await;

    let total = match tab.count(&locator).await {
        Ok(n) => n,
        Err(e) => {
            warn!(url, error = %e, "failed to count product cards");
            0
        }
    };
    info!(%category, ?locator, total, "product cards found");

    let mut stubs = Vec::new();
    for index in 0..total.min(cfg.card_cap) {
        let card = NodeHandle::nth(&locator, index);

        if let Err(e) = tab.scroll_into_view(&card).await {
            debug!(index, error = %e, "scroll failed");
        }
        sleep(cfg.scroll_pause).await;

        let name = resolver::resolve(
            tab,
            &card,
            &cfg.name,
            |s| cfg.name_policy.is_valid_name(s),
            cfg.step_budget,
        )
        .await;

        let href = resolver::resolve(
            tab,
            &card,
            &cfg.url,
            |s| canonical_url(&cfg.origin, s).is_some(),
            cfg.step_budget,
        )
        .await;

        match href.and_then(|h| canonical_url(&cfg.origin, &h)) {
            Some(product_url) => stubs.push(ProductStub::new(category, product_url, name)),
            None => debug!(index, "card without product link dropped"),
        }
    }

    Ok(stubs)
}
