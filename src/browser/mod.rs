//! Browser abstraction used by the listing walker and the enrichment pass.
//!
//! Nodes are never held as live references. A [`NodeHandle`] names the
//! `index`-th match of a locator, optionally narrowed by descendant CSS
//! selectors, and every [`Tab`] operation re-resolves it. This keeps the
//! scripted (Chromium) and static (HTTP + `scraper`) implementations behind
//! one interface.

pub mod chromium;
pub mod static_page;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::{sleep, timeout};
use tracing::debug;

pub use chromium::ChromiumBrowser;
pub use static_page::StaticBrowser;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    pub locator: Locator,
    pub index: usize,
    pub path: Vec<String>,
}

impl NodeHandle {
    pub fn nth(locator: &Locator, index: usize) -> Self {
        Self {
            locator: locator.clone(),
            index,
            path: Vec::new(),
        }
    }

    pub fn first(locator: &Locator) -> Self {
        Self::nth(locator, 0)
    }

    /// First descendant of this node matching `css`.
    pub fn descendant(&self, css: &str) -> Self {
        let mut node = self.clone();
        node.path.push(css.to_string());
        node
    }
}

/// A browser engine that can open isolated tabs.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_tab(&self) -> Result<Box<dyn Tab>>;
}

/// One browsing context.
///
/// Reads on a node that does not resolve return `Ok(None)`; `Err` means the
/// operation itself failed.
#[async_trait]
pub trait Tab: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<()>;
    async fn count(&self, locator: &Locator) -> Result<usize>;
    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>>;
    /// Whitespace-normalized text content.
    async fn text(&self, node: &NodeHandle) -> Result<Option<String>>;
    /// Rendered text, one entry per visual line.
    async fn inner_text(&self, node: &NodeHandle) -> Result<Option<String>>;
    async fn scroll_into_view(&self, node: &NodeHandle) -> Result<()>;
    async fn click(&self, node: &NodeHandle) -> Result<()>;
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Polls until `locator` matches at least one element or `budget` runs out.
///
/// A failing query ends the wait early; it is reported as "not present".
pub async fn wait_for(tab: &dyn Tab, locator: &Locator, budget: Duration) -> bool {
    let poll = async {
        loop {
            match tab.count(locator).await {
                Ok(n) if n > 0 => return true,
                Ok(_) => sleep(POLL_INTERVAL).await,
                Err(e) => {
                    debug!(?locator, error = %e, "locator query failed");
                    return false;
                }
            }
        }
    };

    timeout(budget, poll).await.unwrap_or(false)
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
