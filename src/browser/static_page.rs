//! Script-free browser over fetched HTML.
//!
//! Pages are fetched once per `goto` and re-parsed for every query, since a
//! parsed `scraper::Html` cannot be shared across tasks. XPath locators are
//! not supported; scrolling and clicking are no-ops.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use super::{normalize_whitespace, Browser, Locator, NodeHandle, Tab};
use crate::crawler::fetcher::Fetch;

pub struct StaticBrowser {
    fetcher: Arc<dyn Fetch>,
}

impl StaticBrowser {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl Browser for StaticBrowser {
    async fn new_tab(&self) -> Result<Box<dyn Tab>> {
        Ok(Box::new(StaticTab::new(Arc::clone(&self.fetcher))))
    }
}

pub struct StaticTab {
    fetcher: Arc<dyn Fetch>,
    html: String,
}

impl StaticTab {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self {
            fetcher,
            html: String::new(),
        }
    }

    fn with_node<T>(
        &self,
        node: &NodeHandle,
        read: impl FnOnce(ElementRef<'_>) -> T,
    ) -> Result<Option<T>> {
        let doc = Html::parse_document(&self.html);
        Ok(resolve(&doc, node)?.map(read))
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

fn css_of(locator: &Locator) -> Result<&str> {
    match locator {
        Locator::Css(css) => Ok(css),
        Locator::XPath(expr) => bail!("xpath locator {expr:?} needs a scripting browser"),
    }
}

fn resolve<'a>(doc: &'a Html, node: &NodeHandle) -> Result<Option<ElementRef<'a>>> {
    let selector = parse_selector(css_of(&node.locator)?)?;
    let Some(mut el) = doc.select(&selector).nth(node.index) else {
        return Ok(None);
    };

    for css in &node.path {
        let selector = parse_selector(css)?;
        match el.select(&selector).next() {
            Some(next) => el = next,
            None => return Ok(None),
        }
    }

    Ok(Some(el))
}

#[async_trait]
impl Tab for StaticTab {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.html = self.fetcher.fetch_html(url).await?;
        Ok(())
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        let selector = parse_selector(css_of(locator)?)?;
        let doc = Html::parse_document(&self.html);
        let n = doc.select(&selector).count();
        Ok(n)
    }

    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>> {
        Ok(self
            .with_node(node, |el| el.value().attr(name).map(str::to_string))?
            .flatten())
    }

    async fn text(&self, node: &NodeHandle) -> Result<Option<String>> {
        self.with_node(node, |el| {
            normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
        })
    }

    async fn inner_text(&self, node: &NodeHandle) -> Result<Option<String>> {
        self.with_node(node, |el| {
            el.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    async fn scroll_into_view(&self, _node: &NodeHandle) -> Result<()> {
        Ok(())
    }

    async fn click(&self, _node: &NodeHandle) -> Result<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
