//! Ordered, data-driven field extraction from a product card.
//!
//! A [`FieldSpec`] lists strategies; [`resolve`] tries them in order and
//! returns the first candidate accepted by the caller's check. A strategy
//! that errors or runs past its budget counts as having produced nothing.

use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;

use crate::browser::{NodeHandle, Tab};

/// Anchor pattern of product links on the catalog.
pub const PRODUCT_LINK: &str = "a[href*='/th/p/']";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// Attribute of the card node itself.
    Attribute { name: String },
    /// Attribute of the first descendant matching `css`.
    DescendantAttribute { css: String, name: String },
    /// Text of the first descendant matching `css`.
    DescendantText { css: String },
    /// Rendered text of the whole card, tried line by line.
    RenderedLines,
}

impl Strategy {
    pub fn attribute(name: &str) -> Self {
        Strategy::Attribute {
            name: name.to_string(),
        }
    }

    pub fn descendant_attribute(css: &str, name: &str) -> Self {
        Strategy::DescendantAttribute {
            css: css.to_string(),
            name: name.to_string(),
        }
    }

    pub fn descendant_text(css: &str) -> Self {
        Strategy::DescendantText {
            css: css.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub strategies: Vec<Strategy>,
}

impl FieldSpec {
    /// Product name on a listing card: link labels first, then title-ish
    /// nodes, image alt text, and finally the card's rendered lines.
    pub fn product_name() -> Self {
        let mut strategies = vec![
            Strategy::attribute("aria-label"),
            Strategy::attribute("title"),
            Strategy::descendant_attribute(PRODUCT_LINK, "aria-label"),
            Strategy::descendant_attribute(PRODUCT_LINK, "title"),
            Strategy::descendant_text(&format!("{PRODUCT_LINK} h3")),
            Strategy::descendant_text(&format!("{PRODUCT_LINK} [class*='title']")),
        ];
        strategies.extend(
            [
                "[data-testid*='title']",
                "[class*='title']",
                "h3",
                "h2",
                ".name",
                ".product-name",
            ]
            .into_iter()
            .map(Strategy::descendant_text),
        );
        strategies.push(Strategy::descendant_attribute("img", "alt"));
        strategies.push(Strategy::RenderedLines);
        Self { strategies }
    }

    /// Product link of a listing card. Cards may be the anchor themselves.
    pub fn product_url() -> Self {
        Self {
            strategies: vec![
                Strategy::attribute("href"),
                Strategy::descendant_attribute(PRODUCT_LINK, "href"),
                Strategy::descendant_attribute("a[href]", "href"),
            ],
        }
    }
}

async fn candidates(
    tab: &dyn Tab,
    node: &NodeHandle,
    strategy: &Strategy,
) -> anyhow::Result<Vec<String>> {
    let value = match strategy {
        Strategy::Attribute { name } => tab.attribute(node, name).await?,
        Strategy::DescendantAttribute { css, name } => {
            tab.attribute(&node.descendant(css), name).await?
        }
        Strategy::DescendantText { css } => tab.text(&node.descendant(css)).await?,
        Strategy::RenderedLines => {
            let lines = tab.inner_text(node).await?.unwrap_or_default();
            return Ok(lines.lines().map(str::to_string).collect());
        }
    };
    Ok(value.into_iter().collect())
}

/// Returns the first trimmed candidate that `accept` approves.
pub async fn resolve(
    tab: &dyn Tab,
    node: &NodeHandle,
    spec: &FieldSpec,
    accept: impl Fn(&str) -> bool,
    step_budget: Duration,
) -> Option<String> {
    for strategy in &spec.strategies {
        match timeout(step_budget, candidates(tab, node, strategy)).await {
            Ok(Ok(values)) => {
                if let Some(found) = values
                    .iter()
                    .map(|v| v.trim())
                    .find(|v| !v.is_empty() && accept(v))
                {
                    return Some(found.to_string());
                }
            }
            Ok(Err(e)) => debug!(?strategy, error = %e, "extraction strategy failed"),
            Err(_) => debug!(?strategy, "extraction strategy timed out"),
        }
    }
    None
}
