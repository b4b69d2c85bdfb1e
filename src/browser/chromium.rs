//! Headless Chromium driven through chromiumoxide.
//!
//! Every [`Tab`] operation is a single evaluated script that re-resolves the
//! node from its [`NodeHandle`].

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tracing::info;

use super::{normalize_whitespace, Browser, Locator, NodeHandle, Tab};

pub struct ChromiumBrowser {
    browser: CdpBrowser,
    nav_timeout: Duration,
}

impl ChromiumBrowser {
    /// Launches a headless Chromium. Without `chrome_path` chromiumoxide
    /// looks for an installed Chrome/Chromium itself.
    pub async fn launch(chrome_path: Option<PathBuf>, nav_timeout: Duration) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions");
        if let Some(path) = chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = CdpBrowser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        info!("headless Chromium started");
        Ok(Self {
            browser,
            nav_timeout,
        })
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.browser.close().await.context("failed to close Chromium")?;
        Ok(())
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_tab(&self) -> Result<Box<dyn Tab>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("failed to open tab")?;

        Ok(Box::new(ChromiumTab {
            page,
            nav_timeout: self.nav_timeout,
        }))
    }
}

pub struct ChromiumTab {
    page: Page,
    nav_timeout: Duration,
}

impl ChromiumTab {
    async fn eval(&self, script: String) -> Result<Value> {
        let result = self
            .page
            .evaluate(script.as_str())
            .await
            .context("script evaluation failed")?;

        result
            .into_value()
            .map_err(|e| anyhow!("failed to convert script result: {e:?}"))
    }

    /// Runs `body` against the node; `None` when the node does not resolve.
    async fn eval_on_node(&self, node: &NodeHandle, body: &str) -> Result<Option<Value>> {
        let result = self.eval(node_script(node, body)).await?;
        if result.get("found") == Some(&Value::Bool(true)) {
            Ok(Some(result.get("value").cloned().unwrap_or(Value::Null)))
        } else {
            Ok(None)
        }
    }

    async fn read_string(&self, node: &NodeHandle, body: &str) -> Result<Option<String>> {
        Ok(match self.eval_on_node(node, body).await? {
            Some(Value::String(s)) => Some(s),
            _ => None,
        })
    }
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn xpath_snapshot(expr: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null)",
        js_str(expr)
    )
}

fn node_script(node: &NodeHandle, body: &str) -> String {
    let root = match &node.locator {
        Locator::Css(css) => format!("document.querySelectorAll({})[{}]", js_str(css), node.index),
        Locator::XPath(expr) => format!("{}.snapshotItem({})", xpath_snapshot(expr), node.index),
    };

    let mut script = format!("(function() {{ let el = {root} || null;");
    for css in &node.path {
        script.push_str(&format!(" if (el) {{ el = el.querySelector({}); }}", js_str(css)));
    }
    script.push_str(" if (!el) { return {found: false}; } const value = (function(el) { ");
    script.push_str(body);
    script.push_str(" })(el); return {found: true, value: value === undefined ? null : value}; })()");
    script
}

#[async_trait]
impl Tab for ChromiumTab {
    async fn goto(&mut self, url: &str) -> Result<()> {
        match tokio::time::timeout(self.nav_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => bail!("navigation to {url} failed: {e}"),
            Err(_) => bail!("navigation to {url} timed out after {:?}", self.nav_timeout),
        }
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        let script = match locator {
            Locator::Css(css) => format!("document.querySelectorAll({}).length", js_str(css)),
            Locator::XPath(expr) => format!("{}.snapshotLength", xpath_snapshot(expr)),
        };
        let value = self.eval(script).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| anyhow!("unexpected count result: {value}"))
    }

    async fn attribute(&self, node: &NodeHandle, name: &str) -> Result<Option<String>> {
        let body = format!("return el.getAttribute({});", js_str(name));
        self.read_string(node, &body).await
    }

    async fn text(&self, node: &NodeHandle) -> Result<Option<String>> {
        let text = self.read_string(node, "return el.textContent || '';").await?;
        Ok(text.map(|t| normalize_whitespace(&t)))
    }

    async fn inner_text(&self, node: &NodeHandle) -> Result<Option<String>> {
        self.read_string(node, "return el.innerText || '';").await
    }

    async fn scroll_into_view(&self, node: &NodeHandle) -> Result<()> {
        let done = self
            .eval_on_node(node, "el.scrollIntoView({block: 'center'}); return true;")
            .await?;
        if done != Some(Value::Bool(true)) {
            bail!("node {node:?} is not attached");
        }
        Ok(())
    }

    async fn click(&self, node: &NodeHandle) -> Result<()> {
        let body = "const r = el.getBoundingClientRect(); \
                    if (el.disabled || r.width === 0 || r.height === 0) { return false; } \
                    el.click(); return true;";
        let clicked = self.eval_on_node(node, body).await?;
        if clicked != Some(Value::Bool(true)) {
            bail!("node {node:?} is not clickable");
        }
        Ok(())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.page.close().await.context("failed to close tab")?;
        Ok(())
    }
}
