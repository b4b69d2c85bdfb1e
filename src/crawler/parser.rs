use std::sync::Arc;

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::browser::normalize_whitespace;
use crate::crawler::fetcher::{absolute_url, Fetch};
use crate::crawler::models::ProductDetail;

/// CSS selectors of the product detail page. Each single-value field is an
/// ordered chain; the first selector producing text wins.
#[derive(Debug, Clone)]
pub struct DetailSelectors {
    pub container: String,
    pub title: Vec<String>,
    pub brand: Vec<String>,
    pub sku: Vec<String>,
    pub description: Vec<String>,
    pub spec_items: String,
    pub labels: String,
    pub images: String,
    pub price_container: String,
    pub selling_price: Vec<String>,
    pub list_price: Vec<String>,
    pub warranty: Vec<String>,
}

fn chain(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| s.to_string()).collect()
}

impl Default for DetailSelectors {
    fn default() -> Self {
        Self {
            container: "div.product-detail-summary".into(),
            title: chain(&["h1.product-name", "h1"]),
            brand: chain(&[".brand-value"]),
            sku: chain(&[".sku-number-value"]),
            description: chain(&[".product-short-description p"]),
            spec_items: ".product-short-description li".into(),
            labels: ".product-label-container img".into(),
            images: ".gallery-thumbs img".into(),
            price_container: ".product-price-container".into(),
            selling_price: chain(&[".selling-price"]),
            list_price: chain(&[".srp-price"]),
            warranty: chain(&[".product-warranty .caption"]),
        }
    }
}

fn compile(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid detail selector {css:?}: {e}"))
}

fn compile_chain(chain: &[String]) -> Result<Vec<Selector>> {
    chain.iter().map(|css| compile(css)).collect()
}

/// Detail page parser with pre-compiled selectors.
pub struct DetailParser {
    container: Selector,
    title: Vec<Selector>,
    brand: Vec<Selector>,
    sku: Vec<Selector>,
    description: Vec<Selector>,
    spec_items: Selector,
    labels: Selector,
    images: Selector,
    price_container: Selector,
    selling_price: Vec<Selector>,
    list_price: Vec<Selector>,
    warranty: Vec<Selector>,
}

fn element_text(el: ElementRef<'_>) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// First non-empty text for the chain. The whole chain is tried inside
/// `scope` before any selector is tried page-wide.
fn first_text(doc: &Html, scope: Option<ElementRef<'_>>, chain: &[Selector]) -> Option<String> {
    first_text_in(scope, chain).or_else(|| {
        chain
            .iter()
            .find_map(|selector| doc.select(selector).map(element_text).find(|t| !t.is_empty()))
    })
}

fn first_text_in(scope: Option<ElementRef<'_>>, chain: &[Selector]) -> Option<String> {
    let scope = scope?;
    chain
        .iter()
        .find_map(|selector| scope.select(selector).map(element_text).find(|t| !t.is_empty()))
}

impl DetailParser {
    pub fn new(selectors: &DetailSelectors) -> Result<Self> {
        Ok(Self {
            container: compile(&selectors.container)?,
            title: compile_chain(&selectors.title)?,
            brand: compile_chain(&selectors.brand)?,
            sku: compile_chain(&selectors.sku)?,
            description: compile_chain(&selectors.description)?,
            spec_items: compile(&selectors.spec_items)?,
            labels: compile(&selectors.labels)?,
            images: compile(&selectors.images)?,
            price_container: compile(&selectors.price_container)?,
            selling_price: compile_chain(&selectors.selling_price)?,
            list_price: compile_chain(&selectors.list_price)?,
            warranty: compile_chain(&selectors.warranty)?,
        })
    }

    /// Parses what the page offers; every field degrades on its own.
    pub fn parse(&self, html: &str, page_url: &str) -> ProductDetail {
        let doc = Html::parse_document(html);
        let summary = doc.select(&self.container).next();
        if summary.is_none() {
            debug!(page_url, "detail container missing, using page-wide selectors");
        }

        let mut detail = ProductDetail {
            title: first_text(&doc, summary, &self.title),
            brand: first_text(&doc, summary, &self.brand),
            sku: first_text(&doc, summary, &self.sku),
            description: first_text(&doc, summary, &self.description),
            warranty: first_text(&doc, summary, &self.warranty),
            ..ProductDetail::default()
        };

        for item in doc.select(&self.spec_items) {
            let text = element_text(item);
            if text.is_empty() {
                continue;
            }
            match text.split_once(':') {
                Some((label, value)) => {
                    detail.push_spec(label.trim().to_string(), Some(value.trim().to_string()))
                }
                None => detail.push_spec(text, None),
            }
        }

        detail.labels = doc
            .select(&self.labels)
            .filter_map(|img| img.value().attr("alt"))
            .map(str::trim)
            .filter(|alt| !alt.is_empty())
            .map(str::to_string)
            .collect();

        detail.images = doc
            .select(&self.images)
            .filter_map(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .filter_map(|src| absolute_url(page_url, src))
            .collect();

        let prices = doc
            .select(&self.price_container)
            .next()
            .or_else(|| summary.and_then(|s| s.select(&self.price_container).next()));
        detail.selling_price = first_text_in(prices, &self.selling_price);
        detail.list_price = first_text_in(prices, &self.list_price);

        detail
    }
}

/// Fetches and parses product pages on demand. Stateless per URL.
#[derive(Clone)]
pub struct DetailExtractor {
    fetcher: Arc<dyn Fetch>,
    parser: Arc<DetailParser>,
}

impl DetailExtractor {
    pub fn new(fetcher: Arc<dyn Fetch>, selectors: &DetailSelectors) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser: Arc::new(DetailParser::new(selectors)?),
        })
    }

    /// Never fails: a fetch error yields a record with only `error` set.
    pub async fn fetch_detail(&self, url: &str) -> ProductDetail {
        match self.fetcher.fetch_html(url).await {
            Ok(html) => self.parser.parse(&html, url),
            Err(e) => {
                warn!(url, error = %e, "detail fetch failed");
                ProductDetail::failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::crawler::fetcher::fixtures::MapFetcher;
    use crate::crawler::fetcher::HttpFetcher;
    use crate::crawler::models::SpecEntry;

    const PAGE_URL: &str = "https://www.bnn.in.th/th/p/acer-swift-go-14";

    const FULL_PAGE: &str = r#"
        <html><body>
          <div class="product-label-container">
            <img alt=" Flash Sale "><img alt=""><img src="x.png">
          </div>
          <div class="gallery-thumbs">
            <img src="https://cdn.bnn.in.th/acer-1.jpg">
            <img src="/media/acer-2.jpg">
            <img data-src="//cdn.bnn.in.th/acer-3.jpg">
          </div>
          <div class="product-detail-summary">
            <h1 class="product-name">Acer Swift Go 14 OLED</h1>
            <span class="brand-value">ACER</span>
            <span class="sku-number-value">NX.KF7ST.001</span>
            <div class="product-short-description">
              <p>Thin and light   laptop with OLED display</p>
              <ul>
                <li>CPU: Intel Core Ultra 5 125H</li>
                <li>Display : 14" 2.8K OLED 90Hz</li>
                <li>Windows 11 Home</li>
                <li>Time: 10:30 battery</li>
              </ul>
            </div>
            <div class="product-price-container">
              <span class="selling-price">฿29,990</span>
              <span class="srp-price">฿34,990</span>
            </div>
            <div class="product-warranty"><span class="caption">2 years onsite</span></div>
          </div>
        </body></html>"#;

    fn parser() -> DetailParser {
        DetailParser::new(&DetailSelectors::default()).unwrap()
    }

    #[test]
    fn parses_every_field() {
        let detail = parser().parse(FULL_PAGE, PAGE_URL);
        assert_eq!(detail.title.as_deref(), Some("Acer Swift Go 14 OLED"));
        assert_eq!(detail.brand.as_deref(), Some("ACER"));
        assert_eq!(detail.sku.as_deref(), Some("NX.KF7ST.001"));
        assert_eq!(detail.description.as_deref(), Some("Thin and light laptop with OLED display"));
        assert_eq!(detail.selling_price.as_deref(), Some("฿29,990"));
        assert_eq!(detail.list_price.as_deref(), Some("฿34,990"));
        assert_eq!(detail.warranty.as_deref(), Some("2 years onsite"));
        assert_eq!(detail.labels, ["Flash Sale"]);
        assert_eq!(
            detail.images,
            [
                "https://cdn.bnn.in.th/acer-1.jpg",
                "https://www.bnn.in.th/media/acer-2.jpg",
                "https://cdn.bnn.in.th/acer-3.jpg",
            ]
        );
        assert_eq!(detail.primary_image(), Some("https://cdn.bnn.in.th/acer-1.jpg"));
        assert!(!detail.is_failure());
    }

    #[test]
    fn specs_split_on_first_colon_and_keep_bare_lines() {
        let detail = parser().parse(FULL_PAGE, PAGE_URL);
        let entry = |label: &str, value: Option<&str>| SpecEntry {
            label: label.to_string(),
            value: value.map(str::to_string),
        };
        assert_eq!(
            detail.specs,
            vec![
                entry("CPU", Some("Intel Core Ultra 5 125H")),
                entry("Display", Some("14\" 2.8K OLED 90Hz")),
                entry("Windows 11 Home", None),
                entry("Time", Some("10:30 battery")),
            ]
        );
    }

    #[test]
    fn falls_back_to_page_wide_selectors_without_container() {
        let html = r#"
            <h1 class="product-name">Logitech G502 X</h1>
            <div class="brand-value">LOGITECH</div>
            <div class="product-price-container"><b class="selling-price">฿2,990</b></div>"#;
        let detail = parser().parse(html, PAGE_URL);
        assert_eq!(detail.title.as_deref(), Some("Logitech G502 X"));
        assert_eq!(detail.brand.as_deref(), Some("LOGITECH"));
        assert_eq!(detail.selling_price.as_deref(), Some("฿2,990"));
        assert_eq!(detail.list_price, None);
    }

    #[test]
    fn container_scope_wins_over_page_wide_match() {
        let html = r#"
            <div class="related"><h1 class="product-name">Recommended for you</h1></div>
            <div class="product-detail-summary"><h1 class="product-name">Razer BlackShark V2</h1></div>"#;
        let detail = parser().parse(html, PAGE_URL);
        assert_eq!(detail.title.as_deref(), Some("Razer BlackShark V2"));
    }

    #[test]
    fn later_scoped_selector_beats_earlier_page_wide_one() {
        let html = r#"
            <div class="related">
              <h1 class="product-name">Recommended for you</h1>
              <span class="brand-value">RAZER</span>
            </div>
            <div class="product-detail-summary"><h1>ASUS TUF A15</h1></div>"#;
        let detail = parser().parse(html, PAGE_URL);
        assert_eq!(detail.title.as_deref(), Some("ASUS TUF A15"));
        // Nothing in the container matches the brand chain, so the page is searched.
        assert_eq!(detail.brand.as_deref(), Some("RAZER"));
    }

    #[test]
    fn empty_page_is_empty_not_failed() {
        let detail = parser().parse("<html><body></body></html>", PAGE_URL);
        assert!(!detail.is_failure());
        assert_eq!(detail, ProductDetail::default());
    }

    #[tokio::test]
    async fn fetch_failure_yields_error_only_record() {
        let extractor =
            DetailExtractor::new(Arc::new(MapFetcher::default()), &DetailSelectors::default()).unwrap();
        let detail = extractor.fetch_detail(PAGE_URL).await;
        assert!(detail.is_failure());
        assert_eq!(
            ProductDetail {
                error: None,
                ..detail
            },
            ProductDetail::default()
        );
    }

    #[tokio::test]
    async fn unreachable_url_yields_error_only_record() {
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(2)).unwrap());
        let extractor = DetailExtractor::new(fetcher, &DetailSelectors::default()).unwrap();
        let detail = extractor.fetch_detail("http://127.0.0.1:1/th/p/nothing").await;
        assert!(detail.error.is_some());
        assert!(detail.title.is_none() && detail.specs.is_empty() && detail.images.is_empty());
    }

    #[test]
    fn invalid_selector_is_rejected_up_front() {
        let selectors = DetailSelectors {
            brand: vec!["..[".into()],
            ..DetailSelectors::default()
        };
        assert!(DetailParser::new(&selectors).is_err());
    }
}
