use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The fixed set of catalog categories the crawler and the chat surface know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Notebook,
    Smartphone,
    GamingGear,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Notebook, Category::Smartphone, Category::GamingGear];

    /// Context used before a user has picked anything.
    pub const DEFAULT: Category = Category::Notebook;

    /// Compact identifier used in index-reference payloads.
    pub fn key(self) -> &'static str {
        match self {
            Category::Notebook => "notebook",
            Category::Smartphone => "smartphone",
            Category::GamingGear => "gaming-gear",
        }
    }

    /// File stem of the category's persisted table and detail batch.
    pub fn slug(self) -> &'static str {
        match self {
            Category::Notebook => "notebook",
            Category::Smartphone => "smartphone-and-accessories",
            Category::GamingGear => "gaming-gear",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Notebook => "Notebook",
            Category::Smartphone => "Smartphone",
            Category::GamingGear => "Gaming Gear",
        }
    }

    /// Words a user types to select this category.
    pub fn chat_words(self) -> &'static [&'static str] {
        match self {
            Category::Notebook => &["notebook"],
            Category::Smartphone => &["smartphone"],
            Category::GamingGear => &["gaming gear", "gaming-gear"],
        }
    }

    pub fn listing_url(self, origin: &str) -> String {
        format!(
            "{}/th/p/{}?ref=search-result",
            origin.trim_end_matches('/'),
            self.slug()
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts the key, the store slug or any chat word, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| {
                c.key() == wanted || c.slug() == wanted || c.chat_words().contains(&wanted.as_str())
            })
            .ok_or_else(|| UnknownCategory(s.trim().to_string()))
    }
}

/// A minimal product record produced by listing-page extraction.
///
/// `index` is the row position inside the category's store. It is assigned
/// when the stub is appended and never changes afterwards; stubs fresh from a
/// listing walk carry `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductStub {
    pub name: Option<String>,
    pub url: String,
    pub category: Category,
    pub index: Option<usize>,
}

impl ProductStub {
    pub fn new(category: Category, url: impl Into<String>, name: Option<String>) -> Self {
        Self {
            name,
            url: url.into(),
            category,
            index: None,
        }
    }

    pub fn has_name(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// One line of the specification list on a detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecEntry {
    pub label: String,
    pub value: Option<String>,
}

/// A full product record parsed from the product's own page.
///
/// Prices and warranty stay display strings. A record whose `error` is set
/// is a hard fetch/parse failure and carries no other field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub specs: Vec<SpecEntry>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub selling_price: Option<String>,
    pub list_price: Option<String>,
    pub warranty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProductDetail {
    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    /// Inserts or replaces a spec line, keeping first-seen label order.
    pub fn push_spec(&mut self, label: String, value: Option<String>) {
        match self.specs.iter_mut().find(|s| s.label == label) {
            Some(existing) => existing.value = value,
            None => self.specs.push(SpecEntry { label, value }),
        }
    }
}

/// A detail as persisted in a category's batch document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailRecord {
    pub source_name: String,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    #[serde(flatten)]
    pub detail: ProductDetail,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_every_spelling() {
        assert_eq!("notebook".parse::<Category>(), Ok(Category::Notebook));
        assert_eq!("Smartphone-and-Accessories".parse::<Category>(), Ok(Category::Smartphone));
        assert_eq!("gaming gear".parse::<Category>(), Ok(Category::GamingGear));
        assert_eq!(" GAMING-GEAR ".parse::<Category>(), Ok(Category::GamingGear));
        let err = " Tablet ".parse::<Category>().unwrap_err();
        assert_eq!(err, UnknownCategory("Tablet".into()));
        assert_eq!(err.to_string(), "unknown category: Tablet");
    }

    #[test]
    fn failed_detail_only_carries_error() {
        let detail = ProductDetail::failed("connection refused");
        assert!(detail.is_failure());
        assert_eq!(
            ProductDetail {
                error: None,
                ..detail
            },
            ProductDetail::default()
        );
    }

    #[test]
    fn push_spec_replaces_in_place() {
        let mut detail = ProductDetail::default();
        detail.push_spec("CPU".into(), Some("i5".into()));
        detail.push_spec("Bluetooth".into(), None);
        detail.push_spec("CPU".into(), Some("i7".into()));
        assert_eq!(detail.specs.len(), 2);
        assert_eq!(detail.specs[0].value.as_deref(), Some("i7"));
    }

    #[test]
    fn detail_record_flattens_detail_fields() {
        let record = DetailRecord {
            source_name: "Acer Swift".into(),
            url: "https://example.test/p/1".into(),
            fetched_at: Utc::now(),
            detail: ProductDetail {
                title: Some("Acer Swift Go".into()),
                images: vec!["https://cdn.test/1.jpg".into()],
                ..ProductDetail::default()
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sourceName"], "Acer Swift");
        assert_eq!(json["title"], "Acer Swift Go");
        assert_eq!(json["images"][0], "https://cdn.test/1.jpg");
        assert!(json.get("error").is_none());
    }
}
