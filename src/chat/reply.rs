//! Renders catalog data into the two reply shapes the chat platform accepts.

use std::collections::HashMap;

use serde::Serialize;

use super::IndexRef;
use crate::crawler::models::{Category, ProductDetail, ProductStub};

/// Carousel size limit of the chat platform.
pub const MAX_TILES: usize = 10;
pub const TITLE_BUDGET: usize = 40;
pub const DESCRIPTION_BUDGET: usize = 300;
pub const CONTINUATION: &str = "…";

pub const MENU_HINT: &str = "Type 'menu' to pick a category.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reply {
    Carousel {
        #[serde(rename = "altText")]
        alt_text: String,
        tiles: Vec<Tile>,
    },
    Text {
        text: String,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text { text } => Some(text.as_str()),
            Reply::Carousel { .. } => None,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        match self {
            Reply::Carousel { tiles, .. } => tiles.as_slice(),
            Reply::Text { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub title: String,
    pub subtitle: String,
    pub image_url: String,
    pub action: Action,
}

/// Tapping the tile sends `text` back as the user's next message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Action {
    pub label: String,
    pub text: String,
}

/// Cuts `s` to `budget` characters, appending `marker` when something was cut.
pub fn truncate(s: &str, budget: usize, marker: &str) -> String {
    let s = s.trim();
    match s.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}{marker}", s[..cut].trim_end()),
        None => s.to_string(),
    }
}

pub fn placeholder_image(category: Category) -> String {
    format!(
        "https://via.placeholder.com/1024x1024?text={}",
        category.label().replace(' ', "+")
    )
}

fn menu_image(category: Category) -> &'static str {
    match category {
        Category::Notebook => "https://cdn.pixabay.com/photo/2015/01/21/14/14/apple-606761_1280.jpg",
        Category::Smartphone => "https://cdn.pixabay.com/photo/2016/11/22/23/40/hands-1851218_640.jpg",
        Category::GamingGear => "https://cdn.pixabay.com/photo/2021/02/10/13/35/tablet-6002100_640.jpg",
    }
}

/// Static category picker.
pub fn menu() -> Reply {
    let tiles = Category::ALL
        .into_iter()
        .map(|category| Tile {
            title: category.label().to_string(),
            subtitle: format!("Browse {} products", category.label()),
            image_url: menu_image(category).to_string(),
            action: Action {
                label: "Select".into(),
                text: category.chat_words()[0].to_string(),
            },
        })
        .collect();

    Reply::Carousel {
        alt_text: "Choose a product category".into(),
        tiles,
    }
}

/// One tile per named stub, at most [`MAX_TILES`].
///
/// Stubs without a name or a stored index cannot be addressed later and are
/// skipped.
pub fn compose_list(stubs: &[ProductStub], category: Category, image_map: &HashMap<String, String>) -> Reply {
    let tiles: Vec<Tile> = stubs
        .iter()
        .filter_map(|stub| {
            let name = stub.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
            let index = stub.index?;
            Some(Tile {
                title: truncate(name, TITLE_BUDGET, ""),
                subtitle: format!("{} · #{index}", category.label()),
                image_url: image_map
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| placeholder_image(category)),
                action: Action {
                    label: "View details".into(),
                    text: IndexRef::new(index, category).payload(),
                },
            })
        })
        .take(MAX_TILES)
        .collect();

    if tiles.is_empty() {
        return Reply::text(format!("No {} products to show yet. {MENU_HINT}", category.label()));
    }

    Reply::Carousel {
        alt_text: format!("{} products", category.label()),
        tiles,
    }
}

/// Fixed-order plain text rendering of a fetched detail.
pub fn compose_detail(detail: &ProductDetail, url: &str) -> Reply {
    let mut lines = vec![detail.title.clone().unwrap_or_else(|| "(untitled product)".into())];

    if let Some(brand) = &detail.brand {
        lines.push(format!("Brand: {brand}"));
    }
    if let Some(sku) = &detail.sku {
        lines.push(format!("SKU: {sku}"));
    }
    match (&detail.selling_price, &detail.list_price) {
        (Some(sell), Some(list)) if sell != list => lines.push(format!("Price: {sell} (list {list})")),
        (Some(price), _) | (None, Some(price)) => lines.push(format!("Price: {price}")),
        (None, None) => {}
    }
    if let Some(warranty) = &detail.warranty {
        lines.push(format!("Warranty: {warranty}"));
    }
    if !detail.labels.is_empty() {
        lines.push(format!("Promotions: {}", detail.labels.join(", ")));
    }
    if let Some(description) = detail.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(String::new());
        lines.push(truncate(description, DESCRIPTION_BUDGET, CONTINUATION));
    }
    if !detail.specs.is_empty() {
        lines.push(String::new());
        lines.push("Specs:".into());
        for spec in &detail.specs {
            match &spec.value {
                Some(value) => lines.push(format!("• {}: {value}", spec.label)),
                None => lines.push(format!("• {}", spec.label)),
            }
        }
    }
    lines.push(String::new());
    lines.push(url.to_string());

    Reply::text(lines.join("\n"))
}
