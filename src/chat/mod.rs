//! Conversational retrieval over the stored catalog.
//!
//! A message is interpreted into an [`Intent`], answered by the
//! [`router::ChatRouter`] from the record store (and, for index references, a
//! live detail fetch) and rendered by [`reply`]. Every inbound event gets
//! exactly one reply.

use std::fmt;
use std::str::FromStr;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::crawler::models::{Category, UnknownCategory};

pub mod reply;
pub mod router;
pub mod server;

pub use reply::Reply;
pub use router::ChatRouter;

/// An already verified message from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub user_id: String,
    pub body: String,
}

impl InboundEvent {
    pub fn new(user_id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IndexRefError {
    #[error("expected <index>|<category>, got {0:?}")]
    Malformed(String),
    #[error(transparent)]
    UnknownCategory(#[from] UnknownCategory),
}

/// `"<index>|<category>"`, the action payload of a listing tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRef {
    pub index: usize,
    pub category: Category,
}

impl IndexRef {
    pub fn new(index: usize, category: Category) -> Self {
        Self { index, category }
    }

    pub fn payload(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IndexRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.index, self.category.key())
    }
}

impl FromStr for IndexRef {
    type Err = IndexRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IndexRefError::Malformed(s.trim().to_string());
        let (index, category) = s.split_once('|').ok_or_else(malformed)?;
        let index = index.trim();
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let index = index.parse::<usize>().map_err(|_| malformed())?;
        if category.contains('|') {
            return Err(malformed());
        }
        Ok(Self {
            index,
            category: category.parse()?,
        })
    }
}

const GREETINGS: &[&str] = &["menu", "start", "hi", "hello", "สวัสดี"];

/// What one inbound message asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    /// Switch context and list the category.
    Select(Category),
    /// Switch context and search it.
    SelectAndSearch { category: Category, keyword: String },
    Detail(IndexRef),
    BadIndexRef(IndexRefError),
    /// Search the current context; the context itself stays.
    Search(String),
}

/// Every spelling that selects `category`, longest first.
fn category_words(category: Category) -> Vec<&'static str> {
    let mut words: Vec<&'static str> = [category.key(), category.slug()]
        .into_iter()
        .chain(category.chat_words().iter().copied())
        .collect();
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    words.dedup();
    words
}

/// `"<category word> <keyword>"`, the word matched case-insensitively.
fn split_category_prefix(text: &str) -> Option<(Category, String)> {
    let lowered = text.to_lowercase();
    let mut best: Option<(Category, usize)> = None;

    for category in Category::ALL {
        for word in category_words(category) {
            let Some(rest) = lowered.strip_prefix(word) else {
                continue;
            };
            if !rest.starts_with(char::is_whitespace) {
                continue;
            }
            if best.map_or(true, |(_, len)| word.len() > len) {
                best = Some((category, word.len()));
            }
        }
    }

    let (category, len) = best?;
    // Category words are ASCII, so the matched prefix spans `len` bytes of `text` too.
    let keyword = text.get(len..)?.trim().to_string();
    (!keyword.is_empty()).then_some((category, keyword))
}

impl Intent {
    pub fn parse(body: &str) -> Self {
        let text = body.trim();
        let lowered = text.to_lowercase();

        if text.is_empty() || GREETINGS.contains(&lowered.as_str()) {
            return Intent::Greeting;
        }
        if text.contains('|') {
            return match text.parse::<IndexRef>() {
                Ok(r) => Intent::Detail(r),
                Err(e) => Intent::BadIndexRef(e),
            };
        }
        if let Ok(category) = text.parse::<Category>() {
            return Intent::Select(category);
        }
        if let Some((category, keyword)) = split_category_prefix(text) {
            return Intent::SelectAndSearch { category, keyword };
        }
        Intent::Search(text.to_string())
    }
}

/// Last category each user picked; lives as long as the process.
#[derive(Debug, Default)]
pub struct ContextStore {
    last: DashMap<String, Category>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A user who never picked anything is in the default category.
    pub fn current(&self, user_id: &str) -> Category {
        self.last
            .get(user_id)
            .map(|c| *c)
            .unwrap_or(Category::DEFAULT)
    }

    pub fn select(&self, user_id: &str, category: Category) {
        self.last.insert(user_id.to_string(), category);
    }

    pub fn len(&self) -> usize {
        self.last.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last.is_empty()
    }
}
