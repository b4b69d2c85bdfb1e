use std::collections::HashMap;
use std::time::Duration;

use tokio::task;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::reply::{self, Reply, MAX_TILES, MENU_HINT};
use super::{ContextStore, InboundEvent, IndexRef, IndexRefError, Intent};
use crate::crawler::models::{Category, ProductStub};
use crate::crawler::parser::DetailExtractor;
use crate::storage::{DetailStore, RecordStore, StoreError};

const SORRY: &str = "Sorry, we couldn't load that product right now. Please try again later.";

/// Answers chat messages from the record store.
///
/// Holds the only per-user state, the last selected category, for the life
/// of the process. Concurrent messages of one user race on it and the last
/// write wins.
pub struct ChatRouter {
    contexts: ContextStore,
    records: RecordStore,
    details: DetailStore,
    extractor: DetailExtractor,
    list_limit: usize,
    detail_budget: Duration,
}

impl ChatRouter {
    pub fn new(records: RecordStore, details: DetailStore, extractor: DetailExtractor) -> Self {
        Self {
            contexts: ContextStore::new(),
            records,
            details,
            extractor,
            list_limit: MAX_TILES,
            detail_budget: Duration::from_secs(30),
        }
    }

    pub fn with_detail_budget(mut self, budget: Duration) -> Self {
        self.detail_budget = budget;
        self
    }

    pub fn context(&self, user_id: &str) -> Category {
        self.contexts.current(user_id)
    }

    /// Always produces exactly one reply.
    pub async fn handle(&self, event: &InboundEvent) -> Reply {
        let intent = Intent::parse(&event.body);
        info!(user = %event.user_id, ?intent, "message received");

        match intent {
            Intent::Greeting => reply::menu(),
            Intent::Select(category) => {
                self.contexts.select(&event.user_id, category);
                self.list(category, None).await
            }
            Intent::SelectAndSearch { category, keyword } => {
                self.contexts.select(&event.user_id, category);
                self.list(category, Some(keyword)).await
            }
            Intent::Search(keyword) => {
                let category = self.contexts.current(&event.user_id);
                self.list(category, Some(keyword)).await
            }
            Intent::Detail(index_ref) => self.detail(index_ref).await,
            Intent::BadIndexRef(e) => {
                warn!(user = %event.user_id, error = %e, "bad index reference");
                bad_reference(&e)
            }
        }
    }

    /// Search plus the image map of the category, read on the blocking pool.
    async fn load_listing(
        &self,
        category: Category,
        keyword: Option<String>,
    ) -> anyhow::Result<(Vec<ProductStub>, HashMap<String, String>)> {
        let records = self.records.clone();
        let details = self.details.clone();
        let limit = self.list_limit;
        let loaded = task::spawn_blocking(move || {
            let stubs = records.search(category, limit, keyword.as_deref())?;
            let images = if stubs.is_empty() {
                HashMap::new()
            } else {
                details.image_map(category)
            };
            Ok::<_, StoreError>((stubs, images))
        })
        .await??;
        Ok(loaded)
    }

    async fn list(&self, category: Category, keyword: Option<String>) -> Reply {
        let (stubs, images) = match self.load_listing(category, keyword.clone()).await {
            Ok(v) => v,
            Err(e) => {
                error!(%category, error = %e, "failed to read records");
                return Reply::text(format!(
                    "Sorry, the {} list is unavailable right now. {MENU_HINT}",
                    category.label()
                ));
            }
        };

        if stubs.is_empty() {
            if let Some(keyword) = keyword {
                return Reply::text(format!(
                    "No {} products match \"{keyword}\". {MENU_HINT}",
                    category.label()
                ));
            }
        }

        reply::compose_list(&stubs, category, &images)
    }

    async fn detail(&self, index_ref: IndexRef) -> Reply {
        let IndexRef { index, category } = index_ref;
        let records = self.records.clone();
        let row = task::spawn_blocking(move || records.read_by_index(category, index)).await;
        let stub = match row {
            Ok(Ok(Some(stub))) => stub,
            Ok(Ok(None)) => {
                warn!(%category, index, "index reference out of range");
                return Reply::text(format!("There is no {} item #{index}. {MENU_HINT}", category.label()));
            }
            Ok(Err(e)) => {
                error!(%category, index, error = %e, "failed to read records");
                return Reply::text(SORRY);
            }
            Err(e) => {
                error!(%category, index, error = %e, "record lookup task failed");
                return Reply::text(SORRY);
            }
        };

        let detail = match timeout(self.detail_budget, self.extractor.fetch_detail(&stub.url)).await {
            Ok(detail) => detail,
            Err(_) => {
                warn!(url = %stub.url, "detail fetch timed out");
                return Reply::text(SORRY);
            }
        };

        if let Some(reason) = &detail.error {
            warn!(url = %stub.url, reason = %reason, "detail unavailable");
            return Reply::text(SORRY);
        }
        reply::compose_detail(&detail, &stub.url)
    }
}

fn bad_reference(e: &IndexRefError) -> Reply {
    match e {
        IndexRefError::UnknownCategory(u) => {
            Reply::text(format!("I don't know the category \"{}\". {MENU_HINT}", u.0))
        }
        IndexRefError::Malformed(_) => Reply::text(format!("That product link looks broken. {MENU_HINT}")),
    }
}
