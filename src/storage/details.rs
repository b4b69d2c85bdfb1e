//! Per-category detail batches (`<slug>_details.json`).

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use tracing::{info, warn};

use super::StoreError;
use crate::crawler::models::{Category, DetailRecord};

#[derive(Debug, Clone)]
pub struct DetailStore {
    dir: PathBuf,
}

impl DetailStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, category: Category) -> PathBuf {
        self.dir.join(format!("{}_details.json", category.slug()))
    }

    /// Replaces the category's batch document.
    pub fn save(&self, category: Category, records: &[DetailRecord]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path(category).with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.path(category))?;
        info!(%category, records = records.len(), "detail batch saved");
        Ok(())
    }

    pub fn load(&self, category: Category) -> Result<Vec<DetailRecord>, StoreError> {
        let raw = fs::read_to_string(self.path(category))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Source name → primary image, from the last saved batch.
    ///
    /// Listing tiles only decorate with it, so a missing or unreadable batch
    /// gives an empty map.
    pub fn image_map(&self, category: Category) -> HashMap<String, String> {
        let records = match self.load(category) {
            Ok(records) => records,
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(%category, error = %e, "failed to load detail batch");
                return HashMap::new();
            }
        };

        records
            .into_iter()
            .filter_map(|record| {
                let name = record.source_name.trim().to_string();
                let image = record.detail.primary_image()?.to_string();
                (!name.is_empty()).then_some((name, image))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::crawler::models::ProductDetail;

    fn record(name: &str, images: &[&str]) -> DetailRecord {
        DetailRecord {
            source_name: name.to_string(),
            url: format!("https://s.test/p/{}", name.len()),
            fetched_at: Utc::now(),
            detail: ProductDetail {
                title: Some(name.to_string()),
                images: images.iter().map(|s| s.to_string()).collect(),
                ..ProductDetail::default()
            },
        }
    }

    #[test]
    fn save_and_load_keep_order_and_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = DetailStore::new(dir.path());
        let mut failed = record("Broken Page Product", &[]);
        failed.detail = ProductDetail::failed("status 500");
        let records = vec![record("Acer Swift Go 14", &["https://cdn.test/a.jpg"]), failed];

        store.save(Category::Notebook, &records).unwrap();
        let loaded = store.load(Category::Notebook).unwrap();

        assert_eq!(loaded, records);
        assert!(loaded[1].detail.is_failure());
        assert!(store.path(Category::Notebook).ends_with("notebook_details.json"));
    }

    #[test]
    fn image_map_uses_first_image_and_skips_blank_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = DetailStore::new(dir.path());
        store
            .save(
                Category::Smartphone,
                &[
                    record("iPhone 16 Pro", &["https://cdn.test/1.jpg", "https://cdn.test/2.jpg"]),
                    record("  ", &["https://cdn.test/x.jpg"]),
                    record("Galaxy S25", &[]),
                ],
            )
            .unwrap();

        let map = store.image_map(Category::Smartphone);
        assert_eq!(map.len(), 1);
        assert_eq!(map["iPhone 16 Pro"], "https://cdn.test/1.jpg");
    }

    #[test]
    fn image_map_tolerates_missing_or_corrupt_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = DetailStore::new(dir.path());
        assert!(store.image_map(Category::GamingGear).is_empty());

        fs::write(store.path(Category::GamingGear), "{ not json").unwrap();
        assert!(store.image_map(Category::GamingGear).is_empty());
    }
}
