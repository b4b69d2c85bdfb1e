//! Append-only per-category link tables (`<slug>.csv`, header `name,url`).
//!
//! A row's position is its index forever: appends never reorder or rewrite
//! earlier rows. Duplicates are only suppressed within one `append` call;
//! a rerun that does not read the table first may append a URL again.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::ops::ControlFlow;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::info;

use super::StoreError;
use crate::crawler::models::{Category, ProductStub};

#[derive(Debug, Deserialize)]
struct Row {
    name: String,
    url: String,
}

#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, category: Category) -> PathBuf {
        self.dir.join(format!("{}.csv", category.slug()))
    }

    /// Visits stored rows in order until `visit` breaks. A missing table
    /// is an empty one.
    fn scan(
        &self,
        category: Category,
        mut visit: impl FnMut(ProductStub) -> ControlFlow<()>,
    ) -> Result<(), StoreError> {
        let file = match File::open(self.path(category)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        for (index, row) in reader.deserialize::<Row>().enumerate() {
            let row = row?;
            let name = Some(row.name.trim().to_string()).filter(|n| !n.is_empty());
            let stub = ProductStub {
                name,
                url: row.url.trim().to_string(),
                category,
                index: Some(index),
            };
            if visit(stub).is_break() {
                break;
            }
        }
        Ok(())
    }

    pub fn len(&self, category: Category) -> Result<usize, StoreError> {
        let mut n = 0;
        self.scan(category, |_| {
            n += 1;
            ControlFlow::Continue(())
        })?;
        Ok(n)
    }

    /// Appends stubs after the existing rows and returns them with their
    /// permanent indices. Repeated URLs within `stubs` are written once.
    pub fn append(&self, category: Category, stubs: &[ProductStub]) -> Result<Vec<ProductStub>, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let existing = self.len(category)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(category))?;
        let needs_header = file.metadata()?.len() == 0;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(["name", "url"])?;
        }

        let mut seen = HashSet::new();
        let mut appended = Vec::new();
        for stub in stubs {
            if !seen.insert(stub.url.as_str()) {
                continue;
            }
            writer.write_record([stub.name.as_deref().unwrap_or(""), stub.url.as_str()])?;
            appended.push(ProductStub {
                category,
                index: Some(existing + appended.len()),
                ..stub.clone()
            });
        }
        writer.flush()?;

        info!(%category, existing, appended = appended.len(), "records appended");
        Ok(appended)
    }

    pub fn read_all(&self, category: Category) -> Result<Vec<ProductStub>, StoreError> {
        let mut stubs = Vec::new();
        self.scan(category, |stub| {
            stubs.push(stub);
            ControlFlow::Continue(())
        })?;
        Ok(stubs)
    }

    pub fn read_by_index(&self, category: Category, index: usize) -> Result<Option<ProductStub>, StoreError> {
        let mut found = None;
        self.scan(category, |stub| {
            if stub.index == Some(index) {
                found = Some(stub);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        Ok(found)
    }

    /// Up to `limit` named rows whose name contains `keyword`, ignoring case.
    ///
    /// Scanning stops as soon as `limit` rows matched. Unnamed rows never
    /// match since they cannot be listed.
    pub fn search(
        &self,
        category: Category,
        limit: usize,
        keyword: Option<&str>,
    ) -> Result<Vec<ProductStub>, StoreError> {
        let keyword = keyword
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty());
        let mut matches = Vec::new();
        if limit == 0 {
            return Ok(matches);
        }

        self.scan(category, |stub| {
            let hit = match (&stub.name, &keyword) {
                (None, _) => false,
                (Some(_), None) => true,
                (Some(name), Some(k)) => name.to_lowercase().contains(k.as_str()),
            };
            if hit {
                matches.push(stub);
                if matches.len() >= limit {
                    return ControlFlow::Break(());
                }
            }
            ControlFlow::Continue(())
        })?;
        Ok(matches)
    }
}
