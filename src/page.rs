//! Pages produced by one build pass and the index templates query.

use crate::content::ContentEntry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// One emitted file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub source: PathBuf,
    pub template: PathBuf,
    pub destination: PathBuf,
    /// Site-relative URL, `/blog/first.html` or `/blog/` for an index page
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Page {
    /// Page for a resolved entry whose output landed under `build_root`.
    pub fn from_entry(entry: ContentEntry, build_root: &Path) -> Self {
        let url = url_for(&entry.output_path, build_root);
        Self {
            source: entry.input_path,
            template: entry.template,
            destination: entry.output_path,
            url,
            title: entry.title,
            description: entry.description,
            created_at: entry.created_at,
            tags: entry.tags,
            metadata: entry.metadata,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// `/site/dist/blog/index.html` → `/blog/`
///
/// Segments are joined with `/` whatever the platform separator.
pub fn url_for(destination: &Path, build_root: &Path) -> String {
    let relative = destination.strip_prefix(build_root).unwrap_or(destination);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    let url = format!("/{joined}");
    url.strip_suffix("index.html").map(str::to_owned).unwrap_or(url)
}

/// Every page of a build pass, in walk order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PageIndex {
    pages: Vec<Page>,
}

impl PageIndex {
    pub fn push(&mut self, page: Page) {
        self.pages.push(page);
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Page> {
        self.pages.iter()
    }

    pub fn as_slice(&self) -> &[Page] {
        &self.pages
    }

    /// Pages tagged with `tag`.
    pub fn by_tag(&self, tag: &str) -> Vec<&Page> {
        self.pages.iter().filter(|p| p.has_tag(tag)).collect()
    }

    /// Pages whose URL starts with `prefix`.
    pub fn by_url_prefix(&self, prefix: &str) -> Vec<&Page> {
        self.pages.iter().filter(|p| p.url.starts_with(prefix)).collect()
    }

    /// Pages whose metadata maps `key` to exactly `value`.
    pub fn by_metadata(&self, key: &str, value: &str) -> Vec<&Page> {
        self.pages
            .iter()
            .filter(|p| p.metadata.get(key).is_some_and(|v| v == value))
            .collect()
    }
}

impl<'a> IntoIterator for &'a PageIndex {
    type Item = &'a Page;
    type IntoIter = std::slice::Iter<'a, Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}
