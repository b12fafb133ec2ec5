//! Site building orchestration.
//!
//! # Architecture
//!
//! ```text
//! build_site()
//!     │
//!     ├── reset staging, copy static/ into it
//!     │
//!     ├── walk content/ (sorted)
//!     │       │
//!     │       └── resolve entry ──► dispatch by extension
//!     │               Convert: converter → staged .html   ─┐
//!     │               Copy:    verbatim  → staged .html   ─┤ Page
//!     │               Link:    log URL, nothing written    │
//!     │               Skip:    log                         │
//!     │                                                    ▼
//!     ├── finish pages (title / created_at fallbacks) → PageIndex
//!     │
//!     ├── render every page with the complete PageIndex
//!     │
//!     └── publish staging → build_path
//! ```
//!
//! Rendering only starts once the walk is over, so a template can list
//! pages that come later in walk order than the page being rendered.

use crate::{
    compiler::{Converter, Handler, HandlerTable, LinkKind, links, title},
    config::SiteConfig,
    content::{self, ContentEntry},
    log,
    page::{Page, PageIndex},
    render::Renderer,
    utils::fs::{copy_dir, copy_file, publish, reset_dir, staging_dir},
};
use anyhow::{Context, Result, bail};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

/// Files to ignore during directory traversal
const IGNORED_FILES: &[&str] = &[".DS_Store"];

/// Build the whole site into `config.build_path`.
///
/// Output is assembled in a staging directory and only replaces the live
/// tree once every page rendered. `serving`, when given, follows the swap.
pub fn build_site(
    config: &SiteConfig,
    converter: &dyn Converter,
    serving: Option<&ArcSwap<PathBuf>>,
) -> Result<PageIndex> {
    let staging = staging_dir(&config.build_path);
    let builder = Builder {
        config,
        converter,
        handlers: HandlerTable::default(),
        staging: &staging,
    };

    let result = builder.run();
    let index = match result {
        Ok(index) => index,
        Err(err) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(err);
        }
    };

    publish(&staging, &config.build_path, serving)?;
    log!("build"; "done, {} pages", index.len());

    Ok(index)
}

struct Builder<'a> {
    config: &'a SiteConfig,
    converter: &'a dyn Converter,
    handlers: HandlerTable,
    staging: &'a Path,
}

impl Builder<'_> {
    fn run(&self) -> Result<PageIndex> {
        reset_dir(self.staging)?;

        let copied = copy_dir(&self.config.static_path, self.staging)?;
        if copied > 0 {
            log!("static"; "copied {copied} files");
        }

        let mut index = PageIndex::default();
        let mut claimed = FxHashMap::default();
        for path in collect_files(&self.config.content_path)? {
            if let Some(page) = self.process_file(&path, &mut claimed)? {
                index.push(page);
            }
        }

        let index = Arc::new(index);
        self.render_pages(&index)?;

        Ok(Arc::try_unwrap(index).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// `claimed` maps each staged destination to the source that produced it.
    fn process_file(
        &self,
        path: &Path,
        claimed: &mut FxHashMap<PathBuf, PathBuf>,
    ) -> Result<Option<Page>> {
        let rel = self.rel(path);
        let handler = self.handlers.handler_for(path);

        let Some(entry) = content::resolve(self.config, path, handler.emits_page())? else {
            log!("warn"; "{rel}: no content rule and no default template, skipping");
            return Ok(None);
        };

        let destination = self.staged(&entry.output_path)?;
        if handler.emits_page()
            && let Some(previous) = claimed.insert(destination.clone(), path.to_path_buf())
        {
            bail!(
                "{} and {rel} both produce `{}`",
                self.rel(&previous),
                entry.output_path.display()
            );
        }

        match handler {
            Handler::Convert => {
                let out_dir = destination.parent().unwrap_or(self.staging);
                fs::create_dir_all(out_dir)
                    .with_context(|| format!("Failed to create {}", out_dir.display()))?;

                let base_name = destination
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let produced = self
                    .converter
                    .convert(path, out_dir, &base_name)
                    .with_context(|| format!("Failed to convert {rel}"))?;
                if produced != destination {
                    fs::rename(&produced, &destination).with_context(|| {
                        format!(
                            "Failed to move {} to {}",
                            produced.display(),
                            destination.display()
                        )
                    })?;
                }
            }
            Handler::Copy => copy_file(path, &destination)?,
            Handler::Link(kind) => {
                let url = match kind {
                    LinkKind::Webloc => links::extract_webloc(path),
                    LinkKind::Shortcut => links::extract_shortcut(path),
                };
                match url {
                    Ok(url) => log!("link"; "{rel}: {url} (not published)"),
                    Err(err) => log!("warn"; "{rel}: {err}"),
                }
                return Ok(None);
            }
            Handler::Skip => {
                log!("skip"; "{rel}: unsupported extension");
                return Ok(None);
            }
        }

        Ok(Some(self.finish_page(entry, &destination, &rel)))
    }

    /// Fill in what neither the rule nor the front matter provided.
    fn finish_page(&self, mut entry: ContentEntry, produced: &Path, rel: &str) -> Page {
        if entry.title.is_empty() {
            match title::title_from_file(produced) {
                Some(found) => entry.title = found,
                None => log!("warn"; "{rel}: no title"),
            }
        }
        if entry.description.is_empty() {
            log!("warn"; "{rel}: no description");
        }
        if entry.created_at.is_none() {
            entry.created_at = modified_time(&entry.input_path);
        }

        Page::from_entry(entry, &self.config.build_path)
    }

    fn render_pages(&self, index: &Arc<PageIndex>) -> Result<()> {
        let renderer = Renderer::new(self.config, Arc::clone(index));

        for page in index.iter() {
            let staged = self.staged(&page.destination)?;
            let contents = fs::read_to_string(&staged)
                .with_context(|| format!("Failed to read {}", staged.display()))?;
            let html = renderer.render(page, &contents)?;
            fs::write(&staged, html)
                .with_context(|| format!("Failed to write {}", staged.display()))?;
        }
        Ok(())
    }

    /// Location inside the staging tree of a final output path.
    fn staged(&self, output: &Path) -> Result<PathBuf> {
        match output.strip_prefix(&self.config.build_path) {
            Ok(relative) => Ok(self.staging.join(relative)),
            Err(_) => bail!(
                "output `{}` is outside `{}`",
                output.display(),
                self.config.build_path.display()
            ),
        }
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.config.content_path)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

/// Every file under `dir`, in sorted walk order.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        let name = entry.file_name().to_str().unwrap_or_default();
        if entry.file_type().is_file() && !IGNORED_FILES.contains(&name) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}
