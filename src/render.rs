//! Page templating with minijinja.
//!
//! Every template sees:
//!
//! | name       | value                                     |
//! |------------|-------------------------------------------|
//! | `page`     | the page being rendered                   |
//! | `contents` | HTML produced for it (not escaped)        |
//! | `pages`    | every page of this build, in walk order   |
//! | `site`     | `title` and `description` from the config |
//!
//! Helpers: `has_prefix(s, prefix)`, `pages_with_tag(tag)`,
//! `pages_under(prefix)`, `pages_with_metadata(key, value)` and the
//! `date(format)` filter. Templates can `extends`/`include` anything under
//! the templates directory.

use crate::{
    config::SiteConfig,
    page::{Page, PageIndex},
};
use anyhow::{Context, Result, anyhow};
use chrono::DateTime;
use minijinja::{Environment, Error, ErrorKind, Value, context, path_loader};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize)]
struct Site {
    title: String,
    description: String,
}

/// Renders pages of one build pass. Templates are loaded lazily and cached
/// for the lifetime of the renderer, so a new build sees template edits.
pub struct Renderer {
    env: Environment<'static>,
    templates_root: PathBuf,
    site: Site,
    pages: Arc<PageIndex>,
}

impl Renderer {
    pub fn new(config: &SiteConfig, pages: Arc<PageIndex>) -> Self {
        let mut env = Environment::new();
        env.set_loader(path_loader(config.templates_path.clone()));
        register_helpers(&mut env, &pages);

        Self {
            env,
            templates_root: config.templates_path.clone(),
            site: Site {
                title: config.site_title.clone(),
                description: config.site_description.clone(),
            },
            pages,
        }
    }

    /// Render `page` around `contents`.
    pub fn render(&self, page: &Page, contents: &str) -> Result<String> {
        let name = self.template_name(&page.template)?;
        let template = self
            .env
            .get_template(&name)
            .with_context(|| format!("Failed to load template `{name}`"))?;

        template
            .render(context! {
                page => page,
                contents => Value::from_safe_string(contents.to_owned()),
                pages => self.pages.as_slice(),
                site => &self.site,
            })
            .with_context(|| format!("Failed to render `{name}` for {}", page.source.display()))
    }

    /// Loader name of an absolute template path: relative, `/`-separated.
    fn template_name(&self, template: &Path) -> Result<String> {
        let relative = template.strip_prefix(&self.templates_root).map_err(|_| {
            anyhow!(
                "template `{}` is outside `{}`",
                template.display(),
                self.templates_root.display()
            )
        })?;

        Ok(relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"))
    }
}

fn register_helpers(env: &mut Environment<'static>, pages: &Arc<PageIndex>) {
    env.add_function("has_prefix", |s: &str, prefix: &str| s.starts_with(prefix));

    let index = Arc::clone(pages);
    env.add_function("pages_with_tag", move |tag: &str| {
        Value::from_serialize(index.by_tag(tag))
    });

    let index = Arc::clone(pages);
    env.add_function("pages_under", move |prefix: &str| {
        Value::from_serialize(index.by_url_prefix(prefix))
    });

    let index = Arc::clone(pages);
    env.add_function("pages_with_metadata", move |key: &str, value: &str| {
        Value::from_serialize(index.by_metadata(key, value))
    });

    env.add_filter("date", format_date);
}

/// `{{ page.created_at | date("%d %b %Y") }}`; missing dates render empty.
fn format_date(value: Option<String>, format: Option<String>) -> Result<String, Error> {
    let Some(value) = value else {
        return Ok(String::new());
    };

    let datetime = DateTime::parse_from_rfc3339(&value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("`{value}` is not a date: {e}"),
        )
    })?;

    let format = format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT);
    Ok(datetime.format(format).to_string())
}
