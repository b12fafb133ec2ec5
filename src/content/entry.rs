//! Per-file build settings.
//!
//! Resolution order for one input file:
//!
//! 1. most specific content rule (exact file, else nearest directory rule)
//! 2. otherwise the default template, if configured
//! 3. otherwise nothing: the caller skips the file
//!
//! Front matter read from the file then overrides the rule's title,
//! description, creation time, tags and metadata.

use crate::{
    config::{ContentRule, SiteConfig},
    content::front_matter::{self, FrontMatter},
    log,
};
use chrono::{DateTime, Utc};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("`{path}` is not inside the content directory `{root}`")]
    OutsideContent { path: PathBuf, root: PathBuf },

    #[error(
        "content rule `{rule}` covers a directory but sets output_path `{output}` (matched `{path}`); \
         output_path is only supported on single-file rules"
    )]
    InvalidRemap {
        rule: PathBuf,
        output: PathBuf,
        path: PathBuf,
    },
}

/// Fully resolved build settings for one input file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentEntry {
    /// The concrete file, even when the rule covered a whole directory
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub template: PathBuf,
    pub title: String,
    pub description: String,
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl ContentEntry {
    fn from_rule(rule: &ContentRule, input_path: &Path, output_path: PathBuf) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path,
            template: rule.template.clone(),
            title: rule.title.clone(),
            description: rule.description.clone(),
            created_at: rule.created_at,
            tags: rule.tags.clone(),
            metadata: rule.metadata.clone(),
        }
    }

    /// Overlay front matter; fields it leaves out keep their rule values.
    pub fn apply_front_matter(&mut self, front_matter: FrontMatter) {
        let FrontMatter {
            title,
            description,
            created_at,
            tags,
            metadata,
        } = front_matter;

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if created_at.is_some() {
            self.created_at = created_at;
        }
        if let Some(tags) = tags {
            self.tags = tags;
        }
        if let Some(metadata) = metadata {
            self.metadata = metadata;
        }
    }
}

/// Resolve the content entry for `input_path`.
///
/// `Ok(None)` means no rule matched and no default template is configured.
/// Front matter problems are logged and never fail resolution.
pub fn resolve(
    config: &SiteConfig,
    input_path: &Path,
    read_front_matter: bool,
) -> Result<Option<ContentEntry>, ResolveError> {
    let derived = derive_output_path(config, input_path)?;

    let mut entry = match config.match_rule(input_path) {
        Some(rule) => {
            let output_path = match &rule.output_path {
                None => derived,
                Some(output) if rule.input_path.as_path() == input_path => output.clone(),
                Some(output) => {
                    return Err(ResolveError::InvalidRemap {
                        rule: rule.input_path.clone(),
                        output: output.clone(),
                        path: input_path.to_path_buf(),
                    });
                }
            };
            ContentEntry::from_rule(rule, input_path, output_path)
        }
        None => match &config.default_template {
            Some(template) => ContentEntry {
                input_path: input_path.to_path_buf(),
                output_path: derived,
                template: template.clone(),
                ..ContentEntry::default()
            },
            None => return Ok(None),
        },
    };

    if read_front_matter {
        match front_matter::read(input_path) {
            Ok(Some(front_matter)) => entry.apply_front_matter(front_matter),
            Ok(None) => {}
            Err(err) => log!("warn"; "{}: {err}, using rule values", input_path.display()),
        }
    }

    Ok(Some(entry))
}

/// `content/a/b.md` → `build/a/b.html`
pub fn derive_output_path(config: &SiteConfig, input_path: &Path) -> Result<PathBuf, ResolveError> {
    let relative = input_path
        .strip_prefix(&config.content_path)
        .map_err(|_| ResolveError::OutsideContent {
            path: input_path.to_path_buf(),
            root: config.content_path.clone(),
        })?;

    Ok(config.build_path.join(relative).with_extension("html"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn config(toml: &str) -> SiteConfig {
        let mut config = SiteConfig::from_str(toml).unwrap();
        config.resolve_paths(Path::new("/site"));
        config
    }

    #[test]
    fn test_default_entry_derivation() {
        let config = config(r#"default_template = "page.html""#);

        let entry = resolve(&config, Path::new("/site/content/notes/idea.txt"), false)
            .unwrap()
            .unwrap();

        assert_eq!(entry.input_path, PathBuf::from("/site/content/notes/idea.txt"));
        assert_eq!(entry.output_path, PathBuf::from("/site/dist/notes/idea.html"));
        assert_eq!(entry.template, PathBuf::from("/site/templates/page.html"));
        assert!(entry.title.is_empty());
    }

    #[test]
    fn test_no_match_without_default_is_none() {
        let config = config("");
        assert_eq!(resolve(&config, Path::new("/site/content/a.md"), false).unwrap(), None);
    }

    #[test]
    fn test_file_rule_beats_directory_rule() {
        let config = config(
            r#"
            [[content]]
            input_path = "a/"
            template = "dir.html"
            title = "Dir"

            [[content]]
            input_path = "a/b.md"
            template = "file.html"
            title = "File"
            "#,
        );

        let b = resolve(&config, Path::new("/site/content/a/b.md"), false).unwrap().unwrap();
        assert_eq!(b.title, "File");
        assert_eq!(b.template, PathBuf::from("/site/templates/file.html"));

        let c = resolve(&config, Path::new("/site/content/a/c.md"), false).unwrap().unwrap();
        assert_eq!(c.title, "Dir");
        assert_eq!(c.input_path, PathBuf::from("/site/content/a/c.md"));
        assert_eq!(c.output_path, PathBuf::from("/site/dist/a/c.html"));
    }

    #[test]
    fn test_single_file_remap() {
        let config = config(
            r#"
            [[content]]
            input_path = "index.md"
            output_path = "home/index.html"
            template = "main.html"
            "#,
        );

        let entry = resolve(&config, Path::new("/site/content/index.md"), false)
            .unwrap()
            .unwrap();
        assert_eq!(entry.output_path, PathBuf::from("/site/dist/home/index.html"));
    }

    #[test]
    fn test_directory_remap_rejected() {
        let config = config(
            r#"
            [[content]]
            input_path = "blog"
            output_path = "posts.html"
            template = "main.html"
            "#,
        );

        let err = resolve(&config, Path::new("/site/content/blog/first.md"), false).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRemap { .. }));
    }

    #[test]
    fn test_outside_content_rejected() {
        let config = config(r#"default_template = "page.html""#);
        let err = resolve(&config, Path::new("/elsewhere/a.md"), false).unwrap_err();
        assert!(matches!(err, ResolveError::OutsideContent { .. }));
    }

    #[test]
    fn test_front_matter_overrides_rule() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::from_str(
            r#"
            [[content]]
            input_path = "post.md"
            template = "main.html"
            title = "A"
            description = "from rule"
            tags = ["rule"]
            "#,
        )
        .unwrap();
        config.resolve_paths(dir.path());

        let path = config.content_path.join("post.md");
        fs::create_dir_all(&config.content_path).unwrap();
        fs::write(&path, "---\ntitle: B\ntags: [fm]\n---\nbody").unwrap();

        let entry = resolve(&config, &path, true).unwrap().unwrap();
        assert_eq!(entry.title, "B");
        assert_eq!(entry.tags, vec!["fm".to_string()]);
        // absent from front matter, keeps rule value
        assert_eq!(entry.description, "from rule");

        // not requested: rule values only
        let entry = resolve(&config, &path, false).unwrap().unwrap();
        assert_eq!(entry.title, "A");
    }

    #[test]
    fn test_broken_front_matter_is_soft() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::from_str(r#"default_template = "page.html""#).unwrap();
        config.resolve_paths(dir.path());

        let path = config.content_path.join("broken.md");
        fs::create_dir_all(&config.content_path).unwrap();
        fs::write(&path, "---\ntitle: [oops\n---\n").unwrap();

        let entry = resolve(&config, &path, true).unwrap().unwrap();
        assert!(entry.title.is_empty());
    }
}
