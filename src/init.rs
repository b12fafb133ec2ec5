//! Site initialization module.
//!
//! Creates a new site with a manifest, a starter template and some content:
//!
//! ```text
//! <root>/
//! ├── spot.toml
//! ├── static/styles.css
//! ├── content/index.md
//! ├── content/blog/first.md
//! └── templates/main.html
//! ```

use crate::config::{ContentRule, SiteConfig};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

const MAIN_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{{ page.title }} - {{ site.title }}</title>
    <meta name="description" content="{{ page.description or site.description }}">
    <link rel="stylesheet" href="/styles.css">
  </head>
  <body>
    <h1>{{ site.title }}</h1>
    <h2>{{ page.title }}</h2>
    <main>
      <section>
        <ul>
          {%- for p in pages_under("/blog") %}
          <li>
            <a class="blog-list-link" href="{{ p.url }}">{{ p.created_at | date("%d %b %Y") }} - {{ p.title }}</a>
          </li>
          {%- endfor %}
        </ul>
      </section>
      <section>
        {% block content %}{{ contents }}{% endblock %}
      </section>
    </main>
  </body>
</html>
"#;

const STYLES: &str = "body {\n  max-width: 48rem;\n  margin: 0 auto;\n  font-family: sans-serif;\n}\n";

const INDEX_MD: &str = "Welcome to spot! This is the index page for your website.\n";

const FIRST_POST_MD: &str = "---\ntitle: First post\ndescription: The very first post.\n---\n\nThis is the first blog post.\n";

/// Starter files, relative to the site root
const SITE_FILES: &[(&str, &str)] = &[
    ("static/styles.css", STYLES),
    ("content/index.md", INDEX_MD),
    ("content/blog/first.md", FIRST_POST_MD),
    ("templates/main.html", MAIN_TEMPLATE),
];

/// Create a new site at `root` with its manifest named `manifest`.
///
/// Without an explicit site name (`has_name == false`) the target is the
/// current directory, which must then be empty.
pub fn new_site(root: &Path, manifest: &str, has_name: bool) -> Result<()> {
    if !has_name && !is_dir_empty(root)? {
        bail!(
            "Current directory is not empty. Use `spot init <SITE_NAME>` to create in a subdirectory."
        );
    }

    let manifest_path = root.join(manifest);
    if manifest_path.exists() {
        bail!(
            "Config file `{}` already exists. Remove it manually or init in a different path.",
            manifest_path.display()
        );
    }

    for (relative, _) in SITE_FILES {
        let path = root.join(relative);
        if path.exists() {
            bail!(
                "Path `{}` already exists. Try `spot init <SITE_NAME>` instead.",
                path.display()
            );
        }
    }

    fs::create_dir_all(root).with_context(|| format!("Failed to create {}", root.display()))?;
    init_default_config(&manifest_path)?;
    for (relative, content) in SITE_FILES {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    Ok(())
}

/// Check if a directory is completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

/// The manifest a new site starts with.
fn starter_config() -> SiteConfig {
    let mut config = SiteConfig::default();
    config.site_title = "My Spot Site".into();
    config.site_description = "This website is created with spot!".into();
    config.content = vec![
        ContentRule {
            input_path: "index.md".into(),
            output_path: Some("index.html".into()),
            template: "main.html".into(),
            title: "Home".into(),
            ..ContentRule::default()
        },
        ContentRule {
            input_path: "/blog/".into(),
            template: "main.html".into(),
            title: "Blog".into(),
            ..ContentRule::default()
        },
    ];
    config
}

/// Write the starter manifest, as YAML for `.yaml`/`.yml` names, TOML otherwise.
fn init_default_config(path: &Path) -> Result<()> {
    let config = starter_config();
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::to_string(&config)?,
        _ => toml::to_string_pretty(&config)?,
    };
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{build::build_site, compiler::Converter, config::CONFIG_FILE};
    use std::path::PathBuf;

    /// Stands in for pandoc: wraps the file body in a paragraph.
    struct Paragraph;

    impl Converter for Paragraph {
        fn convert(&self, input: &Path, output_dir: &Path, base_name: &str) -> Result<PathBuf> {
            let body = crate::content::front_matter::strip(&fs::read_to_string(input)?).to_owned();
            let output = output_dir.join(format!("{base_name}.html"));
            fs::write(&output, format!("<p>{}</p>", body.trim()))?;
            Ok(output)
        }
    }

    #[test]
    fn test_scaffold_loads_and_builds() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        new_site(&root, CONFIG_FILE, true).unwrap();

        for (relative, _) in SITE_FILES {
            assert!(root.join(relative).is_file(), "{relative} missing");
        }

        let config = SiteConfig::from_path(&root.join(CONFIG_FILE)).unwrap();
        assert_eq!(config.site_title, "My Spot Site");
        assert_eq!(config.content.len(), 2);

        let index = build_site(&config, &Paragraph, None).unwrap();
        assert_eq!(index.len(), 2);

        let home = fs::read_to_string(config.build_path.join("index.html")).unwrap();
        assert!(home.contains("<title>Home - My Spot Site</title>"));
        assert!(home.contains("First post</a>"));

        let post = fs::read_to_string(config.build_path.join("blog/first.html")).unwrap();
        assert!(post.contains("<p>This is the first blog post.</p>"));
        assert!(!post.contains("description:"));
    }

    #[test]
    fn test_starter_config() {
        let config = starter_config();

        assert_eq!(config.site_title, "My Spot Site");
        assert_eq!(config.content[0].output_path, Some(PathBuf::from("index.html")));
        assert_eq!(config.content[1].input_path, PathBuf::from("/blog/"));
        assert_eq!(config.build_path, PathBuf::from("dist"));
    }

    #[test]
    fn test_yaml_manifest() {
        let dir = tempfile::tempdir().unwrap();
        new_site(dir.path(), "config.yaml", false).unwrap();

        let config = SiteConfig::from_path(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config.content[0].title, "Home");
    }

    #[test]
    fn test_refuses_non_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        assert!(new_site(dir.path(), CONFIG_FILE, false).is_err());
    }

    #[test]
    fn test_refuses_existing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("site");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(CONFIG_FILE), "").unwrap();

        let err = new_site(&root, CONFIG_FILE, true).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
