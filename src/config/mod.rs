//! Site configuration management.
//!
//! Handles loading, resolving, and validating the `spot.toml` manifest.
//!
//! # Path resolution
//!
//! Every path in the manifest is relative to the manifest's own directory:
//!
//! ```text
//! /site/spot.toml            content_path = "content"
//!                            [[content]] input_path = "blog"
//!                                        template   = "main.html"
//!          │
//!          ▼ resolve_paths("/site")
//! content_path        = /site/content
//! content[0].input    = /site/content/blog
//! content[0].template = /site/templates/main.html
//! ```
//!
//! The rule index ([`PathTrie`]) is rebuilt from scratch every time the
//! paths are resolved; nothing about it is updated incrementally.

mod error;
mod rule;

pub use error::ConfigError;
pub use rule::ContentRule;

use crate::{cli::Cli, content::PathTrie, utils::fs as fs_utils};
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    net::{SocketAddr, ToSocketAddrs},
    path::{Path, PathBuf},
};

/// Default manifest filename
pub const CONFIG_FILE: &str = "spot.toml";

/// Default values for serde deserialization
pub mod config_defaults {
    use std::path::PathBuf;

    pub fn content_path() -> PathBuf {
        "content".into()
    }
    pub fn static_path() -> PathBuf {
        "static".into()
    }
    pub fn templates_path() -> PathBuf {
        "templates".into()
    }
    pub fn build_path() -> PathBuf {
        "dist".into()
    }
    pub fn converter() -> Vec<String> {
        vec!["pandoc".into()]
    }

    pub mod serve {
        pub fn address() -> String {
            ":8080".into()
        }
    }
}

/// `[serve]` section
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    /// Listen address, e.g.: ":8080", "127.0.0.1:3000"
    #[serde(default = "config_defaults::serve::address")]
    #[educe(Default = config_defaults::serve::address())]
    pub address: String,
}

impl ServeConfig {
    /// Resolve the listen address. A bare `:port` binds every interface.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let address = if self.address.starts_with(':') {
            format!("0.0.0.0{}", self.address)
        } else {
            self.address.clone()
        };

        address
            .to_socket_addrs()
            .with_context(|| format!("Invalid serve address `{}`", self.address))?
            .next()
            .with_context(|| format!("Serve address `{}` resolved to nothing", self.address))
    }
}

/// Root configuration structure representing spot.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path of the manifest this config was loaded from
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Documents to turn into pages
    #[serde(default = "config_defaults::content_path")]
    #[educe(Default = config_defaults::content_path())]
    pub content_path: PathBuf,

    /// Files copied verbatim into the output root
    #[serde(default = "config_defaults::static_path")]
    #[educe(Default = config_defaults::static_path())]
    pub static_path: PathBuf,

    /// Page templates
    #[serde(default = "config_defaults::templates_path")]
    #[educe(Default = config_defaults::templates_path())]
    pub templates_path: PathBuf,

    /// Output root
    #[serde(default = "config_defaults::build_path")]
    #[educe(Default = config_defaults::build_path())]
    pub build_path: PathBuf,

    /// Template applied to files no content rule matches
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub default_template: Option<PathBuf>,

    /// Site title, exposed to templates as `site.title`
    #[serde(default)]
    pub site_title: String,

    /// Site description, exposed to templates as `site.description`
    #[serde(default)]
    pub site_description: String,

    /// Document converter command and leading arguments
    #[serde(default = "config_defaults::converter")]
    #[educe(Default = config_defaults::converter())]
    pub converter: Vec<String>,

    /// Development server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Content rules, most specific match wins
    #[serde(default)]
    pub content: Vec<ContentRule>,

    /// Index over `content[].input_path`
    #[serde(skip)]
    rules: PathTrie,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.as_os_str().is_empty()))
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: SiteConfig = serde_yaml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path and resolve every path against the
    /// manifest's directory.
    ///
    /// `.yaml` / `.yml` manifests are parsed as YAML, everything else as TOML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path)
            .map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let content =
            fs::read_to_string(&path).map_err(|err| ConfigError::Io(path.clone(), err))?;

        let mut config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            _ => Self::from_str(&content),
        }
        .with_context(|| format!("Failed to parse {}", path.display()))?;

        let root = path.parent().unwrap_or(Path::new("/")).to_path_buf();
        config.config_path = path;
        config.resolve_paths(&root);
        Ok(config)
    }

    /// Make every configured path absolute and rebuild the rule index.
    pub fn resolve_paths(&mut self, root: &Path) {
        self.content_path = root.join(&self.content_path);
        self.static_path = root.join(&self.static_path);
        self.templates_path = root.join(&self.templates_path);
        self.build_path = root.join(&self.build_path);

        if let Some(template) = &self.default_template {
            self.default_template = Some(self.templates_path.join(template));
        }

        let mut rules = PathTrie::default();
        for (index, rule) in self.content.iter_mut().enumerate() {
            rule.input_path = join_relative(&self.content_path, &rule.input_path);
            rule.template = self.templates_path.join(&rule.template);
            if let Some(output) = &rule.output_path {
                rule.output_path = Some(join_relative(&self.build_path, output));
            }
            rules.insert(&rule.input_path, index);
        }
        self.rules = rules;
    }

    /// Most specific content rule for an absolute file path.
    pub fn match_rule(&self, path: &Path) -> Option<&ContentRule> {
        self.rules.search(path).and_then(|index| self.content.get(index))
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Some(addr) = cli.addr() {
            self.serve.address = addr.to_owned();
        }
    }

    /// Whether `path` lies inside the output root or one of its build siblings.
    pub fn is_output_path(&self, path: &Path) -> bool {
        path.starts_with(&self.build_path)
            || path.starts_with(fs_utils::staging_dir(&self.build_path))
            || path.starts_with(fs_utils::retired_dir(&self.build_path))
    }

    /// Validate configuration before building.
    pub fn validate(&self) -> Result<()> {
        Self::check_command_installed("[converter]", &self.converter)?;

        if !self.content_path.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[content_path] `{}` is not a directory",
                self.content_path.display()
            )));
        }

        for (field, source) in [
            ("content_path", &self.content_path),
            ("static_path", &self.static_path),
            ("templates_path", &self.templates_path),
        ] {
            if self.build_path.starts_with(source) {
                bail!(ConfigError::Validation(format!(
                    "[build_path] must not be inside [{field}]"
                )));
            }
        }

        for rule in &self.content {
            if rule.output_path.is_some() && rule.input_path.is_dir() {
                bail!(ConfigError::Validation(format!(
                    "content rule `{}` is a directory and cannot set output_path",
                    rule.input_path.display()
                )));
            }
        }

        self.serve.socket_addr()?;

        Ok(())
    }

    /// Check if a command is installed and available
    fn check_command_installed(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        which::which(cmd).with_context(|| format!("`{cmd}` not found. Please install it first."))?;

        Ok(())
    }
}

/// Join a manifest path onto a root, treating a leading `/` as relative to
/// that root rather than to the filesystem root.
fn join_relative(root: &Path, path: &Path) -> PathBuf {
    match path.strip_prefix("/") {
        Ok(relative) => root.join(relative),
        Err(_) => root.join(path),
    }
}
