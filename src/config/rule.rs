//! `[[content]]` rules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

/// One `[[content]]` entry: build settings for a file or a whole directory.
///
/// Paths are written relative in the manifest and made absolute by
/// [`SiteConfig::resolve_paths`](super::SiteConfig::resolve_paths).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentRule {
    /// File or directory under `content_path`
    pub input_path: PathBuf,

    /// Destination under `build_path`; only valid for single-file rules
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "empty_as_none")]
    pub output_path: Option<PathBuf>,

    /// Template under `templates_path`
    pub template: PathBuf,

    pub title: String,
    pub description: String,

    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "crate::content::front_matter::deserialize_created_at"
    )]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// `output_path = ""` means the same as leaving it out.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = Option::<PathBuf>::deserialize(deserializer)?;
    Ok(path.filter(|p| !p.as_os_str().is_empty()))
}
