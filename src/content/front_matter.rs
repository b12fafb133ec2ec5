//! Front matter: a metadata block at the very top of a content file.
//!
//! Two fences are recognised:
//!
//! ```text
//! ---                       +++
//! title: Hello              title = "Hello"
//! tags: [a, b]              tags = ["a", "b"]
//! ---                       +++
//! body...                   body...
//! ```
//!
//! YAML blocks may also be closed with `...`. A file without an opening fence
//! simply has no front matter.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, de::Error as _};
use std::{collections::BTreeMap, fs, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("failed to read `{0}`")]
    Io(String, #[source] std::io::Error),

    #[error("front matter is not closed")]
    Unterminated,

    #[error("invalid YAML front matter")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid TOML front matter")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Toml,
}

impl Format {
    const fn fence(self) -> &'static str {
        match self {
            Self::Yaml => "---",
            Self::Toml => "+++",
        }
    }
}

/// Metadata read from a file. Only fields that are present override the
/// matching content rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: Option<DateTime<Utc>>,
    pub tags: Option<Vec<String>>,
    #[serde(deserialize_with = "deserialize_metadata")]
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Split `content` into `(format, block, body)` if it opens with a fence.
pub fn split(content: &str) -> Result<Option<(Format, &str, &str)>, FrontMatterError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let format = match first_line(content) {
        "---" => Format::Yaml,
        "+++" => Format::Toml,
        _ => return Ok(None),
    };

    let block_start = content.find('\n').map_or(content.len(), |i| i + 1);
    let mut offset = block_start;

    for line in content[block_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        let closes = trimmed == format.fence() || (format == Format::Yaml && trimmed == "...");
        if closes {
            let block = &content[block_start..offset];
            let body = &content[offset + line.len()..];
            return Ok(Some((format, block, body)));
        }
        offset += line.len();
    }

    Err(FrontMatterError::Unterminated)
}

/// Parse the front matter of `content`, returning it with the remaining body.
pub fn parse(content: &str) -> Result<Option<(FrontMatter, &str)>, FrontMatterError> {
    let Some((format, block, body)) = split(content)? else {
        return Ok(None);
    };

    let front_matter = match format {
        // An empty YAML document deserializes to unit, not a map
        Format::Yaml if block.trim().is_empty() => FrontMatter::default(),
        Format::Yaml => serde_yaml::from_str(block)?,
        Format::Toml => toml::from_str(block)?,
    };

    Ok(Some((front_matter, body)))
}

/// Body of `content` with any front matter removed.
///
/// Only a block that parses is removed. Anything else (an unterminated
/// fence, or a `---` rule around ordinary prose) stays for the converter.
pub fn strip(content: &str) -> &str {
    match parse(content) {
        Ok(Some((_, body))) => body,
        _ => content,
    }
}

/// Read and parse the front matter of a file.
///
/// Binary files (office documents, notebooks) are read lossily; they never
/// start with a fence so they yield `Ok(None)`.
pub fn read(path: &Path) -> Result<Option<FrontMatter>, FrontMatterError> {
    let bytes = fs::read(path).map_err(|e| FrontMatterError::Io(path.display().to_string(), e))?;
    let content = String::from_utf8_lossy(&bytes);
    Ok(parse(&content)?.map(|(front_matter, _)| front_matter))
}

fn first_line(content: &str) -> &str {
    content.lines().next().unwrap_or_default().trim_end()
}

// ============================================================================
// Field deserializers
// ============================================================================

/// Parse `created_at` from RFC 3339, `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DD`.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Some(datetime.with_timezone(&Utc));
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(datetime.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Shared by front matter and content rules.
pub fn deserialize_created_at<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Toml(toml::value::Datetime),
    }

    let text = match Option::<Raw>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Raw::Text(text)) if text.trim().is_empty() => return Ok(None),
        Some(Raw::Text(text)) => text,
        Some(Raw::Toml(datetime)) => datetime.to_string(),
    };

    parse_date(&text)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("invalid created_at `{text}`")))
}

/// Metadata values may be written as any scalar; they are kept as strings.
fn deserialize_metadata<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Bool(bool),
        Int(i64),
        Float(f64),
    }

    let raw = Option::<BTreeMap<String, Scalar>>::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Scalar::Text(s) => s,
                    Scalar::Bool(b) => b.to_string(),
                    Scalar::Int(i) => i.to_string(),
                    Scalar::Float(f) => f.to_string(),
                };
                (key, value)
            })
            .collect()
    }))
}
