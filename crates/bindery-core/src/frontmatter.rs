//! Front matter parsing for content files.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, Result};

/// Delimiter opening and closing the metadata block.
const DELIMITER: &str = "---";

/// Front matter metadata for content files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontmatter {
    /// Document title.
    #[serde(default)]
    pub title: String,

    /// Publication date. Absent dates become [`zero_date`].
    #[serde(default = "zero_date", deserialize_with = "deserialize_date")]
    pub date: DateTime<Utc>,

    /// Tags, in declaration order.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,

    /// Explicit slug override.
    #[serde(default)]
    pub slug: Option<String>,

    /// Post author.
    #[serde(default)]
    pub author: Option<String>,

    /// Explicit summary, overriding the derived one.
    #[serde(default)]
    pub summary: Option<String>,

    /// Parse the file but leave it out of the site.
    #[serde(default)]
    pub ignore: bool,
}

impl Default for Frontmatter {
    fn default() -> Self {
        Self {
            title: String::new(),
            date: zero_date(),
            tags: Vec::new(),
            slug: None,
            author: None,
            summary: None,
            ignore: false,
        }
    }
}

/// The timestamp used for undated content: `0001-01-01T00:00:00Z`.
///
/// Sorts after every real date under newest-first ordering.
pub fn zero_date() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Parse a front matter date in one of the accepted layouts.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(Utc.from_utc_datetime(&dt));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

fn deserialize_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(zero_date()),
        Some(s) if s.trim().is_empty() => Ok(zero_date()),
        Some(s) => parse_date(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {s:?}"))),
    }
}

fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(tags.unwrap_or_default())
}

/// Split a document into its metadata block and trimmed body.
///
/// The document must start with `---` on its own line and the block must be
/// closed by a line starting with `---`.
pub fn split_frontmatter(content: &str) -> std::result::Result<(&str, &str), &'static str> {
    let content = content.trim();
    let Some(rest) = content
        .strip_prefix(DELIMITER)
        .and_then(|rest| rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")))
    else {
        return Err("missing front matter: file must start with ---");
    };

    let end = rest
        .find("\n---")
        .ok_or("front matter not closed")?;

    let frontmatter = &rest[..end];
    let body = rest[end + 1 + DELIMITER.len()..].trim();

    Ok((frontmatter, body))
}

/// Parse front matter and body from a document.
pub fn parse_frontmatter(content: &str, path: &Path) -> Result<(Frontmatter, String)> {
    let (fm_str, body) =
        split_frontmatter(content).map_err(|msg| CoreError::frontmatter(path, msg))?;

    let frontmatter = if fm_str.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(fm_str).map_err(|e| {
            CoreError::frontmatter(path, format!("parsing front matter yaml: {e}"))
        })?
    };

    Ok((frontmatter, body.to_string()))
}
