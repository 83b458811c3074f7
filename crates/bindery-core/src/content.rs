//! Content records produced by the loader.

use std::{collections::BTreeMap, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Maximum summary length, in characters, before truncation.
pub const SUMMARY_MAX_CHARS: usize = 150;

/// File extensions checked for cover images, in priority order.
pub const COVER_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];

/// Kind of post source on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    /// A single Markdown file directly under the posts directory.
    Flat,
    /// A directory holding `index.md` and co-located media.
    Bundle,
}

/// A dated blog post.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    /// Post title.
    pub title: String,

    /// Publication date.
    pub date: DateTime<Utc>,

    /// Tags, in declaration order.
    pub tags: Vec<String>,

    /// URL-safe identifier.
    pub slug: String,

    /// Site-relative URL, `/posts/<slug>/`.
    pub url: String,

    /// Plain-text summary.
    pub summary: String,

    /// Author name.
    pub author: String,

    /// Public URL of the cover image, if any.
    pub cover: Option<String>,

    /// Source path of the cover image, if any.
    #[serde(skip)]
    pub cover_src: Option<PathBuf>,

    /// Rendered body HTML.
    pub content: String,

    /// Rendered table of contents HTML.
    pub toc: String,

    /// Image references found in a bundle body: relative path -> source path.
    #[serde(skip)]
    pub bundle_images: BTreeMap<String, PathBuf>,

    /// Source document the post was read from.
    #[serde(skip)]
    pub source: PathBuf,

    /// How the post is stored on disk.
    pub kind: PostKind,
}

impl Post {
    /// Site-relative URL for a post slug.
    pub fn url_for(slug: &str) -> String {
        format!("/posts/{slug}/")
    }

    /// Public URL of a cover copied next to the post.
    pub fn cover_url_for(slug: &str, extension: &str) -> String {
        format!("/posts/{slug}/cover.{extension}")
    }
}

/// A standalone page, one per top-level content file.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    /// Page title.
    pub title: String,

    /// URL-safe identifier.
    pub slug: String,

    /// Site-relative URL, `/<slug>/`.
    pub url: String,

    /// Rendered body HTML.
    pub content: String,

    /// Source document the page was read from.
    #[serde(skip)]
    pub source: PathBuf,
}

impl Page {
    /// Site-relative URL for a page slug.
    pub fn url_for(slug: &str) -> String {
        format!("/{slug}/")
    }
}

/// Slug derived from a file or directory name: the name with its extension
/// stripped.
pub fn slug_of(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Whether a value can be used as a single directory name: non-empty, not
/// `.` or `..`, and free of path separators.
pub fn is_path_segment(value: &str) -> bool {
    !value.is_empty() && value != "." && value != ".." && !value.contains(['/', '\\'])
}

/// Derive a summary from a Markdown body.
///
/// Returns the first paragraph that is not a heading, code fence, image or
/// table, flattened to one line and truncated to [`SUMMARY_MAX_CHARS`].
pub fn extract_summary(body: &str) -> String {
    let body = body.replace("\r\n", "\n");
    for para in body.split("\n\n") {
        let p = para.trim();
        if p.is_empty() {
            continue;
        }
        if p.starts_with('#') || p.starts_with("```") || p.starts_with("![") || p.starts_with('|')
        {
            continue;
        }
        let flat = p.replace('\n', " ");
        return truncate_chars(&flat, SUMMARY_MAX_CHARS);
    }
    String::new()
}

/// Truncate text to `max_chars` characters, appending `...` when cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_paragraph() {
        assert_eq!(extract_summary("First.\n\nSecond."), "First.");
    }

    #[test]
    fn test_skips_heading() {
        assert_eq!(extract_summary("# Title\n\nBody paragraph."), "Body paragraph.");
    }

    #[test]
    fn test_skips_code_block() {
        assert_eq!(
            extract_summary("```rust\nfn main() {}\n```\n\nBody paragraph."),
            "Body paragraph."
        );
    }

    #[test]
    fn test_skips_image_and_table() {
        assert_eq!(
            extract_summary("![alt](a.png)\n\n| A | B |\n|---|---|\n| 1 | 2 |\n\nText."),
            "Text."
        );
    }

    #[test]
    fn test_joins_lines() {
        assert_eq!(extract_summary("one\ntwo"), "one two");
    }

    #[test]
    fn test_truncates_cjk_by_chars() {
        let long = "字".repeat(200);
        let summary = extract_summary(&long);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_short_text_untouched() {
        let text = "a".repeat(SUMMARY_MAX_CHARS);
        assert_eq!(extract_summary(&text), text);
    }

    #[test]
    fn test_empty_and_headings_only() {
        assert_eq!(extract_summary(""), "");
        assert_eq!(extract_summary("# H1\n\n## H2\n\n### H3"), "");
    }

    #[test]
    fn test_slug_of() {
        assert_eq!(slug_of("hello-world.md"), "hello-world");
        assert_eq!(slug_of("2024-trip"), "2024-trip");
        assert_eq!(slug_of("archive.tar.md"), "archive.tar");
        assert_eq!(slug_of(".hidden"), ".hidden");
    }

    #[test]
    fn test_is_path_segment() {
        assert!(is_path_segment("hello-world"));
        assert!(is_path_segment("..dots"));
        for bad in ["", ".", "..", "../../escaped", "a/b", "a\\b"] {
            assert!(!is_path_segment(bad), "{bad:?}");
        }
    }

    #[test]
    fn test_urls() {
        assert_eq!(Post::url_for("hello"), "/posts/hello/");
        assert_eq!(Post::cover_url_for("hello", "png"), "/posts/hello/cover.png");
        assert_eq!(Page::url_for("about"), "/about/");
    }
}
