//! Machine-readable search index.

use bindery_core::Post;
use serde::Serialize;

/// File name of the search index in the output root.
pub const SEARCH_INDEX_FILE: &str = "search.json";

/// One searchable post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchEntry {
    pub title: String,
    pub url: String,
    /// Publication date as `YYYY-MM-DD`.
    pub date: String,
}

impl From<&Post> for SearchEntry {
    fn from(post: &Post) -> Self {
        Self {
            title: post.title.clone(),
            url: post.url.clone(),
            date: post.date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Search entries for posts, in the order given.
#[must_use]
pub fn search_index(posts: &[Post]) -> Vec<SearchEntry> {
    posts.iter().map(SearchEntry::from).collect()
}

/// Serialize the search index for posts as JSON.
pub fn to_json(posts: &[Post]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(&search_index(posts))
}
