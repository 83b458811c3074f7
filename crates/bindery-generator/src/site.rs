//! In-memory site model.

use std::collections::BTreeMap;

use bindery_core::{Config, Page, Post};

use crate::loader::LoadedContent;

/// Everything one build renders: settings, ordered posts, tag index and pages.
///
/// A site is assembled fresh for every build and not mutated afterwards.
#[derive(Debug, Clone)]
pub struct Site {
    /// Resolved settings.
    pub config: Config,

    /// Posts, newest first. Posts sharing a date keep discovery order.
    pub posts: Vec<Post>,

    /// Tag to posts, each bucket in `posts` order.
    pub tags: BTreeMap<String, Vec<Post>>,

    /// Pages keyed by slug.
    pub pages: BTreeMap<String, Page>,
}

impl Site {
    /// Assemble a site from loaded content.
    #[must_use]
    pub fn assemble(config: Config, content: LoadedContent) -> Self {
        let LoadedContent { mut posts, pages } = content;

        posts.sort_by(|a, b| b.date.cmp(&a.date));

        let mut tags: BTreeMap<String, Vec<Post>> = BTreeMap::new();
        for post in &posts {
            for tag in &post.tags {
                tags.entry(tag.clone()).or_default().push(post.clone());
            }
        }

        Self {
            config,
            posts,
            tags,
            pages,
        }
    }

    /// The newest `limit` posts.
    #[must_use]
    pub fn recent_posts(&self, limit: usize) -> &[Post] {
        &self.posts[..self.posts.len().min(limit)]
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bindery_core::{PostKind, frontmatter::parse_date};

    use super::*;

    fn post(slug: &str, date: &str, tags: &[&str]) -> Post {
        Post {
            title: slug.to_uppercase(),
            date: parse_date(date).unwrap(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            slug: slug.to_string(),
            url: Post::url_for(slug),
            summary: String::new(),
            author: String::new(),
            cover: None,
            cover_src: None,
            content: String::new(),
            toc: String::new(),
            bundle_images: BTreeMap::new(),
            source: PathBuf::from(format!("{slug}.md")),
            kind: PostKind::Flat,
        }
    }

    fn assemble(posts: Vec<Post>) -> Site {
        Site::assemble(
            Config::default(),
            LoadedContent {
                posts,
                pages: BTreeMap::new(),
            },
        )
    }

    fn slugs(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_posts_sorted_newest_first() {
        let site = assemble(vec![
            post("jan", "2024-01-01", &[]),
            post("mar", "2024-03-01", &[]),
            post("feb", "2024-02-01", &[]),
        ]);
        assert_eq!(slugs(&site.posts), ["mar", "feb", "jan"]);
    }

    #[test]
    fn test_equal_dates_keep_discovery_order() {
        let site = assemble(vec![
            post("b", "2024-01-01", &[]),
            post("a", "2024-01-01", &[]),
            post("c", "2024-01-01", &[]),
        ]);
        assert_eq!(slugs(&site.posts), ["b", "a", "c"]);
    }

    #[test]
    fn test_undated_posts_sort_last() {
        let mut undated = post("undated", "2024-01-01", &[]);
        undated.date = bindery_core::frontmatter::zero_date();
        let site = assemble(vec![undated, post("dated", "2020-05-05", &[])]);
        assert_eq!(slugs(&site.posts), ["dated", "undated"]);
    }

    #[test]
    fn test_tag_buckets_follow_post_order() {
        let site = assemble(vec![
            post("old", "2023-01-01", &["rust", "web"]),
            post("new", "2024-01-01", &["rust"]),
            post("mid", "2023-06-01", &["Rust", "rust"]),
        ]);

        assert_eq!(slugs(&site.tags["rust"]), ["new", "mid", "old"]);
        assert_eq!(slugs(&site.tags["Rust"]), ["mid"]);
        assert_eq!(slugs(&site.tags["web"]), ["old"]);
    }

    #[test]
    fn test_recent_posts_caps() {
        let site = assemble(vec![
            post("a", "2024-01-01", &[]),
            post("b", "2024-01-02", &[]),
        ]);
        assert_eq!(site.recent_posts(1).len(), 1);
        assert_eq!(site.recent_posts(10).len(), 2);
    }
}
