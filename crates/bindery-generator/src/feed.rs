//! RSS feed generation.
//!
//! Produces an RSS 2.0 document with `content:encoded` bodies. Post HTML is
//! cleaned of copy buttons and every relative `src`/`href` is made absolute so
//! the content reads correctly outside the site.

use std::{borrow::Cow, collections::BTreeMap, sync::LazyLock};

use bindery_core::{Config, Post};
use regex::{Captures, Regex};
use rss::{
    ChannelBuilder, GuidBuilder, Item, ItemBuilder,
    extension::atom::{AtomExtension, Link},
};
use thiserror::Error;
use tracing::debug;

use crate::site::Site;

/// File name of the feed in the output root.
pub const FEED_FILE: &str = "feed.xml";

/// Maximum number of posts in the feed.
pub const FEED_MAX_ITEMS: usize = 10;

const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";
const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

static COPY_BUTTON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<button[^>]*class="copy-btn"[^>]*>.*?</button>"#)
        .expect("copy button pattern is valid")
});
static SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="([^"]+)""#).expect("src pattern is valid"));
static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]+)""#).expect("href pattern is valid"));

/// Feed generation errors.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Serializing the channel failed.
    #[error("writing feed: {0}")]
    Rss(#[from] rss::Error),
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;

/// Build the feed for a site. Returns `None` when no base URL is configured.
pub fn build_feed(site: &Site) -> Result<Option<Vec<u8>>> {
    if site.config.base_url.is_empty() {
        debug!("base_url is empty, skipping feed");
        return Ok(None);
    }
    let generator = FeedGenerator::new(&site.config);
    generator.generate(site.recent_posts(FEED_MAX_ITEMS)).map(Some)
}

/// RSS feed generator.
#[derive(Debug)]
pub struct FeedGenerator<'a> {
    config: &'a Config,
    base_url: &'a str,
}

impl<'a> FeedGenerator<'a> {
    /// Create a new feed generator.
    #[must_use]
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            base_url: config.base_url.trim_end_matches('/'),
        }
    }

    /// Generate feed XML for the given posts, newest first.
    pub fn generate(&self, posts: &[Post]) -> Result<Vec<u8>> {
        debug!(count = posts.len(), "generating feed");

        let items: Vec<Item> = posts.iter().map(|post| self.post_to_item(post)).collect();

        let mut self_link = Link::default();
        self_link.set_href(self.config.permalink(&format!("/{FEED_FILE}")));
        self_link.set_rel("self");
        self_link.set_mime_type(Some("application/rss+xml".to_string()));
        let mut atom = AtomExtension::default();
        atom.set_links(vec![self_link]);

        let namespaces = BTreeMap::from([
            ("atom".to_string(), ATOM_NAMESPACE.to_string()),
            ("content".to_string(), CONTENT_NAMESPACE.to_string()),
        ]);

        let channel = ChannelBuilder::default()
            .title(&self.config.title)
            .link(self.base_url)
            .description(&self.config.title)
            .namespaces(namespaces)
            .atom_ext(Some(atom))
            .items(items)
            .build();

        Ok(channel.pretty_write_to(Vec::new(), b' ', 2)?)
    }

    /// Convert a post to an RSS item.
    fn post_to_item(&self, post: &Post) -> Item {
        let permalink = self.config.permalink(&post.url);
        let guid = GuidBuilder::default()
            .value(permalink.clone())
            .permalink(true)
            .build();

        ItemBuilder::default()
            .title(Some(post.title.clone()))
            .link(Some(permalink))
            .guid(Some(guid))
            .pub_date(Some(post.date.format("%a, %d %b %Y %H:%M:%S %z").to_string()))
            .description(Some(post.summary.clone()))
            .content(Some(feed_content(post, self.config)))
            .build()
    }
}

/// Post HTML prepared for the feed: copy buttons removed, URLs absolute and
/// the cover, if any, prepended.
pub fn feed_content(post: &Post, config: &Config) -> String {
    let base_url = config.base_url.trim_end_matches('/');
    let permalink = config.permalink(&post.url);
    let content = strip_ui_elements(&post.content);
    let content = absolutize_urls(&content, base_url, &permalink);

    match &post.cover {
        Some(cover) => {
            let src = rewrite_url(cover, base_url, &permalink);
            format!("<img src=\"{src}\" alt=\"cover\" style=\"max-width:100%\"><br>\n{content}")
        }
        None => content,
    }
}

/// Remove interactive controls injected into code blocks.
pub fn strip_ui_elements(html: &str) -> Cow<'_, str> {
    COPY_BUTTON.replace_all(html, "")
}

/// Rewrite every `src="…"` and `href="…"` to an absolute URL. Relative
/// URLs resolve against `permalink`, the post's absolute URL.
pub fn absolutize_urls(html: &str, base_url: &str, permalink: &str) -> String {
    let html = SRC_ATTR.replace_all(html, |caps: &Captures<'_>| {
        format!("src=\"{}\"", rewrite_url(&caps[1], base_url, permalink))
    });
    HREF_ATTR
        .replace_all(&html, |caps: &Captures<'_>| {
            format!("href=\"{}\"", rewrite_url(&caps[1], base_url, permalink))
        })
        .into_owned()
}

/// Resolve one URL: absolute ones are kept, root-relative ones are joined to
/// the base URL and everything else is resolved against the post permalink.
fn rewrite_url(raw: &str, base_url: &str, post_base: &str) -> String {
    if raw.contains("://") || raw.starts_with("//") {
        raw.to_string()
    } else if raw.starts_with('/') {
        format!("{base_url}{raw}")
    } else if let Some(rest) = raw.strip_prefix("./") {
        format!("{post_base}{rest}")
    } else {
        format!("{post_base}{raw}")
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bindery_core::{PostKind, frontmatter::parse_date};
    use bindery_parser::markdown::COPY_BUTTON as BUTTON_HTML;

    use super::*;
    use crate::loader::LoadedContent;

    const BASE: &str = "https://example.com";

    fn test_config() -> Config {
        Config {
            title: "Test Blog".to_string(),
            base_url: BASE.to_string(),
            ..Default::default()
        }
    }

    fn post(slug: &str, date: &str) -> Post {
        Post {
            title: format!("Post {slug}"),
            date: parse_date(date).unwrap(),
            tags: vec![],
            slug: slug.to_string(),
            url: Post::url_for(slug),
            summary: format!("Summary of {slug}"),
            author: String::new(),
            cover: None,
            cover_src: None,
            content: format!("<p>Body of {slug}</p>"),
            toc: String::new(),
            bundle_images: BTreeMap::new(),
            source: PathBuf::new(),
            kind: PostKind::Flat,
        }
    }

    fn site(config: Config, posts: Vec<Post>) -> Site {
        Site::assemble(
            config,
            LoadedContent {
                posts,
                pages: BTreeMap::new(),
            },
        )
    }

    #[test]
    fn test_rewrite_rules() {
        let post_base = "https://example.com/posts/a/";
        assert_eq!(rewrite_url("https://cdn.io/x.png", BASE, post_base), "https://cdn.io/x.png");
        assert_eq!(rewrite_url("//cdn.io/x.png", BASE, post_base), "//cdn.io/x.png");
        assert_eq!(rewrite_url("/img/x.png", BASE, post_base), "https://example.com/img/x.png");
        assert_eq!(rewrite_url("./x.png", BASE, post_base), "https://example.com/posts/a/x.png");
        assert_eq!(rewrite_url("img/x.png", BASE, post_base), "https://example.com/posts/a/img/x.png");
    }

    #[test]
    fn test_absolutize_src_and_href() {
        let html = r#"<img src="a.png" alt=""><a href="/about/">about</a><a href="https://x.io">x</a>"#;
        let out = absolutize_urls(html, BASE, "https://example.com/posts/p/");
        assert_eq!(
            out,
            r#"<img src="https://example.com/posts/p/a.png" alt=""><a href="https://example.com/about/">about</a><a href="https://x.io">x</a>"#
        );
    }

    #[test]
    fn test_strip_copy_buttons() {
        let html = format!("<pre><code>x</code>{BUTTON_HTML}</pre>");
        assert_eq!(strip_ui_elements(&html), "<pre><code>x</code></pre>");
    }

    #[test]
    fn test_cover_prepended() {
        let mut p = post("c", "2024-01-01");
        p.cover = Some("/posts/c/cover.png".to_string());
        let content = feed_content(&p, &test_config());
        assert!(content.starts_with(
            "<img src=\"https://example.com/posts/c/cover.png\" alt=\"cover\" style=\"max-width:100%\"><br>\n"
        ));
        assert!(content.ends_with("<p>Body of c</p>"));
    }

    #[test]
    fn test_feed_skipped_without_base_url() {
        let config = Config {
            title: "T".to_string(),
            ..Default::default()
        };
        let site = site(config, vec![post("a", "2024-01-01")]);
        assert!(build_feed(&site).unwrap().is_none());
    }

    #[test]
    fn test_feed_caps_and_orders() {
        let posts = (1..=12)
            .map(|day| post(&format!("p{day:02}"), &format!("2024-01-{day:02}")))
            .collect();
        let site = site(test_config(), posts);

        let xml = String::from_utf8(build_feed(&site).unwrap().unwrap()).unwrap();

        assert_eq!(xml.matches("<item>").count(), FEED_MAX_ITEMS);
        assert!(xml.contains("Post p12"));
        assert!(!xml.contains("Post p02"));
        assert!(xml.find("Post p12").unwrap() < xml.find("Post p11").unwrap());
    }

    #[test]
    fn test_feed_channel_and_item_fields() {
        let site = site(test_config(), vec![post("a", "2024-01-15")]);
        let xml = String::from_utf8(build_feed(&site).unwrap().unwrap()).unwrap();

        assert!(xml.contains("<title>Test Blog</title>"));
        assert!(xml.contains("<link>https://example.com</link>"));
        assert!(xml.contains(r#"xmlns:content="http://purl.org/rss/1.0/modules/content/""#));
        assert!(xml.contains("https://example.com/feed.xml"));
        assert!(xml.contains(r#"rel="self""#));
        assert!(xml.contains("https://example.com/posts/a/</guid>"));
        assert!(xml.contains("<pubDate>Mon, 15 Jan 2024 00:00:00 +0000</pubDate>"));
        assert!(xml.contains("<content:encoded>"));
    }

    #[test]
    fn test_trailing_slash_base_url() {
        let config = Config {
            base_url: "https://example.com/".to_string(),
            ..test_config()
        };
        let mut p = post("a", "2024-01-15");
        p.content = r#"<img src="pic.png"><a href="/about/">about</a>"#.to_string();
        let site = site(config, vec![p]);

        let xml = String::from_utf8(build_feed(&site).unwrap().unwrap()).unwrap();

        assert!(xml.contains("<link>https://example.com/posts/a/</link>"));
        assert!(xml.contains("https://example.com/feed.xml"));
        assert!(xml.contains("https://example.com/posts/a/pic.png"));
        assert!(xml.contains("https://example.com/about/"));
        assert!(!xml.contains("example.com//"));
    }
}
