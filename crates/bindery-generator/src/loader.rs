//! Content loading.
//!
//! Reads posts from `content/posts/` (flat Markdown files or bundle
//! directories) and pages from the top level of `content/`, producing
//! normalized [`Post`] and [`Page`] records.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use bindery_core::{
    Config, CoreError, Page, Post, PostKind,
    content::{COVER_EXTENSIONS, extract_summary, is_path_segment, slug_of},
    frontmatter::parse_frontmatter,
};
use bindery_parser::{Converter, ParserError};
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

/// Content directory, relative to the project root.
pub const CONTENT_DIR: &str = "content";

/// Posts directory, relative to the content directory.
pub const POSTS_DIR: &str = "posts";

/// Document holding a bundle post.
pub const BUNDLE_INDEX: &str = "index.md";

static IMAGE_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!\[[^\]]*\]\(([^)\s]+)(?:\s+"[^"]*")?\)"#).expect("image pattern is valid")
});

/// Content loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    /// IO error on a specific path.
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Front matter error.
    #[error(transparent)]
    Frontmatter(#[from] CoreError),

    /// Markdown conversion failed.
    #[error("converting {path}: {source}")]
    Convert {
        path: PathBuf,
        #[source]
        source: ParserError,
    },

    /// The content directory is missing.
    #[error("content directory not found: {0}")]
    MissingContentDir(PathBuf),

    /// A slug that cannot be used as a single directory name.
    #[error("invalid slug {slug:?} in {path}")]
    InvalidSlug { slug: String, path: PathBuf },

    /// Two posts resolve to the same slug.
    #[error("duplicate post slug {slug:?}: {first} and {second}")]
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoadError>;

/// Posts and pages read from disk.
#[derive(Debug, Default)]
pub struct LoadedContent {
    /// Posts in discovery order.
    pub posts: Vec<Post>,

    /// Pages keyed by slug.
    pub pages: BTreeMap<String, Page>,
}

/// A post found under the posts directory.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PostSource {
    /// A Markdown file.
    Flat(PathBuf),
    /// A directory containing `index.md`.
    Bundle(PathBuf),
}

/// Loads posts and pages from a content directory.
pub struct ContentLoader<'a> {
    config: &'a Config,
    converter: &'a dyn Converter,
    content_dir: PathBuf,
}

impl<'a> ContentLoader<'a> {
    /// Create a new content loader.
    #[must_use]
    pub fn new(
        config: &'a Config,
        converter: &'a dyn Converter,
        content_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            converter,
            content_dir: content_dir.into(),
        }
    }

    /// Load all posts and pages.
    pub fn load(&self) -> Result<LoadedContent> {
        info!(dir = %self.content_dir.display(), "loading content");

        let posts = self.load_posts()?;
        let pages = self.load_pages()?;

        info!(posts = posts.len(), pages = pages.len(), "content loaded");
        Ok(LoadedContent { posts, pages })
    }

    /// Load posts in discovery order. A missing posts directory yields none.
    pub fn load_posts(&self) -> Result<Vec<Post>> {
        let sources = self.discover_posts()?;
        debug!(count = sources.len(), "found post sources");

        let posts: Vec<Option<Post>> = sources
            .par_iter()
            .map(|source| self.load_post(source))
            .collect::<Result<_>>()?;
        let posts: Vec<Post> = posts.into_iter().flatten().collect();

        check_unique_slugs(&posts)?;
        Ok(posts)
    }

    /// Load every Markdown file directly under the content directory as a page.
    pub fn load_pages(&self) -> Result<BTreeMap<String, Page>> {
        if !self.content_dir.is_dir() {
            return Err(LoadError::MissingContentDir(self.content_dir.clone()));
        }

        let mut pages = BTreeMap::new();
        for path in sorted_entries(&self.content_dir)? {
            if path.is_dir() || !is_markdown(&path) {
                continue;
            }

            let (frontmatter, body) = self.read_document(&path)?;
            if frontmatter.ignore {
                debug!(path = %path.display(), "skipping ignored page");
                continue;
            }

            let converted = self.convert(&path, &body)?;
            let slug = file_slug(&path);
            debug!(slug = %slug, "loaded page");

            pages.insert(
                slug.clone(),
                Page {
                    title: frontmatter.title,
                    url: Page::url_for(&slug),
                    slug,
                    content: converted.body,
                    source: path,
                },
            );
        }

        Ok(pages)
    }

    /// Classify entries of the posts directory, in file name order.
    fn discover_posts(&self) -> Result<Vec<PostSource>> {
        let posts_dir = self.content_dir.join(POSTS_DIR);
        if !posts_dir.is_dir() {
            debug!(dir = %posts_dir.display(), "no posts directory");
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        for path in sorted_entries(&posts_dir)? {
            if path.is_dir() {
                if path.join(BUNDLE_INDEX).is_file() {
                    sources.push(PostSource::Bundle(path));
                } else {
                    debug!(dir = %path.display(), "skipping directory without index.md");
                }
            } else if is_markdown(&path) {
                sources.push(PostSource::Flat(path));
            }
        }

        Ok(sources)
    }

    /// Load a single post. Returns `None` for posts marked `ignore`.
    fn load_post(&self, source: &PostSource) -> Result<Option<Post>> {
        let (document, default_slug, cover_src, kind) = match source {
            PostSource::Flat(path) => {
                let base = file_slug(path);
                let dir = path.parent().unwrap_or(Path::new("."));
                let cover = find_cover(dir, &base);
                (path.clone(), base, cover, PostKind::Flat)
            }
            PostSource::Bundle(dir) => {
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let cover = find_cover(dir, "cover").or_else(|| find_cover(dir, "index"));
                (dir.join(BUNDLE_INDEX), name, cover, PostKind::Bundle)
            }
        };

        let (frontmatter, body) = self.read_document(&document)?;
        if frontmatter.ignore {
            debug!(path = %document.display(), "skipping ignored post");
            return Ok(None);
        }

        let converted = self.convert(&document, &body)?;

        let slug = frontmatter
            .slug
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(default_slug);
        if !is_path_segment(&slug) {
            return Err(LoadError::InvalidSlug {
                slug,
                path: document,
            });
        }
        let summary = frontmatter
            .summary
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| extract_summary(&body));
        let author = frontmatter
            .author
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| self.config.front_matter_defaults.author.clone());
        let cover = cover_src.as_deref().map(|src| {
            let ext = src
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            Post::cover_url_for(&slug, &ext)
        });
        let bundle_images = match source {
            PostSource::Bundle(dir) => extract_image_refs(&body, dir),
            PostSource::Flat(_) => BTreeMap::new(),
        };

        debug!(slug = %slug, ?kind, images = bundle_images.len(), "loaded post");

        Ok(Some(Post {
            title: frontmatter.title,
            date: frontmatter.date,
            tags: frontmatter.tags,
            url: Post::url_for(&slug),
            slug,
            summary,
            author,
            cover,
            cover_src,
            content: converted.body,
            toc: converted.toc,
            bundle_images,
            source: document,
            kind,
        }))
    }

    fn read_document(&self, path: &Path) -> Result<(bindery_core::Frontmatter, String)> {
        let raw = fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
        Ok(parse_frontmatter(&raw, path)?)
    }

    fn convert(&self, path: &Path, body: &str) -> Result<bindery_parser::Converted> {
        self.converter
            .convert(body.as_bytes())
            .map_err(|source| LoadError::Convert {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Reject posts sharing a slug, naming both sources.
fn check_unique_slugs(posts: &[Post]) -> Result<()> {
    let mut seen: HashMap<&str, &Path> = HashMap::new();
    for post in posts {
        if let Some(first) = seen.insert(&post.slug, &post.source) {
            return Err(LoadError::DuplicateSlug {
                slug: post.slug.clone(),
                first: first.to_path_buf(),
                second: post.source.clone(),
            });
        }
    }
    Ok(())
}

/// Directory entries sorted by file name.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir)
        .map_err(|e| LoadError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| LoadError::io(dir, e))?;
    paths.sort();
    Ok(paths)
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

fn file_slug(path: &Path) -> String {
    path.file_name()
        .map(|n| slug_of(&n.to_string_lossy()))
        .unwrap_or_default()
}

/// First `<base>.<ext>` in `dir`, trying extensions in [`COVER_EXTENSIONS`] order.
pub fn find_cover(dir: &Path, base: &str) -> Option<PathBuf> {
    COVER_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{base}.{ext}")))
        .find(|candidate| candidate.is_file())
}

/// Local image references in a bundle body that exist on disk.
///
/// Remote URLs and references escaping the bundle with `..` are skipped.
pub fn extract_image_refs(body: &str, bundle_dir: &Path) -> BTreeMap<String, PathBuf> {
    let mut images = BTreeMap::new();

    for capture in IMAGE_REF.captures_iter(body) {
        let Some(target) = capture.get(1).map(|m| m.as_str()) else {
            continue;
        };
        if target.starts_with("http://") || target.starts_with("https://") {
            continue;
        }

        let relative = target.trim_start_matches('/');
        if relative.is_empty() || Path::new(relative).components().any(|c| {
            matches!(c, std::path::Component::ParentDir)
        }) {
            debug!(target, "skipping image reference outside bundle");
            continue;
        }

        let source = bundle_dir.join(relative);
        if source.is_file() {
            images.insert(relative.to_string(), source);
        } else {
            debug!(target, "image reference not found");
        }
    }

    images
}
