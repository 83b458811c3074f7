//! HTML rendering of the site model.
//!
//! Enumerates every output page, renders each through its layout and writes
//! it under the output root. Static assets, covers, bundle images and the
//! search index are written alongside.

use std::{
    fs,
    path::{Path, PathBuf},
};

use bindery_core::{Page, Post, content::is_path_segment, frontmatter::zero_date};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    assets::{AssetError, AssetProcessor},
    search,
    site::Site,
    template::{TemplateCache, TemplateContext, TemplateError, escape_html},
};

/// Rendering errors.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A layout could not be resolved before rendering started.
    #[error("preloading layouts: {0}")]
    Preload(#[source] TemplateError),

    /// A page failed to render.
    #[error("rendering {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: TemplateError,
    },

    /// A page could not be written.
    #[error("writing {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Asset copying failed.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// The search index could not be encoded.
    #[error("encoding search index: {0}")]
    Search(#[from] serde_json::Error),
}

/// Result type for rendering.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Counts of what a render pass wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// HTML pages written.
    pub pages: usize,

    /// Static files, covers and bundle images copied.
    pub assets: usize,
}

/// One page to render: output path relative to the root, layout, data.
#[derive(Debug)]
struct RenderJob {
    path: String,
    layout: &'static str,
    context: TemplateContext,
}

/// Renders a [`Site`] into an output directory.
#[derive(Debug)]
pub struct Renderer<'a> {
    site: &'a Site,
    project_root: &'a Path,
    output_dir: &'a Path,
}

impl<'a> Renderer<'a> {
    /// Create a renderer. Layout overrides are read from
    /// `<project_root>/layouts/`.
    #[must_use]
    pub fn new(site: &'a Site, project_root: &'a Path, output_dir: &'a Path) -> Self {
        Self {
            site,
            project_root,
            output_dir,
        }
    }

    /// Render every page and copy every asset. Stops at the first failure;
    /// files written before it are left in place.
    pub fn render(&self) -> Result<RenderStats> {
        let config = &self.site.config;
        let mut templates = TemplateCache::new(self.project_root);
        templates
            .preload(self.layout_names())
            .map_err(RenderError::Preload)?;

        let processor = AssetProcessor::new(self.output_dir);
        let mut stats = RenderStats {
            assets: processor.copy_static(self.project_root)?
                + processor.copy_covers(&self.site.posts)?
                + processor.copy_bundle_images(&self.site.posts)?,
            ..Default::default()
        };

        if config.search_enabled() {
            let json = search::to_json(&self.site.posts)?;
            self.write(search::SEARCH_INDEX_FILE, json.as_slice())?;
        }

        let jobs = self.jobs();
        info!(count = jobs.len(), "rendering pages");

        for job in jobs {
            let html = templates
                .render(job.layout, &job.context)
                .map_err(|source| RenderError::Template {
                    path: job.path.clone(),
                    source,
                })?;
            self.write(&job.path, html.as_bytes())?;
            debug!(path = %job.path, layout = job.layout, "rendered page");
            stats.pages += 1;
        }

        Ok(stats)
    }

    /// Layouts this site needs, in preload order.
    fn layout_names(&self) -> Vec<&'static str> {
        let config = &self.site.config;
        let mut names = vec!["index", "404", "single", "page"];
        if config.search_enabled() {
            names.push("search");
        }
        if config.tags_enabled() {
            names.extend(["tags", "tag"]);
        }
        names
    }

    /// Every page of the site.
    fn jobs(&self) -> Vec<RenderJob> {
        let config = &self.site.config;
        let mut jobs = vec![
            self.job("index.html", "index", self.index_context()),
            self.job("404.html", "404", self.not_found_context()),
        ];

        if config.search_enabled() {
            jobs.push(self.job("search/index.html", "search", self.search_context()));
        }

        if config.tags_enabled() {
            jobs.push(self.job("tags/index.html", "tags", self.tags_context()));
            for (tag, posts) in &self.site.tags {
                if !is_path_segment(tag) {
                    warn!(tag = %tag, "skipping tag that cannot be used as a directory name");
                    continue;
                }
                jobs.push(self.job(
                    format!("tags/{tag}/index.html"),
                    "tag",
                    self.tag_context(tag, posts),
                ));
            }
        }

        for post in &self.site.posts {
            jobs.push(self.job(
                format!("posts/{}/index.html", post.slug),
                "single",
                self.post_context(post),
            ));
        }

        for page in self.site.pages.values() {
            jobs.push(self.job(
                format!("{}/index.html", page.slug),
                "page",
                self.page_context(page),
            ));
        }

        jobs
    }

    fn job(
        &self,
        path: impl Into<String>,
        layout: &'static str,
        context: TemplateContext,
    ) -> RenderJob {
        RenderJob {
            path: path.into(),
            layout,
            context,
        }
    }

    /// Variables shared by every page.
    fn base_context(&self, title: &str) -> TemplateContext {
        let config = &self.site.config;
        let mut ctx = TemplateContext::new()
            .with_text("lang", config.label("lang", "en"))
            .with_text("title", title)
            .with_text("site_title", &config.title)
            .with_text("base_path", &config.base_path)
            .with_var("nav", self.nav_html());

        if title != config.title {
            ctx.insert_text("title_suffix", &format!(" | {}", config.title));
        }
        if !config.base_url.is_empty() {
            ctx.insert(
                "feed_link",
                format!(
                    r#"<link rel="alternate" type="application/rss+xml" title="{}" href="{}/feed.xml">"#,
                    escape_html(&config.title),
                    escape_html(&config.base_path)
                ),
            );
        }
        for (key, value) in &config.l10n {
            ctx.insert_text(format!("l10n_{key}"), value);
        }

        ctx
    }

    fn index_context(&self) -> TemplateContext {
        let config = &self.site.config;
        self.base_context(&config.title)
            .with_text("hero_header", &config.hero.header)
            .with_text("hero_content", &config.hero.content)
            .with_text("description", &config.hero.content)
            .with_var("posts", self.post_list_html(&self.site.posts))
    }

    fn not_found_context(&self) -> TemplateContext {
        let config = &self.site.config;
        self.base_context(config.label("not_found_title", "404"))
            .with_text(
                "not_found_text",
                config.label("not_found", "The page you are looking for does not exist."),
            )
            .with_text("back_home_text", config.label("back_home", "Back to home"))
    }

    fn search_context(&self) -> TemplateContext {
        let config = &self.site.config;
        let label = config.nav.get("search").map_or("Search", String::as_str);
        self.base_context(label)
            .with_text("search_label", label)
            .with_text(
                "search_placeholder",
                config.label("search_placeholder", "Search posts..."),
            )
    }

    fn tags_context(&self) -> TemplateContext {
        let label = self.tags_label();
        let cloud: String = self
            .site
            .tags
            .iter()
            .filter(|(tag, _)| is_path_segment(tag))
            .map(|(tag, posts)| {
                format!(
                    r#"<li><a href="{}" rel="tag">{} <sup>{}</sup></a></li>"#,
                    self.tag_url(tag),
                    escape_html(tag),
                    posts.len()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        self.base_context(label)
            .with_text("tags_label", label)
            .with_var("tag_cloud", cloud)
    }

    fn tag_context(&self, tag: &str, posts: &[Post]) -> TemplateContext {
        self.base_context(tag)
            .with_text("tags_label", self.tags_label())
            .with_text("tag", tag)
            .with_var("posts", self.post_list_html(posts))
    }

    fn post_context(&self, post: &Post) -> TemplateContext {
        let config = &self.site.config;
        let base_path = &config.base_path;
        let mut ctx = self
            .base_context(&post.title)
            .with_text("post_title", &post.title)
            .with_text("description", &post.summary)
            .with_text("summary", &post.summary)
            .with_text("author", &post.author)
            .with_text("date_iso", &post.date.format("%Y-%m-%d").to_string())
            .with_text("date_display", &display_date(&post.date))
            .with_var("body", post.content.as_str());

        if !post.tags.is_empty() {
            ctx.insert("tags_html", self.tags_html(&post.tags));
        }
        if let Some(cover) = &post.cover {
            ctx.insert(
                "cover_html",
                format!(
                    r#"<img class="cover" src="{}" alt="cover">"#,
                    escape_html(&format!("{base_path}{cover}"))
                ),
            );
        }
        if !post.toc.is_empty() {
            ctx.insert(
                "toc_html",
                format!(
                    "<details class=\"toc\" open>\n<summary>{}</summary>\n{}\n</details>",
                    escape_html(config.label("toc", "Contents")),
                    post.toc
                ),
            );
        }

        ctx
    }

    fn page_context(&self, page: &Page) -> TemplateContext {
        self.base_context(&page.title)
            .with_text("page_title", &page.title)
            .with_var("body", page.content.as_str())
    }

    fn tags_label(&self) -> &str {
        self.site
            .config
            .nav
            .get("tags")
            .map_or("Tags", String::as_str)
    }

    fn tag_url(&self, tag: &str) -> String {
        escape_html(&format!("{}/tags/{tag}/", self.site.config.base_path))
    }

    /// Navigation links, one per configured label.
    fn nav_html(&self) -> String {
        let base_path = &self.site.config.base_path;
        self.site
            .config
            .nav
            .iter()
            .map(|(key, label)| {
                let href = if key == "home" {
                    format!("{base_path}/")
                } else {
                    format!("{base_path}/{key}/")
                };
                format!(
                    r#"<a href="{}">{}</a>"#,
                    escape_html(&href),
                    escape_html(label)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tag links for a post. Tags only link when tag pages are generated.
    fn tags_html(&self, tags: &[String]) -> String {
        let links_enabled = self.site.config.tags_enabled();
        let items = tags
            .iter()
            .map(|tag| {
                if links_enabled && is_path_segment(tag) {
                    format!(
                        r#"<a href="{}" rel="tag">{}</a>"#,
                        self.tag_url(tag),
                        escape_html(tag)
                    )
                } else {
                    format!(r#"<span class="tag">{}</span>"#, escape_html(tag))
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        format!(r#"<div class="tags">{items}</div>"#)
    }

    /// Listing of posts as `<li>` items.
    fn post_list_html(&self, posts: &[Post]) -> String {
        let base_path = &self.site.config.base_path;
        posts
            .iter()
            .map(|post| {
                let summary = if post.summary.is_empty() {
                    String::new()
                } else {
                    format!(
                        r#"<p class="post-summary">{}</p>"#,
                        escape_html(&post.summary)
                    )
                };
                format!(
                    r#"<li class="post-item">
    <a href="{}" class="post-title">{}</a>
    <time datetime="{}">{}</time>
    {}
</li>"#,
                    escape_html(&format!("{base_path}{}", post.url)),
                    escape_html(&post.title),
                    post.date.format("%Y-%m-%d"),
                    display_date(&post.date),
                    summary
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn write(&self, relative: &str, content: &[u8]) -> Result<()> {
        let dest = self.output_dir.join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| RenderError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&dest, content).map_err(|source| RenderError::Write { path: dest, source })
    }
}

/// Render a site into `output_dir`.
pub fn render(site: &Site, project_root: &Path, output_dir: &Path) -> Result<RenderStats> {
    Renderer::new(site, project_root, output_dir).render()
}

/// Human-readable date; empty for undated posts.
fn display_date(date: &DateTime<Utc>) -> String {
    if *date == zero_date() {
        String::new()
    } else {
        date.format("%Y-%m-%d").to_string()
    }
}
