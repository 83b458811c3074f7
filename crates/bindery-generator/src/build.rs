//! Build orchestration.
//!
//! Runs one full build: load content, assemble the site, render pages and
//! write the feed.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use bindery_core::Config;
use bindery_parser::{Converter, MarkdownConverter};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    feed::{self, FEED_FILE, FeedError},
    loader::{CONTENT_DIR, ContentLoader, LoadError},
    render::{RenderError, Renderer},
    site::Site,
};

/// Build errors.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The output directory could not be created or written.
    #[error("output directory {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Loading content failed.
    #[error("loading content: {0}")]
    Load(#[from] LoadError),

    /// Rendering failed.
    #[error("rendering: {0}")]
    Render(#[from] RenderError),

    /// Building the feed failed.
    #[error("building feed: {0}")]
    Feed(#[from] FeedError),
}

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Build statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Number of posts rendered.
    pub posts: usize,

    /// Number of standalone pages rendered.
    pub pages: usize,

    /// Number of distinct tags.
    pub tags: usize,

    /// Number of files copied (static assets and post media).
    pub assets: usize,

    /// Whether `feed.xml` was written.
    pub feed: bool,

    /// Build duration in milliseconds.
    pub duration_ms: u64,
}

/// Site builder that orchestrates the build process.
///
/// A builder may run any number of times; each run starts from a fresh site
/// model and template cache.
pub struct Builder {
    config: Config,
    project_root: PathBuf,
    output_dir: PathBuf,
    converter: Box<dyn Converter>,
}

impl std::fmt::Debug for Builder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("project_root", &self.project_root)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl Builder {
    /// Create a new builder using the Markdown converter.
    #[must_use]
    pub fn new(
        config: Config,
        project_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            project_root: project_root.into(),
            output_dir: output_dir.into(),
            converter: Box::new(MarkdownConverter::new()),
        }
    }

    /// Replace the Markdown converter.
    #[must_use]
    pub fn with_converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converter = Box::new(converter);
        self
    }

    /// Settings this builder renders with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output root.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Execute the full build process.
    pub fn build(&self) -> Result<BuildStats> {
        let start = Instant::now();

        info!(
            project = %self.project_root.display(),
            output = %self.output_dir.display(),
            "starting build"
        );

        // 1. Ensure the output directory exists
        fs::create_dir_all(&self.output_dir).map_err(|source| BuildError::Output {
            path: self.output_dir.clone(),
            source,
        })?;

        // 2. Load content
        let loader = ContentLoader::new(
            &self.config,
            self.converter.as_ref(),
            self.project_root.join(CONTENT_DIR),
        );
        let content = loader.load()?;

        // 3. Assemble the site
        let site = Site::assemble(self.config.clone(), content);
        debug!(
            posts = site.posts.len(),
            tags = site.tags.len(),
            pages = site.pages.len(),
            "site assembled"
        );

        // 4. Render pages and assets
        let rendered = Renderer::new(&site, &self.project_root, &self.output_dir).render()?;

        // 5. Write the feed
        let feed_written = self.write_feed(&site)?;

        let stats = BuildStats {
            posts: site.posts.len(),
            pages: site.pages.len(),
            tags: site.tags.len(),
            assets: rendered.assets,
            feed: feed_written,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            posts = stats.posts,
            pages = stats.pages,
            tags = stats.tags,
            assets = stats.assets,
            duration_ms = stats.duration_ms,
            "build complete"
        );

        Ok(stats)
    }

    /// Write `feed.xml` when a base URL is configured.
    fn write_feed(&self, site: &Site) -> Result<bool> {
        let Some(xml) = feed::build_feed(site)? else {
            return Ok(false);
        };

        let path = self.output_dir.join(FEED_FILE);
        fs::write(&path, xml).map_err(|source| BuildError::Output {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), "generated feed");
        Ok(true)
    }
}
