//! Static asset and post media copying.

use std::{
    fs,
    path::{Path, PathBuf},
};

use bindery_core::Post;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Project directory, relative to the root, whose files are copied verbatim.
pub const STATIC_DIR: &str = "static";

/// Assets shipped with the generator, written before the project's own.
pub const BUNDLED_ASSETS: [(&str, &str); 3] = [
    ("style.css", include_str!("../assets/style.css")),
    ("copy.js", include_str!("../assets/copy.js")),
    ("search.js", include_str!("../assets/search.js")),
];

/// Asset processing errors.
#[derive(Debug, Error)]
pub enum AssetError {
    /// IO error on a specific path.
    #[error("copying {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error.
    #[error("walking static directory: {0}")]
    Walk(#[from] walkdir::Error),
}

impl AssetError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Copies bundled assets, project static files and per-post media.
#[derive(Debug)]
pub struct AssetProcessor {
    output_dir: PathBuf,
}

impl AssetProcessor {
    /// Create a processor writing under the given output root.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write bundled assets, then copy `<project>/static/**` over them.
    ///
    /// Returns the number of files written.
    pub fn copy_static(&self, project_root: &Path) -> Result<usize> {
        let mut count = 0;
        for (name, content) in BUNDLED_ASSETS {
            let dest = self.output_dir.join(name);
            write_file(&dest, content.as_bytes())?;
            count += 1;
        }

        let static_dir = project_root.join(STATIC_DIR);
        count += self.copy_dir(&static_dir)?;

        info!(count, "static assets copied");
        Ok(count)
    }

    /// Copy every file under `source_dir` to the same relative path in the
    /// output root. A missing directory copies nothing.
    pub fn copy_dir(&self, source_dir: &Path) -> Result<usize> {
        if !source_dir.is_dir() {
            debug!(dir = %source_dir.display(), "no static directory");
            return Ok(0);
        }

        let mut count = 0;
        for entry in WalkDir::new(source_dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(source_dir) else {
                continue;
            };
            copy_file(entry.path(), &self.output_dir.join(relative))?;
            count += 1;
        }

        Ok(count)
    }

    /// Copy each post's cover to `posts/<slug>/cover.<ext>`.
    pub fn copy_covers(&self, posts: &[Post]) -> Result<usize> {
        let mut count = 0;
        for post in posts {
            let Some(src) = &post.cover_src else {
                continue;
            };
            let file_name = match src.extension() {
                Some(ext) => format!("cover.{}", ext.to_string_lossy()),
                None => "cover".to_string(),
            };
            copy_file(src, &self.post_dir(post).join(file_name))?;
            count += 1;
        }
        Ok(count)
    }

    /// Copy bundle image references next to their post, keeping the relative
    /// path used in the document.
    pub fn copy_bundle_images(&self, posts: &[Post]) -> Result<usize> {
        let mut count = 0;
        for post in posts {
            let post_dir = self.post_dir(post);
            for (relative, src) in &post.bundle_images {
                copy_file(src, &post_dir.join(relative))?;
                count += 1;
            }
        }
        Ok(count)
    }

    fn post_dir(&self, post: &Post) -> PathBuf {
        self.output_dir.join("posts").join(&post.slug)
    }
}

/// Copy a file, creating parent directories as needed.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
    }
    fs::copy(src, dest).map_err(|e| AssetError::io(src, e))?;
    debug!(src = %src.display(), dest = %dest.display(), "copied");
    Ok(())
}

fn write_file(dest: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| AssetError::io(parent, e))?;
    }
    fs::write(dest, content).map_err(|e| AssetError::io(dest, e))
}
