//! Init command - scaffold a starter project

use std::{fs, path::Path};

use bindery_core::config::CONFIG_FILE;
use bindery_generator::{assets::STATIC_DIR, template::TemplateCache};
use chrono::Utc;
use color_eyre::eyre::{Result, WrapErr};

const STARTER_CONFIG: &str = r#"title: My Blog
# Full URL of the published site. Leave empty to skip feed.xml.
base_url: ""

hero:
  header: Welcome
  content: Notes and writing.

nav:
  home: Home
  tags: Tags
  search: Search
  about: About

front-matter-defaults:
  author: ""
"#;

const STARTER_PAGE: &str = r#"---
title: About
---

This page lives at `content/about.md`.
"#;

/// Run the init command.
///
/// Writes a settings file, a first post, an about page and empty `layouts/`
/// and `static/` directories. Existing files are left untouched.
pub fn run(root: &Path) -> Result<()> {
    tracing::info!(root = %root.display(), "Initializing project");

    let files = [
        (CONFIG_FILE.to_string(), STARTER_CONFIG.to_string()),
        ("content/posts/hello-world.md".to_string(), starter_post()),
        ("content/about.md".to_string(), STARTER_PAGE.to_string()),
    ];

    for (relative, content) in files {
        let path = root.join(&relative);
        if path.exists() {
            println!("  exists   {relative}");
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).wrap_err_with(|| format!("Failed to write {}", path.display()))?;
        println!("  created  {relative}");
    }

    for dir in [TemplateCache::LAYOUTS_DIR, STATIC_DIR] {
        let path = root.join(dir);
        fs::create_dir_all(&path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
    }

    println!();
    println!("  Run `bindery serve` to preview the site.");
    Ok(())
}

fn starter_post() -> String {
    let date = Utc::now().format("%Y-%m-%d");
    format!(
        r#"---
title: Hello, World
date: {date}
tags: [welcome]
---

Your first post. Edit `content/posts/hello-world.md` or add more files next
to it.
"#
    )
}

#[cfg(test)]
mod tests {
    use bindery_core::Config;
    use bindery_generator::Builder;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_init_creates_buildable_project() {
        let dir = TempDir::new().unwrap();

        run(dir.path()).unwrap();

        assert!(dir.path().join("layouts").is_dir());
        assert!(dir.path().join("static").is_dir());
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.title, "My Blog");

        let output = dir.path().join("public");
        let stats = Builder::new(config, dir.path(), &output).build().unwrap();
        assert_eq!(stats.posts, 1);
        assert_eq!(stats.pages, 1);
        assert!(output.join("posts/hello-world/index.html").exists());
    }

    #[test]
    fn test_init_keeps_existing_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "title: Mine\n").unwrap();

        run(dir.path()).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join(CONFIG_FILE)).unwrap(),
            "title: Mine\n"
        );
        assert!(dir.path().join("content/about.md").exists());
    }
}
