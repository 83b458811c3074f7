//! Site settings management.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};

/// File name of the settings document, relative to the project root.
pub const CONFIG_FILE: &str = "bindery.yaml";

/// Prefix of environment variables that override settings.
pub const ENV_PREFIX: &str = "BINDERY";

/// Main settings structure for Bindery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Site title.
    pub title: String,

    /// Base URL for the site (e.g., "https://example.com/~john").
    #[serde(default)]
    pub base_url: String,

    /// Path component of `base_url` without a trailing slash (e.g., "/~john").
    #[serde(skip)]
    pub base_path: String,

    /// Home page hero block.
    #[serde(default)]
    pub hero: HeroConfig,

    /// Navigation labels keyed by section. A `search` or `tags` entry enables
    /// the matching feature.
    #[serde(default)]
    pub nav: BTreeMap<String, String>,

    /// Localized strings used by the layouts.
    #[serde(default)]
    pub l10n: BTreeMap<String, String>,

    /// Fallback values for post front matter.
    #[serde(default, rename = "front-matter-defaults")]
    pub front_matter_defaults: FrontMatterDefaults,
}

/// Hero block shown on the home page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroConfig {
    /// Hero heading.
    #[serde(default)]
    pub header: String,

    /// Hero body text.
    #[serde(default)]
    pub content: String,
}

/// Defaults applied to posts that omit a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatterDefaults {
    /// Author used when a post does not name one.
    #[serde(default)]
    pub author: String,
}

impl Config {
    /// Path of the settings document inside a project.
    pub fn path_in(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_FILE)
    }

    /// Load settings from `bindery.yaml` under the project root.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = Self::path_in(project_root);
        if !path.exists() {
            return Err(CoreError::config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.finish()
    }

    /// Load settings with `BINDERY__*` environment overrides layered on top,
    /// e.g. `BINDERY__BASE_URL=https://staging.example.com`.
    pub fn load_with_env(project_root: &Path) -> Result<Self> {
        Self::load_layered(project_root, None)
    }

    /// Layer overrides over the settings file. `env` replaces the process
    /// environment when given.
    fn load_layered(project_root: &Path, env: Option<config::Map<String, String>>) -> Result<Self> {
        let path = Self::path_in(project_root);
        if !path.exists() {
            return Err(CoreError::config(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .source(env),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.finish()
    }

    /// Validate and fill in derived fields.
    fn finish(mut self) -> Result<Self> {
        self.validate()?;
        self.base_path = derive_base_path(&self.base_url);
        Ok(self)
    }

    /// Validate the settings.
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(CoreError::config("title cannot be empty"));
        }

        if self.base_url.is_empty() {
            tracing::warn!("base_url is not set, the feed will not be generated");
        } else if self.base_url.ends_with('/') {
            tracing::warn!("base_url should not have a trailing slash");
        }

        Ok(())
    }

    /// Settings for local preview: the base path is cleared so that links
    /// resolve against the development server root.
    #[must_use]
    pub fn preview(&self) -> Self {
        Self {
            base_path: String::new(),
            ..self.clone()
        }
    }

    /// Whether the search page and index should be generated.
    pub fn search_enabled(&self) -> bool {
        self.nav.get("search").is_some_and(|label| !label.is_empty())
    }

    /// Whether the tag pages should be generated.
    pub fn tags_enabled(&self) -> bool {
        self.nav.get("tags").is_some_and(|label| !label.is_empty())
    }

    /// Absolute URL for a site-relative path such as `/posts/hello/`.
    pub fn permalink(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    /// Look up a localized label, falling back to the given default.
    pub fn label<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.l10n.get(key).map_or(default, String::as_str)
    }
}

/// Extract the path component of a base URL, without a trailing slash.
fn derive_base_path(base_url: &str) -> String {
    if base_url.is_empty() {
        return String::new();
    }
    match Url::parse(base_url) {
        Ok(url) => url.path().trim_end_matches('/').to_string(),
        Err(e) => {
            tracing::warn!(base_url, error = %e, "could not parse base_url");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(Config::path_in(dir.path()), content).expect("write");
        dir
    }

    #[test]
    fn test_load_config() {
        let dir = write_config(
            r#"
title: Test Blog
base_url: https://example.com/~john/
hero:
  header: Hi
  content: Welcome
nav:
  search: Search
  tags: Tags
l10n:
  toc: Contents
front-matter-defaults:
  author: alice
"#,
        );

        let config = Config::load(dir.path()).expect("load config");

        assert_eq!(config.title, "Test Blog");
        assert_eq!(config.base_path, "/~john");
        assert_eq!(config.hero.header, "Hi");
        assert_eq!(config.front_matter_defaults.author, "alice");
        assert_eq!(config.label("toc", "TOC"), "Contents");
        assert_eq!(config.label("missing", "Fallback"), "Fallback");
        assert!(config.search_enabled());
        assert!(config.tags_enabled());
    }

    #[test]
    fn test_config_defaults() {
        let dir = write_config("title: Minimal\n");

        let config = Config::load(dir.path()).expect("load config");

        assert!(config.base_url.is_empty());
        assert!(config.base_path.is_empty());
        assert!(!config.search_enabled());
        assert!(!config.tags_enabled());
    }

    #[test]
    fn test_base_path_root_is_empty() {
        assert_eq!(derive_base_path("https://example.com"), "");
        assert_eq!(derive_base_path("https://example.com/"), "");
        assert_eq!(derive_base_path("https://example.com/blog"), "/blog");
    }

    #[test]
    fn test_preview_clears_base_path() {
        let dir = write_config("title: T\nbase_url: https://example.com/blog\n");
        let config = Config::load(dir.path()).expect("load config");

        let preview = config.preview();
        assert_eq!(preview.base_path, "");
        assert_eq!(preview.base_url, config.base_url);
    }

    #[test]
    fn test_permalink() {
        let config = Config {
            title: "T".to_string(),
            base_url: "https://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.permalink("/posts/hello/"),
            "https://example.com/posts/hello/"
        );
    }

    #[test]
    fn test_empty_nav_label_disables_feature() {
        let dir = write_config("title: T\nnav:\n  search: \"\"\n");
        let config = Config::load(dir.path()).expect("load config");
        assert!(!config.search_enabled());
    }

    #[test]
    fn test_config_validation_empty_title() {
        let dir = write_config("title: \"\"\n");
        let result = Config::load(dir.path());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("title cannot be empty")
        );
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = write_config("title: From File\nbase_url: https://example.com\n");
        let env = config::Map::from([
            ("BINDERY__TITLE".to_string(), "From Env".to_string()),
            ("BINDERY__BASE_URL".to_string(), "https://staging.example.com/blog".to_string()),
            ("OTHER__TITLE".to_string(), "Ignored".to_string()),
        ]);

        let config = Config::load_layered(dir.path(), Some(env)).expect("load layered");

        assert_eq!(config.title, "From Env");
        assert_eq!(config.base_url, "https://staging.example.com/blog");
        assert_eq!(config.base_path, "/blog");
    }

    #[test]
    fn test_layered_without_overrides_matches_file() {
        let dir = write_config("title: Plain\nnav:\n  tags: Tags\n");

        let layered = Config::load_layered(dir.path(), Some(config::Map::new())).expect("layered");
        let plain = Config::load(dir.path()).expect("plain");

        assert_eq!(layered, plain);
    }

    #[test]
    fn test_layered_missing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let err = Config::load_with_env(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_config_not_found() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let result = Config::load(dir.path());
        assert!(result.unwrap_err().to_string().contains("not found"));
    }

    #[test]
    fn test_config_malformed() {
        let dir = write_config("title: [unclosed\n");
        let result = Config::load(dir.path());
        assert!(result.unwrap_err().to_string().contains("failed to parse"));
    }
}
