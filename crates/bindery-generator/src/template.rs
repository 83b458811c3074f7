//! HTML template system for page generation.
//!
//! Templates use plain `{{ name }}` interpolation. A layout pairs the shared
//! `base.html` with a named page fragment; the fragment is rendered first and
//! its output becomes the `content` variable of the base.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::debug;

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Missing required variable.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// Template not found.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Invalid template syntax.
    #[error("invalid template syntax in {name}: {message}")]
    InvalidSyntax { name: String, message: String },

    /// A project template exists but could not be read.
    #[error("reading template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Template context with variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    variables: HashMap<String, String>,
}

impl TemplateContext {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw (already safe) HTML value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Insert a text value, HTML-escaping it.
    pub fn insert_text(&mut self, key: impl Into<String>, value: &str) {
        self.insert(key, escape_html(value));
    }

    /// Builder form of [`TemplateContext::insert`].
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder form of [`TemplateContext::insert_text`].
    #[must_use]
    pub fn with_text(mut self, key: impl Into<String>, value: &str) -> Self {
        self.insert_text(key, value);
        self
    }

    /// Get a variable value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Check if a variable exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.variables.contains_key(key)
    }
}

/// A simple template that supports variable interpolation.
///
/// Variables are written `{{ name }}`; `{{ name? }}` renders as empty when the
/// variable is absent. Interpolated values are never rescanned.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    content: String,
}

impl Template {
    /// Create a new template with the given name and content.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a template, rejecting unclosed `{{` delimiters up front.
    pub fn parse(name: impl Into<String>, content: impl Into<String>) -> Result<Self> {
        let template = Self::new(name, content);
        template.check_syntax()?;
        Ok(template)
    }

    /// Get the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn check_syntax(&self) -> Result<()> {
        let mut rest = self.content.as_str();
        while let Some(start) = rest.find("{{") {
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(self.syntax_error("unclosed {{ delimiter"));
            };
            if after[..end].trim().trim_end_matches('?').is_empty() {
                return Err(self.syntax_error("empty variable name"));
            }
            rest = &after[end + 2..];
        }
        Ok(())
    }

    fn syntax_error(&self, message: &str) -> TemplateError {
        TemplateError::InvalidSyntax {
            name: self.name.clone(),
            message: message.to_string(),
        }
    }

    /// Render the template with the given context.
    pub fn render(&self, context: &TemplateContext) -> Result<String> {
        let mut result = String::with_capacity(self.content.len());
        let mut rest = self.content.as_str();

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| self.syntax_error("unclosed {{ delimiter"))?;

            let var_name = after[..end].trim();
            let (var_name, optional) = match var_name.strip_suffix('?') {
                Some(stripped) => (stripped.trim_end(), true),
                None => (var_name, false),
            };

            match context.get(var_name) {
                Some(value) => result.push_str(value),
                None if optional => {}
                None => return Err(TemplateError::MissingVariable(var_name.to_string())),
            }

            rest = &after[end + 2..];
        }
        result.push_str(rest);

        Ok(result)
    }
}

/// A base template wrapped around a named page fragment.
#[derive(Debug, Clone)]
pub struct Layout {
    base: Template,
    page: Template,
}

impl Layout {
    /// Render the fragment, then the base with the fragment bound to `content`.
    pub fn render(&self, context: &TemplateContext) -> Result<String> {
        let inner = self.page.render(context)?;
        let outer = context.clone().with_var("content", inner);
        self.base.render(&outer)
    }

    /// Name of the page fragment.
    #[must_use]
    pub fn name(&self) -> &str {
        self.page.name()
    }
}

/// Layout names with a built-in default.
pub const BUILTIN_LAYOUTS: [&str; 7] = ["index", "404", "single", "page", "search", "tags", "tag"];

/// Built-in template source for a file name such as `base.html`.
#[must_use]
pub fn builtin(file_name: &str) -> Option<&'static str> {
    let source = match file_name {
        "base.html" => include_str!("../templates/base.html"),
        "index.html" => include_str!("../templates/index.html"),
        "404.html" => include_str!("../templates/404.html"),
        "single.html" => include_str!("../templates/single.html"),
        "page.html" => include_str!("../templates/page.html"),
        "search.html" => include_str!("../templates/search.html"),
        "tags.html" => include_str!("../templates/tags.html"),
        "tag.html" => include_str!("../templates/tag.html"),
        _ => return None,
    };
    Some(source)
}

/// Layouts resolved during one build.
///
/// Project files under `<project>/layouts/` shadow the built-in defaults. Each
/// layout is loaded once and reused for the rest of the build; a new cache is
/// created for every build.
#[derive(Debug, Default)]
pub struct TemplateCache {
    layouts_dir: Option<PathBuf>,
    layouts: HashMap<String, Layout>,
}

impl TemplateCache {
    /// Directory, relative to the project root, holding layout overrides.
    pub const LAYOUTS_DIR: &'static str = "layouts";

    /// Create a cache resolving overrides from the given project.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            layouts_dir: Some(project_root.join(Self::LAYOUTS_DIR)),
            layouts: HashMap::new(),
        }
    }

    /// Create a cache that only knows the built-in layouts.
    #[must_use]
    pub fn builtin_only() -> Self {
        Self::default()
    }

    /// Resolve a layout by name, loading and caching it on first use.
    pub fn get(&mut self, name: &str) -> Result<&Layout> {
        if !self.layouts.contains_key(name) {
            let layout = self.load(name)?;
            debug!(name, "loaded layout");
            self.layouts.insert(name.to_string(), layout);
        }
        self.layouts
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    /// Resolve several layouts ahead of rendering.
    pub fn preload<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> Result<()> {
        for name in names {
            self.get(name)?;
        }
        Ok(())
    }

    /// Render a layout by name.
    pub fn render(&mut self, name: &str, context: &TemplateContext) -> Result<String> {
        self.get(name)?.render(context)
    }

    /// Number of layouts loaded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    /// Whether no layout has been loaded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    fn load(&self, name: &str) -> Result<Layout> {
        let base = self.read("base")?;
        let page = self.read(name)?;
        Ok(Layout { base, page })
    }

    fn read(&self, name: &str) -> Result<Template> {
        let file_name = format!("{name}.html");

        if let Some(dir) = &self.layouts_dir {
            let path = dir.join(&file_name);
            match std::fs::read_to_string(&path) {
                Ok(source) => {
                    debug!(path = %path.display(), "using project layout");
                    return Template::parse(name, source);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(TemplateError::Io { path, source }),
            }
        }

        let source = builtin(&file_name).ok_or_else(|| TemplateError::NotFound(file_name))?;
        Template::parse(name, source)
    }
}

/// Escape HTML special characters in text values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_template_simple_render() {
        let template = Template::new("test", "Hello, {{ name }}!");
        let ctx = TemplateContext::new().with_var("name", "World");

        assert_eq!(template.render(&ctx).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_template_optional_variable() {
        let template = Template::new("test", "Hello{{ suffix? }}!");

        assert_eq!(template.render(&TemplateContext::new()).unwrap(), "Hello!");

        let ctx = TemplateContext::new().with_var("suffix", ", World");
        assert_eq!(template.render(&ctx).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_template_missing_required_variable() {
        let template = Template::new("test", "Hello, {{ name }}!");
        let result = template.render(&TemplateContext::new());

        assert!(matches!(result, Err(TemplateError::MissingVariable(v)) if v == "name"));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let template = Template::new("test", "{{ body }}");
        let ctx = TemplateContext::new().with_var("body", "literal {{ braces }}");

        assert_eq!(template.render(&ctx).unwrap(), "literal {{ braces }}");
    }

    #[test]
    fn test_text_is_escaped() {
        let ctx = TemplateContext::new().with_text("title", "Tom & \"Jerry\" <3");
        assert_eq!(ctx.get("title"), Some("Tom &amp; &quot;Jerry&quot; &lt;3"));
    }

    #[test]
    fn test_parse_rejects_unclosed() {
        let result = Template::parse("broken", "Hello {{ name");
        assert!(matches!(result, Err(TemplateError::InvalidSyntax { .. })));
    }

    #[test]
    fn test_layout_wraps_fragment() {
        let mut cache = TemplateCache::builtin_only();
        let ctx = TemplateContext::new()
            .with_var("lang", "en")
            .with_var("title", "Page")
            .with_var("site_title", "Site")
            .with_var("page_title", "About")
            .with_var("body", "<p>Hi</p>");

        let html = cache.render("page", &ctx).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<h1>About</h1>"));
        assert!(html.contains("<p>Hi</p>"));
    }

    #[test]
    fn test_all_builtin_layouts_resolve() {
        let mut cache = TemplateCache::builtin_only();
        cache.preload(BUILTIN_LAYOUTS).unwrap();
        assert_eq!(cache.len(), BUILTIN_LAYOUTS.len());
    }

    #[test]
    fn test_unknown_layout() {
        let mut cache = TemplateCache::builtin_only();
        assert!(matches!(
            cache.get("archive"),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn test_project_layout_overrides_builtin() {
        let dir = TempDir::new().unwrap();
        let layouts = dir.path().join(TemplateCache::LAYOUTS_DIR);
        fs::create_dir_all(&layouts).unwrap();
        fs::write(layouts.join("page.html"), "<main>{{ page_title }}</main>").unwrap();
        fs::write(layouts.join("base.html"), "[{{ content }}]").unwrap();

        let mut cache = TemplateCache::new(dir.path());
        let ctx = TemplateContext::new().with_var("page_title", "About");

        assert_eq!(cache.render("page", &ctx).unwrap(), "[<main>About</main>]");
    }

    #[test]
    fn test_project_only_layout() {
        let dir = TempDir::new().unwrap();
        let layouts = dir.path().join(TemplateCache::LAYOUTS_DIR);
        fs::create_dir_all(&layouts).unwrap();
        fs::write(layouts.join("archive.html"), "archive").unwrap();

        let mut cache = TemplateCache::new(dir.path());
        assert_eq!(cache.get("archive").unwrap().name(), "archive");
    }
}
