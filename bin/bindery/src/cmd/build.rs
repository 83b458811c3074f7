//! Build command - generates the static site

use std::path::{Path, PathBuf};

use bindery_core::Config;
use bindery_generator::Builder;
use color_eyre::eyre::{Result, WrapErr};

/// Output directory, relative to the project root, used when none is given.
pub const DEFAULT_OUTPUT_DIR: &str = "public";

/// Run the build command.
///
/// Loads `bindery.yaml` from `root` and renders the site into `output`, or
/// `<root>/public` when no output directory is given.
pub fn run(root: &Path, output: Option<&Path>) -> Result<()> {
    let output = resolve_output(root, output);
    tracing::info!(root = %root.display(), output = %output.display(), "Starting build");

    let config = Config::load_with_env(root).wrap_err("Failed to load configuration")?;
    tracing::debug!(?config, "Loaded configuration");

    let stats = Builder::new(config, root, &output)
        .build()
        .wrap_err("Build failed")?;

    println!();
    println!("  Build completed successfully!");
    println!();
    println!("  Posts:      {}", stats.posts);
    println!("  Pages:      {}", stats.pages);
    println!("  Tags:       {}", stats.tags);
    println!("  Assets:     {}", stats.assets);
    println!("  Feed:       {}", if stats.feed { "yes" } else { "no" });
    println!();
    println!("  Duration:   {}ms", stats.duration_ms);
    println!("  Output:     {}", output.display());
    println!();

    Ok(())
}

fn resolve_output(root: &Path, output: Option<&Path>) -> PathBuf {
    output.map_or_else(|| root.join(DEFAULT_OUTPUT_DIR), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_output_under_root() {
        assert_eq!(
            resolve_output(Path::new("site"), None),
            PathBuf::from("site/public")
        );
        assert_eq!(
            resolve_output(Path::new("site"), Some(Path::new("/tmp/out"))),
            PathBuf::from("/tmp/out")
        );
    }

    #[test]
    fn test_build_project() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bindery.yaml"), "title: Test\n").unwrap();
        fs::create_dir_all(dir.path().join("content/posts")).unwrap();
        fs::write(
            dir.path().join("content/posts/hello.md"),
            "---\ntitle: Hello\ndate: 2024-01-01\n---\nHi",
        )
        .unwrap();

        run(dir.path(), None).unwrap();

        assert!(dir.path().join("public/posts/hello/index.html").exists());
    }

    #[test]
    fn test_missing_config_fails() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        assert!(run(dir.path(), Some(&out)).is_err());
        assert!(!out.exists());
    }
}
