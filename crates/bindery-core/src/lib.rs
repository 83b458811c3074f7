//! Bindery Core Library
//!
//! Settings, content records, front matter and error handling shared by the
//! Bindery static site generator.

pub mod config;
pub mod content;
pub mod error;
pub mod frontmatter;

pub use config::Config;
pub use content::{Page, Post, PostKind};
pub use error::{CoreError, Result};
pub use frontmatter::Frontmatter;
