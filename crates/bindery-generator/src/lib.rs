//! Bindery Generator Library
//!
//! Static site generation engine for Bindery.
//!
//! # Modules
//!
//! - [`loader`] - Post and page discovery
//! - [`site`] - In-memory site model
//! - [`template`] - Layouts with variable interpolation
//! - [`render`] - HTML page rendering
//! - [`assets`] - Static asset and post media copying
//! - [`search`] - Search index generation
//! - [`feed`] - RSS feed generation
//! - [`build`] - Build orchestration

pub mod assets;
pub mod build;
pub mod feed;
pub mod loader;
pub mod render;
pub mod search;
pub mod site;
pub mod template;

pub use assets::AssetProcessor;
pub use build::{BuildError, BuildStats, Builder};
pub use feed::FeedGenerator;
pub use loader::{ContentLoader, LoadedContent};
pub use render::Renderer;
pub use site::Site;
pub use template::{Template, TemplateCache, TemplateContext};
