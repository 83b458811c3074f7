//! Bindery CLI Library
//!
//! Command implementations and the preview server behind the `bindery`
//! binary.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (init, build, serve)
//! - [`server`] - Preview server with live reload
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use bindery::cmd;
//!
//! cmd::build::run(Path::new("."), None).unwrap();
//! ```

pub mod cmd;
pub mod server;

pub use bindery_core::Config;
pub use bindery_generator::{BuildStats, Builder};

/// Initialize tracing with the specified verbosity level.
///
/// `0` logs warnings and errors, `1` adds info, `2` debug and `3+` trace.
/// `RUST_LOG` directives are honored on top of the level.
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
