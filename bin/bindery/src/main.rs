//! Bindery CLI
//!
//! Markdown blog generator with a live-reload preview server.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Bindery.
#[derive(Parser)]
#[command(
    name = "bindery",
    version,
    about = "A Markdown blog generator with live reload"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Create a starter project
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        root: PathBuf,
    },
    /// Build the static site
    Build {
        /// Output directory (defaults to <root>/public)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Project directory containing bindery.yaml
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
    /// Start the preview server with live reload
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
        /// Open browser automatically
        #[arg(long)]
        open: bool,
        /// Project directory containing bindery.yaml
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    bindery::init_tracing(cli.verbose);

    match cli.command {
        Commands::Init { root } => bindery::cmd::init::run(&root)?,
        Commands::Build { output, root } => bindery::cmd::build::run(&root, output.as_deref())?,
        Commands::Serve { port, open, root } => bindery::cmd::serve::run(&root, port, open).await?,
    }

    Ok(())
}
