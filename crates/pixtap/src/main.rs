//! pixtap CLI - Pixlet applet renderer.
//!
//! Provides commands for:
//! - `extract`: Render the applet and emit Singer-style image records
//! - `render`: Render the applet to a WebP file or stdout

mod commands;
mod error;
mod output;
mod records;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{ExtractArgs, RenderArgs};
use output::Output;

/// pixtap - Pixlet applet renderer.
#[derive(Parser)]
#[command(name = "pixtap", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the applet and emit Singer-style image records on stdout.
    Extract(ExtractArgs),
    /// Render the applet to a WebP file or stdout.
    Render(RenderArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    let verbose = match &cli.command {
        Commands::Extract(args) => args.verbose,
        Commands::Render(args) => args.verbose,
    };

    // Initialize tracing with appropriate log level
    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let result = match cli.command {
        Commands::Extract(args) => rt.block_on(args.execute()),
        Commands::Render(args) => rt.block_on(args.execute()),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
