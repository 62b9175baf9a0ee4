// SecureDB: Application Entry Point
//
// Parses CLI arguments, initializes structured logging, and dispatches to
// the command handler. Log fields carry record ids only, never payloads or
// key material.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use securedb::cli::{execute, Cli};

#[tokio::main]
async fn main() {
    // RUST_LOG=securedb=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("securedb=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
