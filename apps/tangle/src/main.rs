//! # Tangle - Approval DAG Server
//!
//! The main binary for the tangle graph engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for graph operations
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │             apps/tangle (THE BINARY)         │
//! │                                              │
//! │   ┌─────────────┐         ┌─────────────┐    │
//! │   │    CLI      │         │  HTTP API   │    │
//! │   │   (clap)    │         │   (axum)    │    │
//! │   └──────┬──────┘         └──────┬──────┘    │
//! │          └───────────┬───────────┘           │
//! │                      ▼                       │
//! │              ┌───────────────┐               │
//! │              │  tangle-core  │               │
//! │              │  (THE LOGIC)  │               │
//! │              └───────────────┘               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! tangle server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! tangle add genesis
//! tangle approve tx-1 genesis
//! tangle tip --alpha 0.5
//! tangle validate --json-mode
//! ```

use clap::Parser;
use tangle::{cli, config::AppConfig, config::DEFAULT_CONFIG_PATH, logging};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // An explicit --config must exist; the default path is optional.
    let (config_path, required) = match &cli.config {
        Some(path) => (path.clone(), true),
        None => (DEFAULT_CONFIG_PATH.into(), false),
    };

    let mut config = match AppConfig::load(&config_path, required) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    config.apply_env();
    cli.apply_overrides(&mut config);

    if let Err(e) = logging::init(&config.log) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ┌┬┐┌─┐┌┐┌┌─┐┬  ┌─┐
   │ ├─┤││││ ┬│  ├┤
   ┴ ┴ ┴┘└┘└─┘┴─┘└─┘

  Approval Tangle v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
