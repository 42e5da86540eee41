//! # Sovereign - Intake Server
//!
//! The binary behind the membership funnel: it serves the member count and
//! stores applicant submissions.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │               apps/sovereign (THE BINARY)         │
//! │                                                   │
//! │   ┌─────────────┐        ┌─────────────┐          │
//! │   │    CLI      │        │  HTTP API   │          │
//! │   │   (clap)    │        │   (axum)    │          │
//! │   └──────┬──────┘        └──────┬──────┘          │
//! │          └───────────┬──────────┘                 │
//! │                      ▼                            │
//! │             ┌────────────────┐                    │
//! │             │ sovereign-core │                    │
//! │             └────────────────┘                    │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! sovereign server --host 0.0.0.0 --port 8080
//!
//! # Operator commands
//! sovereign count
//! sovereign contacts --limit 20
//! sovereign export -o dossiers.json
//! ```

use clap::Parser;
use sovereign::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // SOVEREIGN_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("SOVEREIGN_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "sovereign=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ╔═╗╔═╗╦  ╦╔═╗╦═╗╔═╗╦╔═╗╔╗╔
  ╚═╗║ ║╚╗╔╝║╣ ╠╦╝║╣ ║║ ╦║║║
  ╚═╝╚═╝ ╚╝ ╚═╝╩╚═╚═╝╩╚═╝╝╚╝

  Sovereign Intake Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
