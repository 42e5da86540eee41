//! # Sovereign CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `count` - Show the current member count
//! - `increment` - Add one member to the count
//! - `contacts` - List stored submissions
//! - `export` - Write count and submissions to a JSON file
//! - `init` - Initialize a new database

mod commands;

use crate::AppError;
use crate::config::SovereignConfig;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Sovereign - intake service for the membership funnel
///
/// Serves the member count and stores applicant submissions.
#[derive(Parser, Debug)]
#[command(name = "sovereign")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database
    #[arg(short = 'D', long, global = true, default_value = "sovereign.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (volatile)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the configuration file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the configuration file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the current member count
    Count,

    /// Add one member to the count
    Increment,

    /// List stored submissions
    Contacts {
        /// Show only the newest N submissions
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Write count and submissions to a JSON file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = SovereignConfig::load(cli.config.as_deref())?;
    let backend = cli.backend.as_str();
    let json_mode = cli.json_mode;

    if cli.verbose {
        tracing::info!(
            server = ?config.server,
            counter = ?config.counter,
            auth = config.security.api_key.is_some(),
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Server { host, port }) => {
            cmd_server(&cli.database, backend, config, host, port).await
        }
        Some(Commands::Count) => cmd_count(&cli.database, backend, &config, json_mode),
        Some(Commands::Increment) => cmd_increment(&cli.database, backend, &config, json_mode),
        Some(Commands::Contacts { limit }) => {
            cmd_contacts(&cli.database, backend, json_mode, limit)
        }
        Some(Commands::Export { output }) => {
            cmd_export(&cli.database, backend, &config, &output)
        }
        Some(Commands::Init { force }) => cmd_init(&cli.database, backend, force),
        None => {
            // No subcommand - show the count by default
            cmd_count(&cli.database, backend, &config, json_mode)
        }
    }
}
