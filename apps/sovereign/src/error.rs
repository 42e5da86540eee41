//! # Application Errors
//!
//! Failures of the binary itself: configuration, sockets, files. Core errors
//! pass through unchanged.

use sovereign_core::SovereignError;
use thiserror::Error;

/// Errors surfaced by the CLI and server startup.
#[derive(Debug, Error)]
pub enum AppError {
    /// The configuration file is unreadable or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A socket or file operation failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// The core reported an error.
    #[error(transparent)]
    Core(#[from] SovereignError),
}
