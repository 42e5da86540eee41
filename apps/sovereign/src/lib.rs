//! # Sovereign
//!
//! Library half of the `sovereign` binary: the HTTP API, the CLI and the
//! configuration layer. Integration tests reach the API through
//! `sovereign::api`.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;

pub use error::AppError;
