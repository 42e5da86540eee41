//! # Sovereign Client
//!
//! HTTP access to the Sovereign server and the driver that walks the funnel
//! against it.

pub mod client;
pub mod driver;

pub use client::{
    ClientError, DEFAULT_TIMEOUT, INCREMENT_FALLBACK, STATS_FALLBACK, SovereignClient,
};
pub use driver::{BondOutcome, DriverError, FunnelDriver, IntakeApi};
