//! # sovereign-core
//!
//! The intake engine for the Sovereign funnel - THE LOGIC.
//!
//! This crate holds everything in the system that carries state:
//! - a membership counter that only ever moves forward,
//! - an append-only contact intake,
//! - the client-side funnel stage machine and its persisted session.
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Every service borrows a [`KvStore`]; nothing owns a global store
//! - Wall-clock time is an argument, never read inside a service
//! - The HTTP server and the client live in `apps/`

// =============================================================================
// MODULES
// =============================================================================

pub mod contact;
pub mod counter;
pub mod funnel;
pub mod primitives;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{RequiredField, SovereignError};

// =============================================================================
// RE-EXPORTS: Services
// =============================================================================

pub use contact::{
    CanonicalContact, ContactPayload, ContactReceipt, CurrentFields, Intake, LegacyFields,
    PayloadConvention,
};
pub use counter::{Counter, CounterPolicy};
pub use store::{KvStore, MemoryStore, RedbStore};

// =============================================================================
// RE-EXPORTS: Funnel
// =============================================================================

pub use funnel::{
    Action, ContactForm, EntryView, FieldErrors, FileSessionStore, Funnel, FunnelError,
    MemberStatus, MemorySessionStore, Peer, SessionState, SessionStore, Stage,
};
