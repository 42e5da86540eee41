//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Sovereign core.
//!
//! The counter constants are defaults only; a deployment may override them
//! through [`crate::CounterPolicy`]. Store keys and the funnel constants are
//! fixed: clients and persisted data depend on them.

use std::time::Duration;

// =============================================================================
// STORE KEYS
// =============================================================================

/// Key holding the membership count high-water mark.
pub const COUNT_KEY: &str = "sovereign:count";

/// Prefix for contact records. The full key is the prefix plus the UUID.
pub const CONTACT_KEY_PREFIX: &str = "sovereign:contact:";

// =============================================================================
// COUNTER DEFAULTS
// =============================================================================

/// Start of the simulated growth curve, as RFC 3339.
pub const GENESIS: &str = "2025-12-01T00:00:00Z";

/// Count at genesis, and the starting point for increments on an empty store.
pub const BASE_COUNT: u64 = 1420;

/// Hard cap. No read or increment ever returns more.
pub const MAX_COUNT: u64 = 1881;

/// Simulated growth per day, in thousandths (3.8 per day).
///
/// Kept as an integer so the curve is computed without floating point.
pub const DAILY_RATE_MILLI: u64 = 3800;

/// Count reported when the store cannot be read.
pub const FALLBACK_COUNT: u64 = 1444;

/// Milliseconds in one day.
pub const MILLIS_PER_DAY: u64 = 86_400_000;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for the canonical contact fields (identity, channel,
/// intent, referrer).
pub const MAX_FIELD_LENGTH: usize = 4096;

// =============================================================================
// FUNNEL
// =============================================================================

/// How long the protocol attestation must be held.
pub const ATTEST_HOLD: Duration = Duration::from_millis(2000);

/// Maximum number of peers accepted on the referral stage.
pub const MAX_REFERRALS: usize = 3;

/// Display name recorded when the bond is posted without one.
pub const DEFAULT_DISPLAY_NAME: &str = "Initiate";

/// Session key for the member status.
pub const SESSION_STATUS_KEY: &str = "sovereign_status";

/// Session key for the display name.
pub const SESSION_NAME_KEY: &str = "sovereign_name";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_count_is_below_cap() {
        assert!(BASE_COUNT < MAX_COUNT);
        assert!(FALLBACK_COUNT <= MAX_COUNT);
    }

    #[test]
    fn genesis_parses() {
        assert!(chrono::DateTime::parse_from_rfc3339(GENESIS).is_ok());
    }
}
