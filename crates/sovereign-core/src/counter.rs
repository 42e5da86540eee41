//! # Counter Service
//!
//! The membership count shown on the entry page.
//!
//! The count blends two sources:
//! - a simulated curve that grows with wall-clock time since genesis
//!   ([`CounterPolicy::simulated_count`]),
//! - the persisted high-water mark, raised by real increments
//!   ([`Counter::persisted_count`]).
//!
//! They are reconciled in exactly one place, [`CounterPolicy::effective_count`]:
//! `min(max_count, max(persisted, simulated))`.
//!
//! Every read writes the effective count back when it is higher than the
//! persisted value, so the stored count never goes down.

use crate::primitives::{
    BASE_COUNT, COUNT_KEY, DAILY_RATE_MILLI, FALLBACK_COUNT, GENESIS, MAX_COUNT, MILLIS_PER_DAY,
};
use crate::{KvStore, SovereignError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// =============================================================================
// POLICY
// =============================================================================

/// Tunables for the growth curve and the cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterPolicy {
    /// Start of the simulated curve.
    pub genesis: DateTime<Utc>,
    /// Count at genesis.
    pub base_count: u64,
    /// Hard cap.
    pub max_count: u64,
    /// Growth per day, in thousandths.
    pub daily_rate_milli: u64,
    /// Count reported when the store is unreadable.
    pub fallback_count: u64,
}

impl Default for CounterPolicy {
    fn default() -> Self {
        Self {
            genesis: DateTime::parse_from_rfc3339(GENESIS)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            base_count: BASE_COUNT,
            max_count: MAX_COUNT,
            daily_rate_milli: DAILY_RATE_MILLI,
            fallback_count: FALLBACK_COUNT,
        }
    }
}

impl CounterPolicy {
    /// The time-based count at `now`, before capping.
    ///
    /// `base + floor(elapsed_days * rate)`, with elapsed time clamped at zero
    /// before genesis.
    #[must_use]
    pub fn simulated_count(&self, now: DateTime<Utc>) -> u64 {
        let elapsed_ms = (now - self.genesis).num_milliseconds().max(0) as u64;
        let growth = elapsed_ms.saturating_mul(self.daily_rate_milli) / (MILLIS_PER_DAY * 1000);
        self.base_count.saturating_add(growth)
    }

    /// The count shown to callers.
    #[must_use]
    pub fn effective_count(&self, persisted: u64, simulated: u64) -> u64 {
        persisted.max(simulated).min(self.max_count)
    }
}

/// Interpret a stored value as a count. Anything but a non-negative integer
/// is treated as absent.
fn stored_count(value: Option<&Value>) -> Option<u64> {
    value.and_then(Value::as_u64)
}

// =============================================================================
// COUNTER
// =============================================================================

/// The counter service, borrowing a store and a policy.
#[derive(Debug)]
pub struct Counter<'a, S: KvStore + ?Sized> {
    store: &'a S,
    policy: &'a CounterPolicy,
}

impl<'a, S: KvStore + ?Sized> Counter<'a, S> {
    /// Bind the service to a store.
    pub fn new(store: &'a S, policy: &'a CounterPolicy) -> Self {
        Self { store, policy }
    }

    /// The raw stored value, 0 when absent or non-numeric.
    pub fn persisted_count(&self) -> Result<u64, SovereignError> {
        let stored = self.store.get(COUNT_KEY)?;
        Ok(stored_count(stored.as_ref()).unwrap_or(0))
    }

    /// Read the effective count at `now`, raising the stored high-water mark
    /// if the simulated curve has passed it.
    ///
    /// The write-back is an atomic max: it never lowers a value raised by a
    /// concurrent increment. When that happens the higher value is returned.
    pub fn read(&self, now: DateTime<Utc>) -> Result<u64, SovereignError> {
        let persisted = self.persisted_count()?;
        let effective = self
            .policy
            .effective_count(persisted, self.policy.simulated_count(now));

        if effective <= persisted {
            return Ok(effective);
        }

        let written = self.store.update(COUNT_KEY, &mut |previous| {
            let previous = stored_count(previous.as_ref()).unwrap_or(0);
            json!(previous.max(effective))
        })?;
        Ok(stored_count(Some(&written))
            .unwrap_or(effective)
            .min(self.policy.max_count))
    }

    /// [`Counter::read`], degrading to the policy's fallback count on any
    /// storage error. `on_error` sees the error before it is dropped.
    pub fn read_or_fallback(
        &self,
        now: DateTime<Utc>,
        on_error: impl FnOnce(&SovereignError),
    ) -> u64 {
        match self.read(now) {
            Ok(count) => count,
            Err(e) => {
                on_error(&e);
                self.policy.fallback_count
            }
        }
    }

    /// Add one real member. Starts from the base count when nothing numeric
    /// is stored, and never exceeds the cap.
    pub fn increment(&self) -> Result<u64, SovereignError> {
        let base = self.policy.base_count;
        let max = self.policy.max_count;
        let written = self.store.update(COUNT_KEY, &mut |previous| {
            let previous = stored_count(previous.as_ref()).unwrap_or(base);
            json!(previous.saturating_add(1).min(max))
        })?;
        stored_count(Some(&written)).ok_or_else(|| {
            SovereignError::SerializationError("count was not written as an integer".to_string())
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
