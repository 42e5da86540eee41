//! # Property-Based Tests
//!
//! Counter invariants checked with proptest.

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;
use serde_json::json;
use sovereign_core::primitives::{BASE_COUNT, COUNT_KEY, MAX_COUNT};
use sovereign_core::{Counter, CounterPolicy, KvStore, MemoryStore};

fn genesis() -> DateTime<Utc> {
    CounterPolicy::default().genesis
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// A read never reports less than what is stored, nor more than the cap.
    #[test]
    fn read_is_between_stored_and_cap(
        stored in 0u64..=MAX_COUNT,
        offset_minutes in -100_000i64..2_000_000,
    ) {
        let store = MemoryStore::new();
        store.set(COUNT_KEY, &json!(stored)).expect("set");
        let policy = CounterPolicy::default();
        let counter = Counter::new(&store, &policy);

        let now = genesis() + Duration::minutes(offset_minutes);
        let count = counter.read(now).expect("read");

        prop_assert!(count >= stored);
        prop_assert!(count <= MAX_COUNT);
    }

    /// Sequential reads at increasing times never go down.
    #[test]
    fn reads_are_monotonic(
        stored in 0u64..=MAX_COUNT,
        mut steps in proptest::collection::vec(0i64..500_000, 1..20),
    ) {
        steps.sort_unstable();
        let store = MemoryStore::new();
        store.set(COUNT_KEY, &json!(stored)).expect("set");
        let policy = CounterPolicy::default();
        let counter = Counter::new(&store, &policy);

        let mut previous = 0;
        for minutes in steps {
            let count = counter.read(genesis() + Duration::minutes(minutes)).expect("read");
            prop_assert!(count >= previous);
            previous = count;
        }
    }

    /// The stored value after a read is never lower than before it.
    #[test]
    fn read_never_lowers_the_store(
        stored in 0u64..5000,
        offset_days in 0i64..400,
    ) {
        let store = MemoryStore::new();
        store.set(COUNT_KEY, &json!(stored)).expect("set");
        let policy = CounterPolicy::default();
        let counter = Counter::new(&store, &policy);

        counter.read(genesis() + Duration::days(offset_days)).expect("read");
        let after = counter.persisted_count().expect("persisted");
        prop_assert!(after >= stored);
    }

    /// Increments add exactly one until the cap, then hold.
    #[test]
    fn increment_adds_one_or_holds(stored in 0u64..=MAX_COUNT) {
        let store = MemoryStore::new();
        store.set(COUNT_KEY, &json!(stored)).expect("set");
        let policy = CounterPolicy::default();
        let next = Counter::new(&store, &policy).increment().expect("increment");

        prop_assert_eq!(next, (stored + 1).min(MAX_COUNT));
    }

    /// Non-numeric stored values increment from the base count.
    #[test]
    fn non_numeric_increments_from_base(garbage in "[a-z]{0,12}") {
        let store = MemoryStore::new();
        store.set(COUNT_KEY, &json!(garbage)).expect("set");
        let policy = CounterPolicy::default();

        prop_assert_eq!(
            Counter::new(&store, &policy).increment().expect("increment"),
            BASE_COUNT + 1
        );
    }
}
