//! # Intake Tests
//!
//! Counter and contact behavior against both store backends, and the full
//! funnel walk.

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use sovereign_core::primitives::{ATTEST_HOLD, BASE_COUNT, COUNT_KEY, MAX_COUNT};
use sovereign_core::{
    ContactForm, ContactPayload, Counter, CounterPolicy, EntryView, FileSessionStore, Funnel,
    Intake, KvStore, MemberStatus, MemorySessionStore, MemoryStore, Peer, RedbStore,
    RequiredField, SovereignError, Stage,
};
use std::sync::Arc;
use tempfile::tempdir;

fn submit<S: KvStore + ?Sized>(store: &S, body: Value) -> Result<String, SovereignError> {
    let contact = ContactPayload::from_value(body)?.normalize()?;
    let receipt = Intake::new(store).submit(contact, Utc::now())?;
    Ok(receipt.id.to_string())
}

fn is_uuid_shaped(id: &str) -> bool {
    let groups: Vec<&str> = id.split('-').collect();
    groups.iter().map(|g| g.len()).collect::<Vec<_>>() == vec![8, 4, 4, 4, 12]
        && groups
            .iter()
            .all(|g| g.chars().all(|c| c.is_ascii_hexdigit()))
}

fn dossier() -> ContactForm {
    ContactForm {
        designation: "Ada".into(),
        email: "ada@example.com".into(),
        city: "Lisbon".into(),
        domain: "Engines".into(),
        blood_type: "A+".into(),
        mandate: "Analytical".into(),
        influence_name: "Charles".into(),
        influence_type: "Mentor".into(),
        burden: "Notes".into(),
        pledge: true,
        ..ContactForm::default()
    }
}

// =============================================================================
// COUNTER
// =============================================================================

#[test]
fn test_increment_at_cap_holds() {
    let store = MemoryStore::new();
    store.set(COUNT_KEY, &json!(1881)).expect("set");
    let policy = CounterPolicy::default();
    assert_eq!(Counter::new(&store, &policy).increment().expect("inc"), 1881);
}

#[test]
fn test_increment_from_absent_is_base_plus_one() {
    let dir = tempdir().expect("tempdir");
    let store = RedbStore::open(dir.path().join("c.redb")).expect("open");
    let policy = CounterPolicy::default();
    assert_eq!(Counter::new(&store, &policy).increment().expect("inc"), 1421);
    assert_eq!(BASE_COUNT + 1, 1421);
}

#[test]
fn test_concurrent_increments_on_redb_are_not_lost() {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(RedbStore::open(dir.path().join("race.redb")).expect("open"));
    let policy = Arc::new(CounterPolicy::default());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let policy = Arc::clone(&policy);
            std::thread::spawn(move || {
                for _ in 0..10 {
                    Counter::new(store.as_ref(), policy.as_ref())
                        .increment()
                        .expect("inc");
                }
            })
        })
        .collect();
    for h in handles {
        h.join().expect("join");
    }

    assert_eq!(store.get(COUNT_KEY).expect("get"), Some(json!(BASE_COUNT + 40)));
}

#[test]
fn test_read_persists_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("hw.redb");
    let now: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .expect("time")
        .with_timezone(&Utc);
    let policy = CounterPolicy::default();

    let first = {
        let store = RedbStore::open(&path).expect("open");
        Counter::new(&store, &policy).read(now).expect("read")
    };
    assert!(first > BASE_COUNT && first <= MAX_COUNT);

    let store = RedbStore::open(&path).expect("reopen");
    let counter = Counter::new(&store, &policy);
    assert_eq!(counter.persisted_count().expect("persisted"), first);
    // An earlier clock cannot pull the count back down.
    let earlier = now - chrono::Duration::days(20);
    assert_eq!(counter.read(earlier).expect("read"), first);
}

// =============================================================================
// CONTACT
// =============================================================================

#[test]
fn test_submit_contact_stores_fields_and_metadata() {
    let dir = tempdir().expect("tempdir");
    let store = RedbStore::open(dir.path().join("contacts.redb")).expect("open");

    let id = submit(&store, json!({"alias": "A", "contact": "a@x.com", "origin": "console"}))
        .expect("submit");
    assert!(is_uuid_shaped(&id), "id {id} should look like a UUID");

    let stored = Intake::new(&store)
        .get(&id)
        .expect("get")
        .expect("present");
    assert_eq!(stored["alias"], json!("A"));
    assert_eq!(stored["contact"], json!("a@x.com"));
    assert_eq!(stored["origin"], json!("console"));
    assert_eq!(stored["id"], json!(id));

    let timestamp = stored["timestamp"].as_str().expect("timestamp string");
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert!(timestamp.ends_with('Z'));
}

#[test]
fn test_submit_empty_names_both_fields() {
    let store = MemoryStore::new();
    match submit(&store, json!({})) {
        Err(SovereignError::MissingFields(fields)) => assert_eq!(
            fields,
            vec![RequiredField::Identity, RequiredField::ContactChannel]
        ),
        other => unreachable!("unexpected result: {other:?}"),
    }
    assert!(Intake::new(&store).list().expect("list").is_empty());
}

#[test]
fn test_submit_designation_only_names_contact() {
    let store = MemoryStore::new();
    match submit(&store, json!({"designation": "A"})) {
        Err(SovereignError::MissingFields(fields)) => {
            assert_eq!(fields, vec![RequiredField::ContactChannel]);
        }
        other => unreachable!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_each_submission_gets_its_own_record() {
    let store = MemoryStore::new();
    let a = submit(&store, json!({"alias": "A", "contact": "a"})).expect("submit");
    let b = submit(&store, json!({"alias": "A", "contact": "a"})).expect("submit");
    assert_ne!(a, b);
    assert_eq!(Intake::new(&store).list().expect("list").len(), 2);
}

// =============================================================================
// FUNNEL
// =============================================================================

#[test]
fn test_full_funnel_walk_and_reset() {
    let store = MemoryStore::new();
    let mut funnel = Funnel::new(MemorySessionStore::new()).expect("new");
    assert_eq!(funnel.stage(), Stage::Entry);
    assert_eq!(funnel.entry_view(), EntryView::FirstVisit);

    funnel.begin().expect("begin");
    funnel.attest(ATTEST_HOLD).expect("attest");

    let payload = funnel.prepare_contact(&dossier()).expect("valid dossier");
    let id = submit(&store, payload).expect("intake accepts dossier");
    funnel.contact_accepted(id).expect("accepted");
    assert_eq!(funnel.stage(), Stage::Bond);

    funnel.confirm_bond("Ada").expect("bond");
    assert_eq!(funnel.stage(), Stage::Referral);
    assert_eq!(funnel.status(), MemberStatus::BondPosted);

    let accepted = funnel
        .submit_referral(&[
            Peer {
                name: "Mary".into(),
                email: "mary@example.com".into(),
            },
            Peer::default(),
        ])
        .expect("referral");
    assert_eq!(accepted.len(), 1);
    assert_eq!(funnel.stage(), Stage::Entry);
    assert_eq!(funnel.status(), MemberStatus::Complete);
    assert_eq!(
        funnel.entry_view(),
        EntryView::Returning {
            status: MemberStatus::Complete,
            name: "Ada".into()
        }
    );

    funnel.reset().expect("reset");
    assert_eq!(funnel.stage(), Stage::Entry);
    assert_eq!(funnel.status(), MemberStatus::None);
    assert!(funnel.display_name().is_none());
    assert_eq!(funnel.entry_view(), EntryView::FirstVisit);
}

#[test]
fn test_returning_member_survives_restart() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("session.json");

    {
        let mut funnel = Funnel::new(FileSessionStore::new(&path)).expect("new");
        funnel.begin().expect("begin");
        funnel.attest(ATTEST_HOLD).expect("attest");
        funnel.contact_accepted("x").expect("accepted");
        funnel.confirm_bond("Grace").expect("bond");
    }

    let funnel = Funnel::new(FileSessionStore::new(&path)).expect("reload");
    assert_eq!(funnel.stage(), Stage::Entry);
    assert_eq!(
        funnel.entry_view(),
        EntryView::Returning {
            status: MemberStatus::BondPosted,
            name: "Grace".into()
        }
    );
}
