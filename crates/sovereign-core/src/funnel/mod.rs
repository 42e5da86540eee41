//! # Funnel State Machine
//!
//! The client-side stage machine an applicant walks through.
//!
//! ```text
//!            ┌──────── reset ────────┐
//!            ▼                       │
//!   ┌──── ENTRY ──next──▶ PROTOCOL ──attest──▶ CONTACT ──submit──▶ BOND
//!   │      ▲  ▲                                                     │
//!   │      │  └───────────────── submit ◀── REFERRAL ◀── confirm ───┘
//!   │      │
//!   ├─login─▶ LOGIN ──back──┤
//!   └─colophon─▶ COLOPHON ──back──┘
//! ```
//!
//! ## Persisted status
//!
//! | Transition          | Status written |
//! |---------------------|----------------|
//! | BOND → REFERRAL     | `bond_posted` + display name |
//! | REFERRAL → ENTRY    | `complete` |
//! | ENTRY → ENTRY reset | cleared |
//!
//! Status only moves forward. The side stages never touch it.
//!
//! Every transition that persists writes first and moves second: if the
//! session store fails, the stage does not change.

mod form;
mod session;

pub use form::{ContactForm, FieldErrors, Peer, is_email, within_referral_limit};
pub use session::{FileSessionStore, MemorySessionStore, SessionState, SessionStore};

use crate::primitives::{ATTEST_HOLD, DEFAULT_DISPLAY_NAME, MAX_REFERRALS};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// STAGES
// =============================================================================

/// Where the applicant is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Entry,
    Protocol,
    Contact,
    Bond,
    Referral,
    Login,
    Colophon,
}

impl Stage {
    /// Display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Entry => "Entry",
            Stage::Protocol => "Protocol",
            Stage::Contact => "Dossier",
            Stage::Bond => "Bond",
            Stage::Referral => "Referral",
            Stage::Login => "Member Access",
            Stage::Colophon => "Colophon",
        }
    }

    /// Position on the main path, or `None` for side stages.
    #[must_use]
    pub fn step(&self) -> Option<u8> {
        match self {
            Stage::Entry => Some(0),
            Stage::Protocol => Some(1),
            Stage::Contact => Some(2),
            Stage::Bond => Some(3),
            Stage::Referral => Some(4),
            Stage::Login | Stage::Colophon => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What the applicant did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Next,
    Attest,
    SubmitContact,
    ConfirmBond,
    SubmitReferral,
    Reset,
    OpenLogin,
    OpenColophon,
    Back,
}

/// The transition table. `None` means the action is not available at
/// `stage`.
#[must_use]
pub fn transition(stage: Stage, action: Action) -> Option<Stage> {
    match (stage, action) {
        (Stage::Entry, Action::Next) => Some(Stage::Protocol),
        (Stage::Protocol, Action::Attest) => Some(Stage::Contact),
        (Stage::Contact, Action::SubmitContact) => Some(Stage::Bond),
        (Stage::Bond, Action::ConfirmBond) => Some(Stage::Referral),
        (Stage::Referral, Action::SubmitReferral) => Some(Stage::Entry),
        (Stage::Entry, Action::Reset) => Some(Stage::Entry),
        (Stage::Entry, Action::OpenLogin) => Some(Stage::Login),
        (Stage::Entry, Action::OpenColophon) => Some(Stage::Colophon),
        (Stage::Login | Stage::Colophon, Action::Back) => Some(Stage::Entry),
        _ => None,
    }
}

// =============================================================================
// MEMBER STATUS
// =============================================================================

/// How far the applicant has ever got. Ordered: later variants are further.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    #[default]
    None,
    BondPosted,
    Complete,
}

impl MemberStatus {
    /// Stored string, `None` for the empty status.
    #[must_use]
    pub fn as_stored(&self) -> Option<&'static str> {
        match self {
            MemberStatus::None => None,
            MemberStatus::BondPosted => Some("bond_posted"),
            MemberStatus::Complete => Some("complete"),
        }
    }

    /// Parse a stored string. Unknown strings are the empty status.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "bond_posted" => MemberStatus::BondPosted,
            "complete" => MemberStatus::Complete,
            _ => MemberStatus::None,
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_stored().unwrap_or("none"))
    }
}

/// How the entry stage renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryView {
    FirstVisit,
    Returning { status: MemberStatus, name: String },
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors raised by the funnel. None of them change the stage.
#[derive(Debug, Error)]
pub enum FunnelError {
    /// The action is not available at the current stage.
    #[error("Cannot {action:?} from {stage}")]
    InvalidTransition { stage: Stage, action: Action },

    /// The attestation was released before the hold completed.
    #[error("Attestation held for {held_ms}ms, {required_ms}ms required")]
    AttestationIncomplete { held_ms: u128, required_ms: u128 },

    /// The dossier failed field validation.
    #[error("Invalid form: {0}")]
    InvalidForm(FieldErrors),

    /// More peers than the referral form allows.
    #[error("At most {max} referrals, got {got}")]
    TooManyReferrals { max: usize, got: usize },

    /// The session store failed.
    #[error("Session error: {0}")]
    Session(String),
}

// =============================================================================
// FUNNEL
// =============================================================================

/// The funnel, owning its session store.
#[derive(Debug)]
pub struct Funnel<S: SessionStore> {
    stage: Stage,
    session: SessionState,
    store: S,
    last_error: Option<String>,
    contact_id: Option<String>,
}

impl<S: SessionStore> Funnel<S> {
    /// Start at ENTRY with whatever the store remembers.
    pub fn new(store: S) -> Result<Self, FunnelError> {
        let session = store.load()?;
        Ok(Self {
            stage: Stage::Entry,
            session,
            store,
            last_error: None,
            contact_id: None,
        })
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn status(&self) -> MemberStatus {
        self.session.status
    }

    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.session.name.as_deref()
    }

    /// Inline error from the last failed submission, cleared by the next
    /// successful transition.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Id of the contact record accepted in this session.
    #[must_use]
    pub fn contact_id(&self) -> Option<&str> {
        self.contact_id.as_deref()
    }

    /// The session store, for inspection.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// How ENTRY renders.
    #[must_use]
    pub fn entry_view(&self) -> EntryView {
        match self.session.status {
            MemberStatus::None => EntryView::FirstVisit,
            status => EntryView::Returning {
                status,
                name: self
                    .session
                    .name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string()),
            },
        }
    }

    fn target(&self, action: Action) -> Result<Stage, FunnelError> {
        transition(self.stage, action).ok_or(FunnelError::InvalidTransition {
            stage: self.stage,
            action,
        })
    }

    fn move_to(&mut self, stage: Stage) -> Stage {
        self.stage = stage;
        self.last_error = None;
        stage
    }

    /// Persist a status that is never behind the current one.
    fn advance_status(
        &mut self,
        status: MemberStatus,
        name: Option<String>,
    ) -> Result<(), FunnelError> {
        let next = SessionState {
            status: self.session.status.max(status),
            name: name.or_else(|| self.session.name.clone()),
        };
        self.store.save(&next)?;
        self.session = next;
        Ok(())
    }

    /// ENTRY → PROTOCOL.
    pub fn begin(&mut self) -> Result<Stage, FunnelError> {
        let next = self.target(Action::Next)?;
        Ok(self.move_to(next))
    }

    /// PROTOCOL → CONTACT, once the attestation has been held long enough.
    pub fn attest(&mut self, held: Duration) -> Result<Stage, FunnelError> {
        let next = self.target(Action::Attest)?;
        if held < ATTEST_HOLD {
            return Err(FunnelError::AttestationIncomplete {
                held_ms: held.as_millis(),
                required_ms: ATTEST_HOLD.as_millis(),
            });
        }
        Ok(self.move_to(next))
    }

    /// Validate the dossier and produce the payload to submit.
    ///
    /// Does not move: call [`Funnel::contact_accepted`] once the submission
    /// succeeds, or [`Funnel::submission_failed`] if it does not.
    pub fn prepare_contact(&self, form: &ContactForm) -> Result<Value, FunnelError> {
        self.target(Action::SubmitContact)?;
        form.validate().map_err(FunnelError::InvalidForm)?;
        Ok(form.to_payload())
    }

    /// CONTACT → BOND, after the intake accepted the dossier.
    pub fn contact_accepted(&mut self, id: impl Into<String>) -> Result<Stage, FunnelError> {
        let next = self.target(Action::SubmitContact)?;
        self.contact_id = Some(id.into());
        Ok(self.move_to(next))
    }

    /// Record a failed submission. The stage does not change.
    pub fn submission_failed(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// BOND → REFERRAL. Persists `bond_posted` and the display name.
    pub fn confirm_bond(&mut self, name: &str) -> Result<Stage, FunnelError> {
        let next = self.target(Action::ConfirmBond)?;
        let name = match name.trim() {
            "" => DEFAULT_DISPLAY_NAME,
            trimmed => trimmed,
        };
        self.advance_status(MemberStatus::BondPosted, Some(name.to_string()))?;
        Ok(self.move_to(next))
    }

    /// REFERRAL → ENTRY. Persists `complete`. Blank peer rows are ignored;
    /// returns the peers that were filled in.
    pub fn submit_referral(&mut self, peers: &[Peer]) -> Result<Vec<Peer>, FunnelError> {
        let next = self.target(Action::SubmitReferral)?;
        if !within_referral_limit(peers) {
            return Err(FunnelError::TooManyReferrals {
                max: MAX_REFERRALS,
                got: peers.len(),
            });
        }
        self.advance_status(MemberStatus::Complete, None)?;
        self.move_to(next);
        Ok(peers.iter().filter(|p| !p.is_blank()).cloned().collect())
    }

    /// ENTRY → ENTRY, forgetting status and name.
    pub fn reset(&mut self) -> Result<Stage, FunnelError> {
        let next = self.target(Action::Reset)?;
        self.store.clear()?;
        self.session = SessionState::default();
        self.contact_id = None;
        Ok(self.move_to(next))
    }

    /// ENTRY → LOGIN. Member access is not implemented; the stage only
    /// leads back.
    pub fn open_login(&mut self) -> Result<Stage, FunnelError> {
        let next = self.target(Action::OpenLogin)?;
        Ok(self.move_to(next))
    }

    /// ENTRY → COLOPHON.
    pub fn open_colophon(&mut self) -> Result<Stage, FunnelError> {
        let next = self.target(Action::OpenColophon)?;
        Ok(self.move_to(next))
    }

    /// LOGIN | COLOPHON → ENTRY.
    pub fn back(&mut self) -> Result<Stage, FunnelError> {
        let next = self.target(Action::Back)?;
        Ok(self.move_to(next))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl SessionStore for BrokenStore {
        fn load(&self) -> Result<SessionState, FunnelError> {
            Ok(SessionState::default())
        }
        fn save(&mut self, _: &SessionState) -> Result<(), FunnelError> {
            Err(FunnelError::Session("disk full".into()))
        }
        fn clear(&mut self) -> Result<(), FunnelError> {
            Err(FunnelError::Session("disk full".into()))
        }
    }

    fn at_bond<S: SessionStore>(store: S) -> Funnel<S> {
        let mut funnel = Funnel::new(store).expect("new");
        funnel.begin().expect("begin");
        funnel.attest(ATTEST_HOLD).expect("attest");
        funnel.contact_accepted("id-1").expect("accepted");
        funnel
    }

    #[test]
    fn transition_table_main_path() {
        assert_eq!(transition(Stage::Entry, Action::Next), Some(Stage::Protocol));
        assert_eq!(transition(Stage::Referral, Action::SubmitReferral), Some(Stage::Entry));
        assert_eq!(transition(Stage::Protocol, Action::Next), None);
        assert_eq!(transition(Stage::Bond, Action::Reset), None);
        assert_eq!(transition(Stage::Login, Action::Next), None);
    }

    #[test]
    fn short_hold_does_not_attest() {
        let mut funnel = Funnel::new(MemorySessionStore::new()).expect("new");
        funnel.begin().expect("begin");
        let err = funnel
            .attest(Duration::from_millis(500))
            .expect_err("too short");
        assert!(matches!(err, FunnelError::AttestationIncomplete { held_ms: 500, .. }));
        assert_eq!(funnel.stage(), Stage::Protocol);
    }

    #[test]
    fn invalid_transition_keeps_stage() {
        let mut funnel = Funnel::new(MemorySessionStore::new()).expect("new");
        let err = funnel.confirm_bond("x").expect_err("not at bond");
        assert!(matches!(
            err,
            FunnelError::InvalidTransition { stage: Stage::Entry, action: Action::ConfirmBond }
        ));
        assert_eq!(funnel.stage(), Stage::Entry);
        assert_eq!(funnel.status(), MemberStatus::None);
    }

    #[test]
    fn invalid_form_blocks_submission() {
        let mut funnel = Funnel::new(MemorySessionStore::new()).expect("new");
        funnel.begin().expect("begin");
        funnel.attest(Duration::from_secs(3)).expect("attest");
        let err = funnel
            .prepare_contact(&ContactForm::default())
            .expect_err("invalid");
        assert!(matches!(err, FunnelError::InvalidForm(ref e) if e.get("designation").is_some()));
        assert_eq!(funnel.stage(), Stage::Contact);
    }

    #[test]
    fn failed_submission_stays_and_records_error() {
        let mut funnel = Funnel::new(MemorySessionStore::new()).expect("new");
        funnel.begin().expect("begin");
        funnel.attest(ATTEST_HOLD).expect("attest");
        funnel.submission_failed("connection refused");
        assert_eq!(funnel.stage(), Stage::Contact);
        assert_eq!(funnel.last_error(), Some("connection refused"));

        funnel.contact_accepted("abc").expect("accepted");
        assert_eq!(funnel.stage(), Stage::Bond);
        assert!(funnel.last_error().is_none());
        assert_eq!(funnel.contact_id(), Some("abc"));
    }

    #[test]
    fn blank_bond_name_defaults() {
        let mut funnel = at_bond(MemorySessionStore::new());
        funnel.confirm_bond("  ").expect("bond");
        assert_eq!(funnel.display_name(), Some(DEFAULT_DISPLAY_NAME));
        assert_eq!(funnel.status(), MemberStatus::BondPosted);

        let saved = funnel.store().load().expect("load");
        assert_eq!(saved.status, MemberStatus::BondPosted);
        assert_eq!(saved.name.as_deref(), Some(DEFAULT_DISPLAY_NAME));
    }

    #[test]
    fn session_failure_blocks_bond() {
        let mut funnel = at_bond(BrokenStore);
        assert!(matches!(funnel.confirm_bond("Ada"), Err(FunnelError::Session(_))));
        assert_eq!(funnel.stage(), Stage::Bond);
        assert_eq!(funnel.status(), MemberStatus::None);
    }

    #[test]
    fn status_never_regresses() {
        let store = MemorySessionStore::with_state(SessionState {
            status: MemberStatus::Complete,
            name: Some("Ada".into()),
        });
        let mut funnel = at_bond(store);
        funnel.confirm_bond("Ada Again").expect("bond");
        assert_eq!(funnel.status(), MemberStatus::Complete);
        assert_eq!(funnel.display_name(), Some("Ada Again"));
    }

    #[test]
    fn too_many_referrals() {
        let mut funnel = at_bond(MemorySessionStore::new());
        funnel.confirm_bond("Ada").expect("bond");
        let peers = vec![Peer::default(); MAX_REFERRALS + 1];
        assert!(matches!(
            funnel.submit_referral(&peers),
            Err(FunnelError::TooManyReferrals { .. })
        ));
        assert_eq!(funnel.stage(), Stage::Referral);
        assert_eq!(funnel.status(), MemberStatus::BondPosted);
    }

    #[test]
    fn side_stages_do_not_touch_status() {
        let mut funnel = Funnel::new(MemorySessionStore::new()).expect("new");
        funnel.open_login().expect("login");
        assert_eq!(funnel.stage(), Stage::Login);
        assert!(funnel.begin().is_err());
        funnel.back().expect("back");
        funnel.open_colophon().expect("colophon");
        funnel.back().expect("back");
        assert_eq!(funnel.stage(), Stage::Entry);
        assert_eq!(funnel.entry_view(), EntryView::FirstVisit);
    }

    #[test]
    fn reset_only_from_entry() {
        let mut funnel = Funnel::new(MemorySessionStore::new()).expect("new");
        funnel.begin().expect("begin");
        assert!(funnel.reset().is_err());
        assert_eq!(funnel.stage(), Stage::Protocol);
    }

    #[test]
    fn status_strings() {
        for status in [MemberStatus::None, MemberStatus::BondPosted, MemberStatus::Complete] {
            assert_eq!(MemberStatus::parse(&status.to_string()), status);
        }
        assert!(MemberStatus::None < MemberStatus::BondPosted);
        assert!(MemberStatus::BondPosted < MemberStatus::Complete);
    }
}
