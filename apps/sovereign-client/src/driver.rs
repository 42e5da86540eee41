//! # Funnel Driver
//!
//! Binds the funnel state machine to the intake API. The state machine
//! decides whether a step is allowed; the driver performs the network call
//! the step needs and feeds the outcome back.
//!
//! Submissions are never retried. A failed contact submission keeps the
//! funnel on CONTACT with the error recorded in [`Funnel::last_error`].

use crate::client::{ClientError, SovereignClient};
use serde_json::Value;
use sovereign_core::{ContactForm, Funnel, FunnelError, Peer, SessionStore, Stage};
use std::future::Future;

// =============================================================================
// API SEAM
// =============================================================================

/// The calls the funnel makes against the intake service.
pub trait IntakeApi {
    /// Current member count, degraded to a fallback on failure.
    fn member_count(&self) -> impl Future<Output = u64> + Send;

    /// Add one member. Failures are absorbed into a fallback count.
    fn record_bond(&self) -> impl Future<Output = u64> + Send;

    /// Submit a dossier payload, returning the record id.
    fn submit_contact(
        &self,
        payload: &Value,
    ) -> impl Future<Output = Result<String, ClientError>> + Send;
}

impl IntakeApi for SovereignClient {
    fn member_count(&self) -> impl Future<Output = u64> + Send {
        self.stats_or_fallback()
    }

    fn record_bond(&self) -> impl Future<Output = u64> + Send {
        self.increment_or_fallback()
    }

    fn submit_contact(
        &self,
        payload: &Value,
    ) -> impl Future<Output = Result<String, ClientError>> + Send {
        SovereignClient::submit_contact(self, payload)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// A step that did not complete.
#[derive(Debug)]
pub enum DriverError {
    /// The funnel refused the step; nothing was sent.
    Funnel(FunnelError),
    /// The request failed; the funnel stays where it was.
    Api(ClientError),
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Funnel(e) => write!(f, "{e}"),
            Self::Api(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for DriverError {}

impl From<FunnelError> for DriverError {
    fn from(e: FunnelError) -> Self {
        Self::Funnel(e)
    }
}

// =============================================================================
// DRIVER
// =============================================================================

/// Result of posting the bond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BondOutcome {
    pub stage: Stage,
    /// Count reported by the increment, or its fallback.
    pub count: u64,
}

/// Drives a [`Funnel`] against an [`IntakeApi`].
#[derive(Debug)]
pub struct FunnelDriver<A: IntakeApi, S: SessionStore> {
    api: A,
    funnel: Funnel<S>,
}

impl<A: IntakeApi, S: SessionStore> FunnelDriver<A, S> {
    pub fn new(api: A, funnel: Funnel<S>) -> Self {
        Self { api, funnel }
    }

    pub fn funnel(&self) -> &Funnel<S> {
        &self.funnel
    }

    /// Direct access for the steps that need no network call.
    pub fn funnel_mut(&mut self) -> &mut Funnel<S> {
        &mut self.funnel
    }

    /// The count shown on the entry page.
    pub async fn entry_count(&self) -> u64 {
        self.api.member_count().await
    }

    /// CONTACT → BOND. Validates locally, then submits.
    ///
    /// Invalid forms are rejected before any request. A failed request is
    /// recorded on the funnel and returned; the stage stays CONTACT.
    pub async fn submit_contact(&mut self, form: &ContactForm) -> Result<Stage, DriverError> {
        let payload = self.funnel.prepare_contact(form)?;
        match self.api.submit_contact(&payload).await {
            Ok(id) => {
                tracing::info!(%id, "Dossier accepted");
                Ok(self.funnel.contact_accepted(id)?)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dossier submission failed");
                self.funnel.submission_failed(e.to_string());
                Err(DriverError::Api(e))
            }
        }
    }

    /// BOND → REFERRAL, then report the bond to the counter.
    ///
    /// The transition is saved before the increment is sent. The increment
    /// is awaited, bounded by the client timeout, and its failure only
    /// changes the count that comes back.
    pub async fn post_bond(&mut self, name: &str) -> Result<BondOutcome, DriverError> {
        let stage = self.funnel.confirm_bond(name)?;
        let count = self.api.record_bond().await;
        Ok(BondOutcome { stage, count })
    }

    /// REFERRAL → ENTRY. Referrals stay on the client.
    pub fn submit_referral(&mut self, peers: &[Peer]) -> Result<Vec<Peer>, DriverError> {
        Ok(self.funnel.submit_referral(peers)?)
    }
}

// =============================================================================
// TESTS
// =============================================================================
