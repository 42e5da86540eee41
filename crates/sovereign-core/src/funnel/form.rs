//! # Funnel Forms
//!
//! The dossier form behind the contact stage, and the referral rows.

use crate::primitives::MAX_REFERRALS;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Whether `value` looks like an email address.
#[must_use]
pub fn is_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

// =============================================================================
// FIELD ERRORS
// =============================================================================

/// Per-field validation messages, keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    fn add(&mut self, field: &'static str, message: &'static str) {
        self.0.insert(field, message);
    }

    /// Message for one field, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Failing fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

// =============================================================================
// CONTACT FORM
// =============================================================================

/// The preliminary inquiry dossier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactForm {
    pub designation: String,
    pub email: String,
    pub city: String,
    pub domain: String,
    pub blood_type: String,
    pub mandate: String,
    pub digital_shadow: String,
    pub influence_name: String,
    pub influence_type: String,
    pub burden: String,
    pub labor: String,
    pub pledge: bool,
}

impl ContactForm {
    /// Check every field. `digital_shadow` and `labor` are optional.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::default();

        let required = [
            ("designation", &self.designation),
            ("city", &self.city),
            ("domain", &self.domain),
            ("bloodType", &self.blood_type),
            ("mandate", &self.mandate),
            ("influenceName", &self.influence_name),
            ("influenceType", &self.influence_type),
            ("burden", &self.burden),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.add(field, "Required");
            }
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.add("email", "Required");
        } else if !is_email(email) {
            errors.add("email", "Invalid format");
        }

        if !self.pledge {
            errors.add("pledge", "Acknowledgement required");
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// The wire payload: every form field, plus the current-convention
    /// fields the intake resolves first.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({
            "designation": self.designation,
            "email": self.email,
            "city": self.city,
            "domain": self.domain,
            "bloodType": self.blood_type,
            "mandate": self.mandate,
            "digitalShadow": self.digital_shadow,
            "influenceName": self.influence_name,
            "influenceType": self.influence_type,
            "burden": self.burden,
            "labor": self.labor,
            "pledge": self.pledge,
            "alias": self.designation,
            "contact": self.email,
            "intent": format!(
                "MANDATE: {} || BURDEN: {} || BLOOD: {}",
                self.mandate, self.burden, self.blood_type
            ),
            "referrer": format!("{} [{}]", self.influence_name, self.influence_type),
        })
    }
}

// =============================================================================
// REFERRALS
// =============================================================================

/// One referred peer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub name: String,
    pub email: String,
}

impl Peer {
    /// A row with nothing filled in.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.name.trim().is_empty() && self.email.trim().is_empty()
    }
}

/// True when `peers` fits on the referral form.
#[must_use]
pub fn within_referral_limit(peers: &[Peer]) -> bool {
    peers.len() <= MAX_REFERRALS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_form() -> ContactForm {
        ContactForm {
            designation: "Test Subject Alpha".into(),
            email: "test@sovereign.dev".into(),
            city: "Phoenix, AZ".into(),
            domain: "Software Engineering".into(),
            blood_type: "O-Negative".into(),
            mandate: "Lead Architect".into(),
            digital_shadow: String::new(),
            influence_name: "Admin".into(),
            influence_type: "Referral Source".into(),
            burden: "The silence of the machine.".into(),
            labor: String::new(),
            pledge: true,
        }
    }

    #[test]
    fn complete_form_is_valid() {
        assert!(complete_form().validate().is_ok());
    }

    #[test]
    fn empty_form_lists_every_required_field() {
        let errors = ContactForm::default().validate().expect_err("invalid");
        assert_eq!(errors.len(), 10);
        assert_eq!(errors.get("email"), Some("Required"));
        assert_eq!(errors.get("pledge"), Some("Acknowledgement required"));
        assert_eq!(errors.get("labor"), None);
    }

    #[test]
    fn bad_email_format() {
        let form = ContactForm {
            email: "not-an-email".into(),
            ..complete_form()
        };
        let errors = form.validate().expect_err("invalid");
        assert_eq!(errors.get("email"), Some("Invalid format"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.to_string(), "email: Invalid format");
    }

    #[test]
    fn payload_carries_both_conventions() {
        let payload = complete_form().to_payload();
        assert_eq!(payload["alias"], payload["designation"]);
        assert_eq!(payload["contact"], payload["email"]);
        assert_eq!(payload["referrer"], "Admin [Referral Source]");
        assert!(
            payload["intent"]
                .as_str()
                .is_some_and(|s| s.starts_with("MANDATE: Lead Architect"))
        );
    }

    #[test]
    fn referral_limit() {
        let peers = vec![Peer::default(); MAX_REFERRALS];
        assert!(within_referral_limit(&peers));
        let peers = vec![Peer::default(); MAX_REFERRALS + 1];
        assert!(!within_referral_limit(&peers));
    }
}
