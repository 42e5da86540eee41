//! # Contact Intake
//!
//! Applicant submissions, stored once and never modified.
//!
//! ## Payload conventions
//!
//! Clients have sent two shapes over time:
//!
//! | Field    | Current    | Legacy        |
//! |----------|------------|---------------|
//! | identity | `alias`    | `designation` |
//! | channel  | `contact`  | `email`       |
//! | intent   | `intent`   | `mandate`     |
//! | referrer | `referrer` | -             |
//!
//! A payload is parsed into both views once, at the boundary
//! ([`ContactPayload::from_value`]), and normalized into a single
//! [`CanonicalContact`]. Each field resolves to the current name when it is
//! present and non-blank, otherwise to the legacy name. Nothing past
//! normalization looks at wire field names.
//!
//! Only string values take part in resolution. A known name holding a number,
//! bool, array or object is treated as absent and stored as sent.
//!
//! The stored record is the full original payload plus `id` and `timestamp`.

use crate::primitives::{CONTACT_KEY_PREFIX, MAX_FIELD_LENGTH};
use crate::{KvStore, RequiredField, SovereignError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use uuid::Uuid;

// =============================================================================
// PAYLOAD SHAPES
// =============================================================================

/// Field names of the current client payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CurrentFields {
    #[serde(deserialize_with = "string_or_absent")]
    pub alias: Option<String>,
    #[serde(deserialize_with = "string_or_absent")]
    pub contact: Option<String>,
    #[serde(deserialize_with = "string_or_absent")]
    pub intent: Option<String>,
    #[serde(deserialize_with = "string_or_absent")]
    pub referrer: Option<String>,
}

/// Field names of the earlier dossier payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LegacyFields {
    #[serde(deserialize_with = "string_or_absent")]
    pub designation: Option<String>,
    #[serde(deserialize_with = "string_or_absent")]
    pub email: Option<String>,
    #[serde(deserialize_with = "string_or_absent")]
    pub mandate: Option<String>,
}

/// Keep strings; anything else reads as absent.
fn string_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

/// Which naming convention supplied the required fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadConvention {
    /// Identity and channel both came from current names.
    Current,
    /// Identity and channel both came from legacy names.
    Legacy,
    /// One of each.
    Mixed,
}

/// A submission parsed into both conventions, with the raw fields kept for
/// storage.
#[derive(Debug, Clone)]
pub struct ContactPayload {
    current: CurrentFields,
    legacy: LegacyFields,
    fields: Map<String, Value>,
}

/// A submission after normalization.
#[derive(Debug, Clone)]
pub struct CanonicalContact {
    pub identity: String,
    pub channel: String,
    pub intent: Option<String>,
    pub referrer: Option<String>,
    pub convention: PayloadConvention,
    /// Every field the client sent, unmodified.
    pub fields: Map<String, Value>,
}

/// Returned on a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactReceipt {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl ContactReceipt {
    /// Timestamp in ISO-8601, millisecond precision, `Z` suffix.
    #[must_use]
    pub fn timestamp_iso(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Store key for a contact id.
#[must_use]
pub fn contact_key(id: &str) -> String {
    format!("{}{}", CONTACT_KEY_PREFIX, id)
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn check_length(name: &str, value: &str) -> Result<(), SovereignError> {
    if value.len() > MAX_FIELD_LENGTH {
        return Err(SovereignError::MalformedPayload(format!(
            "Field `{}` length {} exceeds maximum {} bytes",
            name,
            value.len(),
            MAX_FIELD_LENGTH
        )));
    }
    Ok(())
}

impl ContactPayload {
    /// Parse a request body. The body must be a JSON object; any field may
    /// hold any JSON value.
    pub fn from_value(value: Value) -> Result<Self, SovereignError> {
        let Value::Object(fields) = value else {
            return Err(SovereignError::MalformedPayload(
                "expected a JSON object".to_string(),
            ));
        };

        let view = Value::Object(fields.clone());
        let current: CurrentFields = serde_json::from_value(view.clone())
            .map_err(|e| SovereignError::MalformedPayload(e.to_string()))?;
        let legacy: LegacyFields = serde_json::from_value(view)
            .map_err(|e| SovereignError::MalformedPayload(e.to_string()))?;

        Ok(Self {
            current,
            legacy,
            fields,
        })
    }

    /// Resolve both conventions into one record.
    ///
    /// # Errors
    ///
    /// `MissingFields` names every required field that resolved to nothing.
    /// `MalformedPayload` if a resolved field exceeds `MAX_FIELD_LENGTH`.
    pub fn normalize(self) -> Result<CanonicalContact, SovereignError> {
        let alias = present(self.current.alias.as_ref());
        let designation = present(self.legacy.designation.as_ref());
        let contact = present(self.current.contact.as_ref());
        let email = present(self.legacy.email.as_ref());

        let identity = alias.or(designation);
        let channel = contact.or(email);

        let (Some(identity), Some(channel)) = (identity, channel) else {
            let mut missing = Vec::new();
            if identity.is_none() {
                missing.push(RequiredField::Identity);
            }
            if channel.is_none() {
                missing.push(RequiredField::ContactChannel);
            }
            return Err(SovereignError::MissingFields(missing));
        };

        let intent = present(self.current.intent.as_ref())
            .or(present(self.legacy.mandate.as_ref()))
            .map(str::to_string);
        let referrer = present(self.current.referrer.as_ref()).map(str::to_string);

        check_length("identity", identity)?;
        check_length("contact", channel)?;
        if let Some(intent) = &intent {
            check_length("intent", intent)?;
        }
        if let Some(referrer) = &referrer {
            check_length("referrer", referrer)?;
        }

        let convention = match (alias.is_some(), contact.is_some()) {
            (true, true) => PayloadConvention::Current,
            (false, false) => PayloadConvention::Legacy,
            _ => PayloadConvention::Mixed,
        };

        Ok(CanonicalContact {
            identity: identity.to_string(),
            channel: channel.to_string(),
            intent,
            referrer,
            convention,
            fields: self.fields,
        })
    }
}

// =============================================================================
// INTAKE SERVICE
// =============================================================================

/// The contact intake service, borrowing a store.
#[derive(Debug)]
pub struct Intake<'a, S: KvStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: KvStore + ?Sized> Intake<'a, S> {
    /// Bind the service to a store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Store a normalized submission under a fresh id.
    ///
    /// The record is `{id, timestamp}` followed by every field the client
    /// sent. Client-supplied `id` or `timestamp` keys are dropped, so the
    /// stored values always match the storage key and the receipt. Earlier
    /// deployments let client keys overwrite them in the record body.
    pub fn submit(
        &self,
        contact: CanonicalContact,
        now: DateTime<Utc>,
    ) -> Result<ContactReceipt, SovereignError> {
        let receipt = ContactReceipt {
            id: Uuid::new_v4(),
            timestamp: now,
        };
        let id = receipt.id.to_string();

        let mut record = Map::new();
        record.insert("id".to_string(), Value::String(id.clone()));
        record.insert("timestamp".to_string(), Value::String(receipt.timestamp_iso()));
        for (key, value) in contact.fields {
            if key != "id" && key != "timestamp" {
                record.insert(key, value);
            }
        }

        self.store.set(&contact_key(&id), &Value::Object(record))?;
        Ok(receipt)
    }

    /// Fetch one stored record.
    pub fn get(&self, id: &str) -> Result<Option<Value>, SovereignError> {
        self.store.get(&contact_key(id))
    }

    /// Every stored record, oldest first.
    pub fn list(&self) -> Result<Vec<Value>, SovereignError> {
        let mut records: Vec<Value> = self
            .store
            .scan_prefix(CONTACT_KEY_PREFIX)?
            .into_iter()
            .map(|(_, v)| v)
            .collect();
        records.sort_by(|a, b| {
            let ta = a.get("timestamp").and_then(Value::as_str).unwrap_or("");
            let tb = b.get("timestamp").and_then(Value::as_str).unwrap_or("");
            ta.cmp(tb)
        });
        Ok(records)
    }
}

// =============================================================================
// TESTS
// =============================================================================
