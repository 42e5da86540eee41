//! # Core Types
//!
//! Shared error types for the Sovereign core.
//!
//! - `SovereignError` covers the store and the server-side services
//! - `RequiredField` names the fields a contact submission must resolve
//!
//! Funnel errors live with the funnel (`crate::funnel::FunnelError`).

use std::fmt;
use thiserror::Error;

// =============================================================================
// REQUIRED FIELDS
// =============================================================================

/// A field every contact submission must carry, under either naming
/// convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequiredField {
    /// Who the applicant is: `alias` (current) or `designation` (legacy).
    Identity,
    /// How to reach them: `contact` (current) or `email` (legacy).
    ContactChannel,
}

impl RequiredField {
    /// Accepted wire names, current convention first.
    #[must_use]
    pub fn wire_names(&self) -> [&'static str; 2] {
        match self {
            RequiredField::Identity => ["alias", "designation"],
            RequiredField::ContactChannel => ["contact", "email"],
        }
    }
}

impl fmt::Display for RequiredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [current, legacy] = self.wire_names();
        match self {
            RequiredField::Identity => write!(f, "identity ({}|{})", current, legacy),
            RequiredField::ContactChannel => write!(f, "contact ({}|{})", current, legacy),
        }
    }
}

fn join_fields(fields: &[RequiredField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Sovereign core.
///
/// - Validation variants map to a bad request at the HTTP boundary
/// - Storage variants map to an internal error, except on count reads,
///   which degrade to the fallback count
#[derive(Debug, Error)]
pub enum SovereignError {
    /// The submission lacks one or both required fields.
    #[error("Missing required fields: {}", join_fields(.0))]
    MissingFields(Vec<RequiredField>),

    /// The submission is not a JSON object, or a known field has the wrong
    /// type or size.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SovereignError {
    /// True for errors caused by the caller's input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SovereignError::MissingFields(_) | SovereignError::MalformedPayload(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_message_names_each_field() {
        let err = SovereignError::MissingFields(vec![
            RequiredField::Identity,
            RequiredField::ContactChannel,
        ]);
        let msg = err.to_string();
        assert!(msg.contains("identity (alias|designation)"));
        assert!(msg.contains("contact (contact|email)"));
    }

    #[test]
    fn validation_classification() {
        assert!(SovereignError::MissingFields(vec![]).is_validation());
        assert!(SovereignError::MalformedPayload("x".into()).is_validation());
        assert!(!SovereignError::StorageError("x".into()).is_validation());
    }
}
