//! Core use-case services.
//!
//! # Responsibility
//! - Own the in-memory collections and keep them in sync with their files.
//! - Enforce business rules (uniqueness, availability, loan limits).
//! - Coordinate cross-entity updates for the loan lifecycle.
//!
//! # Invariants
//! - Every successful mutation is followed by a full rewrite of that
//!   collection's file; a failed rewrite reverts the in-memory change.
//! - Services never print, prompt or format for display.

pub mod book_service;
pub mod library;
pub mod loan_service;
pub mod member_service;
mod unit_of_work;

/// Failure taxonomy shared by all service errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced id or lookup key does not exist.
    NotFound,
    /// A field failed its format or range rule.
    ValidationFailed,
    /// ISBN or email collides with another record.
    DuplicateKey,
    /// Operation is refused by a lending rule.
    BusinessRuleViolation,
    /// File I/O or (de)serialization failed.
    StorageFailure,
}

/// Returns the non-blank value of an optional partial-update field.
///
/// `None`, empty and whitespace-only strings all mean "keep current value".
pub(crate) fn provided(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|candidate| !candidate.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::provided;

    #[test]
    fn blank_update_fields_are_ignored() {
        assert_eq!(provided(&None), None);
        assert_eq!(provided(&Some("  ".to_string())), None);
        assert_eq!(provided(&Some("Dune".to_string())), Some("Dune"));
    }
}
