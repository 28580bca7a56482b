//! Library domain records.
//!
//! # Responsibility
//! - Define the book, member and loan records persisted as JSON.
//! - Provide in-place state transitions used by the services.
//!
//! # Invariants
//! - Records are identified by monotonically assigned integer ids.
//! - Loan status is derived from dates; the stored value is a cache.

pub mod book;
pub mod loan;
pub mod member;
