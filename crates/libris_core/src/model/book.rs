//! Book record.
//!
//! # Invariants
//! - `isbn` is stored normalized (no hyphens or spaces).
//! - `available == false` iff exactly one outstanding loan references the book.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Book identifier, unique within the books collection.
pub type BookId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    /// Canonical genre name from the closed genre list.
    pub genre: String,
    pub publication_date: NaiveDate,
    pub available: bool,
    /// Lifetime number of loans.
    pub loan_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Flags the book as lent out and bumps its lifetime loan count.
    pub fn mark_borrowed(&mut self) {
        self.available = false;
        self.loan_count = self.loan_count.saturating_add(1);
    }

    pub fn mark_available(&mut self) {
        self.available = true;
    }
}
