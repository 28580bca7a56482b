//! Member record.
//!
//! # Invariants
//! - `email` is stored lower-cased and trimmed.
//! - `0 <= active_loans <= MAX_ACTIVE_LOANS`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Member identifier, unique within the members collection.
pub type MemberId = u32;

/// Maximum number of simultaneous outstanding loans per member.
pub const MAX_ACTIVE_LOANS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub registered_at: DateTime<Utc>,
    /// Lifetime number of loans.
    pub loan_count: u32,
    /// Loans currently outstanding.
    pub active_loans: u32,
    /// `false` when suspended.
    pub active: bool,
}

impl Member {
    /// Active and below the simultaneous-loan limit.
    pub fn can_borrow(&self) -> bool {
        self.active && self.active_loans < MAX_ACTIVE_LOANS
    }

    pub fn add_loan(&mut self) {
        self.active_loans += 1;
        self.loan_count = self.loan_count.saturating_add(1);
    }

    /// Decrements the outstanding counter, floored at zero.
    pub fn remove_loan(&mut self) {
        self.active_loans = self.active_loans.saturating_sub(1);
    }

    pub fn suspend(&mut self) {
        self.active = false;
    }

    pub fn reactivate(&mut self) {
        self.active = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{Member, MAX_ACTIVE_LOANS};
    use chrono::Utc;

    fn member() -> Member {
        Member {
            id: 1,
            name: "Alice Durand".to_string(),
            email: "alice@ex.com".to_string(),
            phone: "+33612345678".to_string(),
            registered_at: Utc::now(),
            loan_count: 0,
            active_loans: 0,
            active: true,
        }
    }

    #[test]
    fn can_borrow_until_limit() {
        let mut member = member();
        for _ in 0..MAX_ACTIVE_LOANS {
            assert!(member.can_borrow());
            member.add_loan();
        }
        assert!(!member.can_borrow());
        assert_eq!(member.loan_count, MAX_ACTIVE_LOANS);
    }

    #[test]
    fn remove_loan_never_goes_negative() {
        let mut member = member();
        member.remove_loan();
        assert_eq!(member.active_loans, 0);
    }

    #[test]
    fn suspended_member_cannot_borrow() {
        let mut member = member();
        member.suspend();
        assert!(!member.can_borrow());
        member.reactivate();
        assert!(member.can_borrow());
    }
}
