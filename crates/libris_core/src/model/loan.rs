//! Loan record and status derivation.
//!
//! # Responsibility
//! - Record which member holds which book and until when.
//! - Derive `ongoing | overdue | returned` from the stored dates.
//!
//! # Invariants
//! - `due_date = loaned_at + LOAN_PERIOD_DAYS` at creation; only extensions
//!   move it later.
//! - `status` is a cache of `status_at(now)` and is refreshed before reads.
//! - `book_title`/`member_name` are display copies, never a source of truth.

use super::book::BookId;
use super::member::MemberId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Loan identifier, unique within the loans collection.
pub type LoanId = u32;

/// Standard loan period.
pub const LOAN_PERIOD_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// Outstanding and not yet due.
    Ongoing,
    /// Effective return recorded.
    Returned,
    /// Outstanding past its due date.
    Overdue,
}

impl LoanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ongoing => "ongoing",
            Self::Returned => "returned",
            Self::Overdue => "overdue",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub book_id: BookId,
    pub member_id: MemberId,
    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// `None` while the loan is outstanding.
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub book_title: String,
    pub member_name: String,
}

impl Loan {
    /// Creates an outstanding loan due `LOAN_PERIOD_DAYS` after `loaned_at`.
    pub fn new(
        id: LoanId,
        book_id: BookId,
        member_id: MemberId,
        loaned_at: DateTime<Utc>,
        book_title: impl Into<String>,
        member_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            book_id,
            member_id,
            loaned_at,
            due_date: loaned_at + Duration::days(LOAN_PERIOD_DAYS),
            returned_at: None,
            status: LoanStatus::Ongoing,
            book_title: book_title.into(),
            member_name: member_name.into(),
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.is_outstanding() && now > self.due_date
    }

    /// Status as a pure function of the stored dates and `now`.
    pub fn status_at(&self, now: DateTime<Utc>) -> LoanStatus {
        if !self.is_outstanding() {
            LoanStatus::Returned
        } else if now > self.due_date {
            LoanStatus::Overdue
        } else {
            LoanStatus::Ongoing
        }
    }

    /// Writes the derived status into `status`; returns whether it changed.
    pub fn refresh_status(&mut self, now: DateTime<Utc>) -> bool {
        let derived = self.status_at(now);
        let changed = derived != self.status;
        self.status = derived;
        changed
    }

    /// Whole days past the due date; 0 unless overdue.
    pub fn overdue_days(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_overdue_at(now) {
            return 0;
        }
        (now - self.due_date).num_days()
    }

    /// Whole days between loan and return, for closed loans only.
    pub fn duration_days(&self) -> Option<i64> {
        self.returned_at
            .map(|returned_at| (returned_at - self.loaned_at).num_days())
    }

    pub fn mark_returned(&mut self, now: DateTime<Utc>) {
        self.returned_at = Some(now);
        self.status = LoanStatus::Returned;
    }

    /// Pushes the due date back by `days` and re-derives the status.
    pub fn extend(&mut self, days: u32, now: DateTime<Utc>) {
        self.due_date += Duration::days(i64::from(days));
        self.refresh_status(now);
    }
}

#[cfg(test)]
mod tests {
    use super::{Loan, LoanStatus, LOAN_PERIOD_DAYS};
    use chrono::{Duration, TimeZone, Utc};

    fn loan() -> Loan {
        let loaned_at = Utc.with_ymd_and_hms(2024, 1, 10, 9, 30, 0).unwrap();
        Loan::new(7, 1, 2, loaned_at, "Dune", "Alice Durand")
    }

    #[test]
    fn new_loan_is_due_after_loan_period() {
        let loan = loan();
        let period = loan.due_date - loan.loaned_at;
        assert_eq!(period, Duration::days(LOAN_PERIOD_DAYS));
        assert_eq!(loan.status, LoanStatus::Ongoing);
        assert!(loan.is_outstanding());
    }

    #[test]
    fn status_turns_overdue_after_due_date() {
        let mut loan = loan();
        let on_due = loan.due_date;
        assert_eq!(loan.status_at(on_due), LoanStatus::Ongoing);

        let later = on_due + Duration::days(3) + Duration::hours(1);
        assert!(loan.refresh_status(later));
        assert_eq!(loan.status, LoanStatus::Overdue);
        assert_eq!(loan.overdue_days(later), 3);
        assert!(!loan.refresh_status(later));
    }

    #[test]
    fn returned_wins_regardless_of_due_date() {
        let mut loan = loan();
        let late = loan.due_date + Duration::days(30);
        loan.mark_returned(late);
        assert_eq!(loan.status_at(late), LoanStatus::Returned);
        assert_eq!(loan.overdue_days(late), 0);
        assert_eq!(loan.duration_days(), Some(LOAN_PERIOD_DAYS + 30));
    }

    #[test]
    fn extension_clears_overdue() {
        let mut loan = loan();
        let now = loan.due_date + Duration::days(2);
        loan.refresh_status(now);
        assert_eq!(loan.status, LoanStatus::Overdue);

        loan.extend(5, now);
        assert_eq!(loan.status, LoanStatus::Ongoing);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(LoanStatus::Overdue).unwrap();
        assert_eq!(json, "overdue");
        assert_eq!(LoanStatus::Ongoing.as_str(), "ongoing");
    }
}
