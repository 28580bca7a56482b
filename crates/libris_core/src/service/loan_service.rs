//! Loan lifecycle service.
//!
//! # Responsibility
//! - Create, return, extend and cancel loans.
//! - Keep book availability and member loan counters consistent with the
//!   set of outstanding loans.
//! - Answer loan queries and compute lending statistics.
//!
//! # Invariants
//! - A book is unavailable iff exactly one outstanding loan references it.
//! - Composite operations either apply to books, members and loans together
//!   or leave all three as they were (see `unit_of_work`).
//! - Every query recomputes loan statuses before filtering.

use super::book_service::{BookService, BookServiceError};
use super::member_service::{MemberService, MemberServiceError};
use super::unit_of_work::UnitOfWork;
use super::ErrorKind;
use crate::clock::SharedClock;
use crate::model::book::BookId;
use crate::model::loan::{Loan, LoanId, LoanStatus};
use crate::model::member::{MemberId, MAX_ACTIVE_LOANS};
use crate::store::{CollectionStore, StoreError};
use chrono::{DateTime, Datelike, Months, Utc};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;

/// Accepted range for a single loan extension, in days.
pub const EXTENSION_DAYS: RangeInclusive<u32> = 1..=30;

const STATISTICS_MONTHS: u32 = 12;

pub type LoanResult<T> = Result<T, LoanServiceError>;

#[derive(Debug)]
pub enum LoanServiceError {
    LoanNotFound(LoanId),
    BookNotFound(BookId),
    MemberNotFound(MemberId),
    /// Book is currently lent out.
    NotAvailable(BookId),
    Suspended(MemberId),
    LimitReached { member_id: MemberId, limit: u32 },
    /// Member already holds an outstanding loan on this book.
    DuplicateLoan {
        book_id: BookId,
        member_id: MemberId,
    },
    /// Loan was already returned.
    AlreadyClosed(LoanId),
    InvalidExtension(u32),
    Book(BookServiceError),
    Member(MemberServiceError),
    Store(StoreError),
}

impl LoanServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LoanNotFound(_) | Self::BookNotFound(_) | Self::MemberNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::NotAvailable(_)
            | Self::Suspended(_)
            | Self::LimitReached { .. }
            | Self::DuplicateLoan { .. }
            | Self::AlreadyClosed(_) => ErrorKind::BusinessRuleViolation,
            Self::InvalidExtension(_) => ErrorKind::ValidationFailed,
            Self::Book(err) => err.kind(),
            Self::Member(err) => err.kind(),
            Self::Store(_) => ErrorKind::StorageFailure,
        }
    }
}

impl Display for LoanServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoanNotFound(id) => write!(f, "loan not found: {id}"),
            Self::BookNotFound(id) => write!(f, "book not found: {id}"),
            Self::MemberNotFound(id) => write!(f, "member not found: {id}"),
            Self::NotAvailable(id) => write!(f, "book {id} is not available"),
            Self::Suspended(id) => write!(f, "member {id} is suspended"),
            Self::LimitReached { member_id, limit } => write!(
                f,
                "member {member_id} reached the limit of {limit} simultaneous loans"
            ),
            Self::DuplicateLoan { book_id, member_id } => write!(
                f,
                "member {member_id} already has an outstanding loan on book {book_id}"
            ),
            Self::AlreadyClosed(id) => write!(f, "loan {id} is already returned"),
            Self::InvalidExtension(days) => write!(
                f,
                "extension of {days} day(s) is outside {}..={}",
                EXTENSION_DAYS.start(),
                EXTENSION_DAYS.end()
            ),
            Self::Book(err) => write!(f, "{err}"),
            Self::Member(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LoanServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Book(err) => Some(err),
            Self::Member(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BookServiceError> for LoanServiceError {
    fn from(value: BookServiceError) -> Self {
        match value {
            BookServiceError::BookNotFound(id) => Self::BookNotFound(id),
            BookServiceError::AlreadyBorrowed(id) => Self::NotAvailable(id),
            other => Self::Book(other),
        }
    }
}

impl From<MemberServiceError> for LoanServiceError {
    fn from(value: MemberServiceError) -> Self {
        match value {
            MemberServiceError::MemberNotFound(id) => Self::MemberNotFound(id),
            MemberServiceError::Suspended(id) => Self::Suspended(id),
            MemberServiceError::LimitReached { id, limit } => Self::LimitReached {
                member_id: id,
                limit,
            },
            other => Self::Member(other),
        }
    }
}

impl From<StoreError> for LoanServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopMember {
    pub member_id: MemberId,
    pub member_name: String,
    pub loans: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopBook {
    pub book_id: BookId,
    pub book_title: String,
    pub loans: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoanStatistics {
    pub total: usize,
    pub ongoing: usize,
    pub returned: usize,
    pub overdue: usize,
    /// Mean whole-day duration of returned loans; 0 when none.
    pub average_duration_days: f64,
    /// Loans started per `YYYY-MM`, for the trailing 12 months.
    pub monthly: BTreeMap<String, usize>,
    /// Lowest id wins ties.
    pub most_active_member: Option<TopMember>,
    /// Lowest id wins ties.
    pub most_borrowed_book: Option<TopBook>,
}

/// Owner of the loans collection.
///
/// Book and member services are lent in by `&mut` for each composite
/// operation and only touched through their public entry points.
pub struct LoanService {
    loans: Vec<Loan>,
    next_id: LoanId,
    store: Box<dyn CollectionStore<Loan>>,
    clock: SharedClock,
}

impl LoanService {
    /// Loads the collection and brings stored statuses up to date.
    pub fn open(
        store: impl CollectionStore<Loan> + 'static,
        clock: SharedClock,
    ) -> LoanResult<Self> {
        let loans = store.load()?;
        let next_id = loans.iter().map(|loan| loan.id).max().unwrap_or(0) + 1;
        let mut service = Self {
            loans,
            next_id,
            store: Box::new(store),
            clock,
        };
        let refreshed = service.refresh_statuses()?;
        info!(
            "event=service_open module=loan_service status=ok records={} next_id={} refreshed={}",
            service.loans.len(),
            service.next_id,
            refreshed
        );
        Ok(service)
    }

    /// Lends `book_id` to `member_id` for the standard loan period.
    ///
    /// # Errors
    /// - `BookNotFound` / `MemberNotFound` for unknown ids.
    /// - `NotAvailable` when the book is lent out (checked before the member).
    /// - `Suspended` / `LimitReached` when the member may not borrow.
    /// - `DuplicateLoan` when the member already holds this book.
    /// - `Store` or wrapped service errors when persisting fails; books and
    ///   members are rolled back in that case.
    pub fn create_loan(
        &mut self,
        books: &mut BookService,
        members: &mut MemberService,
        book_id: BookId,
        member_id: MemberId,
    ) -> LoanResult<Loan> {
        let book = books
            .find_by_id(book_id)
            .cloned()
            .ok_or(LoanServiceError::BookNotFound(book_id))?;
        if !book.is_available() {
            return Err(LoanServiceError::NotAvailable(book_id));
        }
        let member = members
            .find_by_id(member_id)
            .cloned()
            .ok_or(LoanServiceError::MemberNotFound(member_id))?;
        if !member.active {
            return Err(LoanServiceError::Suspended(member_id));
        }
        if !member.can_borrow() {
            return Err(LoanServiceError::LimitReached {
                member_id,
                limit: MAX_ACTIVE_LOANS,
            });
        }
        if self.holds_outstanding(book_id, member_id) {
            return Err(LoanServiceError::DuplicateLoan { book_id, member_id });
        }

        let loan = Loan::new(
            self.next_id,
            book_id,
            member_id,
            self.clock.now(),
            book.title.clone(),
            member.name.clone(),
        );

        let mut uow = UnitOfWork::begin("loan_create");
        books.mark_borrowed(book_id)?;
        uow.record_book(book);
        if let Err(err) = members.add_loan_to_member(member_id) {
            uow.rollback(books, members);
            return Err(err.into());
        }
        uow.record_member(member);

        self.loans.push(loan.clone());
        if let Err(err) = self.store.save(&self.loans) {
            self.loans.pop();
            uow.rollback(books, members);
            return Err(err.into());
        }
        self.next_id += 1;
        uow.commit();

        info!(
            "event=loan_create module=loan_service status=ok loan_id={} book_id={} member_id={}",
            loan.id, book_id, member_id
        );
        Ok(loan)
    }

    /// Records the return of an outstanding loan.
    pub fn return_loan(
        &mut self,
        books: &mut BookService,
        members: &mut MemberService,
        loan_id: LoanId,
    ) -> LoanResult<Loan> {
        let index = self.outstanding_index(loan_id)?;
        let before = self.loans[index].clone();

        let mut uow = UnitOfWork::begin("loan_return");
        if let Err(err) = release_book_and_member(books, members, &before, &mut uow) {
            uow.rollback(books, members);
            return Err(err);
        }

        self.loans[index].mark_returned(self.clock.now());
        if let Err(err) = self.store.save(&self.loans) {
            self.loans[index] = before;
            uow.rollback(books, members);
            return Err(err.into());
        }
        uow.commit();

        info!(
            "event=loan_return module=loan_service status=ok loan_id={}",
            loan_id
        );
        Ok(self.loans[index].clone())
    }

    /// Pushes the due date of an outstanding loan back by `extra_days`.
    pub fn extend_loan(&mut self, loan_id: LoanId, extra_days: u32) -> LoanResult<Loan> {
        if !EXTENSION_DAYS.contains(&extra_days) {
            return Err(LoanServiceError::InvalidExtension(extra_days));
        }
        let index = self.outstanding_index(loan_id)?;
        let before = self.loans[index].clone();

        self.loans[index].extend(extra_days, self.clock.now());
        if let Err(err) = self.store.save(&self.loans) {
            self.loans[index] = before;
            return Err(err.into());
        }

        info!(
            "event=loan_extend module=loan_service status=ok loan_id={} extra_days={}",
            loan_id, extra_days
        );
        Ok(self.loans[index].clone())
    }

    /// Administrative override: releases the book and member and erases the
    /// loan record entirely.
    pub fn cancel_loan(
        &mut self,
        books: &mut BookService,
        members: &mut MemberService,
        loan_id: LoanId,
    ) -> LoanResult<Loan> {
        let index = self.outstanding_index(loan_id)?;
        let loan = self.loans[index].clone();

        let mut uow = UnitOfWork::begin("loan_cancel");
        if let Err(err) = release_book_and_member(books, members, &loan, &mut uow) {
            uow.rollback(books, members);
            return Err(err);
        }

        let removed = self.loans.remove(index);
        if let Err(err) = self.store.save(&self.loans) {
            self.loans.insert(index, removed);
            uow.rollback(books, members);
            return Err(err.into());
        }
        uow.commit();

        warn!(
            "event=loan_cancel module=loan_service status=ok loan_id={} book_id={} member_id={}",
            loan_id, loan.book_id, loan.member_id
        );
        Ok(removed)
    }

    /// Re-derives every stored status; saves once if any changed.
    ///
    /// Returns the number of loans whose status changed. On a failed save
    /// the statuses are reverted so the next sweep retries the write.
    pub fn refresh_statuses(&mut self) -> LoanResult<usize> {
        let now = self.clock.now();
        let previous: Vec<LoanStatus> = self.loans.iter().map(|loan| loan.status).collect();
        let changed = self
            .loans
            .iter_mut()
            .map(|loan| loan.refresh_status(now))
            .filter(|changed| *changed)
            .count();
        if changed > 0 {
            if let Err(err) = self.store.save(&self.loans) {
                for (loan, status) in self.loans.iter_mut().zip(previous) {
                    loan.status = status;
                }
                warn!(
                    "event=loan_refresh module=loan_service status=error changed={} error={}",
                    changed, err
                );
                return Err(err.into());
            }
            debug!(
                "event=loan_refresh module=loan_service status=ok changed={}",
                changed
            );
        }
        Ok(changed)
    }

    pub fn find_by_id(&mut self, loan_id: LoanId) -> LoanResult<Option<&Loan>> {
        self.refresh_statuses()?;
        Ok(self.loans.iter().find(|loan| loan.id == loan_id))
    }

    /// Outstanding loan currently holding `book_id`, if any.
    pub fn find_active_loan_for_book(&mut self, book_id: BookId) -> LoanResult<Option<&Loan>> {
        self.refresh_statuses()?;
        Ok(self
            .loans
            .iter()
            .find(|loan| loan.book_id == book_id && loan.is_outstanding()))
    }

    pub fn list_all(&mut self) -> LoanResult<&[Loan]> {
        self.refresh_statuses()?;
        Ok(&self.loans)
    }

    /// Every outstanding loan, overdue ones included.
    pub fn list_ongoing(&mut self) -> LoanResult<Vec<&Loan>> {
        self.filtered(|loan, _| loan.is_outstanding())
    }

    pub fn list_overdue(&mut self) -> LoanResult<Vec<&Loan>> {
        self.filtered(|loan, now| loan.is_overdue_at(now))
    }

    pub fn list_by_book(&mut self, book_id: BookId) -> LoanResult<Vec<&Loan>> {
        self.filtered(|loan, _| loan.book_id == book_id)
    }

    pub fn list_by_member(&mut self, member_id: MemberId) -> LoanResult<Vec<&Loan>> {
        self.filtered(|loan, _| loan.member_id == member_id)
    }

    /// Outstanding loans whose due date falls on today's (UTC) date.
    pub fn list_due_today(&mut self) -> LoanResult<Vec<&Loan>> {
        self.filtered(|loan, now| {
            loan.is_outstanding() && loan.due_date.date_naive() == now.date_naive()
        })
    }

    /// Loans started strictly between `start` and `end`.
    pub fn list_by_date_range(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> LoanResult<Vec<&Loan>> {
        self.filtered(|loan, _| loan.loaned_at > start && loan.loaned_at < end)
    }

    pub fn statistics(&mut self) -> LoanResult<LoanStatistics> {
        self.refresh_statuses()?;
        let now = self.clock.now();

        let mut ongoing = 0;
        let mut returned = 0;
        let mut overdue = 0;
        let mut duration_total = 0_i64;
        let mut by_member: BTreeMap<MemberId, (usize, &str)> = BTreeMap::new();
        let mut by_book: BTreeMap<BookId, (usize, &str)> = BTreeMap::new();

        for loan in &self.loans {
            match loan.status {
                LoanStatus::Ongoing => ongoing += 1,
                LoanStatus::Returned => returned += 1,
                LoanStatus::Overdue => overdue += 1,
            }
            if let Some(days) = loan.duration_days() {
                duration_total += days;
            }
            let member_entry = by_member.entry(loan.member_id).or_insert((0, ""));
            member_entry.0 += 1;
            member_entry.1 = loan.member_name.as_str();
            let book_entry = by_book.entry(loan.book_id).or_insert((0, ""));
            book_entry.0 += 1;
            book_entry.1 = loan.book_title.as_str();
        }

        let average_duration_days = if returned == 0 {
            0.0
        } else {
            duration_total as f64 / returned as f64
        };

        let most_active_member = leader(&by_member).map(|(member_id, loans, name)| TopMember {
            member_id,
            member_name: name.to_string(),
            loans,
        });
        let most_borrowed_book = leader(&by_book).map(|(book_id, loans, title)| TopBook {
            book_id,
            book_title: title.to_string(),
            loans,
        });

        Ok(LoanStatistics {
            total: self.loans.len(),
            ongoing,
            returned,
            overdue,
            average_duration_days,
            monthly: monthly_counts(&self.loans, now),
            most_active_member,
            most_borrowed_book,
        })
    }

    /// Deletes returned loans started more than `years` years ago.
    ///
    /// Outstanding loans are always kept. Returns the number removed.
    pub fn purge_closed_before(&mut self, years: u32) -> LoanResult<usize> {
        let now = self.clock.now();
        let cutoff = now
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        let before = self.loans.clone();
        self.loans
            .retain(|loan| loan.is_outstanding() || loan.loaned_at > cutoff);
        let removed = before.len() - self.loans.len();
        if removed == 0 {
            return Ok(0);
        }
        if let Err(err) = self.store.save(&self.loans) {
            self.loans = before;
            return Err(err.into());
        }

        info!(
            "event=loan_purge module=loan_service status=ok removed={} years={}",
            removed, years
        );
        Ok(removed)
    }

    fn filtered(&mut self, keep: impl Fn(&Loan, DateTime<Utc>) -> bool) -> LoanResult<Vec<&Loan>> {
        self.refresh_statuses()?;
        let now = self.clock.now();
        Ok(self.loans.iter().filter(|loan| keep(loan, now)).collect())
    }

    /// Highest book and member ids referenced by any stored loan; 0 when
    /// there are none.
    pub(crate) fn highest_referenced_ids(&self) -> (BookId, MemberId) {
        let book_id = self.loans.iter().map(|loan| loan.book_id).max();
        let member_id = self.loans.iter().map(|loan| loan.member_id).max();
        (book_id.unwrap_or(0), member_id.unwrap_or(0))
    }

    fn holds_outstanding(&self, book_id: BookId, member_id: MemberId) -> bool {
        self.loans
            .iter()
            .filter(|loan| loan.is_outstanding())
            .any(|loan| loan.book_id == book_id && loan.member_id == member_id)
    }

    fn outstanding_index(&self, loan_id: LoanId) -> LoanResult<usize> {
        let index = self
            .loans
            .iter()
            .position(|loan| loan.id == loan_id)
            .ok_or(LoanServiceError::LoanNotFound(loan_id))?;
        if !self.loans[index].is_outstanding() {
            return Err(LoanServiceError::AlreadyClosed(loan_id));
        }
        Ok(index)
    }
}

/// Makes the loan's book available again and decrements the member's
/// outstanding counter, recording compensations as each step succeeds.
fn release_book_and_member(
    books: &mut BookService,
    members: &mut MemberService,
    loan: &Loan,
    uow: &mut UnitOfWork,
) -> LoanResult<()> {
    let book_before = books.find_by_id(loan.book_id).cloned();
    books.mark_available(loan.book_id)?;
    if let Some(snapshot) = book_before {
        uow.record_book(snapshot);
    }

    let member_before = members.find_by_id(loan.member_id).cloned();
    members.remove_loan_from_member(loan.member_id)?;
    if let Some(snapshot) = member_before {
        uow.record_member(snapshot);
    }
    Ok(())
}

/// Highest count wins; iteration is by ascending id so the lowest id keeps
/// ties.
fn leader<'a, Id: Copy>(counts: &BTreeMap<Id, (usize, &'a str)>) -> Option<(Id, usize, &'a str)> {
    let mut best: Option<(Id, usize, &'a str)> = None;
    for (id, (count, label)) in counts {
        if best.map_or(true, |(_, top, _)| *count > top) {
            best = Some((*id, *count, *label));
        }
    }
    best
}

fn monthly_counts(loans: &[Loan], now: DateTime<Utc>) -> BTreeMap<String, usize> {
    let current = i64::from(now.year()) * 12 + i64::from(now.month0());
    let mut monthly: BTreeMap<String, usize> = (0..i64::from(STATISTICS_MONTHS))
        .map(|back| (month_key(current - back), 0))
        .collect();
    for loan in loans {
        let index = i64::from(loan.loaned_at.year()) * 12 + i64::from(loan.loaned_at.month0());
        if let Some(count) = monthly.get_mut(&month_key(index)) {
            *count += 1;
        }
    }
    monthly
}

/// Formats a month index (`year * 12 + month0`) as `YYYY-MM`.
fn month_key(index: i64) -> String {
    let (year, month0) = (index.div_euclid(12), index.rem_euclid(12));
    format!("{year:04}-{:02}", month0 + 1)
}

#[cfg(test)]
mod tests {
    use super::{leader, month_key, monthly_counts};
    use crate::model::loan::Loan;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn loan_started(id: u32, year: i32, month: u32, day: u32) -> Loan {
        let loaned_at = Utc.with_ymd_and_hms(year, month, day, 8, 0, 0).unwrap();
        Loan::new(id, id, 1, loaned_at, "Title", "Member")
    }

    #[test]
    fn month_key_wraps_years() {
        assert_eq!(month_key(2024 * 12), "2024-01");
        assert_eq!(month_key(2024 * 12 - 1), "2023-12");
    }

    #[test]
    fn monthly_counts_cover_trailing_year_only() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let recent = loan_started(1, 2024, 3, 1);
        let edge = loan_started(2, 2023, 4, 30);
        let old = loan_started(3, 2023, 3, 31);

        let monthly = monthly_counts(&[recent, edge, old], now);
        assert_eq!(monthly.len(), 12);
        assert_eq!(monthly.keys().next().map(String::as_str), Some("2023-04"));
        assert_eq!(monthly["2024-03"], 1);
        assert_eq!(monthly["2023-04"], 1);
        assert!(!monthly.contains_key("2023-03"));
    }

    #[test]
    fn leader_prefers_lowest_id_on_ties() {
        let mut counts = BTreeMap::new();
        counts.insert(5_u32, (2_usize, "five"));
        counts.insert(2_u32, (2_usize, "two"));
        counts.insert(9_u32, (1_usize, "nine"));
        assert_eq!(leader(&counts), Some((2, 2, "two")));
        assert_eq!(leader::<u32>(&BTreeMap::new()), None);
    }
}
