//! Library facade wiring the three services together.
//!
//! # Responsibility
//! - Open books, members and loans from one `LibraryConfig`.
//! - Lend the book and member services to loan operations.
//!
//! # Invariants
//! - Book and member ids still referenced by a stored loan are never issued
//!   to a new record, even after the referenced record was deleted.

use super::book_service::{BookService, BookServiceError};
use super::loan_service::{LoanResult, LoanService, LoanServiceError};
use super::member_service::{MemberService, MemberServiceError};
use super::ErrorKind;
use crate::clock::{system_clock, SharedClock};
use crate::config::LibraryConfig;
use crate::model::book::BookId;
use crate::model::loan::{Loan, LoanId};
use crate::model::member::MemberId;
use crate::store::JsonFileStore;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure to open one of the three collections.
#[derive(Debug)]
pub enum LibraryError {
    Books(BookServiceError),
    Members(MemberServiceError),
    Loans(LoanServiceError),
}

impl LibraryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Books(err) => err.kind(),
            Self::Members(err) => err.kind(),
            Self::Loans(err) => err.kind(),
        }
    }
}

impl Display for LibraryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Books(err) => write!(f, "cannot open books: {err}"),
            Self::Members(err) => write!(f, "cannot open members: {err}"),
            Self::Loans(err) => write!(f, "cannot open loans: {err}"),
        }
    }
}

impl Error for LibraryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Books(err) => Some(err),
            Self::Members(err) => Some(err),
            Self::Loans(err) => Some(err),
        }
    }
}

impl From<BookServiceError> for LibraryError {
    fn from(value: BookServiceError) -> Self {
        Self::Books(value)
    }
}

impl From<MemberServiceError> for LibraryError {
    fn from(value: MemberServiceError) -> Self {
        Self::Members(value)
    }
}

impl From<LoanServiceError> for LibraryError {
    fn from(value: LoanServiceError) -> Self {
        Self::Loans(value)
    }
}

pub struct Library {
    books: BookService,
    members: MemberService,
    loans: LoanService,
}

impl Library {
    /// Opens all collections with the system clock.
    pub fn open(config: &LibraryConfig) -> Result<Self, LibraryError> {
        Self::open_with_clock(config, system_clock())
    }

    pub fn open_with_clock(
        config: &LibraryConfig,
        clock: SharedClock,
    ) -> Result<Self, LibraryError> {
        let books = BookService::open(JsonFileStore::new(&config.books_path), clock.clone())?;
        let members =
            MemberService::open(JsonFileStore::new(&config.members_path), clock.clone())?;
        let loans = LoanService::open(JsonFileStore::new(&config.loans_path), clock)?;
        info!(
            "event=library_open module=library status=ok books={} members={}",
            books.list_all().len(),
            members.list_all().len()
        );
        Ok(Self::from_services(books, members, loans))
    }

    /// Assembles a library from already opened services.
    pub fn from_services(books: BookService, members: MemberService, loans: LoanService) -> Self {
        let mut library = Self {
            books,
            members,
            loans,
        };
        library.reserve_referenced_ids();
        library
    }

    pub fn books(&self) -> &BookService {
        &self.books
    }

    pub fn books_mut(&mut self) -> &mut BookService {
        &mut self.books
    }

    pub fn members(&self) -> &MemberService {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut MemberService {
        &mut self.members
    }

    /// Loan queries refresh statuses, hence `&mut`.
    pub fn loans_mut(&mut self) -> &mut LoanService {
        &mut self.loans
    }

    pub fn create_loan(&mut self, book_id: BookId, member_id: MemberId) -> LoanResult<Loan> {
        self.loans
            .create_loan(&mut self.books, &mut self.members, book_id, member_id)
    }

    pub fn return_loan(&mut self, loan_id: LoanId) -> LoanResult<Loan> {
        self.loans
            .return_loan(&mut self.books, &mut self.members, loan_id)
    }

    pub fn extend_loan(&mut self, loan_id: LoanId, extra_days: u32) -> LoanResult<Loan> {
        self.loans.extend_loan(loan_id, extra_days)
    }

    pub fn cancel_loan(&mut self, loan_id: LoanId) -> LoanResult<Loan> {
        self.loans
            .cancel_loan(&mut self.books, &mut self.members, loan_id)
    }

    fn reserve_referenced_ids(&mut self) {
        let (book_id, member_id) = self.loans.highest_referenced_ids();
        self.books.reserve_ids_through(book_id);
        self.members.reserve_ids_through(member_id);
    }
}
