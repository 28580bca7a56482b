//! Core domain logic for Libris, a single-user library manager.
//! This crate is the single source of truth for lending rules.

pub mod clock;
pub mod config;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod validation;

pub use clock::{system_clock, Clock, FixedClock, SharedClock, SystemClock};
pub use config::LibraryConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::book::{Book, BookId};
pub use model::loan::{Loan, LoanId, LoanStatus, LOAN_PERIOD_DAYS};
pub use model::member::{Member, MemberId, MAX_ACTIVE_LOANS};
pub use service::book_service::{
    BookChanges, BookResult, BookService, BookServiceError, BookStatistics, NewBook,
};
pub use service::library::{Library, LibraryError};
pub use service::loan_service::{
    LoanResult, LoanService, LoanServiceError, LoanStatistics, TopBook, TopMember,
    EXTENSION_DAYS,
};
pub use service::member_service::{
    MemberChanges, MemberResult, MemberService, MemberServiceError, MemberStatistics, NewMember,
};
pub use service::ErrorKind;
pub use store::{CollectionStore, JsonFileStore, StoreError, StoreResult};
pub use validation::FieldError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
