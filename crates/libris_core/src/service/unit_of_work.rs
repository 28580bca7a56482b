//! In-memory rollback log for multi-service loan operations.
//!
//! # Responsibility
//! - Remember the prior state of every book/member touched by a composite
//!   operation.
//! - Undo those changes in reverse order when a later step fails.
//!
//! # Invariants
//! - Compensations are recorded only after the change they undo succeeded.
//! - Rollback restores memory unconditionally; a failed re-save is logged and
//!   never replaces the error that triggered the rollback.

use super::book_service::BookService;
use super::member_service::MemberService;
use crate::model::book::Book;
use crate::model::member::Member;
use log::{debug, error, warn};

#[derive(Debug)]
enum Compensation {
    RestoreBook(Book),
    RestoreMember(Member),
}

#[derive(Debug)]
pub(crate) struct UnitOfWork {
    operation: &'static str,
    log: Vec<Compensation>,
}

impl UnitOfWork {
    pub(crate) fn begin(operation: &'static str) -> Self {
        Self {
            operation,
            log: Vec::new(),
        }
    }

    /// Records the state `book` had before the step that just succeeded.
    pub(crate) fn record_book(&mut self, before: Book) {
        self.log.push(Compensation::RestoreBook(before));
    }

    pub(crate) fn record_member(&mut self, before: Member) {
        self.log.push(Compensation::RestoreMember(before));
    }

    pub(crate) fn commit(self) {
        debug!(
            "event=uow_commit module=unit_of_work status=ok operation={} steps={}",
            self.operation,
            self.log.len()
        );
    }

    /// Undoes every recorded step, newest first.
    pub(crate) fn rollback(self, books: &mut BookService, members: &mut MemberService) {
        warn!(
            "event=uow_rollback module=unit_of_work status=start operation={} steps={}",
            self.operation,
            self.log.len()
        );
        for compensation in self.log.into_iter().rev() {
            match compensation {
                Compensation::RestoreBook(book) => {
                    let id = book.id;
                    if let Err(err) = books.restore(book) {
                        error!(
                            "event=uow_rollback module=unit_of_work status=error operation={} book_id={} error={}",
                            self.operation, id, err
                        );
                    }
                }
                Compensation::RestoreMember(member) => {
                    let id = member.id;
                    if let Err(err) = members.restore(member) {
                        error!(
                            "event=uow_rollback module=unit_of_work status=error operation={} member_id={} error={}",
                            self.operation, id, err
                        );
                    }
                }
            }
        }
    }
}
