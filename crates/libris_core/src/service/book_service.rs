//! Book catalogue service.
//!
//! # Responsibility
//! - Validate and register books; look them up, search and list them.
//! - Flip availability on behalf of the loan lifecycle.
//! - Compute catalogue statistics.
//!
//! # Invariants
//! - Normalized ISBNs are unique across the collection.
//! - A book that is on loan cannot be deleted.
//! - All fields of a change request are validated before any is applied.

use super::{provided, ErrorKind};
use crate::clock::SharedClock;
use crate::model::book::{Book, BookId};
use crate::store::{CollectionStore, StoreError};
use crate::validation::{
    normalize_isbn, parse_publication_date, validate_genre, validate_isbn, validate_name,
    validate_title, FieldError,
};
use log::{info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type BookResult<T> = Result<T, BookServiceError>;

#[derive(Debug)]
pub enum BookServiceError {
    Validation(FieldError),
    BookNotFound(BookId),
    /// Normalized ISBN already belongs to another book.
    DuplicateIsbn { isbn: String, existing_id: BookId },
    /// Delete refused while the book is lent out.
    BookOnLoan(BookId),
    AlreadyBorrowed(BookId),
    Store(StoreError),
}

impl BookServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationFailed,
            Self::BookNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateIsbn { .. } => ErrorKind::DuplicateKey,
            Self::BookOnLoan(_) | Self::AlreadyBorrowed(_) => ErrorKind::BusinessRuleViolation,
            Self::Store(_) => ErrorKind::StorageFailure,
        }
    }
}

impl Display for BookServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::BookNotFound(id) => write!(f, "book not found: {id}"),
            Self::DuplicateIsbn { isbn, existing_id } => {
                write!(f, "ISBN {isbn} is already used by book {existing_id}")
            }
            Self::BookOnLoan(id) => write!(f, "book {id} is on loan and cannot be removed"),
            Self::AlreadyBorrowed(id) => write!(f, "book {id} is already borrowed"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BookServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FieldError> for BookServiceError {
    fn from(value: FieldError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for BookServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Raw user input for registering a book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: String,
    /// `DD/MM/YYYY`.
    pub publication_date: String,
}

/// Partial update; `None` or blank keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub publication_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookStatistics {
    pub total: usize,
    pub available: usize,
    pub borrowed: usize,
    pub by_genre: BTreeMap<String, usize>,
    /// Highest lifetime loan count (> 0); lowest id wins ties.
    pub most_borrowed: Option<Book>,
}

/// Owner of the books collection.
pub struct BookService {
    books: Vec<Book>,
    next_id: BookId,
    store: Box<dyn CollectionStore<Book>>,
    clock: SharedClock,
}

impl BookService {
    /// Loads the collection from `store`.
    pub fn open(
        store: impl CollectionStore<Book> + 'static,
        clock: SharedClock,
    ) -> BookResult<Self> {
        let books = store.load()?;
        let next_id = books.iter().map(|book| book.id).max().unwrap_or(0) + 1;
        info!(
            "event=service_open module=book_service status=ok records={} next_id={}",
            books.len(),
            next_id
        );
        Ok(Self {
            books,
            next_id,
            store: Box::new(store),
            clock,
        })
    }

    /// Validates and registers a new, available book.
    ///
    /// # Errors
    /// - `Validation` for any malformed field.
    /// - `DuplicateIsbn` when the normalized ISBN is already registered.
    /// - `Store` when the collection cannot be written.
    pub fn add(&mut self, request: NewBook) -> BookResult<Book> {
        let title = validate_title(&request.title)?;
        let author = validate_name("author", &request.author)?;
        let isbn = validate_isbn(&request.isbn)?;
        let genre = validate_genre(&request.genre)?;
        let publication_date =
            parse_publication_date(&request.publication_date, self.clock.today())?;
        self.ensure_isbn_free(&isbn, None)?;

        let book = Book {
            id: self.next_id,
            title,
            author,
            isbn,
            genre: genre.to_string(),
            publication_date,
            available: true,
            loan_count: 0,
            created_at: self.clock.now(),
        };
        self.books.push(book.clone());
        if let Err(err) = self.store.save(&self.books) {
            self.books.pop();
            return Err(err.into());
        }
        self.next_id += 1;

        info!(
            "event=book_add module=book_service status=ok book_id={}",
            book.id
        );
        Ok(book)
    }

    pub fn find_by_id(&self, id: BookId) -> Option<&Book> {
        self.books.iter().find(|book| book.id == id)
    }

    /// Looks up by ISBN, ignoring hyphens, spaces and case.
    pub fn find_by_isbn(&self, isbn: &str) -> Option<&Book> {
        let wanted = normalize_isbn(isbn);
        self.books
            .iter()
            .find(|book| book.isbn.eq_ignore_ascii_case(&wanted))
    }

    /// Case-insensitive substring match on title, author or genre.
    pub fn search(&self, term: &str) -> Vec<&Book> {
        let needle = term.trim().to_lowercase();
        self.books
            .iter()
            .filter(|book| {
                book.title.to_lowercase().contains(&needle)
                    || book.author.to_lowercase().contains(&needle)
                    || book.genre.to_lowercase().contains(&needle)
            })
            .collect()
    }

    pub fn list_all(&self) -> &[Book] {
        &self.books
    }

    pub fn list_available(&self) -> Vec<&Book> {
        self.books
            .iter()
            .filter(|book| book.is_available())
            .collect()
    }

    /// Applies a partial update after validating every provided field.
    pub fn modify(&mut self, id: BookId, changes: BookChanges) -> BookResult<Book> {
        self.index_of(id)?;

        let title = provided(&changes.title).map(validate_title).transpose()?;
        let author = provided(&changes.author)
            .map(|value| validate_name("author", value))
            .transpose()?;
        let isbn = provided(&changes.isbn).map(validate_isbn).transpose()?;
        let genre = provided(&changes.genre).map(validate_genre).transpose()?;
        let today = self.clock.today();
        let publication_date = provided(&changes.publication_date)
            .map(|value| parse_publication_date(value, today))
            .transpose()?;
        if let Some(isbn) = &isbn {
            self.ensure_isbn_free(isbn, Some(id))?;
        }

        let updated = self.update_with(id, |book| {
            if let Some(title) = title {
                book.title = title;
            }
            if let Some(author) = author {
                book.author = author;
            }
            if let Some(isbn) = isbn {
                book.isbn = isbn;
            }
            if let Some(genre) = genre {
                book.genre = genre.to_string();
            }
            if let Some(date) = publication_date {
                book.publication_date = date;
            }
            Ok(())
        })?;
        info!(
            "event=book_modify module=book_service status=ok book_id={}",
            id
        );
        Ok(updated)
    }

    /// Removes a book that is not on loan.
    pub fn delete(&mut self, id: BookId) -> BookResult<Book> {
        let index = self.index_of(id)?;
        if !self.books[index].is_available() {
            warn!(
                "event=book_delete module=book_service status=rejected book_id={} reason=on_loan",
                id
            );
            return Err(BookServiceError::BookOnLoan(id));
        }

        let removed = self.books.remove(index);
        if let Err(err) = self.store.save(&self.books) {
            self.books.insert(index, removed);
            return Err(err.into());
        }
        info!(
            "event=book_delete module=book_service status=ok book_id={}",
            id
        );
        Ok(removed)
    }

    /// Marks the book as lent out and increments its lifetime loan count.
    pub fn mark_borrowed(&mut self, id: BookId) -> BookResult<Book> {
        self.update_with(id, |book| {
            if !book.is_available() {
                return Err(BookServiceError::AlreadyBorrowed(id));
            }
            book.mark_borrowed();
            Ok(())
        })
    }

    pub fn mark_available(&mut self, id: BookId) -> BookResult<Book> {
        self.update_with(id, |book| {
            book.mark_available();
            Ok(())
        })
    }

    pub fn statistics(&self) -> BookStatistics {
        let available = self.books.iter().filter(|book| book.available).count();
        let mut by_genre = BTreeMap::new();
        for book in &self.books {
            *by_genre.entry(book.genre.clone()).or_insert(0) += 1;
        }
        let most_borrowed = self
            .books
            .iter()
            .filter(|book| book.loan_count > 0)
            .min_by_key(|book| (std::cmp::Reverse(book.loan_count), book.id))
            .cloned();

        BookStatistics {
            total: self.books.len(),
            available,
            borrowed: self.books.len() - available,
            by_genre,
            most_borrowed,
        }
    }

    /// Never issues ids up to `id` again, e.g. ids a stored loan still
    /// points at after the book was deleted.
    pub(crate) fn reserve_ids_through(&mut self, id: BookId) {
        self.next_id = self.next_id.max(id + 1);
    }

    /// Reinstates a previously captured record, used to compensate a
    /// failed multi-service operation.
    pub(crate) fn restore(&mut self, snapshot: Book) -> BookResult<()> {
        match self.books.iter_mut().find(|book| book.id == snapshot.id) {
            Some(book) => *book = snapshot,
            None => self.books.push(snapshot),
        }
        self.store.save(&self.books)?;
        Ok(())
    }

    fn index_of(&self, id: BookId) -> BookResult<usize> {
        self.books
            .iter()
            .position(|book| book.id == id)
            .ok_or(BookServiceError::BookNotFound(id))
    }

    fn ensure_isbn_free(&self, isbn: &str, except: Option<BookId>) -> BookResult<()> {
        match self
            .books
            .iter()
            .find(|book| Some(book.id) != except && book.isbn.eq_ignore_ascii_case(isbn))
        {
            Some(existing) => Err(BookServiceError::DuplicateIsbn {
                isbn: isbn.to_string(),
                existing_id: existing.id,
            }),
            None => Ok(()),
        }
    }

    /// Mutates one book, persists, and reverts the book when saving fails.
    fn update_with(
        &mut self,
        id: BookId,
        apply: impl FnOnce(&mut Book) -> BookResult<()>,
    ) -> BookResult<Book> {
        let index = self.index_of(id)?;
        let snapshot = self.books[index].clone();
        let result = apply(&mut self.books[index])
            .and_then(|()| self.store.save(&self.books).map_err(Into::into));
        if let Err(err) = result {
            self.books[index] = snapshot;
            return Err(err);
        }
        Ok(self.books[index].clone())
    }
}
