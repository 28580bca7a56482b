#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use libris_core::{
    Book, BookService, CollectionStore, FixedClock, JsonFileStore, Library, LibraryConfig,
    LoanService, Member, MemberService, NewBook, NewMember, SharedClock, StoreError, StoreResult,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
}

pub fn fixed_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(start_time()))
}

pub fn open_library(dir: &Path, clock: Arc<FixedClock>) -> Library {
    let clock: SharedClock = clock;
    Library::open_with_clock(&LibraryConfig::from_data_dir(dir), clock).unwrap()
}

pub fn dune() -> NewBook {
    NewBook {
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        isbn: "9780441013593".to_string(),
        genre: "Science-fiction".to_string(),
        publication_date: "01/01/1965".to_string(),
    }
}

pub fn alice() -> NewMember {
    NewMember {
        name: "Alice Durand".to_string(),
        email: "Alice@Ex.com".to_string(),
        phone: "+33612345678".to_string(),
    }
}

/// Builds a valid book with a distinct ISBN-13 for `n`.
pub fn numbered_book(n: u32) -> NewBook {
    NewBook {
        title: format!("Volume {n}"),
        author: "Jules Verne".to_string(),
        isbn: format!("978000000{n:04}"),
        genre: "Roman".to_string(),
        publication_date: "15/03/1870".to_string(),
    }
}

pub fn numbered_member(n: u32) -> NewMember {
    NewMember {
        name: "Bruno Martin".to_string(),
        email: format!("member{n}@example.org"),
        phone: "06 12 34 56 78".to_string(),
    }
}

pub fn add_books(books: &mut BookService, count: u32) -> Vec<Book> {
    (1..=count)
        .map(|n| books.add(numbered_book(n)).unwrap())
        .collect()
}

pub fn add_member(members: &mut MemberService, n: u32) -> Member {
    members.add(numbered_member(n)).unwrap()
}

/// Asserts the cross-entity invariants over a whole library.
pub fn assert_consistent(library: &mut Library) {
    let books: Vec<Book> = library.books().list_all().to_vec();
    let members: Vec<Member> = library.members().list_all().to_vec();
    let loans = library.loans_mut().list_all().unwrap().to_vec();

    for book in &books {
        let outstanding = loans
            .iter()
            .filter(|loan| loan.book_id == book.id && loan.is_outstanding())
            .count();
        let expected = if book.available { 0 } else { 1 };
        assert_eq!(outstanding, expected, "book {} availability drift", book.id);
    }
    for member in &members {
        let outstanding = loans
            .iter()
            .filter(|loan| loan.member_id == member.id && loan.is_outstanding())
            .count();
        assert!(member.active_loans <= libris_core::MAX_ACTIVE_LOANS);
        assert_eq!(member.active_loans as usize, outstanding);
    }
}

/// Store double whose saves can be switched to fail.
pub struct FlakyStore<T> {
    inner: JsonFileStore<T>,
    fail_saves: Arc<AtomicBool>,
}

impl<T> FlakyStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> (Self, Arc<AtomicBool>) {
        let fail_saves = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner: JsonFileStore::new(path),
                fail_saves: fail_saves.clone(),
            },
            fail_saves,
        )
    }
}

impl<T: Serialize + DeserializeOwned> CollectionStore<T> for FlakyStore<T> {
    fn save(&self, items: &[T]) -> StoreResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: self.inner.path().to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "injected save failure"),
            });
        }
        self.inner.save(items)
    }

    fn load(&self) -> StoreResult<Vec<T>> {
        self.inner.load()
    }

    fn exists(&self) -> bool {
        self.inner.exists()
    }

    fn remove(&self) -> StoreResult<()> {
        self.inner.remove()
    }

    fn size_bytes(&self) -> StoreResult<u64> {
        self.inner.size_bytes()
    }
}

/// Library whose member and loan saves can be made to fail.
pub struct FlakyLibrary {
    pub library: Library,
    pub fail_member_saves: Arc<AtomicBool>,
    pub fail_loan_saves: Arc<AtomicBool>,
}

pub fn open_flaky_library(dir: &Path, clock: Arc<FixedClock>) -> FlakyLibrary {
    let clock: SharedClock = clock;
    let books = BookService::open(JsonFileStore::new(dir.join("books.json")), clock.clone())
        .unwrap();
    let (member_store, fail_member_saves) = FlakyStore::new(dir.join("members.json"));
    let members = MemberService::open(member_store, clock.clone()).unwrap();
    let (loan_store, fail_loan_saves) = FlakyStore::new(dir.join("loans.json"));
    let loans = LoanService::open(loan_store, clock).unwrap();
    FlakyLibrary {
        library: Library::from_services(books, members, loans),
        fail_member_saves,
        fail_loan_saves,
    }
}
