//! Field validators for user-entered book and member data.
//!
//! # Responsibility
//! - Check format/range of titles, names, emails, phones, ISBNs, genres and
//!   publication dates.
//! - Produce the normalized form stored on records.
//!
//! # Invariants
//! - Every function is total: malformed input yields `Err`/`false`, never a
//!   panic.
//! - Validators are pure; "today" is passed in by the caller.

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Input format for publication dates, e.g. `01/01/1965`.
pub const PUBLICATION_DATE_FORMAT: &str = "%d/%m/%Y";
/// Earliest accepted publication year.
pub const MIN_PUBLICATION_YEAR: i32 = 1440;

const MIN_NAME_CHARS: usize = 2;

const GENRES: &[&str] = &[
    "Roman",
    "Science-fiction",
    "Fantasy",
    "Policier",
    "Thriller",
    "Romance",
    "Historique",
    "Biographie",
    "Essai",
    "Poésie",
    "Théâtre",
    "Bande dessinée",
    "Manga",
    "Jeunesse",
    "Documentaire",
    "Guide pratique",
    "Cuisine",
    "Art",
    "Sport",
    "Autre",
];

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-ZÀ-ÿ\s'-]+$").expect("valid name regex"));
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});
static PHONE_SEPARATORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s.-]").expect("valid phone separator regex"));
static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("valid phone regex"));

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// Title is blank after trim.
    EmptyTitle,
    /// Person name (member or author) is too short or has invalid characters.
    InvalidName { field: &'static str, value: String },
    InvalidEmail(String),
    InvalidPhone(String),
    /// ISBN is neither ISBN-10 nor ISBN-13 shaped after normalization.
    InvalidIsbn(String),
    UnknownGenre(String),
    /// Date text does not match `DD/MM/YYYY`.
    InvalidDateFormat(String),
    DateInFuture(NaiveDate),
    DateTooOld(NaiveDate),
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be blank"),
            Self::InvalidName { field, value } => write!(f, "invalid {field}: `{value}`"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
            Self::InvalidPhone(value) => write!(f, "invalid phone number: `{value}`"),
            Self::InvalidIsbn(value) => {
                write!(f, "invalid ISBN `{value}`: expected 10 or 13 characters")
            }
            Self::UnknownGenre(value) => write!(f, "unknown genre: `{value}`"),
            Self::InvalidDateFormat(value) => {
                write!(f, "invalid date `{value}`: expected DD/MM/YYYY")
            }
            Self::DateInFuture(date) => {
                write!(f, "publication date {date} must not be in the future")
            }
            Self::DateTooOld(date) => write!(
                f,
                "publication date {date} predates year {MIN_PUBLICATION_YEAR}"
            ),
        }
    }
}

impl Error for FieldError {}

/// Returns the closed list of accepted genres in canonical spelling.
pub fn supported_genres() -> &'static [&'static str] {
    GENRES
}

/// Validates a book title and returns it trimmed.
pub fn validate_title(title: &str) -> Result<String, FieldError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(FieldError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

/// Returns whether `name` is an acceptable person name.
pub fn is_valid_name(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.chars().count() >= MIN_NAME_CHARS && NAME_RE.is_match(trimmed)
}

/// Validates a person name; `field` labels the error (`name`, `author`).
pub fn validate_name(field: &'static str, name: &str) -> Result<String, FieldError> {
    if !is_valid_name(name) {
        return Err(FieldError::InvalidName {
            field,
            value: name.to_string(),
        });
    }
    Ok(name.trim().to_string())
}

/// Lower-cases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email.trim())
}

/// Validates an email address and returns its normalized form.
pub fn validate_email(email: &str) -> Result<String, FieldError> {
    if !is_valid_email(email) {
        return Err(FieldError::InvalidEmail(email.to_string()));
    }
    Ok(normalize_email(email))
}

pub fn is_valid_phone(phone: &str) -> bool {
    let stripped = PHONE_SEPARATORS_RE.replace_all(phone, "");
    PHONE_RE.is_match(&stripped)
}

/// Validates a phone number and returns it trimmed (separators kept).
pub fn validate_phone(phone: &str) -> Result<String, FieldError> {
    if !is_valid_phone(phone) {
        return Err(FieldError::InvalidPhone(phone.to_string()));
    }
    Ok(phone.trim().to_string())
}

/// Strips hyphens and spaces.
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars().filter(|c| *c != '-' && *c != ' ').collect()
}

/// Shape check only: the check digit is not verified. An ISBN-10 may end
/// with an uppercase `X`; a lowercase `x` is rejected.
pub fn is_valid_isbn(isbn: &str) -> bool {
    let normalized = normalize_isbn(isbn);
    let bytes = normalized.as_bytes();
    match bytes.len() {
        10 => {
            bytes[..9].iter().all(u8::is_ascii_digit)
                && (bytes[9].is_ascii_digit() || bytes[9] == b'X')
        }
        13 => bytes.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// Validates an ISBN and returns its normalized form.
pub fn validate_isbn(isbn: &str) -> Result<String, FieldError> {
    if !is_valid_isbn(isbn) {
        return Err(FieldError::InvalidIsbn(isbn.to_string()));
    }
    Ok(normalize_isbn(isbn))
}

/// Matches `genre` case-insensitively and returns the canonical spelling.
pub fn validate_genre(genre: &str) -> Result<&'static str, FieldError> {
    let wanted = genre.trim().to_lowercase();
    GENRES
        .iter()
        .find(|candidate| candidate.to_lowercase() == wanted)
        .copied()
        .ok_or_else(|| FieldError::UnknownGenre(genre.to_string()))
}

/// Parses a `DD/MM/YYYY` publication date and checks its range.
///
/// # Errors
/// - `InvalidDateFormat` when the text does not parse.
/// - `DateInFuture` when the date is after `today`.
/// - `DateTooOld` when the year is before 1440.
pub fn parse_publication_date(text: &str, today: NaiveDate) -> Result<NaiveDate, FieldError> {
    let trimmed = text.trim();
    let date = NaiveDate::parse_from_str(trimmed, PUBLICATION_DATE_FORMAT)
        .map_err(|_| FieldError::InvalidDateFormat(trimmed.to_string()))?;
    if date > today {
        return Err(FieldError::DateInFuture(date));
    }
    if date.year() < MIN_PUBLICATION_YEAR {
        return Err(FieldError::DateTooOld(date));
    }
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::{
        is_valid_isbn, is_valid_name, is_valid_phone, normalize_isbn, parse_publication_date,
        validate_genre, FieldError,
    };
    use chrono::NaiveDate;

    #[test]
    fn isbn_shapes() {
        assert!(is_valid_isbn("978-0-441-01359-3"));
        assert!(is_valid_isbn("0-306-40615-X"));
        assert!(!is_valid_isbn("030640615x"));
        assert!(!is_valid_isbn("X306406152"));
        assert!(!is_valid_isbn("97804410135"));
        assert!(!is_valid_isbn("978044101359X"));
        assert_eq!(normalize_isbn("0 306-40615-X"), "030640615X");
    }

    #[test]
    fn names_require_two_letters() {
        assert!(is_valid_name("Jo"));
        assert!(is_valid_name("Éloïse D'Arc-Müller"));
        assert!(!is_valid_name(" J "));
        assert!(!is_valid_name("R2D2"));
    }

    #[test]
    fn phone_separators_are_ignored() {
        assert!(is_valid_phone("+33 6 12 34 56 78"));
        assert!(is_valid_phone("06.12.34.56.78"));
        assert!(!is_valid_phone("1234567"));
        assert!(!is_valid_phone("+33 6 12 34 56 78 90 12 34"));
    }

    #[test]
    fn genre_is_case_insensitive_and_canonical() {
        assert_eq!(validate_genre("science-FICTION"), Ok("Science-fiction"));
        assert_eq!(validate_genre("POÉSIE"), Ok("Poésie"));
        assert!(matches!(
            validate_genre("Cyberpunk"),
            Err(FieldError::UnknownGenre(_))
        ));
    }

    #[test]
    fn publication_date_range() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(
            parse_publication_date("01/01/1965", today),
            Ok(NaiveDate::from_ymd_opt(1965, 1, 1).unwrap())
        );
        assert!(parse_publication_date("01/06/2024", today).is_ok());
        assert!(matches!(
            parse_publication_date("02/06/2024", today),
            Err(FieldError::DateInFuture(_))
        ));
        assert!(matches!(
            parse_publication_date("31/12/1439", today),
            Err(FieldError::DateTooOld(_))
        ));
        assert!(matches!(
            parse_publication_date("1965-01-01", today),
            Err(FieldError::InvalidDateFormat(_))
        ));
    }
}
