//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the library from `LIBRIS_DATA_DIR` and report collection health.
//! - Keep output deterministic for quick local sanity checks.

use libris_core::{default_log_level, init_logging, Library, LibraryConfig};
use std::path::PathBuf;
use std::process::ExitCode;

const LOG_LEVEL_ENV: &str = "LIBRIS_LOG_LEVEL";
const LOG_DIR_ENV: &str = "LIBRIS_LOG_DIR";

fn main() -> ExitCode {
    if let Err(err) = start_logging() {
        eprintln!("libris logging disabled: {err}");
    }

    let config = LibraryConfig::from_env();
    let mut library = match Library::open(&config) {
        Ok(library) => library,
        Err(err) => {
            log::error!("event=cli_start module=cli status=error error={err}");
            eprintln!("libris failed to open data: {err}");
            return ExitCode::FAILURE;
        }
    };

    let books = library.books().statistics();
    let members = library.members().statistics();
    println!("libris_core version={}", libris_core::core_version());
    println!(
        "books total={} available={} borrowed={}",
        books.total, books.available, books.borrowed
    );
    println!(
        "members total={} active={} suspended={}",
        members.total, members.active, members.suspended
    );
    match library.loans_mut().statistics() {
        Ok(loans) => {
            println!(
                "loans total={} ongoing={} overdue={} returned={}",
                loans.total, loans.ongoing, loans.overdue, loans.returned
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("libris failed to read loans: {err}");
            ExitCode::FAILURE
        }
    }
}

fn start_logging() -> Result<(), String> {
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    let dir = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir.trim()),
        _ => std::env::current_dir()
            .map_err(|err| format!("cannot resolve working directory: {err}"))?
            .join("logs"),
    };
    let dir = dir
        .to_str()
        .ok_or_else(|| format!("log directory `{}` is not valid UTF-8", dir.display()))?
        .to_string();
    init_logging(&level, &dir)
}
