//! Error types for the invoice-harvester library.
//!
//! Errors come in two layers:
//!
//! * [`HarvestError`] — **Fatal**: the run cannot start or cannot obtain the
//!   invoice listing. Returned as `Err(HarvestError)` from the top-level
//!   `harvest*` functions; the CLI exits non-zero.
//!
//! * Per-record and per-invoice errors ([`ValidationError`],
//!   [`DownloadError`], [`LedgerError`]) — **Non-fatal**: they are caught at
//!   the invoice boundary, logged, and turned into an outcome bucket (or, for
//!   validation, into a rejection that is excluded from the buckets).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the invoice-harvester library.
#[derive(Debug, Error)]
pub enum HarvestError {
    // ── Listing errors ────────────────────────────────────────────────────
    /// The listing endpoint could not be reached.
    #[error("Failed to fetch invoice listing from '{url}': {reason}")]
    SourceUnavailable { url: String, reason: String },

    /// The listing call exceeded the request timeout.
    #[error("Invoice listing timed out after {secs}s for '{url}'")]
    SourceTimeout { url: String, secs: u64 },

    /// The listing endpoint answered with a non-success status.
    #[error("Invoice listing at '{url}' returned HTTP {status}")]
    SourceStatus { url: String, status: u16 },

    /// The listing body was not JSON or `data` was not an array.
    #[error("Malformed invoice listing from '{url}': {detail}")]
    MalformedListing { url: String, detail: String },

    // ── Local setup errors ────────────────────────────────────────────────
    /// The download directory could not be created.
    #[error("Cannot create output directory '{path}': {source}")]
    OutputDirUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The ledger file could not be created or opened.
    #[error("Cannot initialise ledger '{path}': {source}")]
    LedgerInit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a raw listing record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("incomplete record: missing '{field}'")]
    IncompleteRecord { field: &'static str },

    /// `duedate` is not a `DD-MM-YYYY` date.
    #[error("invalid due date for invoice {id}: '{value}'")]
    InvalidDate { id: String, value: String },

    /// The id cannot be used as a file name.
    #[error("invoice id '{id}' cannot be used as a file name")]
    InvalidId { id: String },
}

/// A download that did not produce a saved file.
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// Every attempt failed with a transport error.
    #[error("invoice {id}: download failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        id: String,
        attempts: u32,
        last_error: String,
    },

    /// The payload arrived but could not be converted or written.
    #[error("invoice {id}: could not save file: {detail}")]
    Persistence { id: String, detail: String },
}

/// Result of a single download attempt that did not succeed.
///
/// Only `Transient` consumes another attempt from the retry budget.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Persistence(String),
}

/// Image → PDF conversion failure.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("cannot decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("cannot re-encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("cannot build PDF: {0}")]
    Pdf(#[from] lopdf::Error),
}

/// A ledger row could not be appended.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to append to ledger '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_status_display() {
        let e = HarvestError::SourceStatus {
            url: "https://example.com/seed".into(),
            status: 503,
        };
        let msg = e.to_string();
        assert!(msg.contains("503"), "got: {msg}");
        assert!(msg.contains("/seed"), "got: {msg}");
    }

    #[test]
    fn incomplete_record_names_field() {
        let e = ValidationError::IncompleteRecord { field: "duedate" };
        assert!(e.to_string().contains("duedate"));
    }

    #[test]
    fn retries_exhausted_display() {
        let e = DownloadError::RetriesExhausted {
            id: "A1".into(),
            attempts: 3,
            last_error: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("A1"));
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("HTTP 500"));
    }

    #[test]
    fn attempt_error_is_transparent() {
        let e = AttemptError::Transient("connection reset".into());
        assert_eq!(e.to_string(), "connection reset");
    }
}
