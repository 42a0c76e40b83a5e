//! Pipeline stages for one harvest run.
//!
//! Each submodule implements one step of the per-invoice flow.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ validate ──▶ (dedup) ──▶ schedule ──▶ download ──▶ ledger
//! (POST)     (typed)                  (due?)       (GET+retry)
//!                                                   └─ normalize (image → PDF)
//! ```
//!
//! 1. [`source`]    — fetch the raw listing; the only fatal network call
//! 2. [`validate`]  — raw JSON record → [`validate::Invoice`] or a rejection
//! 3. [`schedule`]  — inclusive due-date check against "today"
//! 4. [`download`]  — bounded-retry GET and atomic save
//! 5. [`normalize`] — decide the payload kind and convert images to PDF
//!
//! Deduplication and the ledger append are done by the orchestrator in
//! [`crate::harvest`].

pub mod download;
pub mod normalize;
pub mod schedule;
pub mod source;
pub mod validate;
