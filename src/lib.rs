//! # invoice-harvester
//!
//! Download due invoices from a listing service, store each one as a PDF and
//! keep a CSV ledger of what was collected.
//!
//! ## Pipeline Overview
//!
//! ```text
//! listing (POST /seed)
//!  │
//!  ├─ 1. Validate   raw JSON record → Invoice (id, due date, absolute URL)
//!  ├─ 2. Dedup      first occurrence of an id wins
//!  ├─ 3. Schedule   due date ≤ today → download, else skip
//!  ├─ 4. Download   GET with 3 attempts, 1 s apart
//!  ├─ 5. Normalise  JPEG/PNG → single-page PDF, PDF stored verbatim
//!  ├─ 6. Ledger     append "ID_Fatura,Due_Date,URL_Fatura" row
//!  └─ 7. Summary    downloaded / skipped / failed buckets
//! ```
//!
//! Every valid, non-duplicate invoice ends in exactly one bucket. Only a
//! failure to start the run (listing, ledger, output directory) is an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice_harvester::{harvest, HarvestConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HarvestConfig::builder()
//!         .output_dir("downloads")
//!         .ledger_path("data/faturas.csv")
//!         .build()?;
//!     let summary = harvest(&config).await?;
//!     println!(
//!         "{} downloaded, {} skipped, {} failed",
//!         summary.downloaded.len(),
//!         summary.skipped.len(),
//!         summary.failed.len()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `harvest` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Known limitation
//!
//! The ledger is not consulted before downloading. Running twice against a
//! listing that still returns collected invoices downloads them again and
//! appends duplicate ledger rows.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod harvest;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{HarvestConfig, HarvestConfigBuilder, DEFAULT_BASE_URL};
pub use error::{DownloadError, HarvestError, LedgerError, ValidationError};
pub use harvest::{harvest, harvest_on, harvest_sync};
pub use ledger::{Ledger, LedgerEntry, LEDGER_HEADER};
pub use output::{
    DownloadedInvoice, FailedInvoice, InvoiceOutcome, OutcomeTracker, RunSummary, SkippedInvoice,
};
pub use pipeline::validate::{Invoice, RawRecord};
pub use progress::{HarvestProgressCallback, NoopProgressCallback, ProgressCallback};
