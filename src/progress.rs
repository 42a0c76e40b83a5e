//! Progress-callback trait for per-invoice harvest events.
//!
//! Inject an [`Arc<dyn HarvestProgressCallback>`] via
//! [`crate::config::HarvestConfigBuilder::progress_callback`] to receive
//! events as the run walks the listing. The CLI uses it to drive a terminal
//! progress bar; library callers can forward events anywhere they like.
//!
//! # Example
//!
//! ```rust
//! use invoice_harvester::{HarvestConfig, HarvestProgressCallback, InvoiceOutcome};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     finished: AtomicUsize,
//! }
//!
//! impl HarvestProgressCallback for CountingCallback {
//!     fn on_invoice_complete(&self, id: &str, outcome: &InvoiceOutcome) {
//!         let n = self.finished.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{n} {id}: {}", outcome.label());
//!     }
//! }
//!
//! let config = HarvestConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { finished: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{InvoiceOutcome, RunSummary};
use std::sync::Arc;

/// Called by the orchestrator as it processes each listing record.
///
/// Implementations must be `Send + Sync`. With `concurrency > 1` the
/// start/complete events of different invoices interleave. All methods
/// default to no-ops.
pub trait HarvestProgressCallback: Send + Sync {
    /// Called once, after the listing was fetched.
    ///
    /// # Arguments
    /// * `total_records` — raw records in the listing, before validation
    fn on_run_start(&self, total_records: usize) {
        let _ = total_records;
    }

    /// Called for records that never become an invoice (rejected or duplicate).
    fn on_record_dropped(&self, reason: &str) {
        let _ = reason;
    }

    /// Called when a validated, non-duplicate invoice enters the pipeline.
    fn on_invoice_start(&self, id: &str) {
        let _ = id;
    }

    /// Called once per invoice with its terminal outcome.
    fn on_invoice_complete(&self, id: &str, outcome: &InvoiceOutcome) {
        let _ = (id, outcome);
    }

    /// Called once after every record has been handled.
    fn on_run_complete(&self, summary: &RunSummary) {
        let _ = summary;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl HarvestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::HarvestConfig`].
pub type ProgressCallback = Arc<dyn HarvestProgressCallback>;
