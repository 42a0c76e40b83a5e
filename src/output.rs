//! Run results: per-invoice outcomes, the outcome tracker and the summary.

use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// Terminal state of one validated, non-duplicate invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvoiceOutcome {
    /// File written and ledger row appended.
    Downloaded { path: PathBuf },
    /// Due date is after today.
    SkippedNotDue { due_date: NaiveDate },
    /// Download, save or ledger append failed.
    Failed { reason: String },
}

impl InvoiceOutcome {
    /// Short lowercase label for log lines and progress output.
    pub fn label(&self) -> &'static str {
        match self {
            InvoiceOutcome::Downloaded { .. } => "downloaded",
            InvoiceOutcome::SkippedNotDue { .. } => "skipped",
            InvoiceOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedInvoice {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedInvoice {
    pub id: String,
    pub due_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedInvoice {
    pub id: String,
    pub reason: String,
}

/// End-of-run report. Bucket lists keep the order outcomes were recorded in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub downloaded: Vec<DownloadedInvoice>,
    pub skipped: Vec<SkippedInvoice>,
    pub failed: Vec<FailedInvoice>,
    /// Records dropped by validation. Not part of any bucket.
    pub rejected: usize,
    /// Repeated ids dropped by dedup. Not part of any bucket.
    pub duplicates: usize,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn downloaded_ids(&self) -> Vec<&str> {
        self.downloaded.iter().map(|d| d.id.as_str()).collect()
    }

    pub fn skipped_ids(&self) -> Vec<&str> {
        self.skipped.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.id.as_str()).collect()
    }

    /// Number of invoices that received an outcome.
    pub fn total_invoices(&self) -> usize {
        self.downloaded.len() + self.skipped.len() + self.failed.len()
    }

    /// Emit the summary through `tracing`, one line per entry.
    pub fn log(&self) {
        info!("===== RUN SUMMARY =====");
        info!("Downloaded: {}", self.downloaded.len());
        for d in &self.downloaded {
            info!(" - {} ({})", d.id, d.path.display());
        }
        info!("Skipped (not due): {}", self.skipped.len());
        for s in &self.skipped {
            info!(" - {} ({})", s.id, s.due_date.format("%d-%m-%Y"));
        }
        info!("Failed: {}", self.failed.len());
        for f in &self.failed {
            info!(" - {}: {}", f.id, f.reason);
        }
        info!(
            "Rejected records: {}, duplicates dropped: {}, {}ms total",
            self.rejected, self.duplicates, self.duration_ms
        );
    }
}

/// Accumulates outcomes for one run.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    summary: RunSummary,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `outcome` to its bucket.
    pub fn record(&mut self, id: impl Into<String>, outcome: InvoiceOutcome) {
        let id = id.into();
        match outcome {
            InvoiceOutcome::Downloaded { path } => {
                self.summary.downloaded.push(DownloadedInvoice { id, path })
            }
            InvoiceOutcome::SkippedNotDue { due_date } => {
                self.summary.skipped.push(SkippedInvoice { id, due_date })
            }
            InvoiceOutcome::Failed { reason } => {
                self.summary.failed.push(FailedInvoice { id, reason })
            }
        }
    }

    pub fn record_rejected(&mut self) {
        self.summary.rejected += 1;
    }

    pub fn record_duplicate(&mut self) {
        self.summary.duplicates += 1;
    }

    /// Snapshot of the buckets recorded so far.
    pub fn summary(&self) -> RunSummary {
        self.summary.clone()
    }

    /// Consume the tracker, stamping the run duration.
    pub fn finish(mut self, duration_ms: u64) -> RunSummary {
        self.summary.duration_ms = duration_ms;
        self.summary
    }
}
