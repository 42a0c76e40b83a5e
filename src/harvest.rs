//! Run orchestration: listing → per-invoice pipeline → summary.
//!
//! Each listing record walks the same state machine exactly once:
//!
//! ```text
//! received ─▶ rejected                         (logged, no bucket)
//!          └▶ validated ─▶ duplicate           (logged, no bucket)
//!                       └▶ not due             → SkippedNotDue
//!                       └▶ due ─▶ download failed        → Failed
//!                               └▶ saved ─▶ ledger failed → Failed
//!                                        └▶ appended      → Downloaded
//! ```
//!
//! Triage (validation, dedup, due check) runs strictly in listing order.
//! Downloads go through an ordered buffered stream, so with the default
//! `concurrency = 1` the whole run is sequential, and with more workers the
//! buckets still list invoices in listing order.

use crate::config::HarvestConfig;
use crate::error::HarvestError;
use crate::ledger::{Ledger, LedgerEntry};
use crate::output::{InvoiceOutcome, OutcomeTracker, RunSummary};
use crate::pipeline::download::Downloader;
use crate::pipeline::schedule::is_due;
use crate::pipeline::source;
use crate::pipeline::validate::{validate, Invoice, RawRecord};
use crate::progress::HarvestProgressCallback;
use chrono::{Local, NaiveDate};
use futures::future;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Run a harvest against today's local date.
///
/// # Errors
/// Returns `Err(HarvestError)` only when the run cannot start: the output
/// directory or ledger cannot be prepared, or the listing call fails.
/// Per-invoice failures are reported in the returned [`RunSummary`].
pub async fn harvest(config: &HarvestConfig) -> Result<RunSummary, HarvestError> {
    harvest_on(config, Local::now().date_naive()).await
}

/// Run a harvest treating `today` as the current date.
pub async fn harvest_on(
    config: &HarvestConfig,
    today: NaiveDate,
) -> Result<RunSummary, HarvestError> {
    let started = Instant::now();
    info!("Starting harvest from {} (today is {})", config.base_url, today);

    // ── Step 1: Prepare output directory and ledger ──────────────────────
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| HarvestError::OutputDirUnavailable {
            path: config.output_dir.clone(),
            source,
        })?;
    let ledger = Ledger::open(&config.ledger_path).await?;

    // ── Step 2: Fetch listing ────────────────────────────────────────────
    let client = build_client(config)?;
    let records = source::fetch_listing(&client, config).await?;
    notify(config, |cb| cb.on_run_start(records.len()));

    // ── Step 3: Triage and download ──────────────────────────────────────
    let downloader = Downloader::new(client, config);
    let mut run = RunContext::new(today);

    let settled: Vec<(String, InvoiceOutcome)> = stream::iter(records)
        .filter_map(|raw| future::ready(run.admit(&raw, config)))
        .map(|admitted| settle(admitted, &downloader, &ledger, config))
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    for (id, outcome) in settled {
        run.tracker.record(id, outcome);
    }

    // ── Step 4: Summary ──────────────────────────────────────────────────
    let summary = run.tracker.finish(started.elapsed().as_millis() as u64);
    summary.log();
    info!("Files saved in {}, ledger at {}", config.output_dir.display(), ledger.path().display());
    notify(config, |cb| cb.on_run_complete(&summary));

    Ok(summary)
}

/// Synchronous wrapper around [`harvest`].
///
/// Creates a temporary tokio runtime internally.
pub fn harvest_sync(config: &HarvestConfig) -> Result<RunSummary, HarvestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| HarvestError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(harvest(config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// State owned by one run and dropped with it.
struct RunContext {
    today: NaiveDate,
    processed: HashSet<String>,
    tracker: OutcomeTracker,
}

/// An invoice that passed triage.
enum Admitted {
    Due(Invoice),
    NotDue(Invoice),
}

impl RunContext {
    fn new(today: NaiveDate) -> Self {
        Self {
            today,
            processed: HashSet::new(),
            tracker: OutcomeTracker::new(),
        }
    }

    /// Validate, dedup and date-check one record.
    ///
    /// `None` means the record was dropped and gets no outcome.
    fn admit(&mut self, raw: &RawRecord, config: &HarvestConfig) -> Option<Admitted> {
        let invoice = match validate(raw, &config.base_url) {
            Ok(invoice) => invoice,
            Err(e) => {
                warn!("Rejected record {}: {}", raw, e);
                self.tracker.record_rejected();
                notify(config, |cb| cb.on_record_dropped(&e.to_string()));
                return None;
            }
        };

        if !self.processed.insert(invoice.id.clone()) {
            info!("Duplicate invoice {} ignored", invoice.id);
            self.tracker.record_duplicate();
            notify(config, |cb| cb.on_record_dropped("duplicate"));
            return None;
        }

        info!(
            "Invoice {} | due {} | today {}",
            invoice.id, invoice.due_date, self.today
        );

        if is_due(&invoice, self.today) {
            Some(Admitted::Due(invoice))
        } else {
            info!(
                "Invoice {} not due yet ({}), not downloading",
                invoice.id, invoice.due_date
            );
            Some(Admitted::NotDue(invoice))
        }
    }
}

/// Drive one admitted invoice to its terminal outcome.
async fn settle(
    admitted: Admitted,
    downloader: &Downloader,
    ledger: &Ledger,
    config: &HarvestConfig,
) -> (String, InvoiceOutcome) {
    let (invoice, outcome) = match admitted {
        Admitted::NotDue(invoice) => {
            notify(config, |cb| cb.on_invoice_start(&invoice.id));
            let outcome = InvoiceOutcome::SkippedNotDue {
                due_date: invoice.due_date,
            };
            (invoice, outcome)
        }
        Admitted::Due(invoice) => {
            notify(config, |cb| cb.on_invoice_start(&invoice.id));
            let outcome = download_and_record(&invoice, downloader, ledger).await;
            (invoice, outcome)
        }
    };

    notify(config, |cb| cb.on_invoice_complete(&invoice.id, &outcome));
    (invoice.id, outcome)
}

async fn download_and_record(
    invoice: &Invoice,
    downloader: &Downloader,
    ledger: &Ledger,
) -> InvoiceOutcome {
    let path = match downloader.download(invoice).await {
        Ok(path) => path,
        Err(e) => {
            return InvoiceOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    match ledger.append(&LedgerEntry::from(invoice)).await {
        Ok(()) => InvoiceOutcome::Downloaded { path },
        Err(e) => {
            error!("Invoice {}: ledger update failed: {}", invoice.id, e);
            InvoiceOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn build_client(config: &HarvestConfig) -> Result<reqwest::Client, HarvestError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| HarvestError::Internal(format!("Failed to build HTTP client: {}", e)))
}

fn notify(config: &HarvestConfig, f: impl FnOnce(&dyn HarvestProgressCallback)) {
    if let Some(ref cb) = config.progress_callback {
        f(cb.as_ref());
    }
}
