//! Invoice download: bounded retries, then normalise and save.
//!
//! ## Retry Strategy
//!
//! Each attempt is a plain GET with the client's request timeout. Transport
//! failures (connect errors, timeouts, non-2xx statuses, truncated bodies)
//! are retried after a fixed pause until `max_retries` attempts have been
//! made. Local failures after the body arrived (undecodable image, unwritable
//! directory) are not retried: a second copy of the same bytes would fail the
//! same way.
//!
//! ## Atomic save
//!
//! The normalised PDF is written to a temp file inside the output directory
//! and renamed onto `<id>.pdf` only once complete, so a failed save never
//! leaves a truncated file at the final path.

use super::normalize::{normalize, PayloadKind};
use super::validate::Invoice;
use crate::config::HarvestConfig;
use crate::error::{AttemptError, DownloadError};
use reqwest::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

/// Fetches invoice files and stores them as PDFs.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
    output_dir: PathBuf,
    max_retries: u32,
    backoff: Duration,
}

impl Downloader {
    pub fn new(client: Client, config: &HarvestConfig) -> Self {
        Self {
            client,
            output_dir: config.output_dir.clone(),
            max_retries: config.max_retries.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Where the file for `id` ends up.
    pub fn destination(&self, id: &str) -> PathBuf {
        self.output_dir.join(format!("{id}.pdf"))
    }

    /// Download `invoice` and return the saved file path.
    pub async fn download(&self, invoice: &Invoice) -> Result<PathBuf, DownloadError> {
        let dest = self.destination(&invoice.id);
        let kind = PayloadKind::from_url(&invoice.url);
        let mut last_error = String::new();

        for attempt in 1..=self.max_retries {
            let result = match self.fetch(&invoice.url).await {
                Ok(body) => self.persist(kind, body, &dest).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => {
                    info!("Invoice {} saved as {}", invoice.id, dest.display());
                    return Ok(dest);
                }
                Err(AttemptError::Persistence(detail)) => {
                    error!("Invoice {}: cannot save file: {}", invoice.id, detail);
                    return Err(DownloadError::Persistence {
                        id: invoice.id.clone(),
                        detail,
                    });
                }
                Err(AttemptError::Transient(detail)) => {
                    warn!(
                        "Invoice {}: attempt {}/{} failed (network): {}",
                        invoice.id, attempt, self.max_retries, detail
                    );
                    last_error = detail;
                    if attempt < self.max_retries {
                        sleep(self.backoff).await;
                    }
                }
            }
        }

        error!(
            "Invoice {}: could not be downloaded after {} attempts",
            invoice.id, self.max_retries
        );
        Err(DownloadError::RetriesExhausted {
            id: invoice.id.clone(),
            attempts: self.max_retries,
            last_error,
        })
    }

    /// One GET. Every failure here is transient.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AttemptError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(describe(&e)))?;

        if !response.status().is_success() {
            return Err(AttemptError::Transient(format!("HTTP {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AttemptError::Transient(describe(&e)))?;
        Ok(bytes.to_vec())
    }

    /// Normalise and write on the blocking pool; image decoding is CPU-bound.
    async fn persist(&self, kind: PayloadKind, body: Vec<u8>, dest: &Path) -> Result<(), AttemptError> {
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let pdf = normalize(kind, &body).map_err(|e| AttemptError::Persistence(e.to_string()))?;
            write_atomic(&dest, &pdf).map_err(|e| {
                AttemptError::Persistence(format!("writing '{}': {}", dest.display(), e))
            })
        })
        .await
        .map_err(|e| AttemptError::Persistence(format!("save task panicked: {e}")))?
    }
}

/// Write `bytes` to a temp file next to `dest`, then rename it into place.
fn write_atomic(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else {
        e.to_string()
    }
}
