//! Append-only CSV ledger of downloaded invoices.
//!
//! The ledger outlives runs. Opening it never rewrites existing rows: the
//! header is written only when the file does not exist yet, and every later
//! write is an append of one complete row.
//!
//! Rows are not deduplicated against earlier runs. If the listing keeps
//! returning an invoice, every run that downloads it appends another row.

use crate::error::{HarvestError, LedgerError};
use crate::pipeline::validate::Invoice;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Column names of the ledger file.
pub const LEDGER_HEADER: [&str; 3] = ["ID_Fatura", "Due_Date", "URL_Fatura"];

/// One ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub id: String,
    pub due_date: String,
    pub url: String,
}

impl From<&Invoice> for LedgerEntry {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id.clone(),
            due_date: invoice.due_date_raw.clone(),
            url: invoice.url.clone(),
        }
    }
}

impl LedgerEntry {
    fn to_row(&self) -> io::Result<Vec<u8>> {
        csv_row([&self.id, &self.due_date, &self.url])
    }
}

/// Handle on the ledger file. Appends are serialised.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Ledger {
    /// Open the ledger, creating it (and its directory) with a header if absent.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HarvestError> {
        let path = path.as_ref().to_path_buf();
        let init_err = |source| HarvestError::LedgerInit {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(init_err)?;
        }

        // create_new fails if another writer got there first; the existing
        // file is then kept as-is.
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                let header = csv_row(LEDGER_HEADER).map_err(init_err)?;
                file.write_all(&header).await.map_err(init_err)?;
                file.flush().await.map_err(init_err)?;
                info!("Created ledger {}", path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Using existing ledger {}", path.display());
            }
            Err(e) => return Err(init_err(e)),
        }

        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row with a single write.
    pub async fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let write_err = |source| LedgerError::Write {
            path: self.path.clone(),
            source,
        };

        let row = entry.to_row().map_err(write_err)?;

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .map_err(write_err)?;
        file.write_all(&row).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;
        debug!("Ledger row appended for {}", entry.id);
        Ok(())
    }
}

/// Render fields as one CRLF-terminated CSV row.
fn csv_row<I, T>(fields: I) -> io::Result<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    writer.write_record(fields)?;
    writer.into_inner().map_err(|e| e.into_error())
}
