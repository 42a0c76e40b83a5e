//! CLI binary for invoice-harvester.
//!
//! A thin shim over the library crate: maps CLI flags to `HarvestConfig`,
//! sets up the per-run log file and progress bar, and prints the summary.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use invoice_harvester::{
    harvest_on, HarvestConfig, HarvestProgressCallback, InvoiceOutcome, ProgressCallback,
    RunSummary, DEFAULT_BASE_URL,
};
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over listing records plus a line per
/// finished invoice.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Listing");
        bar.set_message("Fetching invoices…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl HarvestProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_records: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} records  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_records as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Harvesting");
    }

    fn on_record_dropped(&self, _reason: &str) {
        self.bar.inc(1);
    }

    fn on_invoice_start(&self, id: &str) {
        self.bar.set_message(id.to_string());
    }

    fn on_invoice_complete(&self, id: &str, outcome: &InvoiceOutcome) {
        let line = match outcome {
            InvoiceOutcome::Downloaded { path } => format!(
                "  {} {:<12} {}",
                green("✓"),
                id,
                dim(&path.display().to_string())
            ),
            InvoiceOutcome::SkippedNotDue { due_date } => format!(
                "  {} {:<12} {}",
                cyan("⏭"),
                id,
                dim(&format!("due {}", due_date.format("%d-%m-%Y")))
            ),
            InvoiceOutcome::Failed { reason } => {
                let msg = if reason.chars().count() > 80 {
                    format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
                } else {
                    reason.clone()
                };
                format!("  {} {:<12} {}", red("✗"), id, red(&msg))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _summary: &RunSummary) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Harvest from the default service into ./downloads and ./data/faturas.csv
  harvest

  # Different locations
  harvest --output-dir /srv/invoices --ledger /srv/invoices/ledger.csv

  # Pretend it is another day
  harvest --today 31-12-2024

  # Machine-readable summary
  harvest --json > summary.json

FILES:
  <output-dir>/<id>.pdf           one file per downloaded invoice (images are converted)
  <ledger>                        CSV "ID_Fatura,Due_Date,URL_Fatura", appended per download
  <logs-dir>/log_<timestamp>.txt  full log of the run

EXIT STATUS:
  0  run completed (individual invoices may still have failed; see the summary)
  1  run could not start (listing unavailable, ledger or directories not writable)
"#;

/// Download due invoices and record them in a CSV ledger.
#[derive(Parser, Debug)]
#[command(
    name = "harvest",
    version,
    about = "Download due invoices as PDFs and record them in a CSV ledger",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Scheme and host of the invoice service.
    #[arg(long, env = "HARVEST_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Path of the listing endpoint.
    #[arg(long, env = "HARVEST_SEED_PATH", default_value = "/seed")]
    seed_path: String,

    /// Directory receiving the downloaded PDFs.
    #[arg(short, long, env = "HARVEST_OUTPUT_DIR", default_value = "downloads")]
    output_dir: PathBuf,

    /// CSV ledger of downloaded invoices.
    #[arg(long, env = "HARVEST_LEDGER", default_value = "data/faturas.csv")]
    ledger: PathBuf,

    /// Directory receiving one log file per run.
    #[arg(long, env = "HARVEST_LOGS_DIR", default_value = "logs")]
    logs_dir: PathBuf,

    /// Attempts per invoice download.
    #[arg(long, env = "HARVEST_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Pause between attempts, in milliseconds.
    #[arg(long, env = "HARVEST_RETRY_BACKOFF_MS", default_value_t = 1000)]
    retry_backoff_ms: u64,

    /// Timeout for every HTTP request, in seconds.
    #[arg(long, env = "HARVEST_TIMEOUT", default_value_t = 10,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Downloads in flight at once.
    #[arg(short, long, env = "HARVEST_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// User-Agent sent with the listing request.
    #[arg(long, env = "HARVEST_USER_AGENT", default_value = "Mozilla/5.0")]
    user_agent: String,

    /// Treat this date (DD-MM-YYYY) as today.
    #[arg(long, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "HARVEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HARVEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HARVEST_VERBOSE")]
    verbose: bool,

    /// Suppress all terminal output except errors.
    #[arg(short, long, env = "HARVEST_QUIET")]
    quiet: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%d-%m-%Y").map_err(|e| format!("expected DD-MM-YYYY: {e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The terminal gets errors only while the progress bar is drawn; the run
    // log always receives everything at INFO and above.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    let log_path = open_run_log(&cli.logs_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let file_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer().with_writer(io::stderr).with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
            ),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(log_file))
                .with_filter(file_level),
        )
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn HarvestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = match harvest_on(&config, today).await {
        Ok(summary) => summary,
        Err(e) => {
            error!("Harvest aborted: {}", e);
            return Err(e).context("Harvest could not start");
        }
    };
    tracing::info!("Log saved to {}", log_path.display());

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary, &config, &log_path);
    }

    Ok(())
}

/// Map CLI args to `HarvestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<HarvestConfig> {
    let mut builder = HarvestConfig::builder()
        .base_url(cli.base_url.clone())
        .seed_path(cli.seed_path.clone())
        .output_dir(cli.output_dir.clone())
        .ledger_path(cli.ledger.clone())
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .request_timeout_secs(cli.timeout)
        .concurrency(cli.concurrency)
        .user_agent(cli.user_agent.clone());

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Create the logs directory and pick this run's log file name.
fn open_run_log(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;
    Ok(dir.join(format!("log_{}.txt", Local::now().format("%Y%m%d_%H%M%S"))))
}

fn print_summary(summary: &RunSummary, config: &HarvestConfig, log_path: &Path) {
    let mark = if summary.failed.is_empty() {
        green("✔")
    } else {
        cyan("⚠")
    };
    eprintln!(
        "{} {} downloaded  {} skipped  {} failed  {}",
        mark,
        bold(&summary.downloaded.len().to_string()),
        summary.skipped.len(),
        if summary.failed.is_empty() {
            "0".to_string()
        } else {
            red(&summary.failed.len().to_string())
        },
        dim(&format!("{}ms", summary.duration_ms)),
    );
    for f in &summary.failed {
        eprintln!("   {} {}: {}", red("✗"), f.id, f.reason);
    }
    eprintln!(
        "   files → {}   ledger → {}   log → {}",
        bold(&config.output_dir.display().to_string()),
        bold(&config.ledger_path.display().to_string()),
        dim(&log_path.display().to_string()),
    );
}
