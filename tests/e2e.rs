//! End-to-end tests for invoice-harvester.
//!
//! Every test stands up a `wiremock` server playing the invoice service
//! (listing + files) and runs a full harvest into a scratch directory.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use chrono::{Days, NaiveDate};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use invoice_harvester::{
    harvest_on, HarvestConfig, HarvestError, HarvestProgressCallback, InvoiceOutcome, RunSummary,
};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PDF_BODY: &[u8] = b"%PDF-1.4\n% test invoice\n%%EOF\n";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

fn fmt_date(d: NaiveDate) -> String {
    d.format("%d-%m-%Y").to_string()
}

fn png_body() -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 12, Rgba([255, 255, 0, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

struct Harness {
    server: MockServer,
    dir: TempDir,
}

impl Harness {
    async fn new(listing: Value) -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/seed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": listing })))
            .mount(&server)
            .await;
        Self {
            server,
            dir: TempDir::new().unwrap(),
        }
    }

    async fn serve(&self, file: &str, status: u16, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(file))
            .respond_with(ResponseTemplate::new(status).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    fn config(&self) -> HarvestConfig {
        HarvestConfig::builder()
            .base_url(self.server.uri())
            .output_dir(self.downloads())
            .ledger_path(self.ledger())
            .retry_backoff_ms(10)
            .build()
            .unwrap()
    }

    fn downloads(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    fn ledger(&self) -> PathBuf {
        self.dir.path().join("data").join("faturas.csv")
    }

    fn ledger_rows(&self) -> Vec<String> {
        read_rows(&self.ledger())
    }
}

fn read_rows(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_and_future_invoices() {
    let yesterday = fmt_date(today() - Days::new(1));
    let in_five_days = fmt_date(today() + Days::new(5));
    let h = Harness::new(json!([
        {"id": "A1", "duedate": yesterday, "invoice": "/x.pdf"},
        {"id": "A1", "duedate": yesterday, "invoice": "/x.pdf"},
        {"id": "B2", "duedate": in_five_days, "invoice": "/y.png"},
    ]))
    .await;

    Mock::given(method("GET"))
        .and(path("/x.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PDF_BODY.to_vec()))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/y.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_body()))
        .expect(0)
        .mount(&h.server)
        .await;

    let summary = harvest_on(&h.config(), today()).await.unwrap();

    assert_eq!(summary.downloaded_ids(), vec!["A1"]);
    assert_eq!(summary.skipped_ids(), vec!["B2"]);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.duplicates, 1);

    let base = h.server.uri();
    assert_eq!(
        h.ledger_rows(),
        vec![format!("A1,{yesterday},{base}/x.pdf")]
    );
    assert_eq!(
        std::fs::read(h.downloads().join("A1.pdf")).unwrap(),
        PDF_BODY
    );
    assert!(!h.downloads().join("B2.pdf").exists());
}

#[tokio::test]
async fn due_today_is_downloaded_tomorrow_is_not() {
    let h = Harness::new(json!([
        {"id": "TODAY", "duedate": fmt_date(today()), "invoice": "/t.pdf"},
        {"id": "TOMORROW", "duedate": fmt_date(today() + Days::new(1)), "invoice": "/m.pdf"},
    ]))
    .await;
    h.serve("/t.pdf", 200, PDF_BODY.to_vec()).await;
    h.serve("/m.pdf", 200, PDF_BODY.to_vec()).await;

    let summary = harvest_on(&h.config(), today()).await.unwrap();

    assert_eq!(summary.downloaded_ids(), vec!["TODAY"]);
    assert_eq!(summary.skipped_ids(), vec!["TOMORROW"]);
    assert_eq!(
        summary.skipped[0].due_date,
        today() + Days::new(1)
    );
}

#[tokio::test]
async fn png_invoice_is_stored_as_pdf() {
    let h = Harness::new(json!([
        {"id": "IMG", "duedate": fmt_date(today()), "invoice": "/scans/img.png"},
    ]))
    .await;
    h.serve("/scans/img.png", 200, png_body()).await;

    let summary = harvest_on(&h.config(), today()).await.unwrap();

    let saved = &summary.downloaded[0].path;
    assert_eq!(saved, &h.downloads().join("IMG.pdf"));
    let doc = lopdf::Document::load(saved).expect("stored file is a PDF");
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn transient_failures_within_budget_still_download() {
    let h = Harness::new(json!([
        {"id": "R", "duedate": fmt_date(today()), "invoice": "/r.pdf"},
    ]))
    .await;
    Mock::given(method("GET"))
        .and(path("/r.pdf"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&h.server)
        .await;
    h.serve("/r.pdf", 200, PDF_BODY.to_vec()).await;

    let summary = harvest_on(&h.config(), today()).await.unwrap();

    assert_eq!(summary.downloaded_ids(), vec!["R"]);
    assert_eq!(h.ledger_rows().len(), 1);
}

#[tokio::test]
async fn exhausted_retries_fail_without_ledger_row() {
    let h = Harness::new(json!([
        {"id": "X", "duedate": fmt_date(today()), "invoice": "/x.pdf"},
        {"id": "OK", "duedate": fmt_date(today()), "invoice": "/ok.pdf"},
    ]))
    .await;
    Mock::given(method("GET"))
        .and(path("/x.pdf"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&h.server)
        .await;
    h.serve("/ok.pdf", 200, PDF_BODY.to_vec()).await;

    let summary = harvest_on(&h.config(), today()).await.unwrap();

    assert_eq!(summary.failed_ids(), vec!["X"]);
    assert_eq!(summary.downloaded_ids(), vec!["OK"]);
    let rows = h.ledger_rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("OK,"));
    assert!(!h.downloads().join("X.pdf").exists());
}

#[tokio::test]
async fn invalid_records_are_excluded_from_buckets() {
    let h = Harness::new(json!([
        {"id": "NODATE", "invoice": "/a.pdf"},
        {"id": "BADDATE", "duedate": "2024/06/01", "invoice": "/a.pdf"},
        "garbage",
        {"id": "GOOD", "duedate": fmt_date(today()), "invoice": "/a.pdf"},
    ]))
    .await;
    h.serve("/a.pdf", 200, PDF_BODY.to_vec()).await;

    let summary = harvest_on(&h.config(), today()).await.unwrap();

    assert_eq!(summary.rejected, 3);
    assert_eq!(summary.total_invoices(), 1);
    assert_eq!(summary.downloaded_ids(), vec!["GOOD"]);
}

#[tokio::test]
async fn rerun_appends_without_rewriting() {
    let h = Harness::new(json!([
        {"id": "A1", "duedate": fmt_date(today()), "invoice": "/a.pdf"},
    ]))
    .await;
    h.serve("/a.pdf", 200, PDF_BODY.to_vec()).await;

    harvest_on(&h.config(), today()).await.unwrap();
    let first = std::fs::read_to_string(h.ledger()).unwrap();
    harvest_on(&h.config(), today()).await.unwrap();
    let second = std::fs::read_to_string(h.ledger()).unwrap();

    // No cross-run dedup: the second run appends the same invoice again.
    assert!(second.starts_with(&first));
    assert_eq!(h.ledger_rows().len(), 2);
    assert_eq!(second.matches("ID_Fatura").count(), 1);
}

#[tokio::test]
async fn listing_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/seed"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let config = HarvestConfig::builder()
        .base_url(server.uri())
        .output_dir(dir.path().join("downloads"))
        .ledger_path(dir.path().join("faturas.csv"))
        .build()
        .unwrap();

    let err = harvest_on(&config, today()).await.unwrap_err();
    assert!(matches!(err, HarvestError::SourceStatus { status: 503, .. }));
}

#[tokio::test]
async fn concurrent_run_keeps_listing_order() {
    let listing: Vec<Value> = (0..6)
        .map(|i| json!({"id": format!("C{i}"), "duedate": fmt_date(today()), "invoice": format!("/c{i}.pdf")}))
        .collect();
    let h = Harness::new(Value::Array(listing)).await;
    for i in 0..6 {
        h.serve(&format!("/c{i}.pdf"), 200, PDF_BODY.to_vec()).await;
    }

    let config = HarvestConfig::builder()
        .base_url(h.server.uri())
        .output_dir(h.downloads())
        .ledger_path(h.ledger())
        .concurrency(3)
        .build()
        .unwrap();
    let summary = harvest_on(&config, today()).await.unwrap();

    assert_eq!(
        summary.downloaded_ids(),
        vec!["C0", "C1", "C2", "C3", "C4", "C5"]
    );
    assert_eq!(h.ledger_rows().len(), 6);
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl HarvestProgressCallback for Recorder {
    fn on_run_start(&self, total_records: usize) {
        self.events.lock().unwrap().push(format!("start {total_records}"));
    }

    fn on_record_dropped(&self, reason: &str) {
        self.events.lock().unwrap().push(format!("drop {reason}"));
    }

    fn on_invoice_complete(&self, id: &str, outcome: &InvoiceOutcome) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{id} {}", outcome.label()));
    }

    fn on_run_complete(&self, summary: &RunSummary) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {}", summary.total_invoices()));
    }
}

#[tokio::test]
async fn progress_callback_sees_every_record() {
    let h = Harness::new(json!([
        {"id": "A", "duedate": fmt_date(today()), "invoice": "/a.pdf"},
        {"id": "A", "duedate": fmt_date(today()), "invoice": "/a.pdf"},
        {"id": "F", "duedate": fmt_date(today() + Days::new(30)), "invoice": "/f.pdf"},
    ]))
    .await;
    h.serve("/a.pdf", 200, PDF_BODY.to_vec()).await;

    let recorder = Arc::new(Recorder::default());
    let config = HarvestConfig::builder()
        .base_url(h.server.uri())
        .output_dir(h.downloads())
        .ledger_path(h.ledger())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    harvest_on(&config, today()).await.unwrap();

    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "start 3",
            "A downloaded",
            "drop duplicate",
            "F skipped",
            "done 2",
        ]
    );
}

/// Removes the ledger's directory as soon as the first invoice starts.
struct LedgerRemover {
    ledger_dir: PathBuf,
}

impl HarvestProgressCallback for LedgerRemover {
    fn on_invoice_start(&self, _id: &str) {
        let _ = std::fs::remove_dir_all(&self.ledger_dir);
    }
}

#[tokio::test]
async fn ledger_failure_after_download_is_reported_failed() {
    let h = Harness::new(json!([
        {"id": "A", "duedate": fmt_date(today()), "invoice": "/a.pdf"},
    ]))
    .await;
    h.serve("/a.pdf", 200, PDF_BODY.to_vec()).await;

    let ledger_dir = h.ledger().parent().unwrap().to_path_buf();
    let config = HarvestConfig::builder()
        .base_url(h.server.uri())
        .output_dir(h.downloads())
        .ledger_path(h.ledger())
        .retry_backoff_ms(10)
        .progress_callback(Arc::new(LedgerRemover { ledger_dir }))
        .build()
        .unwrap();

    let summary = harvest_on(&config, today()).await.unwrap();

    assert!(summary.downloaded.is_empty());
    assert_eq!(summary.failed_ids(), vec!["A"]);
    assert!(summary.failed[0].reason.contains("faturas.csv"));
    assert!(h.downloads().join("A.pdf").exists());
    assert!(!h.ledger().exists());
}
