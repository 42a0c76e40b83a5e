//! Configuration types for an invoice harvest run.
//!
//! Everything a run needs is carried by [`HarvestConfig`], built through
//! [`HarvestConfigBuilder`]. Defaults point at the public RPA challenge
//! service and reproduce its fixed retry policy (3 attempts, 1 s apart,
//! 10 s per request).

use crate::error::HarvestError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Default listing/download host.
pub const DEFAULT_BASE_URL: &str = "https://rpachallengeocr.azurewebsites.net";

/// Configuration for one harvest run.
///
/// # Example
/// ```rust
/// use invoice_harvester::HarvestConfig;
///
/// let config = HarvestConfig::builder()
///     .base_url("http://localhost:8080")
///     .output_dir("/tmp/invoices")
///     .max_retries(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.seed_url(), "http://localhost:8080/seed");
/// ```
#[derive(Clone)]
pub struct HarvestConfig {
    /// Scheme and host of the invoice service, without trailing slash.
    pub base_url: String,

    /// Path of the listing endpoint. Default: `/seed`.
    pub seed_path: String,

    /// Directory receiving `<id>.pdf` files. Default: `downloads`.
    pub output_dir: PathBuf,

    /// CSV ledger of downloaded invoices. Default: `data/faturas.csv`.
    pub ledger_path: PathBuf,

    /// Attempts per invoice download, including the first. Default: 3.
    pub max_retries: u32,

    /// Fixed pause between attempts in milliseconds. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Timeout applied to every HTTP call. Default: 10.
    pub request_timeout_secs: u64,

    /// `User-Agent` sent with the listing call. Default: `Mozilla/5.0`.
    pub user_agent: String,

    /// Downloads in flight at once. Default: 1 (strictly sequential).
    pub concurrency: usize,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            seed_path: "/seed".to_string(),
            output_dir: PathBuf::from("downloads"),
            ledger_path: PathBuf::from("data").join("faturas.csv"),
            max_retries: 3,
            retry_backoff_ms: 1000,
            request_timeout_secs: 10,
            user_agent: "Mozilla/5.0".to_string(),
            concurrency: 1,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for HarvestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfig")
            .field("base_url", &self.base_url)
            .field("seed_path", &self.seed_path)
            .field("output_dir", &self.output_dir)
            .field("ledger_path", &self.ledger_path)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("concurrency", &self.concurrency)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn HarvestProgressCallback>"),
            )
            .finish()
    }
}

impl HarvestConfig {
    /// Create a new builder for `HarvestConfig`.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full URL of the listing endpoint.
    pub fn seed_url(&self) -> String {
        join_url(&self.base_url, &self.seed_path)
    }
}

/// Concatenate the service base with a server-relative path.
///
/// Exactly one `/` separates the two parts.
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Builder for [`HarvestConfig`].
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl fmt::Debug for HarvestConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarvestConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl HarvestConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn seed_path(mut self, path: impl Into<String>) -> Self {
        self.config.seed_path = path.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ledger_path = path.into();
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<HarvestConfig, HarvestError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(HarvestError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.max_retries == 0 {
            return Err(HarvestError::InvalidConfig(
                "max_retries must be ≥ 1".into(),
            ));
        }
        if c.request_timeout_secs == 0 {
            return Err(HarvestError::InvalidConfig(
                "request timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}
