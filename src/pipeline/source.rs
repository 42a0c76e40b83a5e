//! Invoice listing: one POST to the seed endpoint.
//!
//! The service behind the listing is a browser-facing endpoint, so the
//! request imitates the XHR a page would send: an empty urlencoded form with
//! `Origin`, `Referer` and `X-Requested-With` set. Any failure here is fatal
//! for the run; there is nothing to process without a listing.

use super::validate::RawRecord;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

/// Fetch and unwrap the listing's `data` array.
pub async fn fetch_listing(
    client: &Client,
    config: &HarvestConfig,
) -> Result<Vec<RawRecord>, HarvestError> {
    let url = config.seed_url();
    info!("Fetching invoice listing from: {}", url);

    let response = client
        .post(&url)
        .headers(listing_headers(config)?)
        .body("")
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                HarvestError::SourceTimeout {
                    url: url.clone(),
                    secs: config.request_timeout_secs,
                }
            } else {
                HarvestError::SourceUnavailable {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

    if !response.status().is_success() {
        return Err(HarvestError::SourceStatus {
            url,
            status: response.status().as_u16(),
        });
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| HarvestError::MalformedListing {
            url: url.clone(),
            detail: e.to_string(),
        })?;

    let records = parse_listing(body).map_err(|detail| HarvestError::MalformedListing {
        url: url.clone(),
        detail,
    })?;

    info!("Listing returned {} records", records.len());
    Ok(records)
}

/// Extract `data` from a listing body. A missing key means no records.
pub fn parse_listing(body: Value) -> Result<Vec<RawRecord>, String> {
    let data = match body {
        Value::Object(mut map) => map.remove("data"),
        other => return Err(format!("expected a JSON object, got {}", json_kind(&other))),
    };

    match data {
        None | Some(Value::Null) => {
            debug!("Listing has no 'data' key");
            Ok(Vec::new())
        }
        Some(Value::Array(items)) => Ok(items.into_iter().map(RawRecord::from_value).collect()),
        Some(other) => Err(format!("'data' must be an array, got {}", json_kind(&other))),
    }
}

fn listing_headers(config: &HarvestConfig) -> Result<HeaderMap, HarvestError> {
    let value = |s: &str| {
        HeaderValue::from_str(s)
            .map_err(|e| HarvestError::InvalidConfig(format!("bad header value '{s}': {e}")))
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
    );
    headers.insert(ORIGIN, value(&config.base_url)?);
    headers.insert(REFERER, value(&format!("{}/", config.base_url))?);
    headers.insert(USER_AGENT, value(&config.user_agent)?);
    headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
    Ok(headers)
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
