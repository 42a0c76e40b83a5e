//! Record validation: untyped listing rows → [`Invoice`].
//!
//! The listing service returns loosely shaped JSON objects. Nothing past this
//! module sees them: an [`Invoice`] can only be obtained from [`validate`].

use crate::config::join_url;
use crate::error::ValidationError;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;

/// Due-date format used by the listing (`DD-MM-YYYY`).
pub const DUE_DATE_FORMAT: &str = "%d-%m-%Y";

/// One row of the listing `data` array, exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub duedate: Option<Value>,
    #[serde(default)]
    pub invoice: Option<Value>,
}

impl RawRecord {
    /// Read a listing element. Anything that is not an object yields an
    /// empty record, which validation then rejects.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => Self::default(),
        }
    }
}

impl fmt::Display for RawRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| v.as_ref().map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        write!(
            f,
            "{{id: {}, duedate: {}, invoice: {}}}",
            show(&self.id),
            show(&self.duedate),
            show(&self.invoice)
        )
    }
}

/// A validated listing record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    pub due_date: NaiveDate,
    /// `duedate` as it appeared in the listing; written to the ledger.
    pub due_date_raw: String,
    pub url: String,
}

/// Validate a raw record against `base_url`.
pub fn validate(raw: &RawRecord, base_url: &str) -> Result<Invoice, ValidationError> {
    let id = text_field(&raw.id).ok_or(ValidationError::IncompleteRecord { field: "id" })?;
    let due = text_field(&raw.duedate).ok_or(ValidationError::IncompleteRecord { field: "duedate" })?;
    let path =
        text_field(&raw.invoice).ok_or(ValidationError::IncompleteRecord { field: "invoice" })?;

    if !is_safe_file_stem(&id) {
        return Err(ValidationError::InvalidId { id });
    }

    let due_date =
        NaiveDate::parse_from_str(&due, DUE_DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
            id: id.clone(),
            value: due.clone(),
        })?;

    Ok(Invoice {
        url: join_url(base_url, &path),
        id,
        due_date,
        due_date_raw: due,
    })
}

/// Non-empty text of a field. Numbers are accepted and rendered in decimal.
fn text_field(value: &Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// The id becomes `<id>.pdf` inside the output directory.
fn is_safe_file_stem(id: &str) -> bool {
    id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}
