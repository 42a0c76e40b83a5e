//! Due-date filter.

use super::validate::Invoice;
use chrono::NaiveDate;

/// An invoice is due on and after its due date.
pub fn is_due(invoice: &Invoice, today: NaiveDate) -> bool {
    invoice.due_date <= today
}
