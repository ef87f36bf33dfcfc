//! Alpha Vantage Response Classification
//!
//! The provider answers HTTP 200 for most failures and signals them through
//! top-level keys instead, so a body has to be classified before any price in
//! it can be trusted. Precedence: rate-limit advisory, error message, missing
//! data, unparseable price.

use serde_json::{Map, Value};

use crate::ports::{parse_price, DailySeries, QuoteFailure};

pub const NOTE_KEY: &str = "Note";
pub const INFORMATION_KEY: &str = "Information";
pub const ERROR_MESSAGE_KEY: &str = "Error Message";
pub const GLOBAL_QUOTE_KEY: &str = "Global Quote";
pub const PRICE_KEY: &str = "05. price";
pub const DAILY_SERIES_KEY: &str = "Time Series (Daily)";
pub const CLOSE_KEY: &str = "4. close";

/// Reject bodies carrying a rate-limit advisory or an error message
fn check_advisories(body: &Value) -> Result<(), QuoteFailure> {
    for key in [NOTE_KEY, INFORMATION_KEY] {
        if let Some(note) = body.get(key) {
            return Err(QuoteFailure::RateLimited(value_text(note)));
        }
    }

    if let Some(message) = body.get(ERROR_MESSAGE_KEY) {
        return Err(QuoteFailure::ProviderError(value_text(message)));
    }

    Ok(())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Raw price text, or `None` when the field is absent or blank
fn price_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Classify a `GLOBAL_QUOTE` body into a price or a failure
pub fn classify_global_quote(body: &Value) -> Result<f64, QuoteFailure> {
    check_advisories(body)?;

    let raw = price_text(body.get(GLOBAL_QUOTE_KEY).and_then(|q| q.get(PRICE_KEY)))
        .ok_or(QuoteFailure::NoData)?;

    parse_price(&raw)
}

/// Classify a `TIME_SERIES_DAILY` body into a validated series or a failure
pub fn classify_daily_series(body: &Value) -> Result<DailySeries, QuoteFailure> {
    check_advisories(body)?;

    let series: &Map<String, Value> = body
        .get(DAILY_SERIES_KEY)
        .and_then(Value::as_object)
        .ok_or(QuoteFailure::NoData)?;

    let raw = series
        .iter()
        .map(|(date, bar)| {
            let close = price_text(bar.get(CLOSE_KEY)).unwrap_or_default();
            (date.clone(), close)
        })
        .collect::<Vec<_>>();

    DailySeries::from_raw(raw)
}
