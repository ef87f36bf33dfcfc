use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::Ticker;

/// Why a single quote request produced no usable price
///
/// Every variant is recoverable: the refresher absorbs all of them by falling
/// back to the best known price.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteFailure {
    #[error("Provider rate limit advisory: {0}")]
    RateLimited(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("No price data in provider response")]
    NoData,

    #[error("Invalid price value: {0:?}")]
    InvalidPrice(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl QuoteFailure {
    /// Short stable label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            QuoteFailure::RateLimited(_) => "rate_limited",
            QuoteFailure::ProviderError(_) => "provider_error",
            QuoteFailure::NoData => "no_data",
            QuoteFailure::InvalidPrice(_) => "invalid_price",
            QuoteFailure::Transport(_) => "transport",
        }
    }
}

/// Parse a provider decimal string into a strictly positive finite price
pub fn parse_price(raw: &str) -> Result<f64, QuoteFailure> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(QuoteFailure::InvalidPrice(raw.to_string())),
    }
}

/// One daily close as returned by the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DailyClose {
    pub date: String,
    pub close: f64,
}

impl DailyClose {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

/// Validated daily close series, in provider order
///
/// Provider order is not guaranteed to be chronological; use
/// [`DailySeries::chronological`] when order matters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailySeries {
    entries: Vec<(String, f64)>,
}

impl DailySeries {
    /// Build from `(date, raw close)` pairs, rejecting the whole series if any
    /// close is not a positive number
    pub fn from_raw<I, D, C>(raw: I) -> Result<Self, QuoteFailure>
    where
        I: IntoIterator<Item = (D, C)>,
        D: Into<String>,
        C: AsRef<str>,
    {
        let entries = raw
            .into_iter()
            .map(|(date, close)| Ok((date.into(), parse_price(close.as_ref())?)))
            .collect::<Result<Vec<_>, QuoteFailure>>()?;
        Ok(Self { entries })
    }

    /// Fresh iterator over the series; may be called repeatedly
    pub fn iter(&self) -> impl Iterator<Item = DailyClose> + '_ {
        self.entries.iter().map(|(date, close)| DailyClose {
            date: date.clone(),
            close: *close,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first; entries with unparseable dates sort ahead of dated ones
    pub fn chronological(&self) -> Vec<DailyClose> {
        let mut closes: Vec<DailyClose> = self.iter().collect();
        closes.sort_by_key(|c| c.parsed_date());
        closes
    }
}

/// Single-attempt quote source
///
/// Implementations never retry; retry and fallback policy belongs to the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotePort: Send + Sync {
    /// Current price for `ticker`, guaranteed > 0 on success
    async fn fetch_price(&self, ticker: &Ticker) -> Result<f64, QuoteFailure>;

    /// Daily close history for `ticker`
    async fn fetch_daily(&self, ticker: &Ticker) -> Result<DailySeries, QuoteFailure>;
}
