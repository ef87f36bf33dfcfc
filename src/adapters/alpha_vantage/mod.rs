//! Alpha Vantage Adapter
//!
//! Implementation of the QuotePort for the Alpha Vantage quote endpoint.
//! Handles request building, response classification, and transport failures.

mod client;
mod response;

pub use client::{
    AlphaVantageConfig, ClientError, QuoteClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT,
    FUNCTION_GLOBAL_QUOTE, FUNCTION_TIME_SERIES_DAILY,
};
pub use response::{classify_daily_series, classify_global_quote};
