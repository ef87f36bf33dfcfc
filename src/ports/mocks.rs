use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;

use crate::domain::Ticker;
use super::quotes::{DailySeries, QuoteFailure, QuotePort};

/// Scripted quote source that records calls and replays configured responses
///
/// Responses queued with `push_price` are consumed one per call; once a
/// ticker's queue is empty its sticky `with_price` response is used, and
/// a ticker with neither answers `NoData`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedQuotes {
    calls: Arc<Mutex<Vec<String>>>,
    sticky: Arc<Mutex<HashMap<String, Result<f64, QuoteFailure>>>>,
    queued: Arc<Mutex<HashMap<String, VecDeque<Result<f64, QuoteFailure>>>>>,
    daily: Arc<Mutex<HashMap<String, DailySeries>>>,
    latency: Duration,
}

impl ScriptedQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to answer every call for `ticker` with `response`
    pub fn with_price(self, ticker: &str, response: Result<f64, QuoteFailure>) -> Self {
        self.sticky.lock().unwrap().insert(ticker.to_string(), response);
        self
    }

    /// Builder method to set the daily series for `ticker`
    pub fn with_daily(self, ticker: &str, series: DailySeries) -> Self {
        self.daily.lock().unwrap().insert(ticker.to_string(), series);
        self
    }

    /// Builder method to delay every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue a one-shot response for the next call on `ticker`
    pub fn push_price(&self, ticker: &str, response: Result<f64, QuoteFailure>) {
        self.queued
            .lock()
            .unwrap()
            .entry(ticker.to_string())
            .or_default()
            .push_back(response);
    }

    /// Get all recorded calls, in call order
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next_price(&self, ticker: &str) -> Result<f64, QuoteFailure> {
        let queued = self
            .queued
            .lock()
            .unwrap()
            .get_mut(ticker)
            .and_then(|q| q.pop_front());

        queued.unwrap_or_else(|| {
            self.sticky
                .lock()
                .unwrap()
                .get(ticker)
                .cloned()
                .unwrap_or(Err(QuoteFailure::NoData))
        })
    }
}

#[async_trait]
impl QuotePort for ScriptedQuotes {
    async fn fetch_price(&self, ticker: &Ticker) -> Result<f64, QuoteFailure> {
        self.calls.lock().unwrap().push(ticker.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.next_price(ticker.as_str())
    }

    async fn fetch_daily(&self, ticker: &Ticker) -> Result<DailySeries, QuoteFailure> {
        self.calls.lock().unwrap().push(ticker.to_string());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.daily
            .lock()
            .unwrap()
            .get(ticker.as_str())
            .cloned()
            .ok_or(QuoteFailure::NoData)
    }
}
