//! Alpha Vantage API Client
//!
//! HTTP client for the Alpha Vantage query endpoint. One request per call,
//! bounded by a timeout, no retries; pacing is the task queue's job.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::domain::Ticker;
use crate::ports::{DailySeries, QuoteFailure, QuotePort};
use super::response::{classify_daily_series, classify_global_quote};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Provider function names
pub const FUNCTION_GLOBAL_QUOTE: &str = "GLOBAL_QUOTE";
pub const FUNCTION_TIME_SERIES_DAILY: &str = "TIME_SERIES_DAILY";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to create HTTP client: {0}")]
    Build(#[from] reqwest::Error),
    #[error("API key must not be empty")]
    EmptyApiKey,
}

/// Alpha Vantage client configuration
#[derive(Debug, Clone)]
pub struct AlphaVantageConfig {
    /// Query endpoint URL
    pub base_url: String,
    /// Credential sent as `apikey`
    pub api_key: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl AlphaVantageConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Quote client for the Alpha Vantage provider
#[derive(Debug, Clone)]
pub struct QuoteClient {
    config: AlphaVantageConfig,
    http: Client,
}

impl QuoteClient {
    pub fn new(config: AlphaVantageConfig) -> Result<Self, ClientError> {
        if config.api_key.trim().is_empty() {
            return Err(ClientError::EmptyApiKey);
        }

        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Query parameters for one call; `outputsize` only applies to series
    fn query_params<'a>(&'a self, function: &'a str, ticker: &'a Ticker) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![
            ("function", function),
            ("symbol", ticker.as_str()),
            ("apikey", self.config.api_key.as_str()),
        ];
        if function == FUNCTION_TIME_SERIES_DAILY {
            params.push(("outputsize", "compact"));
        }
        params
    }

    /// Issue one GET and decode the body as JSON
    async fn query(&self, function: &str, ticker: &Ticker) -> Result<Value, QuoteFailure> {
        tracing::debug!("GET {} function={} symbol={}", self.config.base_url, function, ticker);

        let response = self
            .http
            .get(&self.config.base_url)
            .query(&self.query_params(function, ticker))
            .send()
            .await
            .map_err(transport_failure)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuoteFailure::Transport(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| QuoteFailure::Transport(format!("Failed to decode response: {}", e)))
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

fn transport_failure(err: reqwest::Error) -> QuoteFailure {
    if err.is_timeout() {
        QuoteFailure::Transport(format!("request timed out: {}", err))
    } else {
        QuoteFailure::Transport(err.to_string())
    }
}

#[async_trait]
impl QuotePort for QuoteClient {
    async fn fetch_price(&self, ticker: &Ticker) -> Result<f64, QuoteFailure> {
        let body = self.query(FUNCTION_GLOBAL_QUOTE, ticker).await?;
        let result = classify_global_quote(&body);

        match &result {
            Ok(price) => tracing::info!("Fetched price for {}: ${:.2}", ticker, price),
            Err(QuoteFailure::RateLimited(note)) => {
                tracing::warn!("Rate limit advisory for {}: {}", ticker, note)
            }
            Err(failure) => tracing::warn!("Failed to fetch price for {}: {}", ticker, failure),
        }

        result
    }

    async fn fetch_daily(&self, ticker: &Ticker) -> Result<DailySeries, QuoteFailure> {
        let body = self.query(FUNCTION_TIME_SERIES_DAILY, ticker).await?;
        let result = classify_daily_series(&body);

        if let Err(failure) = &result {
            tracing::warn!("Failed to fetch daily series for {}: {}", ticker, failure);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(raw: &str) -> Ticker {
        Ticker::parse(raw).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = AlphaVantageConfig::new("demo");
        assert_eq!(config.base_url, "https://www.alphavantage.co/query");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_client_creation() {
        let client = QuoteClient::new(AlphaVantageConfig::new("demo"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_rejects_empty_key() {
        let client = QuoteClient::new(AlphaVantageConfig::new("  "));
        assert!(matches!(client, Err(ClientError::EmptyApiKey)));
    }

    #[test]
    fn test_quote_params() {
        let client = QuoteClient::new(AlphaVantageConfig::new("secret")).unwrap();
        let aapl = ticker("AAPL");
        let params = client.query_params(FUNCTION_GLOBAL_QUOTE, &aapl);
        assert_eq!(
            params,
            vec![("function", "GLOBAL_QUOTE"), ("symbol", "AAPL"), ("apikey", "secret")]
        );
    }

    #[test]
    fn test_daily_params_include_outputsize() {
        let client = QuoteClient::new(AlphaVantageConfig::new("secret")).unwrap();
        let ibm = ticker("IBM");
        let params = client.query_params(FUNCTION_TIME_SERIES_DAILY, &ibm);
        assert!(params.contains(&("function", "TIME_SERIES_DAILY")));
        assert!(params.contains(&("outputsize", "compact")));
    }

    /// Serve one canned HTTP response on loopback; yields the request head
    async fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, tokio::sync::oneshot::Receiver<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.unwrap();
            let _ = tx.send(String::from_utf8_lossy(&buf[..n]).to_string());

            let response = format!(
                "{}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        (format!("http://{}/query", addr), rx)
    }

    fn client_for(base_url: String) -> QuoteClient {
        let mut config = AlphaVantageConfig::new("secret");
        config.base_url = base_url;
        QuoteClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_price_round_trip() {
        let (url, request) =
            serve_once("HTTP/1.1 200 OK", r#"{"Global Quote": {"05. price": "165.0000"}}"#).await;
        let client = client_for(url);

        let price = client.fetch_price(&ticker("aapl")).await;
        assert_eq!(price, Ok(165.0));

        let head = request.await.unwrap();
        assert!(head.starts_with("GET /query?"));
        assert!(head.contains("function=GLOBAL_QUOTE"));
        assert!(head.contains("symbol=AAPL"));
        assert!(head.contains("apikey=secret"));
    }

    #[tokio::test]
    async fn test_fetch_price_rate_limited_body() {
        let (url, _request) =
            serve_once("HTTP/1.1 200 OK", r#"{"Note": "5 calls per minute"}"#).await;
        let client = client_for(url);

        let result = client.fetch_price(&ticker("AAPL")).await;
        assert_eq!(result, Err(QuoteFailure::RateLimited("5 calls per minute".to_string())));
    }

    #[tokio::test]
    async fn test_server_error_is_transport_failure() {
        let (url, _request) = serve_once("HTTP/1.1 503 Service Unavailable", "{}").await;
        let client = client_for(url);

        let result = client.fetch_price(&ticker("AAPL")).await;
        assert!(matches!(result, Err(QuoteFailure::Transport(msg)) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_fetch_daily_round_trip() {
        let (url, request) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"Time Series (Daily)": {"2024-03-08": {"4. close": "196.5"}, "2024-03-07": {"4. close": "195.25"}}}"#,
        )
        .await;
        let client = client_for(url);

        let series = client.fetch_daily(&ticker("IBM")).await.unwrap();
        assert_eq!(series.len(), 2);

        let head = request.await.unwrap();
        assert!(head.contains("function=TIME_SERIES_DAILY"));
        assert!(head.contains("outputsize=compact"));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_transport_failure() {
        let mut config = AlphaVantageConfig::new("secret");
        // port 9 (discard) on loopback refuses connections
        config.base_url = "http://127.0.0.1:9/query".to_string();
        config.timeout = Duration::from_secs(2);
        let client = QuoteClient::new(config).unwrap();

        let result = client.fetch_price(&ticker("AAPL")).await;
        assert!(matches!(result, Err(QuoteFailure::Transport(_))));
    }
}
