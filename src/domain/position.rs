use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Longest symbol the provider accepts for listed equities
pub const MAX_TICKER_LEN: usize = 5;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PositionError {
    #[error("Invalid ticker symbol: {0:?}")]
    InvalidTicker(String),
    #[error("Invalid share count: {0}")]
    InvalidShares(f64),
    #[error("Invalid purchase price: {0}")]
    InvalidPurchasePrice(f64),
    #[error("Invalid current price: {0}")]
    InvalidCurrentPrice(f64),
    #[error("Position for {0} already exists")]
    DuplicateTicker(Ticker),
}

/// Upper-cased ticker symbol, 1-5 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, PositionError> {
        let symbol = raw.trim().to_ascii_uppercase();
        let len = symbol.chars().count();
        if len == 0 || len > MAX_TICKER_LEN {
            return Err(PositionError::InvalidTicker(raw.to_string()));
        }

        let starts_alnum = symbol.chars().next().map_or(false, |c| c.is_ascii_alphanumeric());
        let ends_alnum = symbol.chars().last().map_or(false, |c| c.is_ascii_alphanumeric());
        let valid_chars = symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        if !(starts_alnum && ends_alnum && valid_chars) {
            return Err(PositionError::InvalidTicker(raw.to_string()));
        }

        Ok(Self(symbol))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Ticker {
    type Error = PositionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

/// Valuation fields derived from a single observed price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionMetrics {
    pub total_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percentage: f64,
}

impl PositionMetrics {
    /// Cost basis must be positive, which `Position::new` guarantees.
    pub fn calculate(shares: f64, purchase_price: f64, current_price: f64) -> Self {
        let cost_basis = shares * purchase_price;
        let total_value = shares * current_price;
        let gain_loss = total_value - cost_basis;
        let gain_loss_percentage = gain_loss / cost_basis * 100.0;

        Self {
            total_value,
            gain_loss,
            gain_loss_percentage,
        }
    }
}

/// A user-held quantity of a ticker
///
/// Records are immutable from the refresh pipeline's point of view: a price
/// update always produces a new `Position` via [`Position::priced_at`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PositionRecord")]
pub struct Position {
    pub ticker: Ticker,
    pub shares: f64,
    pub purchase_price: f64,
    pub current_price: Option<f64>,
    pub metrics: Option<PositionMetrics>,
}

/// Stored form of a position; derived fields are recomputed on load
#[derive(Deserialize)]
struct PositionRecord {
    ticker: Ticker,
    shares: f64,
    purchase_price: f64,
    #[serde(default)]
    current_price: Option<f64>,
}

impl TryFrom<PositionRecord> for Position {
    type Error = PositionError;

    fn try_from(record: PositionRecord) -> Result<Self, Self::Error> {
        let position = Position::new(record.ticker, record.shares, record.purchase_price)?;
        match record.current_price {
            None => Ok(position),
            Some(price) if price.is_finite() && price > 0.0 => Ok(position.priced_at(price)),
            Some(price) => Err(PositionError::InvalidCurrentPrice(price)),
        }
    }
}

impl Position {
    pub fn new(ticker: Ticker, shares: f64, purchase_price: f64) -> Result<Self, PositionError> {
        if !shares.is_finite() || shares <= 0.0 {
            return Err(PositionError::InvalidShares(shares));
        }
        if !purchase_price.is_finite() || purchase_price <= 0.0 {
            return Err(PositionError::InvalidPurchasePrice(purchase_price));
        }

        Ok(Self {
            ticker,
            shares,
            purchase_price,
            current_price: None,
            metrics: None,
        })
    }

    /// Parse the ticker and build the position in one step
    pub fn from_parts(ticker: &str, shares: f64, purchase_price: f64) -> Result<Self, PositionError> {
        Self::new(Ticker::parse(ticker)?, shares, purchase_price)
    }

    /// New record carrying `price` and the metrics derived from it
    pub fn priced_at(&self, price: f64) -> Self {
        Self {
            ticker: self.ticker.clone(),
            shares: self.shares,
            purchase_price: self.purchase_price,
            current_price: Some(price),
            metrics: Some(PositionMetrics::calculate(self.shares, self.purchase_price, price)),
        }
    }

    /// Last observed price, or the purchase price if none was ever observed
    pub fn fallback_price(&self) -> f64 {
        self.current_price.unwrap_or(self.purchase_price)
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares * self.purchase_price
    }

    /// Current total value, or cost basis for a position never priced
    pub fn market_value(&self) -> f64 {
        self.metrics
            .map(|m| m.total_value)
            .unwrap_or_else(|| self.cost_basis())
    }

    pub fn total_value(&self) -> Option<f64> {
        self.metrics.map(|m| m.total_value)
    }

    pub fn gain_loss(&self) -> Option<f64> {
        self.metrics.map(|m| m.gain_loss)
    }

    pub fn gain_loss_percentage(&self) -> Option<f64> {
        self.metrics.map(|m| m.gain_loss_percentage)
    }

    /// True when `other` describes the same holding (ticker, size and entry),
    /// regardless of pricing
    pub fn same_holding(&self, other: &Position) -> bool {
        self.ticker == other.ticker
            && self.shares == other.shares
            && self.purchase_price == other.purchase_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ticker_normalizes_case_and_whitespace() {
        let ticker = Ticker::parse("  aapl ").unwrap();
        assert_eq!(ticker.as_str(), "AAPL");
        assert_eq!(ticker.to_string(), "AAPL");
    }

    #[test]
    fn test_ticker_accepts_class_separator() {
        assert_eq!(Ticker::parse("brk.b").unwrap().as_str(), "BRK.B");
    }

    #[test]
    fn test_ticker_rejects_bad_symbols() {
        for raw in ["", "   ", "TOOLONG", "AB CD", "$AAP", ".AB", "AB-"] {
            assert!(
                matches!(Ticker::parse(raw), Err(PositionError::InvalidTicker(_))),
                "expected {:?} to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_new_position_unpriced() {
        let position = Position::from_parts("msft", 3.0, 400.0).unwrap();
        assert_eq!(position.ticker.as_str(), "MSFT");
        assert!(position.current_price.is_none());
        assert!(position.metrics.is_none());
        assert_eq!(position.cost_basis(), 1200.0);
        assert_eq!(position.market_value(), 1200.0);
    }

    #[test]
    fn test_new_position_invalid_shares() {
        let result = Position::from_parts("AAPL", 0.0, 150.0);
        assert!(matches!(result, Err(PositionError::InvalidShares(_))));

        let result = Position::from_parts("AAPL", f64::NAN, 150.0);
        assert!(matches!(result, Err(PositionError::InvalidShares(_))));
    }

    #[test]
    fn test_new_position_invalid_price() {
        let result = Position::from_parts("AAPL", 10.0, -1.0);
        assert!(matches!(result, Err(PositionError::InvalidPurchasePrice(_))));

        let result = Position::from_parts("AAPL", 10.0, f64::INFINITY);
        assert!(matches!(result, Err(PositionError::InvalidPurchasePrice(_))));
    }

    #[test]
    fn test_priced_at_gain() {
        let position = Position::from_parts("AAPL", 10.0, 150.0).unwrap();
        let priced = position.priced_at(165.0);

        assert_eq!(priced.current_price, Some(165.0));
        assert_relative_eq!(priced.total_value().unwrap(), 1650.0);
        assert_relative_eq!(priced.gain_loss().unwrap(), 150.0);
        assert_relative_eq!(priced.gain_loss_percentage().unwrap(), 10.0, epsilon = 1e-9);

        // original record untouched
        assert!(position.current_price.is_none());
    }

    #[test]
    fn test_priced_at_loss() {
        let position = Position::from_parts("TSLA", 4.0, 250.0).unwrap();
        let priced = position.priced_at(200.0);

        assert_relative_eq!(priced.total_value().unwrap(), 800.0);
        assert_relative_eq!(priced.gain_loss().unwrap(), -200.0);
        assert_relative_eq!(priced.gain_loss_percentage().unwrap(), -20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_metrics_match_formulas() {
        let cases = [(1.0, 1.0, 1.0), (0.5, 33.3, 12.7), (1250.0, 3.14, 9.99), (7.0, 100.0, 0.01)];
        for (shares, purchase, current) in cases {
            let m = PositionMetrics::calculate(shares, purchase, current);
            let cost_basis = shares * purchase;
            assert_eq!(m.total_value, shares * current);
            assert_eq!(m.gain_loss, shares * current - cost_basis);
            assert_eq!(m.gain_loss_percentage, (shares * current - cost_basis) / cost_basis * 100.0);
        }
    }

    #[test]
    fn test_fallback_price() {
        let position = Position::from_parts("AAPL", 10.0, 150.0).unwrap();
        assert_eq!(position.fallback_price(), 150.0);
        assert_eq!(position.priced_at(171.5).fallback_price(), 171.5);
    }

    #[test]
    fn test_same_holding_ignores_price() {
        let position = Position::from_parts("AAPL", 10.0, 150.0).unwrap();
        let priced = position.priced_at(160.0);
        assert!(position.same_holding(&priced));

        let resized = Position::from_parts("AAPL", 12.0, 150.0).unwrap();
        assert!(!position.same_holding(&resized));
    }

    #[test]
    fn test_ticker_serde_validates() {
        let ok: Ticker = serde_json::from_str("\"nvda\"").unwrap();
        assert_eq!(ok.as_str(), "NVDA");

        let bad: Result<Ticker, _> = serde_json::from_str("\"NOT A TICKER\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_position_serde_recomputes_metrics() {
        let position: Position = serde_json::from_str(
            r#"{"ticker":"aapl","shares":10.0,"purchase_price":150.0,"current_price":165.0}"#,
        )
        .unwrap();

        assert_eq!(position.ticker.as_str(), "AAPL");
        assert_relative_eq!(position.total_value().unwrap(), 1650.0);
        assert_relative_eq!(position.gain_loss_percentage().unwrap(), 10.0);

        let unpriced: Position =
            serde_json::from_str(r#"{"ticker":"MSFT","shares":1.0,"purchase_price":400.0}"#).unwrap();
        assert!(unpriced.metrics.is_none());
    }

    #[test]
    fn test_position_serde_rejects_invalid_fields() {
        for raw in [
            r#"{"ticker":"AAPL","shares":0.0,"purchase_price":150.0}"#,
            r#"{"ticker":"AAPL","shares":10.0,"purchase_price":-1.0}"#,
            r#"{"ticker":"AAPL","shares":10.0,"purchase_price":150.0,"current_price":0.0}"#,
        ] {
            let result: Result<Position, _> = serde_json::from_str(raw);
            assert!(result.is_err(), "expected {} to be rejected", raw);
        }
    }
}
