//! CLI Commands
//!
//! Argument definitions and terminal rendering for the quote-refresh binary.

use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;

use crate::application::PortfolioSnapshot;
use crate::domain::{Position, PositionError};
use crate::ports::DailySeries;

/// Quote Refresh - Rate-limited stock position tracker
#[derive(Parser, Debug)]
#[command(
    name = "quote-refresh",
    version = env!("CARGO_PKG_VERSION"),
    about = "Rate-limited stock position tracker backed by Alpha Vantage",
    long_about = "Keeps a batch of stock positions priced from Alpha Vantage, pacing every \
                  provider call to stay under the free-tier quota and falling back to the \
                  purchase price whenever a quote cannot be fetched."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Keep a batch of positions refreshed until Ctrl+C
    Watch(WatchCmd),

    /// Fetch the latest price for one ticker
    Quote(QuoteCmd),

    /// Show recent daily closes for one ticker
    History(HistoryCmd),
}

/// Watch a batch of positions
#[derive(Parser, Debug)]
pub struct WatchCmd {
    /// Path to configuration file (defaults to config/default.toml when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra position as TICKER:SHARES:PURCHASE_PRICE (repeatable)
    #[arg(short, long = "position", value_name = "SPEC", value_parser = parse_position)]
    pub positions: Vec<Position>,
}

/// Fetch a single quote
#[derive(Parser, Debug)]
pub struct QuoteCmd {
    /// Ticker symbol (e.g., AAPL)
    #[arg(value_name = "TICKER")]
    pub ticker: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Fetch daily history
#[derive(Parser, Debug)]
pub struct HistoryCmd {
    /// Ticker symbol (e.g., AAPL)
    #[arg(value_name = "TICKER")]
    pub ticker: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of most recent sessions to show
    #[arg(short, long, value_name = "N", default_value = "10")]
    pub limit: usize,
}

/// Parse `TICKER:SHARES:PURCHASE_PRICE`
pub fn parse_position(raw: &str) -> Result<Position, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [ticker, shares, price] = parts.as_slice() else {
        return Err(format!("expected TICKER:SHARES:PURCHASE_PRICE, got '{}'", raw));
    };

    let shares: f64 = shares
        .trim()
        .parse()
        .map_err(|_| format!("invalid share count '{}'", shares))?;
    let price: f64 = price
        .trim()
        .parse()
        .map_err(|_| format!("invalid purchase price '{}'", price))?;

    Position::from_parts(ticker, shares, price).map_err(|e: PositionError| e.to_string())
}

/// Render a snapshot as a fixed-width table
pub fn render_snapshot(snapshot: &PortfolioSnapshot) -> String {
    let mut out = String::new();
    let status = if snapshot.loading {
        "refreshing...".to_string()
    } else {
        match snapshot.last_refreshed_at {
            Some(at) => format!("updated {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            None => "not refreshed yet".to_string(),
        }
    };

    let _ = writeln!(out, "Portfolio ({}, {})", snapshot.positions.len(), status);
    let _ = writeln!(
        out,
        "{:<6} {:>10} {:>10} {:>10} {:>12} {:>12} {:>8}",
        "TICKER", "SHARES", "COST", "PRICE", "VALUE", "GAIN/LOSS", "%"
    );

    for position in &snapshot.positions {
        let price = position
            .current_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "-".to_string());
        let value = position
            .total_value()
            .map(|v| format!("{:.2}", v))
            .unwrap_or_else(|| "-".to_string());
        let gain = position
            .gain_loss()
            .map(|g| format!("{:+.2}", g))
            .unwrap_or_else(|| "-".to_string());
        let pct = position
            .gain_loss_percentage()
            .map(|p| format!("{:+.2}", p))
            .unwrap_or_else(|| "-".to_string());

        let _ = writeln!(
            out,
            "{:<6} {:>10.4} {:>10.2} {:>10} {:>12} {:>12} {:>8}",
            position.ticker.as_str(),
            position.shares,
            position.purchase_price,
            price,
            value,
            gain,
            pct
        );
    }

    if !snapshot.positions.is_empty() {
        let summary = snapshot.summary();
        let _ = writeln!(
            out,
            "Total: {:.2} (cost {:.2}, {:+.2} / {:+.2}%)",
            summary.market_value,
            summary.cost_basis,
            summary.gain_loss,
            summary.gain_loss_percentage
        );
    }

    out
}

/// Render the newest `limit` closes, oldest first
pub fn render_history(ticker: &str, series: &DailySeries, limit: usize) -> String {
    let closes = series.chronological();
    let start = closes.len().saturating_sub(limit);

    let mut out = String::new();
    let _ = writeln!(out, "{} daily closes ({} of {})", ticker, closes.len() - start, closes.len());
    for close in &closes[start..] {
        let _ = writeln!(out, "{}  {:>10.2}", close.date, close.close);
    }
    out
}
