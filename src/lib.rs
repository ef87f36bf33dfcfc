//! quote-refresh - Rate-limited stock position tracker
//!
//! Refreshes a batch of stock positions from Alpha Vantage while keeping
//! provider calls paced under the free-tier quota.
//!
//! # Modules
//!
//! - `domain`: Core types (Ticker, Position, PositionBook, PortfolioSummary)
//! - `ports`: Trait abstractions (QuotePort) and a scripted test double
//! - `adapters`: External implementations (Alpha Vantage client, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Task queue, refresher, scheduler, and refresh pipeline

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
