//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Alpha Vantage: quote provider HTTP client
//! - CLI: Command-line interface definitions

pub mod alpha_vantage;
pub mod cli;

pub use alpha_vantage::{AlphaVantageConfig, QuoteClient};
pub use cli::CliApp;
