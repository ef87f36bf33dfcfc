//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, the quote provider is reached only
//! through `QuotePort`, so the refresh pipeline can run against the real HTTP
//! client or the scripted double in `mocks`.

pub mod quotes;
pub mod mocks;

pub use quotes::{parse_price, DailyClose, DailySeries, QuoteFailure, QuotePort};
pub use mocks::ScriptedQuotes;
