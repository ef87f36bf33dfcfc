//! Domain Layer - Positions and their valuation
//!
//! Pure types with no I/O. The refresh pipeline only ever produces new
//! `Position` records; nothing here is mutated by a fetch in flight.

pub mod position;
pub mod portfolio;

pub use position::{Position, PositionError, PositionMetrics, Ticker, MAX_TICKER_LEN};
pub use portfolio::{AllocationSlice, PortfolioSummary, PositionBook};
