use serde::Serialize;

use super::position::{Position, PositionError, Ticker};

/// Ordered batch of positions, unique by ticker
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBook {
    positions: Vec<Position>,
}

impl PositionBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: Vec<Position>) -> Result<Self, PositionError> {
        let mut book = Self::new();
        for position in positions {
            book.add(position)?;
        }
        Ok(book)
    }

    pub fn add(&mut self, position: Position) -> Result<(), PositionError> {
        if self.get(&position.ticker).is_some() {
            return Err(PositionError::DuplicateTicker(position.ticker));
        }
        self.positions.push(position);
        Ok(())
    }

    pub fn remove(&mut self, ticker: &Ticker) -> Option<Position> {
        let index = self.positions.iter().position(|p| &p.ticker == ticker)?;
        Some(self.positions.remove(index))
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&Position> {
        self.positions.iter().find(|p| &p.ticker == ticker)
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Fold a refreshed batch back in.
    ///
    /// A refreshed record replaces the current one only if the ticker is still in
    /// the book and still describes the same holding; anything else was removed or
    /// replaced while the cycle ran and is dropped. Returns the number merged.
    pub fn merge_refreshed(&mut self, refreshed: Vec<Position>) -> usize {
        let mut merged = 0;
        for update in refreshed {
            match self.positions.iter_mut().find(|p| p.same_holding(&update)) {
                Some(slot) => {
                    *slot = update;
                    merged += 1;
                }
                None => {
                    tracing::debug!("Discarding stale refresh for {}", update.ticker);
                }
            }
        }
        merged
    }
}

/// One treemap tile worth of data for a position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationSlice {
    pub ticker: Ticker,
    pub value: f64,
    /// Share of total market value, 0-100
    pub weight_pct: f64,
    pub change_pct: f64,
}

/// Aggregate valuation across the batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub cost_basis: f64,
    pub market_value: f64,
    pub gain_loss: f64,
    pub gain_loss_percentage: f64,
    pub allocation: Vec<AllocationSlice>,
}

impl PortfolioSummary {
    pub fn from_positions(positions: &[Position]) -> Self {
        let cost_basis: f64 = positions.iter().map(Position::cost_basis).sum();
        let market_value: f64 = positions.iter().map(Position::market_value).sum();
        let gain_loss = market_value - cost_basis;
        let gain_loss_percentage = if cost_basis > 0.0 {
            gain_loss / cost_basis * 100.0
        } else {
            0.0
        };

        let allocation = positions
            .iter()
            .map(|p| {
                let value = p.market_value();
                AllocationSlice {
                    ticker: p.ticker.clone(),
                    value,
                    weight_pct: if market_value > 0.0 { value / market_value * 100.0 } else { 0.0 },
                    change_pct: p.gain_loss_percentage().unwrap_or(0.0),
                }
            })
            .collect();

        Self {
            cost_basis,
            market_value,
            gain_loss,
            gain_loss_percentage,
            allocation,
        }
    }
}
