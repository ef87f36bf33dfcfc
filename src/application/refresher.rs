//! Position Refresher
//!
//! Re-prices a batch of positions through the shared task queue. A failed
//! quote never fails the batch: the position is re-derived from its best
//! known price instead.

use std::sync::Arc;

use crate::domain::Position;
use crate::ports::{QuoteFailure, QuotePort};
use super::task_queue::{QueueError, RateLimitedTaskQueue};

/// Why a position kept its fallback price this cycle
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    Quote(QuoteFailure),
    Queue(QueueError),
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackReason::Quote(failure) => write!(f, "{}", failure),
            FallbackReason::Queue(err) => write!(f, "{}", err),
        }
    }
}

/// Re-prices positions one ticker at a time through the rate-limited queue
pub struct PositionRefresher<Q: QuotePort + 'static> {
    quotes: Arc<Q>,
    queue: RateLimitedTaskQueue,
}

impl<Q: QuotePort + 'static> Clone for PositionRefresher<Q> {
    fn clone(&self) -> Self {
        Self {
            quotes: Arc::clone(&self.quotes),
            queue: self.queue.clone(),
        }
    }
}

impl<Q: QuotePort + 'static> PositionRefresher<Q> {
    pub fn new(quotes: Arc<Q>, queue: RateLimitedTaskQueue) -> Self {
        Self { quotes, queue }
    }

    pub fn queue(&self) -> &RateLimitedTaskQueue {
        &self.queue
    }

    pub fn quotes(&self) -> &Arc<Q> {
        &self.quotes
    }

    /// Quote one position through the queue
    async fn quote(&self, position: &Position) -> Result<f64, FallbackReason> {
        let quotes = Arc::clone(&self.quotes);
        let ticker = position.ticker.clone();

        self.queue
            .submit(move || async move { quotes.fetch_price(&ticker).await })
            .await
            .map_err(FallbackReason::Queue)?
            .map_err(FallbackReason::Quote)
    }

    /// Re-price a single position, falling back on any failure
    pub async fn refresh_one(&self, position: &Position) -> Position {
        match self.quote(position).await {
            Ok(price) => position.priced_at(price),
            Err(reason) => {
                let fallback = position.fallback_price();
                tracing::warn!(
                    "Using fallback price ${:.2} for {}: {}",
                    fallback,
                    position.ticker,
                    reason
                );
                position.priced_at(fallback)
            }
        }
    }

    /// New batch in input order, same length, every record re-derived.
    ///
    /// Positions are quoted sequentially; the queue serializes provider calls
    /// anyway, so fanning out would only lengthen the queue.
    pub async fn refresh(&self, positions: &[Position]) -> Vec<Position> {
        if positions.is_empty() {
            return Vec::new();
        }

        tracing::info!("Refreshing {} positions", positions.len());
        let mut updated = Vec::with_capacity(positions.len());
        for position in positions {
            updated.push(self.refresh_one(position).await);
        }
        updated
    }
}
