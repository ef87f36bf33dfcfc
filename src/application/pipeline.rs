//! Refresh Pipeline
//!
//! Owns the position batch, the scheduler, and the periodic timer, and wires
//! triggers through to the refresher. Consumers observe the batch through a
//! `watch` channel of snapshots carrying the loading flag.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::{PortfolioSummary, Position, PositionBook, PositionError, Ticker};
use crate::ports::QuotePort;
use super::refresher::PositionRefresher;
use super::scheduler::{RefreshScheduler, Trigger, TriggerDecision};

/// What consumers see after every change
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioSnapshot {
    pub positions: Vec<Position>,
    /// True while a refresh cycle is in flight
    pub loading: bool,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl PortfolioSnapshot {
    pub fn summary(&self) -> PortfolioSummary {
        PortfolioSummary::from_positions(&self.positions)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Inner<Q: QuotePort + 'static> {
    book: Mutex<PositionBook>,
    scheduler: Mutex<RefreshScheduler>,
    refresher: PositionRefresher<Q>,
    snapshots: watch::Sender<PortfolioSnapshot>,
    timer: Mutex<Option<JoinHandle<()>>>,
    cycle: Mutex<Option<JoinHandle<()>>>,
}

impl<Q: QuotePort + 'static> Drop for Inner<Q> {
    fn drop(&mut self) {
        if let Some(timer) = lock(&self.timer).take() {
            timer.abort();
        }
    }
}

/// Scheduler -> refresher -> queue -> client, with results merged back
pub struct RefreshPipeline<Q: QuotePort + 'static> {
    inner: Arc<Inner<Q>>,
}

impl<Q: QuotePort + 'static> Clone for RefreshPipeline<Q> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<Q: QuotePort + 'static> RefreshPipeline<Q> {
    pub fn new(refresher: PositionRefresher<Q>, scheduler: RefreshScheduler) -> Self {
        let (snapshots, _) = watch::channel(PortfolioSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                book: Mutex::new(PositionBook::new()),
                scheduler: Mutex::new(scheduler),
                refresher,
                snapshots,
                timer: Mutex::new(None),
                cycle: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PortfolioSnapshot> {
        self.inner.snapshots.subscribe()
    }

    pub fn snapshot(&self) -> PortfolioSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    pub fn positions(&self) -> Vec<Position> {
        lock(&self.inner.book).positions().to_vec()
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.inner.scheduler).is_running()
    }

    /// Add a position and fire a batch-changed trigger
    pub fn add_position(&self, position: Position) -> Result<TriggerDecision, PositionError> {
        tracing::info!("Adding {} ({} @ ${:.2})", position.ticker, position.shares, position.purchase_price);
        lock(&self.inner.book).add(position)?;
        self.publish(|_| {});
        Ok(self.on_batch_changed())
    }

    /// Add several positions under one batch-changed trigger.
    ///
    /// All or nothing: on a duplicate the book is left untouched.
    pub fn seed(&self, positions: Vec<Position>) -> Result<TriggerDecision, PositionError> {
        {
            let mut book = lock(&self.inner.book);
            let mut staged = book.clone();
            for position in positions {
                staged.add(position)?;
            }
            tracing::info!("Seeded {} positions", staged.len() - book.len());
            *book = staged;
        }
        self.publish(|_| {});
        Ok(self.on_batch_changed())
    }

    /// Remove a position by ticker and fire a batch-changed trigger.
    ///
    /// An in-flight quote for the ticker is not cancelled; its result is
    /// discarded at merge time.
    pub fn remove_position(&self, ticker: &Ticker) -> Option<Position> {
        let removed = lock(&self.inner.book).remove(ticker)?;
        tracing::info!("Removed {}", ticker);
        self.publish(|_| {});
        self.on_batch_changed();
        Some(removed)
    }

    pub fn on_batch_changed(&self) -> TriggerDecision {
        self.fire(Trigger::BatchChanged)
    }

    pub fn on_timer_tick(&self) -> TriggerDecision {
        self.fire(Trigger::TimerTick)
    }

    fn fire(&self, trigger: Trigger) -> TriggerDecision {
        let batch = lock(&self.inner.book).positions().to_vec();
        let decision = lock(&self.inner.scheduler).on_trigger(trigger, batch.len());
        if decision.should_start() {
            self.start_cycle(batch);
        }
        decision
    }

    fn start_cycle(&self, batch: Vec<Position>) {
        self.publish(|_| {});

        let pipeline = self.clone();
        let handle = tokio::spawn(async move {
            let refreshed = pipeline.inner.refresher.refresh(&batch).await;
            let merged = lock(&pipeline.inner.book).merge_refreshed(refreshed);
            lock(&pipeline.inner.scheduler).complete();

            tracing::info!("Refresh cycle complete: {}/{} positions merged", merged, batch.len());
            pipeline.publish(|s| s.last_refreshed_at = Some(Utc::now()));
        });

        *lock(&self.inner.cycle) = Some(handle);
    }

    /// Rebuild the snapshot from the book, then apply `update`.
    ///
    /// `loading` always mirrors the scheduler, read under the channel's write
    /// lock, so a late publish from a finished cycle cannot clear the flag of
    /// the cycle that replaced it.
    fn publish(&self, update: impl FnOnce(&mut PortfolioSnapshot)) {
        self.inner.snapshots.send_modify(|snapshot| {
            snapshot.positions = lock(&self.inner.book).positions().to_vec();
            update(snapshot);
            snapshot.loading = lock(&self.inner.scheduler).is_running();
        });
    }

    /// Wait until no cycle is in flight
    pub async fn wait_idle(&self) {
        let mut rx = self.subscribe();
        // sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|s| !s.loading).await;
    }

    /// Start the periodic trigger, replacing any running timer.
    ///
    /// The first tick fires one `period` from now.
    pub fn start_timer(&self, period: Duration) {
        let weak: Weak<Inner<Q>> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                RefreshPipeline { inner }.on_timer_tick();
            }
        });

        if let Some(previous) = lock(&self.inner.timer).replace(handle) {
            previous.abort();
        }
        tracing::debug!("Refresh timer started with period {:?}", period);
    }

    pub fn timer_running(&self) -> bool {
        lock(&self.inner.timer)
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }

    /// Tear down the timer and abandon any in-flight cycle.
    ///
    /// The scheduler returns to idle, so later batch changes still refresh.
    /// Quotes already handed to the provider still complete inside the queue.
    pub fn shutdown(&self) {
        if let Some(timer) = lock(&self.inner.timer).take() {
            timer.abort();
        }
        if let Some(cycle) = lock(&self.inner.cycle).take() {
            cycle.abort();
        }
        {
            let mut scheduler = lock(&self.inner.scheduler);
            if scheduler.is_running() {
                scheduler.complete();
            }
        }
        self.publish(|_| {});
        tracing::info!("Refresh pipeline shut down");
    }
}
