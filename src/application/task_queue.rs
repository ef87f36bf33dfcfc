//! Rate-Limited Task Queue
//!
//! Serializes outbound provider calls: tasks run one at a time in submission
//! order, and at least `min_interval` separates the start of consecutive
//! tasks. The drain worker exists only while there is work; the next submit
//! after it exits starts a new one.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;

/// Provider allows 5 calls/minute (one per 12s); 15s leaves headroom
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("Task ended without producing a result")]
    Aborted,
}

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Thunk = Box<dyn FnOnce() -> Job + Send + 'static>;

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Thunk>,
    draining: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    min_interval: Duration,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // no code path panics while holding the lock
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// FIFO, single-flight task queue with a fixed inter-dispatch delay
///
/// Clones share one queue and one drain worker.
#[derive(Clone)]
pub struct RateLimitedTaskQueue {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RateLimitedTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("RateLimitedTaskQueue")
            .field("min_interval", &self.shared.min_interval)
            .field("pending", &state.tasks.len())
            .field("draining", &state.draining)
            .finish()
    }
}

impl Default for RateLimitedTaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl RateLimitedTaskQueue {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                min_interval,
            }),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.shared.min_interval
    }

    /// Tasks waiting to be dispatched (excludes the one running)
    pub fn pending(&self) -> usize {
        self.shared.lock().tasks.len()
    }

    pub fn is_draining(&self) -> bool {
        self.shared.lock().draining
    }

    /// Enqueue `task` and return a handle to its eventual output.
    ///
    /// `task` is not invoked until the drain worker dispatches it. Never waits;
    /// must be called from within a tokio runtime.
    pub fn submit<F, Fut, T>(&self, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let thunk: Thunk = Box::new(move || {
            Box::pin(async move {
                // receiver may have been dropped; the call still counts against the limit
                let _ = tx.send(task().await);
            })
        });

        let start_worker = {
            let mut state = self.shared.lock();
            state.tasks.push_back(thunk);
            !std::mem::replace(&mut state.draining, true)
        };

        if start_worker {
            tracing::debug!("Starting queue drain worker");
            tokio::spawn(drain(Arc::clone(&self.shared)));
        }

        TaskHandle { rx }
    }
}

async fn drain(shared: Arc<Shared>) {
    loop {
        let next = {
            let mut state = shared.lock();
            match state.tasks.pop_front() {
                Some(thunk) => thunk,
                None => {
                    state.draining = false;
                    break;
                }
            }
        };

        // run on its own task so a panicking job cannot take the worker down
        if let Err(e) = tokio::spawn(next()).await {
            tracing::error!("Queued task failed: {}", e);
        }

        tokio::time::sleep(shared.min_interval).await;
    }
    tracing::debug!("Queue drained, worker exiting");
}

/// Resolves with the submitted task's own output
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for TaskHandle<T> {
    type Output = Result<T, QueueError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| QueueError::Aborted))
    }
}
