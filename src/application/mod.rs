pub mod task_queue;
pub mod refresher;
pub mod scheduler;
pub mod pipeline;

pub use task_queue::{QueueError, RateLimitedTaskQueue, TaskHandle, DEFAULT_MIN_INTERVAL};
pub use refresher::{FallbackReason, PositionRefresher};
pub use scheduler::{
    Clock, IgnoreReason, ManualClock, RefreshScheduler, SchedulerState, TokioClock, Trigger,
    TriggerDecision, DEFAULT_COOLDOWN,
};
pub use pipeline::{PortfolioSnapshot, RefreshPipeline};
