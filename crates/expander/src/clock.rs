//! Sleep abstraction used between gateway polls.

use std::time::Duration;

use async_trait::async_trait;

/// Source of delays for the polling loop.
///
/// Production code uses [`TokioClock`]; tests substitute a clock that returns
/// immediately so minutes of stall can be simulated without waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Suspend the caller for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
