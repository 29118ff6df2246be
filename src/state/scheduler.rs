//! Scheduler abstraction
//!
//! Retry delays and cache staleness read time through this trait so tests can
//! run on paused Tokio time and fast-forward instead of waiting.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

#[async_trait]
pub trait Scheduler: Send + Sync + std::fmt::Debug {
    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);

    fn now(&self) -> Instant;
}

/// Scheduler backed by the Tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
