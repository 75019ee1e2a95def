//! Reschedulable one-shot deadline driving search ticks

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Deadline of the next search tick, if a search is running.
///
/// The timer itself never wakes anybody up: the host awaits [`MatchJobsTimer::tick`]
/// next to its other event sources and runs one search step when it fires.
#[derive(Debug, Default)]
pub struct MatchJobsTimer {
    deadline: Option<Instant>,
}

impl MatchJobsTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire as soon as the host polls
    pub fn start(&mut self) {
        self.deadline = Some(Instant::now());
    }

    pub fn schedule_after(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolves at the current deadline; never resolves while stopped.
    ///
    /// The future does not borrow the timer, so a rescheduled deadline only
    /// applies to futures created afterwards.
    pub fn tick(&self) -> impl Future<Output = ()> + Send + 'static {
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        }
    }
}
