use std::time::Duration;

use log::debug;
use tokio::time::Instant;

use super::frame::Frame;

/// 固定退避的重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Duration,
}

impl RetryPolicy {
    pub fn fixed(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    pub fn retry_at(&self, failed_at: Instant) -> Instant {
        failed_at + self.backoff
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Issue a detection cycle now.
    Ready,
    /// A previous call is still in flight; this tick is dropped.
    Busy,
    /// Inside the minimum inter-call interval; dropped, not queued.
    Throttled,
    /// Waiting out the retry backoff after a failed cycle.
    BackingOff,
}

/// 检测调度：限频、防重入、失败退避
///
/// Pure bookkeeping; the async loop in `session` asks it what to do on every
/// scheduling opportunity.
pub struct DetectionScheduler {
    min_interval: Duration,
    retry: RetryPolicy,
    // 定位与关键点两个调用同时发出、一起收回
    in_flight: bool,
    last_issued: Option<Instant>,
    retry_after: Option<Instant>,
    last_frame_timestamp: Option<Duration>,
    consecutive_failures: u32,
}

impl DetectionScheduler {
    pub fn new(min_interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            min_interval,
            retry,
            in_flight: false,
            last_issued: None,
            retry_after: None,
            last_frame_timestamp: None,
            consecutive_failures: 0,
        }
    }

    pub fn tick(&self, now: Instant) -> TickDecision {
        if self.in_flight {
            return TickDecision::Busy;
        }
        if self.retry_after.is_some_and(|at| now < at) {
            return TickDecision::BackingOff;
        }
        if self
            .last_issued
            .is_some_and(|issued| now.duration_since(issued) < self.min_interval)
        {
            return TickDecision::Throttled;
        }
        TickDecision::Ready
    }

    /// Rejects frames whose timestamp did not advance past the last accepted one.
    pub fn accept_frame(&mut self, frame: &Frame) -> bool {
        if self
            .last_frame_timestamp
            .is_some_and(|last| frame.timestamp <= last)
        {
            debug!(
                "stale frame #{} ({:?}), skipping",
                frame.frame_number, frame.timestamp
            );
            return false;
        }
        self.last_frame_timestamp = Some(frame.timestamp);
        true
    }

    pub fn begin_cycle(&mut self, now: Instant) {
        self.in_flight = true;
        self.last_issued = Some(now);
        self.retry_after = None;
    }

    /// Clears the in-flight guard and returns the consecutive failure count.
    pub fn finish_cycle(&mut self, succeeded: bool, now: Instant) -> u32 {
        self.in_flight = false;

        if succeeded {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.retry_after = Some(self.retry.retry_at(now));
        }
        self.consecutive_failures
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
