//! Timer-driven refresh with a start/stop/re-interval state machine.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use warden_api::Refresh;

use crate::CancelHandle;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Non-finite or non-positive intervals fall back to [`DEFAULT_POLL_INTERVAL`].
/// Sub-millisecond values round up to 1ms so the loop never spins; anything
/// longer than a day is capped at [`MAX_POLL_INTERVAL`].
pub fn sanitize_interval(interval_ms: f64) -> Duration {
    if interval_ms.is_finite() && interval_ms > 0.0 {
        let max_ms = MAX_POLL_INTERVAL.as_millis() as f64;
        Duration::from_millis(interval_ms.round().clamp(1.0, max_ms) as u64)
    } else {
        DEFAULT_POLL_INTERVAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollState {
    pub enabled: bool,
    pub interval_ms: u64,
}

struct Running {
    interval: Duration,
    cancel: CancelHandle,
    task: JoinHandle<()>,
}

/// Owns at most one polling task. `enabled` in [`PollState`] is true exactly
/// when a task is held.
pub struct PollController {
    label: String,
    refresher: Arc<dyn Refresh>,
    running: Option<Running>,
    last_interval: Duration,
}

impl PollController {
    pub fn new(label: impl Into<String>, refresher: Arc<dyn Refresh>) -> Self {
        Self { label: label.into(), refresher, running: None, last_interval: DEFAULT_POLL_INTERVAL }
    }

    /// Stop any running loop, then refresh once immediately and every
    /// interval after that. Returns the interval actually used.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, interval_ms: f64) -> Duration { self.launch(interval_ms, true) }

    /// Like [`start`](Self::start), but the first refresh waits one full
    /// interval. For callers that have just loaded the data themselves.
    pub fn start_deferred(&mut self, interval_ms: f64) -> Duration { self.launch(interval_ms, false) }

    fn launch(&mut self, interval_ms: f64, immediate: bool) -> Duration {
        self.stop();
        let period = sanitize_interval(interval_ms);
        let first = if immediate { Instant::now() } else { Instant::now() + period };
        let (cancel, mut stop_rx) = CancelHandle::new();
        let refresher = Arc::clone(&self.refresher);
        let label = self.label.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {}
                }
                counter!("poll_ticks_total", 1u64);
                if let Err(e) = refresher.refresh().await {
                    counter!("poll_refresh_errors_total", 1u64);
                    warn!(screen = %label, error = %e, "poll: refresh failed");
                }
            }
            debug!(screen = %label, "poll: loop exited");
        });
        info!(screen = %self.label, interval_ms = %period.as_millis(), immediate, "poll: started");
        self.running = Some(Running { interval: period, cancel, task });
        self.last_interval = period;
        period
    }

    /// Cancel the loop. An in-flight refresh may finish; nothing new is
    /// scheduled. Returns false when already stopped.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(Running { cancel, task, .. }) => {
                cancel.cancel();
                drop(task);
                info!(screen = %self.label, "poll: stopped");
                true
            }
            None => false,
        }
    }

    /// Restart with a new interval. Does nothing (returns false) while stopped.
    pub fn change_interval(&mut self, interval_ms: f64) -> bool {
        if self.running.is_none() {
            return false;
        }
        self.stop();
        self.start(interval_ms);
        true
    }

    pub fn is_running(&self) -> bool { self.running.is_some() }

    /// Interval of the running loop, or of the last one when stopped.
    pub fn interval(&self) -> Duration {
        self.running.as_ref().map(|r| r.interval).unwrap_or(self.last_interval)
    }

    pub fn state(&self) -> PollState {
        PollState { enabled: self.is_running(), interval_ms: self.interval().as_millis() as u64 }
    }
}

impl Drop for PollController {
    fn drop(&mut self) { self.stop(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_intervals_use_default() {
        assert_eq!(sanitize_interval(0.0), DEFAULT_POLL_INTERVAL);
        assert_eq!(sanitize_interval(-20.0), DEFAULT_POLL_INTERVAL);
        assert_eq!(sanitize_interval(f64::NAN), DEFAULT_POLL_INTERVAL);
        assert_eq!(sanitize_interval(f64::INFINITY), DEFAULT_POLL_INTERVAL);
        assert_eq!(sanitize_interval(0.2), Duration::from_millis(1));
        assert_eq!(sanitize_interval(2000.0), Duration::from_millis(2000));
    }

    #[test]
    fn huge_intervals_are_capped_at_a_day() {
        assert_eq!(sanitize_interval(1e300), MAX_POLL_INTERVAL);
        assert_eq!(sanitize_interval(f64::MAX), MAX_POLL_INTERVAL);
        assert_eq!(sanitize_interval(86_400_000.0), MAX_POLL_INTERVAL);
        assert_eq!(sanitize_interval(86_399_999.0), Duration::from_millis(86_399_999));
    }
}
