use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use warden_api::{ConsoleError, ConsoleResult, Refresh};
use warden_ops::{PollController, PollState, DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL};

/// Records the elapsed millis of every refresh; fails the first `failures` calls.
struct Ticks {
    t0: Instant,
    at: Mutex<Vec<u64>>,
    failures: AtomicUsize,
}

impl Ticks {
    fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self { t0: Instant::now(), at: Mutex::new(Vec::new()), failures: AtomicUsize::new(failures) })
    }
    fn at(&self) -> Vec<u64> { self.at.lock().unwrap().clone() }
}

#[async_trait::async_trait]
impl Refresh for Ticks {
    async fn refresh(&self) -> ConsoleResult<()> {
        self.at.lock().unwrap().push(self.t0.elapsed().as_millis() as u64);
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(ConsoleError::Transport("flaky".into()));
        }
        Ok(())
    }
}

/// Refresh that takes `delay` to complete, counting starts and completions.
struct Slow {
    delay: Duration,
    started: AtomicUsize,
    done: AtomicUsize,
}

#[async_trait::async_trait]
impl Refresh for Slow {
    async fn refresh(&self) -> ConsoleResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        sleep(self.delay).await;
        self.done.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn zero_interval_uses_default() {
    let ticks = Ticks::new(0);
    let mut poll = PollController::new("logs", ticks.clone());
    assert_eq!(poll.start(0.0), DEFAULT_POLL_INTERVAL);
    sleep(Duration::from_millis(100)).await;
    assert_eq!(ticks.at(), vec![0], "one immediate refresh, no spinning");
    assert_eq!(poll.state(), PollState { enabled: true, interval_ms: 5000 });
}

#[tokio::test(start_paused = true)]
async fn change_interval_leaves_one_timer() {
    let ticks = Ticks::new(0);
    let mut poll = PollController::new("logs", ticks.clone());
    poll.start(5000.0);
    sleep(Duration::from_millis(10)).await;
    assert!(poll.change_interval(2000.0));
    sleep(Duration::from_millis(6005)).await;
    // nothing at 5000: the first timer is gone
    assert_eq!(ticks.at(), vec![0, 10, 2010, 4010, 6010]);
    assert_eq!(poll.state(), PollState { enabled: true, interval_ms: 2000 });
}

#[tokio::test(start_paused = true)]
async fn stop_halts_and_is_idempotent() {
    let ticks = Ticks::new(0);
    let mut poll = PollController::new("logs", ticks.clone());
    poll.start(1000.0);
    sleep(Duration::from_millis(2500)).await;
    assert!(poll.stop());
    assert!(!poll.stop());
    sleep(Duration::from_millis(5000)).await;
    assert_eq!(ticks.at(), vec![0, 1000, 2000]);
    assert_eq!(poll.state(), PollState { enabled: false, interval_ms: 1000 });
    assert!(!poll.change_interval(300.0), "no restart while stopped");
    assert!(!poll.is_running());
}

#[tokio::test(start_paused = true)]
async fn failures_do_not_end_polling() {
    let ticks = Ticks::new(2);
    let mut poll = PollController::new("logs", ticks.clone());
    poll.start(500.0);
    sleep(Duration::from_millis(1600)).await;
    assert_eq!(ticks.at(), vec![0, 500, 1000, 1500]);
    drop(poll);
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(ticks.at().len(), 4, "dropping the controller stops the loop");
}

#[tokio::test(start_paused = true)]
async fn stop_lets_in_flight_refresh_finish() {
    let slow = Arc::new(Slow { delay: Duration::from_millis(300), started: AtomicUsize::new(0), done: AtomicUsize::new(0) });
    let mut poll = PollController::new("logs", slow.clone());
    poll.start(1000.0);
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(slow.started.load(Ordering::SeqCst), 2);
    assert_eq!(slow.done.load(Ordering::SeqCst), 1, "second refresh still running");
    assert!(poll.stop());
    sleep(Duration::from_secs(10)).await;
    assert_eq!(slow.started.load(Ordering::SeqCst), 2, "nothing scheduled after stop");
    assert_eq!(slow.done.load(Ordering::SeqCst), 2, "in-flight refresh completed");
    assert!(!poll.is_running());
}

#[tokio::test(start_paused = true)]
async fn deferred_start_waits_one_interval() {
    let ticks = Ticks::new(0);
    let mut poll = PollController::new("logs", ticks.clone());
    assert_eq!(poll.start_deferred(1000.0), Duration::from_millis(1000));
    sleep(Duration::from_millis(500)).await;
    assert!(ticks.at().is_empty());
    sleep(Duration::from_millis(1600)).await;
    assert_eq!(ticks.at(), vec![1000, 2000]);
    assert_eq!(poll.state(), PollState { enabled: true, interval_ms: 1000 });
}

#[tokio::test(start_paused = true)]
async fn huge_interval_reports_the_cap() {
    let ticks = Ticks::new(0);
    let mut poll = PollController::new("logs", ticks.clone());
    assert_eq!(poll.start(1e300), MAX_POLL_INTERVAL);
    assert_eq!(poll.state(), PollState { enabled: true, interval_ms: 86_400_000 });
}
