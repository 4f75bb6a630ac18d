use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

pub const DEFAULT_QUIET: Duration = Duration::from_millis(200);

/// Latest-wins debounce. Each trigger supersedes the previous one: the older
/// pending task is aborted, and a task that already woke up re-checks the
/// generation before running, so a superseded callback never runs.
///
/// Must be triggered from within a tokio runtime.
pub struct Debouncer {
    quiet: Duration,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(quiet: Duration) -> Self {
        Self { quiet, generation: Arc::new(AtomicU64::new(0)), pending: Mutex::new(None) }
    }

    /// Schedule `f` after the quiet window unless another trigger arrives first.
    pub fn trigger<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let quiet = self.quiet;
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = pending.take() {
            prev.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if current.load(Ordering::SeqCst) != gen {
                trace!(gen, "debounce: superseded");
                return;
            }
            f();
        }));
    }

    /// Drop any pending callback without running it.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(prev) = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take() {
            prev.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Default for Debouncer {
    fn default() -> Self { Self::new(DEFAULT_QUIET) }
}

impl Drop for Debouncer {
    fn drop(&mut self) { self.cancel(); }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn FnOnce() + Send>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let make = move |v: &str| {
            let s = Arc::clone(&s);
            let v = v.to_string();
            Box::new(move || s.lock().unwrap().push(v)) as Box<dyn FnOnce() + Send>
        };
        (seen, make)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_triggers_collapse_to_latest() {
        let d = Debouncer::new(Duration::from_millis(200));
        let (seen, make) = recorder();
        for term in ["ab", "abc", "abcd"] {
            d.trigger(make(term));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["abcd".to_string()]);
        assert!(!d.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn triggers_outside_window_each_fire() {
        let d = Debouncer::new(Duration::from_millis(200));
        let (seen, make) = recorder();
        d.trigger(make("a"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        d.trigger(make("ab"));
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["a".to_string(), "ab".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_pending() {
        let d = Debouncer::new(Duration::from_millis(200));
        let (seen, make) = recorder();
        d.trigger(make("x"));
        assert!(d.is_pending());
        d.cancel();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(seen.lock().unwrap().is_empty());
    }
}
