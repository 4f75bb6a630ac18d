use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use warden_api::{ActionResult, ConsoleError, ConsoleResult, Refresh};
use warden_core::SelectionSet;
use warden_ops::{
    ActionOutcome, BulkActionOrchestrator, BulkReport, BulkRun, FixedReason, ReasonChoice, ReasonPolicy,
    ReasonRequest, ReasonResolver,
};

/// Counts refreshes and records how many actions had settled at each.
#[derive(Default)]
struct Probe {
    refreshes: AtomicUsize,
    settled: Arc<AtomicUsize>,
    seen_settled: Mutex<Vec<usize>>,
    fail: bool,
}

#[async_trait::async_trait]
impl Refresh for Probe {
    async fn refresh(&self) -> ConsoleResult<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.seen_settled.lock().unwrap().push(self.settled.load(Ordering::SeqCst));
        if self.fail { Err(ConsoleError::Transport("refresh down".into())) } else { Ok(()) }
    }
}

fn ids(raw: &[u64]) -> SelectionSet { raw.iter().copied().collect() }

#[tokio::test]
async fn empty_selection_dispatches_nothing() {
    let probe = Arc::new(Probe::default());
    let orch = BulkActionOrchestrator::new(probe.clone());
    let calls = AtomicUsize::new(0);
    let run = orch
        .run("publish", &SelectionSet::new(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(ActionResult::ok()) }
        })
        .await;
    assert_eq!(run, BulkRun::NothingSelected);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(probe.refreshes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn one_rejection_in_three_is_isolated() {
    let probe = Arc::new(Probe::default());
    let orch = BulkActionOrchestrator::new(probe.clone());
    let run = orch
        .run("publish", &ids(&[3, 7, 9]), |id| async move {
            if id == 7 { Err(ConsoleError::Conflict("locked".into())) } else { Ok(ActionResult::ok()) }
        })
        .await;
    assert_eq!(run.report(), Some(&BulkReport { succeeded: 2, failed: 1, secondary_failed: 0 }));
    assert_eq!(probe.refreshes.load(Ordering::SeqCst), 1);
    match run {
        BulkRun::Completed { outcomes, refresh_error, .. } => {
            assert!(refresh_error.is_none());
            let rejected: Vec<_> = outcomes
                .iter()
                .filter(|o| matches!(o.outcome, ActionOutcome::Rejected(_)))
                .map(|o| o.id)
                .collect();
            assert_eq!(rejected, vec![7]);
        }
        other => panic!("unexpected run: {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn refresh_waits_for_every_call_to_settle() {
    let probe = Arc::new(Probe::default());
    let settled = Arc::clone(&probe.settled);
    let orch = BulkActionOrchestrator::new(probe.clone());
    let selection = ids(&[1, 2, 3, 4, 5, 6]);
    let run = orch
        .run("approve", &selection, |id| {
            let settled = Arc::clone(&settled);
            async move {
                // reverse completion order relative to dispatch
                tokio::time::sleep(Duration::from_millis(100 - id * 10)).await;
                settled.fetch_add(1, Ordering::SeqCst);
                if id % 3 == 0 { Err(ConsoleError::Transport("timeout".into())) } else { Ok(ActionResult::ok()) }
            }
        })
        .await;
    assert_eq!(run.report(), Some(&BulkReport { succeeded: 4, failed: 2, secondary_failed: 0 }));
    assert_eq!(*probe.seen_settled.lock().unwrap(), vec![6]);
}

#[tokio::test]
async fn undelivered_notifications_are_counted_separately() {
    let probe = Arc::new(Probe::default());
    let orch = BulkActionOrchestrator::new(probe.clone());
    let run = orch
        .run("review", &ids(&[10, 11, 12, 13, 14]), |id| async move {
            Ok(ActionResult::with_delivery(id % 2 == 0))
        })
        .await;
    assert_eq!(run.report(), Some(&BulkReport { succeeded: 5, failed: 0, secondary_failed: 2 }));
}

#[tokio::test]
async fn refresh_failure_does_not_hide_the_report() {
    let probe = Arc::new(Probe { fail: true, ..Probe::default() });
    let orch = BulkActionOrchestrator::new(probe.clone());
    let run = orch.run("unpublish", &ids(&[1, 2]), |_| async { Ok(ActionResult::ok()) }).await;
    match run {
        BulkRun::Completed { report, refresh_error, .. } => {
            assert_eq!(report.succeeded, 2);
            assert!(matches!(refresh_error, Some(ConsoleError::Transport(_))));
        }
        other => panic!("unexpected run: {:?}", other),
    }
}

struct CountingResolver {
    asked: AtomicUsize,
    answer: ReasonChoice,
}

#[async_trait::async_trait]
impl ReasonResolver for CountingResolver {
    async fn resolve(&self, request: &ReasonRequest) -> ReasonChoice {
        assert_eq!(request.count, 3);
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

#[tokio::test]
async fn reason_is_resolved_once_and_shared() {
    let probe = Arc::new(Probe::default());
    let orch = BulkActionOrchestrator::new(probe.clone());
    let resolver = CountingResolver { asked: AtomicUsize::new(0), answer: ReasonChoice::Provided(Some(" spam ".into())) };
    let seen = Mutex::new(Vec::new());
    let run = orch
        .run_with_reason("reject", &ids(&[4, 5, 6]), ReasonPolicy::Required, &resolver, |id, reason| {
            seen.lock().unwrap().push((id, reason));
            async { Ok(ActionResult::ok()) }
        })
        .await;
    assert_eq!(resolver.asked.load(Ordering::SeqCst), 1);
    assert_eq!(run.report().map(|r| r.succeeded), Some(3));
    let seen = seen.into_inner().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|(_, r)| r.as_deref() == Some("spam")));
}

#[tokio::test]
async fn cancelled_or_blank_required_reason_aborts_batch() {
    for resolver in [FixedReason::cancelled(), FixedReason::given("   ")] {
        let probe = Arc::new(Probe::default());
        let orch = BulkActionOrchestrator::new(probe.clone());
        let calls = AtomicUsize::new(0);
        let run = orch
            .run_with_reason("reject", &ids(&[1, 2, 3]), ReasonPolicy::Required, &resolver, |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ActionResult::ok()) }
            })
            .await;
        assert_eq!(run, BulkRun::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(probe.refreshes.load(Ordering::SeqCst), 0);
    }
}

#[tokio::test]
async fn empty_selection_never_prompts() {
    let probe = Arc::new(Probe::default());
    let orch = BulkActionOrchestrator::new(probe);
    let resolver = CountingResolver { asked: AtomicUsize::new(0), answer: ReasonChoice::Cancelled };
    let run = orch
        .run_with_reason("reject", &SelectionSet::new(), ReasonPolicy::Required, &resolver, |_, _| async {
            Ok(ActionResult::ok())
        })
        .await;
    assert_eq!(run, BulkRun::NothingSelected);
    assert_eq!(resolver.asked.load(Ordering::SeqCst), 0);
}
