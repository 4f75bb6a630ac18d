//! Bulk actions: one operation applied concurrently to every selected id.
//!
//! Every call is awaited to settlement; a rejected item never aborts its
//! siblings. Once all calls have settled the owning collection is refreshed
//! exactly once, whatever the outcome mix.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::{info, warn};
use warden_api::{ActionResult, ConsoleError, ConsoleResult, Refresh};
use warden_core::{RecordId, SelectionSet};

use crate::reason::{ReasonPolicy, ReasonRequest, ReasonResolver};

/// Settled result of one item's action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Fulfilled(ActionResult),
    Rejected(ConsoleError),
}

impl From<ConsoleResult<ActionResult>> for ActionOutcome {
    fn from(r: ConsoleResult<ActionResult>) -> Self {
        match r {
            Ok(v) => ActionOutcome::Fulfilled(v),
            Err(e) => ActionOutcome::Rejected(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub id: RecordId,
    pub outcome: ActionOutcome,
}

/// Aggregate of a batch. `secondary_failed` counts fulfilled items whose side
/// effect was not delivered and is never folded into `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub succeeded: usize,
    pub failed: usize,
    pub secondary_failed: usize,
}

impl BulkReport {
    pub fn total(&self) -> usize { self.succeeded + self.failed }
    pub fn is_clean(&self) -> bool { self.failed == 0 && self.secondary_failed == 0 }
}

/// Tally settled outcomes.
pub fn aggregate<'a, I>(outcomes: I) -> BulkReport
where
    I: IntoIterator<Item = &'a ActionOutcome>,
{
    outcomes.into_iter().fold(BulkReport::default(), |mut acc, o| {
        match o {
            ActionOutcome::Fulfilled(r) => {
                acc.succeeded += 1;
                if r.secondary_failed() { acc.secondary_failed += 1; }
            }
            ActionOutcome::Rejected(_) => acc.failed += 1,
        }
        acc
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkRun {
    /// Empty selection: nothing dispatched, nothing refreshed.
    NothingSelected,
    /// The reason prompt was cancelled: nothing dispatched, nothing refreshed.
    Cancelled,
    Completed {
        report: BulkReport,
        outcomes: Vec<ItemOutcome>,
        /// Failure of the post-batch refresh, if any. The report stands either way.
        refresh_error: Option<ConsoleError>,
    },
}

impl BulkRun {
    pub fn report(&self) -> Option<&BulkReport> {
        match self {
            BulkRun::Completed { report, .. } => Some(report),
            _ => None,
        }
    }
}

pub struct BulkActionOrchestrator {
    refresher: Arc<dyn Refresh>,
}

impl BulkActionOrchestrator {
    pub fn new(refresher: Arc<dyn Refresh>) -> Self { Self { refresher } }

    /// Run `action` for every id in `ids`.
    pub async fn run<F, Fut>(&self, label: &str, ids: &SelectionSet, action: F) -> BulkRun
    where
        F: Fn(RecordId) -> Fut,
        Fut: Future<Output = ConsoleResult<ActionResult>>,
    {
        if ids.is_empty() {
            info!(action = %label, "bulk: nothing selected");
            return BulkRun::NothingSelected;
        }
        self.dispatch(label, ids, action).await
    }

    /// Like [`run`](Self::run), but first resolves one reason for the whole
    /// batch and hands the same reason to every call.
    pub async fn run_with_reason<F, Fut>(
        &self,
        label: &str,
        ids: &SelectionSet,
        policy: ReasonPolicy,
        resolver: &dyn ReasonResolver,
        action: F,
    ) -> BulkRun
    where
        F: Fn(RecordId, Option<String>) -> Fut,
        Fut: Future<Output = ConsoleResult<ActionResult>>,
    {
        if ids.is_empty() {
            info!(action = %label, "bulk: nothing selected");
            return BulkRun::NothingSelected;
        }
        let reason = if policy == ReasonPolicy::None {
            None
        } else {
            let request = ReasonRequest { action: label.to_string(), count: ids.len(), policy };
            match resolver.resolve(&request).await.resolve_for(policy) {
                Some(reason) => reason,
                None => {
                    info!(action = %label, count = ids.len(), "bulk: reason prompt cancelled");
                    return BulkRun::Cancelled;
                }
            }
        };
        self.dispatch(label, ids, |id| action(id, reason.clone())).await
    }

    async fn dispatch<F, Fut>(&self, label: &str, ids: &SelectionSet, action: F) -> BulkRun
    where
        F: Fn(RecordId) -> Fut,
        Fut: Future<Output = ConsoleResult<ActionResult>>,
    {
        let t0 = Instant::now();
        info!(action = %label, count = ids.len(), "bulk: dispatch start");
        let calls = ids.iter().map(|id| {
            let call = action(id);
            async move { ItemOutcome { id, outcome: call.await.into() } }
        });
        let outcomes = join_all(calls).await;
        let report = aggregate(outcomes.iter().map(|o| &o.outcome));
        for o in &outcomes {
            if let ActionOutcome::Rejected(e) = &o.outcome {
                warn!(action = %label, id = o.id, error = %e, "bulk: item failed");
            }
        }
        counter!("bulk_items_total", report.total() as u64);
        counter!("bulk_items_failed_total", report.failed as u64);
        counter!("bulk_secondary_failed_total", report.secondary_failed as u64);

        // single refresh, strictly after every call has settled
        let refresh_error = self.refresher.refresh().await.err();
        if let Some(e) = &refresh_error {
            warn!(action = %label, error = %e, "bulk: post-batch refresh failed");
        }
        histogram!("bulk_run_ms", t0.elapsed().as_secs_f64() * 1000.0);
        info!(
            action = %label,
            succeeded = report.succeeded,
            failed = report.failed,
            secondary_failed = report.secondary_failed,
            took_ms = %t0.elapsed().as_millis(),
            "bulk: done"
        );
        BulkRun::Completed { report, outcomes, refresh_error }
    }
}
