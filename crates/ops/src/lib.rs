//! Warden Ops: bulk actions over an admin selection and timer-driven refresh.

#![forbid(unsafe_code)]

use tokio::sync::oneshot;

pub mod bulk;
pub mod poll;
pub mod reason;

pub use bulk::{aggregate, ActionOutcome, BulkActionOrchestrator, BulkReport, BulkRun, ItemOutcome};
pub use poll::{sanitize_interval, PollController, PollState, DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL};
pub use reason::{FixedReason, ReasonChoice, ReasonPolicy, ReasonRequest, ReasonResolver};

/// Cancellation handle for a background loop. Dropping it cancels as well.
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl CancelHandle {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn cancel(mut self) {
        if let Some(tx) = self.tx.take() { let _ = tx.send(()); }
    }
}
