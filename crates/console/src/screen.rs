//! Per-screen controller: owns the cache handle, filter inputs, search term,
//! debouncer, poller and sinks, and wires them into one control flow.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};
use warden_api::{ActionResult, CollectionApi, ConsoleConfig, ConsoleError, ConsoleResult, Refresh};
use warden_core::{CacheSnapshot, QueryBuilder, QueryParams, Record, RecordId, SelectionSet};
use warden_ops::{BulkActionOrchestrator, BulkRun, PollController, PollState, ReasonPolicy, ReasonResolver};
use warden_search::{Debouncer, LiveFilter};
use warden_store::Collection;

use crate::catalog::{BulkAction, ScreenKind, ScreenSpec};
use crate::model::{ScreenUpdate, StatusKind, StatusLine};
use crate::sinks::{RenderSink, StatusSink};
use crate::summary::summarize;

/// Cache, live filter and render sink. Shared with the debouncer task and
/// handed to the orchestrator and poller as their refresh capability.
struct View {
    collection: Collection,
    filter: LiveFilter,
    term: Mutex<String>,
    render: Arc<dyn RenderSink>,
}

impl View {
    fn term(&self) -> String { self.term.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    fn set_term(&self, term: &str) {
        *self.term.lock().unwrap_or_else(PoisonError::into_inner) = term.to_string();
    }

    fn visible(&self) -> (String, Vec<Record>, Arc<CacheSnapshot>) {
        let snap = self.collection.current();
        let term = self.term();
        let rows = self.filter.filter(&snap.items, &term);
        (term, rows, snap)
    }

    fn render_visible(&self) {
        let (term, rows, snap) = self.visible();
        debug!(collection = %self.collection.path(), term = %term, rows = rows.len(), "view: render");
        self.render.render(ScreenUpdate::Visible { term, rows, total: snap.total_or_len() });
    }
}

#[async_trait::async_trait]
impl Refresh for View {
    async fn refresh(&self) -> ConsoleResult<()> {
        self.collection.refresh().await?;
        self.render_visible();
        Ok(())
    }
}

pub struct ScreenController {
    spec: &'static ScreenSpec,
    api: Arc<dyn CollectionApi>,
    view: Arc<View>,
    status: Arc<dyn StatusSink>,
    page_size: u32,
    poll_ms: u64,
    inputs: Mutex<BTreeMap<String, String>>,
    debouncer: Debouncer,
    poll: Mutex<PollController>,
    bulk: BulkActionOrchestrator,
}

impl ScreenController {
    pub fn new(
        kind: ScreenKind,
        api: Arc<dyn CollectionApi>,
        config: &ConsoleConfig,
        render: Arc<dyn RenderSink>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let spec = kind.spec();
        let view = Arc::new(View {
            collection: Collection::new(Arc::clone(&api), spec.collection),
            filter: LiveFilter::new(spec.search_fields.iter().copied()),
            term: Mutex::new(String::new()),
            render,
        });
        let refresher: Arc<dyn Refresh> = view.clone();
        let quiet = Duration::from_millis(spec.debounce_ms.unwrap_or(config.debounce_ms));
        Self {
            spec,
            api,
            status,
            page_size: config.page_size,
            poll_ms: config.poll_ms,
            inputs: Mutex::new(BTreeMap::new()),
            debouncer: Debouncer::new(quiet),
            poll: Mutex::new(PollController::new(spec.collection, Arc::clone(&refresher))),
            bulk: BulkActionOrchestrator::new(refresher),
            view,
        }
    }

    pub fn kind(&self) -> ScreenKind { self.spec.kind }
    pub fn spec(&self) -> &'static ScreenSpec { self.spec }
    pub fn snapshot(&self) -> Arc<CacheSnapshot> { self.view.collection.current() }

    /// Initial load. Polling screens then start their loop one interval later;
    /// a failed load is reported and leaves polling off.
    pub async fn on_ready(&self) -> ConsoleResult<()> {
        info!(screen = %self.spec.kind, "screen: ready");
        self.apply_filters().await?;
        if self.spec.poll_by_default {
            let mut poll = self.lock_poll();
            poll.start_deferred(self.poll_ms as f64);
            self.view.render.render(ScreenUpdate::Poll(poll.state()));
        }
        Ok(())
    }

    /// Record a raw filter input. Blank values clear the filter on the next apply.
    pub fn set_filter(&self, name: &str, raw: &str) -> ConsoleResult<()> {
        let name = name.trim();
        if !self.spec.has_filter(name) {
            return Err(ConsoleError::Validation(format!("{} has no filter '{}'", self.spec.kind, name)));
        }
        self.lock_inputs().insert(name.to_string(), raw.to_string());
        Ok(())
    }

    pub fn clear_filters(&self) { self.lock_inputs().clear(); }

    /// Query the next fetch will use, built from the current inputs.
    pub fn query(&self) -> QueryParams {
        let inputs = self.lock_inputs().clone();
        QueryBuilder::from_inputs(inputs, self.page_size)
    }

    /// Refetch with the current inputs and render. Failures go to the status
    /// sink and back to the caller; the previous cache stays visible.
    pub async fn apply_filters(&self) -> ConsoleResult<Arc<CacheSnapshot>> {
        let query = self.query();
        self.view.collection.set_query(query);
        match self.view.collection.refresh().await {
            Ok(snap) => {
                self.view.render_visible();
                Ok(snap)
            }
            Err(e) => {
                self.report(StatusKind::Bad, format!("{}: load failed: {}", self.spec.kind, e));
                Err(e)
            }
        }
    }

    /// Keystroke in the search box. Only the last term within the quiet window is rendered.
    pub fn on_search_input(&self, term: &str) {
        let view = Arc::clone(&self.view);
        let term = term.to_string();
        self.debouncer.trigger(move || {
            view.set_term(&term);
            view.render_visible();
        });
    }

    /// Apply a search term right away, bypassing the debounce.
    pub fn set_search(&self, term: &str) {
        self.debouncer.cancel();
        self.view.set_term(term);
        self.view.render_visible();
    }

    pub fn search_term(&self) -> String { self.view.term() }

    pub fn visible(&self) -> Vec<Record> { self.view.visible().1 }

    /// Every row currently shown ("select all" honours the live filter).
    pub fn select_visible(&self) -> SelectionSet { self.visible().iter().map(|r| r.id).collect() }

    /// Run `action` over `ids`, then report the summary and render it.
    pub async fn bulk(
        &self,
        action: BulkAction,
        ids: &SelectionSet,
        resolver: &dyn ReasonResolver,
    ) -> ConsoleResult<BulkRun> {
        if !self.spec.supports(action) {
            return Err(ConsoleError::Validation(format!("{} does not support '{}'", self.spec.kind, action)));
        }
        let collection = self.spec.collection;
        let api = &self.api;
        let run = self
            .bulk
            .run_with_reason(action.name(), ids, action.reason_policy(), resolver, |id, reason| async move {
                api.mutate(collection, id, action.operation(), action.payload(reason.as_deref())).await
            })
            .await;
        let line = summarize(action, &run);
        if let Some(report) = run.report() {
            self.view.render.render(ScreenUpdate::Report { action, report: *report });
        }
        self.status.status(line);
        Ok(run)
    }

    /// Fetch one record for a detail view. Errors are surfaced, not absorbed.
    pub async fn detail(&self, id: RecordId) -> ConsoleResult<Record> {
        match self.api.get(self.spec.collection, id).await {
            Ok(rec) => {
                self.view.render.render(ScreenUpdate::Detail(rec.clone()));
                Ok(rec)
            }
            Err(e) => {
                self.report(StatusKind::Bad, format!("{} #{}: {}", self.spec.kind, id, e));
                Err(e)
            }
        }
    }

    /// Single-item action. The mutation error propagates; on success the
    /// cache is refreshed and a failed reload only downgrades the status line.
    pub async fn act_one(&self, id: RecordId, action: BulkAction, reason: Option<&str>) -> ConsoleResult<ActionResult> {
        if !self.spec.supports(action) {
            return Err(ConsoleError::Validation(format!("{} does not support '{}'", self.spec.kind, action)));
        }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        if action.reason_policy() == ReasonPolicy::Required && reason.is_none() {
            return Err(ConsoleError::Validation(format!("{} needs a reason", action)));
        }
        counter!("console_single_actions_total", 1u64);
        let result = match self.api.mutate(self.spec.collection, id, action.operation(), action.payload(reason)).await {
            Ok(r) => r,
            Err(e) => {
                self.report(StatusKind::Bad, format!("{} #{} failed: {}", action, id, e));
                return Err(e);
            }
        };
        let mut line = if result.secondary_failed() {
            StatusLine::new(StatusKind::Warn, format!("{} #{}; notification not delivered", action.past_tense(), id))
        } else {
            StatusLine::new(StatusKind::Ok, format!("{} #{}", action.past_tense(), id))
        };
        if let Err(e) = self.view.refresh().await {
            warn!(screen = %self.spec.kind, error = %e, "screen: reload after action failed");
            line = StatusLine::new(StatusKind::Warn, format!("{}; reload failed: {}", line.text, e));
        }
        self.status.status(line);
        Ok(result)
    }

    /// Start (or restart) polling with the current filter inputs. Returns the
    /// interval in effect.
    pub fn start_polling(&self, interval_ms: f64) -> Duration {
        self.view.collection.set_query(self.query());
        let mut poll = self.lock_poll();
        let period = poll.start(interval_ms);
        self.view.render.render(ScreenUpdate::Poll(poll.state()));
        period
    }

    pub fn stop_polling(&self) -> bool {
        let mut poll = self.lock_poll();
        let stopped = poll.stop();
        if stopped {
            self.view.render.render(ScreenUpdate::Poll(poll.state()));
        }
        stopped
    }

    pub fn change_poll_interval(&self, interval_ms: f64) -> bool {
        let mut poll = self.lock_poll();
        let changed = poll.change_interval(interval_ms);
        if changed {
            self.view.render.render(ScreenUpdate::Poll(poll.state()));
        }
        changed
    }

    pub fn poll_state(&self) -> PollState { self.lock_poll().state() }

    fn report(&self, kind: StatusKind, text: String) {
        self.status.status(StatusLine::new(kind, text));
    }

    fn lock_inputs(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.inputs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_poll(&self) -> std::sync::MutexGuard<'_, PollController> {
        self.poll.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
