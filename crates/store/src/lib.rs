//! Warden store: the per-screen collection cache.
//!
//! A [`Collection`] is the single writer of its cache. Orchestration code never
//! writes rows directly; it asks for a refresh, and a successful fetch swaps in
//! a whole new [`CacheSnapshot`].

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwap;
use metrics::{counter, histogram};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use warden_api::{CollectionApi, ConsoleResult, Refresh};
use warden_core::{CacheSnapshot, QueryParams, QueryBuilder};

pub struct Collection {
    api: Arc<dyn CollectionApi>,
    path: String,
    query: Mutex<QueryParams>,
    snap: ArcSwap<CacheSnapshot>,
    // issued request sequence / last sequence written to the cache
    issued: AtomicU64,
    applied: Mutex<u64>,
    epoch_tx: watch::Sender<u64>,
}

impl Collection {
    /// New collection with an empty cache and a default (unfiltered) query.
    pub fn new(api: Arc<dyn CollectionApi>, path: impl Into<String>) -> Self {
        let (epoch_tx, _rx) = watch::channel(0u64);
        Self {
            api,
            path: path.into(),
            query: Mutex::new(QueryBuilder::default().build()),
            snap: ArcSwap::from_pointee(CacheSnapshot::default()),
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
            epoch_tx,
        }
    }

    pub fn path(&self) -> &str { &self.path }

    pub fn current(&self) -> Arc<CacheSnapshot> { self.snap.load_full() }

    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_tx.subscribe() }

    pub fn query(&self) -> QueryParams {
        self.query.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Replace the query used by subsequent refreshes. Does not fetch.
    pub fn set_query(&self, query: QueryParams) {
        *self.query.lock().unwrap_or_else(PoisonError::into_inner) = query;
    }

    /// Fetch with the current query and replace the cache on success. On
    /// failure the previous cache stays in place. When refreshes overlap, a
    /// response older than the one already cached is discarded.
    pub async fn refresh(&self) -> ConsoleResult<Arc<CacheSnapshot>> {
        let seq = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let query = self.query();
        let t0 = Instant::now();
        debug!(collection = %self.path, seq, query = %query, "refresh: start");
        let page = match self.api.fetch(&self.path, &query).await {
            Ok(page) => page,
            Err(e) => {
                counter!("store_refresh_errors_total", 1u64);
                warn!(collection = %self.path, seq, error = %e, "refresh: fetch failed; cache kept");
                return Err(e);
            }
        };
        histogram!("store_refresh_ms", t0.elapsed().as_secs_f64() * 1000.0);
        let mut applied = self.applied.lock().unwrap_or_else(PoisonError::into_inner);
        if seq < *applied {
            debug!(collection = %self.path, seq, applied = *applied, "refresh: stale response dropped");
            return Ok(self.current());
        }
        *applied = seq;
        let epoch = self.snap.load().epoch.saturating_add(1);
        let next = Arc::new(CacheSnapshot::new(epoch, page.items, page.total));
        self.snap.store(Arc::clone(&next));
        drop(applied);
        let _ = self.epoch_tx.send(epoch);
        counter!("store_refresh_total", 1u64);
        info!(collection = %self.path, epoch, items = next.len(), total = next.total_or_len(), took_ms = %t0.elapsed().as_millis(), "refresh: cache replaced");
        Ok(next)
    }
}

#[async_trait::async_trait]
impl Refresh for Collection {
    async fn refresh(&self) -> ConsoleResult<()> {
        Collection::refresh(self).await.map(|_| ())
    }
}
