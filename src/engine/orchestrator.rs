//! Delta proxy cache orchestration
//!
//! One request runs through:
//!
//! ```text
//! parse -> key -> load entry -> compute deltas -> fetch (concurrent)
//!       -> merge -> store (under key lock) -> trim -> fast-forward splice
//! ```
//!
//! Per-delta failures degrade to partial or stale responses; a request only
//! fails when no usable data remains.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::{derive_key, CacheEntry, CacheStore};
use crate::engine::clock::{Clock, SystemClock};
use crate::engine::error::{ProxyError, ProxyResult};
use crate::engine::fast_forward::{self, FastForwardStatus};
use crate::engine::outcome::{CacheStatus, DeltaResponse, Warning};
use crate::origin::{Backend, OriginError, OriginFetcher, UpstreamRequest};
use crate::timeseries::extent::any_overlap;
use crate::timeseries::merge::{crop_head, crop_tail};
use crate::timeseries::{
    align_down, compute_deltas, merge, trim, Extent, Fragment, Series, TimeRangeQuery,
};

/// Engine tuning
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for each individual origin fetch
    pub fetch_timeout: Duration,
    /// Allow fast-forward when the request asks for it
    pub fast_forward: bool,
    /// Recent data younger than this is served but not cached
    pub backfill_tolerance_ms: i64,
    /// Keep at most this many steps per entry; 0 keeps everything
    pub retention_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            fast_forward: true,
            backfill_tolerance_ms: 0,
            retention_steps: 1024,
        }
    }
}

/// The delta proxy cache
pub struct DeltaProxyCache {
    backend: Arc<dyn Backend>,
    origin: Arc<dyn OriginFetcher>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl DeltaProxyCache {
    pub fn new(
        backend: Arc<dyn Backend>,
        origin: Arc<dyn OriginFetcher>,
        cache: Arc<dyn CacheStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            origin,
            cache,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Encode a served series in the backend's wire format
    pub fn encode(&self, series: &Series) -> ProxyResult<Vec<u8>> {
        self.backend
            .encode(series)
            .map_err(|e| ProxyError::Encode(e.to_string()))
    }

    /// Serve a time range request
    ///
    /// `want_fast_forward` is the per-request opt-in; it only takes effect when
    /// the engine allows it and the request reaches the current step.
    pub async fn handle(
        &self,
        request: &UpstreamRequest,
        want_fast_forward: bool,
    ) -> ProxyResult<DeltaResponse> {
        let query = self.backend.parse_time_range_query(request)?;
        let key = derive_key(self.backend.name(), &query.statement, query.step);
        let step = query.step;
        let now = self.clock.now_millis();

        // The open step is the newest one worth asking for
        let aligned = query.aligned_extent();
        let normalized = match Extent::try_new(aligned.start, aligned.end.min(align_down(now, step)))
        {
            Some(extent) => extent,
            None => {
                debug!(key = %key, extent = %query.extent, "Request lies in the future, proxying");
                return self.proxy_only(request, query, key, aligned, Vec::new()).await;
            }
        };

        let entry = match self.cache.get(&key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => CacheEntry::empty(key.as_str()),
            Err(e) => {
                let err = ProxyError::CacheStoreUnavailable(e.to_string());
                warn!(key = %key, error = %err, "Bypassing cache");
                let warnings = vec![Warning::CacheBypassed(e.to_string())];
                return self.proxy_only(request, query, key, normalized, warnings).await;
            }
        };

        let deltas = compute_deltas(&normalized, &entry.extents, step);
        let status = classify(&entry, &normalized, &deltas);
        debug!(
            key = %key,
            requested = %normalized,
            cached = entry.extents.len(),
            deltas = deltas.len(),
            status = %status,
            "Computed deltas"
        );

        let use_fast_forward = want_fast_forward
            && self.config.fast_forward
            && fast_forward::reaches_now(&query.extent, now, step);

        let (results, ff_result) = tokio::join!(
            self.fetch_deltas(request, &query, &deltas),
            self.fetch_fast_forward(request, &query, now, use_fast_forward),
        );

        let mut fragments = Vec::with_capacity(deltas.len());
        let mut failed = Vec::new();
        for (extent, result) in deltas.iter().zip(results) {
            match result {
                Ok(series) => fragments.push(Fragment::new(*extent, series)),
                Err(e) => {
                    let err = ProxyError::UpstreamFetchFailed {
                        extent: *extent,
                        reason: e.to_string(),
                    };
                    warn!(key = %key, error = %err, "Delta fetch failed");
                    failed.push(*extent);
                }
            }
        }

        let mut warnings = Vec::new();
        let (mut view, status) = if deltas.is_empty() {
            (trim(&entry.series, &query.extent), CacheStatus::Hit)
        } else if fragments.is_empty() {
            if !any_overlap(&entry.extents, &normalized) {
                warn!(key = %key, failed = failed.len(), "All fetches failed, nothing cached");
                return Err(ProxyError::UpstreamUnavailable);
            }
            warn!(key = %key, "All fetches failed, serving stale cache");
            warnings.push(Warning::Stale);
            (trim(&entry.series, &query.extent), CacheStatus::Stale)
        } else {
            if !failed.is_empty() {
                warnings.push(Warning::PartialResult { missing: failed });
            }
            let merged = self.merge_and_store(&key, &entry, &fragments, step, now).await;
            (trim(&merged, &query.extent), status)
        };

        let ff_status = match ff_result {
            None => FastForwardStatus::Off,
            Some(Err(e)) => {
                warn!(key = %key, error = %e, "Fast-forward fetch failed");
                FastForwardStatus::Error
            }
            Some(Ok(series)) => match fast_forward::extract(&series, step) {
                Some(value) => {
                    if fast_forward::apply(&mut view, value, &query.extent) {
                        FastForwardStatus::Hit
                    } else {
                        FastForwardStatus::Miss
                    }
                }
                None => FastForwardStatus::Miss,
            },
        };

        info!(
            key = %key,
            status = %status,
            ffstatus = %ff_status,
            points = view.len(),
            "Served delta proxy request"
        );

        Ok(DeltaResponse {
            query,
            key,
            series: view,
            status,
            fast_forward: ff_status,
            deltas,
            warnings,
        })
    }

    /// Fetch every delta concurrently, each under its own deadline
    async fn fetch_deltas(
        &self,
        request: &UpstreamRequest,
        query: &TimeRangeQuery,
        deltas: &[Extent],
    ) -> Vec<Result<Series, OriginError>> {
        let fetches = deltas.iter().map(|extent| {
            let mut outbound = request.clone();
            self.backend.set_extent(&mut outbound, query, extent);
            async move { self.fetch_with_timeout(&outbound, query, extent).await }
        });
        join_all(fetches).await
    }

    async fn fetch_fast_forward(
        &self,
        request: &UpstreamRequest,
        query: &TimeRangeQuery,
        now: i64,
        enabled: bool,
    ) -> Option<Result<Series, OriginError>> {
        if !enabled {
            return None;
        }
        let window = fast_forward::window(now, query.step);
        let outbound = self.backend.fast_forward_request(request, query, &window);
        Some(self.fetch_with_timeout(&outbound, query, &window).await)
    }

    async fn fetch_with_timeout(
        &self,
        outbound: &UpstreamRequest,
        query: &TimeRangeQuery,
        extent: &Extent,
    ) -> Result<Series, OriginError> {
        match tokio::time::timeout(
            self.config.fetch_timeout,
            self.origin.fetch(outbound, query, extent),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(OriginError::Timeout),
        }
    }

    /// Merge fragments into the entry and persist it
    ///
    /// The entry is re-read under the key lock so writes from concurrent
    /// requests for the same key are not lost. Returns the full merged series
    /// before any persistence cropping.
    async fn merge_and_store(
        &self,
        key: &str,
        loaded: &CacheEntry,
        fragments: &[Fragment],
        step: i64,
        now: i64,
    ) -> Series {
        let guard = match self.cache.lock(key).await {
            Ok(guard) => guard,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache lock unavailable, skipping store");
                let (series, _) = merge(&loaded.series, &loaded.extents, fragments, step);
                return series;
            }
        };

        let base = match self.cache.get(key).await {
            Ok(Some(current)) => current,
            Ok(None) => loaded.clone(),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache re-read failed, merging loaded entry");
                loaded.clone()
            }
        };

        let (series, extents) = merge(&base.series, &base.extents, fragments, step);
        let (kept, coverage) = self.persistable(&series, &extents, step, now);

        if coverage.is_empty() {
            debug!(key = %key, "Nothing old enough to cache");
        } else {
            let entry = CacheEntry {
                key: key.to_string(),
                extents: coverage,
                series: kept,
                last_access: now,
            };
            match self.cache.set(&entry).await {
                Ok(()) => debug!(key = %key, extents = entry.extents.len(), "Stored entry"),
                Err(e) => warn!(key = %key, error = %e, "Failed to store entry"),
            }
        }
        drop(guard);

        series
    }

    /// Crop a merged series down to what may be cached
    ///
    /// Drops the open step (and anything inside the backfill tolerance), then
    /// keeps at most `retention_steps` steps ending at the newest coverage.
    fn persistable(
        &self,
        series: &Series,
        extents: &[Extent],
        step: i64,
        now: i64,
    ) -> (Series, Vec<Extent>) {
        let cutoff = align_down(now.saturating_sub(self.config.backfill_tolerance_ms), step) - step;
        let (series, extents) = crop_tail(series, extents, cutoff);

        if self.config.retention_steps == 0 {
            return (series, extents);
        }
        match extents.last() {
            Some(newest) => {
                let span = (self.config.retention_steps as i64 - 1).saturating_mul(step);
                crop_head(&series, &extents, newest.end.saturating_sub(span))
            }
            None => (series, extents),
        }
    }

    /// Fetch the request straight from the origin, bypassing the cache
    async fn proxy_only(
        &self,
        request: &UpstreamRequest,
        query: TimeRangeQuery,
        key: String,
        extent: Extent,
        warnings: Vec<Warning>,
    ) -> ProxyResult<DeltaResponse> {
        let mut outbound = request.clone();
        self.backend.set_extent(&mut outbound, &query, &extent);

        match self.fetch_with_timeout(&outbound, &query, &extent).await {
            Ok(series) => Ok(DeltaResponse {
                series: trim(&series, &query.extent),
                query,
                key,
                status: CacheStatus::ProxyOnly,
                fast_forward: FastForwardStatus::Off,
                deltas: vec![extent],
                warnings,
            }),
            Err(e) => {
                warn!(key = %key, error = %e, "Proxy fetch failed");
                Err(ProxyError::UpstreamUnavailable)
            }
        }
    }
}

fn classify(entry: &CacheEntry, requested: &Extent, deltas: &[Extent]) -> CacheStatus {
    if entry.is_empty() {
        CacheStatus::KeyMiss
    } else if deltas.is_empty() {
        CacheStatus::Hit
    } else if !any_overlap(&entry.extents, requested) {
        CacheStatus::RangeMiss
    } else {
        CacheStatus::PartialHit
    }
}
