//! The orchestrator handle and the machinery every operation shares.

use crate::payload;
use crate::requests::ReadOptions;
use crate::stats::{StatsRecorder, StatsSnapshot};
use quarry_cache::{keys, tags, CacheRead, ResponseCache};
use quarry_core::config::RATE_WINDOW;
use quarry_core::{ItemId, QuarryConfig, QuarryResult, QueryExpression, TtlPolicy};
use quarry_transport::{HttpTransport, RateGovernor, Transport, TransportRequest};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Path of the query endpoint every translated expression is sent to.
pub(crate) const QUERY_PATH: &str = "/v3/items/query";

/// Client-side request orchestrator.
///
/// Owns the response cache, the rate governor and the call statistics for one
/// remote service. Clones share all of that state, so one instance can be
/// handed to every concurrent caller.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::new(&QuarryConfig::from_env()?)?;
/// let criteria = FilterCriteria::new().with_projects([123]).with_statuses(["Open"]);
/// let open = orchestrator.query_items(&criteria, ReadOptions::default()).await?;
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    governor: RateGovernor,
    stats: StatsRecorder,
    ttls: TtlPolicy,
    /// Longest a call may wait for a rate slot; `None` waits indefinitely.
    acquire_timeout: Option<Duration>,
}

/// How one primitive read is cached.
pub(crate) struct CachePlan {
    pub key: String,
    pub ttl: Duration,
    pub tags: Vec<String>,
    /// Also tag the entry with every item id found in the payload.
    pub tag_payload_items: bool,
}

impl CachePlan {
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl,
            tags: Vec::new(),
            tag_payload_items: false,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn tagging_items(mut self) -> Self {
        self.tag_payload_items = true;
        self
    }
}

impl Orchestrator {
    /// Build an orchestrator talking HTTP to the configured service.
    pub fn new(config: &QuarryConfig) -> QuarryResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build an orchestrator over any transport.
    ///
    /// # Errors
    /// Returns a configuration error if `config` does not validate.
    pub fn with_transport(
        config: &QuarryConfig,
        transport: Arc<dyn Transport>,
    ) -> QuarryResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                cache: ResponseCache::new(config.default_cache_ttl),
                governor: RateGovernor::new(config.max_calls_per_minute, RATE_WINDOW),
                stats: StatsRecorder::new(),
                ttls: config.ttls.clone(),
                acquire_timeout: config.acquire_timeout,
            }),
        })
    }

    // ========================================================================
    // ADMINISTRATION
    // ========================================================================

    /// Drop cached entries whose key starts with `prefix`, or everything.
    pub fn invalidate(&self, prefix: Option<&str>) -> usize {
        self.inner.cache.invalidate(prefix)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner
            .stats
            .snapshot(self.inner.cache.len(), self.inner.governor.remaining())
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    pub fn governor(&self) -> &RateGovernor {
        &self.inner.governor
    }

    pub(crate) fn ttls(&self) -> &TtlPolicy {
        &self.inner.ttls
    }

    pub(crate) fn default_ttl(&self) -> Duration {
        self.inner.cache.default_ttl()
    }

    // ========================================================================
    // PRIMITIVE CALLS
    // ========================================================================

    /// Take a rate slot and perform one primitive call.
    pub(crate) async fn call(&self, request: TransportRequest) -> QuarryResult<Value> {
        let waited = match self.inner.acquire_timeout {
            Some(timeout) => self.inner.governor.acquire_within(timeout).await?,
            None => self.inner.governor.acquire().await,
        };
        self.inner.stats.record_call();
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            waited_ms = waited.as_millis() as u64,
            "primitive call"
        );
        Ok(self.inner.transport.call(request).await?)
    }

    /// Serve a primitive read from cache, or call and cache the response.
    ///
    /// A failed call leaves the cache untouched.
    pub(crate) async fn cached_read(
        &self,
        plan: CachePlan,
        options: ReadOptions,
        request: TransportRequest,
    ) -> QuarryResult<CacheRead<Value>> {
        if !options.bypass_cache {
            if let Some(hit) = self.inner.cache.get_read(&plan.key) {
                self.inner.stats.record_hit();
                tracing::debug!(key = %plan.key, "cache hit");
                return Ok(hit);
            }
        }
        self.inner.stats.record_miss();
        tracing::debug!(key = %plan.key, bypass = options.bypass_cache, "cache miss");

        let value = self.call(request).await?;

        let mut entry_tags = plan.tags;
        if plan.tag_payload_items {
            entry_tags.extend(payload::item_ids(&value).into_iter().map(tags::item));
        }
        self.inner.cache.set_tagged(
            plan.key,
            value.clone(),
            Some(options.ttl.unwrap_or(plan.ttl)),
            entry_tags,
        );
        Ok(CacheRead::from_origin(value))
    }

    /// One page of a translated query, cached under the expression digest.
    pub(crate) async fn run_query(
        &self,
        expression: &QueryExpression,
        page_size: u32,
        ttl: Duration,
        options: ReadOptions,
    ) -> QuarryResult<CacheRead<Value>> {
        let plan = CachePlan::new(keys::query(expression, page_size), ttl).tagging_items();
        self.cached_read(plan, options, query_request(expression, page_size))
            .await
    }

    /// Drop every cached read that may hold data of the given items.
    ///
    /// Runs only after the write that changed them succeeded.
    pub(crate) fn invalidate_items(&self, ids: impl IntoIterator<Item = ItemId>) -> usize {
        let cache = &self.inner.cache;
        let ids: BTreeSet<ItemId> = ids.into_iter().collect();
        let mut removed = 0;
        for id in &ids {
            removed += cache.invalidate(Some(&keys::item_prefix(*id)));
            removed += cache.invalidate_tag(&tags::item(*id));
        }
        // Field changes may move items in or out of any query result.
        removed += cache.invalidate(Some(keys::QUERY_PREFIX));
        tracing::debug!(items = ids.len(), removed, "invalidated item reads");
        removed
    }
}

/// First page of a translated query.
pub(crate) fn query_request(expression: &QueryExpression, page_size: u32) -> TransportRequest {
    TransportRequest::post(
        QUERY_PATH,
        json!({
            "queryString": expression.text(),
            "page": 1,
            "pageSize": page_size,
        }),
    )
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cache_entries", &self.inner.cache.len())
            .field("governor", &self.inner.governor)
            .field("acquire_timeout", &self.inner.acquire_timeout)
            .finish()
    }
}
