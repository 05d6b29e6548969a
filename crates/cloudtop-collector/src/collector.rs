//! Concurrent collection across providers
//!
//! One collection call fans out to every selected provider on its own tokio
//! task. All tasks share a single deadline; a task still running when it
//! passes is dropped (cancelling its in-flight call) and recorded as
//! `DeadlineExceeded`. Each task returns its own outcome and the merge happens
//! on the calling task, so every queried provider ends up in exactly one of
//! `results` or `errors`.
//!
//! ```text
//! collect(request)
//!   ├── validate, resolve providers, deadline = now + timeout
//!   ├── JoinSet ── task(provider) ── cache? ─ hit ──────────────┐
//!   │                                  └ miss: health → list →  │
//!   │                                          metrics → cache  │
//!   └── merge ◄───────────────────────────────────────────────┘
//! ```

use crate::cache::{build_cache, instant_after, Cache};
use crate::config::CollectorConfig;
use crate::error::{CollectorError, Result};
use chrono::{DateTime, Utc};
use cloudtop_core::{
    Capability, Database, GpuFilter, GpuInstance, GpuOffering, MetricsRequest, Provider,
    ProviderError, Resource, ResourceFilter,
};
use futures::{FutureExt, Stream};
use serde::{Deserialize, Serialize, Serializer};
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Trailing window queried for metrics
const METRICS_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Granularity of metric datapoints
const METRICS_GRANULARITY: Duration = Duration::from_secs(60);

/// Lower bound for refresh stream periods
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Per-provider failures keyed by provider name
pub type ProviderErrors = BTreeMap<String, ProviderError>;

/// What to collect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectRequest {
    /// Provider subset; empty means every provider held by the collector
    #[serde(default)]
    pub providers: Vec<String>,

    /// Services of interest, forwarded to adapters with the filter
    #[serde(default)]
    pub services: Vec<String>,

    /// Metric names; empty skips the metrics step
    #[serde(default)]
    pub metric_types: Vec<String>,

    #[serde(default)]
    pub filter: ResourceFilter,

    /// Overall deadline; the collector default applies when unset
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl CollectRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(mut self, providers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.providers = providers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_services(mut self, services: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metric_types(mut self, metrics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.metric_types = metrics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_filter(mut self, filter: ResourceFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject structurally malformed requests
    pub fn validate(&self) -> Result<()> {
        if self.providers.iter().any(|name| name.trim().is_empty()) {
            return Err(CollectorError::invalid_request("provider names must not be blank"));
        }
        if self.metric_types.iter().any(|metric| metric.trim().is_empty()) {
            return Err(CollectorError::invalid_request("metric types must not be blank"));
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(CollectorError::invalid_request("timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Cache key for one provider's share of this request.
    ///
    /// Covers everything that shapes the provider result, filter included.
    pub fn cache_key(&self, provider: &str) -> String {
        format!(
            "{}:services={:?}:metrics={:?}:status={:?}:types={:?}:regions={:?}",
            provider,
            self.services,
            self.metric_types,
            self.filter.status,
            self.filter.types,
            self.filter.regions,
        )
    }

    /// Filter handed to adapters
    fn provider_filter(&self) -> ResourceFilter {
        ResourceFilter { services: self.services.clone(), ..self.filter.clone() }
    }
}

/// One provider's share of a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub provider: String,
    pub resources: Vec<Resource>,
    /// Metrics keyed by resource id
    pub metrics: HashMap<String, serde_json::Value>,
    /// Served from the cache
    pub cached: bool,
    /// Time spent on this provider (cache lookup only, on a hit)
    pub duration: Duration,
}

/// Merged outcome of one collection call
#[derive(Debug, Clone, Serialize)]
pub struct CollectResult {
    pub results: BTreeMap<String, ProviderResult>,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: ProviderErrors,
    pub timestamp: DateTime<Utc>,
    pub duration: Duration,
}

impl CollectResult {
    /// No provider failed
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn resource_count(&self) -> usize {
        self.results.values().map(|r| r.resources.len()).sum()
    }

    /// Every collected resource, in provider-name order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.results.values().flat_map(|r| r.resources.iter())
    }
}

fn serialize_errors<S: Serializer>(errors: &ProviderErrors, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(errors.iter().map(|(name, err)| (name, err.to_string())))
}

/// Fans requests out to providers and merges the answers
pub struct Collector {
    providers: BTreeMap<String, Arc<dyn Provider>>,
    cache: Arc<dyn Cache<ProviderResult>>,
    config: CollectorConfig,
}

impl Collector {
    /// Create a collector over initialized providers, with default settings
    pub fn new(
        providers: impl IntoIterator<Item = (String, Arc<dyn Provider>)>,
        cache: Arc<dyn Cache<ProviderResult>>,
    ) -> Self {
        Self { providers: providers.into_iter().collect(), cache, config: CollectorConfig::default() }
    }

    /// Create a collector whose cache is built from `config`
    pub fn from_config(
        providers: impl IntoIterator<Item = (String, Arc<dyn Provider>)>,
        config: CollectorConfig,
    ) -> Result<Self> {
        config.cache.validate()?;
        let cache = build_cache(&config.cache);
        Ok(Self::new(providers, cache).with_config(config))
    }

    /// Replace the timeout settings; the cache is left as constructed
    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn get_provider(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Every held provider, keyed by name
    pub fn get_providers(&self) -> &BTreeMap<String, Arc<dyn Provider>> {
        &self.providers
    }

    /// Names of held providers, sorted
    pub fn providers(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Collect resources (and optionally metrics) from the requested providers.
    ///
    /// Only a malformed request fails the call. Provider failures, timeouts
    /// and panics are reported per provider in `CollectResult::errors`.
    pub async fn collect(&self, request: &CollectRequest) -> Result<CollectResult> {
        request.validate()?;

        let started = Instant::now();
        let timestamp = Utc::now();
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        let deadline = instant_after(started, timeout);

        let (targets, unknown) = self.resolve(&request.providers);
        info!(
            providers = targets.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Starting collection"
        );

        let shared = Arc::new(request.clone());
        let cache = Arc::clone(&self.cache);
        let (results, mut errors) = fan_out(targets, deadline, move |name, provider| {
            collect_provider(name, provider, Arc::clone(&shared), Arc::clone(&cache))
        })
        .await;
        errors.extend(unknown);

        let duration = started.elapsed();
        info!(
            succeeded = results.len(),
            failed = errors.len(),
            elapsed_ms = duration.as_millis() as u64,
            "Collection complete"
        );

        Ok(CollectResult { results, errors, timestamp, duration })
    }

    /// GPU instances from every provider that lists them, filtered by `filter`
    pub async fn collect_gpu(&self, filter: &GpuFilter) -> (Vec<GpuInstance>, ProviderErrors) {
        let targets = self.with_capability(Capability::GpuInstances);
        debug!(providers = targets.len(), "Collecting GPU instances");

        let filter = Arc::new(filter.clone());
        let (results, errors) = fan_out(targets, self.default_deadline(), move |name, provider| {
            list_gpu_instances(name, provider, Arc::clone(&filter))
        })
        .await;

        (results.into_values().flatten().collect(), errors)
    }

    /// Rentable GPU offerings from every marketplace provider
    pub async fn collect_gpu_availability(&self) -> (Vec<GpuOffering>, ProviderErrors) {
        let targets = self.with_capability(Capability::GpuOfferings);
        debug!(providers = targets.len(), "Collecting GPU availability");

        let (results, errors) =
            fan_out(targets, self.default_deadline(), list_gpu_offerings).await;

        (results.into_values().flatten().collect(), errors)
    }

    /// Managed databases from every provider that lists them
    pub async fn collect_databases(&self) -> (Vec<Database>, ProviderErrors) {
        let targets = self.with_capability(Capability::Databases);
        debug!(providers = targets.len(), "Collecting databases");

        let (results, errors) = fan_out(targets, self.default_deadline(), list_databases).await;

        (results.into_values().flatten().collect(), errors)
    }

    /// Re-run `request` every `period` and yield each outcome.
    ///
    /// The first collection runs immediately. The stream ends after yielding
    /// an error (only a malformed request fails). Drop it to stop.
    pub fn refresh_stream(
        self: Arc<Self>,
        request: CollectRequest,
        period: Duration,
    ) -> Pin<Box<dyn Stream<Item = Result<CollectResult>> + Send>> {
        let period = period.max(MIN_REFRESH_INTERVAL);
        let collector = self;

        Box::pin(async_stream::stream! {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let outcome = collector.collect(&request).await;
                let failed = outcome.is_err();
                yield outcome;
                if failed {
                    break;
                }
            }
        })
    }

    /// Close every held provider; failures are logged and returned
    pub async fn close(&self) -> ProviderErrors {
        crate::session::close_providers(self.providers.values()).await
    }

    fn default_deadline(&self) -> Instant {
        instant_after(Instant::now(), self.config.default_timeout)
    }

    /// Explicit names (deduplicated) or every held provider. Names the
    /// collector does not hold come back as validation errors.
    fn resolve(&self, requested: &[String]) -> (Vec<(String, Arc<dyn Provider>)>, ProviderErrors) {
        if requested.is_empty() {
            let all = self.providers.iter().map(|(n, p)| (n.clone(), Arc::clone(p))).collect();
            return (all, ProviderErrors::new());
        }

        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        let mut unknown = ProviderErrors::new();
        for name in requested {
            if !seen.insert(name.as_str()) {
                continue;
            }
            match self.providers.get(name) {
                Some(provider) => targets.push((name.clone(), Arc::clone(provider))),
                None => {
                    warn!(provider = %name, "Requested provider is not configured");
                    unknown.insert(
                        name.clone(),
                        ProviderError::validation(name, "provider is not configured for this collection"),
                    );
                }
            }
        }
        (targets, unknown)
    }

    fn with_capability(&self, capability: Capability) -> Vec<(String, Arc<dyn Provider>)> {
        self.providers
            .iter()
            .filter(|(_, p)| p.capabilities().contains(capability))
            .map(|(n, p)| (n.clone(), Arc::clone(p)))
            .collect()
    }
}

/// Run `task` once per target on a `JoinSet`, bounded by `deadline`, and
/// partition the outcomes by provider name.
async fn fan_out<T, F, Fut>(
    targets: Vec<(String, Arc<dyn Provider>)>,
    deadline: Instant,
    mut task: F,
) -> (BTreeMap<String, T>, ProviderErrors)
where
    T: Send + 'static,
    F: FnMut(String, Arc<dyn Provider>) -> Fut,
    Fut: Future<Output = cloudtop_core::Result<T>> + Send + 'static,
{
    let started = Instant::now();
    let names: Vec<String> = targets.iter().map(|(name, _)| name.clone()).collect();

    let mut tasks = JoinSet::new();
    for (name, provider) in targets {
        let work = task(name.clone(), provider);
        tasks.spawn(async move {
            let outcome = match timeout_at(deadline, AssertUnwindSafe(work).catch_unwind()).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(panic)) => {
                    Err(ProviderError::internal(&name, format!("task panicked: {}", panic_message(&*panic))))
                }
                Err(_) => {
                    Err(ProviderError::DeadlineExceeded { provider: name.clone(), elapsed: started.elapsed() })
                }
            };
            (name, outcome)
        });
    }

    let mut results = BTreeMap::new();
    let mut errors = ProviderErrors::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(value))) => {
                results.insert(name, value);
            }
            Ok((name, Err(err))) => {
                warn!(provider = %name, error = %err, "Provider failed");
                errors.insert(name, err);
            }
            Err(err) => warn!(error = %err, "Collection task did not complete"),
        }
    }

    // A task lost to a join error still needs a slot.
    for name in names {
        if !results.contains_key(&name) && !errors.contains_key(&name) {
            errors.insert(name.clone(), ProviderError::internal(&name, "collection task did not complete"));
        }
    }

    (results, errors)
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

async fn collect_provider(
    name: String,
    provider: Arc<dyn Provider>,
    request: Arc<CollectRequest>,
    cache: Arc<dyn Cache<ProviderResult>>,
) -> cloudtop_core::Result<ProviderResult> {
    let started = Instant::now();
    let key = request.cache_key(&name);

    if let Some(mut hit) = cache.get(&key) {
        hit.cached = true;
        hit.duration = started.elapsed();
        debug!(provider = %name, "Serving cached result");
        return Ok(hit);
    }

    provider.health_check().await?;

    let filter = request.provider_filter();
    let resources: Vec<Resource> = provider
        .list_resources(&filter)
        .await?
        .into_iter()
        .filter(|resource| filter.matches(resource))
        .collect();

    let mut metrics = HashMap::new();
    if !request.metric_types.is_empty() && !resources.is_empty() {
        let ids = resources.iter().map(|r| r.id.clone()).collect();
        let query = MetricsRequest::trailing(
            ids,
            request.metric_types.clone(),
            METRICS_WINDOW,
            METRICS_GRANULARITY,
        );
        match provider.get_metrics(&query).await {
            Ok(response) => metrics = response.metrics,
            Err(err) => warn!(provider = %name, error = %err, "Metrics unavailable, continuing without"),
        }
    }

    let result = ProviderResult {
        provider: name.clone(),
        resources,
        metrics,
        cached: false,
        duration: started.elapsed(),
    };
    cache.set(&key, result.clone());

    debug!(
        provider = %name,
        resources = result.resources.len(),
        elapsed_ms = result.duration.as_millis() as u64,
        "Provider collected"
    );
    Ok(result)
}

async fn list_gpu_instances(
    name: String,
    provider: Arc<dyn Provider>,
    filter: Arc<GpuFilter>,
) -> cloudtop_core::Result<Vec<GpuInstance>> {
    let lister = provider
        .as_gpu_instances()
        .ok_or_else(|| ProviderError::internal(&name, "GPU instance listing not supported"))?;
    let gpus = lister.list_gpu_instances(&filter).await?;
    Ok(gpus.into_iter().filter(|gpu| filter.matches(gpu)).collect())
}

async fn list_gpu_offerings(
    name: String,
    provider: Arc<dyn Provider>,
) -> cloudtop_core::Result<Vec<GpuOffering>> {
    let lister = provider
        .as_gpu_offerings()
        .ok_or_else(|| ProviderError::internal(&name, "GPU availability not supported"))?;
    lister.gpu_availability().await
}

async fn list_databases(
    name: String,
    provider: Arc<dyn Provider>,
) -> cloudtop_core::Result<Vec<Database>> {
    let lister = provider
        .as_databases()
        .ok_or_else(|| ProviderError::internal(&name, "database listing not supported"))?;
    lister.list_databases().await
}
