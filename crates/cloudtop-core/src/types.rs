//! Normalized data model shared by every provider adapter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A normalized remote object (VM, worker, bucket, pod, database branch...)
///
/// Produced fresh on every provider call and never mutated afterwards. `id`
/// must be stable across calls so callers can dedupe on `(provider, id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub provider: String,
    pub region: String,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Resource {
    pub fn new(
        provider: impl Into<String>,
        id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            resource_type: resource_type.into(),
            provider: provider.into(),
            region: String::new(),
            status: String::new(),
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_timestamps(
        mut self,
        created_at: Option<DateTime<Utc>>,
        updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }
}

/// A compute instance (VM, pod, container host)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(flatten)]
    pub resource: Resource,
    pub instance_type: String,
    pub cpu_cores: u32,
    pub memory_gb: f64,
    pub state: String,
}

/// A GPU instance owned or rented by the account (running or stopped)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInstance {
    #[serde(flatten)]
    pub instance: Instance,
    pub gpu_type: String,
    pub gpu_count: u32,
    pub gpu_memory_gb: f64,
    pub price_per_hour: f64,
}

/// A rentable GPU configuration; has no owner and is never a [`GpuInstance`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuOffering {
    pub provider: String,
    pub gpu_type: String,
    pub gpu_count: u32,
    pub gpu_memory_gb: f64,
    pub cpu_cores: u32,
    pub memory_gb: f64,
    pub price_per_hour: f64,
    pub available: bool,
    pub region: String,
    pub instance_type: String,
}

/// A managed database (project, branch, cluster)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(flatten)]
    pub resource: Resource,
    pub engine: String,
    pub version: String,
    pub endpoint: String,
}

/// A service offered by a provider (workers, r2, pods, serverless...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub capabilities: Vec<String>,
}

/// Filter applied to listed resources
///
/// An empty list means "no constraint" for that field. Matching is
/// case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFilter {
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    /// Requested services; a hint for adapters, not checked by `matches`
    #[serde(default)]
    pub services: Vec<String>,
}

impl ResourceFilter {
    pub fn with_status(mut self, status: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.status = status.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_regions(mut self, regions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_empty() && self.types.is_empty() && self.regions.is_empty()
    }

    /// Whether `resource` passes every non-empty constraint
    pub fn matches(&self, resource: &Resource) -> bool {
        any_eq(&self.status, &resource.status)
            && any_eq(&self.types, &resource.resource_type)
            && any_eq(&self.regions, &resource.region)
    }
}

/// Filter for GPU instance listings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuFilter {
    #[serde(default)]
    pub gpu_types: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
    /// Maximum hourly price; 0 means no cap
    #[serde(default)]
    pub max_price: f64,
    #[serde(default)]
    pub min_gpu_count: u32,
}

impl GpuFilter {
    /// Only running instances
    pub fn running() -> Self {
        Self { states: vec!["running".to_string()], ..Default::default() }
    }

    pub fn matches(&self, gpu: &GpuInstance) -> bool {
        any_eq(&self.gpu_types, &gpu.gpu_type)
            && any_eq(&self.states, &gpu.instance.state)
            && (self.max_price <= 0.0 || gpu.price_per_hour <= self.max_price)
            && gpu.gpu_count >= self.min_gpu_count
    }
}

fn any_eq(allowed: &[String], value: &str) -> bool {
    allowed.is_empty() || allowed.iter().any(|a| a.eq_ignore_ascii_case(value))
}

/// Batch metrics query for a set of resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRequest {
    pub resource_ids: Vec<String>,
    pub metric_names: Vec<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub granularity: Duration,
}

impl MetricsRequest {
    /// Query the trailing `window` ending now
    pub fn trailing(
        resource_ids: Vec<String>,
        metric_names: Vec<String>,
        window: Duration,
        granularity: Duration,
    ) -> Self {
        let end_time = Utc::now();
        let start_time = end_time
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::zero());
        Self { resource_ids, metric_names, start_time, end_time, granularity }
    }
}

/// Metrics returned by a provider, keyed by resource id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub provider: String,
    pub metrics: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub cached: bool,
}

impl MetricsResponse {
    pub fn empty(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            metrics: HashMap::new(),
            timestamp: Utc::now(),
            cached: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(gpu_type: &str, state: &str, price: f64, count: u32) -> GpuInstance {
        GpuInstance {
            instance: Instance {
                resource: Resource::new("vastai", "i-1", "gpu_instance").with_status(state),
                instance_type: "1x RTX 4090".to_string(),
                cpu_cores: 16,
                memory_gb: 64.0,
                state: state.to_string(),
            },
            gpu_type: gpu_type.to_string(),
            gpu_count: count,
            gpu_memory_gb: 24.0,
            price_per_hour: price,
        }
    }

    #[test]
    fn test_empty_resource_filter_matches_everything() {
        let r = Resource::new("neon", "br-1", "database").with_status("active");
        assert!(ResourceFilter::default().matches(&r));
        assert!(ResourceFilter::default().is_empty());
    }

    #[test]
    fn test_resource_filter_is_case_insensitive() {
        let r = Resource::new("gcp", "vm-1", "compute")
            .with_status("RUNNING")
            .with_region("us-central1");

        let filter = ResourceFilter::default().with_status(["running", "active"]);
        assert!(filter.matches(&r));

        let filter = filter.with_regions(["europe-west1"]);
        assert!(!filter.matches(&r));
    }

    #[test]
    fn test_gpu_filter() {
        let a100 = gpu("A100", "running", 1.9, 1);
        assert!(GpuFilter::default().matches(&a100));
        assert!(GpuFilter::running().matches(&a100));

        let cheap = GpuFilter { max_price: 1.0, ..Default::default() };
        assert!(!cheap.matches(&a100));

        let multi = GpuFilter { min_gpu_count: 4, ..Default::default() };
        assert!(!multi.matches(&a100));

        let stopped = gpu("A100", "exited", 1.9, 1);
        assert!(!GpuFilter::running().matches(&stopped));
    }

    #[test]
    fn test_resource_serializes_type_field() {
        let r = Resource::new("cloudflare", "w-1", "worker").with_name("api");
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"type\":\"worker\""));
        assert!(json.contains("\"name\":\"api\""));
    }

    #[test]
    fn test_trailing_metrics_window() {
        let req = MetricsRequest::trailing(
            vec!["vm-1".to_string()],
            vec!["cpu".to_string()],
            Duration::from_secs(300),
            Duration::from_secs(60),
        );
        assert_eq!((req.end_time - req.start_time).num_seconds(), 300);
        assert_eq!(req.granularity, Duration::from_secs(60));
    }
}
