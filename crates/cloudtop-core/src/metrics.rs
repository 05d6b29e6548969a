//! Typed metric snapshots returned by the GPU and database extensions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metrics for every GPU attached to one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuMetrics {
    pub resource_id: String,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    pub gpus: Vec<GpuDeviceMetrics>,
}

impl GpuMetrics {
    pub fn new(provider: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            provider: provider.into(),
            timestamp: Utc::now(),
            gpus: Vec::new(),
        }
    }

    /// Mean utilization across devices, `None` when no device reported
    pub fn average_utilization(&self) -> Option<f64> {
        if self.gpus.is_empty() {
            return None;
        }
        let total: f64 = self.gpus.iter().map(|g| g.gpu_utilization_percent).sum();
        Some(total / self.gpus.len() as f64)
    }
}

/// A single GPU device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuDeviceMetrics {
    pub device_id: u32,
    pub name: String,
    pub gpu_utilization_percent: f64,
    pub memory_utilization_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub temperature_celsius: f64,
    pub power_usage_watts: f64,
    pub power_limit_watts: f64,
    pub clock_speed_mhz: u32,
    pub memory_clock_mhz: u32,
}

/// Point-in-time database health
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseMetrics {
    pub resource_id: String,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    pub active_connections: u32,
    pub max_connections: u32,
    pub idle_connections: u32,
    pub queries_per_second: f64,
    pub avg_query_duration_ms: f64,
    pub slow_queries: u64,
    pub database_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hit_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_lag_ms: Option<f64>,
}

impl DatabaseMetrics {
    pub fn new(provider: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            provider: provider.into(),
            timestamp: Utc::now(),
            active_connections: 0,
            max_connections: 0,
            idle_connections: 0,
            queries_per_second: 0.0,
            avg_query_duration_ms: 0.0,
            slow_queries: 0,
            database_size_bytes: 0,
            cache_hit_ratio: None,
            replication_lag_ms: None,
        }
    }
}
