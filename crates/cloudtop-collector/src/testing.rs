//! Mock providers for collector tests

use async_trait::async_trait;
use cloudtop_core::{
    Database, DatabaseLister, DatabaseMetrics, GpuFilter, GpuInstance, GpuInstanceLister,
    GpuMetrics, GpuOffering, GpuOfferingLister, Instance, MetricsRequest, MetricsResponse,
    Provider, ProviderConfig, ProviderError, Resource, ResourceFilter, Result,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Scriptable provider; every behaviour is set up front through builders
#[derive(Default)]
pub struct MockProvider {
    name: String,
    resources: Vec<Resource>,
    init_error: Option<ProviderError>,
    health_error: Option<ProviderError>,
    metrics_error: Option<ProviderError>,
    delay: Option<Duration>,
    hang: bool,
    panic: bool,
    gpus: Option<Vec<GpuInstance>>,
    offerings: Option<Vec<GpuOffering>>,
    databases: Option<Vec<Database>>,
    pub closed: AtomicBool,
    pub health_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub metrics_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), ..Default::default() }
    }

    /// `count` running instances named `<provider>-<i>`
    pub fn with_resources(mut self, count: usize) -> Self {
        self.resources = (0..count)
            .map(|i| {
                Resource::new(&self.name, format!("{}-{}", self.name, i), "instance")
                    .with_status("running")
                    .with_region("us-east-1")
            })
            .collect();
        self
    }

    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_init_error(mut self, err: ProviderError) -> Self {
        self.init_error = Some(err);
        self
    }

    pub fn with_health_error(mut self, err: ProviderError) -> Self {
        self.health_error = Some(err);
        self
    }

    pub fn with_metrics_error(mut self, err: ProviderError) -> Self {
        self.metrics_error = Some(err);
        self
    }

    /// Sleep before answering the health check
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Health check never completes
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Health check panics
    pub fn panicking(mut self) -> Self {
        self.panic = true;
        self
    }

    pub fn with_gpus(mut self, gpus: Vec<GpuInstance>) -> Self {
        self.gpus = Some(gpus);
        self
    }

    pub fn with_offerings(mut self, offerings: Vec<GpuOffering>) -> Self {
        self.offerings = Some(offerings);
        self
    }

    pub fn with_databases(mut self, databases: Vec<Database>) -> Self {
        self.databases = Some(databases);
        self
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self, _config: &ProviderConfig) -> Result<()> {
        match &self.init_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn health_check(&self) -> Result<()> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic {
            panic!("{} exploded", self.name);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.health_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    async fn list_resources(&self, _filter: &ResourceFilter) -> Result<Vec<Resource>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // Ignores the filter on purpose; the collector must apply it.
        Ok(self.resources.clone())
    }

    async fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse> {
        self.metrics_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.metrics_error {
            return Err(err.clone());
        }
        let mut response = MetricsResponse::empty(&self.name);
        response.metrics = request
            .resource_ids
            .iter()
            .map(|id| (id.clone(), json!({ "cpu": 12.5 })))
            .collect::<HashMap<_, _>>();
        Ok(response)
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn as_gpu_instances(&self) -> Option<&dyn GpuInstanceLister> {
        self.gpus.as_ref().map(|_| self as &dyn GpuInstanceLister)
    }

    fn as_gpu_offerings(&self) -> Option<&dyn GpuOfferingLister> {
        self.offerings.as_ref().map(|_| self as &dyn GpuOfferingLister)
    }

    fn as_databases(&self) -> Option<&dyn DatabaseLister> {
        self.databases.as_ref().map(|_| self as &dyn DatabaseLister)
    }
}

#[async_trait]
impl GpuInstanceLister for MockProvider {
    async fn list_gpu_instances(&self, _filter: &GpuFilter) -> Result<Vec<GpuInstance>> {
        self.health_check().await?;
        Ok(self.gpus.clone().unwrap_or_default())
    }

    async fn get_gpu_metrics(&self, instance_id: &str) -> Result<GpuMetrics> {
        Ok(GpuMetrics::new(&self.name, instance_id))
    }
}

#[async_trait]
impl GpuOfferingLister for MockProvider {
    async fn gpu_availability(&self) -> Result<Vec<GpuOffering>> {
        self.health_check().await?;
        Ok(self.offerings.clone().unwrap_or_default())
    }
}

#[async_trait]
impl DatabaseLister for MockProvider {
    async fn list_databases(&self) -> Result<Vec<Database>> {
        self.health_check().await?;
        Ok(self.databases.clone().unwrap_or_default())
    }

    async fn get_database_metrics(&self, database_id: &str) -> Result<DatabaseMetrics> {
        Ok(DatabaseMetrics::new(&self.name, database_id))
    }
}

pub fn gpu(provider: &str, id: &str, gpu_type: &str, state: &str, price: f64) -> GpuInstance {
    GpuInstance {
        instance: Instance {
            resource: Resource::new(provider, id, "gpu_instance").with_status(state),
            instance_type: format!("1x {}", gpu_type),
            cpu_cores: 8,
            memory_gb: 32.0,
            state: state.to_string(),
        },
        gpu_type: gpu_type.to_string(),
        gpu_count: 1,
        gpu_memory_gb: 24.0,
        price_per_hour: price,
    }
}

pub fn offering(provider: &str, gpu_type: &str, price: f64) -> GpuOffering {
    GpuOffering {
        provider: provider.to_string(),
        gpu_type: gpu_type.to_string(),
        gpu_count: 1,
        gpu_memory_gb: 80.0,
        cpu_cores: 16,
        memory_gb: 128.0,
        price_per_hour: price,
        available: true,
        region: "us-east".to_string(),
        instance_type: format!("1x {}", gpu_type),
    }
}

pub fn database(provider: &str, id: &str, engine: &str) -> Database {
    Database {
        resource: Resource::new(provider, id, "database").with_status("active"),
        engine: engine.to_string(),
        version: "16".to_string(),
        endpoint: format!("{}.{}.example.net", id, provider),
    }
}
