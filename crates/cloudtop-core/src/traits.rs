//! Provider capability model
//!
//! The [`Provider`] trait defines the interface ALL adapters implement. Optional
//! roles (GPU instances, GPU offerings, databases) are separate extension
//! traits; a provider advertises them through [`Provider::capabilities`] and
//! hands out the typed extension through the matching `as_*` accessor. The
//! collector works through these interfaces only, never concrete types.

use async_trait::async_trait;

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::metrics::{DatabaseMetrics, GpuMetrics};
use crate::types::*;

/// A role a provider may play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// `list_resources` (every provider)
    Resources,
    /// `get_metrics` returns real data
    Metrics,
    /// [`GpuInstanceLister`]
    GpuInstances,
    /// [`GpuOfferingLister`]
    GpuOfferings,
    /// [`DatabaseLister`]
    Databases,
}

impl Capability {
    const fn bit(self) -> u8 {
        match self {
            Capability::Resources => 1 << 0,
            Capability::Metrics => 1 << 1,
            Capability::GpuInstances => 1 << 2,
            Capability::GpuOfferings => 1 << 3,
            Capability::Databases => 1 << 4,
        }
    }
}

/// Set of [`Capability`] values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Just `Resources`
    pub const BASE: Capabilities = Capabilities(Capability::Resources.bit());

    pub const fn empty() -> Self {
        Capabilities(0)
    }

    pub const fn with(self, capability: Capability) -> Self {
        Capabilities(self.0 | capability.bit())
    }

    pub const fn contains(self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }
}

impl FromIterator<Capability> for Capabilities {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Capabilities::empty(), Capabilities::with)
    }
}

/// All adapters must implement this trait.
///
/// Lifecycle: constructed by a registry factory, `initialize`d once with its
/// config (fail fast on missing credentials), shared read-only across
/// concurrent calls, then `close`d.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique registry name
    fn name(&self) -> &str;

    /// Roles this provider supports.
    ///
    /// The default derives the set from the `as_*` accessors, so adapters
    /// only override it to add [`Capability::Metrics`].
    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::BASE;
        if self.as_gpu_instances().is_some() {
            caps = caps.with(Capability::GpuInstances);
        }
        if self.as_gpu_offerings().is_some() {
            caps = caps.with(Capability::GpuOfferings);
        }
        if self.as_databases().is_some() {
            caps = caps.with(Capability::Databases);
        }
        caps
    }

    /// Validate config and set up clients
    async fn initialize(&mut self, config: &ProviderConfig) -> Result<()>;

    /// Cheap authenticated round trip
    async fn health_check(&self) -> Result<()>;

    async fn list_services(&self) -> Result<Vec<Service>> {
        Ok(Vec::new())
    }

    async fn list_resources(&self, filter: &ResourceFilter) -> Result<Vec<Resource>>;

    /// Metrics for a batch of resources. Providers without metrics support
    /// return an empty response.
    async fn get_metrics(&self, request: &MetricsRequest) -> Result<MetricsResponse> {
        let _ = request;
        Ok(MetricsResponse::empty(self.name()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn as_gpu_instances(&self) -> Option<&dyn GpuInstanceLister> {
        None
    }

    fn as_gpu_offerings(&self) -> Option<&dyn GpuOfferingLister> {
        None
    }

    fn as_databases(&self) -> Option<&dyn DatabaseLister> {
        None
    }
}

/// Lists GPU instances owned by the account
#[async_trait]
pub trait GpuInstanceLister: Send + Sync {
    async fn list_gpu_instances(&self, filter: &GpuFilter) -> Result<Vec<GpuInstance>>;

    async fn get_gpu_metrics(&self, instance_id: &str) -> Result<GpuMetrics>;
}

/// Lists rentable GPU configurations
#[async_trait]
pub trait GpuOfferingLister: Send + Sync {
    async fn gpu_availability(&self) -> Result<Vec<GpuOffering>>;
}

/// Lists managed databases
#[async_trait]
pub trait DatabaseLister: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<Database>>;

    async fn get_database_metrics(&self, database_id: &str) -> Result<DatabaseMetrics>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    #[async_trait]
    impl Provider for Plain {
        fn name(&self) -> &str {
            "plain"
        }
        async fn initialize(&mut self, _config: &ProviderConfig) -> Result<()> {
            Ok(())
        }
        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
        async fn list_resources(&self, _filter: &ResourceFilter) -> Result<Vec<Resource>> {
            Ok(Vec::new())
        }
    }

    struct Market;

    #[async_trait]
    impl Provider for Market {
        fn name(&self) -> &str {
            "market"
        }
        async fn initialize(&mut self, _config: &ProviderConfig) -> Result<()> {
            Ok(())
        }
        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
        async fn list_resources(&self, _filter: &ResourceFilter) -> Result<Vec<Resource>> {
            Ok(Vec::new())
        }
        fn as_gpu_offerings(&self) -> Option<&dyn GpuOfferingLister> {
            Some(self)
        }
    }

    #[async_trait]
    impl GpuOfferingLister for Market {
        async fn gpu_availability(&self) -> Result<Vec<GpuOffering>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_capability_set() {
        let caps: Capabilities = [Capability::Resources, Capability::Databases]
            .into_iter()
            .collect();
        assert!(caps.contains(Capability::Resources));
        assert!(caps.contains(Capability::Databases));
        assert!(!caps.contains(Capability::GpuInstances));
        assert!(!Capabilities::empty().contains(Capability::Resources));
    }

    #[test]
    fn test_default_capabilities_follow_accessors() {
        let plain = Plain.capabilities();
        assert_eq!(plain, Capabilities::BASE);

        let market = Market.capabilities();
        assert!(market.contains(Capability::GpuOfferings));
        assert!(!market.contains(Capability::GpuInstances));
        assert!(Market.as_gpu_offerings().is_some());
    }

    #[tokio::test]
    async fn test_default_metrics_are_empty() {
        let req = MetricsRequest::trailing(
            vec!["x".to_string()],
            vec!["cpu".to_string()],
            std::time::Duration::from_secs(300),
            std::time::Duration::from_secs(60),
        );
        let resp = Plain.get_metrics(&req).await.unwrap();
        assert_eq!(resp.provider, "plain");
        assert!(resp.metrics.is_empty());
    }
}
