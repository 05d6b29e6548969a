//! Session setup and teardown
//!
//! Turns a registry plus per-provider configs into the initialized provider
//! set a [`Collector`](crate::Collector) works over. A provider that is
//! disabled, unregistered, or fails to initialize is skipped with a warning;
//! the session carries on with the rest.

use crate::collector::ProviderErrors;
use cloudtop_core::{Provider, ProviderConfig, Registry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Create and initialize every enabled provider in `configs`
pub async fn initialize_providers(
    registry: &Registry,
    configs: &[ProviderConfig],
) -> BTreeMap<String, Arc<dyn Provider>> {
    let mut providers: BTreeMap<String, Arc<dyn Provider>> = BTreeMap::new();

    for config in configs {
        let name = config.name.as_str();

        if !config.enabled {
            info!(provider = %name, "Provider disabled, skipping");
            continue;
        }

        let mut provider = match registry.create(name) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(provider = %name, error = %e, "Provider not available");
                continue;
            }
        };

        if let Err(e) = provider.initialize(config).await {
            warn!(provider = %name, error = %e, "Failed to initialize provider");
            continue;
        }

        providers.insert(name.to_string(), Arc::from(provider));
    }

    info!(count = providers.len(), "Providers initialized");
    providers
}

/// Close every provider; failures are logged and returned by provider name
pub async fn close_providers<'a, I>(providers: I) -> ProviderErrors
where
    I: IntoIterator<Item = &'a Arc<dyn Provider>>,
{
    let mut errors = ProviderErrors::new();

    for provider in providers {
        if let Err(e) = provider.close().await {
            warn!(provider = %provider.name(), error = %e, "Error closing provider");
            errors.insert(provider.name().to_string(), e);
        }
    }

    errors
}
