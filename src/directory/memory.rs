//! In-process directory.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Directory, DirectoryError, Endpoint, Registration};

/// Directory kept in a shared map; clones observe the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    services: Arc<DashMap<String, BTreeSet<String>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Addresses currently announced under `service`.
    pub fn addresses(&self, service: &str) -> Vec<String> {
        self.services
            .get(service)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn announce(&self, endpoint: &Endpoint) -> Result<Registration, DirectoryError> {
        self.services
            .entry(endpoint.service.clone())
            .or_default()
            .insert(endpoint.address.clone());
        tracing::info!(endpoint = %endpoint, "Announced endpoint");

        let services = Arc::clone(&self.services);
        let announced = endpoint.clone();
        Ok(Registration::new(endpoint.clone(), move || async move {
            if let Some(mut set) = services.get_mut(&announced.service) {
                set.remove(&announced.address);
            }
            services.remove_if(&announced.service, |_, set| set.is_empty());
            tracing::info!(endpoint = %announced, "Deregistered endpoint");
            Ok(())
        }))
    }
}
