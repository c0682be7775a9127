//! Dependency health checking.
//!
//! # Responsibilities
//! - Run the supplied probe under a deadline
//! - Publish the outcome to the shared [`HealthCell`]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::time;

use crate::health::state::{HealthCell, HealthState};
use crate::observability::MetricFactory;
use crate::storage::{AdminStorage, StorageError};

/// Error reported by a probe implementation.
pub type ProbeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("health probe failed: {0}")]
    Probe(#[source] ProbeError),

    #[error("health probe did not answer within {0:?}")]
    Timeout(Duration),
}

/// Something whose health gates the node.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> Result<(), ProbeError>;
}

/// Probe that checks the admin database is reachable.
pub struct StorageProbe {
    admin: Arc<dyn AdminStorage>,
}

impl StorageProbe {
    pub fn new(admin: Arc<dyn AdminStorage>) -> Self {
        Self { admin }
    }
}

#[async_trait]
impl HealthProbe for StorageProbe {
    async fn check(&self) -> Result<(), ProbeError> {
        self.admin
            .check_database_accessible()
            .await
            .map_err(|e: StorageError| Box::new(e) as ProbeError)
    }
}

pub struct HealthMonitor {
    probe: Arc<dyn HealthProbe>,
    deadline: Duration,
    cell: HealthCell,
    metrics: MetricFactory,
}

impl HealthMonitor {
    pub fn new(probe: Arc<dyn HealthProbe>, deadline: Duration, metrics: MetricFactory) -> Self {
        Self {
            probe,
            deadline,
            cell: HealthCell::new(),
            metrics,
        }
    }

    /// Reader handle for the published state.
    pub fn cell(&self) -> HealthCell {
        self.cell.clone()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Probe once. A probe that outlives the deadline counts as unhealthy.
    pub async fn check(&self) -> Result<(), HealthError> {
        let result = match time::timeout(self.deadline, self.probe.check()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(HealthError::Probe(e)),
            Err(_) => Err(HealthError::Timeout(self.deadline)),
        };

        let state = if result.is_ok() {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        self.cell.publish(state, SystemTime::now());
        self.metrics.record_health(result.is_ok());

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Health check failed");
        }
        result
    }
}
