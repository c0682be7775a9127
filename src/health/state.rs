//! Dependency health state.
//!
//! # States
//! - Unknown: no probe has completed yet
//! - Healthy: last probe succeeded within its deadline
//! - Unhealthy: last probe failed or timed out
//!
//! # Design Decisions
//! - Single writer (the monitor), many readers
//! - State and timestamp are published together as one snapshot

use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

/// A health state together with the moment it was observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub state: HealthState,
    pub last_checked_at: Option<SystemTime>,
}

impl HealthSnapshot {
    fn unknown() -> Self {
        Self {
            state: HealthState::Unknown,
            last_checked_at: None,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }
}

/// Shared cell holding the latest [`HealthSnapshot`].
#[derive(Debug, Clone)]
pub struct HealthCell {
    inner: Arc<ArcSwap<HealthSnapshot>>,
}

impl HealthCell {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(HealthSnapshot::unknown())),
        }
    }

    /// Read a consistent snapshot.
    pub fn snapshot(&self) -> Arc<HealthSnapshot> {
        self.inner.load_full()
    }

    pub(crate) fn publish(&self, state: HealthState, at: SystemTime) {
        self.inner.store(Arc::new(HealthSnapshot {
            state,
            last_checked_at: Some(at),
        }));
    }
}

impl Default for HealthCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unknown() {
        let cell = HealthCell::new();
        let snap = cell.snapshot();
        assert_eq!(snap.state, HealthState::Unknown);
        assert!(snap.last_checked_at.is_none());
    }

    #[test]
    fn publish_replaces_state_and_time_together() {
        let cell = HealthCell::new();
        let reader = cell.clone();
        let at = SystemTime::now();

        cell.publish(HealthState::Healthy, at);

        let snap = reader.snapshot();
        assert!(snap.is_healthy());
        assert_eq!(snap.last_checked_at, Some(at));
    }
}
