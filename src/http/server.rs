//! Secondary HTTP transport.
//!
//! # Endpoints
//! - `GET /healthz`: runs a fresh health probe; 200 `ok` or 503 with the reason
//! - `GET /metrics`: Prometheus text exposition
//! - `GET /debug/vars`: JSON snapshot of build, uptime, health and GC state

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tower_http::trace::TraceLayer;

use crate::gc::GcStatus;
use crate::health::{HealthMonitor, HealthState};
use crate::observability::MetricFactory;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<HealthMonitor>,
    pub metrics: MetricFactory,
    pub gc_status: GcStatus,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(monitor: Arc<HealthMonitor>, metrics: MetricFactory, gc_status: GcStatus) -> Self {
        Self {
            monitor,
            metrics,
            gc_status,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/debug/vars", get(debug_vars))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz(State(state): State<AppState>) -> Response {
    match state.monitor.check().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub struct DebugVars {
    pub version: &'static str,
    pub uptime_secs: u64,
    pub health: HealthVars,
    pub last_sweep: Option<SweepVars>,
}

#[derive(Debug, Serialize)]
pub struct HealthVars {
    pub state: HealthState,
    pub last_checked_unix_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SweepVars {
    pub finished_unix_secs: u64,
    pub trees_considered: usize,
    pub trees_deleted: usize,
    pub errors: usize,
}

fn unix_secs(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

async fn debug_vars(State(state): State<AppState>) -> Json<DebugVars> {
    let health = state.monitor.cell().snapshot();
    let last_sweep = state.gc_status.last().map(|report| SweepVars {
        finished_unix_secs: unix_secs(report.finished_at),
        trees_considered: report.trees_considered,
        trees_deleted: report.trees_deleted,
        errors: report.errors,
    });

    Json(DebugVars {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        health: HealthVars {
            state: health.state,
            last_checked_unix_secs: health.last_checked_at.map(unix_secs),
        },
        last_sweep,
    })
}
