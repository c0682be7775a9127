//! Quota charging in front of every RPC.

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::observability::MetricFactory;
use crate::quota::{QuotaKind, QuotaManager, QuotaSpec};

#[derive(Clone)]
pub struct QuotaGate {
    manager: Arc<dyn QuotaManager>,
    dry_run: bool,
    metrics: MetricFactory,
}

impl QuotaGate {
    pub fn new(manager: Arc<dyn QuotaManager>, dry_run: bool, metrics: MetricFactory) -> Self {
        Self {
            manager,
            dry_run,
            metrics,
        }
    }
}

fn request_kind(method: &Method) -> QuotaKind {
    if method == Method::GET || method == Method::HEAD {
        QuotaKind::Read
    } else {
        QuotaKind::Write
    }
}

/// Charge one global token per request. Denials become 429 unless the
/// gate is in dry-run mode.
pub async fn charge_quota(State(gate): State<QuotaGate>, request: Request, next: Next) -> Response {
    let spec = QuotaSpec::global(request_kind(request.method()));

    match gate.manager.get_tokens(1, std::slice::from_ref(&spec)).await {
        Ok(()) => next.run(request).await,
        Err(e) => {
            gate.metrics.record_quota_denial(gate.dry_run);
            if gate.dry_run {
                tracing::warn!(quota = %spec, error = %e, "Quota exhausted (dry run, allowing)");
                next.run(request).await
            } else {
                tracing::warn!(quota = %spec, error = %e, "Quota exhausted");
                (StatusCode::TOO_MANY_REQUESTS, e.to_string()).into_response()
            }
        }
    }
}
