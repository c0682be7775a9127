//! Tree administration RPCs.
//!
//! ```text
//! GET    /v1/trees[?include_deleted=true]
//! POST   /v1/trees                      {"tree_type": "LOG", "display_name": "..."}
//! GET    /v1/trees/{tree_id}
//! DELETE /v1/trees/{tree_id}            soft delete
//! POST   /v1/trees/{tree_id}/undelete
//! ```

pub mod handlers;

use axum::routing::{get, post};
use axum::Router;

use self::handlers::*;
use crate::extension::Registry;
use crate::rpc::{RegistrationError, RpcTransport, ServiceRegistrar};

pub fn setup_admin_router(registry: Registry) -> Router {
    Router::new()
        .route("/v1/trees", get(list_trees).post(create_tree))
        .route("/v1/trees/{tree_id}", get(get_tree).delete(delete_tree))
        .route("/v1/trees/{tree_id}/undelete", post(undelete_tree))
        .with_state(registry)
}

/// Registers the tree admin service on the RPC transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct TreeAdminService;

impl ServiceRegistrar for TreeAdminService {
    fn register(&self, transport: &mut RpcTransport, registry: &Registry) -> Result<(), RegistrationError> {
        if registry.allowed_tree_types.is_empty() {
            return Err("tree admin needs at least one allowed tree type".into());
        }
        transport.add_service("tree-admin", setup_admin_router(registry.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::NoKeyGeneration;
    use crate::observability::MetricFactory;
    use crate::quota::NoopQuotaManager;
    use crate::storage::{MemoryStorageProvider, StorageProvider, TreeType};
    use axum::body::{to_bytes, Body};
    use axum::extract::Request;
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn registry(allowed: Vec<TreeType>) -> Registry {
        let provider = MemoryStorageProvider::new();
        Registry {
            admin_storage: provider.admin_storage(),
            log_storage: provider.log_storage(),
            quota_manager: Arc::new(NoopQuotaManager),
            metric_factory: MetricFactory::detached("test"),
            key_factory: Arc::new(NoKeyGeneration),
            allowed_tree_types: allowed,
            quota_dry_run: false,
        }
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let request = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn tree_lifecycle_over_http() {
        let app = setup_admin_router(registry(vec![TreeType::Log]));

        let (status, created) = call(&app, "POST", "/v1/trees", Some(r#"{"tree_type":"LOG","display_name":"ct"}"#)).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["tree_id"].as_i64().unwrap();

        let (status, _) = call(&app, "DELETE", &format!("/v1/trees/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, live) = call(&app, "GET", "/v1/trees", None).await;
        assert_eq!(live["trees"].as_array().unwrap().len(), 0);
        let (_, all) = call(&app, "GET", "/v1/trees?include_deleted=true", None).await;
        assert_eq!(all["trees"][0]["deleted"], true);

        let (status, _) = call(&app, "DELETE", &format!("/v1/trees/{id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, restored) = call(&app, "POST", &format!("/v1/trees/{id}/undelete"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(restored["deleted"], false);
    }

    #[tokio::test]
    async fn disallowed_tree_type_is_rejected() {
        let app = setup_admin_router(registry(vec![TreeType::Log]));
        let (status, body) = call(&app, "POST", "/v1/trees", Some(r#"{"tree_type":"MAP"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("MAP"));
    }

    #[tokio::test]
    async fn missing_tree_is_not_found() {
        let app = setup_admin_router(registry(vec![TreeType::Log]));
        assert_eq!(call(&app, "GET", "/v1/trees/99", None).await.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn registration_requires_allowed_types() {
        let mut transport = RpcTransport::new("127.0.0.1:0".parse().unwrap());
        assert!(TreeAdminService.register(&mut transport, &registry(Vec::new())).is_err());
        assert!(TreeAdminService.register(&mut transport, &registry(vec![TreeType::Log])).is_ok());
        assert_eq!(transport.services(), ["tree-admin"]);
    }
}
