use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::extension::Registry;
use crate::storage::{StorageError, Tree, TreeId, TreeType};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeView {
    pub tree_id: TreeId,
    pub tree_type: TreeType,
    pub display_name: String,
    pub create_time_unix_secs: u64,
    pub deleted: bool,
    pub delete_time_unix_secs: Option<u64>,
}

fn unix_secs(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl From<Tree> for TreeView {
    fn from(tree: Tree) -> Self {
        Self {
            tree_id: tree.tree_id,
            tree_type: tree.tree_type,
            display_name: tree.display_name,
            create_time_unix_secs: unix_secs(tree.create_time),
            deleted: tree.delete_time.is_some(),
            delete_time_unix_secs: tree.delete_time.map(unix_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTreeRequest {
    pub tree_type: TreeType,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListTreesResponse {
    pub trees: Vec<TreeView>,
}

/// Storage error rendered as an HTTP status.
pub struct ApiError(StatusCode, String);

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        let status = match e {
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::NotDeleted(_) | StorageError::AlreadyDeleted(_) => StatusCode::CONFLICT,
            StorageError::Unavailable(_) | StorageError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        };
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.1 });
        (self.0, Json(body)).into_response()
    }
}

pub async fn list_trees(
    State(registry): State<Registry>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListTreesResponse>, ApiError> {
    let trees = registry.admin_storage.list_trees(params.include_deleted).await?;
    Ok(Json(ListTreesResponse {
        trees: trees.into_iter().map(TreeView::from).collect(),
    }))
}

pub async fn get_tree(
    State(registry): State<Registry>,
    Path(tree_id): Path<TreeId>,
) -> Result<Json<TreeView>, ApiError> {
    let tree = registry.admin_storage.get_tree(tree_id).await?;
    Ok(Json(tree.into()))
}

pub async fn create_tree(
    State(registry): State<Registry>,
    Json(request): Json<CreateTreeRequest>,
) -> Result<(StatusCode, Json<TreeView>), ApiError> {
    if !registry.allows(request.tree_type) {
        return Err(ApiError(
            StatusCode::BAD_REQUEST,
            format!("tree type {} is not allowed by this server", request.tree_type),
        ));
    }
    let tree = registry
        .admin_storage
        .create_tree(request.tree_type, &request.display_name)
        .await?;
    tracing::info!(tree_id = tree.tree_id, tree_type = %tree.tree_type, "Created tree");
    Ok((StatusCode::CREATED, Json(tree.into())))
}

pub async fn delete_tree(
    State(registry): State<Registry>,
    Path(tree_id): Path<TreeId>,
) -> Result<Json<TreeView>, ApiError> {
    let tree = registry.admin_storage.soft_delete_tree(tree_id).await?;
    tracing::info!(tree_id, "Soft-deleted tree");
    Ok(Json(tree.into()))
}

pub async fn undelete_tree(
    State(registry): State<Registry>,
    Path(tree_id): Path<TreeId>,
) -> Result<Json<TreeView>, ApiError> {
    let tree = registry.admin_storage.undelete_tree(tree_id).await?;
    tracing::info!(tree_id, "Undeleted tree");
    Ok(Json(tree.into()))
}
