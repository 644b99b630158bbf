// Node CRUD handlers. Created and patched nodes are marked dirty so the
// next scheduling pass picks them up.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::models::{Node, NodeStatus};

use super::types::{
    ApiResult, ApiState, CreateNodeRequest, NodeListResponse, NodeResponse, UpdateNodeRequest,
    require_complete,
};

pub async fn create_node(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CreateNodeRequest>,
) -> ApiResult<Json<NodeResponse>> {
    require_complete(&request.node_resources, "node_resources")?;

    let node = Node::new(request.node_resources);
    state.repository.upsert_node(&node).await?;
    Ok(Json(NodeResponse::ok(node)))
}

pub async fn get_node(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<Uuid>,
) -> ApiResult<Json<NodeResponse>> {
    let node = state.repository.get_node(node_id).await?;
    Ok(Json(NodeResponse::ok(node)))
}

pub async fn update_node(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<Uuid>,
    Json(request): Json<UpdateNodeRequest>,
) -> ApiResult<Json<NodeResponse>> {
    require_complete(&request.node_resources, "node_resources")?;

    let mut node = state.repository.get_node(node_id).await?;
    node.status = NodeStatus::Active;
    node.node_resources = Some(request.node_resources);
    node.dirty = true;

    state.repository.upsert_node(&node).await?;
    Ok(Json(NodeResponse::ok(node)))
}

pub async fn delete_node(
    State(state): State<Arc<ApiState>>,
    Path(node_id): Path<Uuid>,
) -> ApiResult<Json<NodeResponse>> {
    let mut node = state.repository.get_node(node_id).await?;
    node.status = NodeStatus::Deleted;
    node.node_resources = None;
    node.available_resources = None;
    node.dirty = true;

    state.repository.upsert_node(&node).await?;
    Ok(Json(NodeResponse::ok(node)))
}

pub async fn list_nodes(State(state): State<Arc<ApiState>>) -> ApiResult<Json<NodeListResponse>> {
    let nodes = state.repository.list_nodes().await?;
    Ok(Json(NodeListResponse::ok(nodes)))
}
