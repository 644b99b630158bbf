// # Event Ingress
//
// Translates liveness and pressure feedback from node agents and the
// instance supervisor into entity field updates. Updated entities are
// marked dirty; the next scheduling pass reacts to them.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::models::{NodeStatus, ServiceInstanceStatus};

use super::types::{
    ApiError, ApiResult, ApiState, EventResponse, InstanceEventRequest, NodeEventRequest,
};

pub async fn on_node_event(
    State(state): State<Arc<ApiState>>,
    Json(event): Json<NodeEventRequest>,
) -> ApiResult<Json<EventResponse>> {
    if event.updated_status == NodeStatus::Deleted {
        return Err(ApiError::validation(
            "updated_status must be ACTIVE or FAILED",
        ));
    }

    let mut node = state.repository.get_node(event.node_id).await?;
    if node.status == NodeStatus::Deleted {
        return Err(ApiError::new(
            "FORBIDDEN",
            "events for deleted nodes are not allowed",
        ));
    }

    node.status = event.updated_status;
    node.dirty = true;
    state.repository.upsert_node(&node).await?;
    Ok(Json(EventResponse::ok()))
}

pub async fn on_instance_event(
    State(state): State<Arc<ApiState>>,
    Json(event): Json<InstanceEventRequest>,
) -> ApiResult<Json<EventResponse>> {
    let mut instance = state.repository.get_instance(event.instance_id).await?;
    if instance.status != ServiceInstanceStatus::Placed {
        return Err(ApiError::new(
            "FORBIDDEN",
            "events for instances that are not PLACED are forbidden",
        ));
    }

    if let Some(execution_status) = event.execution_status {
        instance.execution_status = Some(execution_status);
    }
    if let Some(resource_status) = event.resource_status {
        instance.resource_status = Some(resource_status);
    }
    instance.dirty = true;

    state.repository.upsert_instance(&instance).await?;
    Ok(Json(EventResponse::ok()))
}
