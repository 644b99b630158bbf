// Service CRUD handlers. A partial update of any field forces the
// service back to ACTIVE and marks it dirty.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;

use crate::models::{Service, ServiceStatus};

use super::types::{
    ApiError, ApiResult, ApiState, CreateServiceRequest, ServiceListResponse, ServiceResponse,
    UpdateServiceRequest, require_complete, require_floor_within_limit, require_priority_in_range,
};

pub async fn create_service(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CreateServiceRequest>,
) -> ApiResult<Json<ServiceResponse>> {
    require_priority_in_range(request.priority)?;
    require_complete(&request.resource_limit, "resource_limit")?;
    require_complete(&request.resource_floor, "resource_floor")?;
    require_floor_within_limit(&request.resource_floor, &request.resource_limit)?;

    let service = Service::new(
        request.executable,
        request.service_type,
        request.priority,
        request.resource_limit,
        request.resource_floor,
    );
    state.repository.upsert_service(&service).await?;
    Ok(Json(ServiceResponse::ok(service)))
}

pub async fn get_service(
    State(state): State<Arc<ApiState>>,
    Path(service_id): Path<Uuid>,
) -> ApiResult<Json<ServiceResponse>> {
    let service = state.repository.get_service(service_id).await?;
    Ok(Json(ServiceResponse::ok(service)))
}

pub async fn update_service(
    State(state): State<Arc<ApiState>>,
    Path(service_id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> ApiResult<Json<ServiceResponse>> {
    let mut service = state.repository.get_service(service_id).await?;

    if let Some(service_type) = request.service_type {
        service.service_type = service_type;
    }
    if let Some(priority) = request.priority {
        require_priority_in_range(priority)?;
        service.priority = priority;
    }
    if let Some(resource_limit) = request.resource_limit {
        service.resource_limit = Some(resource_limit);
    }
    if let Some(resource_floor) = request.resource_floor {
        service.resource_floor = Some(resource_floor);
    }

    // Any update reactivates the service, so the bounds must hold again.
    let limit = service
        .resource_limit
        .clone()
        .ok_or_else(|| ApiError::validation("resource_limit is required"))?;
    let floor = service
        .resource_floor
        .clone()
        .ok_or_else(|| ApiError::validation("resource_floor is required"))?;
    require_complete(&limit, "resource_limit")?;
    require_complete(&floor, "resource_floor")?;
    require_floor_within_limit(&floor, &limit)?;

    service.status = ServiceStatus::Active;
    service.dirty = true;

    state.repository.upsert_service(&service).await?;
    Ok(Json(ServiceResponse::ok(service)))
}

pub async fn delete_service(
    State(state): State<Arc<ApiState>>,
    Path(service_id): Path<Uuid>,
) -> ApiResult<Json<ServiceResponse>> {
    let mut service = state.repository.get_service(service_id).await?;
    service.status = ServiceStatus::Deleted;
    service.resource_limit = None;
    service.resource_floor = None;
    service.dirty = true;

    state.repository.upsert_service(&service).await?;
    Ok(Json(ServiceResponse::ok(service)))
}

pub async fn list_services(
    State(state): State<Arc<ApiState>>,
) -> ApiResult<Json<ServiceListResponse>> {
    let services = state.repository.list_services().await?;
    Ok(Json(ServiceListResponse::ok(services)))
}
