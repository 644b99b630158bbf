// # REST API Types
//
// Request and response shapes for the HTTP surface, plus the shared
// handler state and the structured API error.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::models::{
    ExecutionStatus, Node, NodeStatus, ResourceStatus, SchedulerLog, Service, ServiceInstance,
    ServiceType,
};
use crate::repository::Repository;
use crate::resources::ResourceVector;

// Shared state injected into every handler.
#[derive(Clone)]
pub struct ApiState {
    pub config: SchedulerConfig,
    pub repository: Arc<dyn Repository>,
}

// API error with a stable machine-readable code.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        let code = match &err {
            SchedulerError::NotFound(_) => "NOT_FOUND",
            SchedulerError::Forbidden(_) => "FORBIDDEN",
            SchedulerError::Validation(_) => "VALIDATION_ERROR",
            _ => "INTERNAL_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "VALIDATION_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ---- Requests ----

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub node_resources: ResourceVector,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNodeRequest {
    pub node_resources: ResourceVector,
}

fn default_priority() -> u8 {
    99
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub executable: Uuid,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    #[serde(default = "default_priority")]
    pub priority: u8,
    pub resource_limit: ResourceVector,
    pub resource_floor: ResourceVector,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default, rename = "type")]
    pub service_type: Option<ServiceType>,
    #[serde(default)]
    pub priority: Option<u8>,
    #[serde(default)]
    pub resource_limit: Option<ResourceVector>,
    #[serde(default)]
    pub resource_floor: Option<ResourceVector>,
}

#[derive(Debug, Deserialize)]
pub struct NodeEventRequest {
    pub node_id: Uuid,
    pub updated_status: NodeStatus,
}

#[derive(Debug, Deserialize)]
pub struct InstanceEventRequest {
    pub instance_id: Uuid,
    #[serde(default)]
    pub execution_status: Option<ExecutionStatus>,
    #[serde(default)]
    pub resource_status: Option<ResourceStatus>,
}

// ---- Responses ----

#[derive(Debug, Serialize)]
pub struct EntityResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T> EntityResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { status: "OK", data }
    }
}

pub type NodeResponse = EntityResponse<Node>;
pub type NodeListResponse = EntityResponse<Vec<Node>>;
pub type ServiceResponse = EntityResponse<Service>;
pub type ServiceListResponse = EntityResponse<Vec<Service>>;
pub type SchedulerLogListResponse = EntityResponse<Vec<SchedulerLog>>;

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub status: &'static str,
}

impl EventResponse {
    pub fn ok() -> Self {
        Self { status: "OK" }
    }
}

#[derive(Debug, Serialize)]
pub struct ClusterStateResponse {
    pub status: &'static str,
    pub services: Vec<Service>,
    pub service_instances: Vec<ServiceInstance>,
    pub nodes: Vec<Node>,
}

// ---- Validation helpers ----

pub fn require_complete(resources: &ResourceVector, what: &str) -> ApiResult<()> {
    if resources.is_complete() {
        Ok(())
    } else {
        Err(ApiError::validation(format!("{what} must be complete")))
    }
}

pub fn require_priority_in_range(priority: u8) -> ApiResult<()> {
    if priority <= 99 {
        Ok(())
    } else {
        Err(ApiError::validation("priority must be within [0, 99]"))
    }
}

/// Component-wise floor <= limit wherever both sides are set; an unset
/// floor component trivially complies.
pub fn require_floor_within_limit(
    floor: &ResourceVector,
    limit: &ResourceVector,
) -> ApiResult<()> {
    if !limit.fits(floor) {
        return Err(ApiError::validation(
            "resource_floor must not exceed resource_limit",
        ));
    }
    Ok(())
}
