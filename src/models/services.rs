use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resources::ResourceVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Active,
    Deleted,
}

/// Closed set of service kinds. The kind feeds the preemption policy: a
/// stateful service is never displaced to make room for a fragile or
/// stateless one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    Stateless,
    Fragile,
    Stateful,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceInstanceStatus {
    Placed,
    Evicted,
}

/// Last execution state reported by the worker agent for a placed
/// instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Unknown,
    Running,
    CrashLoop,
}

/// Resource pressure reported by the worker agent: OK, or the dimension
/// the instance is constrained by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    Ok,
    Cpu,
    Ram,
    Disk,
}

/// Declarative intent for one running instance with resource bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub executable: Uuid,
    pub status: ServiceStatus,
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub priority: u8,
    // Upper bound on the instance allocation. Complete while ACTIVE.
    pub resource_limit: Option<ResourceVector>,
    // Lower bound applied on first placement. Complete while ACTIVE.
    pub resource_floor: Option<ResourceVector>,
    // Derived back-link to the sole instance, rebuilt on snapshot load.
    #[serde(default)]
    pub instance_id: Option<Uuid>,
    #[serde(default)]
    pub dirty: bool,
}

impl Service {
    pub fn new(
        executable: Uuid,
        service_type: ServiceType,
        priority: u8,
        resource_limit: ResourceVector,
        resource_floor: ResourceVector,
    ) -> Self {
        Service {
            id: Uuid::new_v4(),
            executable,
            status: ServiceStatus::Active,
            service_type,
            priority,
            resource_limit: Some(resource_limit),
            resource_floor: Some(resource_floor),
            instance_id: None,
            dirty: true,
        }
    }
}

/// The concrete realization of a service on a node.
///
/// PLACED implies a host node, a complete allocation and both feedback
/// statuses; EVICTED implies none of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInstance {
    pub id: Uuid,
    pub executable: Uuid,
    pub service_id: Uuid,
    pub node_id: Option<Uuid>,
    pub status: ServiceInstanceStatus,
    pub execution_status: Option<ExecutionStatus>,
    pub resource_status: Option<ResourceStatus>,
    pub allocated_resources: Option<ResourceVector>,
    #[serde(default)]
    pub dirty: bool,
}

impl ServiceInstance {
    /// Fresh instance for a service that has none yet. Born evicted and
    /// dirty so the current pass places it.
    pub fn evicted_for(service: &Service) -> Self {
        ServiceInstance {
            id: Uuid::new_v4(),
            executable: service.executable,
            service_id: service.id,
            node_id: None,
            status: ServiceInstanceStatus::Evicted,
            execution_status: None,
            resource_status: None,
            allocated_resources: None,
            dirty: true,
        }
    }
}
