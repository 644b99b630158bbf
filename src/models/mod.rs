// Domain entities held in the cluster snapshot and persisted through the
// repository port.

pub mod monitoring;
pub mod nodes;
pub mod services;

pub use monitoring::{SchedulerLog, SchedulerMetrics, TrackedAction, TrackedObject};
pub use nodes::{Node, NodeStatus};
pub use services::{
    ExecutionStatus, ResourceStatus, Service, ServiceInstance, ServiceInstanceStatus,
    ServiceStatus, ServiceType,
};
