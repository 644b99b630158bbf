// # Repository Port
//
// The scheduler core loads and writes entity snapshots through this
// capability and never sees the store behind it. Individual writes are
// transactional; `commit_snapshot` writes a whole pass back atomically.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Node, SchedulerLog, Service, ServiceInstance};

pub mod memory;

pub use memory::MemoryRepository;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<Node>>;
    async fn get_node(&self, id: Uuid) -> Result<Node>;
    async fn upsert_node(&self, node: &Node) -> Result<()>;

    async fn list_services(&self) -> Result<Vec<Service>>;
    async fn get_service(&self, id: Uuid) -> Result<Service>;
    async fn upsert_service(&self, service: &Service) -> Result<()>;

    async fn list_instances(&self) -> Result<Vec<ServiceInstance>>;
    async fn get_instance(&self, id: Uuid) -> Result<ServiceInstance>;
    async fn upsert_instance(&self, instance: &ServiceInstance) -> Result<()>;

    /// Writes a pass snapshot back in one transaction: nodes, then
    /// services, then instances.
    async fn commit_snapshot(
        &self,
        nodes: &[Node],
        services: &[Service],
        instances: &[ServiceInstance],
    ) -> Result<()>;

    async fn append_scheduler_log(&self, log: &SchedulerLog) -> Result<()>;
    async fn list_scheduler_logs(&self) -> Result<Vec<SchedulerLog>>;
}
