// In-memory repository used by the server and the test-suite. Tables are
// plain vectors so listing order is insertion order, which keeps
// scheduling passes reproducible.

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::models::{Node, SchedulerLog, Service, ServiceInstance};

use super::Repository;

#[derive(Default)]
struct Tables {
    nodes: Vec<Node>,
    services: Vec<Service>,
    instances: Vec<ServiceInstance>,
    scheduler_logs: Vec<SchedulerLog>,
}

impl Tables {
    fn upsert_node(&mut self, node: &Node) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(slot) => *slot = node.clone(),
            None => self.nodes.push(node.clone()),
        }
    }

    fn upsert_service(&mut self, service: &Service) {
        match self.services.iter_mut().find(|s| s.id == service.id) {
            Some(slot) => *slot = service.clone(),
            None => self.services.push(service.clone()),
        }
    }

    fn upsert_instance(&mut self, instance: &ServiceInstance) {
        match self.instances.iter_mut().find(|i| i.id == instance.id) {
            Some(slot) => *slot = instance.clone(),
            None => self.instances.push(instance.clone()),
        }
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        Ok(self.tables.read().nodes.clone())
    }

    async fn get_node(&self, id: Uuid) -> Result<Node> {
        self.tables
            .read()
            .nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(format!("node {id}")))
    }

    async fn upsert_node(&self, node: &Node) -> Result<()> {
        self.tables.write().upsert_node(node);
        Ok(())
    }

    async fn list_services(&self) -> Result<Vec<Service>> {
        Ok(self.tables.read().services.clone())
    }

    async fn get_service(&self, id: Uuid) -> Result<Service> {
        self.tables
            .read()
            .services
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(format!("service {id}")))
    }

    async fn upsert_service(&self, service: &Service) -> Result<()> {
        self.tables.write().upsert_service(service);
        Ok(())
    }

    async fn list_instances(&self) -> Result<Vec<ServiceInstance>> {
        Ok(self.tables.read().instances.clone())
    }

    async fn get_instance(&self, id: Uuid) -> Result<ServiceInstance> {
        self.tables
            .read()
            .instances
            .iter()
            .find(|i| i.id == id)
            .cloned()
            .ok_or_else(|| SchedulerError::NotFound(format!("service instance {id}")))
    }

    async fn upsert_instance(&self, instance: &ServiceInstance) -> Result<()> {
        self.tables.write().upsert_instance(instance);
        Ok(())
    }

    async fn commit_snapshot(
        &self,
        nodes: &[Node],
        services: &[Service],
        instances: &[ServiceInstance],
    ) -> Result<()> {
        // One write guard for the whole write-back.
        let mut tables = self.tables.write();
        for node in nodes {
            tables.upsert_node(node);
        }
        for service in services {
            tables.upsert_service(service);
        }
        for instance in instances {
            tables.upsert_instance(instance);
        }
        Ok(())
    }

    async fn append_scheduler_log(&self, log: &SchedulerLog) -> Result<()> {
        self.tables.write().scheduler_logs.push(log.clone());
        Ok(())
    }

    async fn list_scheduler_logs(&self) -> Result<Vec<SchedulerLog>> {
        Ok(self.tables.read().scheduler_logs.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeStatus;
    use crate::resources::{ResourceVector, GIB};

    #[tokio::test]
    async fn test_upsert_is_insert_then_update() {
        let repo = MemoryRepository::new();
        let mut node = Node::new(ResourceVector::new(8.0, 32 * GIB, 1024 * GIB));
        repo.upsert_node(&node).await.unwrap();

        node.status = NodeStatus::Failed;
        repo.upsert_node(&node).await.unwrap();

        let nodes = repo.list_nodes().await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].status, NodeStatus::Failed);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = MemoryRepository::new();
        assert!(matches!(
            repo.get_node(Uuid::new_v4()).await,
            Err(SchedulerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_preserves_insertion_order() {
        let repo = MemoryRepository::new();
        let first = Node::new(ResourceVector::new(1.0, GIB, 10 * GIB));
        let second = Node::new(ResourceVector::new(2.0, GIB, 10 * GIB));
        repo.upsert_node(&first).await.unwrap();
        repo.upsert_node(&second).await.unwrap();

        let nodes = repo.list_nodes().await.unwrap();
        assert_eq!(nodes[0].id, first.id);
        assert_eq!(nodes[1].id, second.id);
    }
}
