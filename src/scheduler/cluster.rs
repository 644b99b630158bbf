// # Cluster Snapshot
//
// In-memory working set for one scheduling pass. The snapshot owns every
// entity for the duration of the pass; back-links (service -> instance,
// node -> hosted instances) are derived here, never persisted on their
// own. Load order matters: instances first, then services, then nodes.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::models::{
    ExecutionStatus, Node, NodeStatus, ResourceStatus, SchedulerMetrics, Service,
    ServiceInstance, ServiceInstanceStatus, ServiceStatus, ServiceType, TrackedAction,
    TrackedObject,
};
use crate::repository::Repository;
use crate::resources::ResourceVector;

use super::selectors::Selector;

pub struct ClusterState {
    pub nodes: Vec<Node>,
    pub services: Vec<Service>,
    pub instances: Vec<ServiceInstance>,
    pub metrics: SchedulerMetrics,

    node_index: HashMap<Uuid, usize>,
    service_index: HashMap<Uuid, usize>,
    instance_index: HashMap<Uuid, usize>,
}

impl ClusterState {
    pub async fn load(repository: &dyn Repository) -> Result<Self> {
        let instances = repository.list_instances().await?;
        let mut services = repository.list_services().await?;
        let mut nodes = repository.list_nodes().await?;

        // Back-links: each service points at its sole instance.
        for service in services.iter_mut() {
            service.instance_id = None;
        }
        let service_index: HashMap<Uuid, usize> = services
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id, i))
            .collect();
        for instance in &instances {
            if let Some(&i) = service_index.get(&instance.service_id) {
                services[i].instance_id = Some(instance.id);
            }
        }

        // Back-links: each node lists the instances placed on it.
        for node in nodes.iter_mut() {
            node.instance_ids.clear();
        }
        let node_index: HashMap<Uuid, usize> =
            nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        for instance in &instances {
            if let Some(&i) = instance.node_id.and_then(|id| node_index.get(&id)) {
                nodes[i].instance_ids.push(instance.id);
            }
        }

        let instance_index = instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (inst.id, i))
            .collect();

        Ok(ClusterState {
            nodes,
            services,
            instances,
            metrics: SchedulerMetrics::default(),
            node_index,
            service_index,
            instance_index,
        })
    }

    /// Writes the whole snapshot back: nodes, then services, then
    /// instances, atomically.
    pub async fn commit(&self, repository: &dyn Repository) -> Result<()> {
        repository
            .commit_snapshot(&self.nodes, &self.services, &self.instances)
            .await
    }

    pub fn node(&self, id: Uuid) -> Result<&Node> {
        self.node_index
            .get(&id)
            .map(|&i| &self.nodes[i])
            .ok_or_else(|| SchedulerError::Scheduling(format!("node {id} not in snapshot")))
    }

    pub fn node_mut(&mut self, id: Uuid) -> Result<&mut Node> {
        match self.node_index.get(&id) {
            Some(&i) => Ok(&mut self.nodes[i]),
            None => Err(SchedulerError::Scheduling(format!("node {id} not in snapshot"))),
        }
    }

    pub fn service(&self, id: Uuid) -> Result<&Service> {
        self.service_index
            .get(&id)
            .map(|&i| &self.services[i])
            .ok_or_else(|| SchedulerError::Scheduling(format!("service {id} not in snapshot")))
    }

    pub fn service_mut(&mut self, id: Uuid) -> Result<&mut Service> {
        match self.service_index.get(&id) {
            Some(&i) => Ok(&mut self.services[i]),
            None => Err(SchedulerError::Scheduling(format!(
                "service {id} not in snapshot"
            ))),
        }
    }

    pub fn instance(&self, id: Uuid) -> Result<&ServiceInstance> {
        self.instance_index
            .get(&id)
            .map(|&i| &self.instances[i])
            .ok_or_else(|| {
                SchedulerError::Scheduling(format!("service instance {id} not in snapshot"))
            })
    }

    pub fn instance_mut(&mut self, id: Uuid) -> Result<&mut ServiceInstance> {
        match self.instance_index.get(&id) {
            Some(&i) => Ok(&mut self.instances[i]),
            None => Err(SchedulerError::Scheduling(format!(
                "service instance {id} not in snapshot"
            ))),
        }
    }

    /// Adds an instance created mid-pass and links it to its service.
    pub fn insert_instance(&mut self, instance: ServiceInstance) -> Result<()> {
        let instance_id = instance.id;
        let service_id = instance.service_id;
        self.instance_index.insert(instance_id, self.instances.len());
        self.instances.push(instance);
        self.service_mut(service_id)?.instance_id = Some(instance_id);
        Ok(())
    }

    /// Active node ids in load order. Tie-breaks in placement and victim
    /// selection depend on this order staying stable.
    pub fn active_node_ids(&self) -> Vec<Uuid> {
        self.nodes
            .iter()
            .filter(|n| n.status == NodeStatus::Active)
            .map(|n| n.id)
            .collect()
    }

    /// For every node, available = capacity - sum of hosted allocations.
    /// A node that would go negative fails the whole pass.
    pub fn calculate_available_resources(&mut self) -> Result<()> {
        for i in 0..self.nodes.len() {
            let mut occupied = ResourceVector::default();
            for instance_id in &self.nodes[i].instance_ids {
                let instance = &self.instances[self.instance_index[instance_id]];
                if let Some(allocated) = &instance.allocated_resources {
                    occupied = occupied + allocated.clone();
                }
            }
            let available = match self.nodes[i].node_resources.clone() {
                Some(total) => Some(total.checked_sub(&occupied).map_err(|_| {
                    SchedulerError::Scheduling("available_resources cannot be negative".to_string())
                })?),
                None => None,
            };
            self.nodes[i].available_resources = available;
        }
        Ok(())
    }

    pub fn node_has_room(&self, node_id: Uuid, required: &ResourceVector) -> Result<bool> {
        let node = self.node(node_id)?;
        Ok(node
            .available_resources
            .as_ref()
            .is_some_and(|available| available.fits(required)))
    }

    /// Places an instance onto a node, deducting the allocation from the
    /// node's available pool.
    pub fn place_instance(
        &mut self,
        instance_id: Uuid,
        node_id: Uuid,
        required: ResourceVector,
    ) -> Result<()> {
        let node = self.node_mut(node_id)?;
        let available = node.available_resources.clone().ok_or_else(|| {
            SchedulerError::Scheduling(format!("node {node_id} has no available_resources"))
        })?;
        if !available.fits(&required) {
            return Err(SchedulerError::Scheduling(format!(
                "node {node_id} cannot fit requested resources"
            )));
        }
        node.available_resources = Some(
            available
                .checked_sub(&required)
                .map_err(SchedulerError::into_scheduling)?,
        );
        node.instance_ids.push(instance_id);

        let instance = self.instance_mut(instance_id)?;
        instance.node_id = Some(node_id);
        instance.status = ServiceInstanceStatus::Placed;
        instance.execution_status = Some(ExecutionStatus::Unknown);
        instance.resource_status = Some(ResourceStatus::Ok);
        instance.allocated_resources = Some(required);
        instance.dirty = false;

        self.metrics.count_action(TrackedAction::Allocation, 1);
        debug!(instance = %instance_id, node = %node_id, "placed instance");
        Ok(())
    }

    /// Evicts an instance from its node, returning the allocation to the
    /// node's available pool. The target node comes from the instance's
    /// own node_id.
    pub fn evict_instance(&mut self, instance_id: Uuid) -> Result<()> {
        let (node_id, allocated, service_id) = {
            let instance = self.instance(instance_id)?;
            (
                instance.node_id,
                instance.allocated_resources.clone(),
                instance.service_id,
            )
        };
        let fragile = self.service(service_id)?.service_type == ServiceType::Fragile;

        if let Some(node_id) = node_id {
            if let Ok(node) = self.node_mut(node_id) {
                if let (Some(available), Some(allocated)) =
                    (node.available_resources.clone(), allocated.clone())
                {
                    node.available_resources = Some(available + allocated);
                }
                node.instance_ids.retain(|id| *id != instance_id);
            }
        }

        let instance = self.instance_mut(instance_id)?;
        instance.node_id = None;
        instance.status = ServiceInstanceStatus::Evicted;
        instance.execution_status = None;
        instance.resource_status = None;
        instance.allocated_resources = None;
        instance.dirty = true;

        self.metrics.count_action(TrackedAction::Eviction, 1);
        if fragile {
            self.metrics.count_action(TrackedAction::FragileEviction, 1);
        }
        debug!(instance = %instance_id, "evicted instance");
        Ok(())
    }

    /// Caps an over-limit allocation back to the limit by re-placing the
    /// instance on its node with the compliant allocation.
    pub fn shrink_instance(&mut self, instance_id: Uuid, limit: &ResourceVector) -> Result<()> {
        let (allocated, node_id) = {
            let instance = self.instance(instance_id)?;
            (instance.allocated_resources.clone(), instance.node_id)
        };
        let Some(allocated) = allocated else {
            return Ok(());
        };
        let compliant = allocated.get_compliant(limit, None);
        if compliant == allocated {
            return Ok(());
        }
        let node_id = node_id.ok_or_else(|| {
            SchedulerError::Scheduling(format!("instance {instance_id} placed without a node"))
        })?;
        self.evict_instance(instance_id)?;
        self.place_instance(instance_id, node_id, compliant)
    }

    /// Enlarges a placed instance's allocation on its current node after
    /// the room for the delta has been secured.
    pub fn grow_instance_in_place(
        &mut self,
        instance_id: Uuid,
        grown: ResourceVector,
    ) -> Result<()> {
        let (allocated, node_id) = {
            let instance = self.instance(instance_id)?;
            (instance.allocated_resources.clone(), instance.node_id)
        };
        let allocated = allocated.ok_or_else(|| {
            SchedulerError::Scheduling(format!("instance {instance_id} has no allocation"))
        })?;
        let node_id = node_id.ok_or_else(|| {
            SchedulerError::Scheduling(format!("instance {instance_id} placed without a node"))
        })?;
        let delta = grown
            .checked_sub(&allocated)
            .map_err(SchedulerError::into_scheduling)?;

        let node = self.node_mut(node_id)?;
        let available = node.available_resources.clone().ok_or_else(|| {
            SchedulerError::Scheduling(format!("node {node_id} has no available_resources"))
        })?;
        node.available_resources = Some(
            available
                .checked_sub(&delta)
                .map_err(SchedulerError::into_scheduling)?,
        );

        let instance = self.instance_mut(instance_id)?;
        instance.allocated_resources = Some(grown);
        instance.resource_status = Some(ResourceStatus::Ok);
        Ok(())
    }

    /// Checks whether `required` can be acquired on a node for a
    /// service. Returns the victim instances (in hosting order) whose
    /// eviction would free enough room: an empty list when the node
    /// already fits, `None` when no evictable prefix suffices.
    pub fn attempt_to_acquire(
        &self,
        node_id: Uuid,
        required: &ResourceVector,
        for_service_id: Uuid,
        selector: Selector,
    ) -> Result<Option<Vec<Uuid>>> {
        let node = self.node(node_id)?;
        let available = match &node.available_resources {
            Some(available) if available.is_complete() => available.clone(),
            _ => {
                return Err(SchedulerError::Scheduling(format!(
                    "node {node_id} needs complete available_resources to acquire from"
                )))
            }
        };
        if available.fits(required) {
            return Ok(Some(Vec::new()));
        }

        let requester = self.service(for_service_id)?;
        let mut pool = available;
        let mut victims = Vec::new();
        for instance_id in &node.instance_ids {
            let instance = self.instance(*instance_id)?;
            let target = self.service(instance.service_id)?;
            if !selector(requester, target) {
                continue;
            }
            if let Some(allocated) = &instance.allocated_resources {
                pool = pool + allocated.clone();
            }
            victims.push(*instance_id);
            if pool.fits(required) {
                return Ok(Some(victims));
            }
        }
        Ok(None)
    }

    /// Cluster totals and object populations for the pass log.
    pub fn finalize_metrics(&mut self) {
        let mut total = ResourceVector::default();
        for node in self.nodes.iter().filter(|n| n.status == NodeStatus::Active) {
            if let Some(capacity) = &node.node_resources {
                total = total + capacity.clone();
            }
        }
        let mut utilized = ResourceVector::default();
        for instance in self
            .instances
            .iter()
            .filter(|i| i.status == ServiceInstanceStatus::Placed)
        {
            if let Some(allocated) = &instance.allocated_resources {
                utilized = utilized + allocated.clone();
            }
        }

        let nodes = self
            .nodes
            .iter()
            .filter(|n| n.status != NodeStatus::Deleted)
            .count() as u64;
        let services = self
            .services
            .iter()
            .filter(|s| s.status == ServiceStatus::Active)
            .count() as u64;

        self.metrics.total_cluster_resources = Some(total);
        self.metrics.utilized_cluster_resources = Some(utilized);
        self.metrics.count_object(TrackedObject::Node, nodes);
        self.metrics.count_object(TrackedObject::Service, services);
        self.metrics.calculate_utilization();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryRepository, Repository};
    use crate::scheduler::selectors::same_or_lower_type_with_lower_priority;
    use crate::resources::GIB;

    fn sample_service(service_type: ServiceType, priority: u8) -> Service {
        Service::new(
            Uuid::new_v4(),
            service_type,
            priority,
            ResourceVector::new(4.0, 8 * GIB, 100 * GIB),
            ResourceVector::new(1.0, GIB, 10 * GIB),
        )
    }

    async fn state_with(
        nodes: Vec<Node>,
        services: Vec<Service>,
        instances: Vec<ServiceInstance>,
    ) -> ClusterState {
        let repo = MemoryRepository::new();
        for node in &nodes {
            repo.upsert_node(node).await.unwrap();
        }
        for service in &services {
            repo.upsert_service(service).await.unwrap();
        }
        for instance in &instances {
            repo.upsert_instance(instance).await.unwrap();
        }
        ClusterState::load(&repo).await.unwrap()
    }

    #[tokio::test]
    async fn test_load_rebuilds_back_links() {
        let node = Node::new(ResourceVector::new(8.0, 32 * GIB, 1024 * GIB));
        let service = sample_service(ServiceType::Stateless, 50);
        let mut instance = ServiceInstance::evicted_for(&service);
        instance.status = ServiceInstanceStatus::Placed;
        instance.node_id = Some(node.id);
        instance.execution_status = Some(ExecutionStatus::Running);
        instance.resource_status = Some(ResourceStatus::Ok);
        instance.allocated_resources = Some(ResourceVector::new(1.0, GIB, 10 * GIB));
        instance.dirty = false;

        let state = state_with(vec![node.clone()], vec![service.clone()], vec![instance.clone()])
            .await;

        assert_eq!(state.service(service.id).unwrap().instance_id, Some(instance.id));
        assert_eq!(state.node(node.id).unwrap().instance_ids, vec![instance.id]);
    }

    #[tokio::test]
    async fn test_available_resources_subtract_allocations() {
        let node = Node::new(ResourceVector::new(8.0, 32 * GIB, 1024 * GIB));
        let service = sample_service(ServiceType::Stateless, 50);
        let mut instance = ServiceInstance::evicted_for(&service);
        instance.status = ServiceInstanceStatus::Placed;
        instance.node_id = Some(node.id);
        instance.execution_status = Some(ExecutionStatus::Running);
        instance.resource_status = Some(ResourceStatus::Ok);
        instance.allocated_resources = Some(ResourceVector::new(2.0, 4 * GIB, 24 * GIB));
        instance.dirty = false;

        let mut state = state_with(vec![node.clone()], vec![service], vec![instance]).await;
        state.calculate_available_resources().unwrap();

        assert_eq!(
            state.node(node.id).unwrap().available_resources,
            Some(ResourceVector::new(6.0, 28 * GIB, 1000 * GIB))
        );
    }

    #[tokio::test]
    async fn test_overcommitted_node_fails_the_pass() {
        let node = Node::new(ResourceVector::new(1.0, GIB, 10 * GIB));
        let service = sample_service(ServiceType::Stateless, 50);
        let mut instance = ServiceInstance::evicted_for(&service);
        instance.status = ServiceInstanceStatus::Placed;
        instance.node_id = Some(node.id);
        instance.execution_status = Some(ExecutionStatus::Running);
        instance.resource_status = Some(ResourceStatus::Ok);
        instance.allocated_resources = Some(ResourceVector::new(2.0, GIB, 10 * GIB));

        let mut state = state_with(vec![node], vec![service], vec![instance]).await;
        assert!(matches!(
            state.calculate_available_resources(),
            Err(SchedulerError::Scheduling(_))
        ));
    }

    #[tokio::test]
    async fn test_place_and_evict_round_trip_accounting() {
        let node = Node::new(ResourceVector::new(8.0, 32 * GIB, 1024 * GIB));
        let service = sample_service(ServiceType::Fragile, 50);
        let instance = ServiceInstance::evicted_for(&service);
        let instance_id = instance.id;

        let mut state = state_with(vec![node.clone()], vec![service], vec![instance]).await;
        state.calculate_available_resources().unwrap();
        let before = state.node(node.id).unwrap().available_resources.clone();

        let required = ResourceVector::new(1.0, GIB, 10 * GIB);
        state
            .place_instance(instance_id, node.id, required.clone())
            .unwrap();
        let placed = state.instance(instance_id).unwrap();
        assert_eq!(placed.status, ServiceInstanceStatus::Placed);
        assert_eq!(placed.execution_status, Some(ExecutionStatus::Unknown));
        assert_eq!(placed.resource_status, Some(ResourceStatus::Ok));
        assert!(!placed.dirty);

        state.evict_instance(instance_id).unwrap();
        let evicted = state.instance(instance_id).unwrap();
        assert_eq!(evicted.status, ServiceInstanceStatus::Evicted);
        assert!(evicted.node_id.is_none());
        assert!(evicted.allocated_resources.is_none());
        assert!(evicted.dirty);
        assert_eq!(state.node(node.id).unwrap().available_resources, before);

        assert_eq!(state.metrics.action(TrackedAction::Allocation), 1);
        assert_eq!(state.metrics.action(TrackedAction::Eviction), 1);
        assert_eq!(state.metrics.action(TrackedAction::FragileEviction), 1);
    }

    #[tokio::test]
    async fn test_acquire_returns_shortest_victim_prefix() {
        let node = Node::new(ResourceVector::new(3.0, 3 * GIB, 30 * GIB));
        let requester = sample_service(ServiceType::Stateless, 99);
        let low_a = sample_service(ServiceType::Stateless, 0);
        let low_b = sample_service(ServiceType::Stateless, 1);

        let mut instances = Vec::new();
        for service in [&low_a, &low_b] {
            let mut instance = ServiceInstance::evicted_for(service);
            instance.status = ServiceInstanceStatus::Placed;
            instance.node_id = Some(node.id);
            instance.execution_status = Some(ExecutionStatus::Running);
            instance.resource_status = Some(ResourceStatus::Ok);
            instance.allocated_resources = Some(ResourceVector::new(1.0, GIB, 10 * GIB));
            instance.dirty = false;
            instances.push(instance);
        }

        let mut state = state_with(
            vec![node.clone()],
            vec![requester.clone(), low_a, low_b],
            instances.clone(),
        )
        .await;
        state.calculate_available_resources().unwrap();

        // One GiB of headroom is left; evicting the first victim alone
        // frees enough for two.
        let required = ResourceVector::new(2.0, 2 * GIB, 20 * GIB);
        let victims = state
            .attempt_to_acquire(
                node.id,
                &required,
                requester.id,
                same_or_lower_type_with_lower_priority,
            )
            .unwrap();
        assert_eq!(victims, Some(vec![instances[0].id]));

        // Nothing to evict for an equal-priority requester.
        let none = state
            .attempt_to_acquire(
                node.id,
                &ResourceVector::new(3.0, 3 * GIB, 30 * GIB),
                instances[0].service_id,
                same_or_lower_type_with_lower_priority,
            )
            .unwrap();
        assert_eq!(none, None);
    }
}
