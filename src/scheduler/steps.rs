// # Update Resolvers
//
// A scheduling pass runs the three resolvers in order: nodes, then
// services, then instances. Each resolver walks the entities marked
// dirty in two sub-passes; a dirty node or service left unclassified
// after both aborts the pass. Iteration follows snapshot load order so
// victim selection and placement tie-breaks stay reproducible.

use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::models::{
    NodeStatus, ResourceStatus, Service, ServiceInstance, ServiceInstanceStatus, ServiceStatus,
    TrackedObject,
};
use crate::resources::{base_allocation, CpuCores, ResourceVector, GIB};

use super::cluster::ClusterState;
use super::selectors::same_or_lower_type_with_lower_priority;

/// Drains instances from failed and deleted nodes.
pub struct NodeUpdatesResolver;

impl NodeUpdatesResolver {
    pub fn run(state: &mut ClusterState) -> Result<()> {
        let dirty: Vec<Uuid> = state.nodes.iter().filter(|n| n.dirty).map(|n| n.id).collect();
        let mut unresolved = dirty.len();

        // Sub-pass 1: failed and deleted nodes lose every hosted
        // instance.
        for node_id in &dirty {
            let node = state.node(*node_id)?;
            if !matches!(node.status, NodeStatus::Failed | NodeStatus::Deleted) {
                continue;
            }
            for instance_id in node.instance_ids.clone() {
                state.evict_instance(instance_id)?;
            }
            let node = state.node_mut(*node_id)?;
            node.instance_ids.clear();
            node.dirty = false;
            unresolved -= 1;
        }

        // Sub-pass 2: active nodes need no structural work.
        for node_id in &dirty {
            let node = state.node_mut(*node_id)?;
            if node.status != NodeStatus::Active || !node.dirty {
                continue;
            }
            node.dirty = false;
            unresolved -= 1;
        }

        if unresolved != 0 {
            return Err(SchedulerError::Scheduling(
                "Not all updated nodes resolved".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tears down instances of deleted services and creates missing ones for
/// active services.
pub struct ServiceUpdatesResolver;

impl ServiceUpdatesResolver {
    pub fn run(state: &mut ClusterState) -> Result<()> {
        let dirty: Vec<Uuid> = state
            .services
            .iter()
            .filter(|s| s.dirty)
            .map(|s| s.id)
            .collect();
        let mut unresolved = dirty.len();

        // Sub-pass 1: a deleted service may not keep a placed instance.
        for service_id in &dirty {
            let service = state.service(*service_id)?;
            if service.status != ServiceStatus::Deleted {
                continue;
            }
            if let Some(instance_id) = service.instance_id {
                if state.instance(instance_id)?.status == ServiceInstanceStatus::Placed {
                    state.evict_instance(instance_id)?;
                }
            }
            state.service_mut(*service_id)?.dirty = false;
            unresolved -= 1;
        }

        // Sub-pass 2: every active service owns exactly one instance;
        // the instance is marked dirty so the instance resolver
        // re-examines it.
        for service_id in &dirty {
            let service = state.service(*service_id)?;
            if service.status != ServiceStatus::Active {
                continue;
            }
            let instance_id = match service.instance_id {
                Some(instance_id) => instance_id,
                None => {
                    let instance = ServiceInstance::evicted_for(service);
                    let instance_id = instance.id;
                    state.insert_instance(instance)?;
                    instance_id
                }
            };
            state.instance_mut(instance_id)?.dirty = true;
            state.service_mut(*service_id)?.dirty = false;
            unresolved -= 1;
        }

        if unresolved != 0 {
            return Err(SchedulerError::Scheduling(
                "Not all updated services resolved".to_string(),
            ));
        }
        Ok(())
    }
}

/// Places evicted instances, grows constrained ones and shrinks any
/// over-limit allocation back to its service's limit.
pub struct InstanceUpdatesResolver;

impl InstanceUpdatesResolver {
    pub fn run(state: &mut ClusterState) -> Result<()> {
        state.calculate_available_resources()?;

        let dirty: Vec<Uuid> = state
            .instances
            .iter()
            .filter(|i| i.dirty)
            .map(|i| i.id)
            .collect();
        let mut residual: Vec<Uuid> = dirty.clone();

        // Sub-pass A: placed instances. Grow the constrained dimension
        // if the worker reported pressure, then cap at the limit.
        for instance_id in &dirty {
            if state.instance(*instance_id)?.status != ServiceInstanceStatus::Placed {
                continue;
            }
            Self::resolve_placed(state, *instance_id)?;
            state.instance_mut(*instance_id)?.dirty = false;
            residual.retain(|id| id != instance_id);
        }

        // Sub-pass B: evicted instances of active services go looking
        // for a node, first without evictions, then with them.
        for instance_id in residual.clone() {
            let instance = state.instance(instance_id)?;
            if instance.status != ServiceInstanceStatus::Evicted {
                continue;
            }
            let service = state.service(instance.service_id)?;
            if service.status != ServiceStatus::Active {
                continue;
            }
            let limit = service.resource_limit.clone().unwrap_or_default();
            let floor = service.resource_floor.clone();
            let required = base_allocation().get_compliant(&limit, floor.as_ref());
            if Self::place_somewhere(state, instance_id, &required, service.id)? {
                residual.retain(|id| *id != instance_id);
            }
        }

        // Whatever is left could not be placed this pass.
        state
            .metrics
            .count_object(TrackedObject::Evicted, residual.len() as u64);
        Ok(())
    }

    fn resolve_placed(state: &mut ClusterState, instance_id: Uuid) -> Result<()> {
        let instance = state.instance(instance_id)?.clone();
        let service = state.service(instance.service_id)?.clone();

        if let Some(constrained) = instance.resource_status {
            if constrained != ResourceStatus::Ok {
                Self::attempt_grow(state, &instance, &service, constrained)?;
            }
        }

        let limit = service.resource_limit.clone().unwrap_or_default();
        state.shrink_instance(instance_id, &limit)
    }

    /// Grow in place, else grow by migration, else leave the instance
    /// unchanged.
    fn attempt_grow(
        state: &mut ClusterState,
        instance: &ServiceInstance,
        service: &Service,
        constrained: ResourceStatus,
    ) -> Result<()> {
        let allocated = instance.allocated_resources.clone().ok_or_else(|| {
            SchedulerError::Scheduling(format!("instance {} has no allocation", instance.id))
        })?;
        let current_node = instance.node_id.ok_or_else(|| {
            SchedulerError::Scheduling(format!("instance {} placed without a node", instance.id))
        })?;
        let grown = grown_allocation(&allocated, service.resource_limit.as_ref(), constrained)?;
        let delta = grown
            .checked_sub(&allocated)
            .map_err(SchedulerError::into_scheduling)?;

        if let Some(victims) = state.attempt_to_acquire(
            current_node,
            &delta,
            service.id,
            same_or_lower_type_with_lower_priority,
        )? {
            for victim in victims {
                state.evict_instance(victim)?;
            }
            return state.grow_instance_in_place(instance.id, grown);
        }

        for node_id in state.active_node_ids() {
            if node_id == current_node {
                continue;
            }
            if let Some(victims) = state.attempt_to_acquire(
                node_id,
                &grown,
                service.id,
                same_or_lower_type_with_lower_priority,
            )? {
                for victim in victims {
                    state.evict_instance(victim)?;
                }
                state.evict_instance(instance.id)?;
                return state.place_instance(instance.id, node_id, grown);
            }
        }

        Ok(())
    }

    fn place_somewhere(
        state: &mut ClusterState,
        instance_id: Uuid,
        required: &ResourceVector,
        service_id: Uuid,
    ) -> Result<bool> {
        for node_id in state.active_node_ids() {
            if state.node_has_room(node_id, required)? {
                state.place_instance(instance_id, node_id, required.clone())?;
                return Ok(true);
            }
        }
        for node_id in state.active_node_ids() {
            if let Some(victims) = state.attempt_to_acquire(
                node_id,
                required,
                service_id,
                same_or_lower_type_with_lower_priority,
            )? {
                for victim in victims {
                    state.evict_instance(victim)?;
                }
                state.place_instance(instance_id, node_id, required.clone())?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// The constrained dimension grows by one step, capped at the service's
/// limit; an unset limit component leaves the growth unbounded. A limit
/// already below the allocation grows nothing (the shrink that follows
/// caps it).
fn grown_allocation(
    allocated: &ResourceVector,
    limit: Option<&ResourceVector>,
    constrained: ResourceStatus,
) -> Result<ResourceVector> {
    fn step_up<T: Copy + Ord + std::ops::Add<Output = T>>(
        current: T,
        step: T,
        limit: Option<T>,
    ) -> T {
        match limit {
            Some(limit) if limit <= current => current,
            Some(limit) => limit.min(current + step),
            None => current + step,
        }
    }

    let mut grown = allocated.clone();
    match constrained {
        ResourceStatus::Cpu => {
            let current = allocated.cpu_cores.ok_or_else(|| {
                SchedulerError::Scheduling("constrained instance without cpu allocation".to_string())
            })?;
            grown.cpu_cores = Some(step_up(
                current,
                CpuCores::from_cores(1.0),
                limit.and_then(|l| l.cpu_cores),
            ));
        }
        ResourceStatus::Ram => {
            let current = allocated.ram.ok_or_else(|| {
                SchedulerError::Scheduling("constrained instance without ram allocation".to_string())
            })?;
            grown.ram = Some(step_up(current, GIB, limit.and_then(|l| l.ram)));
        }
        ResourceStatus::Disk => {
            let current = allocated.disk.ok_or_else(|| {
                SchedulerError::Scheduling("constrained instance without disk allocation".to_string())
            })?;
            grown.disk = Some(step_up(current, 10 * GIB, limit.and_then(|l| l.disk)));
        }
        ResourceStatus::Ok => {}
    }
    Ok(grown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grown_allocation_steps_and_caps() {
        let allocated = ResourceVector::new(1.0, GIB, 10 * GIB);
        let limit = ResourceVector::new(4.0, 8 * GIB, 100 * GIB);

        let grown = grown_allocation(&allocated, Some(&limit), ResourceStatus::Cpu).unwrap();
        assert_eq!(grown.cpu_cores, Some(CpuCores::from_cores(2.0)));
        assert_eq!(grown.ram, Some(GIB));

        let grown = grown_allocation(&allocated, Some(&limit), ResourceStatus::Ram).unwrap();
        assert_eq!(grown.ram, Some(2 * GIB));

        let grown = grown_allocation(&allocated, Some(&limit), ResourceStatus::Disk).unwrap();
        assert_eq!(grown.disk, Some(20 * GIB));
    }

    #[test]
    fn test_grown_allocation_respects_tight_limit() {
        let allocated = ResourceVector::new(1.0, GIB, 10 * GIB);
        let limit = ResourceVector::new(1.0, GIB, 10 * GIB);
        let grown = grown_allocation(&allocated, Some(&limit), ResourceStatus::Cpu).unwrap();
        assert_eq!(grown, allocated);

        let tiny = ResourceVector::new(0.5, GIB, 10 * GIB);
        let grown = grown_allocation(&allocated, Some(&tiny), ResourceStatus::Cpu).unwrap();
        assert_eq!(grown, allocated);
    }

    #[test]
    fn test_grown_allocation_unbounded_without_limit() {
        let allocated = ResourceVector::new(1.0, GIB, 10 * GIB);
        let unbounded = ResourceVector {
            cpu_cores: None,
            ram: Some(8 * GIB),
            disk: Some(100 * GIB),
        };
        let grown = grown_allocation(&allocated, Some(&unbounded), ResourceStatus::Cpu).unwrap();
        assert_eq!(grown.cpu_cores, Some(CpuCores::from_cores(2.0)));
    }
}
