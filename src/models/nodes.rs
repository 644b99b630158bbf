use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resources::ResourceVector;

/// Lifecycle status of a cluster node. DELETED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeStatus {
    Active,
    Failed,
    Deleted,
}

/// A host with a fixed resource capacity.
///
/// `available_resources` and `instance_ids` are derived per scheduling
/// pass from the instances pointing at this node; they are not sources
/// of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub status: NodeStatus,
    // Total capacity. Complete unless the node is deleted.
    pub node_resources: Option<ResourceVector>,
    #[serde(default)]
    pub available_resources: Option<ResourceVector>,
    #[serde(default)]
    pub instance_ids: Vec<Uuid>,
    // Dirty entities are examined by the next scheduling pass.
    #[serde(default)]
    pub dirty: bool,
}

impl Node {
    pub fn new(node_resources: ResourceVector) -> Self {
        Node {
            id: Uuid::new_v4(),
            status: NodeStatus::Active,
            node_resources: Some(node_resources),
            available_resources: None,
            instance_ids: Vec::new(),
            dirty: true,
        }
    }
}
