use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resources::ResourceVector;

/// Scheduler actions counted per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackedAction {
    Allocation,
    Eviction,
    FragileEviction,
}

/// Object populations recorded per pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackedObject {
    Node,
    Service,
    Evicted,
}

/// Per-pass scheduling metrics, serialized into the scheduler log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    // Resolver phase duration in seconds; repository I/O excluded.
    pub duration: f64,
    pub total_cluster_resources: Option<ResourceVector>,
    pub utilized_cluster_resources: Option<ResourceVector>,
    pub utilization: HashMap<String, f64>,
    pub actions_counter: HashMap<TrackedAction, u64>,
    pub objects_counter: HashMap<TrackedObject, u64>,
}

impl SchedulerMetrics {
    pub fn count_action(&mut self, on: TrackedAction, by: u64) {
        *self.actions_counter.entry(on).or_insert(0) += by;
    }

    pub fn count_object(&mut self, on: TrackedObject, by: u64) {
        *self.objects_counter.entry(on).or_insert(0) += by;
    }

    pub fn action(&self, on: TrackedAction) -> u64 {
        self.actions_counter.get(&on).copied().unwrap_or(0)
    }

    pub fn object(&self, on: TrackedObject) -> u64 {
        self.objects_counter.get(&on).copied().unwrap_or(0)
    }

    /// Per-component utilized/total ratio, for components where the
    /// total is set and non-zero.
    pub fn calculate_utilization(&mut self) {
        let (Some(total), Some(utilized)) = (
            self.total_cluster_resources.as_ref(),
            self.utilized_cluster_resources.as_ref(),
        ) else {
            return;
        };

        if let (Some(t), Some(u)) = (total.cpu_cores, utilized.cpu_cores) {
            if t.tenths() > 0 {
                self.utilization.insert(
                    "cpu_cores".to_string(),
                    u.tenths() as f64 / t.tenths() as f64,
                );
            }
        }
        if let (Some(t), Some(u)) = (total.ram, utilized.ram) {
            if t > 0 {
                self.utilization.insert("ram".to_string(), u as f64 / t as f64);
            }
        }
        if let (Some(t), Some(u)) = (total.disk, utilized.disk) {
            if t > 0 {
                self.utilization.insert("disk".to_string(), u as f64 / t as f64);
            }
        }
    }
}

/// One record appended per successful scheduling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerLog {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub metrics: SchedulerMetrics,
}

impl SchedulerLog {
    pub fn new(metrics: SchedulerMetrics) -> Self {
        SchedulerLog {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::GIB;

    #[test]
    fn test_counters_accumulate_from_zero() {
        let mut metrics = SchedulerMetrics::default();
        metrics.count_action(TrackedAction::Allocation, 2);
        metrics.count_action(TrackedAction::Allocation, 3);
        metrics.count_object(TrackedObject::Evicted, 1);

        assert_eq!(metrics.action(TrackedAction::Allocation), 5);
        assert_eq!(metrics.action(TrackedAction::Eviction), 0);
        assert_eq!(metrics.object(TrackedObject::Evicted), 1);
    }

    #[test]
    fn test_utilization_ratios() {
        let mut metrics = SchedulerMetrics {
            total_cluster_resources: Some(ResourceVector::new(8.0, 32 * GIB, 100 * GIB)),
            utilized_cluster_resources: Some(ResourceVector::new(2.0, 8 * GIB, 25 * GIB)),
            ..SchedulerMetrics::default()
        };
        metrics.calculate_utilization();
        assert_eq!(metrics.utilization["cpu_cores"], 0.25);
        assert_eq!(metrics.utilization["ram"], 0.25);
        assert_eq!(metrics.utilization["disk"], 0.25);
    }

    #[test]
    fn test_metrics_round_trip_json() {
        let mut metrics = SchedulerMetrics::default();
        metrics.count_action(TrackedAction::FragileEviction, 1);
        metrics.count_object(TrackedObject::Node, 3);

        let encoded = serde_json::to_string(&metrics).unwrap();
        assert!(encoded.contains("FRAGILE_EVICTION"));
        let decoded: SchedulerMetrics = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, metrics);
    }
}
