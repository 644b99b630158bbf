// # Scheduler
//
// Drives reconciliation passes: load a snapshot, resolve node, service
// and instance updates in that order, commit, then log the pass metrics.
// Passes are serialized; the snapshot is never shared across passes.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::info;

use crate::error::Result;
use crate::models::{SchedulerLog, TrackedAction, TrackedObject};
use crate::repository::Repository;

pub mod cluster;
pub mod selectors;
pub mod steps;

pub use cluster::ClusterState;
pub use steps::{InstanceUpdatesResolver, NodeUpdatesResolver, ServiceUpdatesResolver};

pub struct Scheduler {
    repository: Arc<dyn Repository>,
    // Serializes passes. A pass triggered while one is in flight waits
    // its turn; passes never interleave.
    pass_guard: Mutex<()>,
}

impl Scheduler {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Scheduler {
            repository,
            pass_guard: Mutex::new(()),
        }
    }

    /// Runs one reconciliation pass and appends its metrics log. A pass
    /// is all-or-nothing: on failure nothing is committed and no log is
    /// written, so the next pass retries the same dirty entities.
    pub async fn run_pass(&self) -> Result<SchedulerLog> {
        let _guard = self.pass_guard.lock().await;

        let mut state = ClusterState::load(self.repository.as_ref()).await?;

        // Time the resolver phase only, without repository I/O.
        let started = Instant::now();
        NodeUpdatesResolver::run(&mut state)?;
        ServiceUpdatesResolver::run(&mut state)?;
        InstanceUpdatesResolver::run(&mut state)?;
        let elapsed = started.elapsed();

        state.commit(self.repository.as_ref()).await?;

        state.finalize_metrics();
        let mut metrics = state.metrics;
        metrics.duration = elapsed.as_secs_f64();

        let log = SchedulerLog::new(metrics);
        self.repository.append_scheduler_log(&log).await?;

        info!(
            allocations = log.metrics.action(TrackedAction::Allocation),
            evictions = log.metrics.action(TrackedAction::Eviction),
            evicted_left = log.metrics.object(TrackedObject::Evicted),
            duration_secs = log.metrics.duration,
            "scheduling pass complete"
        );
        Ok(log)
    }
}
