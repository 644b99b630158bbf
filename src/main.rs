// # RustySched Server
//
// Main entry point for the scheduler. Wires the repository, the
// reconciliation timer and the REST API together.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use rusty_sched::api::{ApiServer, ApiState};
use rusty_sched::repository::{MemoryRepository, Repository};
use rusty_sched::scheduler::Scheduler;
use rusty_sched::{Result, SchedulerConfig, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let config = SchedulerConfig::from_env();
    info!("Starting RustySched v{VERSION}");

    let repository: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let scheduler = Arc::new(Scheduler::new(repository.clone()));

    // Reconciliation timer. A failed pass rolls back and leaves dirty
    // flags untouched, so the next tick retries it.
    {
        let scheduler = scheduler.clone();
        let interval = config.scheduling_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match scheduler.run_pass().await {
                    Ok(log) => debug!(pass = %log.id, "scheduling pass recorded"),
                    Err(e) => warn!("scheduling pass failed: {e}"),
                }
            }
        });
    }

    let state = Arc::new(ApiState {
        config: config.clone(),
        repository,
    });
    let server = ApiServer::new(state);
    server.run(&config.bind_addr()).await
}
