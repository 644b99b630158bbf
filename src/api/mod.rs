// REST surface consumed by the API layer, node agents and the instance
// supervisor. The scheduler core is only reached through the repository;
// handlers never touch an in-flight pass.

pub mod events;
pub mod monitoring;
pub mod nodes;
pub mod server;
pub mod services;
pub mod types;

pub use server::{build_router, ApiServer};
pub use types::{ApiError, ApiResult, ApiState};
