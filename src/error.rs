use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Resource underflow: {0}")]
    ResourceUnderflow(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SchedulerError {
    /// Pass-level failures are all scheduling errors; underflows detected
    /// while balancing node resources fold into that category.
    pub fn into_scheduling(self) -> SchedulerError {
        match self {
            SchedulerError::ResourceUnderflow(msg) => SchedulerError::Scheduling(msg),
            other => other,
        }
    }
}

impl From<serde_json::Error> for SchedulerError {
    fn from(e: serde_json::Error) -> Self {
        SchedulerError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
