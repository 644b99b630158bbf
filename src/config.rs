use std::time::Duration;

/// Server configuration. Defaults suit a local single-process
/// deployment; the environment overrides individual knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub listen_addr: String,
    pub port: u16,
    // How often the reconciliation timer fires.
    pub scheduling_interval: Duration,
    pub request_timeout: Duration,
    pub max_body_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            port: 8080,
            scheduling_interval: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("RUSTY_SCHED_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(interval) = std::env::var("RUSTY_SCHED_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse() {
                config.scheduling_interval = Duration::from_secs(secs);
            }
        }
        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.port)
    }
}
