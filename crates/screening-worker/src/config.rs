use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// SQLite database holding the screening tables
    pub database_url: String,

    /// Seconds to idle when the queue has nothing claimable
    pub poll_interval_secs: u64,

    /// Processing lease; a crashed worker's claim becomes reclaimable
    /// after this many seconds
    pub lease_secs: i64,

    /// Number of concurrent worker tasks polling the queue
    pub worker_count: usize,

    /// Log a heartbeat with queue depth every N poll cycles
    pub heartbeat_interval_cycles: u64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://screening.db".to_string()),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            lease_secs: env::var("WORKER_LEASE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            worker_count: env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,
            heartbeat_interval_cycles: env::var("HEARTBEAT_INTERVAL_CYCLES")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be at least 1");
        }
        if self.lease_secs <= 0 {
            bail!("WORKER_LEASE_SECS must be positive");
        }
        if self.worker_count == 0 {
            bail!("WORKER_COUNT must be at least 1");
        }
        Ok(())
    }
}
