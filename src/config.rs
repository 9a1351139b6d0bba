//! Engine configuration.

use crate::{Error, Result};

pub const DEFAULT_MAX_CLIENTS: usize = 64;

/// Configuration for [`DearJackEngine`](crate::DearJackEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker pool size. `None` uses the available hardware parallelism.
    pub worker_threads: Option<usize>,
    pub max_clients: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_clients: DEFAULT_MAX_CLIENTS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == Some(0) {
            return Err(Error::InvalidConfig(
                "worker_threads must be at least 1".into(),
            ));
        }
        if self.max_clients == 0 {
            return Err(Error::InvalidConfig("max_clients must be at least 1".into()));
        }
        Ok(())
    }
}
