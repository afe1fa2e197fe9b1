//! Pipeline configuration types
//!
//! History bound, eviction policy and the flush/sweep cadence of the
//! ingestion store. Every field has a default so partial TOML/JSON sections
//! deserialize.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What happens when a flushed batch would push history past its bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Trim from the front so the newest `max_history` frames remain
    #[default]
    DropOldest,
    /// Clear the whole history and start over with the incoming batch
    Reset,
}

/// Configuration for the ingestion store and its scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of frames kept in history
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    #[serde(default)]
    pub eviction: EvictionPolicy,

    /// Batch publication period (default: 60ms)
    #[serde(default = "default_flush_interval")]
    pub flush_interval_ms: u64,

    /// Staleness sweep period (default: 1000ms)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_ms: u64,

    /// Age after which an ID leaves the published index (default: 5000ms)
    #[serde(default = "default_stale_timeout")]
    pub stale_timeout_ms: u64,
}

fn default_max_history() -> usize {
    50_000
}

fn default_flush_interval() -> u64 {
    60
}

fn default_sweep_interval() -> u64 {
    1000
}

fn default_stale_timeout() -> u64 {
    5000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            eviction: EvictionPolicy::default(),
            flush_interval_ms: default_flush_interval(),
            sweep_interval_ms: default_sweep_interval(),
            stale_timeout_ms: default_stale_timeout(),
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the history bound (at least 1)
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history.max(1);
        self
    }

    /// Builder method: set the eviction policy
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Builder method: set the flush period
    pub fn with_flush_interval_ms(mut self, ms: u64) -> Self {
        self.flush_interval_ms = ms;
        self
    }

    /// Builder method: set the sweep period
    pub fn with_sweep_interval_ms(mut self, ms: u64) -> Self {
        self.sweep_interval_ms = ms;
        self
    }

    /// Builder method: set the staleness timeout
    pub fn with_stale_timeout_ms(mut self, ms: u64) -> Self {
        self.stale_timeout_ms = ms;
        self
    }

    /// History bound as used by the store; a configured 0 behaves as 1
    pub fn history_bound(&self) -> usize {
        self.max_history.max(1)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}
