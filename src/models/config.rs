use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::error::{AppError, AppResult};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Interfaces to capture from; empty means let the selector choose
    pub interfaces: Vec<String>,

    /// Index of the filter active at startup
    pub filter_index: usize,

    /// Retention buffer capacity (records)
    pub buffer_size: usize,

    /// Inbound queue capacity between workers and the aggregator
    pub queue_size: usize,

    /// Refresh interval in milliseconds
    pub refresh_ms: u64,

    /// Upper bound on entries handed to the display per refresh
    pub max_display: usize,

    /// Capture snap length in bytes
    pub snaplen: i32,

    /// Enable promiscuous mode
    pub promiscuous: bool,

    /// Provider read timeout in milliseconds
    pub read_timeout_ms: i32,

    /// Optional log destination instead of stderr
    pub log_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            filter_index: 0,
            buffer_size: 50_000,
            queue_size: 1000,
            refresh_ms: 100,
            max_display: 10_000,
            snaplen: 65535,
            promiscuous: true,
            read_timeout_ms: 100,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> AppResult<()> {
        if self.buffer_size == 0 {
            return Err(AppError::Config("buffer size must be at least 1".into()));
        }
        if self.queue_size == 0 {
            return Err(AppError::Config("queue size must be at least 1".into()));
        }
        if self.refresh_ms == 0 {
            return Err(AppError::Config("refresh interval must be at least 1ms".into()));
        }
        if self.max_display == 0 {
            return Err(AppError::Config("max display must be at least 1".into()));
        }
        if self.snaplen <= 0 || self.read_timeout_ms <= 0 {
            return Err(AppError::Config(
                "snaplen and read timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }
}
